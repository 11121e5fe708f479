//! Daily health quotes.

use rand::seq::SliceRandom;

pub const HEALTH_QUOTES: [&str; 10] = [
    "An apple a day keeps the doctor away",
    "Health is wealth",
    "Take care of your body. It's the only place you have to live",
    "The groundwork for all happiness is good health",
    "Your body is a temple. Keep it pure and clean for the soul to reside in",
    "Prevention is better than cure",
    "A healthy outside starts from the inside",
    "The greatest wealth is health",
    "Wellness is the complete integration of body, mind, and spirit",
    "Health is not simply the absence of sickness",
];

/// Pick a quote uniformly at random.
pub fn daily_quote() -> &'static str {
    HEALTH_QUOTES
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(HEALTH_QUOTES[0])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn quotes_always_come_from_the_fixed_list() {
        let known: HashSet<&str> = HEALTH_QUOTES.iter().copied().collect();
        let mut seen = HashSet::new();
        for _ in 0..1000 {
            let quote = daily_quote();
            assert!(known.contains(quote), "unexpected quote: {quote}");
            seen.insert(quote);
        }
        assert!(seen.len() > 1);
    }
}
