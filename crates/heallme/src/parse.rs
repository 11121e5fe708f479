//! Model output → typed result.
//!
//! Chat replies pass through verbatim. Structured variants are decoded as a
//! JSON object and returned as decoded: documented keys with an unexpected
//! value are kept raw, unknown keys are kept too, and missing keys stay
//! missing. Only text that is not a JSON object gets the variant's fixed
//! fallback. Decoding failure is an expected branch here, so nothing in this
//! module returns an error.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::types::{
    AnalysisResult, EmergencyGuidance, HealthDataAnalysis, HealthRecommendations, Reported,
    SymptomAnalysis, UrgencyLevel, Variant,
};

/// A result shape the model is asked to emit as JSON.
pub trait StructuredResult: DeserializeOwned + Serialize + Sized {
    const VARIANT: Variant;

    /// Fixed substitute used when the model output cannot be decoded.
    fn fallback() -> Self;

    /// Attach an upstream failure description.
    fn set_error(&mut self, error: String);

    fn into_result(self) -> AnalysisResult;
}

/// Decode raw model text into `T`, substituting `T::fallback()` when it is
/// not a JSON object.
pub fn parse_structured<T: StructuredResult>(raw: &str) -> T {
    let body = strip_code_fence(raw);
    let object = match serde_json::from_str::<Map<String, Value>>(body) {
        Ok(object) => object,
        Err(e) => {
            debug!(
                variant = T::VARIANT.as_str(),
                "model output is not a JSON object, using fallback: {e}"
            );
            return T::fallback();
        }
    };
    match serde_json::from_value::<T>(Value::Object(object)) {
        Ok(result) => result,
        Err(e) => {
            warn!(
                variant = T::VARIANT.as_str(),
                "model JSON could not be represented: {e}"
            );
            T::fallback()
        }
    }
}

/// The fallback-shaped result for an upstream failure, carrying `error`.
pub fn error_result<T: StructuredResult>(error: String) -> T {
    let mut result = T::fallback();
    result.set_error(error);
    result
}

/// Parse raw model text for the given variant.
pub fn parse(variant: Variant, raw: &str) -> AnalysisResult {
    match variant {
        Variant::Chat => AnalysisResult::Chat(raw.to_string()),
        Variant::Symptoms => parse_structured::<SymptomAnalysis>(raw).into_result(),
        Variant::Recommendations => parse_structured::<HealthRecommendations>(raw).into_result(),
        Variant::HealthData => parse_structured::<HealthDataAnalysis>(raw).into_result(),
        Variant::Emergency => parse_structured::<EmergencyGuidance>(raw).into_result(),
    }
}

/// Remove one surrounding Markdown code fence (```` ```json ```` … ```` ``` ````).
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(inner) = rest.strip_suffix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") on the opening line.
    match inner.split_once('\n') {
        Some((info, body)) if !info.contains('{') => body.trim(),
        _ => inner.trim(),
    }
}

fn list(items: &[&str]) -> Option<Reported<Vec<String>>> {
    Some(Reported::Typed(
        items.iter().map(|s| (*s).to_string()).collect(),
    ))
}

fn text(value: &str) -> Option<Reported<String>> {
    Some(Reported::Typed(value.to_string()))
}

fn attach_error(extra: &mut Map<String, Value>, error: String) {
    extra.insert("error".to_string(), Value::String(error));
}

// ── Fallbacks ──────────────────────────────────────────────────────

impl StructuredResult for SymptomAnalysis {
    const VARIANT: Variant = Variant::Symptoms;

    fn fallback() -> Self {
        Self {
            possible_conditions: list(&["Consult a healthcare professional"]),
            recommendations: list(&[
                "Please consult a healthcare professional for proper diagnosis",
            ]),
            urgency_level: Some(Reported::Typed(UrgencyLevel::Medium)),
            suggested_tests: list(&["General health checkup"]),
            lifestyle_advice: list(&["Maintain a healthy lifestyle"]),
            warning_signs: list(&["Persistent symptoms"]),
            when_to_seek_help: text("If symptoms persist or worsen"),
            confidence_level: text("60%"),
            extra: Map::new(),
        }
    }

    fn set_error(&mut self, error: String) {
        attach_error(&mut self.extra, error);
    }

    fn into_result(self) -> AnalysisResult {
        AnalysisResult::Symptoms(self)
    }
}

impl StructuredResult for HealthRecommendations {
    const VARIANT: Variant = Variant::Recommendations;

    fn fallback() -> Self {
        Self {
            dietary_suggestions: list(&["Eat a balanced diet with fruits and vegetables"]),
            vitamins_minerals: Some(Reported::Typed(
                [
                    ("vitamin_d", "Consider supplementation"),
                    ("iron", "Include iron-rich foods"),
                    ("calcium", "Include dairy or fortified foods"),
                    ("vitamin_b12", "Include animal products or supplements"),
                ]
                .into_iter()
                .map(|(name, status)| (name.to_string(), Value::from(status)))
                .collect(),
            )),
            exercise_recommendations: list(&["30 minutes of moderate exercise daily"]),
            general_health_tips: list(&["Stay hydrated", "Get adequate sleep"]),
            foods_to_avoid: list(&["Excessive processed foods"]),
            sleep_recommendations: list(&["7-9 hours of sleep per night"]),
            stress_management: list(&["Practice meditation or deep breathing"]),
            preventive_measures: list(&["Regular health checkups"]),
            extra: Map::new(),
        }
    }

    fn set_error(&mut self, error: String) {
        attach_error(&mut self.extra, error);
    }

    fn into_result(self) -> AnalysisResult {
        AnalysisResult::Recommendations(self)
    }
}

impl StructuredResult for HealthDataAnalysis {
    const VARIANT: Variant = Variant::HealthData;

    fn fallback() -> Self {
        Self {
            overall_health_score: text("70%"),
            trends: list(&["General health appears stable"]),
            concerns: list(&["Continue monitoring"]),
            improvements: list(&["Maintain current healthy habits"]),
            recommendations: list(&["Regular health checkups"]),
            risk_factors: list(&["None identified"]),
            positive_aspects: list(&["Good overall health indicators"]),
            extra: Map::new(),
        }
    }

    fn set_error(&mut self, error: String) {
        attach_error(&mut self.extra, error);
    }

    fn into_result(self) -> AnalysisResult {
        AnalysisResult::HealthData(self)
    }
}

impl StructuredResult for EmergencyGuidance {
    const VARIANT: Variant = Variant::Emergency;

    fn fallback() -> Self {
        Self {
            immediate_actions: list(&["Call emergency services if needed"]),
            emergency_contacts: list(&["911", "Local emergency services"]),
            warning_signs: list(&["Severe symptoms"]),
            do_not_do: list(&["Don't delay seeking help"]),
            when_to_call_emergency: text("If symptoms are severe or life-threatening"),
            preparation_steps: list(&["Stay calm", "Call for help"]),
            extra: Map::new(),
        }
    }

    fn set_error(&mut self, error: String) {
        attach_error(&mut self.extra, error);
    }

    fn into_result(self) -> AnalysisResult {
        AnalysisResult::Emergency(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn to_value<T: Serialize>(t: &T) -> Value {
        serde_json::to_value(t).unwrap()
    }

    #[test]
    fn chat_text_passes_through_verbatim() {
        let raw = "  Drink water.\n{not json}  ";
        assert_eq!(parse(Variant::Chat, raw), AnalysisResult::Chat(raw.to_string()));
    }

    #[test]
    fn invalid_json_yields_symptom_fallback() {
        let result: SymptomAnalysis = parse_structured("I think you should rest.");
        assert_eq!(
            to_value(&result),
            json!({
                "possible_conditions": ["Consult a healthcare professional"],
                "recommendations": ["Please consult a healthcare professional for proper diagnosis"],
                "urgency_level": "medium",
                "suggested_tests": ["General health checkup"],
                "lifestyle_advice": ["Maintain a healthy lifestyle"],
                "warning_signs": ["Persistent symptoms"],
                "when_to_seek_help": "If symptoms persist or worsen",
                "confidence_level": "60%"
            })
        );
    }

    #[test]
    fn invalid_json_yields_recommendation_fallback() {
        let result: HealthRecommendations = parse_structured("{ truncated");
        assert_eq!(
            to_value(&result),
            json!({
                "dietary_suggestions": ["Eat a balanced diet with fruits and vegetables"],
                "vitamins_minerals": {
                    "vitamin_d": "Consider supplementation",
                    "iron": "Include iron-rich foods",
                    "calcium": "Include dairy or fortified foods",
                    "vitamin_b12": "Include animal products or supplements"
                },
                "exercise_recommendations": ["30 minutes of moderate exercise daily"],
                "general_health_tips": ["Stay hydrated", "Get adequate sleep"],
                "foods_to_avoid": ["Excessive processed foods"],
                "sleep_recommendations": ["7-9 hours of sleep per night"],
                "stress_management": ["Practice meditation or deep breathing"],
                "preventive_measures": ["Regular health checkups"]
            })
        );
    }

    #[test]
    fn invalid_json_yields_health_data_fallback() {
        let result: HealthDataAnalysis = parse_structured("");
        assert_eq!(
            to_value(&result),
            json!({
                "overall_health_score": "70%",
                "trends": ["General health appears stable"],
                "concerns": ["Continue monitoring"],
                "improvements": ["Maintain current healthy habits"],
                "recommendations": ["Regular health checkups"],
                "risk_factors": ["None identified"],
                "positive_aspects": ["Good overall health indicators"]
            })
        );
    }

    #[test]
    fn invalid_json_yields_emergency_fallback() {
        let result: EmergencyGuidance = parse_structured("call 911");
        assert_eq!(result, EmergencyGuidance::fallback());
        assert_eq!(
            to_value(&result)["emergency_contacts"],
            json!(["911", "Local emergency services"])
        );
    }

    #[test]
    fn valid_json_round_trips_unchanged() {
        let raw = json!({
            "possible_conditions": ["Migraine", "Hypertensive urgency"],
            "recommendations": ["Check blood pressure"],
            "urgency_level": "high",
            "suggested_tests": ["Blood pressure reading", "Eye exam"],
            "lifestyle_advice": ["Reduce salt"],
            "warning_signs": ["Sudden vision loss"],
            "when_to_seek_help": "Now if vision worsens",
            "confidence_level": "75%",
            "follow_up_days": 2
        });
        let result: SymptomAnalysis = parse_structured(&raw.to_string());
        assert_eq!(result.urgency(), Some(UrgencyLevel::High));
        assert_eq!(to_value(&result), raw);
    }

    #[test]
    fn valid_json_for_every_variant_is_kept() {
        let health = json!({
            "overall_health_score": "82%",
            "trends": ["Resting heart rate improving"],
            "concerns": [],
            "improvements": ["More sleep"],
            "recommendations": ["Keep walking"],
            "risk_factors": [],
            "positive_aspects": ["Consistent exercise"]
        });
        match parse(Variant::HealthData, &health.to_string()) {
            AnalysisResult::HealthData(h) => assert_eq!(to_value(&h), health),
            other => panic!("unexpected {other:?}"),
        }

        let recs = json!({
            "dietary_suggestions": ["Oats"],
            "vitamins_minerals": {
                "vitamin_d": "low", "iron": "normal",
                "calcium": "normal", "vitamin_b12": "normal", "magnesium": "low"
            },
            "exercise_recommendations": ["Swimming"],
            "general_health_tips": [],
            "foods_to_avoid": ["Soda"],
            "sleep_recommendations": ["8 hours"],
            "stress_management": ["Journaling"],
            "preventive_measures": ["Annual physical"]
        });
        match parse(Variant::Recommendations, &recs.to_string()) {
            AnalysisResult::Recommendations(r) => assert_eq!(to_value(&r), recs),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn partial_object_gains_no_keys() {
        let raw = json!({"overall_health_score": "90%"});
        let result: HealthDataAnalysis = parse_structured(&raw.to_string());
        assert_eq!(to_value(&result), raw);
        assert!(result.error().is_none());
    }

    #[test]
    fn fenced_json_is_decoded() {
        let raw = "```json\n{\"overall_health_score\": \"55%\"}\n```";
        let result: HealthDataAnalysis = parse_structured(raw);
        assert_eq!(to_value(&result), json!({"overall_health_score": "55%"}));
    }

    #[test]
    fn unlisted_urgency_is_kept_verbatim() {
        let raw = json!({
            "possible_conditions": ["Tension headache"],
            "recommendations": ["Rest"],
            "urgency_level": "moderate",
            "suggested_tests": [],
            "lifestyle_advice": [],
            "warning_signs": [],
            "when_to_seek_help": "If it lasts more than a week",
            "confidence_level": "65%"
        });
        let result: SymptomAnalysis = parse_structured(&raw.to_string());
        assert_ne!(result, SymptomAnalysis::fallback());
        assert_eq!(result.urgency(), None);
        assert_eq!(to_value(&result), raw);
    }

    #[test]
    fn off_schema_values_are_kept_verbatim() {
        let raw = json!({
            "overall_health_score": 82,
            "trends": null,
            "concerns": "none",
            "recommendations": ["Keep walking"]
        });
        let result: HealthDataAnalysis = parse_structured(&raw.to_string());
        assert_eq!(to_value(&result), raw);
        assert_eq!(result.overall_health_score, Some(Reported::Raw(json!(82))));
        assert_eq!(crate::types::list_len(&result.recommendations), 1);
    }

    #[test]
    fn model_supplied_error_key_is_kept() {
        let raw = json!({"immediate_actions": ["Stay calm"], "error": {"code": 1}});
        let result: EmergencyGuidance = parse_structured(&raw.to_string());
        assert_eq!(to_value(&result), raw);
        assert!(result.error().is_none());
    }

    #[test]
    fn json_array_falls_back() {
        let result: HealthDataAnalysis = parse_structured("[1, 2, 3]");
        assert_eq!(result, HealthDataAnalysis::fallback());
    }

    #[test]
    fn error_result_keeps_fallback_shape_and_adds_error() {
        let result: SymptomAnalysis = error_result("model request timed out".into());
        let value = to_value(&result);
        assert_eq!(value["error"], "model request timed out");
        assert_eq!(value["urgency_level"], "medium");
        assert_eq!(result.error(), Some("model request timed out"));
        let mut without_error = value.as_object().unwrap().clone();
        without_error.remove("error");
        assert_eq!(Value::Object(without_error), to_value(&SymptomAnalysis::fallback()));
    }
}
