//! Error types for configuration and the upstream model call.
//!
//! Only [`ConfigError`] is ever surfaced to a caller: it is returned while
//! building the orchestrator and is fatal at startup. [`ModelError`] is
//! produced by a [`TextModel`](crate::model::TextModel) and always recovered
//! inside the orchestrator as a fallback-shaped result.

use thiserror::Error;

/// Startup configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("model API key is not set (expected {0})")]
    MissingApiKey(&'static str),

    #[error("invalid timeout in {var}: {value:?} is not a positive whole number of seconds")]
    InvalidTimeout { var: &'static str, value: String },

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Failure of a single text-generation call.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("request failed: {0}")]
    Transport(String),

    #[error("model request timed out")]
    Timeout,

    #[error("model API HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("model API error: {0}")]
    Api(String),

    #[error("failed to parse model response: {0}")]
    Decode(String),

    #[error("model returned no content")]
    EmptyResponse,
}

impl From<reqwest::Error> for ModelError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ModelError::Timeout
        } else {
            ModelError::Transport(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_error_mentions_code_and_body() {
        let err = ModelError::Status {
            status: 429,
            body: "quota exceeded".into(),
        };
        let text = err.to_string();
        assert!(text.contains("429"));
        assert!(text.contains("quota exceeded"));
    }

    #[test]
    fn missing_key_names_the_variable() {
        let err = ConfigError::MissingApiKey("OPENROUTER_KEY");
        assert!(err.to_string().contains("OPENROUTER_KEY"));
    }
}
