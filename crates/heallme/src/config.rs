//! Service configuration.
//!
//! [`ServiceConfig`] carries the model credentials and timeouts plus the
//! notification webhook settings. Build it from the environment with
//! [`ServiceConfig::from_env`], or directly with the builder methods:
//!
//! ```ignore
//! let config = ServiceConfig::new("sk-...")
//!     .with_model("google/gemini-2.5-flash")
//!     .with_model_timeout(Duration::from_secs(30))
//!     .with_webhook_url("https://automation.example.com/webhook/health");
//! ```

use std::time::Duration;

use crate::error::ConfigError;

/// Environment variable holding the model API key (required).
pub const API_KEY_VAR: &str = "OPENROUTER_KEY";
/// Environment variable overriding the model identifier.
pub const MODEL_VAR: &str = "HEALLME_MODEL";
/// Environment variable overriding the model call timeout, in seconds.
pub const MODEL_TIMEOUT_VAR: &str = "HEALLME_MODEL_TIMEOUT_SECS";
/// Environment variable holding the notification webhook URL (optional).
pub const WEBHOOK_URL_VAR: &str = "N8N_WEBHOOK_URL";
/// Environment variable overriding the notification timeout, in seconds.
pub const WEBHOOK_TIMEOUT_VAR: &str = "N8N_TIMEOUT";

pub const DEFAULT_MODEL: &str = "google/gemini-2.5-flash";
pub const DEFAULT_MODEL_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_NOTIFY_TIMEOUT: Duration = Duration::from_secs(30);

/// Notification webhook settings.
#[derive(Debug, Clone)]
pub struct NotifyConfig {
    /// Destination for events. `None` disables notifications.
    pub webhook_url: Option<String>,
    /// Per-request timeout. Default: 30 seconds.
    pub timeout: Duration,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            timeout: DEFAULT_NOTIFY_TIMEOUT,
        }
    }
}

/// Everything needed to construct an [`Orchestrator`](crate::Orchestrator).
#[derive(Clone)]
pub struct ServiceConfig {
    pub api_key: String,
    /// Model identifier. Default: [`DEFAULT_MODEL`].
    pub model: String,
    /// Upper bound on a single model call. Default: 60 seconds.
    pub model_timeout: Duration,
    pub notify: NotifyConfig,
}

impl std::fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("model_timeout", &self.model_timeout)
            .field("notify", &self.notify)
            .finish()
    }
}

impl ServiceConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            model_timeout: DEFAULT_MODEL_TIMEOUT,
            notify: NotifyConfig::default(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_model_timeout(mut self, timeout: Duration) -> Self {
        self.model_timeout = timeout;
        self
    }

    pub fn with_webhook_url(mut self, url: impl Into<String>) -> Self {
        self.notify.webhook_url = Some(url.into());
        self
    }

    pub fn with_notify_timeout(mut self, timeout: Duration) -> Self {
        self.notify.timeout = timeout;
        self
    }

    /// Read the configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read the configuration through an arbitrary variable lookup.
    ///
    /// Empty values count as unset. A missing API key is an error; a missing
    /// webhook URL only disables notifications.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let api_key = get(API_KEY_VAR).ok_or(ConfigError::MissingApiKey(API_KEY_VAR))?;
        let mut config = Self::new(api_key);

        if let Some(model) = get(MODEL_VAR) {
            config.model = model;
        }
        if let Some(raw) = get(MODEL_TIMEOUT_VAR) {
            config.model_timeout = parse_secs(MODEL_TIMEOUT_VAR, &raw)?;
        }
        config.notify.webhook_url = get(WEBHOOK_URL_VAR);
        if let Some(raw) = get(WEBHOOK_TIMEOUT_VAR) {
            config.notify.timeout = parse_secs(WEBHOOK_TIMEOUT_VAR, &raw)?;
        }

        Ok(config)
    }
}

/// Whole seconds, at least one.
fn parse_secs(var: &'static str, raw: &str) -> Result<Duration, ConfigError> {
    match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(ConfigError::InvalidTimeout {
            var,
            value: raw.to_string(),
        }),
    }
}

/// Default `tracing` filter directive used when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "info,heallme=debug,heallme_web=debug"
}
