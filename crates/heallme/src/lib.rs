//! Core of the HealLLMe backend: one model call per request, wrapped in
//! prompt construction, tolerant response parsing, and best-effort
//! notifications.
//!
//! The entry point is the [`Orchestrator`]. Each operation renders a prompt
//! for its variant, calls the configured [`TextModel`](model::TextModel)
//! exactly once, decodes the reply into a typed result (or a fixed fallback
//! shape), and emits one notification event. Model failures never escape an
//! operation; the caller always gets a well-formed result.
//!
//! ```ignore
//! use heallme::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), ConfigError> {
//!     let config = ServiceConfig::from_env()?;
//!     let orchestrator = Orchestrator::new(&config)?;
//!
//!     let profile = UserProfile {
//!         age: Some(45),
//!         ..Default::default()
//!     };
//!     let analysis = orchestrator
//!         .analyze_symptoms("persistent headache", &[], &profile)
//!         .await;
//!     println!("{}", serde_json::to_string_pretty(&analysis).unwrap_or_default());
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`orchestrator`] | Per-call state machine composing the pieces below |
//! | [`prompt`] | Deterministic prompt rendering per variant |
//! | [`parse`] | JSON extraction with per-variant fallbacks |
//! | [`model`] | [`TextModel`](model::TextModel) seam and the OpenRouter client |
//! | [`notify`] | Notification events and sinks |
//! | [`types`] | Requests, results, conversation turns, user profile |
//! | [`config`] | [`ServiceConfig`] and environment loading |
//! | [`quotes`] | Daily health quotes |

pub mod config;
pub mod error;
pub mod model;
pub mod notify;
pub mod orchestrator;
pub mod parse;
pub mod prelude;
pub mod prompt;
pub mod quotes;
pub mod types;

pub use config::{NotifyConfig, ServiceConfig};
pub use error::{ConfigError, ModelError};
pub use orchestrator::Orchestrator;
pub use types::{AnalysisRequest, AnalysisResult, ConversationTurn, UserProfile, Variant};
