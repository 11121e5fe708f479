//! Convenience re-exports for common `heallme` types.
//!
//! ```ignore
//! use heallme::prelude::*;
//! ```

// ── Orchestration ───────────────────────────────────────────────────
pub use crate::config::{NotifyConfig, ServiceConfig};
pub use crate::error::{ConfigError, ModelError};
pub use crate::orchestrator::Orchestrator;

// ── Seams ───────────────────────────────────────────────────────────
pub use crate::model::{ModelFuture, OpenRouterModel, TextModel};
pub use crate::notify::{
    EventType, NoopNotifier, NotificationEvent, NotificationSink, NotifyFuture, WebhookNotifier,
};

// ── Types ───────────────────────────────────────────────────────────
pub use crate::types::{
    AnalysisRequest, AnalysisResult, ConversationTurn, EmergencyGuidance, HealthDataAnalysis,
    HealthRecommendations, Reported, Role, SymptomAnalysis, UrgencyLevel, UserProfile, Variant,
};
