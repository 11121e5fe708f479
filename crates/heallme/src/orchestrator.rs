//! The per-call orchestration state machine.
//!
//! Every operation runs the same sequence, once, with no retries:
//!
//! ```text
//! BuildingPrompt ─▶ AwaitingModel ─▶ Parsing ─▶ Notifying ─▶ Done
//!                        │
//!                        └─ model failure ─▶ Error (fallback + `_error` event) ─▶ Done
//! ```
//!
//! Model failures never escape: structured operations return their fallback
//! shape with an `error` field, chat returns a fixed apology. Notification
//! delivery is awaited as the last step but cannot change the result.
//!
//! Calls share nothing mutable. The only shared resource is the HTTP client
//! inside the model and notifier, which pools connections across tasks.
//! Dropping an operation future (for example because the inbound request was
//! aborted) cancels whichever external call is in flight.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value, json};
use tracing::{Instrument, debug, info, info_span, trace, warn};
use uuid::Uuid;

use crate::config::ServiceConfig;
use crate::error::{ConfigError, ModelError};
use crate::model::{OpenRouterModel, TextModel};
use crate::notify::{EventType, NotificationEvent, NotificationSink, WebhookNotifier, object};
use crate::parse::{StructuredResult, error_result, parse_structured};
use crate::prompt;
use crate::quotes;
use crate::types::{
    AnalysisRequest, AnalysisResult, ChatQuery, ConversationTurn, EmergencyGuidance,
    EmergencyQuery, HealthDataAnalysis, HealthDataQuery, HealthRecommendations,
    RecommendationQuery, Reported, SymptomAnalysis, SymptomQuery, UserProfile, Variant, list_len,
};

/// Opening of the reply returned when the chat model call fails.
pub const CHAT_APOLOGY: &str =
    "I'm sorry, I'm having trouble responding right now. Please try again later.";

const CHAT_MESSAGE_PREVIEW_CHARS: usize = 100;
const CHAT_RESPONSE_PREVIEW_CHARS: usize = 200;

/// States of a single orchestration call, as reported in trace logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    BuildingPrompt,
    AwaitingModel,
    Parsing,
    Notifying,
    Error,
    Done,
}

/// What a finished call tells the notification sink.
struct Notice {
    message: String,
    metadata: Map<String, Value>,
}

/// The reported value as JSON, or `default` when the key was absent.
fn reported_or<T: serde::Serialize>(field: &Option<Reported<T>>, default: Value) -> Value {
    field
        .as_ref()
        .and_then(|reported| serde_json::to_value(reported).ok())
        .unwrap_or(default)
}

impl Notice {
    fn new(message: impl Into<String>, metadata: Value) -> Self {
        Self {
            message: message.into(),
            metadata: object(metadata),
        }
    }
}

/// Composes prompt rendering, the model call, response parsing and
/// notification for every operation.
#[derive(Clone)]
pub struct Orchestrator {
    model: Arc<dyn TextModel>,
    notifier: Arc<dyn NotificationSink>,
    model_timeout: Duration,
}

impl Orchestrator {
    /// Build the production orchestrator: an OpenRouter model and a webhook
    /// notifier sharing one pooled HTTP client.
    ///
    /// Fails only on configuration problems, which are fatal at startup.
    pub fn new(config: &ServiceConfig) -> Result<Self, ConfigError> {
        if config.api_key.trim().is_empty() {
            return Err(ConfigError::MissingApiKey(crate::config::API_KEY_VAR));
        }
        let client = reqwest::Client::builder()
            .user_agent(concat!("heallme/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let model = OpenRouterModel::new(
            client.clone(),
            config.api_key.clone(),
            config.model.clone(),
            config.model_timeout,
        );
        let notifier = WebhookNotifier::new(client, &config.notify);
        info!(
            "Orchestrator ready: model={}, notifications={}",
            config.model,
            if notifier.is_enabled() { "on" } else { "off" }
        );

        Ok(Self::with_parts(Arc::new(model), Arc::new(notifier))
            .with_model_timeout(config.model_timeout))
    }

    /// Assemble an orchestrator from explicit collaborators.
    pub fn with_parts(model: Arc<dyn TextModel>, notifier: Arc<dyn NotificationSink>) -> Self {
        Self {
            model,
            notifier,
            model_timeout: crate::config::DEFAULT_MODEL_TIMEOUT,
        }
    }

    /// Bound every model call, independently of the model's own transport timeout.
    pub fn with_model_timeout(mut self, timeout: Duration) -> Self {
        self.model_timeout = timeout;
        self
    }

    pub fn notifier(&self) -> &Arc<dyn NotificationSink> {
        &self.notifier
    }

    // ── Operations ────────────────────────────────────────────────

    pub async fn analyze_symptoms(
        &self,
        symptoms: &str,
        history_tags: &[String],
        profile: &UserProfile,
    ) -> SymptomAnalysis {
        let request = AnalysisRequest::Symptoms(SymptomQuery {
            symptoms,
            history_tags,
            profile,
        });
        self.run_structured(
            &request,
            profile,
            |r: &SymptomAnalysis| {
                Notice::new(
                    format!("Symptom analysis completed for: {symptoms}"),
                    json!({
                        "symptoms": symptoms,
                        "urgency_level": reported_or(&r.urgency_level, json!("medium")),
                        "possible_conditions": reported_or(&r.possible_conditions, json!([])),
                        "confidence_level": reported_or(&r.confidence_level, json!("unknown")),
                    }),
                )
            },
            |error| {
                Notice::new(
                    format!("Symptom analysis failed: {error}"),
                    json!({"error": error, "symptoms": symptoms}),
                )
            },
        )
        .await
    }

    pub async fn generate_recommendations(
        &self,
        profile: &UserProfile,
        health_snapshot: &Value,
        lifestyle: &Value,
    ) -> HealthRecommendations {
        let request = AnalysisRequest::Recommendations(RecommendationQuery {
            profile,
            health_snapshot,
            lifestyle,
        });
        self.run_structured(
            &request,
            profile,
            |r: &HealthRecommendations| {
                Notice::new(
                    "Health recommendations generated for user",
                    json!({
                        "recommendations_count": list_len(&r.dietary_suggestions),
                        "vitamins_analyzed": r.vitamins_analyzed(),
                        "exercise_count": list_len(&r.exercise_recommendations),
                    }),
                )
            },
            |error| {
                Notice::new(
                    format!("Health recommendations generation failed: {error}"),
                    json!({"error": error}),
                )
            },
        )
        .await
    }

    pub async fn analyze_health_data(
        &self,
        raw_payload: &Value,
        profile: &UserProfile,
    ) -> HealthDataAnalysis {
        let request = AnalysisRequest::HealthData(HealthDataQuery {
            raw_payload,
            profile,
        });
        self.run_structured(
            &request,
            profile,
            |r: &HealthDataAnalysis| {
                Notice::new(
                    "Health data analysis completed",
                    json!({
                        "health_score": reported_or(&r.overall_health_score, json!("unknown")),
                        "concerns_count": list_len(&r.concerns),
                        "recommendations_count": list_len(&r.recommendations),
                    }),
                )
            },
            |error| {
                Notice::new(
                    format!("Health data analysis failed: {error}"),
                    json!({"error": error}),
                )
            },
        )
        .await
    }

    pub async fn emergency_guidance(
        &self,
        emergency_type: &str,
        profile: &UserProfile,
    ) -> EmergencyGuidance {
        let request = AnalysisRequest::Emergency(EmergencyQuery {
            emergency_type,
            profile,
        });
        self.run_structured(
            &request,
            profile,
            |_: &EmergencyGuidance| {
                Notice::new(
                    format!("EMERGENCY: {emergency_type}"),
                    json!({
                        "emergency_type": emergency_type,
                        "user_age": profile.age,
                        "medical_history": profile.medical_history,
                    }),
                )
            },
            |error| {
                Notice::new(
                    format!("Emergency guidance failed: {error}"),
                    json!({"error": error, "emergency_type": emergency_type}),
                )
            },
        )
        .await
    }

    /// Free-form chat. Only the last five turns of `history` reach the model.
    pub async fn chat(
        &self,
        message: &str,
        history: &[ConversationTurn],
        profile: &UserProfile,
    ) -> String {
        let subject = profile.subject_id();
        let span = info_span!(
            "orchestrate",
            operation = Variant::Chat.as_str(),
            user_id = subject,
            call_id = %Uuid::new_v4(),
        );

        async move {
            trace!(state = ?CallState::BuildingPrompt);
            let prompt = prompt::chat_prompt(&ChatQuery {
                message,
                history,
                profile,
            });

            match self.call_model(&prompt).await {
                Ok(reply) => {
                    trace!(state = ?CallState::Notifying);
                    let preview: String = message.chars().take(CHAT_MESSAGE_PREVIEW_CHARS).collect();
                    let response_preview: String =
                        reply.chars().take(CHAT_RESPONSE_PREVIEW_CHARS).collect();
                    let notice = Notice::new(
                        format!("AI chat interaction: {preview}..."),
                        json!({
                            "user_message": message,
                            "ai_response": response_preview,
                            "chat_history_length": history.len(),
                        }),
                    );
                    self.notify(subject, EventType::completed(Variant::Chat), notice)
                        .await;
                    trace!(state = ?CallState::Done);
                    reply
                }
                Err(e) => {
                    let error = e.to_string();
                    warn!(state = ?CallState::Error, "chat model call failed: {error}");
                    let notice = Notice::new(
                        format!("AI chat failed: {error}"),
                        json!({"error": error, "user_message": message}),
                    );
                    self.notify(subject, EventType::failed(Variant::Chat), notice)
                        .await;
                    format!("{CHAT_APOLOGY} Error: {error}")
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Run any request through its operation.
    pub async fn run(&self, request: &AnalysisRequest<'_>) -> AnalysisResult {
        match *request {
            AnalysisRequest::Symptoms(q) => AnalysisResult::Symptoms(
                self.analyze_symptoms(q.symptoms, q.history_tags, q.profile)
                    .await,
            ),
            AnalysisRequest::Recommendations(q) => AnalysisResult::Recommendations(
                self.generate_recommendations(q.profile, q.health_snapshot, q.lifestyle)
                    .await,
            ),
            AnalysisRequest::Chat(q) => {
                AnalysisResult::Chat(self.chat(q.message, q.history, q.profile).await)
            }
            AnalysisRequest::HealthData(q) => AnalysisResult::HealthData(
                self.analyze_health_data(q.raw_payload, q.profile).await,
            ),
            AnalysisRequest::Emergency(q) => AnalysisResult::Emergency(
                self.emergency_guidance(q.emergency_type, q.profile).await,
            ),
        }
    }

    /// A random quote from the fixed list. No model call, no notification.
    pub fn daily_quote(&self) -> &'static str {
        quotes::daily_quote()
    }

    // ── Internals ─────────────────────────────────────────────────

    async fn run_structured<T, S, F>(
        &self,
        request: &AnalysisRequest<'_>,
        profile: &UserProfile,
        on_success: S,
        on_failure: F,
    ) -> T
    where
        T: StructuredResult,
        S: FnOnce(&T) -> Notice,
        F: FnOnce(&str) -> Notice,
    {
        let subject = profile.subject_id();
        let span = info_span!(
            "orchestrate",
            operation = T::VARIANT.as_str(),
            user_id = subject,
            call_id = %Uuid::new_v4(),
        );

        async move {
            trace!(state = ?CallState::BuildingPrompt);
            let prompt = prompt::render(request);

            match self.call_model(&prompt).await {
                Ok(raw) => {
                    trace!(state = ?CallState::Parsing);
                    let result = parse_structured::<T>(&raw);
                    trace!(state = ?CallState::Notifying);
                    self.notify(subject, EventType::completed(T::VARIANT), on_success(&result))
                        .await;
                    trace!(state = ?CallState::Done);
                    result
                }
                Err(e) => {
                    let error = e.to_string();
                    warn!(state = ?CallState::Error, "model call failed: {error}");
                    self.notify(subject, EventType::failed(T::VARIANT), on_failure(&error))
                        .await;
                    error_result(error)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn call_model(&self, prompt: &str) -> Result<String, ModelError> {
        trace!(state = ?CallState::AwaitingModel);
        debug!(
            "Calling model {} ({} chars)",
            self.model.name(),
            prompt.chars().count()
        );
        match tokio::time::timeout(self.model_timeout, self.model.generate(prompt)).await {
            Ok(result) => result,
            Err(_) => Err(ModelError::Timeout),
        }
    }

    async fn notify(&self, subject: &str, event_type: EventType, notice: Notice) {
        let event = NotificationEvent::new(subject, notice.message, event_type, notice.metadata);
        self.notifier.send(&event).await;
    }
}
