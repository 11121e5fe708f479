//! Best-effort event delivery to an external automation webhook.
//!
//! A [`NotificationSink`] never reports failure to its caller: a missing
//! endpoint is a logged no-op, and non-200 responses or transport errors are
//! logged and swallowed. Delivery is still awaited in order, so a caller
//! that sends an event and then returns observes a deterministic sequence.

use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value, json};
use tracing::{debug, info, warn};

use crate::config::NotifyConfig;
use crate::types::Variant;

/// Boxed future returned by [`NotificationSink`] methods.
pub type NotifyFuture<'a> = Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

// ── Events ─────────────────────────────────────────────────────────

/// Kind of event, serialized as its snake_case name.
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    SymptomAnalysis,
    SymptomAnalysisError,
    HealthRecommendations,
    HealthRecommendationsError,
    AiChat,
    AiChatError,
    HealthDataAnalysis,
    HealthDataAnalysisError,
    EmergencyAlert,
    EmergencyAlertError,
    UserRegistration,
    HealthDataUpdate,
}

impl EventType {
    /// Event emitted when an operation completes.
    pub fn completed(variant: Variant) -> Self {
        match variant {
            Variant::Symptoms => EventType::SymptomAnalysis,
            Variant::Recommendations => EventType::HealthRecommendations,
            Variant::Chat => EventType::AiChat,
            Variant::HealthData => EventType::HealthDataAnalysis,
            Variant::Emergency => EventType::EmergencyAlert,
        }
    }

    /// Event emitted when the model call of an operation fails.
    pub fn failed(variant: Variant) -> Self {
        match variant {
            Variant::Symptoms => EventType::SymptomAnalysisError,
            Variant::Recommendations => EventType::HealthRecommendationsError,
            Variant::Chat => EventType::AiChatError,
            Variant::HealthData => EventType::HealthDataAnalysisError,
            Variant::Emergency => EventType::EmergencyAlertError,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::SymptomAnalysis => "symptom_analysis",
            EventType::SymptomAnalysisError => "symptom_analysis_error",
            EventType::HealthRecommendations => "health_recommendations",
            EventType::HealthRecommendationsError => "health_recommendations_error",
            EventType::AiChat => "ai_chat",
            EventType::AiChatError => "ai_chat_error",
            EventType::HealthDataAnalysis => "health_data_analysis",
            EventType::HealthDataAnalysisError => "health_data_analysis_error",
            EventType::EmergencyAlert => "emergency_alert",
            EventType::EmergencyAlertError => "emergency_alert_error",
            EventType::UserRegistration => "user_registration",
            EventType::HealthDataUpdate => "health_data_update",
        }
    }
}

/// One structured event. Serializes to the webhook wire format.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct NotificationEvent {
    #[serde(rename = "user_id")]
    pub subject_id: String,
    #[serde(rename = "message")]
    pub human_message: String,
    pub event_type: EventType,
    pub timestamp: DateTime<Utc>,
    pub metadata: Map<String, Value>,
}

impl NotificationEvent {
    pub fn new(
        subject_id: impl Into<String>,
        human_message: impl Into<String>,
        event_type: EventType,
        metadata: Map<String, Value>,
    ) -> Self {
        Self {
            subject_id: subject_id.into(),
            human_message: human_message.into(),
            event_type,
            timestamp: Utc::now(),
            metadata,
        }
    }

    pub fn user_registration(user_id: &str, email: &str, username: &str) -> Self {
        Self::new(
            user_id,
            format!("New user registered: {username} ({email})"),
            EventType::UserRegistration,
            object(json!({
                "email": email,
                "username": username,
                "registration_date": Utc::now(),
            })),
        )
    }

    pub fn health_data_update(user_id: &str, data_type: &str, value: Value) -> Self {
        Self::new(
            user_id,
            format!("Health data updated: {data_type} = {value}"),
            EventType::HealthDataUpdate,
            object(json!({
                "data_type": data_type,
                "value": value,
                "timestamp": Utc::now(),
            })),
        )
    }
}

/// Unwrap a `json!({...})` literal into its map. Non-objects become empty.
pub(crate) fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Wire body for [`NotificationSink::send_batch`].
#[derive(Serialize, Debug)]
pub struct BatchPayload<'a> {
    pub events: &'a [NotificationEvent],
    pub batch_timestamp: DateTime<Utc>,
    pub total_events: usize,
}

// ── Sinks ──────────────────────────────────────────────────────────

/// Destination for notification events.
///
/// Implementations must swallow every failure: the returned future always
/// completes with `()`.
pub trait NotificationSink: Send + Sync {
    fn send<'a>(&'a self, event: &'a NotificationEvent) -> NotifyFuture<'a>;

    /// Deliver several events as a single payload.
    fn send_batch<'a>(&'a self, events: &'a [NotificationEvent]) -> NotifyFuture<'a>;
}

/// A sink that drops every event.
pub struct NoopNotifier;

impl NotificationSink for NoopNotifier {
    fn send<'a>(&'a self, _event: &'a NotificationEvent) -> NotifyFuture<'a> {
        Box::pin(async {})
    }

    fn send_batch<'a>(&'a self, _events: &'a [NotificationEvent]) -> NotifyFuture<'a> {
        Box::pin(async {})
    }
}

/// POSTs events as JSON to a configured webhook.
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: Option<String>,
    timeout: Duration,
}

impl WebhookNotifier {
    /// Build a notifier on a shared HTTP client.
    pub fn new(client: reqwest::Client, config: &NotifyConfig) -> Self {
        if config.webhook_url.is_none() {
            info!("Notification webhook not configured; events will be dropped");
        }
        Self {
            client,
            url: config.webhook_url.clone(),
            timeout: config.timeout,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.url.is_some()
    }

    async fn post<T: Serialize + ?Sized>(&self, body: &T, label: &str) {
        let Some(url) = self.url.as_deref() else {
            debug!("Notification webhook not configured, skipping {label}");
            return;
        };

        let result = self
            .client
            .post(url)
            .timeout(self.timeout)
            .json(body)
            .send()
            .await;

        match result {
            Ok(resp) if resp.status() == reqwest::StatusCode::OK => {
                info!("Sent to webhook: {} - {label}", resp.status().as_u16());
            }
            Ok(resp) => {
                warn!(
                    "Notification webhook returned status {} for {label}",
                    resp.status().as_u16()
                );
            }
            Err(e) => {
                warn!("Failed to send {label} to notification webhook: {e}");
            }
        }
    }
}

impl NotificationSink for WebhookNotifier {
    fn send<'a>(&'a self, event: &'a NotificationEvent) -> NotifyFuture<'a> {
        Box::pin(async move { self.post(event, event.event_type.as_str()).await })
    }

    fn send_batch<'a>(&'a self, events: &'a [NotificationEvent]) -> NotifyFuture<'a> {
        Box::pin(async move {
            let payload = BatchPayload {
                events,
                batch_timestamp: Utc::now(),
                total_events: events.len(),
            };
            let label = format!("batch of {} events", events.len());
            self.post(&payload, &label).await;
        })
    }
}

/// A sink that keeps every event in memory. Useful as a test double and for
/// inspecting what an operation would have sent.
#[derive(Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<NotificationEvent>>,
    batches: Mutex<Vec<Vec<NotificationEvent>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<NotificationEvent> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn batches(&self) -> Vec<Vec<NotificationEvent>> {
        self.batches
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl NotificationSink for RecordingNotifier {
    fn send<'a>(&'a self, event: &'a NotificationEvent) -> NotifyFuture<'a> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event.clone());
        Box::pin(async {})
    }

    fn send_batch<'a>(&'a self, events: &'a [NotificationEvent]) -> NotifyFuture<'a> {
        self.batches
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(events.to_vec());
        Box::pin(async {})
    }
}
