//! Request and result types shared by the prompt builder, the response
//! parser, and the orchestrator.
//!
//! Requests borrow their inputs from the caller: a request lives exactly as
//! long as one orchestration call. Results are owned by the call that
//! produced them and serialize to the documented key sets.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

// ── Conversation ───────────────────────────────────────────────────

/// Author of a conversation turn.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "User"),
            Role::Assistant => write!(f, "AI"),
        }
    }
}

/// One recorded message of a conversation. Ordered most-recent-last.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ConversationTurn {
    pub role: Role,
    pub text: String,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl ConversationTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }
}

// ── User context ───────────────────────────────────────────────────

/// The minimal user context an operation needs. Every field is optional;
/// absent values render as placeholders in prompts.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct UserProfile {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub medical_history: Vec<String>,
}

impl UserProfile {
    /// Subject id used for notifications. `"unknown"` when not set.
    pub fn subject_id(&self) -> &str {
        self.user_id.as_deref().unwrap_or("unknown")
    }
}

// ── Requests ───────────────────────────────────────────────────────

/// Operation kind. Selects the prompt template, the expected result shape,
/// and the notification event type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Variant {
    Symptoms,
    Recommendations,
    Chat,
    HealthData,
    Emergency,
}

impl Variant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Variant::Symptoms => "symptom_analysis",
            Variant::Recommendations => "health_recommendations",
            Variant::Chat => "ai_chat",
            Variant::HealthData => "health_data_analysis",
            Variant::Emergency => "emergency_alert",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SymptomQuery<'a> {
    pub symptoms: &'a str,
    pub history_tags: &'a [String],
    pub profile: &'a UserProfile,
}

#[derive(Debug, Clone, Copy)]
pub struct RecommendationQuery<'a> {
    pub profile: &'a UserProfile,
    pub health_snapshot: &'a Value,
    pub lifestyle: &'a Value,
}

#[derive(Debug, Clone, Copy)]
pub struct ChatQuery<'a> {
    pub message: &'a str,
    pub history: &'a [ConversationTurn],
    pub profile: &'a UserProfile,
}

#[derive(Debug, Clone, Copy)]
pub struct HealthDataQuery<'a> {
    pub raw_payload: &'a Value,
    pub profile: &'a UserProfile,
}

#[derive(Debug, Clone, Copy)]
pub struct EmergencyQuery<'a> {
    pub emergency_type: &'a str,
    pub profile: &'a UserProfile,
}

/// A typed request for one operation.
#[derive(Debug, Clone, Copy)]
pub enum AnalysisRequest<'a> {
    Symptoms(SymptomQuery<'a>),
    Recommendations(RecommendationQuery<'a>),
    Chat(ChatQuery<'a>),
    HealthData(HealthDataQuery<'a>),
    Emergency(EmergencyQuery<'a>),
}

impl AnalysisRequest<'_> {
    pub fn variant(&self) -> Variant {
        match self {
            AnalysisRequest::Symptoms(_) => Variant::Symptoms,
            AnalysisRequest::Recommendations(_) => Variant::Recommendations,
            AnalysisRequest::Chat(_) => Variant::Chat,
            AnalysisRequest::HealthData(_) => Variant::HealthData,
            AnalysisRequest::Emergency(_) => Variant::Emergency,
        }
    }
}

// ── Results ────────────────────────────────────────────────────────

/// A value the model reported for a documented key: typed when it has the
/// documented shape, the raw JSON otherwise. Serializes back to exactly the
/// decoded value.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(untagged)]
pub enum Reported<T> {
    Typed(T),
    Raw(Value),
}

impl<T> Reported<T> {
    pub fn typed(&self) -> Option<&T> {
        match self {
            Reported::Typed(value) => Some(value),
            Reported::Raw(_) => None,
        }
    }
}

impl<T> From<T> for Reported<T> {
    fn from(value: T) -> Self {
        Reported::Typed(value)
    }
}

/// A key that is present, even as `null`, decodes to `Some`.
fn present<'de, D, T>(deserializer: D) -> Result<Option<Reported<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Reported::<T>::deserialize(deserializer).map(Some)
}

/// Number of entries in a list field; zero when absent or not a list.
pub fn list_len(field: &Option<Reported<Vec<String>>>) -> usize {
    field
        .as_ref()
        .and_then(Reported::typed)
        .map_or(0, Vec::len)
}

fn error_of(extra: &Map<String, Value>) -> Option<&str> {
    extra.get("error").and_then(Value::as_str)
}

/// Triage urgency reported by a symptom analysis.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum UrgencyLevel {
    Low,
    #[default]
    Medium,
    High,
}

impl UrgencyLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            UrgencyLevel::Low => "low",
            UrgencyLevel::Medium => "medium",
            UrgencyLevel::High => "high",
        }
    }

    /// Case-insensitive match on `low`, `medium` or `high`.
    pub fn from_label(label: &str) -> Option<Self> {
        [UrgencyLevel::Low, UrgencyLevel::Medium, UrgencyLevel::High]
            .into_iter()
            .find(|level| level.as_str().eq_ignore_ascii_case(label.trim()))
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SymptomAnalysis {
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub possible_conditions: Option<Reported<Vec<String>>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub recommendations: Option<Reported<Vec<String>>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub urgency_level: Option<Reported<UrgencyLevel>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub suggested_tests: Option<Reported<Vec<String>>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub lifestyle_advice: Option<Reported<Vec<String>>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub warning_signs: Option<Reported<Vec<String>>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub when_to_seek_help: Option<Reported<String>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub confidence_level: Option<Reported<String>>,
    /// Keys outside the documented set, including `error`.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SymptomAnalysis {
    /// The reported urgency, when it names one of the three levels.
    pub fn urgency(&self) -> Option<UrgencyLevel> {
        match self.urgency_level.as_ref()? {
            Reported::Typed(level) => Some(*level),
            Reported::Raw(Value::String(label)) => UrgencyLevel::from_label(label),
            Reported::Raw(_) => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        error_of(&self.extra)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct HealthRecommendations {
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub dietary_suggestions: Option<Reported<Vec<String>>>,
    /// Nutrient name → status, e.g. `"vitamin_d": "low"`.
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub vitamins_minerals: Option<Reported<Map<String, Value>>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub exercise_recommendations: Option<Reported<Vec<String>>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub general_health_tips: Option<Reported<Vec<String>>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub foods_to_avoid: Option<Reported<Vec<String>>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub sleep_recommendations: Option<Reported<Vec<String>>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub stress_management: Option<Reported<Vec<String>>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub preventive_measures: Option<Reported<Vec<String>>>,
    /// Keys outside the documented set, including `error`.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl HealthRecommendations {
    /// Every nutrient named in `vitamins_minerals`, whatever its status.
    pub fn vitamins_analyzed(&self) -> Vec<String> {
        self.vitamins_minerals
            .as_ref()
            .and_then(Reported::typed)
            .map(|nutrients| nutrients.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn error(&self) -> Option<&str> {
        error_of(&self.extra)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct HealthDataAnalysis {
    /// Percentage string, e.g. `"70%"`.
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub overall_health_score: Option<Reported<String>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub trends: Option<Reported<Vec<String>>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub concerns: Option<Reported<Vec<String>>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub improvements: Option<Reported<Vec<String>>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub recommendations: Option<Reported<Vec<String>>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub risk_factors: Option<Reported<Vec<String>>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub positive_aspects: Option<Reported<Vec<String>>>,
    /// Keys outside the documented set, including `error`.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl HealthDataAnalysis {
    pub fn error(&self) -> Option<&str> {
        error_of(&self.extra)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct EmergencyGuidance {
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub immediate_actions: Option<Reported<Vec<String>>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub emergency_contacts: Option<Reported<Vec<String>>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub warning_signs: Option<Reported<Vec<String>>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub do_not_do: Option<Reported<Vec<String>>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub when_to_call_emergency: Option<Reported<String>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub preparation_steps: Option<Reported<Vec<String>>>,
    /// Keys outside the documented set, including `error`.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl EmergencyGuidance {
    pub fn error(&self) -> Option<&str> {
        error_of(&self.extra)
    }
}

/// The outcome of one operation, one case per variant.
///
/// Serialized untagged: each case produces exactly its own key set, so
/// clients see the same JSON objects regardless of the enum wrapper.
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(untagged)]
pub enum AnalysisResult {
    Symptoms(SymptomAnalysis),
    Recommendations(HealthRecommendations),
    Chat(String),
    HealthData(HealthDataAnalysis),
    Emergency(EmergencyGuidance),
}

impl AnalysisResult {
    pub fn variant(&self) -> Variant {
        match self {
            AnalysisResult::Symptoms(_) => Variant::Symptoms,
            AnalysisResult::Recommendations(_) => Variant::Recommendations,
            AnalysisResult::Chat(_) => Variant::Chat,
            AnalysisResult::HealthData(_) => Variant::HealthData,
            AnalysisResult::Emergency(_) => Variant::Emergency,
        }
    }
}
