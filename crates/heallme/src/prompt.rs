//! Prompt rendering for each operation.
//!
//! Every renderer is a pure function of its request: a fixed persona
//! preamble, the user-supplied fields (absent ones replaced by a literal
//! placeholder so the prompt layout never changes), and for the structured
//! variants an explicit JSON skeleton listing the keys the model must emit.
//! The chat prompt asks for plain prose instead.

use serde_json::Value;

use crate::types::{
    AnalysisRequest, ChatQuery, ConversationTurn, EmergencyQuery, HealthDataQuery,
    RecommendationQuery, SymptomQuery, UserProfile,
};

/// Number of most recent turns included in a chat prompt.
pub const CHAT_HISTORY_WINDOW: usize = 5;

/// Placeholder for absent scalar profile fields.
pub const NOT_SPECIFIED: &str = "Not specified";
/// Placeholder for absent list-like fields.
pub const NONE: &str = "None";

const SYMPTOM_PERSONA: &str = "You are HealLLMe.ai, a medical AI assistant. Analyze the following symptoms and provide comprehensive guidance.";

const RECOMMENDATION_PERSONA: &str =
    "Generate personalized health recommendations for a user with the following profile:";

const CHAT_PERSONA: &str = "You are HealLLMe.ai, a friendly and empathetic medical AI assistant. You provide health guidance, support, and education.";

const HEALTH_DATA_PERSONA: &str = "Analyze the following health data and provide insights:";

const EMERGENCY_PERSONA: &str = "You are HealLLMe.ai, a medical AI assistant giving calm, practical emergency guidance.";

const SYMPTOM_SCHEMA: &str = r#"{
    "possible_conditions": ["condition1", "condition2"],
    "recommendations": ["immediate action 1", "immediate action 2"],
    "urgency_level": "low/medium/high",
    "suggested_tests": ["test1", "test2"],
    "lifestyle_advice": ["advice1", "advice2"],
    "warning_signs": ["sign1", "sign2"],
    "when_to_seek_help": "specific guidance",
    "confidence_level": "percentage"
}"#;

const RECOMMENDATION_SCHEMA: &str = r#"{
    "dietary_suggestions": ["food1", "food2"],
    "vitamins_minerals": {
        "vitamin_d": "status (low/normal/high)",
        "iron": "status",
        "calcium": "status",
        "vitamin_b12": "status"
    },
    "exercise_recommendations": ["exercise1", "exercise2"],
    "general_health_tips": ["tip1", "tip2"],
    "foods_to_avoid": ["food1", "food2"],
    "sleep_recommendations": ["recommendation1"],
    "stress_management": ["technique1", "technique2"],
    "preventive_measures": ["measure1", "measure2"]
}"#;

const HEALTH_DATA_SCHEMA: &str = r#"{
    "overall_health_score": "percentage",
    "trends": ["trend1", "trend2"],
    "concerns": ["concern1", "concern2"],
    "improvements": ["improvement1", "improvement2"],
    "recommendations": ["recommendation1", "recommendation2"],
    "risk_factors": ["risk1", "risk2"],
    "positive_aspects": ["positive1", "positive2"]
}"#;

const EMERGENCY_SCHEMA: &str = r#"{
    "immediate_actions": ["action1", "action2"],
    "emergency_contacts": ["contact1", "contact2"],
    "warning_signs": ["sign1", "sign2"],
    "do_not_do": ["action1", "action2"],
    "when_to_call_emergency": "specific guidance",
    "preparation_steps": ["step1", "step2"]
}"#;

const CHAT_GUIDELINES: &str = "\
RESPONSE GUIDELINES:
1. Be empathetic and supportive
2. Provide evidence-based health information
3. Always recommend consulting healthcare professionals for serious concerns
4. Use simple, understandable language
5. Include practical tips and actionable advice
6. Maintain a warm, caring tone

Respond naturally and helpfully to the user's health-related question or concern in plain text.";

/// Render the prompt for any request.
pub fn render(request: &AnalysisRequest<'_>) -> String {
    match request {
        AnalysisRequest::Symptoms(q) => symptom_prompt(q),
        AnalysisRequest::Recommendations(q) => recommendation_prompt(q),
        AnalysisRequest::Chat(q) => chat_prompt(q),
        AnalysisRequest::HealthData(q) => health_data_prompt(q),
        AnalysisRequest::Emergency(q) => emergency_prompt(q),
    }
}

pub fn symptom_prompt(q: &SymptomQuery<'_>) -> String {
    format!(
        "{SYMPTOM_PERSONA}\n\n\
         PATIENT INFORMATION:\n\
         Symptoms: {symptoms}\n\
         Medical History: {history}\n\
         Age: {age}\n\
         Gender: {gender}\n\n\
         Please provide a detailed analysis in the following JSON format:\n\
         {SYMPTOM_SCHEMA}\n\n\
         IMPORTANT: This is for guidance only, not medical diagnosis. Always recommend consulting healthcare professionals for serious symptoms.",
        symptoms = q.symptoms,
        history = join_or_none(q.history_tags),
        age = age_of(q.profile),
        gender = gender_of(q.profile),
    )
}

pub fn recommendation_prompt(q: &RecommendationQuery<'_>) -> String {
    format!(
        "{RECOMMENDATION_PERSONA}\n\n\
         USER PROFILE:\n\
         Age: {age}\n\
         Gender: {gender}\n\
         Medical History: {history}\n\
         Current Health Data: {health}\n\
         Lifestyle: {lifestyle}\n\n\
         Provide comprehensive recommendations in JSON format:\n\
         {RECOMMENDATION_SCHEMA}",
        age = age_of(q.profile),
        gender = gender_of(q.profile),
        history = join_or_none(&q.profile.medical_history),
        health = render_json(q.health_snapshot, false),
        lifestyle = render_json(q.lifestyle, false),
    )
}

pub fn chat_prompt(q: &ChatQuery<'_>) -> String {
    format!(
        "{CHAT_PERSONA}\n\n\
         CONVERSATION CONTEXT:\n\
         Previous messages:\n{history}\n\n\
         CURRENT MESSAGE: {message}\n\n\
         {CHAT_GUIDELINES}",
        history = render_history(q.history),
        message = q.message,
    )
}

pub fn health_data_prompt(q: &HealthDataQuery<'_>) -> String {
    format!(
        "{HEALTH_DATA_PERSONA}\n\n\
         USER DATA:\n\
         Age: {age}\n\
         Gender: {gender}\n\
         Medical History: {history}\n\n\
         HEALTH DATA:\n\
         {data}\n\n\
         Provide analysis in JSON format:\n\
         {HEALTH_DATA_SCHEMA}",
        age = age_of(q.profile),
        gender = gender_of(q.profile),
        history = join_or_none(&q.profile.medical_history),
        data = render_json(q.raw_payload, true),
    )
}

pub fn emergency_prompt(q: &EmergencyQuery<'_>) -> String {
    format!(
        "{EMERGENCY_PERSONA}\n\n\
         Emergency situation: {kind}\n\n\
         User Information:\n\
         Age: {age}\n\
         Medical History: {history}\n\n\
         Provide emergency guidance in JSON format:\n\
         {EMERGENCY_SCHEMA}",
        kind = q.emergency_type,
        age = age_of(q.profile),
        history = join_or_none(&q.profile.medical_history),
    )
}

/// The tail of `history` that fits in the chat context window.
pub fn recent_turns(history: &[ConversationTurn]) -> &[ConversationTurn] {
    let start = history.len().saturating_sub(CHAT_HISTORY_WINDOW);
    &history[start..]
}

fn render_history(history: &[ConversationTurn]) -> String {
    let recent = recent_turns(history);
    if recent.is_empty() {
        return NONE.to_string();
    }
    recent
        .iter()
        .map(|turn| format!("{}: {}", turn.role, turn.text))
        .collect::<Vec<_>>()
        .join("\n")
}

fn age_of(profile: &UserProfile) -> String {
    profile
        .age
        .map_or_else(|| NOT_SPECIFIED.to_string(), |a| a.to_string())
}

fn gender_of(profile: &UserProfile) -> &str {
    profile
        .gender
        .as_deref()
        .filter(|g| !g.trim().is_empty())
        .unwrap_or(NOT_SPECIFIED)
}

fn join_or_none(items: &[String]) -> String {
    if items.is_empty() {
        NONE.to_string()
    } else {
        items.join(", ")
    }
}

fn render_json(value: &Value, pretty: bool) -> String {
    if value.is_null() {
        return NONE.to_string();
    }
    let rendered = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    rendered.unwrap_or_else(|_| NONE.to_string())
}
