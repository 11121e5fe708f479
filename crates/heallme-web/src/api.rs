//! REST endpoint handlers.
//!
//! Handlers validate input, resolve the caller, hand the request to the
//! [`Orchestrator`] and return whatever it produced. Orchestration results are
//! always well-formed, so the only error responses here come from
//! validation, authentication and storage.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use chrono::Utc;
use heallme::notify::{NotificationEvent, NotificationSink};
use heallme::orchestrator::CHAT_APOLOGY;
use heallme::types::{EmergencyGuidance, HealthDataAnalysis, HealthRecommendations, SymptomAnalysis};
use heallme::{ConversationTurn, Orchestrator};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::{AuthUser, Authenticator};
use crate::error::ApiError;
use crate::store::{HealthRecord, HealthRecordStore, HistoryStore, MemoryStore, UserRecord, UserStore};

/// Shared application state passed to all handlers via axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub notifier: Arc<dyn NotificationSink>,
    pub users: Arc<dyn UserStore>,
    pub records: Arc<dyn HealthRecordStore>,
    pub history: Arc<dyn HistoryStore>,
    pub auth: Arc<Authenticator>,
}

impl AppState {
    /// State backed by a fresh [`MemoryStore`]. Side-channel events go to the
    /// orchestrator's notifier.
    pub fn new(orchestrator: Orchestrator) -> Self {
        let store = Arc::new(MemoryStore::new());
        Self {
            notifier: orchestrator.notifier().clone(),
            orchestrator: Arc::new(orchestrator),
            users: store.clone(),
            records: store.clone(),
            history: store,
            auth: Arc::new(Authenticator::new()),
        }
    }

    pub fn with_authenticator(mut self, auth: Authenticator) -> Self {
        self.auth = Arc::new(auth);
        self
    }
}

/// GET /: Service banner.
pub async fn root() -> Json<Value> {
    Json(json!({"message": "HeaLLMe.ai API is running!"}))
}

// ── Accounts ──────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub medical_history: Vec<String>,
}

/// POST /auth/register: Create an account.
///
/// Returns 201 with the new user id, 400 if the email is taken or a required
/// field is blank.
pub async fn register(
    State(app): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let username = body.username.trim();
    let email = body.email.trim();
    if username.is_empty() || email.is_empty() || body.password.is_empty() {
        return Err(ApiError::bad_request(
            "Username, email and password are required",
        ));
    }
    if app.users.find_by_email(email)?.is_some() {
        return Err(ApiError::bad_request("Email already registered"));
    }

    let salt = Authenticator::new_salt();
    let password_hash = {
        let (auth, password, salt) = (app.auth.clone(), body.password.clone(), salt.clone());
        tokio::task::spawn_blocking(move || auth.hash_password(&password, &salt))
            .await
            .map_err(|e| ApiError::Internal(format!("password hashing task failed: {e}")))?
    };
    let user = UserRecord {
        id: Uuid::new_v4().to_string(),
        username: username.to_string(),
        email: email.to_string(),
        password_hash,
        salt,
        full_name: body.full_name,
        age: body.age,
        gender: body.gender,
        medical_history: body.medical_history,
        created_at: Utc::now(),
    };
    let user_id = user.id.clone();
    app.users.insert(user)?;
    info!("Registered user {user_id}");

    app.notifier
        .send(&NotificationEvent::user_registration(&user_id, email, username))
        .await;

    Ok((
        StatusCode::CREATED,
        Json(json!({"message": "User created successfully", "user_id": user_id})),
    ))
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    pub user_id: String,
    pub username: String,
    pub email: String,
}

/// POST /auth/login: Exchange credentials for a bearer token.
pub async fn login(
    State(app): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let rejected = || ApiError::unauthorized("Incorrect email or password");
    let user = app
        .users
        .find_by_email(body.email.trim())?
        .ok_or_else(rejected)?;

    let verified = {
        let auth = app.auth.clone();
        let (salt, stored) = (user.salt.clone(), user.password_hash.clone());
        tokio::task::spawn_blocking(move || auth.verify_password(&body.password, &salt, &stored))
            .await
            .map_err(|e| ApiError::Internal(format!("password check task failed: {e}")))?
    };
    if !verified {
        return Err(rejected());
    }

    let issued = app.auth.issue(&user.id);
    Ok(Json(LoginResponse {
        access_token: issued.token,
        token_type: "bearer",
        expires_in: issued.expires_in,
        user_id: user.id,
        username: user.username,
        email: user.email,
    }))
}

// ── Dashboard ─────────────────────────────────────────────────────

/// GET /dashboard/quote: Random health quote. No authentication.
pub async fn quote(State(app): State<AppState>) -> Json<Value> {
    Json(json!({"quote": app.orchestrator.daily_quote()}))
}

#[derive(Deserialize)]
pub struct SymptomsRequest {
    #[serde(default)]
    pub symptoms: String,
}

/// POST /dashboard/analyze-symptoms
pub async fn analyze_symptoms(
    State(app): State<AppState>,
    AuthUser(user): AuthUser,
    Json(body): Json<SymptomsRequest>,
) -> Result<Json<SymptomAnalysis>, ApiError> {
    let symptoms = body.symptoms.trim();
    if symptoms.is_empty() {
        return Err(ApiError::bad_request("Symptoms are required"));
    }
    let profile = user.profile();
    let result = app
        .orchestrator
        .analyze_symptoms(symptoms, &profile.medical_history, &profile)
        .await;
    Ok(Json(result))
}

fn empty_object() -> Value {
    json!({})
}

#[derive(Deserialize)]
pub struct RecommendationsRequest {
    #[serde(default = "empty_object")]
    pub health_data: Value,
    #[serde(default = "empty_object")]
    pub lifestyle: Value,
}

/// POST /dashboard/recommendations
pub async fn recommendations(
    State(app): State<AppState>,
    AuthUser(user): AuthUser,
    Json(body): Json<RecommendationsRequest>,
) -> Json<HealthRecommendations> {
    let profile = user.profile();
    let result = app
        .orchestrator
        .generate_recommendations(&profile, &body.health_data, &body.lifestyle)
        .await;
    Json(result)
}

/// POST /dashboard/analyze-health: Analyze an arbitrary JSON payload.
pub async fn analyze_health(
    State(app): State<AppState>,
    AuthUser(user): AuthUser,
    Json(payload): Json<Value>,
) -> Json<HealthDataAnalysis> {
    let profile = user.profile();
    Json(app.orchestrator.analyze_health_data(&payload, &profile).await)
}

#[derive(Deserialize)]
pub struct EmergencyRequest {
    #[serde(default)]
    pub emergency_type: String,
}

/// POST /dashboard/emergency
pub async fn emergency(
    State(app): State<AppState>,
    AuthUser(user): AuthUser,
    Json(body): Json<EmergencyRequest>,
) -> Result<Json<EmergencyGuidance>, ApiError> {
    let emergency_type = body.emergency_type.trim();
    if emergency_type.is_empty() {
        return Err(ApiError::bad_request("Emergency type is required"));
    }
    let profile = user.profile();
    Ok(Json(
        app.orchestrator
            .emergency_guidance(emergency_type, &profile)
            .await,
    ))
}

// ── Chat ──────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
    /// Explicit history. When absent the stored conversation is used.
    #[serde(default)]
    pub chat_history: Option<Vec<ConversationTurn>>,
}

#[derive(Serialize)]
pub struct ChatResponse {
    pub user_message: String,
    pub ai_response: String,
}

/// POST /chat/ask
///
/// The exchange is appended to the caller's stored conversation whether or
/// not an explicit history was supplied. A failed model call is not
/// recorded.
pub async fn chat(
    State(app): State<AppState>,
    AuthUser(user): AuthUser,
    Json(body): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    if body.message.trim().is_empty() {
        return Err(ApiError::bad_request("Message is required"));
    }
    let history = match body.chat_history {
        Some(history) => history,
        None => app.history.history(&user.id)?,
    };
    let profile = user.profile();
    let reply = app.orchestrator.chat(&body.message, &history, &profile).await;

    if reply.starts_with(CHAT_APOLOGY) {
        warn!("Chat reply for {} is an apology, not recording exchange", user.id);
    } else {
        app.history.append(
            &user.id,
            &[
                ConversationTurn::user(body.message.clone()),
                ConversationTurn::assistant(reply.clone()),
            ],
        )?;
    }

    Ok(Json(ChatResponse {
        user_message: body.message,
        ai_response: reply,
    }))
}

// ── Health records ────────────────────────────────────────────────

/// POST /health-data: Store a measurement payload.
pub async fn create_health_record(
    State(app): State<AppState>,
    AuthUser(user): AuthUser,
    Json(payload): Json<Value>,
) -> Result<(StatusCode, Json<HealthRecord>), ApiError> {
    if !payload.is_object() {
        return Err(ApiError::bad_request("Health data must be a JSON object"));
    }
    let data_type = payload
        .get("data_type")
        .and_then(Value::as_str)
        .unwrap_or("health_data")
        .to_string();
    let value = payload.get("value").cloned().unwrap_or_else(|| payload.clone());

    let record = HealthRecord {
        id: Uuid::new_v4().to_string(),
        user_id: user.id.clone(),
        recorded_at: Utc::now(),
        data: payload,
    };
    app.records.insert_record(record.clone())?;

    app.notifier
        .send(&NotificationEvent::health_data_update(
            &user.id, &data_type, value,
        ))
        .await;

    Ok((StatusCode::CREATED, Json(record)))
}

/// GET /health-data: The caller's records, newest last.
pub async fn list_health_records(
    State(app): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<Vec<HealthRecord>>, ApiError> {
    Ok(Json(app.records.records_for(&user.id)?))
}
