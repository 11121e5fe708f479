//! Integration tests for the heallme-web server.
//!
//! These tests start a real axum server on a random port, backed by a
//! scripted model and a recording notifier, and drive it with reqwest.

use std::sync::Arc;

use heallme::Orchestrator;
use heallme::ModelError;
use heallme::model::ScriptedModel;
use heallme::notify::{EventType, RecordingNotifier};
use heallme_web::{AppState, Authenticator, WebConfig, spawn_web};
use serde_json::{Value, json};

struct TestServer {
    base: String,
    client: reqwest::Client,
    model: Arc<ScriptedModel>,
    sink: Arc<RecordingNotifier>,
}

/// Password hashing work factor for test servers.
const TEST_ITERATIONS: u32 = 1_000;

/// Helper: spawn a test server on port 0 (random available port).
async fn spawn_test_server(model: ScriptedModel) -> TestServer {
    spawn_configured(model, |state| {
        state.with_authenticator(Authenticator::new().with_iterations(TEST_ITERATIONS))
    })
    .await
}

async fn spawn_configured(
    model: ScriptedModel,
    configure: impl FnOnce(AppState) -> AppState,
) -> TestServer {
    let model = Arc::new(model);
    let sink = Arc::new(RecordingNotifier::new());
    let orchestrator = Orchestrator::with_parts(model.clone(), sink.clone());

    let config = WebConfig {
        bind_addr: ([127, 0, 0, 1], 0).into(),
    };
    let state = configure(AppState::new(orchestrator));
    let addr = spawn_web(state, config).await.unwrap();
    TestServer {
        base: format!("http://{addr}"),
        client: reqwest::Client::new(),
        model,
        sink,
    }
}

impl TestServer {
    async fn register(&self, email: &str, password: &str) -> reqwest::Response {
        self.client
            .post(format!("{}/auth/register", self.base))
            .json(&json!({
                "username": "alice",
                "email": email,
                "password": password,
                "age": 45,
                "gender": "female",
                "medical_history": ["hypertension"],
            }))
            .send()
            .await
            .unwrap()
    }

    /// Register and log in; returns the bearer token.
    async fn login_as(&self, email: &str) -> String {
        self.register(email, "hunter2").await;
        let resp = self
            .client
            .post(format!("{}/auth/login", self.base))
            .json(&json!({"email": email, "password": "hunter2"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        body["access_token"].as_str().unwrap().to_string()
    }

    async fn post_authed(&self, path: &str, token: &str, body: Value) -> reqwest::Response {
        self.client
            .post(format!("{}{path}", self.base))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .unwrap()
    }
}

// ── Accounts ─────────────────────────────────────────────────────────

#[tokio::test]
async fn root_returns_banner() {
    let server = spawn_test_server(ScriptedModel::new()).await;
    let body: Value = reqwest::get(&server.base)
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["message"], "HeaLLMe.ai API is running!");
}

#[tokio::test]
async fn register_creates_user_and_notifies() {
    let server = spawn_test_server(ScriptedModel::new()).await;
    let resp = server.register("alice@example.com", "hunter2").await;
    assert_eq!(resp.status(), 201);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "User created successfully");
    let user_id = body["user_id"].as_str().unwrap();

    let events = server.sink.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, EventType::UserRegistration);
    assert_eq!(events[0].subject_id, user_id);
}

#[tokio::test]
async fn duplicate_email_is_rejected() {
    let server = spawn_test_server(ScriptedModel::new()).await;
    server.register("alice@example.com", "hunter2").await;
    let resp = server.register("alice@example.com", "other").await;
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["message"], "Email already registered");
}

#[tokio::test]
async fn login_returns_bearer_token() {
    let server = spawn_test_server(ScriptedModel::new()).await;
    server.register("alice@example.com", "hunter2").await;
    let resp = server
        .client
        .post(format!("{}/auth/login", server.base))
        .json(&json!({"email": "alice@example.com", "password": "hunter2"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["token_type"], "bearer");
    assert_eq!(body["expires_in"], 1800);
    assert_eq!(body["username"], "alice");
    assert_eq!(body["email"], "alice@example.com");
    assert!(body["access_token"].as_str().is_some_and(|t| !t.is_empty()));
}

#[tokio::test]
async fn wrong_password_is_401() {
    let server = spawn_test_server(ScriptedModel::new()).await;
    server.register("alice@example.com", "hunter2").await;
    let resp = server
        .client
        .post(format!("{}/auth/login", server.base))
        .json(&json!({"email": "alice@example.com", "password": "nope"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}

// ── Dashboard ────────────────────────────────────────────────────────

#[tokio::test]
async fn quote_needs_no_auth_or_model() {
    let server = spawn_test_server(ScriptedModel::new()).await;
    let resp = reqwest::get(format!("{}/dashboard/quote", server.base))
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert!(
        heallme::quotes::HEALTH_QUOTES.contains(&body["quote"].as_str().unwrap())
    );
    assert!(server.model.prompts().is_empty());
}

#[tokio::test]
async fn protected_routes_reject_missing_or_bad_tokens() {
    let server = spawn_test_server(ScriptedModel::new()).await;
    let resp = server
        .client
        .post(format!("{}/dashboard/analyze-symptoms", server.base))
        .json(&json!({"symptoms": "cough"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let resp = server
        .post_authed("/chat/ask", "made-up-token", json!({"message": "hi"}))
        .await;
    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
    assert!(server.model.prompts().is_empty());
}

#[tokio::test]
async fn malformed_model_output_yields_symptom_fallback() {
    let server = spawn_test_server(ScriptedModel::replying("I think you are fine.")).await;
    let token = server.login_as("alice@example.com").await;

    let resp = server
        .post_authed(
            "/dashboard/analyze-symptoms",
            &token,
            json!({"symptoms": "persistent headache, blurred vision"}),
        )
        .await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["urgency_level"], "medium");
    assert_eq!(body["confidence_level"], "60%");
    assert_eq!(
        body["possible_conditions"],
        json!(["Consult a healthcare professional"])
    );
    assert!(body.get("error").is_none());

    let prompt = &server.model.prompts()[0];
    assert!(prompt.contains("persistent headache, blurred vision"));
    assert!(prompt.contains("Age: 45"));
    assert!(prompt.contains("hypertension"));

    let last = server.sink.events().pop().unwrap();
    assert_eq!(last.event_type, EventType::SymptomAnalysis);
}

#[tokio::test]
async fn empty_symptoms_are_rejected() {
    let server = spawn_test_server(ScriptedModel::replying("{}")).await;
    let token = server.login_as("alice@example.com").await;
    let resp = server
        .post_authed("/dashboard/analyze-symptoms", &token, json!({"symptoms": "  "}))
        .await;
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["message"], "Symptoms are required");
    assert!(server.model.prompts().is_empty());
}

#[tokio::test]
async fn valid_recommendations_pass_through() {
    let reply = r#"```json
{"dietary_suggestions":["More leafy greens"],"vitamins_minerals":{"vitamin_d":"low"},
 "exercise_recommendations":["Walk daily"],"general_health_tips":[],"foods_to_avoid":[],
 "sleep_recommendations":[],"stress_management":[],"preventive_measures":[],"hydration":"2L"}
```"#;
    let server = spawn_test_server(ScriptedModel::replying(reply)).await;
    let token = server.login_as("alice@example.com").await;
    let resp = server
        .post_authed(
            "/dashboard/recommendations",
            &token,
            json!({"health_data": {"sleep_hours": 6}}),
        )
        .await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["dietary_suggestions"], json!(["More leafy greens"]));
    assert_eq!(body["vitamins_minerals"]["vitamin_d"], "low");
    assert_eq!(body["hydration"], "2L");
    assert!(server.model.prompts()[0].contains(r#"{"sleep_hours":6}"#));
}

#[tokio::test]
async fn analyze_health_and_emergency_return_fallbacks_on_prose() {
    let server = spawn_test_server(ScriptedModel::replying("prose")).await;
    let token = server.login_as("alice@example.com").await;

    let body: Value = server
        .post_authed("/dashboard/analyze-health", &token, json!({"heart_rate": 72}))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body["overall_health_score"], "70%");

    let body: Value = server
        .post_authed(
            "/dashboard/emergency",
            &token,
            json!({"emergency_type": "chest pain"}),
        )
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body["emergency_contacts"], json!(["911", "Local emergency services"]));

    let last = server.sink.events().pop().unwrap();
    assert_eq!(last.event_type, EventType::EmergencyAlert);
    assert_eq!(last.human_message, "EMERGENCY: chest pain");
}

// ── Chat ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn chat_uses_and_extends_stored_history() {
    let model = ScriptedModel::replying("first answer").then_reply("second answer");
    let server = spawn_test_server(model).await;
    let token = server.login_as("alice@example.com").await;

    let body: Value = server
        .post_authed("/chat/ask", &token, json!({"message": "first question"}))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body["user_message"], "first question");
    assert_eq!(body["ai_response"], "first answer");

    let body: Value = server
        .post_authed("/chat/ask", &token, json!({"message": "second question"}))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body["ai_response"], "second answer");

    let prompts = server.model.prompts();
    assert!(prompts[0].contains("Previous messages:\nNone"));
    assert!(prompts[1].contains("User: first question\nAI: first answer"));
}

#[tokio::test]
async fn explicit_chat_history_overrides_stored_history() {
    let server = spawn_test_server(ScriptedModel::replying("ok")).await;
    let token = server.login_as("alice@example.com").await;
    server
        .post_authed("/chat/ask", &token, json!({"message": "stored turn"}))
        .await;

    server
        .post_authed(
            "/chat/ask",
            &token,
            json!({
                "message": "now",
                "chat_history": [{"role": "user", "text": "supplied turn"}],
            }),
        )
        .await;

    let prompt = &server.model.prompts()[1];
    assert!(prompt.contains("User: supplied turn"));
    assert!(!prompt.contains("stored turn"));
}

#[tokio::test]
async fn failed_chat_is_not_recorded_in_history() {
    let model = ScriptedModel::failing(ModelError::Status {
        status: 502,
        body: "upstream gateway detail".into(),
    })
    .then_reply("Try resting.");
    let server = spawn_test_server(model).await;
    let token = server.login_as("alice@example.com").await;

    let body: Value = server
        .post_authed("/chat/ask", &token, json!({"message": "my head hurts"}))
        .await
        .json()
        .await
        .unwrap();
    assert!(
        body["ai_response"]
            .as_str()
            .unwrap()
            .starts_with(heallme::orchestrator::CHAT_APOLOGY)
    );

    server
        .post_authed("/chat/ask", &token, json!({"message": "still hurts"}))
        .await;
    let prompt = &server.model.prompts()[1];
    assert!(prompt.contains("Previous messages:\nNone"));
    assert!(!prompt.contains("upstream gateway detail"));
}

// ── Health records ───────────────────────────────────────────────────

#[tokio::test]
async fn health_records_are_stored_per_user() {
    let server = spawn_test_server(ScriptedModel::new()).await;
    let alice = server.login_as("alice@example.com").await;
    let bob = server.login_as("bob@example.com").await;

    let resp = server
        .post_authed(
            "/health-data",
            &alice,
            json!({"data_type": "weight", "value": 70}),
        )
        .await;
    assert_eq!(resp.status(), 201);
    let record: Value = resp.json().await.unwrap();
    assert!(record["id"].is_string());
    assert!(record["recorded_at"].is_string());
    assert_eq!(record["data"]["value"], 70);

    let last = server.sink.events().pop().unwrap();
    assert_eq!(last.event_type, EventType::HealthDataUpdate);
    assert_eq!(last.metadata["data_type"], "weight");

    let list = |token: String| {
        let server = &server;
        async move {
            server
                .client
                .get(format!("{}/health-data", server.base))
                .bearer_auth(token)
                .send()
                .await
                .unwrap()
                .json::<Vec<Value>>()
                .await
                .unwrap()
        }
    };
    assert_eq!(list(alice).await.len(), 1);
    assert!(list(bob).await.is_empty());
}

#[tokio::test]
async fn non_object_health_data_is_rejected() {
    let server = spawn_test_server(ScriptedModel::new()).await;
    let token = server.login_as("alice@example.com").await;
    let resp = server.post_authed("/health-data", &token, json!([1, 2, 3])).await;
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn expired_token_is_401() {
    let server = spawn_configured(ScriptedModel::new(), |state| {
        state.with_authenticator(
            Authenticator::new()
                .with_iterations(TEST_ITERATIONS)
                .with_ttl(chrono::Duration::zero()),
        )
    })
    .await;

    let token = server.login_as("alice@example.com").await;
    let resp = server
        .post_authed("/chat/ask", &token, json!({"message": "hi"}))
        .await;
    assert_eq!(resp.status(), 401);
    assert!(server.model.prompts().is_empty());
}
