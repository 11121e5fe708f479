//! Password hashing, bearer tokens, and the authenticated-user extractor.

use std::collections::HashMap;
use std::sync::Mutex;

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use chrono::{DateTime, Duration, Utc};
use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::debug;
use uuid::Uuid;

use crate::api::AppState;
use crate::error::ApiError;
use crate::store::UserRecord;

/// Lifetime of an issued access token.
pub const TOKEN_TTL_MINUTES: i64 = 30;
pub const PBKDF2_ITERATIONS: u32 = 600_000;
const HASH_LENGTH: usize = 32;

/// A freshly issued bearer token.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    /// Seconds until expiry.
    pub expires_in: i64,
}

struct Session {
    user_id: String,
    expires_at: DateTime<Utc>,
}

/// Hashes credentials and tracks live bearer tokens.
pub struct Authenticator {
    ttl: Duration,
    iterations: u32,
    sessions: Mutex<HashMap<String, Session>>,
}

impl Default for Authenticator {
    fn default() -> Self {
        Self::new()
    }
}

impl Authenticator {
    pub fn new() -> Self {
        Self {
            ttl: Duration::minutes(TOKEN_TTL_MINUTES),
            iterations: PBKDF2_ITERATIONS,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// A new random salt for one account.
    pub fn new_salt() -> String {
        Uuid::new_v4().simple().to_string()
    }

    /// PBKDF2 work factor for newly hashed passwords. Existing hashes keep
    /// the count they were created with.
    pub fn with_iterations(mut self, iterations: u32) -> Self {
        self.iterations = iterations.max(1);
        self
    }

    /// PBKDF2-HMAC-SHA256 of the password, stored as `<iterations>$<hex>`.
    pub fn hash_password(&self, password: &str, salt: &str) -> String {
        format!(
            "{}${}",
            self.iterations,
            derive(password, salt, self.iterations)
        )
    }

    /// Constant-time check of `password` against a stored hash.
    pub fn verify_password(&self, password: &str, salt: &str, stored: &str) -> bool {
        let Some((iterations, expected)) = stored
            .split_once('$')
            .and_then(|(n, hex)| Some((n.parse::<u32>().ok().filter(|n| *n > 0)?, hex)))
        else {
            return false;
        };
        let derived = derive(password, salt, iterations);
        derived.as_bytes().ct_eq(expected.as_bytes()).into()
    }

    /// Issue a token for `user_id`, valid for the configured TTL.
    pub fn issue(&self, user_id: &str) -> IssuedToken {
        let token = Uuid::new_v4().to_string();
        let now = Utc::now();
        let session = Session {
            user_id: user_id.to_string(),
            expires_at: now + self.ttl,
        };
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        sessions.retain(|_, s| s.expires_at > now);
        sessions.insert(token.clone(), session);
        IssuedToken {
            token,
            expires_in: self.ttl.num_seconds(),
        }
    }

    /// The user a live token belongs to. Expired tokens are dropped.
    pub fn resolve(&self, token: &str) -> Option<String> {
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        let session = sessions.get(token)?;
        if Utc::now() >= session.expires_at {
            debug!("Rejecting expired token");
            sessions.remove(token);
            return None;
        }
        Some(session.user_id.clone())
    }

    /// Number of tracked sessions, expired ones included until swept.
    pub fn session_count(&self) -> usize {
        self.sessions.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

fn derive(password: &str, salt: &str, iterations: u32) -> String {
    let mut key = [0u8; HASH_LENGTH];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt.as_bytes(), iterations, &mut key);
    key.iter().map(|b| format!("{b:02x}")).collect()
}

/// The account behind a valid `Authorization: Bearer <token>` header.
pub struct AuthUser(pub UserRecord);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or_else(|| ApiError::unauthorized("Not authenticated"))?;

        let user_id = state
            .auth
            .resolve(token.trim())
            .ok_or_else(|| ApiError::unauthorized("Could not validate credentials"))?;

        let user = state
            .users
            .find_by_id(&user_id)?
            .ok_or_else(|| ApiError::unauthorized("Could not validate credentials"))?;
        Ok(AuthUser(user))
    }
}
