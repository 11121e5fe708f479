//! Storage collaborators for accounts, health records and chat history.
//!
//! Handlers depend on the narrow traits below, never on a concrete store.
//! [`MemoryStore`] implements all three for a single-process deployment.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use heallme::{ConversationTurn, UserProfile};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("email already registered: {0}")]
    DuplicateEmail(String),
    #[error("store lock poisoned")]
    Poisoned,
}

/// A registered account.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub salt: String,
    pub full_name: Option<String>,
    pub age: Option<u32>,
    pub gender: Option<String>,
    pub medical_history: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl UserRecord {
    /// The context handed to the orchestrator for this user.
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            user_id: Some(self.id.clone()),
            age: self.age,
            gender: self.gender.clone(),
            medical_history: self.medical_history.clone(),
        }
    }
}

/// One stored health measurement payload.
#[derive(Debug, Clone, Serialize)]
pub struct HealthRecord {
    pub id: String,
    #[serde(skip)]
    pub user_id: String,
    pub recorded_at: DateTime<Utc>,
    pub data: Value,
}

pub trait UserStore: Send + Sync {
    fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError>;
    fn find_by_id(&self, id: &str) -> Result<Option<UserRecord>, StoreError>;
    /// Insert a new account. Emails are unique, compared case-insensitively.
    fn insert(&self, user: UserRecord) -> Result<(), StoreError>;
}

pub trait HealthRecordStore: Send + Sync {
    fn insert_record(&self, record: HealthRecord) -> Result<(), StoreError>;
    /// Records of one user, oldest first.
    fn records_for(&self, user_id: &str) -> Result<Vec<HealthRecord>, StoreError>;
}

pub trait HistoryStore: Send + Sync {
    /// Conversation of one user, most recent last.
    fn history(&self, user_id: &str) -> Result<Vec<ConversationTurn>, StoreError>;
    fn append(&self, user_id: &str, turns: &[ConversationTurn]) -> Result<(), StoreError>;
}

// ── In-memory implementation ───────────────────────────────────────

#[derive(Default)]
pub struct MemoryStore {
    users: Mutex<HashMap<String, UserRecord>>,
    records: Mutex<HashMap<String, Vec<HealthRecord>>>,
    history: Mutex<HashMap<String, Vec<ConversationTurn>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, StoreError> {
    mutex.lock().map_err(|_| StoreError::Poisoned)
}

impl UserStore for MemoryStore {
    fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        let users = lock(&self.users)?;
        Ok(users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    fn find_by_id(&self, id: &str) -> Result<Option<UserRecord>, StoreError> {
        Ok(lock(&self.users)?.get(id).cloned())
    }

    fn insert(&self, user: UserRecord) -> Result<(), StoreError> {
        let mut users = lock(&self.users)?;
        if users
            .values()
            .any(|u| u.email.eq_ignore_ascii_case(&user.email))
        {
            return Err(StoreError::DuplicateEmail(user.email));
        }
        users.insert(user.id.clone(), user);
        Ok(())
    }
}

impl HealthRecordStore for MemoryStore {
    fn insert_record(&self, record: HealthRecord) -> Result<(), StoreError> {
        lock(&self.records)?
            .entry(record.user_id.clone())
            .or_default()
            .push(record);
        Ok(())
    }

    fn records_for(&self, user_id: &str) -> Result<Vec<HealthRecord>, StoreError> {
        Ok(lock(&self.records)?
            .get(user_id)
            .cloned()
            .unwrap_or_default())
    }
}

impl HistoryStore for MemoryStore {
    fn history(&self, user_id: &str) -> Result<Vec<ConversationTurn>, StoreError> {
        Ok(lock(&self.history)?
            .get(user_id)
            .cloned()
            .unwrap_or_default())
    }

    fn append(&self, user_id: &str, turns: &[ConversationTurn]) -> Result<(), StoreError> {
        lock(&self.history)?
            .entry(user_id.to_string())
            .or_default()
            .extend_from_slice(turns);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user(id: &str, email: &str) -> UserRecord {
        UserRecord {
            id: id.into(),
            username: id.into(),
            email: email.into(),
            password_hash: String::new(),
            salt: String::new(),
            full_name: None,
            age: Some(30),
            gender: None,
            medical_history: vec!["asthma".into()],
            created_at: Utc::now(),
        }
    }

    #[test]
    fn duplicate_email_is_rejected_case_insensitively() {
        let store = MemoryStore::new();
        store.insert(user("u1", "Alice@Example.com")).unwrap();
        let err = store.insert(user("u2", "alice@example.com")).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateEmail(_)));
        assert!(store.find_by_id("u2").unwrap().is_none());
    }

    #[test]
    fn lookup_by_email_and_id() {
        let store = MemoryStore::new();
        store.insert(user("u1", "a@b.c")).unwrap();
        assert_eq!(store.find_by_email("A@B.C").unwrap().unwrap().id, "u1");
        assert_eq!(store.find_by_id("u1").unwrap().unwrap().email, "a@b.c");
        assert!(store.find_by_email("x@y.z").unwrap().is_none());
    }

    #[test]
    fn profile_carries_user_id_and_history() {
        let profile = user("u1", "a@b.c").profile();
        assert_eq!(profile.subject_id(), "u1");
        assert_eq!(profile.age, Some(30));
        assert_eq!(profile.medical_history, vec!["asthma"]);
    }

    #[test]
    fn records_are_scoped_per_user_in_insertion_order() {
        let store = MemoryStore::new();
        for (i, owner) in ["u1", "u2", "u1"].iter().enumerate() {
            store
                .insert_record(HealthRecord {
                    id: format!("r{i}"),
                    user_id: owner.to_string(),
                    recorded_at: Utc::now(),
                    data: json!({"steps": i}),
                })
                .unwrap();
        }
        let ids: Vec<String> = store
            .records_for("u1")
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["r0", "r2"]);
        assert!(store.records_for("nobody").unwrap().is_empty());
    }

    #[test]
    fn history_appends_most_recent_last() {
        let store = MemoryStore::new();
        store
            .append("u1", &[ConversationTurn::user("hi"), ConversationTurn::assistant("hello")])
            .unwrap();
        store.append("u1", &[ConversationTurn::user("again")]).unwrap();
        let texts: Vec<String> = store
            .history("u1")
            .unwrap()
            .into_iter()
            .map(|t| t.text)
            .collect();
        assert_eq!(texts, vec!["hi", "hello", "again"]);
    }
}
