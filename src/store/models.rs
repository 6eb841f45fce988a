use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A federated identity bound to a user, unique per (service, provider_id)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Integration {
    pub service: String,
    pub provider_id: String,
}

impl Integration {
    pub fn new(service: impl Into<String>, provider_id: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            provider_id: provider_id.into(),
        }
    }
}

/// One logged-in device or browser
///
/// Only the SHA-256 digest of the current refresh id is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: String,
    pub refresh_hash: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

#[derive(Debug, Clone)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub integrations: Vec<Integration>,
    pub sessions: Vec<Session>,
}

impl User {
    pub fn session(&self, session_id: &str) -> Option<&Session> {
        self.sessions.iter().find(|s| s.id == session_id)
    }

    pub fn session_ids(&self) -> std::collections::HashSet<String> {
        self.sessions.iter().map(|s| s.id.clone()).collect()
    }
}
