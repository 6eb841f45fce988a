//! Session Store
//!
//! Owns the lifecycle of the sessions embedded in a user record:
//! creation, lazy pruning of expired sessions, compare-and-swap rotation
//! and revocation. Refresh ids are hashed with SHA-256 before they reach
//! the directory; the plaintext id only lives inside the refresh token.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};

use crate::auth::id::new_id;
use crate::error::AppError;
use crate::store::{Session, User, UserDirectory};

/// Result of `SessionStore::create_session`
#[derive(Debug, Clone)]
pub struct NewSession {
    pub session_id: String,
    /// Plaintext refresh id, to be embedded in the refresh token
    pub refresh_id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Hash a refresh id for storage and comparison
pub fn hash_refresh_id(refresh_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(refresh_id.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[derive(Clone)]
pub struct SessionStore {
    directory: Arc<dyn UserDirectory>,
    refresh_ttl: Duration,
}

impl SessionStore {
    pub fn new(directory: Arc<dyn UserDirectory>, refresh_ttl_seconds: i64) -> Self {
        Self {
            directory,
            refresh_ttl: Duration::seconds(refresh_ttl_seconds),
        }
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    /// Open a new session for `user` with a single append
    ///
    /// The session id avoids every session id currently on the user.
    pub async fn create_session(&self, user: &User) -> Result<NewSession, AppError> {
        self.create_session_at(user, Utc::now()).await
    }

    pub async fn create_session_at(
        &self,
        user: &User,
        now: DateTime<Utc>,
    ) -> Result<NewSession, AppError> {
        let session_id = new_id(&user.session_ids())?;
        let refresh_id = new_id(&Default::default())?;
        let expires_at = now + self.refresh_ttl;

        let session = Session {
            id: session_id.clone(),
            refresh_hash: hash_refresh_id(&refresh_id),
            created_at: now,
            expires_at,
        };
        self.directory.push_session(&user.id, &session).await?;

        tracing::debug!(user_id = %user.id, session_id = %session_id, "Session created");

        Ok(NewSession {
            session_id,
            refresh_id,
            created_at: now,
            expires_at,
        })
    }

    /// Drop every session of `user_id` that has expired
    pub async fn prune_expired(&self, user_id: &str) -> Result<u64, AppError> {
        let pruned = self
            .directory
            .pull_expired_sessions(user_id, Utc::now())
            .await?;

        if pruned > 0 {
            tracing::debug!(user_id = %user_id, pruned, "Expired sessions pruned");
        }

        Ok(pruned)
    }

    /// Read a user for authentication, pruning expired sessions first
    pub async fn load_user(&self, user_id: &str) -> Result<Option<User>, AppError> {
        self.prune_expired(user_id).await?;
        self.directory.find_by_id(user_id).await
    }

    /// Replace the session's refresh id if it is still `expected_refresh_id`
    ///
    /// One conditional write. Of two concurrent rotations from the same
    /// expected id exactly one returns `true`.
    pub async fn rotate(
        &self,
        user_id: &str,
        session_id: &str,
        expected_refresh_id: &str,
        new_refresh_id: &str,
        new_expires_at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        self.directory
            .swap_refresh_hash(
                user_id,
                session_id,
                &hash_refresh_id(expected_refresh_id),
                &hash_refresh_id(new_refresh_id),
                new_expires_at,
            )
            .await
    }

    /// Remove the session unconditionally
    pub async fn revoke(&self, user_id: &str, session_id: &str) -> Result<bool, AppError> {
        let removed = self.directory.pull_session(user_id, session_id).await?;

        tracing::info!(user_id = %user_id, session_id = %session_id, removed, "Session revoked");

        Ok(removed)
    }
}
