//! User Directory
//!
//! Persistence boundary for user records and their embedded sessions.
//! Two implementations:
//! - `PgUserDirectory`: PostgreSQL through sqlx
//! - `InMemoryUserDirectory`: a mutex-guarded map, used by the test suite
//!
//! Every method is a single store operation. In particular
//! `swap_refresh_hash` must be one conditional write, never a read followed
//! by a write: it is the only concurrency control for refresh rotation.

mod memory;
mod models;
mod postgres;

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::AppError;

pub use memory::InMemoryUserDirectory;
pub use models::{Integration, Session, User};
pub use postgres::PgUserDirectory;

#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Find a user by id
    async fn find_by_id(&self, user_id: &str) -> Result<Option<User>, AppError>;

    /// Find the user owning a federated identity
    async fn find_by_integration(&self, integration: &Integration)
        -> Result<Option<User>, AppError>;

    /// Atomically attach `integration` to the user with `email` and return
    /// the updated user, or `None` if no user has that email
    async fn attach_integration_by_email(
        &self,
        email: &str,
        integration: &Integration,
    ) -> Result<Option<User>, AppError>;

    /// All user ids, for collision-free id generation
    async fn user_ids(&self) -> Result<HashSet<String>, AppError>;

    /// Insert a new user together with its integrations
    ///
    /// # Errors
    /// `DatabaseError::UniqueConstraintViolation` if the id or one of the
    /// integrations is already taken
    async fn insert_user(&self, user: &User) -> Result<(), AppError>;

    /// Set the display name. Returns false if the user does not exist.
    async fn update_name(&self, user_id: &str, name: &str) -> Result<bool, AppError>;

    /// Append a session to the user's session list
    async fn push_session(&self, user_id: &str, session: &Session) -> Result<(), AppError>;

    /// Remove every session with `expires_at <= now`; returns how many
    async fn pull_expired_sessions(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<u64, AppError>;

    /// Compare-and-swap the refresh digest of one session
    ///
    /// Sets `refresh_hash = new_hash, expires_at = expires_at` only if the
    /// stored digest still equals `expected_hash`. Returns whether the
    /// write happened.
    async fn swap_refresh_hash(
        &self,
        user_id: &str,
        session_id: &str,
        expected_hash: &str,
        new_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, AppError>;

    /// Remove one session unconditionally; returns whether it existed
    async fn pull_session(&self, user_id: &str, session_id: &str) -> Result<bool, AppError>;
}
