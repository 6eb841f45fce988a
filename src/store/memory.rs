use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{Integration, Session, User, UserDirectory};
use crate::error::{AppError, DatabaseError};

/// Process-local user directory
///
/// Each method runs under one lock acquisition, which gives the same
/// single-operation atomicity the PostgreSQL directory gets from its
/// conditional statements.
#[derive(Default)]
pub struct InMemoryUserDirectory {
    users: Mutex<HashMap<String, User>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    fn users(&self) -> Result<MutexGuard<'_, HashMap<String, User>>, AppError> {
        self.users
            .lock()
            .map_err(|_| AppError::Internal("user directory lock poisoned".to_string()))
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn find_by_id(&self, user_id: &str) -> Result<Option<User>, AppError> {
        Ok(self.users()?.get(user_id).cloned())
    }

    async fn find_by_integration(
        &self,
        integration: &Integration,
    ) -> Result<Option<User>, AppError> {
        Ok(self
            .users()?
            .values()
            .find(|u| u.integrations.contains(integration))
            .cloned())
    }

    async fn attach_integration_by_email(
        &self,
        email: &str,
        integration: &Integration,
    ) -> Result<Option<User>, AppError> {
        let mut users = self.users()?;

        if users.values().any(|u| u.integrations.contains(integration)) {
            return Err(DatabaseError::UniqueConstraintViolation(format!(
                "integration {}:{} already bound",
                integration.service, integration.provider_id
            ))
            .into());
        }

        // Oldest match wins, as in the Postgres directory
        Ok(users
            .values_mut()
            .filter(|u| u.email == email)
            .min_by_key(|u| u.created_at)
            .map(|user| {
                user.integrations.push(integration.clone());
                user.clone()
            }))
    }

    async fn user_ids(&self) -> Result<HashSet<String>, AppError> {
        Ok(self.users()?.keys().cloned().collect())
    }

    async fn insert_user(&self, user: &User) -> Result<(), AppError> {
        let mut users = self.users()?;

        if users.contains_key(&user.id) {
            return Err(DatabaseError::UniqueConstraintViolation(format!(
                "user id {} already exists",
                user.id
            ))
            .into());
        }

        let taken = users.values().any(|existing| {
            existing
                .integrations
                .iter()
                .any(|i| user.integrations.contains(i))
        });
        if taken {
            return Err(DatabaseError::UniqueConstraintViolation(
                "integration already bound".to_string(),
            )
            .into());
        }

        users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn update_name(&self, user_id: &str, name: &str) -> Result<bool, AppError> {
        Ok(match self.users()?.get_mut(user_id) {
            Some(user) => {
                user.name = name.to_string();
                true
            }
            None => false,
        })
    }

    async fn push_session(&self, user_id: &str, session: &Session) -> Result<(), AppError> {
        let mut users = self.users()?;
        let user = users
            .get_mut(user_id)
            .ok_or_else(|| DatabaseError::NotFound(format!("user {}", user_id)))?;

        if user.session(&session.id).is_some() {
            return Err(DatabaseError::UniqueConstraintViolation(format!(
                "session {} already exists",
                session.id
            ))
            .into());
        }

        user.sessions.push(session.clone());
        Ok(())
    }

    async fn pull_expired_sessions(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<u64, AppError> {
        let mut users = self.users()?;
        let Some(user) = users.get_mut(user_id) else {
            return Ok(0);
        };

        let before = user.sessions.len();
        user.sessions.retain(|s| !s.is_expired_at(now));
        Ok((before - user.sessions.len()) as u64)
    }

    async fn swap_refresh_hash(
        &self,
        user_id: &str,
        session_id: &str,
        expected_hash: &str,
        new_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let mut users = self.users()?;
        let session = users
            .get_mut(user_id)
            .and_then(|u| u.sessions.iter_mut().find(|s| s.id == session_id));

        match session {
            Some(session) if session.refresh_hash == expected_hash => {
                session.refresh_hash = new_hash.to_string();
                session.expires_at = expires_at;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn pull_session(&self, user_id: &str, session_id: &str) -> Result<bool, AppError> {
        let mut users = self.users()?;
        let Some(user) = users.get_mut(user_id) else {
            return Ok(false);
        };

        let before = user.sessions.len();
        user.sessions.retain(|s| s.id != session_id);
        Ok(user.sessions.len() < before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn user(id: &str, email: &str) -> User {
        User {
            id: id.to_string(),
            name: "Test".to_string(),
            email: email.to_string(),
            created_at: Utc::now(),
            integrations: vec![Integration::new("google", format!("g-{}", id))],
            sessions: vec![],
        }
    }

    fn session(id: &str, hash: &str, expires_at: DateTime<Utc>) -> Session {
        Session {
            id: id.to_string(),
            refresh_hash: hash.to_string(),
            created_at: Utc::now(),
            expires_at,
        }
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicate_integration() {
        let dir = InMemoryUserDirectory::new();
        dir.insert_user(&user("a", "a@example.com")).await.unwrap();

        let mut clash = user("b", "b@example.com");
        clash.integrations = vec![Integration::new("google", "g-a")];

        let err = dir.insert_user(&clash).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::Database(DatabaseError::UniqueConstraintViolation(_))
        ));
    }

    #[tokio::test]
    async fn test_attach_by_email_picks_oldest_user() {
        let dir = InMemoryUserDirectory::new();
        let mut older = user("old", "shared@example.com");
        older.created_at = Utc::now() - Duration::days(30);
        // Insert the newer one first so map order cannot decide
        dir.insert_user(&user("new", "shared@example.com")).await.unwrap();
        dir.insert_user(&older).await.unwrap();

        let attached = dir
            .attach_integration_by_email("shared@example.com", &Integration::new("github", "gh-9"))
            .await
            .unwrap()
            .expect("a user has this email");
        assert_eq!(attached.id, "old");
    }

    #[tokio::test]
    async fn test_attach_integration_by_email() {
        let dir = InMemoryUserDirectory::new();
        dir.insert_user(&user("a", "a@example.com")).await.unwrap();

        let github = Integration::new("github", "gh-1");
        let attached = dir
            .attach_integration_by_email("a@example.com", &github)
            .await
            .unwrap()
            .expect("user should match by email");
        assert!(attached.integrations.contains(&github));

        let missing = dir
            .attach_integration_by_email("nobody@example.com", &Integration::new("github", "gh-2"))
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_swap_requires_expected_hash() {
        let dir = InMemoryUserDirectory::new();
        dir.insert_user(&user("a", "a@example.com")).await.unwrap();
        let later = Utc::now() + Duration::hours(1);
        dir.push_session("a", &session("s", "h1", later)).await.unwrap();

        assert!(!dir.swap_refresh_hash("a", "s", "wrong", "h2", later).await.unwrap());
        assert!(dir.swap_refresh_hash("a", "s", "h1", "h2", later).await.unwrap());
        assert!(!dir.swap_refresh_hash("a", "s", "h1", "h3", later).await.unwrap());

        let stored = dir.find_by_id("a").await.unwrap().unwrap();
        assert_eq!(stored.session("s").unwrap().refresh_hash, "h2");
    }

    #[tokio::test]
    async fn test_pull_expired_sessions() {
        let dir = InMemoryUserDirectory::new();
        dir.insert_user(&user("a", "a@example.com")).await.unwrap();
        let now = Utc::now();
        dir.push_session("a", &session("old", "h", now)).await.unwrap();
        dir.push_session("a", &session("new", "h", now + Duration::hours(1)))
            .await
            .unwrap();

        assert_eq!(dir.pull_expired_sessions("a", now).await.unwrap(), 1);

        let stored = dir.find_by_id("a").await.unwrap().unwrap();
        assert!(stored.session("old").is_none());
        assert!(stored.session("new").is_some());
    }
}
