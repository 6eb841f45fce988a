use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::{Integration, Session, User, UserDirectory};
use crate::error::AppError;

type UserRow = (String, String, String, DateTime<Utc>);

/// PostgreSQL-backed user directory
///
/// Users live in `users`; their federated identities and sessions in the
/// child tables `user_integrations` and `user_sessions`.
#[derive(Clone)]
pub struct PgUserDirectory {
    pool: PgPool,
}

impl PgUserDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn hydrate(&self, row: UserRow) -> Result<User, AppError> {
        let (id, name, email, created_at) = row;

        let integrations = sqlx::query_as::<_, (String, String)>(
            "SELECT service, provider_id FROM user_integrations WHERE user_id = $1",
        )
        .bind(&id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|(service, provider_id)| Integration { service, provider_id })
        .collect();

        let sessions = sqlx::query_as::<_, (String, String, DateTime<Utc>, DateTime<Utc>)>(
            r#"
            SELECT id, refresh_hash, created_at, expires_at
            FROM user_sessions
            WHERE user_id = $1
            ORDER BY created_at
            "#,
        )
        .bind(&id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|(id, refresh_hash, created_at, expires_at)| Session {
            id,
            refresh_hash,
            created_at,
            expires_at,
        })
        .collect();

        Ok(User {
            id,
            name,
            email,
            created_at,
            integrations,
            sessions,
        })
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn find_by_id(&self, user_id: &str) -> Result<Option<User>, AppError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, name, email, created_at FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    async fn find_by_integration(
        &self,
        integration: &Integration,
    ) -> Result<Option<User>, AppError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT u.id, u.name, u.email, u.created_at
            FROM users u
            JOIN user_integrations i ON i.user_id = u.id
            WHERE i.service = $1 AND i.provider_id = $2
            "#,
        )
        .bind(&integration.service)
        .bind(&integration.provider_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    async fn attach_integration_by_email(
        &self,
        email: &str,
        integration: &Integration,
    ) -> Result<Option<User>, AppError> {
        let user_id = sqlx::query_scalar::<_, String>(
            r#"
            INSERT INTO user_integrations (user_id, service, provider_id)
            SELECT id, $2, $3 FROM users WHERE email = $1
            ORDER BY created_at
            LIMIT 1
            RETURNING user_id
            "#,
        )
        .bind(email)
        .bind(&integration.service)
        .bind(&integration.provider_id)
        .fetch_optional(&self.pool)
        .await?;

        match user_id {
            Some(user_id) => self.find_by_id(&user_id).await,
            None => Ok(None),
        }
    }

    async fn user_ids(&self) -> Result<HashSet<String>, AppError> {
        let ids = sqlx::query_scalar::<_, String>("SELECT id FROM users")
            .fetch_all(&self.pool)
            .await?;

        Ok(ids.into_iter().collect())
    }

    async fn insert_user(&self, user: &User) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO users (id, name, email, created_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(&user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(user.created_at)
        .execute(&mut tx)
        .await?;

        for integration in &user.integrations {
            sqlx::query(
                r#"
                INSERT INTO user_integrations (user_id, service, provider_id)
                VALUES ($1, $2, $3)
                "#,
            )
            .bind(&user.id)
            .bind(&integration.service)
            .bind(&integration.provider_id)
            .execute(&mut tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn update_name(&self, user_id: &str, name: &str) -> Result<bool, AppError> {
        let result = sqlx::query("UPDATE users SET name = $1 WHERE id = $2")
            .bind(name)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn push_session(&self, user_id: &str, session: &Session) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO user_sessions (user_id, id, refresh_hash, created_at, expires_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(user_id)
        .bind(&session.id)
        .bind(&session.refresh_hash)
        .bind(session.created_at)
        .bind(session.expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn pull_expired_sessions(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<u64, AppError> {
        let result = sqlx::query(
            "DELETE FROM user_sessions WHERE user_id = $1 AND expires_at <= $2",
        )
        .bind(user_id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn swap_refresh_hash(
        &self,
        user_id: &str,
        session_id: &str,
        expected_hash: &str,
        new_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE user_sessions
            SET refresh_hash = $1, expires_at = $2
            WHERE user_id = $3 AND id = $4 AND refresh_hash = $5
            "#,
        )
        .bind(new_hash)
        .bind(expires_at)
        .bind(user_id)
        .bind(session_id)
        .bind(expected_hash)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn pull_session(&self, user_id: &str, session_id: &str) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM user_sessions WHERE user_id = $1 AND id = $2")
            .bind(user_id)
            .bind(session_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
