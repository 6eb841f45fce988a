//! Authentication Service
//!
//! Login (resolve-or-create user, open session, mint tokens), access token
//! verification, the refresh protocol with reuse detection, and logout.
//!
//! Access tokens are trusted for their whole lifetime: `verify_access`
//! loads the user but does not consult the session. Logout and reuse
//! detection therefore only take effect for access tokens once those
//! expire; refresh tokens stop working immediately.

use std::sync::Arc;

use chrono::Utc;

use crate::auth::claims::{Claims, TokenType};
use crate::auth::id::new_id;
use crate::auth::jwt::{TokenCodec, TokenPair};
use crate::auth::session::{hash_refresh_id, SessionStore};
use crate::configuration::JwtSettings;
use crate::error::{AppError, DatabaseError};
use crate::identity::IdentityClaims;
use crate::store::{User, UserDirectory};
use crate::validators::is_valid_name;

/// Longest display name kept from an identity provider
pub const MAX_DISPLAY_NAME_CHARS: usize = 30;

/// Provider-supplied name, truncated and held to the same rules as a
/// rename. Falls back to the email local part.
fn display_name(identity: &IdentityClaims) -> String {
    let truncated: String = identity.name.chars().take(MAX_DISPLAY_NAME_CHARS).collect();

    is_valid_name(&truncated).unwrap_or_else(|e| {
        tracing::debug!(error = %e, "Provider name rejected, using email local part");
        let local_part: String = identity
            .email
            .split('@')
            .next()
            .unwrap_or_default()
            .chars()
            .take(MAX_DISPLAY_NAME_CHARS)
            .collect();
        is_valid_name(&local_part).unwrap_or_else(|_| "user".to_string())
    })
}

/// A user together with the access token claims that authenticated them
#[derive(Debug, Clone)]
pub struct LoginInfo {
    pub user: User,
    pub claims: Claims,
}

/// Result of a successful login
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub user: User,
    pub session_id: String,
    pub tokens: TokenPair,
}

#[derive(Clone)]
pub struct AuthService {
    directory: Arc<dyn UserDirectory>,
    codec: TokenCodec,
    sessions: SessionStore,
}

impl AuthService {
    pub fn new(directory: Arc<dyn UserDirectory>, config: &JwtSettings) -> Self {
        Self {
            sessions: SessionStore::new(directory.clone(), config.refresh_token_expiry),
            codec: TokenCodec::new(config),
            directory,
        }
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    /// Log in with a verified identity
    ///
    /// Resolution order: existing integration, then a user with the same
    /// email (the integration gets attached), then a brand new user.
    pub async fn login(&self, identity: IdentityClaims) -> Result<LoginOutcome, AppError> {
        let user = self.resolve_user(&identity).await?;
        let session = self.sessions.create_session(&user).await?;
        let tokens = self.codec.issue_pair(
            &user.id,
            &session.session_id,
            &session.refresh_id,
            session.created_at.timestamp(),
        )?;

        tracing::info!(
            user_id = %user.id,
            session_id = %session.session_id,
            service = %identity.service,
            "User logged in"
        );

        Ok(LoginOutcome {
            user,
            session_id: session.session_id,
            tokens,
        })
    }

    async fn resolve_user(&self, identity: &IdentityClaims) -> Result<User, AppError> {
        let integration = identity.integration();

        if let Some(user) = self.directory.find_by_integration(&integration).await? {
            return Ok(user);
        }

        tracing::debug!(
            service = %integration.service,
            provider_id = %integration.provider_id,
            "Integration not found, matching by email"
        );

        match self
            .directory
            .attach_integration_by_email(&identity.email, &integration)
            .await
        {
            Ok(Some(user)) => return Ok(user),
            Ok(None) => {}
            // Someone else attached it between our lookup and this write.
            Err(AppError::Database(DatabaseError::UniqueConstraintViolation(_))) => {
                return self.expect_by_integration(identity).await;
            }
            Err(e) => return Err(e),
        }

        tracing::debug!(service = %integration.service, "Email not found, creating account");

        let user = User {
            id: new_id(&self.directory.user_ids().await?)?,
            name: display_name(identity),
            email: identity.email.clone(),
            created_at: Utc::now(),
            integrations: vec![integration],
            sessions: Vec::new(),
        };

        match self.directory.insert_user(&user).await {
            Ok(()) => {
                tracing::info!(user_id = %user.id, "New user created");
                Ok(user)
            }
            // A concurrent first login created the account.
            Err(AppError::Database(DatabaseError::UniqueConstraintViolation(_))) => {
                self.expect_by_integration(identity).await
            }
            Err(e) => Err(e),
        }
    }

    async fn expect_by_integration(&self, identity: &IdentityClaims) -> Result<User, AppError> {
        self.directory
            .find_by_integration(&identity.integration())
            .await?
            .ok_or_else(|| {
                AppError::Internal("integration vanished after unique violation".to_string())
            })
    }

    /// Authenticate an access token
    ///
    /// # Errors
    /// `TokenInvalid` if the token does not decode, is not an access token,
    /// or names a user that does not exist
    pub async fn verify_access(&self, token: &str) -> Result<LoginInfo, AppError> {
        let claims = self.codec.decode_as(token, TokenType::Access)?;

        let user = self.directory.find_by_id(&claims.sub).await?.ok_or_else(|| {
            tracing::warn!(user_id = %claims.sub, "Access token for unknown user");
            AppError::invalid_token()
        })?;

        Ok(LoginInfo { user, claims })
    }

    /// Exchange a refresh token for a new pair, rotating the session
    ///
    /// A refresh id that no longer matches the session (or loses the
    /// rotation race) is treated as reuse: the whole session is revoked
    /// before `TokenInvalid` is returned.
    pub async fn refresh(&self, token: &str) -> Result<TokenPair, AppError> {
        let claims = self.codec.decode_as(token, TokenType::Refresh)?;
        let presented = claims.refresh_id()?;

        let user = self.sessions.load_user(&claims.sub).await?.ok_or_else(|| {
            tracing::warn!(user_id = %claims.sub, "Refresh token for unknown user");
            AppError::invalid_token()
        })?;

        let session = user.session(&claims.sid).ok_or_else(|| {
            tracing::warn!(
                user_id = %claims.sub,
                session_id = %claims.sid,
                "Refresh for missing or expired session"
            );
            AppError::invalid_token()
        })?;

        if session.refresh_hash != hash_refresh_id(presented) {
            return Err(self.revoke_on_reuse(&claims, "stale refresh id").await);
        }

        let now = Utc::now();
        let new_refresh_id = new_id(&Default::default())?;
        let rotated = self
            .sessions
            .rotate(
                &claims.sub,
                &claims.sid,
                presented,
                &new_refresh_id,
                now + self.sessions.refresh_ttl(),
            )
            .await?;

        if !rotated {
            return Err(self.revoke_on_reuse(&claims, "lost rotation race").await);
        }

        tracing::info!(user_id = %claims.sub, session_id = %claims.sid, "Session refreshed");

        self.codec
            .issue_pair(&claims.sub, &claims.sid, &new_refresh_id, now.timestamp())
    }

    /// Revoke the session and produce the error to return. A store failure
    /// while revoking wins over `TokenInvalid` so the caller can retry.
    async fn revoke_on_reuse(&self, claims: &Claims, reason: &str) -> AppError {
        tracing::warn!(
            user_id = %claims.sub,
            session_id = %claims.sid,
            reason,
            "Refresh token reuse detected, revoking session"
        );

        match self.sessions.revoke(&claims.sub, &claims.sid).await {
            Ok(_) => AppError::invalid_token(),
            Err(e) => e,
        }
    }

    /// End the session the access token belongs to
    pub async fn logout(&self, claims: &Claims) -> Result<(), AppError> {
        self.sessions.revoke(&claims.sub, &claims.sid).await?;
        Ok(())
    }

    /// Change the display name; returns the updated user
    pub async fn rename(&self, user_id: &str, name: &str) -> Result<User, AppError> {
        if !self.directory.update_name(user_id, name).await? {
            return Err(AppError::invalid_token());
        }

        self.directory
            .find_by_id(user_id)
            .await?
            .ok_or_else(AppError::invalid_token)
    }
}
