//! Identity Providers
//!
//! Turns a provider-issued token into verified identity claims. The Google
//! provider asks Google's `tokeninfo` endpoint to validate the ID token and
//! then checks audience, issuer and email verification locally.

use async_trait::async_trait;
use serde::Deserialize;

use crate::configuration::GoogleSettings;
use crate::error::AppError;
use crate::store::Integration;

pub const GOOGLE_SERVICE: &str = "google";
pub const TEST_SERVICE: &str = "test";

const GOOGLE_ISSUERS: [&str; 2] = ["accounts.google.com", "https://accounts.google.com"];

/// Verified identity returned by a provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityClaims {
    pub service: String,
    pub provider_id: String,
    pub email: String,
    pub name: String,
}

impl IdentityClaims {
    pub fn integration(&self) -> Integration {
        Integration::new(self.service.clone(), self.provider_id.clone())
    }
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Verify `token` and return the identity it proves
    ///
    /// # Errors
    /// `TokenInvalid` if the provider rejects the token,
    /// `IdentityError::Unavailable` if the provider cannot be reached
    async fn verify(&self, token: &str) -> Result<IdentityClaims, AppError>;
}

#[derive(Debug, Deserialize)]
struct GoogleTokenInfo {
    iss: String,
    aud: String,
    sub: String,
    email: Option<String>,
    // tokeninfo returns booleans as strings
    email_verified: Option<String>,
    name: Option<String>,
}

#[derive(Clone)]
pub struct GoogleIdentityProvider {
    http_client: reqwest::Client,
    tokeninfo_url: String,
    client_id: String,
}

impl GoogleIdentityProvider {
    pub fn new(settings: &GoogleSettings, http_client: reqwest::Client) -> Self {
        Self {
            http_client,
            tokeninfo_url: settings.tokeninfo_url.clone(),
            client_id: settings.client_id.clone(),
        }
    }

    fn check(&self, info: GoogleTokenInfo) -> Result<IdentityClaims, AppError> {
        if info.aud != self.client_id {
            tracing::warn!(aud = %info.aud, "Google token issued for another client");
            return Err(AppError::invalid_token());
        }

        if !GOOGLE_ISSUERS.contains(&info.iss.as_str()) {
            tracing::warn!(iss = %info.iss, "Google token from unexpected issuer");
            return Err(AppError::invalid_token());
        }

        let email = match (info.email, info.email_verified.as_deref()) {
            (Some(email), Some("true")) => email,
            _ => {
                tracing::warn!(provider_id = %info.sub, "Google account has no verified email");
                return Err(AppError::invalid_token());
            }
        };

        let name = info.name.unwrap_or_else(|| email.clone());

        Ok(IdentityClaims {
            service: GOOGLE_SERVICE.to_string(),
            provider_id: info.sub,
            email,
            name,
        })
    }
}

#[async_trait]
impl IdentityProvider for GoogleIdentityProvider {
    async fn verify(&self, token: &str) -> Result<IdentityClaims, AppError> {
        let response = self
            .http_client
            .get(&self.tokeninfo_url)
            .query(&[("id_token", token)])
            .send()
            .await?;

        let status = response.status();
        if status.is_server_error() {
            return Err(crate::error::IdentityError::Unavailable(format!(
                "tokeninfo returned {}",
                status
            ))
            .into());
        }
        if !status.is_success() {
            tracing::warn!(status = %status, "Google rejected the ID token");
            return Err(AppError::invalid_token());
        }

        let info = response.json::<GoogleTokenInfo>().await.map_err(|e| {
            tracing::warn!(error = %e, "Unreadable tokeninfo response");
            AppError::invalid_token()
        })?;

        self.check(info)
    }
}
