//! Login Routes
//!
//! Google and test login, token refresh and logout. Every failure of the
//! token checks surfaces as the same 401.

use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::auth::{AuthService, LoginInfo, TokenPair};
use crate::error::AppError;
use crate::identity::{IdentityClaims, IdentityProvider, TEST_SERVICE};
use crate::routes::BaseResponse;
use crate::validators::{is_valid_email, is_valid_name};

/// Google login request
#[derive(Deserialize)]
pub struct GoogleLoginRequest {
    /// ID token obtained from Google Sign-In
    pub token: String,
}

/// Test login request
#[derive(Deserialize)]
pub struct TestLoginRequest {
    pub email: String,
    pub name: String,
}

/// Token refresh request
#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Token payload of login and refresh responses
#[derive(Serialize)]
pub struct LoginTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

impl From<TokenPair> for LoginTokens {
    fn from(pair: TokenPair) -> Self {
        Self {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: pair.expires_in,
        }
    }
}

/// POST /api/v1/user/login/google
///
/// Verifies the Google ID token, then logs in (creating the account on
/// first use).
///
/// # Errors
/// - 401: Google rejected the token
/// - 503: Google or the store is unreachable
pub async fn google_login(
    body: web::Json<GoogleLoginRequest>,
    auth: web::Data<AuthService>,
    provider: web::Data<dyn IdentityProvider>,
) -> Result<HttpResponse, AppError> {
    let identity = provider.verify(&body.token).await?;
    let outcome = auth.login(identity).await?;

    Ok(HttpResponse::Ok().json(BaseResponse::new(
        "Login Successful.",
        LoginTokens::from(outcome.tokens),
    )))
}

/// POST /api/v1/user/login/test
///
/// Logs in as `email` without any provider. Only registered when
/// `application.test_login` is enabled.
///
/// # Errors
/// - 400: Invalid email or name
pub async fn test_login(
    body: web::Json<TestLoginRequest>,
    auth: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let email = is_valid_email(&body.email)?;
    let name = is_valid_name(&body.name)?;

    let outcome = auth
        .login(IdentityClaims {
            service: TEST_SERVICE.to_string(),
            provider_id: email.clone(),
            email,
            name,
        })
        .await?;

    Ok(HttpResponse::Ok().json(BaseResponse::new(
        "Login Successful.",
        LoginTokens::from(outcome.tokens),
    )))
}

/// POST /api/v1/user/login/token/refresh
///
/// Rotates the session and returns a new token pair. Presenting an
/// already-used refresh token revokes the session.
///
/// # Errors
/// - 401: Invalid, expired, reused or revoked refresh token
/// - 503: Store unavailable (safe to retry)
pub async fn refresh(
    body: web::Json<RefreshRequest>,
    auth: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let tokens = auth.refresh(&body.refresh_token).await?;

    Ok(HttpResponse::Ok().json(BaseResponse::new(
        "Refresh Successful.",
        LoginTokens::from(tokens),
    )))
}

/// GET /api/v1/user/login/logout
///
/// **Requires a valid access token.** Deletes the caller's session only.
pub async fn logout(
    login: web::ReqData<LoginInfo>,
    auth: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    auth.logout(&login.claims).await?;

    Ok(HttpResponse::Ok().json(BaseResponse::message("Session has been deleted.")))
}
