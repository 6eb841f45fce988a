//! Bearer Token Middleware
//!
//! Reads `Authorization: Bearer <access token>`, authenticates it through
//! `AuthService::verify_access` and injects the resulting `LoginInfo` into
//! request extensions for route handlers (`web::ReqData<LoginInfo>`).

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::{HeaderMap, AUTHORIZATION},
    web, Error, HttpMessage,
};
use futures::future::LocalBoxFuture;
use std::rc::Rc;

use crate::auth::AuthService;
use crate::error::{AppError, AuthError};

/// Extract the token from a `Bearer` Authorization header
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();

    if token.is_empty() || token.contains(char::is_whitespace) {
        return None;
    }

    Some(token.to_string())
}

/// Middleware for protecting routes
///
/// Expects `web::Data<AuthService>` to be registered as app data.
pub struct JwtMiddleware;

impl<S, B> Transform<S, ServiceRequest> for JwtMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = JwtMiddlewareService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(JwtMiddlewareService {
            service: Rc::new(service),
        }))
    }
}

pub struct JwtMiddlewareService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for JwtMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let token = bearer_token(req.headers());
        let auth = req.app_data::<web::Data<AuthService>>().cloned();

        Box::pin(async move {
            let auth = auth.ok_or_else(|| {
                AppError::Internal("AuthService is not registered as app data".to_string())
            })?;

            let token = token.ok_or_else(|| {
                tracing::warn!(path = %req.path(), "Missing or malformed Authorization header");
                AppError::Auth(AuthError::MissingToken)
            })?;

            let info = auth.verify_access(&token).await?;

            tracing::debug!(
                user_id = %info.user.id,
                session_id = %info.claims.sid,
                "Access token validated"
            );

            req.extensions_mut().insert(info);
            service.call(req).await
        })
    }
}
