//! Token Claims
//!
//! Payload carried by both token kinds. Claim names are part of the wire
//! format: `typ, sub, sid, rid, iat, exp`.

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Token kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenType {
    /// Access token
    #[serde(rename = "AT")]
    Access,
    /// Refresh token
    #[serde(rename = "RT")]
    Refresh,
}

/// Claims for access and refresh tokens
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Token kind
    pub typ: TokenType,
    /// Subject (user id)
    pub sub: String,
    /// Session id, shared by the access/refresh pair
    pub sid: String,
    /// Refresh id, only on refresh tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rid: Option<String>,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

impl Claims {
    /// Access token claims issued at `now`
    pub fn access(user_id: &str, session_id: &str, now: i64, ttl_seconds: i64) -> Self {
        Self {
            typ: TokenType::Access,
            sub: user_id.to_string(),
            sid: session_id.to_string(),
            rid: None,
            iat: now,
            exp: now + ttl_seconds,
        }
    }

    /// Refresh token claims issued at `now`
    pub fn refresh(
        user_id: &str,
        session_id: &str,
        refresh_id: &str,
        now: i64,
        ttl_seconds: i64,
    ) -> Self {
        Self {
            typ: TokenType::Refresh,
            sub: user_id.to_string(),
            sid: session_id.to_string(),
            rid: Some(refresh_id.to_string()),
            iat: now,
            exp: now + ttl_seconds,
        }
    }

    /// `rid` must be present on refresh tokens and absent on access tokens
    pub fn check_shape(&self) -> Result<(), AppError> {
        match (self.typ, &self.rid) {
            (TokenType::Access, None) | (TokenType::Refresh, Some(_)) => Ok(()),
            _ => Err(AppError::invalid_token()),
        }
    }

    /// Refresh id, or `TokenInvalid` for an access token
    pub fn refresh_id(&self) -> Result<&str, AppError> {
        self.rid.as_deref().ok_or_else(AppError::invalid_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_claims_creation() {
        let claims = Claims::access("user1", "sess1", 1_000, 900);

        assert_eq!(claims.typ, TokenType::Access);
        assert_eq!(claims.sub, "user1");
        assert_eq!(claims.sid, "sess1");
        assert_eq!(claims.rid, None);
        assert_eq!(claims.exp, 1_900);
        assert!(claims.check_shape().is_ok());
    }

    #[test]
    fn test_refresh_claims_carry_rid() {
        let claims = Claims::refresh("user1", "sess1", "rid1", 1_000, 60);

        assert_eq!(claims.typ, TokenType::Refresh);
        assert_eq!(claims.refresh_id().unwrap(), "rid1");
        assert!(claims.check_shape().is_ok());
    }

    #[test]
    fn test_mismatched_shape_rejected() {
        let mut access = Claims::access("u", "s", 0, 1);
        access.rid = Some("r".to_string());
        assert!(access.check_shape().is_err());

        let mut refresh = Claims::refresh("u", "s", "r", 0, 1);
        refresh.rid = None;
        assert!(refresh.check_shape().is_err());
    }

    #[test]
    fn test_wire_names() {
        let claims = Claims::refresh("u", "s", "r", 10, 5);
        let json = serde_json::to_value(&claims).unwrap();

        assert_eq!(json["typ"], "RT");
        assert_eq!(json["sub"], "u");
        assert_eq!(json["sid"], "s");
        assert_eq!(json["rid"], "r");
        assert_eq!(json["iat"], 10);
        assert_eq!(json["exp"], 15);

        let access = serde_json::to_value(Claims::access("u", "s", 10, 5)).unwrap();
        assert_eq!(access["typ"], "AT");
        assert!(access.get("rid").is_none());
    }
}
