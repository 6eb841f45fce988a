//! Token Codec
//!
//! Signs and verifies access/refresh tokens with a shared HMAC secret.
//! Pure: no I/O, no clock other than the expiry check. HS256 is pinned,
//! so `alg: none` and algorithm-confusion tokens are rejected.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::Serialize;

use crate::auth::claims::{Claims, TokenType};
use crate::configuration::JwtSettings;
use crate::error::AppError;

/// A freshly minted access/refresh pair
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
}

/// Encoder/decoder bound to one signing secret
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    access_ttl: i64,
    refresh_ttl: i64,
}

impl TokenCodec {
    pub fn new(config: &JwtSettings) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.set_required_spec_claims(&["exp", "iat", "sub"]);

        Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
            access_ttl: config.access_token_expiry,
            refresh_ttl: config.refresh_token_expiry,
        }
    }

    /// Sign `claims`
    ///
    /// # Errors
    /// Returns `AppError::Internal` if serialization or signing fails
    pub fn encode(&self, claims: &Claims) -> Result<String, AppError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))
    }

    /// Verify a token and return its claims
    ///
    /// # Errors
    /// Returns `TokenInvalid` for a bad signature, wrong algorithm, expired
    /// token, missing or unknown claims, or an inconsistent `typ`/`rid`
    pub fn decode(&self, token: &str) -> Result<Claims, AppError> {
        let claims = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::warn!(error = %e, "Token validation failed");
                AppError::invalid_token()
            })?;

        claims.check_shape().map_err(|e| {
            tracing::warn!(typ = ?claims.typ, sid = %claims.sid, "Token claims inconsistent with type");
            e
        })?;

        Ok(claims)
    }

    /// Decode and require a specific token type
    pub fn decode_as(&self, token: &str, expected: TokenType) -> Result<Claims, AppError> {
        let claims = self.decode(token)?;

        if claims.typ != expected {
            tracing::warn!(
                expected = ?expected,
                actual = ?claims.typ,
                sid = %claims.sid,
                "Unexpected token type"
            );
            return Err(AppError::invalid_token());
        }

        Ok(claims)
    }

    /// Mint an access/refresh pair sharing `session_id`
    pub fn issue_pair(
        &self,
        user_id: &str,
        session_id: &str,
        refresh_id: &str,
        now: i64,
    ) -> Result<TokenPair, AppError> {
        let access = Claims::access(user_id, session_id, now, self.access_ttl);
        let refresh = Claims::refresh(user_id, session_id, refresh_id, now, self.refresh_ttl);

        Ok(TokenPair {
            access_token: self.encode(&access)?,
            refresh_token: self.encode(&refresh)?,
            expires_in: self.access_ttl,
        })
    }
}
