//! Identifier Generation
//!
//! Short, URL-safe, unguessable identifiers for users, sessions and refresh
//! ids. Bytes come from the operating system CSPRNG, since session and
//! refresh ids double as bearer secrets.

use std::collections::HashSet;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;

use crate::error::AppError;

/// Default entropy in bytes (12 characters once encoded)
pub const DEFAULT_ID_BYTES: usize = 9;

const MAX_ATTEMPTS: usize = 32;

/// Generate an identifier with the default length that is not in `exclude`
pub fn new_id(exclude: &HashSet<String>) -> Result<String, AppError> {
    new_id_with_len(exclude, DEFAULT_ID_BYTES)
}

/// Generate an identifier from `len` random bytes that is not in `exclude`
///
/// # Errors
/// Returns `AppError::Conflict` if every attempt collided. With 9+ bytes
/// this does not happen in practice; it exists so a tiny `len` against a
/// saturated exclusion set fails instead of spinning.
pub fn new_id_with_len(exclude: &HashSet<String>, len: usize) -> Result<String, AppError> {
    let mut bytes = vec![0u8; len];

    for _ in 0..MAX_ATTEMPTS {
        OsRng.fill_bytes(&mut bytes);
        let candidate = URL_SAFE_NO_PAD.encode(&bytes);

        if !exclude.contains(&candidate) {
            return Ok(candidate);
        }
    }

    Err(AppError::Conflict(format!(
        "no free identifier of {} bytes after {} attempts",
        len, MAX_ATTEMPTS
    )))
}
