//! Authentication module
//!
//! Identifier generation, token encoding/validation, session lifecycle
//! and the login/refresh/logout protocol built on top of them.

mod claims;
mod id;
mod jwt;
mod service;
mod session;

pub use claims::Claims;
pub use claims::TokenType;
pub use id::new_id;
pub use id::new_id_with_len;
pub use id::DEFAULT_ID_BYTES;
pub use jwt::TokenCodec;
pub use jwt::TokenPair;
pub use service::AuthService;
pub use service::LoginInfo;
pub use service::LoginOutcome;
pub use service::MAX_DISPLAY_NAME_CHARS;
pub use session::hash_refresh_id;
pub use session::NewSession;
pub use session::SessionStore;
