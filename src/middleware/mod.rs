//! Middleware module
//!
//! Bearer-token authentication for protected routes.

mod jwt_middleware;

pub use jwt_middleware::bearer_token;
pub use jwt_middleware::JwtMiddleware;
