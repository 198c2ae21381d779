//! HTTP middleware for axum.
//!
//! - `auth` - Bearer token validation and auth extractors

pub mod auth;

pub use auth::{auth_middleware, bearer_token, AuthRejection, AuthState, OptionalAuth, RequireAuth};
