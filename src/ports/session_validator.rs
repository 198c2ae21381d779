//! Bearer token verification port.

use async_trait::async_trait;

use crate::domain::foundation::{AuthError, AuthenticatedUser};

/// Turns a raw ID token into the caller's identity.
///
/// Implementations check signature, issuer, audience and expiry, and map the
/// token subject to `UserId`. Outages while fetching signing keys are
/// `AuthError::ServiceUnavailable` so the boundary can answer 503 instead of
/// forcing the client to sign in again.
#[async_trait]
pub trait SessionValidator: Send + Sync {
    /// `token` is the bare JWT, without the `Bearer ` scheme.
    async fn validate(&self, token: &str) -> Result<AuthenticatedUser, AuthError>;
}
