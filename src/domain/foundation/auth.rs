//! Identity of the caller, as established from a verified ID token.
//!
//! The identity provider adapter fills these in through the
//! `SessionValidator` port; nothing here knows about Firebase or JWTs.

use super::UserId;
use thiserror::Error;

/// Signed-in user taken from ID token claims.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    /// Provider-issued user id (token `sub`).
    pub id: UserId,

    pub email: String,

    /// `name` claim.
    pub display_name: Option<String>,

    /// `picture` claim.
    pub photo_url: Option<String>,

    pub email_verified: bool,
}

impl AuthenticatedUser {
    pub fn new(
        id: UserId,
        email: impl Into<String>,
        display_name: Option<String>,
        email_verified: bool,
    ) -> Self {
        Self {
            id,
            email: email.into(),
            display_name,
            photo_url: None,
            email_verified,
        }
    }

    pub fn with_photo_url(mut self, photo_url: impl Into<String>) -> Self {
        self.photo_url = Some(photo_url.into());
        self
    }

    /// Email to store on the account. Phone and anonymous sign-ins carry an
    /// empty claim, which is treated as no email.
    pub fn contact_email(&self) -> Option<&str> {
        Some(self.email.trim()).filter(|e| !e.is_empty())
    }
}

/// Why a bearer token was not accepted.
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    /// Malformed token, bad signature, wrong issuer or audience.
    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Token expired")]
    TokenExpired,

    /// Signing keys could not be fetched.
    #[error("Auth service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl AuthError {
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::ServiceUnavailable(message.into())
    }

    /// True when the client's token is fine and a retry may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, AuthError::ServiceUnavailable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(email: &str) -> AuthenticatedUser {
        AuthenticatedUser::new(UserId::new("uid-7").unwrap(), email, None, false)
    }

    #[test]
    fn contact_email_is_trimmed() {
        assert_eq!(user("  ada@example.com ").contact_email(), Some("ada@example.com"));
    }

    #[test]
    fn blank_email_claim_is_no_email() {
        assert_eq!(user("").contact_email(), None);
        assert_eq!(user("   ").contact_email(), None);
    }

    #[test]
    fn photo_url_is_attached() {
        let user = user("a@example.com").with_photo_url("https://img.example.com/a.png");
        assert_eq!(user.photo_url.as_deref(), Some("https://img.example.com/a.png"));
    }

    #[test]
    fn only_provider_outages_are_transient() {
        assert!(AuthError::service_unavailable("jwks timeout").is_transient());
        assert!(!AuthError::InvalidToken.is_transient());
        assert!(!AuthError::TokenExpired.is_transient());
    }

    #[test]
    fn outage_message_is_kept() {
        let err = AuthError::service_unavailable("connection refused");
        assert_eq!(err.to_string(), "Auth service unavailable: connection refused");
    }
}
