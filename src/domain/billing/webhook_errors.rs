//! Webhook error types for Stripe webhook handling.
//!
//! Status codes decide the provider's redelivery behaviour: 2xx acknowledges,
//! 4xx is never retried, 5xx is redelivered.

use axum::http::StatusCode;
use thiserror::Error;

/// Errors that occur during webhook processing.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// No `Stripe-Signature` header on the request.
    #[error("Missing signature header")]
    MissingSignature,

    /// No signing secret is configured on this server.
    #[error("Webhook secret not configured")]
    SecretNotConfigured,

    /// Webhook signature verification failed.
    #[error("Invalid signature")]
    InvalidSignature,

    /// Webhook timestamp is older than the tolerance window (5 minutes).
    #[error("Timestamp out of range")]
    TimestampOutOfRange,

    /// Event timestamp is in the future beyond clock skew tolerance.
    #[error("Invalid timestamp")]
    InvalidTimestamp,

    /// Failed to parse webhook payload or signature header.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Required field missing from webhook payload.
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    /// Payment provider lookup failed during reconciliation.
    #[error("Payment provider error: {0}")]
    Provider(String),

    /// Store write or read failed.
    #[error("Database error: {0}")]
    Database(String),
}

impl WebhookError {
    /// Returns true if Stripe should retry delivering this webhook.
    pub fn is_retryable(&self) -> bool {
        matches!(self, WebhookError::Database(_) | WebhookError::Provider(_))
    }

    /// Returns true if the failure happened before the payload was trusted.
    pub fn is_verification_failure(&self) -> bool {
        matches!(
            self,
            WebhookError::MissingSignature
                | WebhookError::SecretNotConfigured
                | WebhookError::InvalidSignature
                | WebhookError::TimestampOutOfRange
                | WebhookError::InvalidTimestamp
        )
    }

    /// Maps the error to an HTTP status code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            // Verification failures - never retried
            WebhookError::MissingSignature
            | WebhookError::SecretNotConfigured
            | WebhookError::InvalidSignature
            | WebhookError::TimestampOutOfRange
            | WebhookError::InvalidTimestamp => StatusCode::BAD_REQUEST,

            // Malformed payloads - never retried
            WebhookError::ParseError(_) | WebhookError::MissingField(_) => {
                StatusCode::BAD_REQUEST
            }

            // Server errors - will retry
            WebhookError::Provider(_) | WebhookError::Database(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ══════════════════════════════════════════════════════════════
    // Display Tests
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn invalid_signature_displays_correctly() {
        assert_eq!(WebhookError::InvalidSignature.to_string(), "Invalid signature");
    }

    #[test]
    fn parse_error_displays_message() {
        let err = WebhookError::ParseError("invalid JSON".to_string());
        assert_eq!(err.to_string(), "Parse error: invalid JSON");
    }

    #[test]
    fn missing_field_displays_field_name() {
        let err = WebhookError::MissingField("subscription");
        assert_eq!(err.to_string(), "Missing field: subscription");
    }

    // ══════════════════════════════════════════════════════════════
    // Retryability Tests
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn database_error_is_retryable() {
        assert!(WebhookError::Database("connection failed".to_string()).is_retryable());
    }

    #[test]
    fn provider_error_is_retryable() {
        assert!(WebhookError::Provider("timeout".to_string()).is_retryable());
    }

    #[test]
    fn verification_failures_are_not_retryable() {
        for err in [
            WebhookError::MissingSignature,
            WebhookError::SecretNotConfigured,
            WebhookError::InvalidSignature,
            WebhookError::TimestampOutOfRange,
            WebhookError::InvalidTimestamp,
        ] {
            assert!(err.is_verification_failure());
            assert!(!err.is_retryable());
        }
    }

    // ══════════════════════════════════════════════════════════════
    // Status Code Tests
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn invalid_signature_returns_bad_request() {
        assert_eq!(WebhookError::InvalidSignature.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn missing_signature_returns_bad_request() {
        assert_eq!(WebhookError::MissingSignature.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn parse_error_returns_bad_request() {
        let err = WebhookError::ParseError("syntax error".to_string());
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn database_error_returns_internal_error() {
        let err = WebhookError::Database("connection lost".to_string());
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
