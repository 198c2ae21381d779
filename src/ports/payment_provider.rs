//! Payment provider port for external payment processing.
//!
//! Defines the contract for payment gateway integrations (e.g., Stripe).
//! The application never drives billing state directly: it creates
//! customers, opens hosted checkout and portal sessions, and reads
//! subscriptions back while reconciling webhooks.

use crate::domain::billing::{BillingError, Plan, SubscriptionStatus, WebhookError};
use crate::domain::foundation::{
    CustomerRef, DomainError, PriceRef, ProductRef, SubscriptionRef, Timestamp, UserId,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Port for payment provider integrations.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Create a customer in the payment system.
    ///
    /// The user id is stored on the customer as metadata.
    async fn create_customer(&self, request: CreateCustomerRequest)
        -> Result<Customer, PaymentError>;

    /// Get a subscription with its price's product expanded.
    ///
    /// Returns `Ok(None)` if the provider does not know the subscription.
    async fn retrieve_subscription(
        &self,
        subscription: &SubscriptionRef,
    ) -> Result<Option<ProviderSubscription>, PaymentError>;

    /// Create a hosted checkout session for a subscription purchase.
    async fn create_checkout_session(
        &self,
        request: CreateCheckoutRequest,
    ) -> Result<CheckoutSession, PaymentError>;

    /// Create a billing portal session for subscription management.
    async fn create_portal_session(
        &self,
        customer: &CustomerRef,
        return_url: &str,
    ) -> Result<PortalSession, PaymentError>;
}

/// Request to create a customer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCustomerRequest {
    /// Internal user ID (stored as metadata).
    pub user_id: UserId,

    /// Customer email address.
    pub email: Option<String>,

    /// Customer name.
    pub name: Option<String>,

    /// Idempotency key for safe retries.
    pub idempotency_key: Option<String>,
}

/// Customer in the payment system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerRef,
    pub email: Option<String>,
}

/// Subscription as read back from the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSubscription {
    pub id: SubscriptionRef,
    pub customer: Option<CustomerRef>,
    pub status: SubscriptionStatus,
    pub current_period_end: Option<Timestamp>,
    pub price: Option<PriceRef>,
    pub product: Option<ProductRef>,

    /// The product's `plan` metadata value, if any.
    pub product_plan: Option<String>,
}

impl ProviderSubscription {
    /// Plan purchased, resolved from product metadata.
    pub fn plan(&self) -> Plan {
        Plan::from_product_metadata(self.product_plan.as_deref())
    }
}

/// Request to create a checkout session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCheckoutRequest {
    /// Internal user ID, stored as session metadata.
    pub user_id: UserId,

    /// Customer the subscription is created for.
    pub customer: CustomerRef,

    /// Price to subscribe to.
    pub price: PriceRef,

    /// URL to redirect after successful checkout.
    pub success_url: String,

    /// URL to redirect after canceled checkout.
    pub cancel_url: String,
}

/// Checkout session for payment completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSession {
    /// Provider's session ID.
    pub id: String,

    /// URL for customer to complete checkout.
    pub url: String,
}

/// Portal session for subscription management.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalSession {
    /// Provider's session ID.
    pub id: String,

    /// URL for customer to access portal.
    pub url: String,
}

/// Errors from payment provider operations.
#[derive(Debug, Clone, Serialize, Deserialize, Error)]
#[error("{code}: {message}")]
pub struct PaymentError {
    /// Error code for categorization.
    pub code: PaymentErrorCode,

    /// Human-readable message.
    pub message: String,

    /// Provider's error code (if available).
    pub provider_code: Option<String>,

    /// Whether the operation can be retried.
    pub retryable: bool,
}

impl PaymentError {
    /// Create a new payment error.
    pub fn new(code: PaymentErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            provider_code: None,
            retryable: code.is_retryable(),
        }
    }

    /// Create with provider code.
    pub fn with_provider_code(mut self, code: impl Into<String>) -> Self {
        self.provider_code = Some(code.into());
        self
    }

    /// Create a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(PaymentErrorCode::NetworkError, message)
    }

    /// Create an authentication error.
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(PaymentErrorCode::AuthenticationError, message)
    }

    /// Create an invalid request error.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(PaymentErrorCode::InvalidRequest, message)
    }

    /// Create a not found error.
    pub fn not_found(resource: &str) -> Self {
        Self::new(PaymentErrorCode::NotFound, format!("{} not found", resource))
    }

    /// Create a generic provider error.
    pub fn provider(message: impl Into<String>) -> Self {
        Self::new(PaymentErrorCode::ProviderError, message)
    }
}

impl From<PaymentError> for DomainError {
    fn from(err: PaymentError) -> Self {
        use crate::domain::foundation::ErrorCode;
        DomainError::new(ErrorCode::PaymentProviderError, err.message)
            .with_detail("payment_code", err.code.to_string())
    }
}

impl From<PaymentError> for BillingError {
    fn from(err: PaymentError) -> Self {
        BillingError::payment_provider(err.message, err.retryable)
    }
}

impl From<PaymentError> for WebhookError {
    fn from(err: PaymentError) -> Self {
        WebhookError::Provider(err.to_string())
    }
}

/// Payment error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(rename_all = "snake_case")]
pub enum PaymentErrorCode {
    /// Network connectivity issue.
    #[error("network_error")]
    NetworkError,

    /// API authentication failed.
    #[error("authentication_error")]
    AuthenticationError,

    /// Request rejected as malformed (bad price id, bad URL).
    #[error("invalid_request")]
    InvalidRequest,

    /// Resource not found.
    #[error("not_found")]
    NotFound,

    /// Rate limit exceeded.
    #[error("rate_limit_exceeded")]
    RateLimitExceeded,

    /// Provider API error.
    #[error("provider_error")]
    ProviderError,

    /// Unknown error.
    #[error("unknown")]
    Unknown,
}

impl PaymentErrorCode {
    /// Check if this error type is typically retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PaymentErrorCode::NetworkError
                | PaymentErrorCode::RateLimitExceeded
                | PaymentErrorCode::ProviderError
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payment_provider_is_object_safe() {
        fn _accepts_dyn(_provider: &dyn PaymentProvider) {}
    }

    fn subscription(product_plan: Option<&str>) -> ProviderSubscription {
        ProviderSubscription {
            id: SubscriptionRef::new("sub_1").unwrap(),
            customer: None,
            status: SubscriptionStatus::Active,
            current_period_end: None,
            price: None,
            product: None,
            product_plan: product_plan.map(str::to_string),
        }
    }

    #[test]
    fn provider_subscription_plan_reads_metadata() {
        assert_eq!(subscription(Some("pro")).plan(), Plan::Pro);
    }

    #[test]
    fn provider_subscription_plan_defaults_to_basic() {
        assert_eq!(subscription(None).plan(), Plan::Basic);
    }

    #[test]
    fn payment_error_retryable() {
        assert!(PaymentErrorCode::NetworkError.is_retryable());
        assert!(PaymentErrorCode::RateLimitExceeded.is_retryable());

        assert!(!PaymentErrorCode::InvalidRequest.is_retryable());
        assert!(!PaymentErrorCode::NotFound.is_retryable());
    }

    #[test]
    fn payment_error_display() {
        let err = PaymentError::invalid_request("No such price: 'price_x'");
        assert!(err.to_string().contains("invalid_request"));
        assert!(err.to_string().contains("No such price"));
    }

    #[test]
    fn payment_error_code_display_matches_serde_name() {
        for code in [
            PaymentErrorCode::NetworkError,
            PaymentErrorCode::AuthenticationError,
            PaymentErrorCode::InvalidRequest,
            PaymentErrorCode::NotFound,
            PaymentErrorCode::RateLimitExceeded,
            PaymentErrorCode::ProviderError,
            PaymentErrorCode::Unknown,
        ] {
            let serialized = serde_json::to_value(code).unwrap();
            assert_eq!(serialized, serde_json::Value::String(code.to_string()));
        }
    }

    #[test]
    fn payment_error_is_std_error() {
        let err: Box<dyn std::error::Error> = Box::new(PaymentError::not_found("customer"));
        assert_eq!(err.to_string(), "not_found: customer not found");
    }

    #[test]
    fn payment_error_into_webhook_error_is_retryable() {
        let err: WebhookError = PaymentError::network("timeout").into();
        assert!(err.is_retryable());
    }

    #[test]
    fn payment_error_into_billing_error_keeps_retryability() {
        let err: BillingError = PaymentError::invalid_request("bad").into();
        assert!(!err.is_retryable());
    }
}
