//! Stripe payment provider adapter.
//!
//! Implements the `PaymentProvider` trait against the Stripe REST API:
//! customers, subscription read-back, hosted checkout and the billing portal.
//! Webhook verification lives in the billing domain, not here.
//!
//! # Configuration
//!
//! ```ignore
//! let config = StripeConfig::new(api_key);
//! let adapter = StripePaymentAdapter::new(config);
//! ```

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;

use crate::domain::billing::USER_ID_METADATA_KEY;
use crate::domain::foundation::{CustomerRef, SubscriptionRef};
use crate::ports::{
    CheckoutSession, CreateCheckoutRequest, CreateCustomerRequest, Customer, PaymentError,
    PaymentErrorCode, PaymentProvider, PortalSession, ProviderSubscription,
};

use super::api_types::{StripeCustomer, StripeErrorResponse, StripeSessionResponse, StripeSubscription};

const DEFAULT_API_BASE_URL: &str = "https://api.stripe.com";

/// Expansion that brings the product (and its `plan` metadata) into the
/// subscription response.
const SUBSCRIPTION_EXPAND: &str = "items.data.price.product";

/// Stripe API configuration.
#[derive(Clone)]
pub struct StripeConfig {
    /// Stripe secret API key (sk_live_... or sk_test_...).
    api_key: SecretString,

    /// Base URL for Stripe API (default: https://api.stripe.com).
    api_base_url: String,

    /// Per-request timeout.
    timeout: Duration,
}

impl StripeConfig {
    /// Create a new Stripe configuration.
    pub fn new(api_key: SecretString) -> Self {
        Self {
            api_key,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Set a custom API base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Stripe payment provider adapter.
pub struct StripePaymentAdapter {
    config: StripeConfig,
    http_client: reqwest::Client,
}

impl StripePaymentAdapter {
    /// Create a new Stripe adapter with the given configuration.
    pub fn new(config: StripeConfig) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_default();

        Self {
            config,
            http_client,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base_url.trim_end_matches('/'), path)
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.http_client
            .post(self.url(path))
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
    }

    /// Sends a request and decodes a successful JSON body.
    async fn send<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        request: reqwest::RequestBuilder,
    ) -> Result<T, PaymentError> {
        let response = request
            .send()
            .await
            .map_err(|e| PaymentError::network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = error_from_response(status, &body);
            tracing::error!(
                operation,
                status = status.as_u16(),
                code = %err.code,
                error = %err.message,
                "Stripe request failed"
            );
            return Err(err);
        }

        response.json::<T>().await.map_err(|e| {
            PaymentError::new(
                PaymentErrorCode::ProviderError,
                format!("Failed to parse Stripe response: {}", e),
            )
        })
    }
}

/// Maps a non-success Stripe response to a payment error.
fn error_from_response(status: reqwest::StatusCode, body: &str) -> PaymentError {
    let parsed = serde_json::from_str::<StripeErrorResponse>(body).ok();
    let message = parsed
        .as_ref()
        .and_then(|e| e.error.message.clone())
        .unwrap_or_else(|| format!("Stripe API error ({})", status));

    let code = match status.as_u16() {
        401 | 403 => PaymentErrorCode::AuthenticationError,
        404 => PaymentErrorCode::NotFound,
        429 => PaymentErrorCode::RateLimitExceeded,
        400..=499 => PaymentErrorCode::InvalidRequest,
        500..=599 => PaymentErrorCode::ProviderError,
        _ => PaymentErrorCode::Unknown,
    };

    let err = PaymentError::new(code, message);
    match parsed.and_then(|e| e.error.code) {
        Some(provider_code) => err.with_provider_code(provider_code),
        None => err,
    }
}

#[async_trait]
impl PaymentProvider for StripePaymentAdapter {
    async fn create_customer(
        &self,
        request: CreateCustomerRequest,
    ) -> Result<Customer, PaymentError> {
        let metadata_key = format!("metadata[{}]", USER_ID_METADATA_KEY);
        let mut params = vec![(metadata_key.as_str(), request.user_id.to_string())];

        if let Some(email) = &request.email {
            params.push(("email", email.clone()));
        }
        if let Some(name) = &request.name {
            params.push(("name", name.clone()));
        }

        let mut builder = self.post("/v1/customers").form(&params);
        if let Some(key) = &request.idempotency_key {
            builder = builder.header("Idempotency-Key", key);
        }

        let customer: StripeCustomer = self.send("create_customer", builder).await?;

        Ok(Customer {
            id: CustomerRef::new(customer.id).map_err(|e| PaymentError::provider(e.to_string()))?,
            email: customer.email.or(request.email),
        })
    }

    async fn retrieve_subscription(
        &self,
        subscription: &SubscriptionRef,
    ) -> Result<Option<ProviderSubscription>, PaymentError> {
        let builder = self
            .http_client
            .get(self.url(&format!("/v1/subscriptions/{}", subscription)))
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
            .query(&[("expand[]", SUBSCRIPTION_EXPAND)]);

        match self
            .send::<StripeSubscription>("retrieve_subscription", builder)
            .await
        {
            Ok(sub) => Ok(Some(sub.try_into()?)),
            Err(err) if err.code == PaymentErrorCode::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn create_checkout_session(
        &self,
        request: CreateCheckoutRequest,
    ) -> Result<CheckoutSession, PaymentError> {
        let metadata_key = format!("metadata[{}]", USER_ID_METADATA_KEY);
        let subscription_metadata_key =
            format!("subscription_data[metadata][{}]", USER_ID_METADATA_KEY);

        let params = [
            ("mode", "subscription".to_string()),
            ("customer", request.customer.to_string()),
            ("line_items[0][price]", request.price.to_string()),
            ("line_items[0][quantity]", "1".to_string()),
            ("success_url", request.success_url),
            ("cancel_url", request.cancel_url),
            (metadata_key.as_str(), request.user_id.to_string()),
            (subscription_metadata_key.as_str(), request.user_id.to_string()),
        ];

        let session: StripeSessionResponse = self
            .send(
                "create_checkout_session",
                self.post("/v1/checkout/sessions").form(&params),
            )
            .await?;

        let url = session
            .url
            .ok_or_else(|| PaymentError::provider("Checkout session returned without a URL"))?;

        Ok(CheckoutSession {
            id: session.id,
            url,
        })
    }

    async fn create_portal_session(
        &self,
        customer: &CustomerRef,
        return_url: &str,
    ) -> Result<PortalSession, PaymentError> {
        let session: StripeSessionResponse = self
            .send(
                "create_portal_session",
                self.post("/v1/billing_portal/sessions")
                    .form(&[("customer", customer.as_str()), ("return_url", return_url)]),
            )
            .await?;

        let url = session
            .url
            .ok_or_else(|| PaymentError::provider("Portal session returned without a URL"))?;

        Ok(PortalSession {
            id: session.id,
            url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    fn test_config() -> StripeConfig {
        StripeConfig::new(SecretString::new("sk_test_key".to_string()))
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Configuration Tests
    // ════════════════════════════════════════════════════════════════════════════

    #[test]
    fn config_new_sets_defaults() {
        let config = test_config();
        assert_eq!(config.api_base_url, "https://api.stripe.com");
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[test]
    fn config_with_base_url() {
        let config = test_config().with_base_url("http://localhost:12111/");
        let adapter = StripePaymentAdapter::new(config);
        assert_eq!(
            adapter.url("/v1/customers"),
            "http://localhost:12111/v1/customers"
        );
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Error Mapping Tests
    // ════════════════════════════════════════════════════════════════════════════

    #[test]
    fn not_found_maps_to_not_found() {
        let body = r#"{"error":{"message":"No such subscription: 'sub_x'","code":"resource_missing","type":"invalid_request_error"}}"#;
        let err = error_from_response(StatusCode::NOT_FOUND, body);

        assert_eq!(err.code, PaymentErrorCode::NotFound);
        assert_eq!(err.provider_code.as_deref(), Some("resource_missing"));
        assert!(err.message.contains("No such subscription"));
    }

    #[test]
    fn bad_request_is_not_retryable() {
        let err = error_from_response(StatusCode::BAD_REQUEST, "{}");
        assert_eq!(err.code, PaymentErrorCode::InvalidRequest);
        assert!(!err.retryable);
    }

    #[test]
    fn unauthorized_maps_to_authentication_error() {
        let err = error_from_response(StatusCode::UNAUTHORIZED, "not json");
        assert_eq!(err.code, PaymentErrorCode::AuthenticationError);
        assert!(err.message.contains("401"));
    }

    #[test]
    fn rate_limit_and_server_errors_are_retryable() {
        assert!(error_from_response(StatusCode::TOO_MANY_REQUESTS, "").retryable);
        assert!(error_from_response(StatusCode::BAD_GATEWAY, "").retryable);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Transport Tests
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn unreachable_api_is_a_network_error() {
        let adapter = StripePaymentAdapter::new(
            test_config()
                .with_base_url("http://127.0.0.1:9")
                .with_timeout(Duration::from_secs(2)),
        );

        let err = adapter
            .retrieve_subscription(&SubscriptionRef::new("sub_1").unwrap())
            .await
            .unwrap_err();

        assert_eq!(err.code, PaymentErrorCode::NetworkError);
        assert!(err.retryable);
    }
}
