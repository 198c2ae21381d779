//! Mock payment provider for testing.
//!
//! Configurable implementation of `PaymentProvider` for unit and integration
//! tests. Supports:
//! - Pre-configured subscriptions
//! - Error injection per method
//! - Call tracking

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::domain::foundation::{CustomerRef, SubscriptionRef};
use crate::ports::{
    CheckoutSession, CreateCheckoutRequest, CreateCustomerRequest, Customer, PaymentError,
    PaymentProvider, PortalSession, ProviderSubscription,
};

/// Mock payment provider for testing.
///
/// # Example
///
/// ```ignore
/// let mock = MockPaymentProvider::new();
/// mock.add_subscription(subscription);
/// mock.set_method_error("create_portal_session", PaymentError::network("down"));
/// ```
#[derive(Default, Clone)]
pub struct MockPaymentProvider {
    inner: Arc<Mutex<MockState>>,
}

#[derive(Default)]
struct MockState {
    /// Subscriptions by ID.
    subscriptions: HashMap<String, ProviderSubscription>,

    /// Counter for generated customer ids.
    customers_created: u32,

    /// Specific errors by method name.
    method_errors: HashMap<String, PaymentError>,

    /// Track method calls for assertions.
    call_log: Vec<MethodCall>,

    /// Checkout requests received.
    checkout_requests: Vec<CreateCheckoutRequest>,
}

/// Recorded method call for assertions.
#[derive(Debug, Clone)]
pub struct MethodCall {
    pub method: String,
    pub args: Vec<String>,
}

impl MockPaymentProvider {
    pub fn new() -> Self {
        Self::default()
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Configuration Methods
    // ════════════════════════════════════════════════════════════════════════════

    /// Add a subscription to the "provider".
    pub fn add_subscription(&self, subscription: ProviderSubscription) {
        let id = subscription.id.as_str().to_string();
        self.inner.lock().unwrap().subscriptions.insert(id, subscription);
    }

    /// Set an error for a specific method.
    pub fn set_method_error(&self, method: &str, error: PaymentError) {
        self.inner
            .lock()
            .unwrap()
            .method_errors
            .insert(method.to_string(), error);
    }

    /// Clear all configured errors.
    pub fn clear_errors(&self) {
        self.inner.lock().unwrap().method_errors.clear();
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Call Tracking
    // ════════════════════════════════════════════════════════════════════════════

    /// Get all recorded method calls.
    pub fn calls(&self) -> Vec<MethodCall> {
        self.inner.lock().unwrap().call_log.clone()
    }

    /// Number of times a method was called.
    pub fn call_count(&self, method: &str) -> usize {
        self.inner
            .lock()
            .unwrap()
            .call_log
            .iter()
            .filter(|c| c.method == method)
            .count()
    }

    /// Checkout requests received, oldest first.
    pub fn checkout_requests(&self) -> Vec<CreateCheckoutRequest> {
        self.inner.lock().unwrap().checkout_requests.clone()
    }

    fn record(&self, method: &str, args: Vec<String>) -> Result<(), PaymentError> {
        let mut state = self.inner.lock().unwrap();
        state.call_log.push(MethodCall {
            method: method.to_string(),
            args,
        });
        match state.method_errors.get(method) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl PaymentProvider for MockPaymentProvider {
    async fn create_customer(
        &self,
        request: CreateCustomerRequest,
    ) -> Result<Customer, PaymentError> {
        self.record("create_customer", vec![request.user_id.to_string()])?;

        let mut state = self.inner.lock().unwrap();
        state.customers_created += 1;
        let id = format!("cus_mock_{}", state.customers_created);

        Ok(Customer {
            id: CustomerRef::new(id).map_err(|e| PaymentError::provider(e.to_string()))?,
            email: request.email,
        })
    }

    async fn retrieve_subscription(
        &self,
        subscription: &SubscriptionRef,
    ) -> Result<Option<ProviderSubscription>, PaymentError> {
        self.record("retrieve_subscription", vec![subscription.to_string()])?;

        Ok(self
            .inner
            .lock()
            .unwrap()
            .subscriptions
            .get(subscription.as_str())
            .cloned())
    }

    async fn create_checkout_session(
        &self,
        request: CreateCheckoutRequest,
    ) -> Result<CheckoutSession, PaymentError> {
        self.record(
            "create_checkout_session",
            vec![request.customer.to_string(), request.price.to_string()],
        )?;

        let mut state = self.inner.lock().unwrap();
        let id = format!("cs_mock_{}", state.checkout_requests.len() + 1);
        state.checkout_requests.push(request);

        Ok(CheckoutSession {
            url: format!("https://checkout.stripe.test/c/{}", id),
            id,
        })
    }

    async fn create_portal_session(
        &self,
        customer: &CustomerRef,
        return_url: &str,
    ) -> Result<PortalSession, PaymentError> {
        self.record(
            "create_portal_session",
            vec![customer.to_string(), return_url.to_string()],
        )?;

        Ok(PortalSession {
            id: "bps_mock".to_string(),
            url: format!("https://billing.stripe.test/p/{}", customer),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::billing::SubscriptionStatus;
    use crate::domain::foundation::UserId;

    fn subscription() -> ProviderSubscription {
        ProviderSubscription {
            id: SubscriptionRef::new("sub_1").unwrap(),
            customer: Some(CustomerRef::new("cus_1").unwrap()),
            status: SubscriptionStatus::Active,
            current_period_end: None,
            price: None,
            product: None,
            product_plan: Some("pro".to_string()),
        }
    }

    #[tokio::test]
    async fn returns_configured_subscription() {
        let mock = MockPaymentProvider::new();
        mock.add_subscription(subscription());

        let found = mock
            .retrieve_subscription(&SubscriptionRef::new("sub_1").unwrap())
            .await
            .unwrap();

        assert_eq!(found, Some(subscription()));
        assert_eq!(mock.call_count("retrieve_subscription"), 1);
    }

    #[tokio::test]
    async fn unknown_subscription_is_none() {
        let mock = MockPaymentProvider::new();

        let found = mock
            .retrieve_subscription(&SubscriptionRef::new("sub_x").unwrap())
            .await
            .unwrap();

        assert!(found.is_none());
    }

    #[tokio::test]
    async fn create_customer_generates_distinct_ids() {
        let mock = MockPaymentProvider::new();
        let request = CreateCustomerRequest {
            user_id: UserId::new("uid-1").unwrap(),
            email: None,
            name: None,
            idempotency_key: None,
        };

        let a = mock.create_customer(request.clone()).await.unwrap();
        let b = mock.create_customer(request).await.unwrap();

        assert_ne!(a.id, b.id);
    }

    #[tokio::test]
    async fn method_error_is_returned_and_call_recorded() {
        let mock = MockPaymentProvider::new();
        mock.set_method_error("create_portal_session", PaymentError::network("down"));

        let result = mock
            .create_portal_session(&CustomerRef::new("cus_1").unwrap(), "https://app/x")
            .await;

        assert!(result.is_err());
        assert_eq!(mock.calls().len(), 1);

        mock.clear_errors();
        assert!(mock
            .create_portal_session(&CustomerRef::new("cus_1").unwrap(), "https://app/x")
            .await
            .is_ok());
    }
}
