//! CreateCheckoutSessionHandler - Opens a hosted subscription checkout.
//!
//! The provider customer is created lazily on first checkout and linked to
//! the account. Plan and status are never written here; the
//! `checkout.session.completed` webhook does that.

use std::sync::Arc;

use crate::domain::billing::{AccountPatch, BillingError, UserAccount};
use crate::domain::foundation::{CustomerRef, PriceRef, UserId};
use crate::ports::{
    AccountRepository, CheckoutSession, CreateCheckoutRequest, CreateCustomerRequest,
    PaymentProvider,
};

/// Command to start checkout for a price.
#[derive(Debug, Clone)]
pub struct CreateCheckoutSessionCommand {
    pub user_id: UserId,
    pub price_ref: Option<String>,
    /// Where to land after payment; defaults to the dashboard.
    pub return_url: Option<String>,
}

pub struct CreateCheckoutSessionHandler {
    accounts: Arc<dyn AccountRepository>,
    payment_provider: Arc<dyn PaymentProvider>,
    app_base_url: String,
}

impl CreateCheckoutSessionHandler {
    pub fn new(
        accounts: Arc<dyn AccountRepository>,
        payment_provider: Arc<dyn PaymentProvider>,
        app_base_url: impl Into<String>,
    ) -> Self {
        Self {
            accounts,
            payment_provider,
            app_base_url: app_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub async fn handle(
        &self,
        cmd: CreateCheckoutSessionCommand,
    ) -> Result<CheckoutSession, BillingError> {
        let price = cmd
            .price_ref
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| BillingError::validation("price_ref", "Price ID is required"))
            .and_then(|p| PriceRef::new(p).map_err(BillingError::from))?;

        let account = self
            .accounts
            .find(&cmd.user_id)
            .await?
            .ok_or_else(|| BillingError::account_not_found(cmd.user_id.clone()))?;

        let customer = self.ensure_customer(&account).await?;

        let session = self
            .payment_provider
            .create_checkout_session(CreateCheckoutRequest {
                user_id: cmd.user_id.clone(),
                customer,
                price: price.clone(),
                success_url: cmd
                    .return_url
                    .unwrap_or_else(|| format!("{}/dashboard?success=true", self.app_base_url)),
                cancel_url: format!("{}/pricing?canceled=true", self.app_base_url),
            })
            .await?;

        tracing::info!(
            user_id = %cmd.user_id,
            price_ref = %price,
            session_id = %session.id,
            "Checkout session created"
        );
        Ok(session)
    }

    async fn ensure_customer(&self, account: &UserAccount) -> Result<CustomerRef, BillingError> {
        if let Some(customer) = &account.billing_customer_ref {
            return Ok(customer.clone());
        }

        let customer = self
            .payment_provider
            .create_customer(CreateCustomerRequest {
                user_id: account.id.clone(),
                email: account.email.clone(),
                name: account.display_name.clone(),
                idempotency_key: Some(format!("customer-{}", account.id)),
            })
            .await?;

        // The store keeps whichever customer was linked first.
        let linked = self
            .accounts
            .upsert(&account.id, &AccountPatch::billing_customer(customer.id.clone()))
            .await?;

        tracing::info!(user_id = %account.id, customer_ref = %customer.id, "Billing customer linked");
        Ok(linked.billing_customer_ref.unwrap_or(customer.id))
    }
}
