//! CreatePortalSessionHandler - Opens the provider's billing portal.

use std::sync::Arc;

use crate::domain::billing::BillingError;
use crate::domain::foundation::UserId;
use crate::ports::{AccountRepository, PaymentProvider, PortalSession};

/// Command to open the billing portal.
#[derive(Debug, Clone)]
pub struct CreatePortalSessionCommand {
    pub user_id: UserId,
    pub return_url: Option<String>,
}

pub struct CreatePortalSessionHandler {
    accounts: Arc<dyn AccountRepository>,
    payment_provider: Arc<dyn PaymentProvider>,
    app_base_url: String,
}

impl CreatePortalSessionHandler {
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

    pub async fn handle(&self, cmd: CreatePortalSessionCommand) -> Result<PortalSession, BillingError> {
        let account = self
            .accounts
            .find(&cmd.user_id)
            .await?
            .ok_or_else(|| BillingError::account_not_found(cmd.user_id.clone()))?;

        let customer = account
            .billing_customer_ref
            .ok_or_else(|| BillingError::no_billing_customer(cmd.user_id.clone()))?;

        let return_url = cmd
            .return_url
            .unwrap_or_else(|| format!("{}/dashboard", self.app_base_url));

        let session = self
            .payment_provider
            .create_portal_session(&customer, &return_url)
            .await?;

        tracing::info!(user_id = %cmd.user_id, customer_ref = %customer, "Portal session created");
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::storage::InMemoryAccountStore;
    use crate::adapters::stripe::MockPaymentProvider;
    use crate::domain::billing::{AccountPatch, UserAccount};
    use crate::domain::foundation::{CustomerRef, Timestamp};

    fn uid() -> UserId {
        UserId::new("uid-1").unwrap()
    }

    async fn store(with_customer: bool) -> InMemoryAccountStore {
        let store = InMemoryAccountStore::new();
        store
            .insert_if_absent(&UserAccount::register(uid(), None, None, None, Timestamp::now()))
            .await
            .unwrap();
        if with_customer {
            store
                .upsert(&uid(), &AccountPatch::billing_customer(CustomerRef::new("cus_9").unwrap()))
                .await
                .unwrap();
        }
        store
    }

    fn handler(store: InMemoryAccountStore, provider: &MockPaymentProvider) -> CreatePortalSessionHandler {
        CreatePortalSessionHandler::new(
            Arc::new(store),
            Arc::new(provider.clone()),
            "https://app.example.com",
        )
    }

    #[tokio::test]
    async fn opens_portal_for_linked_customer() {
        let provider = MockPaymentProvider::new();

        let session = handler(store(true).await, &provider)
            .handle(CreatePortalSessionCommand { user_id: uid(), return_url: None })
            .await
            .unwrap();

        assert!(session.url.contains("cus_9"));
        assert_eq!(provider.call_count("create_portal_session"), 1);
    }

    #[tokio::test]
    async fn account_without_customer_is_rejected() {
        let provider = MockPaymentProvider::new();

        let err = handler(store(false).await, &provider)
            .handle(CreatePortalSessionCommand { user_id: uid(), return_url: None })
            .await
            .unwrap_err();

        assert!(matches!(err, BillingError::NoBillingCustomer(_)));
        assert_eq!(err.message(), "Customer has no subscription");
        assert!(provider.calls().is_empty());
    }

    #[tokio::test]
    async fn missing_account_is_not_found() {
        let provider = MockPaymentProvider::new();

        let err = handler(InMemoryAccountStore::new(), &provider)
            .handle(CreatePortalSessionCommand { user_id: uid(), return_url: None })
            .await
            .unwrap_err();

        assert!(matches!(err, BillingError::AccountNotFound(_)));
    }
}
