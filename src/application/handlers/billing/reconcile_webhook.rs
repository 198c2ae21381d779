//! ReconcileWebhookHandler - Projects verified Stripe events onto account state.
//!
//! Every write is a keyed overwrite of the fields the event carries, so a
//! redelivered event converges on the same state. Store failures surface as
//! retryable errors; everything else is acknowledged.

use std::sync::Arc;

use crate::domain::billing::{
    AccountPatch, BillingEvent, CheckoutCompleted, Plan, StripeEvent, SubscriptionChanged,
    SubscriptionPatch, SubscriptionStatus, UserAccount, WebhookError,
};
use crate::domain::foundation::{DomainError, SubscriptionRef, UserId};
use crate::ports::{
    AccountChangeNotifier, AccountChanged, AccountRepository, PaymentProvider,
    SubscriptionRepository,
};

/// What reconciliation did with an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Checkout completed and the purchased plan was written.
    CheckoutApplied {
        user_id: UserId,
        subscription_ref: SubscriptionRef,
        plan: Plan,
    },
    /// Subscription status and period were synced to its owner.
    SubscriptionSynced {
        user_id: UserId,
        subscription_ref: SubscriptionRef,
        status: SubscriptionStatus,
    },
    /// No owner is recorded for this subscription; nothing was written.
    UnknownSubscription { subscription_ref: SubscriptionRef },
    /// Event was well-formed but carried nothing to apply.
    Ignored { reason: String },
    /// Event type outside the handled set.
    Unhandled { event_type: String },
}

/// Handler for verified payment-provider webhooks.
pub struct ReconcileWebhookHandler {
    accounts: Arc<dyn AccountRepository>,
    subscriptions: Arc<dyn SubscriptionRepository>,
    payment_provider: Arc<dyn PaymentProvider>,
    notifier: Arc<dyn AccountChangeNotifier>,
}

impl ReconcileWebhookHandler {
    pub fn new(
        accounts: Arc<dyn AccountRepository>,
        subscriptions: Arc<dyn SubscriptionRepository>,
        payment_provider: Arc<dyn PaymentProvider>,
        notifier: Arc<dyn AccountChangeNotifier>,
    ) -> Self {
        Self {
            accounts,
            subscriptions,
            payment_provider,
            notifier,
        }
    }

    /// Applies one verified event.
    ///
    /// # Errors
    ///
    /// - `ParseError` / `MissingField` for malformed payloads of handled types
    /// - `Provider` when the subscription lookup fails
    /// - `Database` when a store read or write fails
    pub async fn handle(&self, event: &StripeEvent) -> Result<ReconcileOutcome, WebhookError> {
        let billing_event = BillingEvent::from_stripe(event)?;

        tracing::debug!(
            event_id = %event.id,
            event_type = %event.event_type,
            kind = billing_event.kind(),
            "Reconciling webhook event"
        );

        match billing_event {
            BillingEvent::CheckoutCompleted(checkout) => {
                self.checkout_completed(&event.id, checkout).await
            }
            BillingEvent::SubscriptionUpdated(change) => {
                self.subscription_changed(&event.id, change, false).await
            }
            BillingEvent::SubscriptionDeleted(change) => {
                self.subscription_changed(&event.id, change, true).await
            }
            BillingEvent::Unhandled { event_type } => {
                tracing::debug!(event_id = %event.id, event_type = %event_type, "Unhandled event type");
                Ok(ReconcileOutcome::Unhandled { event_type })
            }
        }
    }

    async fn checkout_completed(
        &self,
        event_id: &str,
        checkout: CheckoutCompleted,
    ) -> Result<ReconcileOutcome, WebhookError> {
        let Some(user_id) = checkout.user_id else {
            tracing::warn!(
                event_id,
                session_id = %checkout.session_id,
                "Checkout session has no user metadata"
            );
            return Ok(ignored("checkout session has no user metadata"));
        };
        let Some(subscription_ref) = checkout.subscription_ref else {
            tracing::warn!(
                event_id,
                session_id = %checkout.session_id,
                user_id = %user_id,
                "Checkout session has no subscription"
            );
            return Ok(ignored("checkout session has no subscription"));
        };

        let Some(subscription) = self
            .payment_provider
            .retrieve_subscription(&subscription_ref)
            .await?
        else {
            tracing::error!(
                event_id,
                user_id = %user_id,
                subscription_ref = %subscription_ref,
                "Provider does not know the checked-out subscription"
            );
            return Ok(ignored("subscription not found at provider"));
        };

        let plan = if subscription.status.demotes_to_free() {
            Plan::Free
        } else {
            subscription.plan()
        };
        let customer = checkout.customer_ref.or(subscription.customer.clone());

        let mut account_patch =
            AccountPatch::subscription_sync(subscription.status, subscription.current_period_end)
                .with_plan(plan)
                .with_subscription(subscription_ref.clone())
                .with_price(subscription.price.clone());
        if let Some(customer) = &customer {
            account_patch = account_patch.with_customer(customer.clone());
        }

        let record_patch = SubscriptionPatch {
            user_id: Some(user_id.clone()),
            customer_ref: customer,
            status: Some(subscription.status),
            plan: Some(plan),
            price_ref: subscription.price,
            product_ref: subscription.product,
            current_period_end: subscription.current_period_end,
        };

        let account = self
            .accounts
            .upsert(&user_id, &account_patch)
            .await
            .map_err(store_error)?;
        self.subscriptions
            .upsert(&subscription_ref, &record_patch)
            .await
            .map_err(store_error)?;

        tracing::info!(
            event_id,
            user_id = %user_id,
            subscription_ref = %subscription_ref,
            plan = plan.as_str(),
            status = subscription.status.as_str(),
            "Checkout reconciled"
        );

        self.announce(&account).await;

        Ok(ReconcileOutcome::CheckoutApplied {
            user_id,
            subscription_ref,
            plan,
        })
    }

    async fn subscription_changed(
        &self,
        event_id: &str,
        change: SubscriptionChanged,
        deleted: bool,
    ) -> Result<ReconcileOutcome, WebhookError> {
        let Some(record) = self
            .subscriptions
            .find(&change.subscription_ref)
            .await
            .map_err(store_error)?
        else {
            tracing::info!(
                event_id,
                subscription_ref = %change.subscription_ref,
                "No owner recorded for subscription, skipping"
            );
            return Ok(ReconcileOutcome::UnknownSubscription {
                subscription_ref: change.subscription_ref,
            });
        };

        let user_id = record.user_id;
        let demote = deleted || change.status.demotes_to_free();

        let mut record_patch = SubscriptionPatch::sync(change.status, change.current_period_end);
        if demote {
            record_patch = record_patch.with_plan(Plan::Free);
        }

        let mut account_patch =
            AccountPatch::subscription_sync(change.status, change.current_period_end);
        if demote {
            account_patch = account_patch.with_plan(Plan::Free);
        }
        let account = self
            .accounts
            .upsert(&user_id, &account_patch)
            .await
            .map_err(store_error)?;

        self.subscriptions
            .upsert(&change.subscription_ref, &record_patch)
            .await
            .map_err(store_error)?;

        tracing::info!(
            event_id,
            user_id = %user_id,
            subscription_ref = %change.subscription_ref,
            status = change.status.as_str(),
            demoted = demote,
            "Subscription reconciled"
        );

        self.announce(&account).await;

        Ok(ReconcileOutcome::SubscriptionSynced {
            user_id,
            subscription_ref: change.subscription_ref,
            status: change.status,
        })
    }

    async fn announce(&self, account: &UserAccount) {
        if let Err(e) = self.notifier.notify(AccountChanged::from_account(account)).await {
            tracing::warn!(user_id = %account.id, error = %e, "Failed to announce account change");
        }
    }
}

fn ignored(reason: &str) -> ReconcileOutcome {
    ReconcileOutcome::Ignored {
        reason: reason.to_string(),
    }
}

fn store_error(e: DomainError) -> WebhookError {
    WebhookError::Database(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::events::AccountChangeBus;
    use crate::adapters::storage::InMemoryAccountStore;
    use crate::adapters::stripe::MockPaymentProvider;
    use crate::domain::billing::StripeEventBuilder;
    use crate::domain::foundation::{CustomerRef, ErrorCode, PriceRef, ProductRef, Timestamp};
    use crate::ports::{AccountChangeSubscriber, PaymentError, ProviderSubscription};
    use futures::StreamExt;
    use serde_json::json;

    // ════════════════════════════════════════════════════════════════════════════
    // Test Helpers
    // ════════════════════════════════════════════════════════════════════════════

    struct Fixture {
        store: InMemoryAccountStore,
        provider: MockPaymentProvider,
        bus: AccountChangeBus,
        handler: ReconcileWebhookHandler,
    }

    fn fixture() -> Fixture {
        let store = InMemoryAccountStore::new();
        let provider = MockPaymentProvider::new();
        let bus = AccountChangeBus::default();
        let handler = ReconcileWebhookHandler::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Arc::new(provider.clone()),
            Arc::new(bus.clone()),
        );
        Fixture {
            store,
            provider,
            bus,
            handler,
        }
    }

    fn uid() -> UserId {
        UserId::new("uid-1").unwrap()
    }

    fn sub_ref(id: &str) -> SubscriptionRef {
        SubscriptionRef::new(id).unwrap()
    }

    fn provider_subscription(
        id: &str,
        status: SubscriptionStatus,
        plan_metadata: Option<&str>,
    ) -> ProviderSubscription {
        ProviderSubscription {
            id: sub_ref(id),
            customer: Some(CustomerRef::new("cus_1").unwrap()),
            status,
            current_period_end: Timestamp::from_unix_secs(1_900_000_000),
            price: Some(PriceRef::new("price_pro").unwrap()),
            product: Some(ProductRef::new("prod_pro").unwrap()),
            product_plan: plan_metadata.map(str::to_string),
        }
    }

    fn checkout_event(subscription: &str) -> StripeEvent {
        StripeEventBuilder::new()
            .id("evt_checkout")
            .event_type("checkout.session.completed")
            .object(json!({
                "id": "cs_1",
                "object": "checkout.session",
                "customer": "cus_1",
                "subscription": subscription,
                "metadata": { "firebaseUID": "uid-1" }
            }))
            .build()
    }

    fn subscription_event(event_type: &str, subscription: &str, status: &str) -> StripeEvent {
        StripeEventBuilder::new()
            .id("evt_sub")
            .event_type(event_type)
            .object(json!({
                "id": subscription,
                "object": "subscription",
                "customer": "cus_1",
                "status": status,
                "current_period_end": 1_950_000_000
            }))
            .build()
    }

    async fn account(store: &InMemoryAccountStore) -> UserAccount {
        AccountRepository::find(store, &uid()).await.unwrap().unwrap()
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Checkout Tests
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn checkout_writes_plan_and_subscription_to_both_records() {
        let f = fixture();
        f.provider.add_subscription(provider_subscription(
            "sub_1",
            SubscriptionStatus::Active,
            Some("pro"),
        ));

        let outcome = f.handler.handle(&checkout_event("sub_1")).await.unwrap();

        assert_eq!(
            outcome,
            ReconcileOutcome::CheckoutApplied {
                user_id: uid(),
                subscription_ref: sub_ref("sub_1"),
                plan: Plan::Pro,
            }
        );

        let account = account(&f.store).await;
        assert_eq!(account.plan, Plan::Pro);
        assert_eq!(account.subscription_status, SubscriptionStatus::Active);
        assert_eq!(account.subscription_ref, Some(sub_ref("sub_1")));
        assert_eq!(account.billing_customer_ref.unwrap().as_str(), "cus_1");
        assert_eq!(account.subscription_price_ref.unwrap().as_str(), "price_pro");
        assert!(account.current_period_end.is_some());

        let record = SubscriptionRepository::find(&f.store, &sub_ref("sub_1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.user_id, uid());
        assert_eq!(record.plan, Plan::Pro);
        assert_eq!(record.product_ref.unwrap().as_str(), "prod_pro");
    }

    #[tokio::test]
    async fn checkout_looks_up_subscription_exactly_once() {
        let f = fixture();
        f.provider.add_subscription(provider_subscription(
            "sub_1",
            SubscriptionStatus::Active,
            Some("basic"),
        ));

        f.handler.handle(&checkout_event("sub_1")).await.unwrap();

        assert_eq!(f.provider.call_count("retrieve_subscription"), 1);
    }

    #[tokio::test]
    async fn checkout_without_plan_metadata_defaults_to_basic() {
        let f = fixture();
        f.provider
            .add_subscription(provider_subscription("sub_1", SubscriptionStatus::Active, None));

        f.handler.handle(&checkout_event("sub_1")).await.unwrap();

        assert_eq!(account(&f.store).await.plan, Plan::Basic);
    }

    #[tokio::test]
    async fn checkout_of_unpaid_subscription_stays_free() {
        let f = fixture();
        f.provider.add_subscription(provider_subscription(
            "sub_1",
            SubscriptionStatus::Unpaid,
            Some("pro"),
        ));

        f.handler.handle(&checkout_event("sub_1")).await.unwrap();

        let account = account(&f.store).await;
        assert_eq!(account.plan, Plan::Free);
        assert_eq!(account.subscription_status, SubscriptionStatus::Unpaid);
    }

    #[tokio::test]
    async fn checkout_without_user_metadata_is_ignored() {
        let f = fixture();
        let event = StripeEventBuilder::new()
            .event_type("checkout.session.completed")
            .object(json!({ "id": "cs_1", "subscription": "sub_1", "metadata": {} }))
            .build();

        let outcome = f.handler.handle(&event).await.unwrap();

        assert!(matches!(outcome, ReconcileOutcome::Ignored { .. }));
        assert_eq!(f.store.write_count(), 0);
        assert_eq!(f.provider.call_count("retrieve_subscription"), 0);
    }

    #[tokio::test]
    async fn checkout_without_subscription_is_ignored() {
        let f = fixture();
        let event = StripeEventBuilder::new()
            .event_type("checkout.session.completed")
            .object(json!({ "id": "cs_1", "metadata": { "firebaseUID": "uid-1" } }))
            .build();

        let outcome = f.handler.handle(&event).await.unwrap();

        assert!(matches!(outcome, ReconcileOutcome::Ignored { .. }));
        assert_eq!(f.store.write_count(), 0);
    }

    #[tokio::test]
    async fn checkout_for_subscription_unknown_to_provider_is_ignored() {
        let f = fixture();

        let outcome = f.handler.handle(&checkout_event("sub_missing")).await.unwrap();

        assert!(matches!(outcome, ReconcileOutcome::Ignored { .. }));
        assert_eq!(f.store.write_count(), 0);
    }

    #[tokio::test]
    async fn provider_failure_is_retryable() {
        let f = fixture();
        f.provider
            .set_method_error("retrieve_subscription", PaymentError::network("timeout"));

        let err = f.handler.handle(&checkout_event("sub_1")).await.unwrap_err();

        assert!(matches!(err, WebhookError::Provider(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn checkout_announces_new_entitlement() {
        let f = fixture();
        f.provider.add_subscription(provider_subscription(
            "sub_1",
            SubscriptionStatus::Active,
            Some("pro"),
        ));
        let mut changes = f.bus.subscribe(&uid());

        f.handler.handle(&checkout_event("sub_1")).await.unwrap();

        let change = changes.next().await.unwrap();
        assert_eq!(change.entitlement.plan, Plan::Pro);
        assert!(change.entitlement.status.is_active());
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Subscription Lifecycle Tests
    // ════════════════════════════════════════════════════════════════════════════

    async fn checked_out_pro(f: &Fixture) {
        f.provider.add_subscription(provider_subscription(
            "sub_1",
            SubscriptionStatus::Active,
            Some("pro"),
        ));
        f.handler.handle(&checkout_event("sub_1")).await.unwrap();
    }

    #[tokio::test]
    async fn update_syncs_status_and_keeps_plan() {
        let f = fixture();
        checked_out_pro(&f).await;

        let outcome = f
            .handler
            .handle(&subscription_event("customer.subscription.updated", "sub_1", "past_due"))
            .await
            .unwrap();

        assert!(matches!(
            outcome,
            ReconcileOutcome::SubscriptionSynced { status: SubscriptionStatus::PastDue, .. }
        ));
        let account = account(&f.store).await;
        assert_eq!(account.plan, Plan::Pro);
        assert_eq!(account.subscription_status, SubscriptionStatus::PastDue);
        assert_eq!(account.current_period_end.unwrap().as_unix_secs(), 1_950_000_000);
    }

    #[tokio::test]
    async fn deletion_demotes_both_records_to_free() {
        let f = fixture();
        checked_out_pro(&f).await;

        f.handler
            .handle(&subscription_event("customer.subscription.deleted", "sub_1", "canceled"))
            .await
            .unwrap();

        let account = account(&f.store).await;
        assert_eq!(account.plan, Plan::Free);
        assert_eq!(account.subscription_status, SubscriptionStatus::Canceled);
        assert!(!account.entitlement().allows(Plan::Basic));

        let record = SubscriptionRepository::find(&f.store, &sub_ref("sub_1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.plan, Plan::Free);
    }

    #[tokio::test]
    async fn unpaid_update_demotes_to_free() {
        let f = fixture();
        checked_out_pro(&f).await;

        f.handler
            .handle(&subscription_event("customer.subscription.updated", "sub_1", "unpaid"))
            .await
            .unwrap();

        assert_eq!(account(&f.store).await.plan, Plan::Free);
    }

    #[tokio::test]
    async fn redelivered_update_converges() {
        let f = fixture();
        checked_out_pro(&f).await;
        let event = subscription_event("customer.subscription.updated", "sub_1", "past_due");

        f.handler.handle(&event).await.unwrap();
        let first = account(&f.store).await;
        f.handler.handle(&event).await.unwrap();
        let second = account(&f.store).await;

        assert_eq!(first.plan, second.plan);
        assert_eq!(first.subscription_status, second.subscription_status);
        assert_eq!(first.current_period_end, second.current_period_end);
    }

    #[tokio::test]
    async fn unknown_subscription_is_acknowledged_without_writes() {
        let f = fixture();

        let outcome = f
            .handler
            .handle(&subscription_event("customer.subscription.updated", "sub_x", "active"))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            ReconcileOutcome::UnknownSubscription { subscription_ref: sub_ref("sub_x") }
        );
        assert_eq!(f.store.write_count(), 0);
    }

    #[tokio::test]
    async fn unpaid_event_for_older_subscription_still_demotes_account() {
        let f = fixture();
        checked_out_pro(&f).await;
        f.provider.add_subscription(provider_subscription(
            "sub_2",
            SubscriptionStatus::Active,
            Some("basic"),
        ));
        f.handler.handle(&checkout_event("sub_2")).await.unwrap();

        f.handler
            .handle(&subscription_event("customer.subscription.updated", "sub_1", "unpaid"))
            .await
            .unwrap();

        let account = account(&f.store).await;
        assert_eq!(account.plan, Plan::Free);
        assert_eq!(account.subscription_status, SubscriptionStatus::Unpaid);

        let old = SubscriptionRepository::find(&f.store, &sub_ref("sub_1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(old.status, SubscriptionStatus::Unpaid);
        assert_eq!(old.plan, Plan::Free);
    }

    #[tokio::test]
    async fn unknown_status_is_parse_error() {
        let f = fixture();
        checked_out_pro(&f).await;

        let err = f
            .handler
            .handle(&subscription_event("customer.subscription.updated", "sub_1", "paused_forever"))
            .await
            .unwrap_err();

        assert!(matches!(err, WebhookError::ParseError(_)));
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Failure and Unhandled Tests
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn store_failure_is_retryable_database_error() {
        let f = fixture();
        f.provider.add_subscription(provider_subscription(
            "sub_1",
            SubscriptionStatus::Active,
            Some("pro"),
        ));
        f.store.fail_writes(true);

        let err = f.handler.handle(&checkout_event("sub_1")).await.unwrap_err();

        assert!(matches!(err, WebhookError::Database(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn unhandled_event_type_changes_nothing() {
        let f = fixture();
        let event = StripeEventBuilder::new()
            .event_type("invoice.paid")
            .object(json!({ "id": "in_1" }))
            .build();

        let outcome = f.handler.handle(&event).await.unwrap();

        assert_eq!(
            outcome,
            ReconcileOutcome::Unhandled { event_type: "invoice.paid".to_string() }
        );
        assert_eq!(f.store.write_count(), 0);
    }

    #[tokio::test]
    async fn notifier_failure_does_not_fail_reconciliation() {
        struct FailingNotifier;

        #[async_trait::async_trait]
        impl AccountChangeNotifier for FailingNotifier {
            async fn notify(&self, _change: AccountChanged) -> Result<(), DomainError> {
                Err(DomainError::new(ErrorCode::CacheError, "redis down"))
            }
        }

        let store = InMemoryAccountStore::new();
        let provider = MockPaymentProvider::new();
        provider.add_subscription(provider_subscription(
            "sub_1",
            SubscriptionStatus::Active,
            Some("pro"),
        ));
        let handler = ReconcileWebhookHandler::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Arc::new(provider),
            Arc::new(FailingNotifier),
        );

        let outcome = handler.handle(&checkout_event("sub_1")).await;

        assert!(outcome.is_ok());
        assert_eq!(account(&store).await.plan, Plan::Pro);
    }
}
