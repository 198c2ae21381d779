//! User account aggregate and its merge patch.
//!
//! The account is keyed by the identity-provider subject. Profile fields
//! belong to the owner; `plan`, `subscription_status` and the subscription
//! references are a projection written only by webhook reconciliation.

use serde::{Deserialize, Serialize};

use super::entitlement::Entitlement;
use super::plan::Plan;
use super::status::SubscriptionStatus;
use crate::domain::foundation::{CustomerRef, PriceRef, SubscriptionRef, Timestamp, UserId};

/// Role recorded on the account at registration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountRole {
    #[default]
    Customer,
    Admin,
}

impl AccountRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountRole::Customer => "customer",
            AccountRole::Admin => "admin",
        }
    }
}

impl std::str::FromStr for AccountRole {
    type Err = crate::domain::foundation::ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(AccountRole::Customer),
            "admin" => Ok(AccountRole::Admin),
            other => Err(crate::domain::foundation::ValidationError::invalid_format(
                "role",
                format!("unknown role '{}'", other),
            )),
        }
    }
}

/// A registered user and the projected state of their subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAccount {
    pub id: UserId,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
    pub role: AccountRole,

    /// Payment-provider customer. Immutable once set.
    pub billing_customer_ref: Option<CustomerRef>,
    pub plan: Plan,
    pub subscription_status: SubscriptionStatus,

    /// Retained after cancellation as history.
    pub subscription_ref: Option<SubscriptionRef>,
    pub subscription_price_ref: Option<PriceRef>,
    pub current_period_end: Option<Timestamp>,

    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl UserAccount {
    /// Creates the account recorded at sign-up: free plan, no subscription.
    pub fn register(
        id: UserId,
        email: Option<String>,
        display_name: Option<String>,
        photo_url: Option<String>,
        now: Timestamp,
    ) -> Self {
        Self {
            id,
            email,
            display_name,
            photo_url,
            role: AccountRole::Customer,
            billing_customer_ref: None,
            plan: Plan::Free,
            subscription_status: SubscriptionStatus::None,
            subscription_ref: None,
            subscription_price_ref: None,
            current_period_end: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Builds the record an upsert creates when no account exists yet.
    ///
    /// Fields absent from the patch take their registration defaults.
    pub fn from_patch(id: UserId, patch: &AccountPatch, now: Timestamp) -> Self {
        let mut account = Self::register(id, None, None, None, now);
        account.apply(patch, now);
        account
    }

    /// Merges a patch into this account.
    ///
    /// `None` fields leave the current value untouched. An existing
    /// `billing_customer_ref` is never replaced.
    pub fn apply(&mut self, patch: &AccountPatch, now: Timestamp) {
        if let Some(email) = &patch.email {
            self.email = Some(email.clone());
        }
        if let Some(display_name) = &patch.display_name {
            self.display_name = Some(display_name.clone());
        }
        if let Some(photo_url) = &patch.photo_url {
            self.photo_url = Some(photo_url.clone());
        }
        if self.billing_customer_ref.is_none() {
            if let Some(customer) = &patch.billing_customer_ref {
                self.billing_customer_ref = Some(customer.clone());
            }
        }
        if let Some(plan) = patch.plan {
            self.plan = plan;
        }
        if let Some(status) = patch.subscription_status {
            self.subscription_status = status;
        }
        if let Some(subscription) = &patch.subscription_ref {
            self.subscription_ref = Some(subscription.clone());
        }
        if let Some(price) = &patch.subscription_price_ref {
            self.subscription_price_ref = Some(price.clone());
        }
        if let Some(period_end) = patch.current_period_end {
            self.current_period_end = Some(period_end);
        }
        self.updated_at = now;
    }

    /// Snapshot of the fields the entitlement evaluator reads.
    pub fn entitlement(&self) -> Entitlement {
        Entitlement::new(self.plan, self.subscription_status)
    }

    pub fn has_billing_customer(&self) -> bool {
        self.billing_customer_ref.is_some()
    }
}

/// Partial update of a [`UserAccount`]. `None` means "leave as is".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountPatch {
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
    pub billing_customer_ref: Option<CustomerRef>,
    pub plan: Option<Plan>,
    pub subscription_status: Option<SubscriptionStatus>,
    pub subscription_ref: Option<SubscriptionRef>,
    pub subscription_price_ref: Option<PriceRef>,
    pub current_period_end: Option<Timestamp>,
}

impl AccountPatch {
    /// Owner-editable profile fields only.
    pub fn profile(display_name: Option<String>, photo_url: Option<String>) -> Self {
        Self {
            display_name,
            photo_url,
            ..Default::default()
        }
    }

    /// Links a newly created payment-provider customer.
    pub fn billing_customer(customer: CustomerRef) -> Self {
        Self {
            billing_customer_ref: Some(customer),
            ..Default::default()
        }
    }

    /// Status and period end carried by a subscription lifecycle event.
    pub fn subscription_sync(
        status: SubscriptionStatus,
        current_period_end: Option<Timestamp>,
    ) -> Self {
        Self {
            subscription_status: Some(status),
            current_period_end,
            ..Default::default()
        }
    }

    pub fn with_plan(mut self, plan: Plan) -> Self {
        self.plan = Some(plan);
        self
    }

    pub fn with_customer(mut self, customer: CustomerRef) -> Self {
        self.billing_customer_ref = Some(customer);
        self
    }

    pub fn with_subscription(mut self, subscription: SubscriptionRef) -> Self {
        self.subscription_ref = Some(subscription);
        self
    }

    pub fn with_price(mut self, price: Option<PriceRef>) -> Self {
        self.subscription_price_ref = price;
        self
    }

    /// Returns true if applying this patch would change nothing but `updated_at`.
    pub fn is_empty(&self) -> bool {
        self == &AccountPatch::default()
    }
}
