//! Subscription record: the secondary index from subscription to owner.
//!
//! Lifecycle events carry only the subscription id. The record lets them
//! resolve the owning user without a provider round-trip. Records are never
//! deleted; a canceled subscription keeps its row as history.

use serde::{Deserialize, Serialize};

use super::plan::Plan;
use super::status::SubscriptionStatus;
use crate::domain::foundation::{
    CustomerRef, PriceRef, ProductRef, SubscriptionRef, Timestamp, UserId, ValidationError,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionRecord {
    pub subscription_ref: SubscriptionRef,
    pub user_id: UserId,
    pub customer_ref: Option<CustomerRef>,
    pub status: SubscriptionStatus,
    pub plan: Plan,
    pub price_ref: Option<PriceRef>,
    pub product_ref: Option<ProductRef>,
    pub current_period_end: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl SubscriptionRecord {
    /// Builds the record an upsert creates when none exists.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::EmptyField` if the patch has no `user_id`;
    /// a record without its owner back-reference is useless.
    pub fn from_patch(
        subscription_ref: SubscriptionRef,
        patch: &SubscriptionPatch,
        now: Timestamp,
    ) -> Result<Self, ValidationError> {
        let user_id = patch
            .user_id
            .clone()
            .ok_or_else(|| ValidationError::empty_field("user_id"))?;

        let mut record = Self {
            subscription_ref,
            user_id,
            customer_ref: None,
            status: SubscriptionStatus::None,
            plan: Plan::Free,
            price_ref: None,
            product_ref: None,
            current_period_end: None,
            created_at: now,
            updated_at: now,
        };
        record.apply(patch, now);
        Ok(record)
    }

    /// Merges a patch; `None` fields are left untouched.
    pub fn apply(&mut self, patch: &SubscriptionPatch, now: Timestamp) {
        if let Some(user_id) = &patch.user_id {
            self.user_id = user_id.clone();
        }
        if let Some(customer) = &patch.customer_ref {
            self.customer_ref = Some(customer.clone());
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(plan) = patch.plan {
            self.plan = plan;
        }
        if let Some(price) = &patch.price_ref {
            self.price_ref = Some(price.clone());
        }
        if let Some(product) = &patch.product_ref {
            self.product_ref = Some(product.clone());
        }
        if let Some(period_end) = patch.current_period_end {
            self.current_period_end = Some(period_end);
        }
        self.updated_at = now;
    }
}

/// Partial update of a [`SubscriptionRecord`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionPatch {
    pub user_id: Option<UserId>,
    pub customer_ref: Option<CustomerRef>,
    pub status: Option<SubscriptionStatus>,
    pub plan: Option<Plan>,
    pub price_ref: Option<PriceRef>,
    pub product_ref: Option<ProductRef>,
    pub current_period_end: Option<Timestamp>,
}

impl SubscriptionPatch {
    pub fn sync(status: SubscriptionStatus, current_period_end: Option<Timestamp>) -> Self {
        Self {
            status: Some(status),
            current_period_end,
            ..Default::default()
        }
    }

    pub fn with_plan(mut self, plan: Plan) -> Self {
        self.plan = Some(plan);
        self
    }
}
