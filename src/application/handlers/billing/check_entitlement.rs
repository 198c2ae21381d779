//! CheckEntitlementHandler - Query handler gating content by plan.
//!
//! The handler only fetches state; the decision itself is the pure
//! evaluator in the billing domain.

use std::sync::Arc;

use crate::domain::billing::{decide, AccessDecision, BillingError, Entitlement, Plan, SubscriptionStatus};
use crate::domain::foundation::UserId;
use crate::ports::AccountRepository;

/// Query for an optionally authenticated caller.
#[derive(Debug, Clone)]
pub struct CheckEntitlementQuery {
    pub user_id: Option<UserId>,
    pub minimum: Plan,
}

/// Result of an entitlement check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckEntitlementResult {
    pub decision: AccessDecision,
    /// The caller's entitlement, absent for unauthenticated callers.
    pub entitlement: Option<Entitlement>,
}

impl CheckEntitlementResult {
    pub fn allowed(&self) -> bool {
        self.decision.is_allowed()
    }
}

pub struct CheckEntitlementHandler {
    accounts: Arc<dyn AccountRepository>,
}

impl CheckEntitlementHandler {
    pub fn new(accounts: Arc<dyn AccountRepository>) -> Self {
        Self { accounts }
    }

    pub async fn handle(
        &self,
        query: CheckEntitlementQuery,
    ) -> Result<CheckEntitlementResult, BillingError> {
        let entitlement = match &query.user_id {
            None => None,
            Some(user_id) => Some(
                self.accounts
                    .find(user_id)
                    .await?
                    .map(|account| account.entitlement())
                    // Signed in but never registered: nothing purchased.
                    .unwrap_or_else(|| Entitlement::new(Plan::Free, SubscriptionStatus::None)),
            ),
        };

        Ok(CheckEntitlementResult {
            decision: decide(entitlement.as_ref(), query.minimum),
            entitlement,
        })
    }
}
