//! Account change ports - observer abstraction over account state.
//!
//! Reconciliation announces every account it rewrites; subscribers (the SSE
//! endpoint, other instances via Redis) receive the new state without
//! polling the store. The transport is an adapter concern.

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::domain::billing::{Entitlement, UserAccount};
use crate::domain::foundation::{ChangeId, DomainError, Timestamp, UserId};

/// Notification that an account's projected state changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountChanged {
    pub change_id: ChangeId,
    pub user_id: UserId,
    pub entitlement: Entitlement,
    pub occurred_at: Timestamp,
}

impl AccountChanged {
    pub fn from_account(account: &UserAccount) -> Self {
        Self {
            change_id: ChangeId::new(),
            user_id: account.id.clone(),
            entitlement: account.entitlement(),
            occurred_at: Timestamp::now(),
        }
    }
}

/// Publishes account changes.
///
/// Delivery is best-effort: callers log failures rather than failing the
/// write that caused them.
#[async_trait]
pub trait AccountChangeNotifier: Send + Sync {
    async fn notify(&self, change: AccountChanged) -> Result<(), DomainError>;
}

/// Subscribes to changes for one user.
pub trait AccountChangeSubscriber: Send + Sync {
    /// Stream of changes for `user_id`, starting now.
    fn subscribe(&self, user_id: &UserId) -> BoxStream<'static, AccountChanged>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::billing::{Plan, SubscriptionStatus};

    #[test]
    fn notifier_is_object_safe() {
        fn _accepts_dyn(_n: &dyn AccountChangeNotifier) {}
        fn _accepts_sub(_s: &dyn AccountChangeSubscriber) {}
    }

    #[test]
    fn from_account_copies_entitlement() {
        let mut account = UserAccount::register(
            UserId::new("uid-1").unwrap(),
            None,
            None,
            None,
            Timestamp::now(),
        );
        account.plan = Plan::Pro;
        account.subscription_status = SubscriptionStatus::Active;

        let change = AccountChanged::from_account(&account);

        assert_eq!(change.user_id.as_str(), "uid-1");
        assert_eq!(change.entitlement, Entitlement::new(Plan::Pro, SubscriptionStatus::Active));
    }

    #[test]
    fn change_serializes_for_transport() {
        let change = AccountChanged {
            change_id: ChangeId::new(),
            user_id: UserId::new("uid-2").unwrap(),
            entitlement: Entitlement::new(Plan::Basic, SubscriptionStatus::PastDue),
            occurred_at: Timestamp::now(),
        };

        let json = serde_json::to_value(&change).unwrap();

        assert_eq!(json["user_id"], "uid-2");
        assert_eq!(json["entitlement"]["plan"], "basic");
        assert_eq!(json["entitlement"]["status"], "past_due");

        let back: AccountChanged = serde_json::from_value(json).unwrap();
        assert_eq!(back, change);
    }
}
