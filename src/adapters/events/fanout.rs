//! Notifier that forwards each change to several notifiers.

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, ErrorCode};
use crate::ports::{AccountChangeNotifier, AccountChanged};

/// Delivers to every inner notifier, even when an earlier one fails.
#[derive(Clone, Default)]
pub struct FanoutNotifier {
    notifiers: Vec<Arc<dyn AccountChangeNotifier>>,
}

impl FanoutNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, notifier: Arc<dyn AccountChangeNotifier>) -> Self {
        self.notifiers.push(notifier);
        self
    }

    pub fn len(&self) -> usize {
        self.notifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notifiers.is_empty()
    }
}

#[async_trait]
impl AccountChangeNotifier for FanoutNotifier {
    async fn notify(&self, change: AccountChanged) -> Result<(), DomainError> {
        let mut errors = Vec::new();
        for notifier in &self.notifiers {
            if let Err(e) = notifier.notify(change.clone()).await {
                errors.push(e.to_string());
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(DomainError::new(
                ErrorCode::InternalError,
                format!("Notifier errors: {}", errors.join(", ")),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::events::AccountChangeBus;
    use crate::domain::billing::{Entitlement, Plan, SubscriptionStatus};
    use crate::domain::foundation::{ChangeId, Timestamp, UserId};
    use crate::ports::AccountChangeSubscriber;
    use futures::StreamExt;

    struct FailingNotifier;

    #[async_trait]
    impl AccountChangeNotifier for FailingNotifier {
        async fn notify(&self, _change: AccountChanged) -> Result<(), DomainError> {
            Err(DomainError::new(ErrorCode::CacheError, "redis down"))
        }
    }

    #[tokio::test]
    async fn failure_does_not_stop_later_notifiers() {
        let bus = AccountChangeBus::default();
        let fanout = FanoutNotifier::new()
            .with(Arc::new(FailingNotifier))
            .with(Arc::new(bus.clone()));
        let mut stream = bus.subscribe(&UserId::new("uid-1").unwrap());

        let result = fanout
            .notify(AccountChanged {
                change_id: ChangeId::new(),
                user_id: UserId::new("uid-1").unwrap(),
                entitlement: Entitlement::new(Plan::Pro, SubscriptionStatus::Active),
                occurred_at: Timestamp::now(),
            })
            .await;

        assert!(result.unwrap_err().message.contains("redis down"));
        assert!(stream.next().await.is_some());
        assert_eq!(fanout.len(), 2);
    }
}
