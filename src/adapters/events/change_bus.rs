//! In-process account change bus.
//!
//! A single `tokio::sync::broadcast` channel carries every change; each
//! subscriber filters for its own user. Slow subscribers that fall behind
//! skip the missed changes rather than block the publisher, which is safe
//! because every change carries the full entitlement.

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use tokio::sync::broadcast;

use crate::domain::foundation::{DomainError, UserId};
use crate::ports::{AccountChangeNotifier, AccountChangeSubscriber, AccountChanged};

/// Default buffer size of the broadcast channel.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Broadcast-backed notifier and subscriber.
#[derive(Clone)]
pub struct AccountChangeBus {
    sender: broadcast::Sender<AccountChanged>,
}

impl AccountChangeBus {
    /// Create a bus with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Number of live subscriber streams.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for AccountChangeBus {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

#[async_trait]
impl AccountChangeNotifier for AccountChangeBus {
    async fn notify(&self, change: AccountChanged) -> Result<(), DomainError> {
        // No receivers is not an error: nobody is watching this instant.
        let delivered = self.sender.send(change).unwrap_or(0);
        tracing::trace!(delivered, "Account change broadcast");
        Ok(())
    }
}

impl AccountChangeSubscriber for AccountChangeBus {
    fn subscribe(&self, user_id: &UserId) -> BoxStream<'static, AccountChanged> {
        let receiver = self.sender.subscribe();
        let user_id = user_id.clone();

        stream::unfold(receiver, move |mut receiver| {
            let user_id = user_id.clone();
            async move {
                loop {
                    match receiver.recv().await {
                        Ok(change) if change.user_id == user_id => {
                            return Some((change, receiver));
                        }
                        Ok(_) => continue,
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, user_id = %user_id, "Change subscriber lagged");
                            continue;
                        }
                        Err(broadcast::error::RecvError::Closed) => return None,
                    }
                }
            }
        })
        .boxed()
    }
}
