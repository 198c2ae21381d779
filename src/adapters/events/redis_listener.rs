//! Redis PSUBSCRIBE bridge feeding the local change bus.
//!
//! With several instances behind a load balancer, the webhook for a user may
//! land on one instance while that user's SSE stream is held by another.
//! Every instance publishes to Redis and runs one listener that forwards
//! `<prefix>:*` messages into its own [`AccountChangeBus`], so local
//! subscribers see changes from every instance exactly once.
//!
//! ```text
//! reconcile (instance A) ── PUBLISH account-changes:<uid>
//!                                     │
//!             ┌───────────────────────┴───────────────────────┐
//!             ▼                                               ▼
//!   listener (instance A)                           listener (instance B)
//!             │                                               │
//!   AccountChangeBus ── SSE                         AccountChangeBus ── SSE
//! ```

use std::time::Duration;

use futures::StreamExt;
use tokio::task::JoinHandle;

use super::change_bus::AccountChangeBus;
use crate::domain::foundation::{DomainError, ErrorCode};
use crate::ports::{AccountChangeNotifier, AccountChanged};

/// Delay before re-subscribing after the pub/sub connection drops.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(2);

/// Forwards account changes published on Redis into a local bus.
pub struct RedisAccountChangeListener {
    client: redis::Client,
    pattern: String,
}

impl RedisAccountChangeListener {
    pub fn new(url: &str, channel_prefix: &str) -> Result<Self, DomainError> {
        let client = redis::Client::open(url)
            .map_err(|e| DomainError::new(ErrorCode::CacheError, e.to_string()))?;
        Ok(Self {
            client,
            pattern: subscription_pattern(channel_prefix),
        })
    }

    /// Pattern subscribed to, e.g. `account-changes:*`.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Runs the listener until the task is aborted, reconnecting on failure.
    pub fn spawn(self, bus: AccountChangeBus) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                if let Err(e) = self.forward(&bus).await {
                    tracing::warn!(error = %e, pattern = %self.pattern, "Account change listener disconnected");
                }
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        })
    }

    async fn forward(&self, bus: &AccountChangeBus) -> Result<(), redis::RedisError> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.psubscribe(&self.pattern).await?;
        tracing::info!(pattern = %self.pattern, "Listening for account changes");

        let mut messages = pubsub.on_message();
        while let Some(msg) = messages.next().await {
            let payload: String = match msg.get_payload() {
                Ok(payload) => payload,
                Err(e) => {
                    tracing::warn!(channel = msg.get_channel_name(), error = %e, "Unreadable change payload");
                    continue;
                }
            };
            if let Some(change) = decode_change(msg.get_channel_name(), &payload) {
                // The bus never fails; an error here would only mean no receivers.
                let _ = bus.notify(change).await;
            }
        }
        Ok(())
    }
}

fn subscription_pattern(prefix: &str) -> String {
    format!("{}:*", prefix)
}

/// Parses a published change. Messages whose payload names a different user
/// than the channel are dropped.
fn decode_change(channel: &str, payload: &str) -> Option<AccountChanged> {
    let change: AccountChanged = match serde_json::from_str(payload) {
        Ok(change) => change,
        Err(e) => {
            tracing::warn!(channel, error = %e, "Malformed account change message");
            return None;
        }
    };

    let channel_user = channel.rsplit_once(':').map(|(_, uid)| uid);
    if channel_user != Some(change.user_id.as_str()) {
        tracing::warn!(channel, user_id = %change.user_id, "Change published on another user's channel");
        return None;
    }
    Some(change)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::events::DEFAULT_CHANNEL_PREFIX;
    use crate::domain::billing::{Entitlement, Plan, SubscriptionStatus};
    use crate::domain::foundation::{ChangeId, Timestamp, UserId};

    fn change(uid: &str) -> AccountChanged {
        AccountChanged {
            change_id: ChangeId::new(),
            user_id: UserId::new(uid).unwrap(),
            entitlement: Entitlement::new(Plan::Pro, SubscriptionStatus::Active),
            occurred_at: Timestamp::now(),
        }
    }

    #[test]
    fn pattern_covers_every_user_channel() {
        assert_eq!(subscription_pattern(DEFAULT_CHANNEL_PREFIX), "account-changes:*");
    }

    #[test]
    fn published_change_is_decoded() {
        let sent = change("uid-9");
        let payload = serde_json::to_string(&sent).unwrap();

        let received = decode_change("account-changes:uid-9", &payload);

        assert_eq!(received, Some(sent));
    }

    #[test]
    fn change_on_foreign_channel_is_dropped() {
        let payload = serde_json::to_string(&change("uid-9")).unwrap();
        assert!(decode_change("account-changes:uid-1", &payload).is_none());
    }

    #[test]
    fn malformed_payload_is_dropped() {
        assert!(decode_change("account-changes:uid-9", "not json").is_none());
    }

    #[test]
    fn invalid_url_is_cache_error() {
        let result = RedisAccountChangeListener::new("not-a-url", DEFAULT_CHANNEL_PREFIX);
        assert_eq!(result.err().map(|e| e.code), Some(ErrorCode::CacheError));
    }

    #[tokio::test]
    async fn decoded_change_reaches_local_subscriber() {
        use crate::ports::AccountChangeSubscriber;

        let bus = AccountChangeBus::default();
        let uid = UserId::new("uid-9").unwrap();
        let mut stream = bus.subscribe(&uid);
        let payload = serde_json::to_string(&change("uid-9")).unwrap();

        let decoded = decode_change("account-changes:uid-9", &payload).unwrap();
        bus.notify(decoded.clone()).await.unwrap();

        assert_eq!(stream.next().await, Some(decoded));
    }
}
