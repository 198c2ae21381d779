//! Redis PUBLISH notifier for multi-instance deployments.
//!
//! Each change is published as JSON on `<prefix>:<user_id>` so other
//! instances (or external consumers) can subscribe to a single user, or to
//! everyone with `PSUBSCRIBE <prefix>:*`.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;

use crate::domain::foundation::{DomainError, ErrorCode, UserId};
use crate::ports::{AccountChangeNotifier, AccountChanged};

/// Default channel prefix for account changes.
pub const DEFAULT_CHANNEL_PREFIX: &str = "account-changes";

/// Publishes account changes to a Redis channel.
#[derive(Clone)]
pub struct RedisAccountChangePublisher {
    conn: MultiplexedConnection,
    channel_prefix: String,
}

impl RedisAccountChangePublisher {
    pub fn new(conn: MultiplexedConnection, channel_prefix: impl Into<String>) -> Self {
        Self {
            conn,
            channel_prefix: channel_prefix.into(),
        }
    }

    /// Open a multiplexed connection using the default channel prefix.
    pub async fn connect(url: &str) -> Result<Self, DomainError> {
        let client = redis::Client::open(url).map_err(cache_error)?;
        let conn = client
            .get_multiplexed_tokio_connection()
            .await
            .map_err(cache_error)?;
        Ok(Self::new(conn, DEFAULT_CHANNEL_PREFIX))
    }

    pub fn with_channel_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.channel_prefix = prefix.into();
        self
    }

    /// Channel a user's changes are published on.
    pub fn channel_for(&self, user_id: &UserId) -> String {
        channel_name(&self.channel_prefix, user_id)
    }
}

fn channel_name(prefix: &str, user_id: &UserId) -> String {
    format!("{}:{}", prefix, user_id)
}

fn cache_error(e: redis::RedisError) -> DomainError {
    DomainError::new(ErrorCode::CacheError, e.to_string())
}

#[async_trait]
impl AccountChangeNotifier for RedisAccountChangePublisher {
    async fn notify(&self, change: AccountChanged) -> Result<(), DomainError> {
        let payload = serde_json::to_string(&change)
            .map_err(|e| DomainError::new(ErrorCode::InternalError, e.to_string()))?;

        let channel = self.channel_for(&change.user_id);
        let mut conn = self.conn.clone();
        let receivers: i64 = conn
            .publish(&channel, payload)
            .await
            .map_err(cache_error)?;

        tracing::debug!(
            channel = %channel,
            receivers,
            user_id = %change.user_id,
            "Published account change"
        );
        Ok(())
    }
}
