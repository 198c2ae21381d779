//! Account change transport adapters.
//!
//! - `AccountChangeBus`: in-process broadcast, feeds the SSE endpoint
//! - `RedisAccountChangePublisher`: PUBLISH to every instance
//! - `RedisAccountChangeListener`: PSUBSCRIBE, forwards into the local bus
//! - `FanoutNotifier`: delivers one change to several notifiers

mod change_bus;
mod fanout;
mod redis_listener;
mod redis_publisher;

pub use change_bus::{AccountChangeBus, DEFAULT_CHANNEL_CAPACITY};
pub use fanout::FanoutNotifier;
pub use redis_listener::{RedisAccountChangeListener, RECONNECT_DELAY};
pub use redis_publisher::{RedisAccountChangePublisher, DEFAULT_CHANNEL_PREFIX};
