//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the domain to external systems:
//! - `auth` - Firebase ID token validation
//! - `events` - Account change bus and Redis publisher
//! - `http` - Axum REST API
//! - `postgres` - Durable account store
//! - `storage` - In-memory account store
//! - `stripe` - Stripe REST client

pub mod auth;
pub mod events;
pub mod http;
pub mod postgres;
pub mod storage;
pub mod stripe;

pub use events::{
    AccountChangeBus, FanoutNotifier, RedisAccountChangeListener, RedisAccountChangePublisher,
};
pub use storage::InMemoryAccountStore;
