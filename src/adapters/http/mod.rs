//! HTTP adapters - REST API implementations.

pub mod billing;
pub mod middleware;

pub use billing::{api_router, BillingAppState};
