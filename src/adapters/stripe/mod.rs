//! Stripe payment provider adapter.
//!
//! - `StripePaymentAdapter`: production adapter over the Stripe REST API
//! - `MockPaymentProvider`: configurable test double

mod api_types;
mod mock_payment_provider;
mod stripe_adapter;

pub use api_types::PLAN_METADATA_KEY;
pub use mock_payment_provider::{MethodCall, MockPaymentProvider};
pub use stripe_adapter::{StripeConfig, StripePaymentAdapter};
