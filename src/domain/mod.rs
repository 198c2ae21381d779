//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (IDs, timestamps, errors, auth)
//! - `billing` - Plans, subscription status, accounts, entitlement rules and
//!   Stripe webhook verification

pub mod billing;
pub mod foundation;
