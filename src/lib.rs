//! SaaS Starter - Subscription reconciliation and entitlement service
//!
//! Keeps each user's plan and subscription status in step with Stripe by
//! reconciling signed webhooks, and answers "may this user use this
//! feature?" from the stored account.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
