//! Billing domain module.
//!
//! Projects payment-provider subscription state onto user accounts and
//! derives entitlement from it.
//!
//! # Module Structure
//!
//! - `plan` / `status` - Plan hierarchy and subscription status
//! - `account` - UserAccount aggregate and merge patch
//! - `subscription_record` - Subscription-to-owner index
//! - `entitlement` - Pure access evaluation
//! - `catalogue` - Plans on offer and their prices
//! - `events` - Closed set of handled billing events
//! - `stripe_event` / `webhook_verifier` / `webhook_errors` - Webhook boundary types

mod account;
mod catalogue;
mod entitlement;
mod errors;
mod events;
mod plan;
mod status;
mod stripe_event;
mod subscription_record;
mod webhook_errors;
mod webhook_verifier;

pub use account::{AccountPatch, AccountRole, UserAccount};
pub use catalogue::{PlanCatalogue, PlanOffering};
pub use entitlement::{decide, evaluate, has_access, AccessDecision, DenialReason, Entitlement};
pub use errors::BillingError;
pub use events::{BillingEvent, CheckoutCompleted, SubscriptionChanged, USER_ID_METADATA_KEY};
pub use plan::Plan;
pub use status::SubscriptionStatus;
pub use stripe_event::{StripeEvent, StripeEventData, StripeEventType};
pub use subscription_record::{SubscriptionPatch, SubscriptionRecord};
pub use webhook_errors::WebhookError;
pub use webhook_verifier::{sign_payload, SignatureHeader, StripeWebhookVerifier};

#[cfg(test)]
pub use stripe_event::StripeEventBuilder;
