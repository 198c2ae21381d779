//! Billing handlers.
//!
//! ## Commands
//! - Reconciling verified payment-provider webhooks
//! - Registering accounts and editing profiles
//! - Opening checkout and billing-portal sessions
//!
//! ## Queries
//! - Get account
//! - Check entitlement

mod check_entitlement;
mod create_checkout_session;
mod create_portal_session;
mod get_account;
mod reconcile_webhook;
mod register_account;
mod update_profile;

// Commands
pub use create_checkout_session::{CreateCheckoutSessionCommand, CreateCheckoutSessionHandler};
pub use create_portal_session::{CreatePortalSessionCommand, CreatePortalSessionHandler};
pub use reconcile_webhook::{ReconcileOutcome, ReconcileWebhookHandler};
pub use register_account::{RegisterAccountCommand, RegisterAccountHandler, RegisterAccountResult};
pub use update_profile::{UpdateProfileCommand, UpdateProfileHandler, MAX_DISPLAY_NAME_LEN};

// Queries
pub use check_entitlement::{CheckEntitlementHandler, CheckEntitlementQuery, CheckEntitlementResult};
pub use get_account::{GetAccountHandler, GetAccountQuery};
