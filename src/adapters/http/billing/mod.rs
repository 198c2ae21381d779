//! HTTP adapter for account and billing endpoints.
//!
//! - `POST /api/webhooks/stripe` - Stripe webhooks (signature verified)
//! - `POST /api/billing/checkout` - Start checkout
//! - `POST /api/billing/portal` - Open billing portal
//! - `POST|GET /api/account` - Register / read account
//! - `PATCH /api/account/profile` - Edit profile
//! - `GET /api/account/entitlement` - Entitlement check
//! - `GET /api/account/stream` - SSE entitlement updates
//! - `GET /api/plans` - Pricing catalogue
//! - `GET /health` - Liveness

pub mod dto;
pub mod handlers;
pub mod routes;

pub use handlers::{BillingApiError, BillingAppState, STRIPE_SIGNATURE_HEADER};
pub use routes::api_router;
