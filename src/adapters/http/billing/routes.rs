//! Axum router configuration for account and billing endpoints.

use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};

use super::handlers::{
    account_stream, check_entitlement, create_checkout, create_portal, get_account,
    handle_stripe_webhook, health, list_plans, register_account, update_profile,
    BillingAppState,
};
use crate::adapters::http::middleware::{auth_middleware, AuthState};

/// Account endpoints (mounted at `/account`).
///
/// - `POST /` - Register the signed-in user
/// - `GET /` - Read the caller's account
/// - `PATCH /profile` - Edit profile
/// - `GET /entitlement` - Gate check (anonymous allowed)
/// - `GET /stream` - SSE entitlement snapshots
pub fn account_routes() -> Router<BillingAppState> {
    Router::new()
        .route("/", post(register_account).get(get_account))
        .route("/profile", patch(update_profile))
        .route("/entitlement", get(check_entitlement))
        .route("/stream", get(account_stream))
}

/// Billing endpoints (mounted at `/billing`).
pub fn billing_routes() -> Router<BillingAppState> {
    Router::new()
        .route("/checkout", post(create_checkout))
        .route("/portal", post(create_portal))
}

/// Webhook endpoints (mounted at `/webhooks`).
///
/// No user authentication; the signature is the credential.
pub fn webhook_routes() -> Router<BillingAppState> {
    Router::new().route("/stripe", post(handle_stripe_webhook))
}

/// The complete API.
///
/// Bearer tokens are validated for every `/api` route except webhooks, which
/// sit outside the auth layer so a stray `Authorization` header cannot
/// reject a provider delivery.
pub fn api_router(state: BillingAppState, auth: AuthState) -> Router {
    let authenticated = Router::new()
        .nest("/account", account_routes())
        .nest("/billing", billing_routes())
        .route("/plans", get(list_plans))
        .layer(middleware::from_fn_with_state(auth, auth_middleware));

    Router::new()
        .nest("/api", authenticated.nest("/webhooks", webhook_routes()))
        .route("/health", get(health))
        .with_state(state)
}
