//! HTTP handlers for account, billing and entitlement endpoints.
//!
//! These handlers connect Axum routes to application layer command/query handlers.

use std::convert::Infallible;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Json, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use futures::stream::{self, Stream, StreamExt};

use crate::adapters::http::middleware::{OptionalAuth, RequireAuth};
use crate::application::{
    CheckEntitlementHandler, CheckEntitlementQuery, CreateCheckoutSessionCommand,
    CreateCheckoutSessionHandler, CreatePortalSessionCommand, CreatePortalSessionHandler,
    GetAccountHandler, GetAccountQuery, ReconcileOutcome, ReconcileWebhookHandler,
    RegisterAccountCommand, RegisterAccountHandler, UpdateProfileCommand, UpdateProfileHandler,
};
use crate::domain::billing::{
    BillingError, Entitlement, Plan, PlanCatalogue, StripeWebhookVerifier, SubscriptionStatus,
    WebhookError,
};
use crate::domain::foundation::{ErrorCode, Timestamp};
use crate::ports::{
    AccountChangeNotifier, AccountChangeSubscriber, AccountRepository, PaymentProvider,
    SubscriptionRepository,
};

use super::dto::{
    AccountResponse, CheckoutRequest, EntitlementQuery, EntitlementResponse,
    EntitlementSnapshot, ErrorResponse, PlansResponse, PortalRequest, SessionUrlResponse,
    UpdateProfileRequest, WebhookAck,
};

/// Header carrying the provider's webhook signature.
pub const STRIPE_SIGNATURE_HEADER: &str = "Stripe-Signature";

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

/// Shared application state containing all dependencies.
///
/// Cloned per request; every dependency is behind an `Arc`.
#[derive(Clone)]
pub struct BillingAppState {
    pub accounts: Arc<dyn AccountRepository>,
    pub subscriptions: Arc<dyn SubscriptionRepository>,
    pub payment_provider: Arc<dyn PaymentProvider>,
    pub notifier: Arc<dyn AccountChangeNotifier>,
    pub changes: Arc<dyn AccountChangeSubscriber>,
    pub webhook_verifier: Arc<StripeWebhookVerifier>,
    pub catalogue: Arc<PlanCatalogue>,
    /// Public web app URL that hosted sessions redirect back to.
    pub app_base_url: String,
}

impl BillingAppState {
    pub fn webhook_handler(&self) -> ReconcileWebhookHandler {
        ReconcileWebhookHandler::new(
            self.accounts.clone(),
            self.subscriptions.clone(),
            self.payment_provider.clone(),
            self.notifier.clone(),
        )
    }

    pub fn register_account_handler(&self) -> RegisterAccountHandler {
        RegisterAccountHandler::new(self.accounts.clone())
    }

    pub fn get_account_handler(&self) -> GetAccountHandler {
        GetAccountHandler::new(self.accounts.clone())
    }

    pub fn update_profile_handler(&self) -> UpdateProfileHandler {
        UpdateProfileHandler::new(self.accounts.clone())
    }

    pub fn check_entitlement_handler(&self) -> CheckEntitlementHandler {
        CheckEntitlementHandler::new(self.accounts.clone())
    }

    pub fn checkout_handler(&self) -> CreateCheckoutSessionHandler {
        CreateCheckoutSessionHandler::new(
            self.accounts.clone(),
            self.payment_provider.clone(),
            self.app_base_url.clone(),
        )
    }

    pub fn portal_handler(&self) -> CreatePortalSessionHandler {
        CreatePortalSessionHandler::new(
            self.accounts.clone(),
            self.payment_provider.clone(),
            self.app_base_url.clone(),
        )
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Webhook
// ════════════════════════════════════════════════════════════════════════════════

/// POST /api/webhooks/stripe - Verify and reconcile a Stripe event
///
/// 200 acknowledges (including ignored and unhandled events), 400 is never
/// retried by Stripe, 500 is redelivered.
pub async fn handle_stripe_webhook(
    State(state): State<BillingAppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    match reconcile(&state, &headers, &body).await {
        Ok(outcome) => {
            if let ReconcileOutcome::Ignored { reason } = &outcome {
                tracing::debug!(reason = %reason, "Webhook acknowledged without changes");
            }
            (StatusCode::OK, Json(WebhookAck::received())).into_response()
        }
        Err(err) => {
            if err.is_retryable() {
                tracing::error!(error = %err, "Webhook processing failed, provider will retry");
            } else {
                tracing::warn!(error = %err, "Webhook rejected");
            }
            (
                err.status_code(),
                Json(ErrorResponse::new(webhook_error_code(&err), err.to_string())),
            )
                .into_response()
        }
    }
}

async fn reconcile(
    state: &BillingAppState,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<ReconcileOutcome, WebhookError> {
    let signature = headers
        .get(STRIPE_SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(WebhookError::MissingSignature)?;

    let event = state.webhook_verifier.verify_and_parse(body, signature)?;
    state.webhook_handler().handle(&event).await
}

fn webhook_error_code(err: &WebhookError) -> &'static str {
    match err {
        e if e.is_verification_failure() => "INVALID_SIGNATURE",
        WebhookError::ParseError(_) | WebhookError::MissingField(_) => "INVALID_PAYLOAD",
        WebhookError::Provider(_) => "PAYMENT_PROVIDER_ERROR",
        _ => "INTERNAL_ERROR",
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Account
// ════════════════════════════════════════════════════════════════════════════════

/// POST /api/account - Register the signed-in user (idempotent)
pub async fn register_account(
    State(state): State<BillingAppState>,
    RequireAuth(user): RequireAuth,
) -> Result<impl IntoResponse, BillingApiError> {
    let result = state
        .register_account_handler()
        .handle(RegisterAccountCommand { user })
        .await?;

    let status = if result.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(AccountResponse::from(result.account))))
}

/// GET /api/account - The caller's account
pub async fn get_account(
    State(state): State<BillingAppState>,
    RequireAuth(user): RequireAuth,
) -> Result<impl IntoResponse, BillingApiError> {
    let account = state
        .get_account_handler()
        .handle(GetAccountQuery { user_id: user.id })
        .await?;

    Ok(Json(AccountResponse::from(account)))
}

/// PATCH /api/account/profile - Edit display name and photo
pub async fn update_profile(
    State(state): State<BillingAppState>,
    RequireAuth(user): RequireAuth,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, BillingApiError> {
    let account = state
        .update_profile_handler()
        .handle(UpdateProfileCommand {
            user_id: user.id,
            display_name: request.display_name,
            photo_url: request.photo_url,
        })
        .await?;

    Ok(Json(AccountResponse::from(account)))
}

/// GET /api/account/entitlement?minimum_plan= - Gate check, anonymous allowed
pub async fn check_entitlement(
    State(state): State<BillingAppState>,
    OptionalAuth(user): OptionalAuth,
    Query(query): Query<EntitlementQuery>,
) -> Result<impl IntoResponse, BillingApiError> {
    let result = state
        .check_entitlement_handler()
        .handle(CheckEntitlementQuery {
            user_id: user.map(|u| u.id),
            minimum: query.minimum_plan,
        })
        .await?;

    Ok(Json(EntitlementResponse::from(result)))
}

/// GET /api/account/stream - Server-sent entitlement snapshots
///
/// Sends the current snapshot first, then one event per reconciled change.
pub async fn account_stream(
    State(state): State<BillingAppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, BillingApiError> {
    // Subscribe before reading so a change between the two is not lost.
    let changes = state.changes.subscribe(&user.id);

    let current = state
        .accounts
        .find(&user.id)
        .await
        .map_err(BillingError::from)?
        .map(|account| account.entitlement())
        .unwrap_or_else(|| Entitlement::new(Plan::Free, SubscriptionStatus::None));

    tracing::debug!(user_id = %user.id, "Account stream opened");

    let initial = stream::once(async move { EntitlementSnapshot::new(current, Timestamp::now()) });
    let updates =
        changes.map(|change| EntitlementSnapshot::new(change.entitlement, change.occurred_at));

    let events = initial.chain(updates).filter_map(|snapshot| async move {
        match Event::default().event("entitlement").json_data(&snapshot) {
            Ok(event) => Some(Ok(event)),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to encode entitlement snapshot");
                None
            }
        }
    });

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

// ════════════════════════════════════════════════════════════════════════════════
// Billing
// ════════════════════════════════════════════════════════════════════════════════

/// POST /api/billing/checkout - Start a hosted subscription checkout
pub async fn create_checkout(
    State(state): State<BillingAppState>,
    RequireAuth(user): RequireAuth,
    Json(request): Json<CheckoutRequest>,
) -> Result<impl IntoResponse, BillingApiError> {
    let session = state
        .checkout_handler()
        .handle(CreateCheckoutSessionCommand {
            user_id: user.id,
            price_ref: request.price_ref,
            return_url: request.return_url,
        })
        .await?;

    Ok(Json(SessionUrlResponse { url: session.url }))
}

/// POST /api/billing/portal - Open the billing portal
pub async fn create_portal(
    State(state): State<BillingAppState>,
    RequireAuth(user): RequireAuth,
    body: Option<Json<PortalRequest>>,
) -> Result<impl IntoResponse, BillingApiError> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    let session = state
        .portal_handler()
        .handle(CreatePortalSessionCommand {
            user_id: user.id,
            return_url: request.return_url,
        })
        .await?;

    Ok(Json(SessionUrlResponse { url: session.url }))
}

/// GET /api/plans - Pricing catalogue
pub async fn list_plans(State(state): State<BillingAppState>) -> impl IntoResponse {
    Json(PlansResponse {
        plans: state.catalogue.offerings().to_vec(),
    })
}

/// GET /health - Liveness
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Handling
// ════════════════════════════════════════════════════════════════════════════════

/// API error type that converts billing errors to HTTP responses.
#[derive(Debug)]
pub struct BillingApiError(BillingError);

impl From<BillingError> for BillingApiError {
    fn from(err: BillingError) -> Self {
        Self(err)
    }
}

impl BillingApiError {
    pub fn status_code(&self) -> StatusCode {
        match &self.0 {
            BillingError::AccountNotFound(_) => StatusCode::NOT_FOUND,
            BillingError::NoBillingCustomer(_) | BillingError::ValidationFailed { .. } => {
                StatusCode::BAD_REQUEST
            }
            BillingError::PaymentProvider { .. } => StatusCode::BAD_GATEWAY,
            BillingError::Infrastructure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for BillingApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.0.code();

        // Infrastructure detail stays in the logs.
        let message = if code == ErrorCode::DatabaseError {
            tracing::error!(error = %self.0, "Request failed");
            "Internal server error".to_string()
        } else {
            self.0.message()
        };

        let mut body = ErrorResponse::new(code.to_string(), message);
        if let BillingError::ValidationFailed { field, .. } = &self.0 {
            body = body.with_details(serde_json::json!({ "field": field }));
        }
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::UserId;

    fn status_of(err: BillingError) -> StatusCode {
        BillingApiError::from(err).into_response().status()
    }

    #[test]
    fn billing_errors_map_to_statuses() {
        let uid = UserId::new("uid-1").unwrap();
        assert_eq!(status_of(BillingError::account_not_found(uid.clone())), StatusCode::NOT_FOUND);
        assert_eq!(status_of(BillingError::no_billing_customer(uid)), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(BillingError::validation("price_ref", "required")), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(BillingError::payment_provider("down", true)), StatusCode::BAD_GATEWAY);
        assert_eq!(status_of(BillingError::infrastructure("db")), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn webhook_error_codes() {
        assert_eq!(webhook_error_code(&WebhookError::InvalidSignature), "INVALID_SIGNATURE");
        assert_eq!(webhook_error_code(&WebhookError::MissingSignature), "INVALID_SIGNATURE");
        assert_eq!(webhook_error_code(&WebhookError::ParseError("x".into())), "INVALID_PAYLOAD");
        assert_eq!(webhook_error_code(&WebhookError::Database("x".into())), "INTERNAL_ERROR");
    }
}
