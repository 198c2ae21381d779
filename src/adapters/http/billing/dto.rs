//! HTTP DTOs for account, billing and entitlement endpoints.
//!
//! Request bodies accept both snake_case and the camelCase names the web
//! client sends (`priceId`, `returnUrl`).

use serde::{Deserialize, Serialize};

use crate::application::CheckEntitlementResult;
use crate::domain::billing::{
    AccountRole, DenialReason, Entitlement, Plan, PlanOffering, SubscriptionStatus, UserAccount,
};
use crate::domain::foundation::Timestamp;

// ════════════════════════════════════════════════════════════════════════════════
// Request DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Request to start checkout.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CheckoutRequest {
    #[serde(default, alias = "priceId")]
    pub price_ref: Option<String>,
    #[serde(default, alias = "returnUrl")]
    pub return_url: Option<String>,
}

/// Request to open the billing portal. The body may be empty.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PortalRequest {
    #[serde(default, alias = "returnUrl")]
    pub return_url: Option<String>,
}

/// Request to edit the caller's profile.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateProfileRequest {
    #[serde(default, alias = "displayName")]
    pub display_name: Option<String>,
    #[serde(default, alias = "photoURL", alias = "photoUrl")]
    pub photo_url: Option<String>,
}

/// Query string of the entitlement check.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EntitlementQuery {
    /// Defaults to `free`: "is this caller a signed-in, active customer".
    #[serde(default)]
    pub minimum_plan: Plan,
}

// ════════════════════════════════════════════════════════════════════════════════
// Response DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Redirect target of a hosted checkout or portal session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionUrlResponse {
    pub url: String,
}

/// Acknowledgement body for processed webhooks.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookAck {
    pub received: bool,
}

impl WebhookAck {
    pub fn received() -> Self {
        Self { received: true }
    }
}

/// The caller's account.
#[derive(Debug, Clone, Serialize)]
pub struct AccountResponse {
    pub id: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
    pub role: AccountRole,
    pub plan: Plan,
    pub subscription_status: SubscriptionStatus,
    pub has_billing_customer: bool,
    pub subscription_ref: Option<String>,
    pub current_period_end: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl From<UserAccount> for AccountResponse {
    fn from(account: UserAccount) -> Self {
        Self {
            has_billing_customer: account.has_billing_customer(),
            id: account.id.into_inner(),
            email: account.email,
            display_name: account.display_name,
            photo_url: account.photo_url,
            role: account.role,
            plan: account.plan,
            subscription_status: account.subscription_status,
            subscription_ref: account.subscription_ref.map(|s| s.into_inner()),
            current_period_end: account.current_period_end,
            created_at: account.created_at,
            updated_at: account.updated_at,
        }
    }
}

/// Entitlement check outcome.
#[derive(Debug, Clone, Serialize)]
pub struct EntitlementResponse {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<DenialResponse>,
    pub plan: Option<Plan>,
    pub status: Option<SubscriptionStatus>,
}

/// Why access was denied, ready to show on gated content.
#[derive(Debug, Clone, Serialize)]
pub struct DenialResponse {
    #[serde(flatten)]
    pub reason: DenialReason,
    pub title: &'static str,
    pub message: String,
}

impl From<DenialReason> for DenialResponse {
    fn from(reason: DenialReason) -> Self {
        Self {
            title: reason.title(),
            message: reason.user_message(),
            reason,
        }
    }
}

impl From<CheckEntitlementResult> for EntitlementResponse {
    fn from(result: CheckEntitlementResult) -> Self {
        Self {
            allowed: result.allowed(),
            reason: result.decision.reason().copied().map(DenialResponse::from),
            plan: result.entitlement.map(|e| e.plan),
            status: result.entitlement.map(|e| e.status),
        }
    }
}

/// Payload of each SSE `entitlement` event.
#[derive(Debug, Clone, Serialize)]
pub struct EntitlementSnapshot {
    pub plan: Plan,
    pub status: SubscriptionStatus,
    pub active: bool,
    pub occurred_at: Timestamp,
}

impl EntitlementSnapshot {
    pub fn new(entitlement: Entitlement, occurred_at: Timestamp) -> Self {
        Self {
            plan: entitlement.plan,
            status: entitlement.status,
            active: entitlement.status.is_active(),
            occurred_at,
        }
    }
}

/// Pricing catalogue.
#[derive(Debug, Clone, Serialize)]
pub struct PlansResponse {
    pub plans: Vec<PlanOffering>,
}

/// Error body: `{"code": "...", "message": "..."}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}
