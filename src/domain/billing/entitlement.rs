//! Entitlement evaluation.
//!
//! Pure functions over already-fetched account state. Access requires both a
//! plan ranked at least as high as the minimum and an `active` status; status
//! gates access independently of plan rank. A caller with no authenticated
//! user is always denied, even for the free tier.

use serde::{Deserialize, Serialize};

use super::plan::Plan;
use super::status::SubscriptionStatus;

/// The two account fields entitlement depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Entitlement {
    pub plan: Plan,
    pub status: SubscriptionStatus,
}

impl Entitlement {
    pub fn new(plan: Plan, status: SubscriptionStatus) -> Self {
        Self { plan, status }
    }

    /// Returns true if this entitlement meets `minimum`.
    pub fn allows(&self, minimum: Plan) -> bool {
        evaluate(self.plan, self.status, minimum)
    }
}

/// `rank(plan) >= rank(minimum) && status == active`.
pub fn evaluate(plan: Plan, status: SubscriptionStatus, minimum: Plan) -> bool {
    plan.satisfies(minimum) && status.is_active()
}

/// Boolean gate for an optionally authenticated caller.
pub fn has_access(current: Option<&Entitlement>, minimum: Plan) -> bool {
    decide(current, minimum).is_allowed()
}

/// Evaluates access and explains any denial.
pub fn decide(current: Option<&Entitlement>, minimum: Plan) -> AccessDecision {
    let Some(entitlement) = current else {
        return AccessDecision::Denied(DenialReason::SignInRequired);
    };

    if !entitlement.plan.satisfies(minimum) {
        return AccessDecision::Denied(DenialReason::UpgradeRequired {
            required: minimum,
            current: entitlement.plan,
        });
    }

    if !entitlement.status.is_active() {
        return AccessDecision::Denied(DenialReason::SubscriptionInactive {
            status: entitlement.status,
        });
    }

    AccessDecision::Allowed
}

/// Result of an entitlement check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    Allowed,
    Denied(DenialReason),
}

impl AccessDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AccessDecision::Allowed)
    }

    /// Converts the decision to a Result type, with denied becoming an error.
    pub fn into_result(self) -> Result<(), DenialReason> {
        match self {
            AccessDecision::Allowed => Ok(()),
            AccessDecision::Denied(reason) => Err(reason),
        }
    }

    pub fn reason(&self) -> Option<&DenialReason> {
        match self {
            AccessDecision::Allowed => None,
            AccessDecision::Denied(reason) => Some(reason),
        }
    }
}

/// Why access was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DenialReason {
    /// No authenticated user.
    SignInRequired,

    /// Plan rank is below the minimum.
    UpgradeRequired { required: Plan, current: Plan },

    /// Plan is sufficient but the subscription is not active.
    SubscriptionInactive { status: SubscriptionStatus },
}

impl DenialReason {
    /// Short heading for gated content.
    pub fn title(&self) -> &'static str {
        match self {
            DenialReason::SignInRequired => "Sign In Required",
            DenialReason::UpgradeRequired { .. } => "Upgrade Required",
            DenialReason::SubscriptionInactive { .. } => "Subscription Inactive",
        }
    }

    /// Get a user-facing message for the denial reason.
    pub fn user_message(&self) -> String {
        match self {
            DenialReason::SignInRequired => {
                "Please sign in to access this content.".to_string()
            }
            DenialReason::UpgradeRequired { required, .. } => format!(
                "This content requires a {} plan or higher.",
                required.display_name()
            ),
            DenialReason::SubscriptionInactive { status } => format!(
                "Your subscription is {}. An active subscription is required.",
                status.as_str().replace('_', " ")
            ),
        }
    }
}

impl std::fmt::Display for DenialReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.title(), self.user_message())
    }
}
