//! Subscription status as projected from the payment provider.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::ValidationError;

/// Subscription status of an account or subscription record.
///
/// Mirrors the payment provider's subscription statuses, plus `None` for
/// accounts that have never subscribed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// Never subscribed.
    #[default]
    None,

    /// Paid and current. The only status that grants entitlement.
    Active,

    /// In a free trial.
    Trialing,

    /// Latest invoice failed; provider is retrying.
    PastDue,

    /// Subscription canceled.
    Canceled,

    /// Retries exhausted without payment.
    Unpaid,

    /// First payment not yet completed.
    Incomplete,

    /// First payment window lapsed.
    IncompleteExpired,

    /// Collection paused.
    Paused,
}

impl SubscriptionStatus {
    /// Returns true if the status is `active`.
    pub fn is_active(&self) -> bool {
        matches!(self, SubscriptionStatus::Active)
    }

    /// Returns true if reaching this status forces the plan back to free.
    ///
    /// Applies immediately, regardless of any remaining paid period.
    pub fn demotes_to_free(&self) -> bool {
        matches!(self, SubscriptionStatus::Canceled | SubscriptionStatus::Unpaid)
    }

    /// Returns the snake_case wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::None => "none",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Trialing => "trialing",
            SubscriptionStatus::PastDue => "past_due",
            SubscriptionStatus::Canceled => "canceled",
            SubscriptionStatus::Unpaid => "unpaid",
            SubscriptionStatus::Incomplete => "incomplete",
            SubscriptionStatus::IncompleteExpired => "incomplete_expired",
            SubscriptionStatus::Paused => "paused",
        }
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SubscriptionStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(SubscriptionStatus::None),
            "active" => Ok(SubscriptionStatus::Active),
            "trialing" => Ok(SubscriptionStatus::Trialing),
            "past_due" => Ok(SubscriptionStatus::PastDue),
            "canceled" => Ok(SubscriptionStatus::Canceled),
            "unpaid" => Ok(SubscriptionStatus::Unpaid),
            "incomplete" => Ok(SubscriptionStatus::Incomplete),
            "incomplete_expired" => Ok(SubscriptionStatus::IncompleteExpired),
            "paused" => Ok(SubscriptionStatus::Paused),
            other => Err(ValidationError::invalid_format(
                "subscription_status",
                format!("unknown status '{}'", other),
            )),
        }
    }
}
