//! Subscription plan definitions.
//!
//! Plans are totally ordered by feature entitlement: `free < basic < pro`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::ValidationError;

/// Subscription plan.
///
/// Derives `Ord` from declaration order, which matches [`Plan::rank`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    /// Every registered account starts here.
    #[default]
    Free,

    /// Entry paid plan.
    Basic,

    /// Highest paid plan.
    Pro,
}

impl Plan {
    /// All plans, lowest rank first.
    pub const ALL: [Plan; 3] = [Plan::Free, Plan::Basic, Plan::Pro];

    /// Plan assigned when a purchased product carries no recognised `plan`
    /// metadata. Kept as a named policy so product owners can revisit it.
    pub const UNSPECIFIED_PRODUCT_DEFAULT: Plan = Plan::Basic;

    /// Returns the numeric rank of this plan for comparison.
    pub fn rank(&self) -> u8 {
        match self {
            Plan::Free => 0,
            Plan::Basic => 1,
            Plan::Pro => 2,
        }
    }

    /// Returns true if this plan is a paid plan.
    pub fn is_paid(&self) -> bool {
        !matches!(self, Plan::Free)
    }

    /// Returns true if this plan ranks at least as high as `minimum`.
    pub fn satisfies(&self, minimum: Plan) -> bool {
        self.rank() >= minimum.rank()
    }

    /// Returns the lowercase wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Free => "free",
            Plan::Basic => "basic",
            Plan::Pro => "pro",
        }
    }

    /// Returns the display name for this plan.
    pub fn display_name(&self) -> &'static str {
        match self {
            Plan::Free => "Free",
            Plan::Basic => "Basic",
            Plan::Pro => "Pro",
        }
    }

    /// Resolves the plan from a product's `plan` metadata value.
    ///
    /// Missing or unrecognised values fall back to
    /// [`Plan::UNSPECIFIED_PRODUCT_DEFAULT`].
    pub fn from_product_metadata(value: Option<&str>) -> Plan {
        value
            .and_then(|v| v.trim().to_ascii_lowercase().parse().ok())
            .unwrap_or(Self::UNSPECIFIED_PRODUCT_DEFAULT)
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Plan {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(Plan::Free),
            "basic" => Ok(Plan::Basic),
            "pro" => Ok(Plan::Pro),
            other => Err(ValidationError::invalid_format(
                "plan",
                format!("unknown plan '{}'", other),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranks_are_strictly_increasing() {
        assert!(Plan::Free.rank() < Plan::Basic.rank());
        assert!(Plan::Basic.rank() < Plan::Pro.rank());
    }

    #[test]
    fn ord_matches_rank() {
        for a in Plan::ALL {
            for b in Plan::ALL {
                assert_eq!(a.cmp(&b), a.rank().cmp(&b.rank()));
            }
        }
    }

    #[test]
    fn satisfies_is_rank_comparison() {
        assert!(Plan::Pro.satisfies(Plan::Basic));
        assert!(Plan::Basic.satisfies(Plan::Basic));
        assert!(!Plan::Free.satisfies(Plan::Basic));
    }

    #[test]
    fn only_free_is_unpaid() {
        assert!(!Plan::Free.is_paid());
        assert!(Plan::Basic.is_paid());
        assert!(Plan::Pro.is_paid());
    }

    #[test]
    fn plan_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Plan::Pro).unwrap(), "\"pro\"");
        let plan: Plan = serde_json::from_str("\"basic\"").unwrap();
        assert_eq!(plan, Plan::Basic);
    }

    #[test]
    fn parse_rejects_unknown_plan() {
        assert!("enterprise".parse::<Plan>().is_err());
    }

    #[test]
    fn product_metadata_resolves_known_plans() {
        assert_eq!(Plan::from_product_metadata(Some("pro")), Plan::Pro);
        assert_eq!(Plan::from_product_metadata(Some(" Basic ")), Plan::Basic);
    }

    #[test]
    fn product_metadata_missing_defaults_to_basic() {
        assert_eq!(Plan::from_product_metadata(None), Plan::Basic);
        assert_eq!(Plan::from_product_metadata(Some("")), Plan::Basic);
        assert_eq!(Plan::from_product_metadata(Some("gold")), Plan::Basic);
    }

    #[test]
    fn default_plan_is_free() {
        assert_eq!(Plan::default(), Plan::Free);
    }
}
