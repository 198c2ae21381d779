//! Pricing catalogue shown on the pricing page.
//!
//! Prices are display values in cents; the amount actually charged is
//! whatever the provider price says. Price refs are deployment config.

use serde::Serialize;

use super::plan::Plan;
use crate::domain::foundation::PriceRef;

/// One purchasable (or free) plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanOffering {
    pub plan: Plan,
    pub name: &'static str,
    pub description: &'static str,
    /// Monthly price in cents.
    pub monthly_price_cents: u32,
    /// Provider price to check out with. `None` for free or unconfigured.
    pub price_ref: Option<PriceRef>,
    pub features: Vec<&'static str>,
}

/// The plans on offer, cheapest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanCatalogue {
    offerings: Vec<PlanOffering>,
}

impl PlanCatalogue {
    /// The standard three-tier catalogue.
    ///
    /// | Plan | Price/mo | Checkout |
    /// |------|----------|----------|
    /// | Free | $0 | never |
    /// | Basic | $9.99 | `basic_price` |
    /// | Pro | $29.99 | `pro_price` |
    pub fn standard(basic_price: Option<PriceRef>, pro_price: Option<PriceRef>) -> Self {
        Self {
            offerings: vec![
                PlanOffering {
                    plan: Plan::Free,
                    name: Plan::Free.display_name(),
                    description: "Basic features for personal use",
                    monthly_price_cents: 0,
                    price_ref: None,
                    features: vec!["Limited access to features", "Basic support", "1 user only"],
                },
                PlanOffering {
                    plan: Plan::Basic,
                    name: Plan::Basic.display_name(),
                    description: "Everything you need to get started",
                    monthly_price_cents: 999,
                    price_ref: basic_price,
                    features: vec![
                        "All Free features",
                        "Priority support",
                        "Advanced features",
                        "Up to 3 users",
                    ],
                },
                PlanOffering {
                    plan: Plan::Pro,
                    name: Plan::Pro.display_name(),
                    description: "For teams and professionals",
                    monthly_price_cents: 2999,
                    price_ref: pro_price,
                    features: vec![
                        "All Basic features",
                        "Premium support",
                        "All advanced features",
                        "Unlimited users",
                        "Custom integrations",
                    ],
                },
            ],
        }
    }

    pub fn offerings(&self) -> &[PlanOffering] {
        &self.offerings
    }

    pub fn get(&self, plan: Plan) -> Option<&PlanOffering> {
        self.offerings.iter().find(|o| o.plan == plan)
    }

    /// The plan a configured price sells, if any.
    pub fn plan_for_price(&self, price: &PriceRef) -> Option<Plan> {
        self.offerings
            .iter()
            .find(|o| o.price_ref.as_ref() == Some(price))
            .map(|o| o.plan)
    }
}
