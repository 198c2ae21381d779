//! Stripe REST response shapes.
//!
//! Only the fields the adapter reads are modelled; everything else in the
//! payload is ignored by serde.

use std::collections::HashMap;

use serde::Deserialize;

use crate::domain::billing::SubscriptionStatus;
use crate::domain::foundation::{CustomerRef, PriceRef, ProductRef, SubscriptionRef, Timestamp};
use crate::ports::{PaymentError, ProviderSubscription};

/// Product metadata key naming the plan a product grants.
pub const PLAN_METADATA_KEY: &str = "plan";

/// Stripe Customer object.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeCustomer {
    pub id: String,
    pub email: Option<String>,
}

/// Stripe Subscription object with `items.data.price.product` expanded.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeSubscription {
    pub id: String,
    pub customer: Option<String>,
    pub status: String,

    /// Present on API versions before 2025-03; newer versions carry it per item.
    pub current_period_end: Option<i64>,

    #[serde(default)]
    pub items: StripeList<StripeSubscriptionItem>,
}

/// Stripe list envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeList<T> {
    pub data: Vec<T>,
}

impl<T> Default for StripeList<T> {
    fn default() -> Self {
        Self { data: Vec::new() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeSubscriptionItem {
    pub price: Option<StripePrice>,
    pub current_period_end: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripePrice {
    pub id: String,
    pub product: Option<ExpandableProduct>,
}

/// A product reference: a bare id, or the object when expanded.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ExpandableProduct {
    Id(String),
    Object(StripeProduct),
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeProduct {
    pub id: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl ExpandableProduct {
    pub fn id(&self) -> &str {
        match self {
            ExpandableProduct::Id(id) => id,
            ExpandableProduct::Object(product) => &product.id,
        }
    }

    /// The product's `plan` metadata. Unexpanded products carry none.
    pub fn plan_metadata(&self) -> Option<&str> {
        match self {
            ExpandableProduct::Id(_) => None,
            ExpandableProduct::Object(product) => {
                product.metadata.get(PLAN_METADATA_KEY).map(String::as_str)
            }
        }
    }
}

impl TryFrom<StripeSubscription> for ProviderSubscription {
    type Error = PaymentError;

    fn try_from(sub: StripeSubscription) -> Result<Self, Self::Error> {
        let status = sub
            .status
            .parse::<SubscriptionStatus>()
            .map_err(|e| PaymentError::provider(e.to_string()))?;

        let item = sub.items.data.first();
        let price = item.and_then(|i| i.price.as_ref());
        let product = price.and_then(|p| p.product.as_ref());

        let period_end = sub
            .current_period_end
            .or_else(|| item.and_then(|i| i.current_period_end));

        Ok(ProviderSubscription {
            id: SubscriptionRef::new(sub.id).map_err(|e| PaymentError::provider(e.to_string()))?,
            customer: sub.customer.and_then(|c| CustomerRef::new(c).ok()),
            status,
            current_period_end: period_end.and_then(Timestamp::from_unix_secs),
            price: price.and_then(|p| PriceRef::new(p.id.as_str()).ok()),
            product: product.and_then(|p| ProductRef::new(p.id()).ok()),
            product_plan: product.and_then(|p| p.plan_metadata()).map(str::to_string),
        })
    }
}

/// Stripe Checkout Session or Billing Portal Session creation response.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeSessionResponse {
    pub id: String,
    pub url: Option<String>,
}

/// Stripe error envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeErrorResponse {
    pub error: StripeErrorBody,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeErrorBody {
    pub message: Option<String>,
    pub code: Option<String>,
    #[serde(rename = "type")]
    pub error_type: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::billing::Plan;

    fn parse(json: &str) -> ProviderSubscription {
        let sub: StripeSubscription = serde_json::from_str(json).unwrap();
        sub.try_into().unwrap()
    }

    #[test]
    fn expanded_subscription_reads_product_plan() {
        let sub = parse(
            r#"{
                "id": "sub_1",
                "object": "subscription",
                "customer": "cus_1",
                "status": "active",
                "current_period_end": 1706745600,
                "items": { "object": "list", "data": [{
                    "id": "si_1",
                    "price": {
                        "id": "price_pro",
                        "product": { "id": "prod_pro", "metadata": { "plan": "pro" } }
                    }
                }]}
            }"#,
        );

        assert_eq!(sub.status, SubscriptionStatus::Active);
        assert_eq!(sub.price.unwrap().as_str(), "price_pro");
        assert_eq!(sub.product.unwrap().as_str(), "prod_pro");
        assert_eq!(sub.current_period_end.unwrap().as_unix_secs(), 1706745600);
        assert_eq!(sub.product_plan.as_deref(), Some("pro"));
    }

    #[test]
    fn unexpanded_product_defaults_to_basic() {
        let sub = parse(
            r#"{
                "id": "sub_1",
                "customer": "cus_1",
                "status": "trialing",
                "items": { "data": [{ "price": { "id": "price_1", "product": "prod_1" } }] }
            }"#,
        );

        assert_eq!(sub.product.unwrap().as_str(), "prod_1");
        assert!(sub.product_plan.is_none());
        assert_eq!(Plan::from_product_metadata(sub.product_plan.as_deref()), Plan::Basic);
    }

    #[test]
    fn period_end_falls_back_to_item() {
        let sub = parse(
            r#"{
                "id": "sub_1",
                "status": "past_due",
                "items": { "data": [{ "current_period_end": 1700000000 }] }
            }"#,
        );

        assert_eq!(sub.current_period_end.unwrap().as_unix_secs(), 1700000000);
        assert!(sub.price.is_none());
    }

    #[test]
    fn unknown_status_is_a_provider_error() {
        let raw: StripeSubscription =
            serde_json::from_str(r#"{ "id": "sub_1", "status": "mystery" }"#).unwrap();
        let result: Result<ProviderSubscription, _> = raw.try_into();
        assert!(result.is_err());
    }

    #[test]
    fn error_envelope_parses() {
        let err: StripeErrorResponse = serde_json::from_str(
            r#"{ "error": { "message": "No such price", "code": "resource_missing", "type": "invalid_request_error" } }"#,
        )
        .unwrap();
        assert_eq!(err.error.code.as_deref(), Some("resource_missing"));
    }
}
