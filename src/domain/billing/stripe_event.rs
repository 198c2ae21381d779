//! Stripe webhook event envelope.
//!
//! Only fields relevant to reconciliation are captured. The polymorphic
//! `data.object` stays a JSON value until [`super::BillingEvent`] narrows it.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Stripe webhook event (simplified).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeEvent {
    /// Unique identifier for the event (evt_xxx format).
    pub id: String,

    /// Type of event (e.g., "checkout.session.completed").
    #[serde(rename = "type")]
    pub event_type: String,

    /// Time at which the event was created (Unix timestamp).
    pub created: i64,

    /// Object containing event-specific data.
    pub data: StripeEventData,

    /// Whether this is a live mode event (vs test mode).
    #[serde(default)]
    pub livemode: bool,

    /// API version used to render this event.
    #[serde(default)]
    pub api_version: Option<String>,
}

/// Container for event-specific data.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeEventData {
    /// The object that triggered the event (polymorphic based on event type).
    pub object: serde_json::Value,

    /// Previous values for updated attributes (only for update events).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_attributes: Option<serde_json::Value>,
}

impl StripeEvent {
    /// Returns true if this is a live mode event.
    pub fn is_live(&self) -> bool {
        self.livemode
    }

    /// Attempts to deserialize the data object as the specified type.
    pub fn deserialize_object<T: serde::de::DeserializeOwned>(
        &self,
    ) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.data.object.clone())
    }

    /// Parse the event type into a known enum variant.
    pub fn parsed_type(&self) -> StripeEventType {
        StripeEventType::from_str(&self.event_type)
    }
}

/// Stripe event types the reconciler acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StripeEventType {
    /// Checkout session completed successfully.
    CheckoutSessionCompleted,
    /// Customer subscription was updated.
    CustomerSubscriptionUpdated,
    /// Customer subscription was deleted.
    CustomerSubscriptionDeleted,
    /// Any other event type.
    Unknown,
}

impl StripeEventType {
    /// Parse event type from string.
    pub fn from_str(s: &str) -> Self {
        match s {
            "checkout.session.completed" => Self::CheckoutSessionCompleted,
            "customer.subscription.updated" => Self::CustomerSubscriptionUpdated,
            "customer.subscription.deleted" => Self::CustomerSubscriptionDeleted,
            _ => Self::Unknown,
        }
    }

    /// Convert to the Stripe event type string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CheckoutSessionCompleted => "checkout.session.completed",
            Self::CustomerSubscriptionUpdated => "customer.subscription.updated",
            Self::CustomerSubscriptionDeleted => "customer.subscription.deleted",
            Self::Unknown => "unknown",
        }
    }
}

/// `data.object` of a `checkout.session.completed` event.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSessionObject {
    pub id: String,
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(default)]
    pub subscription: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// `data.object` of a `customer.subscription.*` event.
#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionObject {
    pub id: String,
    #[serde(default)]
    pub customer: Option<String>,
    pub status: String,
    #[serde(default)]
    pub current_period_end: Option<i64>,
    #[serde(default)]
    pub items: SubscriptionItems,
}

impl SubscriptionObject {
    /// Period end in unix seconds. Newer API versions carry it on the
    /// subscription items only.
    pub fn period_end(&self) -> Option<i64> {
        self.current_period_end
            .or_else(|| self.items.data.iter().find_map(|i| i.current_period_end))
    }
}

/// `items` list of a subscription object.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubscriptionItems {
    #[serde(default)]
    pub data: Vec<SubscriptionItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionItem {
    #[serde(default)]
    pub current_period_end: Option<i64>,
}

/// Builder for creating test StripeEvent instances.
#[cfg(test)]
pub struct StripeEventBuilder {
    id: String,
    event_type: String,
    created: i64,
    object: serde_json::Value,
    livemode: bool,
}

#[cfg(test)]
impl Default for StripeEventBuilder {
    fn default() -> Self {
        Self {
            id: "evt_test_123".to_string(),
            event_type: "checkout.session.completed".to_string(),
            created: chrono::Utc::now().timestamp(),
            object: serde_json::json!({}),
            livemode: false,
        }
    }
}

#[cfg(test)]
impl StripeEventBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = event_type.into();
        self
    }

    pub fn object(mut self, object: serde_json::Value) -> Self {
        self.object = object;
        self
    }

    pub fn livemode(mut self, livemode: bool) -> Self {
        self.livemode = livemode;
        self
    }

    pub fn build(self) -> StripeEvent {
        StripeEvent {
            id: self.id,
            event_type: self.event_type,
            created: self.created,
            data: StripeEventData {
                object: self.object,
                previous_attributes: None,
            },
            livemode: self.livemode,
            api_version: Some("2023-10-16".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // ══════════════════════════════════════════════════════════════
    // Deserialization Tests
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn deserialize_minimal_event() {
        let json = r#"{
            "id": "evt_1234567890",
            "type": "checkout.session.completed",
            "created": 1704067200,
            "data": { "object": {} },
            "livemode": false,
            "api_version": "2023-10-16"
        }"#;

        let event: StripeEvent = serde_json::from_str(json).unwrap();

        assert_eq!(event.id, "evt_1234567890");
        assert_eq!(event.parsed_type(), StripeEventType::CheckoutSessionCompleted);
        assert_eq!(event.api_version.as_deref(), Some("2023-10-16"));
        assert!(!event.is_live());
    }

    #[test]
    fn deserialize_event_without_api_version() {
        let json = r#"{"id":"evt_1","type":"ping","created":1,"data":{"object":{}}}"#;

        let event: StripeEvent = serde_json::from_str(json).unwrap();

        assert!(event.api_version.is_none());
        assert_eq!(event.parsed_type(), StripeEventType::Unknown);
    }

    #[test]
    fn deserialize_subscription_object() {
        let event = StripeEventBuilder::new()
            .event_type("customer.subscription.updated")
            .object(json!({
                "id": "sub_123",
                "object": "subscription",
                "customer": "cus_123",
                "status": "past_due",
                "current_period_end": 1706745600
            }))
            .build();

        let sub: SubscriptionObject = event.deserialize_object().unwrap();

        assert_eq!(sub.id, "sub_123");
        assert_eq!(sub.status, "past_due");
        assert_eq!(sub.current_period_end, Some(1706745600));
    }

    #[test]
    fn deserialize_checkout_object_with_metadata() {
        let event = StripeEventBuilder::new()
            .object(json!({
                "id": "cs_123",
                "customer": "cus_1",
                "subscription": "sub_1",
                "metadata": { "firebaseUID": "uid-1" }
            }))
            .build();

        let session: CheckoutSessionObject = event.deserialize_object().unwrap();

        assert_eq!(session.metadata.get("firebaseUID").map(String::as_str), Some("uid-1"));
        assert_eq!(session.subscription.as_deref(), Some("sub_1"));
    }

    #[test]
    fn event_type_round_trips_known_names() {
        for t in [
            StripeEventType::CheckoutSessionCompleted,
            StripeEventType::CustomerSubscriptionUpdated,
            StripeEventType::CustomerSubscriptionDeleted,
        ] {
            assert_eq!(StripeEventType::from_str(t.as_str()), t);
        }
    }

    #[test]
    fn invoice_events_are_unknown() {
        assert_eq!(
            StripeEventType::from_str("invoice.payment_succeeded"),
            StripeEventType::Unknown
        );
    }
}
