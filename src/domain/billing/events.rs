//! Closed set of billing events the reconciler handles.
//!
//! A verified [`StripeEvent`] is narrowed into one of these variants before
//! any state is touched. Event types outside the set become
//! [`BillingEvent::Unhandled`] and are acknowledged without writes.

use super::status::SubscriptionStatus;
use super::stripe_event::{CheckoutSessionObject, StripeEvent, StripeEventType, SubscriptionObject};
use super::webhook_errors::WebhookError;
use crate::domain::foundation::{CustomerRef, SubscriptionRef, Timestamp, UserId};

/// Checkout-session metadata key carrying the identity-provider subject.
pub const USER_ID_METADATA_KEY: &str = "firebaseUID";

/// A payment-provider lifecycle event, narrowed to what reconciliation needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BillingEvent {
    CheckoutCompleted(CheckoutCompleted),
    SubscriptionUpdated(SubscriptionChanged),
    SubscriptionDeleted(SubscriptionChanged),
    Unhandled { event_type: String },
}

/// A hosted checkout finished.
///
/// Customer, subscription and user are optional here because the provider
/// sends completed sessions for every mode; the reconciler decides what a
/// session without them means.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutCompleted {
    pub session_id: String,
    pub customer_ref: Option<CustomerRef>,
    pub subscription_ref: Option<SubscriptionRef>,
    pub user_id: Option<UserId>,
}

/// A subscription's status or billing period changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionChanged {
    pub subscription_ref: SubscriptionRef,
    pub customer_ref: Option<CustomerRef>,
    pub status: SubscriptionStatus,
    pub current_period_end: Option<Timestamp>,
}

impl BillingEvent {
    /// Narrows a verified provider event.
    ///
    /// # Errors
    ///
    /// Returns `ParseError` when a handled event type carries a payload of
    /// the wrong shape, or a subscription status outside the known set.
    pub fn from_stripe(event: &StripeEvent) -> Result<Self, WebhookError> {
        match event.parsed_type() {
            StripeEventType::CheckoutSessionCompleted => {
                let session: CheckoutSessionObject = event
                    .deserialize_object()
                    .map_err(|e| WebhookError::ParseError(e.to_string()))?;
                Ok(BillingEvent::CheckoutCompleted(CheckoutCompleted {
                    session_id: session.id,
                    customer_ref: session.customer.and_then(|c| CustomerRef::new(c).ok()),
                    subscription_ref: session
                        .subscription
                        .and_then(|s| SubscriptionRef::new(s).ok()),
                    user_id: session
                        .metadata
                        .get(USER_ID_METADATA_KEY)
                        .and_then(|uid| UserId::new(uid.as_str()).ok()),
                }))
            }
            StripeEventType::CustomerSubscriptionUpdated => {
                Ok(BillingEvent::SubscriptionUpdated(subscription_changed(event)?))
            }
            StripeEventType::CustomerSubscriptionDeleted => {
                Ok(BillingEvent::SubscriptionDeleted(subscription_changed(event)?))
            }
            StripeEventType::Unknown => Ok(BillingEvent::Unhandled {
                event_type: event.event_type.clone(),
            }),
        }
    }

    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            BillingEvent::CheckoutCompleted(_) => "checkout_completed",
            BillingEvent::SubscriptionUpdated(_) => "subscription_updated",
            BillingEvent::SubscriptionDeleted(_) => "subscription_deleted",
            BillingEvent::Unhandled { .. } => "unhandled",
        }
    }
}

fn subscription_changed(event: &StripeEvent) -> Result<SubscriptionChanged, WebhookError> {
    let sub: SubscriptionObject = event
        .deserialize_object()
        .map_err(|e| WebhookError::ParseError(e.to_string()))?;
    let period_end = sub.period_end();

    let subscription_ref =
        SubscriptionRef::new(sub.id).map_err(|_| WebhookError::MissingField("id"))?;
    let status = sub
        .status
        .parse::<SubscriptionStatus>()
        .map_err(|e| WebhookError::ParseError(e.to_string()))?;

    Ok(SubscriptionChanged {
        subscription_ref,
        customer_ref: sub.customer.and_then(|c| CustomerRef::new(c).ok()),
        status,
        current_period_end: period_end.and_then(Timestamp::from_unix_secs),
    })
}
