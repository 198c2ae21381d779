//! Strongly-typed identifier value objects.
//!
//! Identity-provider subjects and payment-provider object ids are opaque
//! strings owned by those providers. They are wrapped so a customer id can
//! never be passed where a subscription id is expected.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::ValidationError;

/// Declares a non-empty string identifier issued by an external provider.
macro_rules! provider_ref {
    ($(#[$meta:meta])* $name:ident, $field:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates the identifier, returning error if empty or blank.
            pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
                let id = id.into();
                if id.trim().is_empty() {
                    return Err(ValidationError::empty_field($field));
                }
                Ok(Self(id))
            }

            /// Returns the inner string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consumes the identifier, returning the inner string.
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }
    };
}

provider_ref!(
    /// Identity-provider subject (Firebase UID). Primary key of a user account.
    UserId,
    "user_id"
);

provider_ref!(
    /// Payment-provider customer id (`cus_...`).
    CustomerRef,
    "customer_ref"
);

provider_ref!(
    /// Payment-provider subscription id (`sub_...`).
    SubscriptionRef,
    "subscription_ref"
);

provider_ref!(
    /// Payment-provider price id (`price_...`).
    PriceRef,
    "price_ref"
);

provider_ref!(
    /// Payment-provider product id (`prod_...`).
    ProductRef,
    "product_ref"
);

/// Unique identifier for an account change notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangeId(Uuid);

impl ChangeId {
    /// Creates a new random ChangeId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ChangeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ChangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ChangeId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}
