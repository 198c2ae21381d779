//! Foundation module - Shared domain primitives.
//!
//! Contains identifiers, timestamps, authentication types and the error
//! vocabulary shared by the billing domain.

mod auth;
mod errors;
mod ids;
mod timestamp;

pub use auth::{AuthError, AuthenticatedUser};
pub use errors::{DomainError, ErrorCode, ValidationError};
pub use ids::{ChangeId, CustomerRef, PriceRef, ProductRef, SubscriptionRef, UserId};
pub use timestamp::Timestamp;
