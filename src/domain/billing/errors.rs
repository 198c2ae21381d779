//! Billing-specific error types.
//!
//! Errors raised by account, checkout and portal operations.
//!
//! # HTTP Status Mapping
//!
//! | Error | HTTP Status |
//! |-------|-------------|
//! | AccountNotFound | 404 |
//! | NoBillingCustomer | 400 |
//! | ValidationFailed | 400 |
//! | PaymentProvider | 502 |
//! | Infrastructure | 500 |

use crate::domain::foundation::{DomainError, ErrorCode, UserId, ValidationError};

/// Billing-specific errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BillingError {
    /// No account exists for this user.
    AccountNotFound(UserId),

    /// The account has never been linked to a payment-provider customer.
    NoBillingCustomer(UserId),

    /// Request input failed validation.
    ValidationFailed { field: String, message: String },

    /// The payment provider rejected or failed the request.
    PaymentProvider { message: String, retryable: bool },

    /// Infrastructure error.
    Infrastructure(String),
}

impl BillingError {
    pub fn account_not_found(user_id: UserId) -> Self {
        BillingError::AccountNotFound(user_id)
    }

    pub fn no_billing_customer(user_id: UserId) -> Self {
        BillingError::NoBillingCustomer(user_id)
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        BillingError::ValidationFailed {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn payment_provider(message: impl Into<String>, retryable: bool) -> Self {
        BillingError::PaymentProvider {
            message: message.into(),
            retryable,
        }
    }

    pub fn infrastructure(message: impl Into<String>) -> Self {
        BillingError::Infrastructure(message.into())
    }

    /// Returns the error code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            BillingError::AccountNotFound(_) => ErrorCode::AccountNotFound,
            BillingError::NoBillingCustomer(_) => ErrorCode::NoBillingCustomer,
            BillingError::ValidationFailed { .. } => ErrorCode::ValidationFailed,
            BillingError::PaymentProvider { .. } => ErrorCode::PaymentProviderError,
            BillingError::Infrastructure(_) => ErrorCode::DatabaseError,
        }
    }

    /// Returns a user-friendly error message.
    pub fn message(&self) -> String {
        match self {
            BillingError::AccountNotFound(user_id) => {
                format!("No account found for user: {}", user_id)
            }
            BillingError::NoBillingCustomer(_) => "Customer has no subscription".to_string(),
            BillingError::ValidationFailed { field, message } => {
                format!("Validation failed for '{}': {}", field, message)
            }
            BillingError::PaymentProvider { message, .. } => {
                format!("Payment provider error: {}", message)
            }
            BillingError::Infrastructure(msg) => format!("Error: {}", msg),
        }
    }

    /// Returns true if this error should trigger a retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            BillingError::Infrastructure(_) => true,
            BillingError::PaymentProvider { retryable, .. } => *retryable,
            _ => false,
        }
    }
}

impl std::fmt::Display for BillingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for BillingError {}

impl From<DomainError> for BillingError {
    fn from(err: DomainError) -> Self {
        match err.code {
            ErrorCode::ValidationFailed | ErrorCode::EmptyField | ErrorCode::InvalidFormat => {
                BillingError::ValidationFailed {
                    field: err
                        .details
                        .get("field")
                        .cloned()
                        .unwrap_or_else(|| "unknown".to_string()),
                    message: err.message,
                }
            }
            ErrorCode::PaymentProviderError => BillingError::PaymentProvider {
                message: err.message,
                retryable: false,
            },
            _ => BillingError::Infrastructure(err.to_string()),
        }
    }
}

impl From<ValidationError> for BillingError {
    fn from(err: ValidationError) -> Self {
        let field = match &err {
            ValidationError::EmptyField { field }
            | ValidationError::TooLong { field, .. }
            | ValidationError::InvalidFormat { field, .. } => field.clone(),
        };
        BillingError::ValidationFailed {
            field,
            message: err.to_string(),
        }
    }
}

impl From<BillingError> for DomainError {
    fn from(err: BillingError) -> Self {
        DomainError::new(err.code(), err.message())
    }
}
