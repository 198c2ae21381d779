//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! - `AccountRepository` / `SubscriptionRepository` - Durable upsert-merge store
//! - `PaymentProvider` - Customers, subscriptions and hosted sessions
//! - `SessionValidator` - Bearer token verification
//! - `AccountChangeNotifier` / `AccountChangeSubscriber` - Observer over account state

mod account_changes;
mod account_repository;
mod payment_provider;
mod session_validator;

pub use account_changes::{AccountChangeNotifier, AccountChangeSubscriber, AccountChanged};
pub use account_repository::{AccountRepository, SubscriptionRepository};
pub use payment_provider::{
    CheckoutSession, CreateCheckoutRequest, CreateCustomerRequest, Customer, PaymentError,
    PaymentErrorCode, PaymentProvider, PortalSession, ProviderSubscription,
};
pub use session_validator::SessionValidator;
