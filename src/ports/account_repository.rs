//! Account store ports.
//!
//! Document-style persistence keyed by user id and by subscription id, with
//! upsert-merge semantics: a patch overwrites only the fields it carries and
//! creates the record if it does not exist. Every write is a full overwrite
//! of those fields, never an increment, so replaying a write is harmless.
//!
//! # Example
//!
//! ```ignore
//! async fn sync(
//!     accounts: &dyn AccountRepository,
//!     user_id: &UserId,
//! ) -> Result<UserAccount, DomainError> {
//!     let patch = AccountPatch::subscription_sync(SubscriptionStatus::Active, None);
//!     accounts.upsert(user_id, &patch).await
//! }
//! ```

use crate::domain::billing::{
    AccountPatch, SubscriptionPatch, SubscriptionRecord, UserAccount,
};
use crate::domain::foundation::{DomainError, SubscriptionRef, UserId};
use async_trait::async_trait;

/// Repository port for user accounts.
///
/// Implementations must ensure:
/// - Atomic per-record upsert (no lost fields under concurrent patches)
/// - `billing_customer_ref` is never replaced once set
#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Find an account by user id.
    ///
    /// Returns `None` if the user has never registered or been reconciled.
    async fn find(&self, user_id: &UserId) -> Result<Option<UserAccount>, DomainError>;

    /// Merge a patch into the account, creating it if absent.
    ///
    /// Returns the stored account after the merge.
    ///
    /// # Errors
    ///
    /// - `DatabaseError` on persistence failure
    async fn upsert(&self, user_id: &UserId, patch: &AccountPatch)
        -> Result<UserAccount, DomainError>;

    /// Insert the account unless one already exists.
    ///
    /// Returns the stored account, which is the existing one on conflict.
    async fn insert_if_absent(&self, account: &UserAccount) -> Result<UserAccount, DomainError>;
}

/// Repository port for the subscription-to-owner index.
#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    /// Find a record by subscription id.
    async fn find(
        &self,
        subscription: &SubscriptionRef,
    ) -> Result<Option<SubscriptionRecord>, DomainError>;

    /// Merge a patch into the record, creating it if absent.
    ///
    /// # Errors
    ///
    /// - `ValidationFailed` if creating a record without `user_id`
    /// - `DatabaseError` on persistence failure
    async fn upsert(
        &self,
        subscription: &SubscriptionRef,
        patch: &SubscriptionPatch,
    ) -> Result<SubscriptionRecord, DomainError>;
}
