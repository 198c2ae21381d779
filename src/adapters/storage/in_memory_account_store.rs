//! In-Memory Account Store Adapter
//!
//! Stores accounts and subscription records in memory.
//! Used when no database is configured, and in tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::billing::{AccountPatch, SubscriptionPatch, SubscriptionRecord, UserAccount};
use crate::domain::foundation::{DomainError, ErrorCode, SubscriptionRef, Timestamp, UserId};
use crate::ports::{AccountRepository, SubscriptionRepository};

/// In-memory storage for both account collections.
///
/// Each upsert holds the collection's write lock across read-merge-write, so
/// concurrent patches to one record never lose fields.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAccountStore {
    accounts: Arc<RwLock<HashMap<UserId, UserAccount>>>,
    subscriptions: Arc<RwLock<HashMap<SubscriptionRef, SubscriptionRecord>>>,
    writes: Arc<AtomicUsize>,
    fail_writes: Arc<AtomicBool>,
}

impl InMemoryAccountStore {
    /// Create a new in-memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of successful writes across both collections.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Make every subsequent write fail with a database error (for tests).
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub async fn account_count(&self) -> usize {
        self.accounts.read().await.len()
    }

    pub async fn subscription_count(&self) -> usize {
        self.subscriptions.read().await.len()
    }

    fn check_writable(&self) -> Result<(), DomainError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(DomainError::new(
                ErrorCode::DatabaseError,
                "in-memory store is failing writes",
            ));
        }
        Ok(())
    }

    fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl AccountRepository for InMemoryAccountStore {
    async fn find(&self, user_id: &UserId) -> Result<Option<UserAccount>, DomainError> {
        Ok(self.accounts.read().await.get(user_id).cloned())
    }

    async fn upsert(
        &self,
        user_id: &UserId,
        patch: &AccountPatch,
    ) -> Result<UserAccount, DomainError> {
        self.check_writable()?;
        let now = Timestamp::now();

        let mut accounts = self.accounts.write().await;
        let account = accounts
            .entry(user_id.clone())
            .and_modify(|existing| existing.apply(patch, now))
            .or_insert_with(|| UserAccount::from_patch(user_id.clone(), patch, now))
            .clone();

        self.record_write();
        Ok(account)
    }

    async fn insert_if_absent(&self, account: &UserAccount) -> Result<UserAccount, DomainError> {
        self.check_writable()?;

        let mut accounts = self.accounts.write().await;
        if let Some(existing) = accounts.get(&account.id) {
            return Ok(existing.clone());
        }
        accounts.insert(account.id.clone(), account.clone());

        self.record_write();
        Ok(account.clone())
    }
}

#[async_trait]
impl SubscriptionRepository for InMemoryAccountStore {
    async fn find(
        &self,
        subscription: &SubscriptionRef,
    ) -> Result<Option<SubscriptionRecord>, DomainError> {
        Ok(self.subscriptions.read().await.get(subscription).cloned())
    }

    async fn upsert(
        &self,
        subscription: &SubscriptionRef,
        patch: &SubscriptionPatch,
    ) -> Result<SubscriptionRecord, DomainError> {
        self.check_writable()?;
        let now = Timestamp::now();

        let mut subscriptions = self.subscriptions.write().await;
        let record = match subscriptions.get_mut(subscription) {
            Some(existing) => {
                existing.apply(patch, now);
                existing.clone()
            }
            None => {
                let record = SubscriptionRecord::from_patch(subscription.clone(), patch, now)?;
                subscriptions.insert(subscription.clone(), record.clone());
                record
            }
        };

        self.record_write();
        Ok(record)
    }
}
