//! GetAccountHandler - Query handler for the caller's account.

use std::sync::Arc;

use crate::domain::billing::{BillingError, UserAccount};
use crate::domain::foundation::UserId;
use crate::ports::AccountRepository;

/// Query for one account.
#[derive(Debug, Clone)]
pub struct GetAccountQuery {
    pub user_id: UserId,
}

pub struct GetAccountHandler {
    accounts: Arc<dyn AccountRepository>,
}

impl GetAccountHandler {
    pub fn new(accounts: Arc<dyn AccountRepository>) -> Self {
        Self { accounts }
    }

    pub async fn handle(&self, query: GetAccountQuery) -> Result<UserAccount, BillingError> {
        self.accounts
            .find(&query.user_id)
            .await?
            .ok_or(BillingError::AccountNotFound(query.user_id))
    }
}
