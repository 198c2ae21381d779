//! RegisterAccountHandler - Creates the account record at sign-up.

use std::sync::Arc;

use crate::domain::billing::{BillingError, UserAccount};
use crate::domain::foundation::{AuthenticatedUser, Timestamp};
use crate::ports::AccountRepository;

/// Command to register the signed-in user.
#[derive(Debug, Clone)]
pub struct RegisterAccountCommand {
    pub user: AuthenticatedUser,
}

/// Result of registration.
#[derive(Debug, Clone)]
pub struct RegisterAccountResult {
    pub account: UserAccount,
    /// False when the account already existed and was returned unchanged.
    pub created: bool,
}

/// Handler for idempotent account registration.
pub struct RegisterAccountHandler {
    accounts: Arc<dyn AccountRepository>,
}

impl RegisterAccountHandler {
    pub fn new(accounts: Arc<dyn AccountRepository>) -> Self {
        Self { accounts }
    }

    pub async fn handle(
        &self,
        cmd: RegisterAccountCommand,
    ) -> Result<RegisterAccountResult, BillingError> {
        let user = cmd.user;
        if let Some(existing) = self.accounts.find(&user.id).await? {
            return Ok(RegisterAccountResult {
                account: existing,
                created: false,
            });
        }

        let email = user.contact_email().map(str::to_string);
        let candidate = UserAccount::register(
            user.id,
            email,
            user.display_name,
            user.photo_url,
            Timestamp::now(),
        );

        // A concurrent registration may win; insert_if_absent returns its record.
        let stored = self.accounts.insert_if_absent(&candidate).await?;
        tracing::info!(user_id = %stored.id, "Account registered");

        Ok(RegisterAccountResult {
            account: stored,
            created: true,
        })
    }
}
