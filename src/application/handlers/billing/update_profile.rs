//! UpdateProfileHandler - Owner edits of profile attributes.
//!
//! Only display name and photo url are writable here; billing fields are
//! owned by webhook reconciliation.

use std::sync::Arc;

use crate::domain::billing::{AccountPatch, BillingError, UserAccount};
use crate::domain::foundation::{UserId, ValidationError};
use crate::ports::AccountRepository;

/// Longest accepted display name, in characters.
pub const MAX_DISPLAY_NAME_LEN: usize = 100;

/// Command to update the caller's profile.
#[derive(Debug, Clone)]
pub struct UpdateProfileCommand {
    pub user_id: UserId,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
}

pub struct UpdateProfileHandler {
    accounts: Arc<dyn AccountRepository>,
}

impl UpdateProfileHandler {
    pub fn new(accounts: Arc<dyn AccountRepository>) -> Self {
        Self { accounts }
    }

    pub async fn handle(&self, cmd: UpdateProfileCommand) -> Result<UserAccount, BillingError> {
        let display_name = cmd.display_name.map(|n| n.trim().to_string());
        if let Some(name) = &display_name {
            if name.is_empty() {
                return Err(ValidationError::empty_field("display_name").into());
            }
            if name.chars().count() > MAX_DISPLAY_NAME_LEN {
                return Err(ValidationError::too_long("display_name", MAX_DISPLAY_NAME_LEN).into());
            }
        }

        let patch = AccountPatch::profile(display_name, cmd.photo_url);
        if patch.is_empty() {
            return Err(BillingError::validation("profile", "nothing to update"));
        }

        if self.accounts.find(&cmd.user_id).await?.is_none() {
            return Err(BillingError::account_not_found(cmd.user_id));
        }

        let account = self.accounts.upsert(&cmd.user_id, &patch).await?;
        tracing::debug!(user_id = %account.id, "Profile updated");
        Ok(account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::storage::InMemoryAccountStore;
    use crate::domain::billing::{Plan, SubscriptionStatus};
    use crate::domain::foundation::Timestamp;

    fn uid() -> UserId {
        UserId::new("uid-1").unwrap()
    }

    async fn store_with_pro_account() -> InMemoryAccountStore {
        let store = InMemoryAccountStore::new();
        store
            .insert_if_absent(&UserAccount::register(uid(), None, Some("Old".into()), None, Timestamp::now()))
            .await
            .unwrap();
        store
            .upsert(
                &uid(),
                &AccountPatch::subscription_sync(SubscriptionStatus::Active, None).with_plan(Plan::Pro),
            )
            .await
            .unwrap();
        store
    }

    fn command(display_name: Option<&str>, photo_url: Option<&str>) -> UpdateProfileCommand {
        UpdateProfileCommand {
            user_id: uid(),
            display_name: display_name.map(str::to_string),
            photo_url: photo_url.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn updates_profile_and_leaves_billing_alone() {
        let handler = UpdateProfileHandler::new(Arc::new(store_with_pro_account().await));

        let account = handler
            .handle(command(Some("  New Name "), Some("https://img.example.com/n.png")))
            .await
            .unwrap();

        assert_eq!(account.display_name.as_deref(), Some("New Name"));
        assert_eq!(account.photo_url.as_deref(), Some("https://img.example.com/n.png"));
        assert_eq!(account.plan, Plan::Pro);
        assert_eq!(account.subscription_status, SubscriptionStatus::Active);
    }

    #[tokio::test]
    async fn blank_display_name_is_rejected() {
        let handler = UpdateProfileHandler::new(Arc::new(store_with_pro_account().await));

        let err = handler.handle(command(Some("   "), None)).await.unwrap_err();

        assert!(matches!(err, BillingError::ValidationFailed { ref field, .. } if field == "display_name"));
    }

    #[tokio::test]
    async fn overlong_display_name_is_rejected() {
        let handler = UpdateProfileHandler::new(Arc::new(store_with_pro_account().await));
        let long = "x".repeat(MAX_DISPLAY_NAME_LEN + 1);

        let err = handler.handle(command(Some(&long), None)).await.unwrap_err();

        assert!(matches!(err, BillingError::ValidationFailed { .. }));
    }

    #[tokio::test]
    async fn empty_update_is_rejected() {
        let handler = UpdateProfileHandler::new(Arc::new(store_with_pro_account().await));

        let err = handler.handle(command(None, None)).await.unwrap_err();

        assert!(matches!(err, BillingError::ValidationFailed { .. }));
    }

    #[tokio::test]
    async fn missing_account_is_not_found_and_not_created() {
        let store = InMemoryAccountStore::new();
        let handler = UpdateProfileHandler::new(Arc::new(store.clone()));

        let err = handler.handle(command(Some("Ada"), None)).await.unwrap_err();

        assert!(matches!(err, BillingError::AccountNotFound(_)));
        assert_eq!(store.account_count().await, 0);
    }
}
