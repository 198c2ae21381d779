//! PostgreSQL implementation of the account ports.
//!
//! Patches are merged in a single `INSERT ... ON CONFLICT DO UPDATE`
//! statement with `COALESCE`, so absent fields keep their stored value and
//! the merge is atomic per row.

use crate::domain::billing::{
    AccountPatch, AccountRole, Plan, SubscriptionPatch, SubscriptionRecord, SubscriptionStatus,
    UserAccount,
};
use crate::domain::foundation::{
    CustomerRef, DomainError, ErrorCode, PriceRef, ProductRef, SubscriptionRef, Timestamp, UserId,
};
use crate::ports::{AccountRepository, SubscriptionRepository};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

const ACCOUNT_COLUMNS: &str = "id, email, display_name, photo_url, role, billing_customer_ref, \
     plan, subscription_status, subscription_ref, subscription_price_ref, current_period_end, \
     created_at, updated_at";

const SUBSCRIPTION_COLUMNS: &str = "subscription_ref, user_id, customer_ref, status, plan, \
     price_ref, product_ref, current_period_end, created_at, updated_at";

/// PostgreSQL implementation of `AccountRepository` and `SubscriptionRepository`.
#[derive(Clone)]
pub struct PostgresAccountStore {
    pool: PgPool,
}

impl PostgresAccountStore {
    /// Creates a new store with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Database row representation of an account.
#[derive(Debug, sqlx::FromRow)]
struct AccountRow {
    id: String,
    email: Option<String>,
    display_name: Option<String>,
    photo_url: Option<String>,
    role: String,
    billing_customer_ref: Option<String>,
    plan: String,
    subscription_status: String,
    subscription_ref: Option<String>,
    subscription_price_ref: Option<String>,
    current_period_end: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<AccountRow> for UserAccount {
    type Error = DomainError;

    fn try_from(row: AccountRow) -> Result<Self, Self::Error> {
        Ok(UserAccount {
            id: UserId::new(row.id).map_err(corrupt)?,
            email: row.email,
            display_name: row.display_name,
            photo_url: row.photo_url,
            role: row.role.parse::<AccountRole>().map_err(corrupt)?,
            billing_customer_ref: row
                .billing_customer_ref
                .map(CustomerRef::new)
                .transpose()
                .map_err(corrupt)?,
            plan: row.plan.parse::<Plan>().map_err(corrupt)?,
            subscription_status: row
                .subscription_status
                .parse::<SubscriptionStatus>()
                .map_err(corrupt)?,
            subscription_ref: row
                .subscription_ref
                .map(SubscriptionRef::new)
                .transpose()
                .map_err(corrupt)?,
            subscription_price_ref: row
                .subscription_price_ref
                .map(PriceRef::new)
                .transpose()
                .map_err(corrupt)?,
            current_period_end: row.current_period_end.map(Timestamp::from_datetime),
            created_at: Timestamp::from_datetime(row.created_at),
            updated_at: Timestamp::from_datetime(row.updated_at),
        })
    }
}

/// Database row representation of a subscription record.
#[derive(Debug, sqlx::FromRow)]
struct SubscriptionRow {
    subscription_ref: String,
    user_id: String,
    customer_ref: Option<String>,
    status: String,
    plan: String,
    price_ref: Option<String>,
    product_ref: Option<String>,
    current_period_end: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SubscriptionRow> for SubscriptionRecord {
    type Error = DomainError;

    fn try_from(row: SubscriptionRow) -> Result<Self, Self::Error> {
        Ok(SubscriptionRecord {
            subscription_ref: SubscriptionRef::new(row.subscription_ref).map_err(corrupt)?,
            user_id: UserId::new(row.user_id).map_err(corrupt)?,
            customer_ref: row.customer_ref.map(CustomerRef::new).transpose().map_err(corrupt)?,
            status: row.status.parse::<SubscriptionStatus>().map_err(corrupt)?,
            plan: row.plan.parse::<Plan>().map_err(corrupt)?,
            price_ref: row.price_ref.map(PriceRef::new).transpose().map_err(corrupt)?,
            product_ref: row.product_ref.map(ProductRef::new).transpose().map_err(corrupt)?,
            current_period_end: row.current_period_end.map(Timestamp::from_datetime),
            created_at: Timestamp::from_datetime(row.created_at),
            updated_at: Timestamp::from_datetime(row.updated_at),
        })
    }
}

/// A stored value that no longer parses into the domain type.
fn corrupt(e: impl std::fmt::Display) -> DomainError {
    DomainError::new(ErrorCode::DatabaseError, format!("Invalid stored value: {}", e))
}

fn db_error(action: &str) -> impl FnOnce(sqlx::Error) -> DomainError + '_ {
    move |e| DomainError::new(ErrorCode::DatabaseError, format!("Failed to {}: {}", action, e))
}

#[async_trait]
impl AccountRepository for PostgresAccountStore {
    async fn find(&self, user_id: &UserId) -> Result<Option<UserAccount>, DomainError> {
        let row: Option<AccountRow> = sqlx::query_as(&format!(
            "SELECT {} FROM user_accounts WHERE id = $1",
            ACCOUNT_COLUMNS
        ))
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("find account"))?;

        row.map(UserAccount::try_from).transpose()
    }

    async fn upsert(
        &self,
        user_id: &UserId,
        patch: &AccountPatch,
    ) -> Result<UserAccount, DomainError> {
        let sql = format!(
            r#"
            INSERT INTO user_accounts (
                id, email, display_name, photo_url, billing_customer_ref,
                plan, subscription_status, subscription_ref, subscription_price_ref,
                current_period_end, created_at, updated_at
            ) VALUES (
                $1, $2, $3, $4, $5,
                COALESCE($6, 'free'), COALESCE($7, 'none'), $8, $9,
                $10, $11, $11
            )
            ON CONFLICT (id) DO UPDATE SET
                email = COALESCE($2, user_accounts.email),
                display_name = COALESCE($3, user_accounts.display_name),
                photo_url = COALESCE($4, user_accounts.photo_url),
                billing_customer_ref = COALESCE(user_accounts.billing_customer_ref, $5),
                plan = COALESCE($6, user_accounts.plan),
                subscription_status = COALESCE($7, user_accounts.subscription_status),
                subscription_ref = COALESCE($8, user_accounts.subscription_ref),
                subscription_price_ref = COALESCE($9, user_accounts.subscription_price_ref),
                current_period_end = COALESCE($10, user_accounts.current_period_end),
                updated_at = $11
            RETURNING {}
            "#,
            ACCOUNT_COLUMNS
        );

        let row: AccountRow = sqlx::query_as(&sql)
            .bind(user_id.as_str())
            .bind(patch.email.as_deref())
            .bind(patch.display_name.as_deref())
            .bind(patch.photo_url.as_deref())
            .bind(patch.billing_customer_ref.as_ref().map(CustomerRef::as_str))
            .bind(patch.plan.map(|p| p.as_str()))
            .bind(patch.subscription_status.map(|s| s.as_str()))
            .bind(patch.subscription_ref.as_ref().map(SubscriptionRef::as_str))
            .bind(patch.subscription_price_ref.as_ref().map(PriceRef::as_str))
            .bind(patch.current_period_end.map(|t| *t.as_datetime()))
            .bind(*Timestamp::now().as_datetime())
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("upsert account"))?;

        row.try_into()
    }

    async fn insert_if_absent(&self, account: &UserAccount) -> Result<UserAccount, DomainError> {
        sqlx::query(
            r#"
            INSERT INTO user_accounts (
                id, email, display_name, photo_url, role, billing_customer_ref,
                plan, subscription_status, subscription_ref, subscription_price_ref,
                current_period_end, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(account.id.as_str())
        .bind(account.email.as_deref())
        .bind(account.display_name.as_deref())
        .bind(account.photo_url.as_deref())
        .bind(account.role.as_str())
        .bind(account.billing_customer_ref.as_ref().map(CustomerRef::as_str))
        .bind(account.plan.as_str())
        .bind(account.subscription_status.as_str())
        .bind(account.subscription_ref.as_ref().map(SubscriptionRef::as_str))
        .bind(account.subscription_price_ref.as_ref().map(PriceRef::as_str))
        .bind(account.current_period_end.map(|t| *t.as_datetime()))
        .bind(*account.created_at.as_datetime())
        .bind(*account.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(db_error("insert account"))?;

        AccountRepository::find(self, &account.id)
            .await?
            .ok_or_else(|| DomainError::new(ErrorCode::DatabaseError, "Account vanished after insert"))
    }
}

#[async_trait]
impl SubscriptionRepository for PostgresAccountStore {
    async fn find(
        &self,
        subscription: &SubscriptionRef,
    ) -> Result<Option<SubscriptionRecord>, DomainError> {
        let row: Option<SubscriptionRow> = sqlx::query_as(&format!(
            "SELECT {} FROM subscription_records WHERE subscription_ref = $1",
            SUBSCRIPTION_COLUMNS
        ))
        .bind(subscription.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("find subscription"))?;

        row.map(SubscriptionRecord::try_from).transpose()
    }

    async fn upsert(
        &self,
        subscription: &SubscriptionRef,
        patch: &SubscriptionPatch,
    ) -> Result<SubscriptionRecord, DomainError> {
        // Without an owner the row can only be updated, never created.
        let sql = match patch.user_id {
            Some(_) => format!(
                r#"
                INSERT INTO subscription_records (
                    subscription_ref, user_id, customer_ref, status, plan,
                    price_ref, product_ref, current_period_end, created_at, updated_at
                ) VALUES (
                    $1, $2, $3, COALESCE($4, 'none'), COALESCE($5, 'free'),
                    $6, $7, $8, $9, $9
                )
                ON CONFLICT (subscription_ref) DO UPDATE SET
                    user_id = COALESCE($2, subscription_records.user_id),
                    customer_ref = COALESCE($3, subscription_records.customer_ref),
                    status = COALESCE($4, subscription_records.status),
                    plan = COALESCE($5, subscription_records.plan),
                    price_ref = COALESCE($6, subscription_records.price_ref),
                    product_ref = COALESCE($7, subscription_records.product_ref),
                    current_period_end = COALESCE($8, subscription_records.current_period_end),
                    updated_at = $9
                RETURNING {}
                "#,
                SUBSCRIPTION_COLUMNS
            ),
            None => format!(
                r#"
                UPDATE subscription_records SET
                    user_id = COALESCE($2, user_id),
                    customer_ref = COALESCE($3, customer_ref),
                    status = COALESCE($4, status),
                    plan = COALESCE($5, plan),
                    price_ref = COALESCE($6, price_ref),
                    product_ref = COALESCE($7, product_ref),
                    current_period_end = COALESCE($8, current_period_end),
                    updated_at = $9
                WHERE subscription_ref = $1
                RETURNING {}
                "#,
                SUBSCRIPTION_COLUMNS
            ),
        };

        let row: Option<SubscriptionRow> = sqlx::query_as(&sql)
            .bind(subscription.as_str())
            .bind(patch.user_id.as_ref().map(UserId::as_str))
            .bind(patch.customer_ref.as_ref().map(CustomerRef::as_str))
            .bind(patch.status.map(|s| s.as_str()))
            .bind(patch.plan.map(|p| p.as_str()))
            .bind(patch.price_ref.as_ref().map(PriceRef::as_str))
            .bind(patch.product_ref.as_ref().map(ProductRef::as_str))
            .bind(patch.current_period_end.map(|t| *t.as_datetime()))
            .bind(*Timestamp::now().as_datetime())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("upsert subscription"))?;

        match row {
            Some(row) => row.try_into(),
            None => Err(DomainError::validation(
                "user_id",
                "Cannot create a subscription record without its owner",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account_row() -> AccountRow {
        AccountRow {
            id: "uid-1".to_string(),
            email: Some("a@example.com".to_string()),
            display_name: None,
            photo_url: None,
            role: "customer".to_string(),
            billing_customer_ref: Some("cus_1".to_string()),
            plan: "pro".to_string(),
            subscription_status: "past_due".to_string(),
            subscription_ref: Some("sub_1".to_string()),
            subscription_price_ref: None,
            current_period_end: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn account_row_converts() {
        let account = UserAccount::try_from(account_row()).unwrap();

        assert_eq!(account.id.as_str(), "uid-1");
        assert_eq!(account.plan, Plan::Pro);
        assert_eq!(account.subscription_status, SubscriptionStatus::PastDue);
        assert_eq!(account.billing_customer_ref.unwrap().as_str(), "cus_1");
    }

    #[test]
    fn account_row_with_unknown_plan_is_database_error() {
        let mut row = account_row();
        row.plan = "enterprise".to_string();

        let err = UserAccount::try_from(row).unwrap_err();
        assert_eq!(err.code, ErrorCode::DatabaseError);
    }

    #[test]
    fn subscription_row_converts() {
        let row = SubscriptionRow {
            subscription_ref: "sub_1".to_string(),
            user_id: "uid-1".to_string(),
            customer_ref: None,
            status: "canceled".to_string(),
            plan: "basic".to_string(),
            price_ref: Some("price_b".to_string()),
            product_ref: Some("prod_b".to_string()),
            current_period_end: Some(Utc::now()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let record = SubscriptionRecord::try_from(row).unwrap();
        assert_eq!(record.status, SubscriptionStatus::Canceled);
        assert_eq!(record.plan, Plan::Basic);
        assert_eq!(record.product_ref.unwrap().as_str(), "prod_b");
    }
}
