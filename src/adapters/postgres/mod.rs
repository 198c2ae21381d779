//! PostgreSQL adapters - Database implementations for repository ports.
//!
//! - `PostgresAccountStore` - accounts and the subscription index
//!
//! Schema lives in `migrations/` and is applied at startup with
//! [`run_migrations`].

mod account_store;

pub use account_store::PostgresAccountStore;

use sqlx::PgPool;

use crate::domain::foundation::{DomainError, ErrorCode};

/// Apply pending migrations.
pub async fn run_migrations(pool: &PgPool) -> Result<(), DomainError> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| DomainError::new(ErrorCode::DatabaseError, format!("Migration failed: {}", e)))
}
