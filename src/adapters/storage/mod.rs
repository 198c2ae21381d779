//! Storage adapters that need no external infrastructure.
//!
//! `InMemoryAccountStore` backs both account ports when no database is
//! configured, and is the store every handler test runs against.

mod in_memory_account_store;

pub use in_memory_account_store::InMemoryAccountStore;
