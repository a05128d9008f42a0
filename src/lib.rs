//! WorthDB: the ledger layer of a personal net-worth tracker.
//!
//! Account categories (typed asset or liability), accounts, and dated
//! balance entries live in three linked collections behind a pluggable
//! [`StorageBackend`]. The stores enforce referential integrity,
//! uniqueness, and soft-delete semantics; every successful mutation
//! republishes the store's full collection through its [`ChangeNotifier`].
//! Derived views (latest balances, date groups, net worth over time) are
//! pure functions in [`aggregate`], and [`import_export`] round-trips the
//! whole ledger through a single JSON envelope.
//!
//! ```
//! use std::sync::Arc;
//! use rust_decimal::Decimal;
//! use time::macros::date;
//! use worthdb::{CategoryKind, InMemoryStorage, Ledger, NewAccount, NewCategory, NewEntry};
//!
//! # fn main() -> Result<(), worthdb::LedgerError> {
//! let ledger = Ledger::new(Arc::new(InMemoryStorage::new()))?;
//! let cash = ledger.categories.add(NewCategory {
//!     name: "Cash".into(),
//!     kind: CategoryKind::Asset,
//!     ..NewCategory::default()
//! })?;
//! let checking = ledger.accounts.add(NewAccount {
//!     name: "Chase Checking".into(),
//!     category_id: cash,
//!     ..NewAccount::default()
//! })?;
//! ledger.entries.add(NewEntry {
//!     date: date!(2023 - 01 - 01),
//!     account_id: checking,
//!     balance: Decimal::from(1000),
//! })?;
//!
//! let summary = worthdb::aggregate::current_net_worth(
//!     &ledger.categories.get_all()?,
//!     &ledger.accounts.get_all()?,
//!     &ledger.entries.get_all()?,
//! );
//! assert_eq!(summary.unwrap().net_worth, Decimal::from(1000));
//! # Ok(())
//! # }
//! ```

pub mod aggregate;
pub mod config;
pub mod error;
pub mod import_export;
pub mod ledger;
pub mod notifier;
pub mod stores;

pub use config::{open_storage, Config, LoggingConfig, StorageConfig};
pub use error::LedgerError;
pub use import_export::{ExportEnvelope, ImportSummary};
pub use ledger::Ledger;
pub use notifier::{ChangeNotifier, SubscriptionId};
pub use stores::{AccountStore, CategoryStore, EntryStore};

// Re-export the storage contract and record types so consumers need only
// this crate plus a backend.
pub use worthdb_core::{
    Account, AccountCategory, AccountPatch, CategoryKind, CategoryPatch, Entry, EntryPatch,
    GroupedEntry, NewAccount, NewCategory, NewEntry, RecordId, StorageBackend, StorageError,
    TransactionId,
};
pub use worthdb_memory::InMemoryStorage;
pub use worthdb_sqlite::SqliteStorage;
