use time::Date;

use crate::models::{
    write::{NewAccount, NewCategory, NewEntry},
    Account, AccountCategory, Entry, RecordId,
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("record not found: {0}")]
    NotFound(String),
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),
    #[error("no active transaction: {0}")]
    NoActiveTransaction(TransactionId),
    #[error("{0}")]
    Other(String),
}

pub type TransactionId = u64;

/// Contract of the embedded storage engine the ledger layer is built on:
/// three tables keyed by auto-increment id, with indexed filtering, counts,
/// and nestable transactions.
///
/// Implementations must enforce the table-level unique constraints
/// themselves: category names (compared trimmed), active account names
/// (compared case-insensitively), and the `(account_id, date)` pair for
/// entries, reporting violations as [`StorageError::UniqueViolation`].
/// Engine-side enforcement is what makes the ledger layer's
/// check-then-insert sequences safe: the check and the write run inside one
/// transaction, and the constraint backstops anything the check missed.
///
/// All list reads return rows in id (insertion) order. `update_*` of an id
/// that does not exist fails with [`StorageError::NotFound`]; ids are never
/// reassigned or reused.
///
/// Transactions nest with savepoint semantics and must resolve in LIFO
/// order: committing an inner transaction keeps its writes inside the outer
/// scope, rolling back restores the state captured at `begin`.
pub trait StorageBackend: Send + Sync {
    // Account categories
    fn add_category(&self, category: &NewCategory) -> Result<RecordId, StorageError>;
    fn get_category(&self, id: RecordId) -> Result<Option<AccountCategory>, StorageError>;
    fn update_category(&self, category: &AccountCategory) -> Result<(), StorageError>;
    fn categories(&self) -> Result<Vec<AccountCategory>, StorageError>;
    fn count_categories(&self) -> Result<u64, StorageError>;
    /// First category whose trimmed name equals the given trimmed name.
    fn find_category_by_name(&self, name: &str) -> Result<Option<AccountCategory>, StorageError>;

    // Accounts
    fn add_account(&self, account: &NewAccount) -> Result<RecordId, StorageError>;
    fn get_account(&self, id: RecordId) -> Result<Option<Account>, StorageError>;
    fn update_account(&self, account: &Account) -> Result<(), StorageError>;
    fn accounts(&self) -> Result<Vec<Account>, StorageError>;
    fn count_accounts(&self) -> Result<u64, StorageError>;
    /// First account whose name matches case-insensitively, active or not.
    fn find_account_by_name(&self, name: &str) -> Result<Option<Account>, StorageError>;
    fn accounts_in_category(&self, category_id: RecordId) -> Result<Vec<Account>, StorageError>;

    // Entries
    fn add_entry(&self, entry: &NewEntry) -> Result<RecordId, StorageError>;
    fn get_entry(&self, id: RecordId) -> Result<Option<Entry>, StorageError>;
    fn update_entry(&self, entry: &Entry) -> Result<(), StorageError>;
    fn delete_entry(&self, id: RecordId) -> Result<(), StorageError>;
    fn entries(&self) -> Result<Vec<Entry>, StorageError>;
    fn count_entries(&self) -> Result<u64, StorageError>;
    fn entries_for_account(&self, account_id: RecordId) -> Result<Vec<Entry>, StorageError>;
    fn entries_on_date(&self, date: Date) -> Result<Vec<Entry>, StorageError>;
    fn entry_by_account_and_date(
        &self,
        account_id: RecordId,
        date: Date,
    ) -> Result<Option<Entry>, StorageError>;
    /// Deletes every entry on the given date, returning how many went.
    fn delete_entries_on_date(&self, date: Date) -> Result<u64, StorageError>;
    fn clear_entries(&self) -> Result<(), StorageError>;

    // Transactions
    fn begin(&self) -> Result<TransactionId, StorageError>;
    fn commit(&self, tx: TransactionId) -> Result<(), StorageError>;
    fn rollback(&self, tx: TransactionId) -> Result<(), StorageError>;
}
