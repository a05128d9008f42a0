use thiserror::Error;

use worthdb_core::StorageError;

/// Errors surfaced by the ledger layer. All of these are caller-correctable
/// conditions; none are retried internally.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// A required field is missing/empty or fails a range check.
    #[error("validation error: {0}")]
    Validation(String),
    /// A duplicate name or duplicate `(account, date)` entry would result.
    #[error("duplicate: {0}")]
    Duplicate(String),
    /// The operation would create or retain a dangling or forbidden
    /// relationship.
    #[error("referential integrity: {0}")]
    ReferentialIntegrity(String),
    /// The targeted id does not exist in the relevant collection.
    #[error("not found: {0}")]
    NotFound(String),
    /// Import attempted into a ledger that already contains data.
    #[error("import error: {0}")]
    ImportState(String),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("storage error: {0}")]
    Storage(StorageError),
}

impl From<StorageError> for LedgerError {
    fn from(err: StorageError) -> Self {
        // Engine-enforced constraints surface through the same error kinds
        // as the stores' own checks, so callers see one vocabulary.
        match err {
            StorageError::UniqueViolation(msg) => LedgerError::Duplicate(msg),
            StorageError::NotFound(msg) => LedgerError::NotFound(msg),
            other => LedgerError::Storage(other),
        }
    }
}
