//! The three entity stores. Each one owns its validation rules, issues its
//! writes through the shared [`StorageBackend`](worthdb_core::StorageBackend)
//! inside a transaction, and republishes its full collection through a
//! [`ChangeNotifier`](crate::notifier::ChangeNotifier) after every
//! successful mutation.

mod account;
mod category;
mod entry;

pub use account::AccountStore;
pub use category::CategoryStore;
pub use entry::EntryStore;

use std::sync::Arc;

use worthdb_core::StorageBackend;

use crate::error::LedgerError;

/// Runs `op` inside one storage transaction so validation reads and the
/// subsequent write cannot interleave with another mutation.
pub(crate) fn with_tx<T>(
    storage: &Arc<dyn StorageBackend>,
    op: impl FnOnce() -> Result<T, LedgerError>,
) -> Result<T, LedgerError> {
    let tx = storage.begin()?;
    match op() {
        Ok(value) => {
            storage.commit(tx)?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = storage.rollback(tx) {
                tracing::error!(error = %rollback_err, "transaction rollback failed");
            }
            Err(err)
        }
    }
}
