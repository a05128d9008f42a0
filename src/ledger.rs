use std::sync::Arc;

use worthdb_core::StorageBackend;

use crate::error::LedgerError;
use crate::stores::{AccountStore, CategoryStore, EntryStore};

/// The three stores wired over one shared storage backend.
///
/// Constructed explicitly by the embedding application, which also owns
/// the backend's lifecycle; there is no module-level instance. Opening a
/// ledger primes each store's notifier with the current collection, so
/// the first subscriber of each store sees real data immediately.
pub struct Ledger {
    pub categories: CategoryStore,
    pub accounts: AccountStore,
    pub entries: EntryStore,
    storage: Arc<dyn StorageBackend>,
}

impl Ledger {
    pub fn new(storage: Arc<dyn StorageBackend>) -> Result<Self, LedgerError> {
        let ledger = Self {
            categories: CategoryStore::new(storage.clone()),
            accounts: AccountStore::new(storage.clone()),
            entries: EntryStore::new(storage.clone()),
            storage,
        };
        ledger.categories.reload()?;
        ledger.accounts.reload()?;
        ledger.entries.reload()?;
        Ok(ledger)
    }

    pub(crate) fn storage(&self) -> &Arc<dyn StorageBackend> {
        &self.storage
    }
}
