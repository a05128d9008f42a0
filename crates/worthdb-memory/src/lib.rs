//! In-memory storage backend for WorthDB.
//!
//! Transactions are snapshot-based: `begin` clones the full table state,
//! `rollback` restores it. Cloning whole tables is cheap at the scale of a
//! personal ledger and keeps the backend trivially correct.

use std::{
    collections::{BTreeMap, HashMap},
    sync::{
        atomic::{AtomicU64, Ordering},
        RwLock,
    },
};

use time::Date;

use worthdb_core::{
    Account, AccountCategory, Entry, NewAccount, NewCategory, NewEntry, RecordId, StorageBackend,
    StorageError, TransactionId,
};

#[derive(Debug, Clone)]
struct Tables {
    categories: BTreeMap<RecordId, AccountCategory>,
    accounts: BTreeMap<RecordId, Account>,
    entries: BTreeMap<RecordId, Entry>,
    next_category_id: RecordId,
    next_account_id: RecordId,
    next_entry_id: RecordId,
}

impl Tables {
    fn new() -> Self {
        Self {
            categories: BTreeMap::new(),
            accounts: BTreeMap::new(),
            entries: BTreeMap::new(),
            next_category_id: 1,
            next_account_id: 1,
            next_entry_id: 1,
        }
    }
}

pub struct InMemoryStorage {
    tables: RwLock<Tables>,
    tx_counter: AtomicU64,
    snapshots: RwLock<HashMap<TransactionId, Tables>>,
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::new()),
            tx_counter: AtomicU64::new(1),
            snapshots: RwLock::new(HashMap::new()),
        }
    }
}

fn same_name(a: &str, b: &str) -> bool {
    a.trim() == b.trim()
}

fn same_name_ci(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

impl StorageBackend for InMemoryStorage {
    fn add_category(&self, category: &NewCategory) -> Result<RecordId, StorageError> {
        let mut tables = self.tables.write().unwrap();
        if tables
            .categories
            .values()
            .any(|c| same_name(&c.name, &category.name))
        {
            return Err(StorageError::UniqueViolation(format!(
                "account category name '{}'",
                category.name
            )));
        }
        let id = tables.next_category_id;
        tables.next_category_id += 1;
        tables.categories.insert(
            id,
            AccountCategory {
                id,
                name: category.name.clone(),
                kind: category.kind,
                description: category.description.clone(),
                is_active: category.is_active,
            },
        );
        Ok(id)
    }

    fn get_category(&self, id: RecordId) -> Result<Option<AccountCategory>, StorageError> {
        Ok(self.tables.read().unwrap().categories.get(&id).cloned())
    }

    fn update_category(&self, category: &AccountCategory) -> Result<(), StorageError> {
        let mut tables = self.tables.write().unwrap();
        if !tables.categories.contains_key(&category.id) {
            return Err(StorageError::NotFound(format!(
                "account category {}",
                category.id
            )));
        }
        if tables
            .categories
            .values()
            .any(|c| c.id != category.id && same_name(&c.name, &category.name))
        {
            return Err(StorageError::UniqueViolation(format!(
                "account category name '{}'",
                category.name
            )));
        }
        tables.categories.insert(category.id, category.clone());
        Ok(())
    }

    fn categories(&self) -> Result<Vec<AccountCategory>, StorageError> {
        Ok(self.tables.read().unwrap().categories.values().cloned().collect())
    }

    fn count_categories(&self) -> Result<u64, StorageError> {
        Ok(self.tables.read().unwrap().categories.len() as u64)
    }

    fn find_category_by_name(&self, name: &str) -> Result<Option<AccountCategory>, StorageError> {
        Ok(self
            .tables
            .read()
            .unwrap()
            .categories
            .values()
            .find(|c| same_name(&c.name, name))
            .cloned())
    }

    fn add_account(&self, account: &NewAccount) -> Result<RecordId, StorageError> {
        let mut tables = self.tables.write().unwrap();
        if account.is_active
            && tables
                .accounts
                .values()
                .any(|a| a.is_active && same_name_ci(&a.name, &account.name))
        {
            return Err(StorageError::UniqueViolation(format!(
                "active account name '{}'",
                account.name
            )));
        }
        let id = tables.next_account_id;
        tables.next_account_id += 1;
        tables.accounts.insert(
            id,
            Account {
                id,
                name: account.name.clone(),
                category_id: account.category_id,
                is_active: account.is_active,
            },
        );
        Ok(id)
    }

    fn get_account(&self, id: RecordId) -> Result<Option<Account>, StorageError> {
        Ok(self.tables.read().unwrap().accounts.get(&id).cloned())
    }

    fn update_account(&self, account: &Account) -> Result<(), StorageError> {
        let mut tables = self.tables.write().unwrap();
        if !tables.accounts.contains_key(&account.id) {
            return Err(StorageError::NotFound(format!("account {}", account.id)));
        }
        if account.is_active
            && tables
                .accounts
                .values()
                .any(|a| a.id != account.id && a.is_active && same_name_ci(&a.name, &account.name))
        {
            return Err(StorageError::UniqueViolation(format!(
                "active account name '{}'",
                account.name
            )));
        }
        tables.accounts.insert(account.id, account.clone());
        Ok(())
    }

    fn accounts(&self) -> Result<Vec<Account>, StorageError> {
        Ok(self.tables.read().unwrap().accounts.values().cloned().collect())
    }

    fn count_accounts(&self) -> Result<u64, StorageError> {
        Ok(self.tables.read().unwrap().accounts.len() as u64)
    }

    fn find_account_by_name(&self, name: &str) -> Result<Option<Account>, StorageError> {
        Ok(self
            .tables
            .read()
            .unwrap()
            .accounts
            .values()
            .find(|a| same_name_ci(&a.name, name))
            .cloned())
    }

    fn accounts_in_category(&self, category_id: RecordId) -> Result<Vec<Account>, StorageError> {
        Ok(self
            .tables
            .read()
            .unwrap()
            .accounts
            .values()
            .filter(|a| a.category_id == category_id)
            .cloned()
            .collect())
    }

    fn add_entry(&self, entry: &NewEntry) -> Result<RecordId, StorageError> {
        let mut tables = self.tables.write().unwrap();
        if tables
            .entries
            .values()
            .any(|e| e.account_id == entry.account_id && e.date == entry.date)
        {
            return Err(StorageError::UniqueViolation(format!(
                "entry for account {} on {}",
                entry.account_id, entry.date
            )));
        }
        let id = tables.next_entry_id;
        tables.next_entry_id += 1;
        tables.entries.insert(
            id,
            Entry {
                id,
                date: entry.date,
                account_id: entry.account_id,
                balance: entry.balance,
            },
        );
        Ok(id)
    }

    fn get_entry(&self, id: RecordId) -> Result<Option<Entry>, StorageError> {
        Ok(self.tables.read().unwrap().entries.get(&id).cloned())
    }

    fn update_entry(&self, entry: &Entry) -> Result<(), StorageError> {
        let mut tables = self.tables.write().unwrap();
        if !tables.entries.contains_key(&entry.id) {
            return Err(StorageError::NotFound(format!("entry {}", entry.id)));
        }
        if tables
            .entries
            .values()
            .any(|e| e.id != entry.id && e.account_id == entry.account_id && e.date == entry.date)
        {
            return Err(StorageError::UniqueViolation(format!(
                "entry for account {} on {}",
                entry.account_id, entry.date
            )));
        }
        tables.entries.insert(entry.id, entry.clone());
        Ok(())
    }

    fn delete_entry(&self, id: RecordId) -> Result<(), StorageError> {
        let mut tables = self.tables.write().unwrap();
        tables
            .entries
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound(format!("entry {id}")))
    }

    fn entries(&self) -> Result<Vec<Entry>, StorageError> {
        Ok(self.tables.read().unwrap().entries.values().cloned().collect())
    }

    fn count_entries(&self) -> Result<u64, StorageError> {
        Ok(self.tables.read().unwrap().entries.len() as u64)
    }

    fn entries_for_account(&self, account_id: RecordId) -> Result<Vec<Entry>, StorageError> {
        Ok(self
            .tables
            .read()
            .unwrap()
            .entries
            .values()
            .filter(|e| e.account_id == account_id)
            .cloned()
            .collect())
    }

    fn entries_on_date(&self, date: Date) -> Result<Vec<Entry>, StorageError> {
        Ok(self
            .tables
            .read()
            .unwrap()
            .entries
            .values()
            .filter(|e| e.date == date)
            .cloned()
            .collect())
    }

    fn entry_by_account_and_date(
        &self,
        account_id: RecordId,
        date: Date,
    ) -> Result<Option<Entry>, StorageError> {
        Ok(self
            .tables
            .read()
            .unwrap()
            .entries
            .values()
            .find(|e| e.account_id == account_id && e.date == date)
            .cloned())
    }

    fn delete_entries_on_date(&self, date: Date) -> Result<u64, StorageError> {
        let mut tables = self.tables.write().unwrap();
        let doomed: Vec<RecordId> = tables
            .entries
            .values()
            .filter(|e| e.date == date)
            .map(|e| e.id)
            .collect();
        for id in &doomed {
            tables.entries.remove(id);
        }
        Ok(doomed.len() as u64)
    }

    fn clear_entries(&self) -> Result<(), StorageError> {
        self.tables.write().unwrap().entries.clear();
        Ok(())
    }

    fn begin(&self) -> Result<TransactionId, StorageError> {
        let tx = self.tx_counter.fetch_add(1, Ordering::SeqCst);
        let snapshot = self.tables.read().unwrap().clone();
        self.snapshots.write().unwrap().insert(tx, snapshot);
        tracing::trace!(tx, "transaction started");
        Ok(tx)
    }

    fn commit(&self, tx: TransactionId) -> Result<(), StorageError> {
        self.snapshots
            .write()
            .unwrap()
            .remove(&tx)
            .map(|_| ())
            .ok_or(StorageError::NoActiveTransaction(tx))
    }

    fn rollback(&self, tx: TransactionId) -> Result<(), StorageError> {
        let snapshot = self
            .snapshots
            .write()
            .unwrap()
            .remove(&tx)
            .ok_or(StorageError::NoActiveTransaction(tx))?;
        *self.tables.write().unwrap() = snapshot;
        tracing::debug!(tx, "transaction rolled back");
        Ok(())
    }
}
