use std::sync::Arc;

use rust_decimal::Decimal;
use time::Date;

use worthdb_core::{Entry, EntryPatch, GroupedEntry, NewEntry, RecordId, StorageBackend};

use crate::error::LedgerError;
use crate::notifier::{ChangeNotifier, SubscriptionId};

use super::with_tx;

/// Owns the [`Entry`] lifecycle: dated balance snapshots, at most one per
/// `(account, date)` pair. Balances are non-negative magnitudes; whether
/// an amount counts against net worth is decided by the account's category
/// kind, not by its sign.
pub struct EntryStore {
    storage: Arc<dyn StorageBackend>,
    notifier: ChangeNotifier<Entry>,
}

impl EntryStore {
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self {
            storage,
            notifier: ChangeNotifier::new(),
        }
    }

    /// Adds an entry and returns its engine-assigned id.
    pub fn add(&self, entry: NewEntry) -> Result<RecordId, LedgerError> {
        let id = with_tx(&self.storage, || {
            validate(entry.account_id, entry.balance)?;
            self.ensure_account_exists(entry.account_id)?;
            if self
                .storage
                .entry_by_account_and_date(entry.account_id, entry.date)?
                .is_some()
            {
                return Err(LedgerError::Duplicate(
                    "an entry for this date and account already exists".into(),
                ));
            }
            Ok(self.storage.add_entry(&entry)?)
        })?;
        tracing::debug!(id, account_id = entry.account_id, "entry added");
        self.reload()?;
        Ok(id)
    }

    pub fn get(&self, id: RecordId) -> Result<Option<Entry>, LedgerError> {
        Ok(self.storage.get_entry(id)?)
    }

    pub fn get_all(&self) -> Result<Vec<Entry>, LedgerError> {
        Ok(self.storage.entries()?)
    }

    pub fn get_all_where(
        &self,
        predicate: impl Fn(&Entry) -> bool,
    ) -> Result<Vec<Entry>, LedgerError> {
        let mut entries = self.storage.entries()?;
        entries.retain(|entry| predicate(entry));
        Ok(entries)
    }

    pub fn get_by_account_and_date(
        &self,
        account_id: RecordId,
        date: Date,
    ) -> Result<Option<Entry>, LedgerError> {
        Ok(self.storage.entry_by_account_and_date(account_id, date)?)
    }

    /// The balance recorded for the account on the given date, if any.
    pub fn get_account_balance(
        &self,
        account_id: RecordId,
        date: Date,
    ) -> Result<Option<Decimal>, LedgerError> {
        Ok(self
            .get_by_account_and_date(account_id, date)?
            .map(|entry| entry.balance))
    }

    /// The account's most recent entry: maximal date, ties broken by the
    /// latest-added row.
    pub fn get_most_recent_for_account(
        &self,
        account_id: RecordId,
    ) -> Result<Option<Entry>, LedgerError> {
        let entries = self.storage.entries_for_account(account_id)?;
        Ok(entries.into_iter().max_by_key(|entry| (entry.date, entry.id)))
    }

    /// Entries partitioned into one group per unique date, groups ordered
    /// by the first occurrence of each date.
    pub fn get_all_grouped(&self) -> Result<Vec<GroupedEntry>, LedgerError> {
        let entries = self.storage.entries()?;
        let mut groups: Vec<GroupedEntry> = Vec::new();
        for entry in entries {
            match groups.iter_mut().find(|group| group.date == entry.date) {
                Some(group) => group.entries.push(entry),
                None => groups.push(GroupedEntry {
                    date: entry.date,
                    entries: vec![entry],
                }),
            }
        }
        Ok(groups)
    }

    /// The group with the maximal date.
    pub fn get_most_recent_group(&self) -> Result<Option<GroupedEntry>, LedgerError> {
        let groups = self.get_all_grouped()?;
        Ok(groups.into_iter().max_by_key(|group| group.date))
    }

    /// Merges the patch and re-validates. A changed `(account, date)` pair
    /// must not collide with a different entry.
    pub fn update(&self, id: RecordId, patch: EntryPatch) -> Result<RecordId, LedgerError> {
        with_tx(&self.storage, || {
            let existing = self
                .storage
                .get_entry(id)?
                .ok_or_else(|| LedgerError::NotFound(format!("entry {id} not found")))?;

            let mut entry = existing.clone();
            if let Some(date) = patch.date {
                entry.date = date;
            }
            if let Some(account_id) = patch.account_id {
                entry.account_id = account_id;
            }
            if let Some(balance) = patch.balance {
                entry.balance = balance;
            }

            validate(entry.account_id, entry.balance)?;
            if entry.account_id != existing.account_id {
                self.ensure_account_exists(entry.account_id)?;
            }
            if (entry.account_id, entry.date) != (existing.account_id, existing.date) {
                if let Some(other) = self
                    .storage
                    .entry_by_account_and_date(entry.account_id, entry.date)?
                {
                    if other.id != id {
                        return Err(LedgerError::Duplicate(
                            "an entry for this date and account already exists".into(),
                        ));
                    }
                }
            }

            self.storage.update_entry(&entry)?;
            Ok(())
        })?;
        tracing::debug!(id, "entry updated");
        self.reload()?;
        Ok(id)
    }

    pub fn remove(&self, id: RecordId) -> Result<(), LedgerError> {
        with_tx(&self.storage, || {
            if self.storage.get_entry(id)?.is_none() {
                return Err(LedgerError::NotFound("entry not found".into()));
            }
            self.storage.delete_entry(id)?;
            Ok(())
        })?;
        tracing::debug!(id, "entry removed");
        self.reload()
    }

    /// Bulk-deletes every entry on the given date; a single snapshot is
    /// republished afterwards.
    pub fn remove_all_on_date(&self, date: Date) -> Result<u64, LedgerError> {
        let removed = with_tx(&self.storage, || {
            let existing = self.storage.entries_on_date(date)?;
            if existing.is_empty() {
                return Err(LedgerError::NotFound(
                    "no entries found for the specified date".into(),
                ));
            }
            Ok(self.storage.delete_entries_on_date(date)?)
        })?;
        tracing::debug!(%date, removed, "entries removed for date");
        self.reload()?;
        Ok(removed)
    }

    /// Deletes every entry in the ledger; a single snapshot is republished
    /// afterwards.
    pub fn remove_all(&self) -> Result<(), LedgerError> {
        with_tx(&self.storage, || Ok(self.storage.clear_entries()?))?;
        tracing::debug!("all entries removed");
        self.reload()
    }

    pub fn subscribe(
        &self,
        subscriber: impl Fn(&[Entry]) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.notifier.subscribe(subscriber)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.notifier.unsubscribe(id)
    }

    pub fn snapshot(&self) -> Arc<Vec<Entry>> {
        self.notifier.latest()
    }

    fn ensure_account_exists(&self, account_id: RecordId) -> Result<(), LedgerError> {
        if self.storage.get_account(account_id)?.is_none() {
            return Err(LedgerError::ReferentialIntegrity(format!(
                "account {account_id} does not exist"
            )));
        }
        Ok(())
    }

    pub(crate) fn reload(&self) -> Result<(), LedgerError> {
        let entries = self.storage.entries()?;
        self.notifier.publish(entries);
        Ok(())
    }
}

fn validate(account_id: RecordId, balance: Decimal) -> Result<(), LedgerError> {
    if account_id == 0 {
        return Err(LedgerError::Validation("account id is required".into()));
    }
    if balance < Decimal::ZERO {
        return Err(LedgerError::Validation("balance cannot be negative".into()));
    }
    Ok(())
}
