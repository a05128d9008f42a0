use std::sync::Arc;

use worthdb_core::{Account, AccountPatch, NewAccount, RecordId, StorageBackend};

use crate::error::LedgerError;
use crate::notifier::{ChangeNotifier, SubscriptionId};

use super::with_tx;

/// Owns the [`Account`] lifecycle. Account names are unique
/// case-insensitively among active accounts; adding a name that matches an
/// inactive account revives that row instead of inserting a new one, so
/// the account's history of entries stays attached to it.
pub struct AccountStore {
    storage: Arc<dyn StorageBackend>,
    notifier: ChangeNotifier<Account>,
}

impl AccountStore {
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self {
            storage,
            notifier: ChangeNotifier::new(),
        }
    }

    /// Adds an account, or reactivates the inactive account of the same
    /// name in place. Returns the id of the row that now carries the data.
    pub fn add(&self, account: NewAccount) -> Result<RecordId, LedgerError> {
        let id = with_tx(&self.storage, || {
            validate(&account.name, account.category_id)?;
            self.ensure_category_exists(account.category_id)?;

            if let Some(existing) = self.storage.find_account_by_name(&account.name)? {
                if existing.is_active {
                    return Err(LedgerError::Duplicate(format!(
                        "an active account named '{}' already exists",
                        account.name
                    )));
                }
                let revived = Account {
                    id: existing.id,
                    name: account.name.clone(),
                    category_id: account.category_id,
                    is_active: account.is_active,
                };
                self.storage.update_account(&revived)?;
                tracing::debug!(id = existing.id, "inactive account reactivated in place");
                return Ok(existing.id);
            }

            Ok(self.storage.add_account(&account)?)
        })?;
        tracing::debug!(id, name = %account.name, "account added");
        self.reload()?;
        Ok(id)
    }

    pub fn get(&self, id: RecordId) -> Result<Option<Account>, LedgerError> {
        Ok(self.storage.get_account(id)?)
    }

    pub fn get_all(&self) -> Result<Vec<Account>, LedgerError> {
        Ok(self.storage.accounts()?)
    }

    pub fn get_all_where(
        &self,
        predicate: impl Fn(&Account) -> bool,
    ) -> Result<Vec<Account>, LedgerError> {
        let mut accounts = self.storage.accounts()?;
        accounts.retain(|account| predicate(account));
        Ok(accounts)
    }

    pub fn get_active(&self) -> Result<Vec<Account>, LedgerError> {
        self.get_all_where(|account| account.is_active)
    }

    pub fn get_inactive(&self) -> Result<Vec<Account>, LedgerError> {
        self.get_all_where(|account| !account.is_active)
    }

    /// Merges the patch over the stored record and re-validates. Setting
    /// `is_active = true` requires the owning category to exist and be
    /// active (the soft-delete state machine's only conditional
    /// transition on the account side).
    pub fn update(&self, id: RecordId, patch: AccountPatch) -> Result<RecordId, LedgerError> {
        with_tx(&self.storage, || {
            let mut account = self
                .storage
                .get_account(id)?
                .ok_or_else(|| LedgerError::NotFound(format!("account {id} not found")))?;
            if let Some(name) = patch.name {
                account.name = name;
            }
            if let Some(category_id) = patch.category_id {
                account.category_id = category_id;
            }
            if let Some(is_active) = patch.is_active {
                account.is_active = is_active;
            }

            if patch.is_active == Some(true) {
                self.ensure_category_active(account.category_id)?;
            }

            validate(&account.name, account.category_id)?;
            self.ensure_category_exists(account.category_id)?;
            if account.is_active {
                self.ensure_active_name_free(&account.name, id)?;
            }

            self.storage.update_account(&account)?;
            Ok(())
        })?;
        tracing::debug!(id, "account updated");
        self.reload()?;
        Ok(id)
    }

    /// Soft-deletes the account. Always allowed: nothing downstream
    /// forbids an inactive account, and its entries remain readable.
    pub fn deactivate(&self, id: RecordId) -> Result<(), LedgerError> {
        with_tx(&self.storage, || {
            let mut account = self
                .storage
                .get_account(id)?
                .ok_or_else(|| LedgerError::NotFound(format!("account {id} not found")))?;
            account.is_active = false;
            self.storage.update_account(&account)?;
            Ok(())
        })?;
        tracing::debug!(id, "account deactivated");
        self.reload()
    }

    /// Reactivates a soft-deleted account. Rejected while the owning
    /// category is inactive.
    pub fn restore(&self, id: RecordId) -> Result<(), LedgerError> {
        self.update(
            id,
            AccountPatch {
                is_active: Some(true),
                ..AccountPatch::default()
            },
        )?;
        tracing::debug!(id, "account restored");
        Ok(())
    }

    /// Read-only predicate used by the category store's deactivation
    /// guard.
    pub fn has_active_accounts_in_category(
        &self,
        category_id: RecordId,
    ) -> Result<bool, LedgerError> {
        let accounts = self.storage.accounts_in_category(category_id)?;
        Ok(accounts.iter().any(|account| account.is_active))
    }

    pub fn subscribe(
        &self,
        subscriber: impl Fn(&[Account]) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.notifier.subscribe(subscriber)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.notifier.unsubscribe(id)
    }

    pub fn snapshot(&self) -> Arc<Vec<Account>> {
        self.notifier.latest()
    }

    fn ensure_category_exists(&self, category_id: RecordId) -> Result<(), LedgerError> {
        if self.storage.get_category(category_id)?.is_none() {
            return Err(LedgerError::ReferentialIntegrity(format!(
                "category {category_id} does not exist"
            )));
        }
        Ok(())
    }

    fn ensure_category_active(&self, category_id: RecordId) -> Result<(), LedgerError> {
        match self.storage.get_category(category_id)? {
            Some(category) if category.is_active => Ok(()),
            Some(category) => Err(LedgerError::ReferentialIntegrity(format!(
                "cannot activate account: category '{}' is not active",
                category.name
            ))),
            None => Err(LedgerError::ReferentialIntegrity(format!(
                "cannot activate account: category {category_id} does not exist"
            ))),
        }
    }

    fn ensure_active_name_free(&self, name: &str, own_id: RecordId) -> Result<(), LedgerError> {
        let clash = self.storage.accounts()?.into_iter().any(|account| {
            account.id != own_id
                && account.is_active
                && account.name.to_lowercase() == name.to_lowercase()
        });
        if clash {
            return Err(LedgerError::Duplicate(format!(
                "an active account named '{name}' already exists"
            )));
        }
        Ok(())
    }

    pub(crate) fn reload(&self) -> Result<(), LedgerError> {
        let accounts = self.storage.accounts()?;
        self.notifier.publish(accounts);
        Ok(())
    }
}

fn validate(name: &str, category_id: RecordId) -> Result<(), LedgerError> {
    if name.trim().is_empty() {
        return Err(LedgerError::Validation("account name cannot be empty".into()));
    }
    if category_id == 0 {
        return Err(LedgerError::Validation("category id is required".into()));
    }
    Ok(())
}
