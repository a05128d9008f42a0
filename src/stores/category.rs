use std::sync::Arc;

use worthdb_core::{AccountCategory, CategoryPatch, NewCategory, RecordId, StorageBackend};

use crate::error::LedgerError;
use crate::notifier::{ChangeNotifier, SubscriptionId};

use super::with_tx;

/// Owns the [`AccountCategory`] lifecycle. Categories are soft-deleted
/// only: deactivation is guarded by "no active dependent accounts",
/// reactivation is unconditional on the category side.
pub struct CategoryStore {
    storage: Arc<dyn StorageBackend>,
    notifier: ChangeNotifier<AccountCategory>,
}

impl CategoryStore {
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self {
            storage,
            notifier: ChangeNotifier::new(),
        }
    }

    /// Adds a category and returns its engine-assigned id.
    pub fn add(&self, category: NewCategory) -> Result<RecordId, LedgerError> {
        let id = with_tx(&self.storage, || {
            validate_name(&category.name)?;
            self.ensure_name_free(&category.name, None)?;
            Ok(self.storage.add_category(&category)?)
        })?;
        tracing::debug!(id, name = %category.name, "account category added");
        self.reload()?;
        Ok(id)
    }

    pub fn get(&self, id: RecordId) -> Result<Option<AccountCategory>, LedgerError> {
        Ok(self.storage.get_category(id)?)
    }

    pub fn get_all(&self) -> Result<Vec<AccountCategory>, LedgerError> {
        Ok(self.storage.categories()?)
    }

    pub fn get_all_where(
        &self,
        predicate: impl Fn(&AccountCategory) -> bool,
    ) -> Result<Vec<AccountCategory>, LedgerError> {
        let mut categories = self.storage.categories()?;
        categories.retain(|category| predicate(category));
        Ok(categories)
    }

    /// Merges the patch over the stored record and re-runs the same
    /// validation as [`add`](Self::add), with the uniqueness check
    /// excluding the record itself.
    pub fn update(&self, id: RecordId, patch: CategoryPatch) -> Result<RecordId, LedgerError> {
        with_tx(&self.storage, || {
            let mut category = self.storage.get_category(id)?.ok_or_else(|| {
                LedgerError::NotFound(format!("account category {id} does not exist"))
            })?;
            if let Some(name) = patch.name {
                category.name = name;
            }
            if let Some(description) = patch.description {
                category.description = description;
            }
            if let Some(is_active) = patch.is_active {
                category.is_active = is_active;
            }

            validate_name(&category.name)?;
            self.ensure_name_free(&category.name, Some(id))?;
            self.storage.update_category(&category)?;
            Ok(())
        })?;
        tracing::debug!(id, "account category updated");
        self.reload()?;
        Ok(id)
    }

    /// Soft-deletes the category. Fails while any active account still
    /// references it.
    pub fn deactivate(&self, id: RecordId) -> Result<(), LedgerError> {
        with_tx(&self.storage, || {
            let dependents = self.storage.accounts_in_category(id)?;
            if dependents.iter().any(|account| account.is_active) {
                return Err(LedgerError::ReferentialIntegrity(
                    "cannot remove a category that has active accounts".into(),
                ));
            }
            let mut category = self.storage.get_category(id)?.ok_or_else(|| {
                LedgerError::NotFound(format!("account category {id} does not exist"))
            })?;
            category.is_active = false;
            self.storage.update_category(&category)?;
            Ok(())
        })?;
        tracing::debug!(id, "account category deactivated");
        self.reload()
    }

    /// Flips the active flag. Reactivation carries no category-side
    /// precondition (the guard for activating accounts lives on the
    /// account side); deactivation goes through the guarded path.
    pub fn set_active_status(&self, id: RecordId, is_active: bool) -> Result<(), LedgerError> {
        if is_active {
            self.update(
                id,
                CategoryPatch {
                    is_active: Some(true),
                    ..CategoryPatch::default()
                },
            )?;
            Ok(())
        } else {
            self.deactivate(id)
        }
    }

    pub fn subscribe(
        &self,
        subscriber: impl Fn(&[AccountCategory]) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.notifier.subscribe(subscriber)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.notifier.unsubscribe(id)
    }

    /// The snapshot most recently delivered to subscribers.
    pub fn snapshot(&self) -> Arc<Vec<AccountCategory>> {
        self.notifier.latest()
    }

    fn ensure_name_free(&self, name: &str, own_id: Option<RecordId>) -> Result<(), LedgerError> {
        if let Some(existing) = self.storage.find_category_by_name(name)? {
            if Some(existing.id) != own_id {
                return Err(LedgerError::Duplicate(format!(
                    "an account category named '{}' already exists",
                    name.trim()
                )));
            }
        }
        Ok(())
    }

    /// Re-reads the collection and republishes it.
    pub(crate) fn reload(&self) -> Result<(), LedgerError> {
        let categories = self.storage.categories()?;
        self.notifier.publish(categories);
        Ok(())
    }
}

fn validate_name(name: &str) -> Result<(), LedgerError> {
    if name.trim().is_empty() {
        return Err(LedgerError::Validation(
            "account category name cannot be empty".into(),
        ));
    }
    Ok(())
}
