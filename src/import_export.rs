//! JSON import/export of the whole ledger.
//!
//! The envelope is a single JSON object with three array-valued keys
//! (`entries`, `accounts`, `accountCategories`), camelCase field
//! names, `MM/DD/YYYY` dates, numeric balances, and ids included, so
//! previously exported files import unchanged.
//!
//! Import only targets an empty ledger and replays every record through
//! the stores' normal `add` paths, categories → accounts → entries, so
//! each record passes full validation and FK targets exist before their
//! dependents. The engine assigns fresh ids during the replay; exported
//! ids are remapped so cross-references survive renumbering. The whole
//! replay runs inside one storage transaction: a failure rolls everything
//! back and the ledger stays empty.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use worthdb_core::{
    Account, AccountCategory, Entry, NewAccount, NewCategory, NewEntry, RecordId,
};

use crate::error::LedgerError;
use crate::ledger::Ledger;

/// The export file: exactly three array-valued keys.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportEnvelope {
    pub entries: Vec<Entry>,
    pub accounts: Vec<Account>,
    pub account_categories: Vec<AccountCategory>,
}

/// How many records an import inserted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportSummary {
    pub categories: usize,
    pub accounts: usize,
    pub entries: usize,
}

/// Snapshots all three collections. Read-only.
pub fn export_data(ledger: &Ledger) -> Result<ExportEnvelope, LedgerError> {
    Ok(ExportEnvelope {
        entries: ledger.entries.get_all()?,
        accounts: ledger.accounts.get_all()?,
        account_categories: ledger.categories.get_all()?,
    })
}

/// Serializes the ledger to the downloadable JSON artifact.
pub fn export_json(ledger: &Ledger) -> Result<String, LedgerError> {
    let envelope = export_data(ledger)?;
    Ok(serde_json::to_string_pretty(&envelope)?)
}

/// Parses and imports a JSON export. Structural problems in the payload
/// surface as validation errors before anything is written.
pub fn import_json(ledger: &Ledger, json: &str) -> Result<ImportSummary, LedgerError> {
    let envelope: ExportEnvelope = serde_json::from_str(json)
        .map_err(|err| LedgerError::Validation(format!("invalid import payload: {err}")))?;
    import_data(ledger, envelope)
}

/// Imports an envelope into an empty ledger, all-or-nothing.
pub fn import_data(ledger: &Ledger, data: ExportEnvelope) -> Result<ImportSummary, LedgerError> {
    let storage = ledger.storage();
    if storage.count_categories()? > 0
        || storage.count_accounts()? > 0
        || storage.count_entries()? > 0
    {
        return Err(LedgerError::ImportState("data already exists".into()));
    }

    let tx = storage.begin()?;
    match replay(ledger, &data) {
        Ok(summary) => {
            storage.commit(tx)?;
            tracing::info!(
                categories = summary.categories,
                accounts = summary.accounts,
                entries = summary.entries,
                "import complete"
            );
            Ok(summary)
        }
        Err(err) => {
            if let Err(rollback_err) = storage.rollback(tx) {
                tracing::error!(error = %rollback_err, "import rollback failed");
            }
            // Stores republished mid-replay; bring subscribers back in
            // line with the rolled-back (empty) state.
            ledger.categories.reload()?;
            ledger.accounts.reload()?;
            ledger.entries.reload()?;
            Err(err)
        }
    }
}

fn replay(ledger: &Ledger, data: &ExportEnvelope) -> Result<ImportSummary, LedgerError> {
    let mut category_ids: HashMap<RecordId, RecordId> = HashMap::new();
    for category in &data.account_categories {
        let id = ledger.categories.add(NewCategory {
            name: category.name.clone(),
            kind: category.kind,
            description: category.description.clone(),
            is_active: category.is_active,
        })?;
        category_ids.insert(category.id, id);
    }

    let mut account_ids: HashMap<RecordId, RecordId> = HashMap::new();
    for account in &data.accounts {
        let category_id = category_ids.get(&account.category_id).copied().ok_or_else(|| {
            LedgerError::Validation(format!(
                "account '{}' references unknown category {}",
                account.name, account.category_id
            ))
        })?;
        let id = ledger.accounts.add(NewAccount {
            name: account.name.clone(),
            category_id,
            is_active: account.is_active,
        })?;
        account_ids.insert(account.id, id);
    }

    let mut entries = 0;
    for entry in &data.entries {
        let account_id = account_ids.get(&entry.account_id).copied().ok_or_else(|| {
            LedgerError::Validation(format!(
                "entry {} references unknown account {}",
                entry.id, entry.account_id
            ))
        })?;
        ledger.entries.add(NewEntry {
            date: entry.date,
            account_id,
            balance: entry.balance,
        })?;
        entries += 1;
    }

    Ok(ImportSummary {
        categories: category_ids.len(),
        accounts: account_ids.len(),
        entries,
    })
}
