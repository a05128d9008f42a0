//! SQLite storage backend for WorthDB.
//!
//! Dates are stored as ISO `YYYY-MM-DD` text and balances as decimal text,
//! so rows stay human-readable in any sqlite shell. The unique constraints
//! the ledger layer relies on are declared in the schema itself: category
//! names, active account names (partial index over `lower(name)`), and the
//! `(account_id, date)` pair for entries.

use std::{
    str::FromStr,
    sync::{
        atomic::{AtomicU64, Ordering},
        Mutex,
    },
};

use rusqlite::{params, Connection, OptionalExtension};
use rust_decimal::Decimal;
use time::{format_description::FormatItem, macros::format_description, Date};

use worthdb_core::{
    Account, AccountCategory, CategoryKind, Entry, NewAccount, NewCategory, NewEntry, RecordId,
    StorageBackend, StorageError, TransactionId,
};

const DATE_FORMAT: &[FormatItem<'_>] = format_description!("[year]-[month]-[day]");

pub struct SqliteStorage {
    conn: Mutex<Connection>,
    tx_counter: AtomicU64,
}

impl SqliteStorage {
    pub fn new(path: &str) -> Result<Self, StorageError> {
        let conn = if path == ":memory:" {
            Connection::open_in_memory()
        } else {
            Connection::open(path)
        }
        .map_err(map_err)?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .map_err(map_err)?;

        let storage = Self {
            conn: Mutex::new(conn),
            tx_counter: AtomicU64::new(1),
        };
        storage.init_schema()?;
        Ok(storage)
    }

    fn init_schema(&self) -> Result<(), StorageError> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS account_categories (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                kind TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                is_active INTEGER NOT NULL DEFAULT 1
            );

            CREATE UNIQUE INDEX IF NOT EXISTS idx_category_name
                ON account_categories(trim(name));

            CREATE TABLE IF NOT EXISTS accounts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                category_id INTEGER NOT NULL REFERENCES account_categories(id),
                is_active INTEGER NOT NULL DEFAULT 1
            );

            CREATE UNIQUE INDEX IF NOT EXISTS idx_active_account_name
                ON accounts(lower(name)) WHERE is_active = 1;

            CREATE TABLE IF NOT EXISTS entries (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                date TEXT NOT NULL,
                account_id INTEGER NOT NULL REFERENCES accounts(id),
                balance TEXT NOT NULL,
                UNIQUE (account_id, date)
            );

            CREATE INDEX IF NOT EXISTS idx_entries_date ON entries(date);
            ",
        )
        .map_err(map_err)
    }
}

fn map_err(err: rusqlite::Error) -> StorageError {
    match &err {
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY =>
        {
            StorageError::UniqueViolation(err.to_string())
        }
        _ => StorageError::Other(err.to_string()),
    }
}

fn fmt_date(date: Date) -> Result<String, StorageError> {
    date.format(&DATE_FORMAT)
        .map_err(|e| StorageError::Other(e.to_string()))
}

fn parse_date(text: &str) -> Result<Date, StorageError> {
    Date::parse(text, &DATE_FORMAT).map_err(|e| StorageError::Other(e.to_string()))
}

fn parse_balance(text: &str) -> Result<Decimal, StorageError> {
    Decimal::from_str(text).map_err(|e| StorageError::Other(e.to_string()))
}

fn kind_to_str(kind: CategoryKind) -> &'static str {
    match kind {
        CategoryKind::Asset => "Asset",
        CategoryKind::Liability => "Liability",
    }
}

fn kind_from_str(text: &str) -> Result<CategoryKind, StorageError> {
    match text {
        "Asset" => Ok(CategoryKind::Asset),
        "Liability" => Ok(CategoryKind::Liability),
        other => Err(StorageError::Other(format!("unknown category kind: {other}"))),
    }
}

fn row_to_category(row: &rusqlite::Row<'_>) -> rusqlite::Result<(RecordId, String, String, String, bool)> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
    ))
}

fn category_from_parts(
    parts: (RecordId, String, String, String, bool),
) -> Result<AccountCategory, StorageError> {
    Ok(AccountCategory {
        id: parts.0,
        name: parts.1,
        kind: kind_from_str(&parts.2)?,
        description: parts.3,
        is_active: parts.4,
    })
}

fn row_to_account(row: &rusqlite::Row<'_>) -> rusqlite::Result<Account> {
    Ok(Account {
        id: row.get(0)?,
        name: row.get(1)?,
        category_id: row.get(2)?,
        is_active: row.get(3)?,
    })
}

fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<(RecordId, String, RecordId, String)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn entry_from_parts(parts: (RecordId, String, RecordId, String)) -> Result<Entry, StorageError> {
    Ok(Entry {
        id: parts.0,
        date: parse_date(&parts.1)?,
        account_id: parts.2,
        balance: parse_balance(&parts.3)?,
    })
}

impl StorageBackend for SqliteStorage {
    fn add_category(&self, category: &NewCategory) -> Result<RecordId, StorageError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO account_categories (name, kind, description, is_active)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                category.name,
                kind_to_str(category.kind),
                category.description,
                category.is_active
            ],
        )
        .map_err(map_err)?;
        Ok(conn.last_insert_rowid() as RecordId)
    }

    fn get_category(&self, id: RecordId) -> Result<Option<AccountCategory>, StorageError> {
        let conn = self.conn.lock().unwrap();
        let parts = conn
            .query_row(
                "SELECT id, name, kind, description, is_active
                 FROM account_categories WHERE id = ?1",
                params![id],
                row_to_category,
            )
            .optional()
            .map_err(map_err)?;
        parts.map(category_from_parts).transpose()
    }

    fn update_category(&self, category: &AccountCategory) -> Result<(), StorageError> {
        let conn = self.conn.lock().unwrap();
        let changed = conn
            .execute(
                "UPDATE account_categories
                 SET name = ?2, kind = ?3, description = ?4, is_active = ?5
                 WHERE id = ?1",
                params![
                    category.id,
                    category.name,
                    kind_to_str(category.kind),
                    category.description,
                    category.is_active
                ],
            )
            .map_err(map_err)?;
        if changed == 0 {
            return Err(StorageError::NotFound(format!(
                "account category {}",
                category.id
            )));
        }
        Ok(())
    }

    fn categories(&self) -> Result<Vec<AccountCategory>, StorageError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT id, name, kind, description, is_active
                 FROM account_categories ORDER BY id",
            )
            .map_err(map_err)?;
        let rows = stmt
            .query_map([], row_to_category)
            .map_err(map_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(map_err)?;
        rows.into_iter().map(category_from_parts).collect()
    }

    fn count_categories(&self) -> Result<u64, StorageError> {
        let conn = self.conn.lock().unwrap();
        conn.query_row("SELECT COUNT(*) FROM account_categories", [], |row| {
            row.get(0)
        })
        .map_err(map_err)
    }

    fn find_category_by_name(&self, name: &str) -> Result<Option<AccountCategory>, StorageError> {
        let conn = self.conn.lock().unwrap();
        let parts = conn
            .query_row(
                "SELECT id, name, kind, description, is_active
                 FROM account_categories WHERE trim(name) = trim(?1)
                 ORDER BY id LIMIT 1",
                params![name],
                row_to_category,
            )
            .optional()
            .map_err(map_err)?;
        parts.map(category_from_parts).transpose()
    }

    fn add_account(&self, account: &NewAccount) -> Result<RecordId, StorageError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO accounts (name, category_id, is_active) VALUES (?1, ?2, ?3)",
            params![account.name, account.category_id, account.is_active],
        )
        .map_err(map_err)?;
        Ok(conn.last_insert_rowid() as RecordId)
    }

    fn get_account(&self, id: RecordId) -> Result<Option<Account>, StorageError> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT id, name, category_id, is_active FROM accounts WHERE id = ?1",
            params![id],
            row_to_account,
        )
        .optional()
        .map_err(map_err)
    }

    fn update_account(&self, account: &Account) -> Result<(), StorageError> {
        let conn = self.conn.lock().unwrap();
        let changed = conn
            .execute(
                "UPDATE accounts SET name = ?2, category_id = ?3, is_active = ?4 WHERE id = ?1",
                params![
                    account.id,
                    account.name,
                    account.category_id,
                    account.is_active
                ],
            )
            .map_err(map_err)?;
        if changed == 0 {
            return Err(StorageError::NotFound(format!("account {}", account.id)));
        }
        Ok(())
    }

    fn accounts(&self) -> Result<Vec<Account>, StorageError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare("SELECT id, name, category_id, is_active FROM accounts ORDER BY id")
            .map_err(map_err)?;
        let rows = stmt
            .query_map([], row_to_account)
            .map_err(map_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(map_err)?;
        Ok(rows)
    }

    fn count_accounts(&self) -> Result<u64, StorageError> {
        let conn = self.conn.lock().unwrap();
        conn.query_row("SELECT COUNT(*) FROM accounts", [], |row| row.get(0))
            .map_err(map_err)
    }

    fn find_account_by_name(&self, name: &str) -> Result<Option<Account>, StorageError> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT id, name, category_id, is_active FROM accounts
             WHERE lower(name) = lower(?1) ORDER BY id LIMIT 1",
            params![name],
            row_to_account,
        )
        .optional()
        .map_err(map_err)
    }

    fn accounts_in_category(&self, category_id: RecordId) -> Result<Vec<Account>, StorageError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT id, name, category_id, is_active FROM accounts
                 WHERE category_id = ?1 ORDER BY id",
            )
            .map_err(map_err)?;
        let rows = stmt
            .query_map(params![category_id], row_to_account)
            .map_err(map_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(map_err)?;
        Ok(rows)
    }

    fn add_entry(&self, entry: &NewEntry) -> Result<RecordId, StorageError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO entries (date, account_id, balance) VALUES (?1, ?2, ?3)",
            params![
                fmt_date(entry.date)?,
                entry.account_id,
                entry.balance.to_string()
            ],
        )
        .map_err(map_err)?;
        Ok(conn.last_insert_rowid() as RecordId)
    }

    fn get_entry(&self, id: RecordId) -> Result<Option<Entry>, StorageError> {
        let conn = self.conn.lock().unwrap();
        let parts = conn
            .query_row(
                "SELECT id, date, account_id, balance FROM entries WHERE id = ?1",
                params![id],
                row_to_entry,
            )
            .optional()
            .map_err(map_err)?;
        parts.map(entry_from_parts).transpose()
    }

    fn update_entry(&self, entry: &Entry) -> Result<(), StorageError> {
        let conn = self.conn.lock().unwrap();
        let changed = conn
            .execute(
                "UPDATE entries SET date = ?2, account_id = ?3, balance = ?4 WHERE id = ?1",
                params![
                    entry.id,
                    fmt_date(entry.date)?,
                    entry.account_id,
                    entry.balance.to_string()
                ],
            )
            .map_err(map_err)?;
        if changed == 0 {
            return Err(StorageError::NotFound(format!("entry {}", entry.id)));
        }
        Ok(())
    }

    fn delete_entry(&self, id: RecordId) -> Result<(), StorageError> {
        let conn = self.conn.lock().unwrap();
        let changed = conn
            .execute("DELETE FROM entries WHERE id = ?1", params![id])
            .map_err(map_err)?;
        if changed == 0 {
            return Err(StorageError::NotFound(format!("entry {id}")));
        }
        Ok(())
    }

    fn entries(&self) -> Result<Vec<Entry>, StorageError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare("SELECT id, date, account_id, balance FROM entries ORDER BY id")
            .map_err(map_err)?;
        let rows = stmt
            .query_map([], row_to_entry)
            .map_err(map_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(map_err)?;
        rows.into_iter().map(entry_from_parts).collect()
    }

    fn count_entries(&self) -> Result<u64, StorageError> {
        let conn = self.conn.lock().unwrap();
        conn.query_row("SELECT COUNT(*) FROM entries", [], |row| row.get(0))
            .map_err(map_err)
    }

    fn entries_for_account(&self, account_id: RecordId) -> Result<Vec<Entry>, StorageError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT id, date, account_id, balance FROM entries
                 WHERE account_id = ?1 ORDER BY id",
            )
            .map_err(map_err)?;
        let rows = stmt
            .query_map(params![account_id], row_to_entry)
            .map_err(map_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(map_err)?;
        rows.into_iter().map(entry_from_parts).collect()
    }

    fn entries_on_date(&self, date: Date) -> Result<Vec<Entry>, StorageError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT id, date, account_id, balance FROM entries
                 WHERE date = ?1 ORDER BY id",
            )
            .map_err(map_err)?;
        let rows = stmt
            .query_map(params![fmt_date(date)?], row_to_entry)
            .map_err(map_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(map_err)?;
        rows.into_iter().map(entry_from_parts).collect()
    }

    fn entry_by_account_and_date(
        &self,
        account_id: RecordId,
        date: Date,
    ) -> Result<Option<Entry>, StorageError> {
        let conn = self.conn.lock().unwrap();
        let parts = conn
            .query_row(
                "SELECT id, date, account_id, balance FROM entries
                 WHERE account_id = ?1 AND date = ?2",
                params![account_id, fmt_date(date)?],
                row_to_entry,
            )
            .optional()
            .map_err(map_err)?;
        parts.map(entry_from_parts).transpose()
    }

    fn delete_entries_on_date(&self, date: Date) -> Result<u64, StorageError> {
        let conn = self.conn.lock().unwrap();
        let changed = conn
            .execute("DELETE FROM entries WHERE date = ?1", params![fmt_date(date)?])
            .map_err(map_err)?;
        Ok(changed as u64)
    }

    fn clear_entries(&self) -> Result<(), StorageError> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM entries", []).map_err(map_err)?;
        Ok(())
    }

    fn begin(&self) -> Result<TransactionId, StorageError> {
        let tx = self.tx_counter.fetch_add(1, Ordering::SeqCst);
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(&format!("SAVEPOINT sp_{tx}"))
            .map_err(map_err)?;
        tracing::trace!(tx, "savepoint opened");
        Ok(tx)
    }

    fn commit(&self, tx: TransactionId) -> Result<(), StorageError> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(&format!("RELEASE sp_{tx}"))
            .map_err(|_| StorageError::NoActiveTransaction(tx))
    }

    fn rollback(&self, tx: TransactionId) -> Result<(), StorageError> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(&format!("ROLLBACK TO sp_{tx}; RELEASE sp_{tx}"))
            .map_err(|_| StorageError::NoActiveTransaction(tx))?;
        tracing::debug!(tx, "savepoint rolled back");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use time::macros::date;

    fn open() -> SqliteStorage {
        SqliteStorage::new(":memory:").unwrap()
    }

    fn seeded() -> SqliteStorage {
        let storage = open();
        storage
            .add_category(&NewCategory {
                name: "Cash".into(),
                kind: CategoryKind::Asset,
                ..NewCategory::default()
            })
            .unwrap();
        storage
            .add_account(&NewAccount {
                name: "Chase Checking".into(),
                category_id: 1,
                is_active: true,
            })
            .unwrap();
        storage
    }

    #[test]
    fn records_round_trip_through_the_schema() {
        let storage = seeded();
        storage
            .add_entry(&NewEntry {
                date: date!(2023 - 01 - 09),
                account_id: 1,
                balance: dec!(1250.50),
            })
            .unwrap();

        let entry = storage.get_entry(1).unwrap().unwrap();
        assert_eq!(entry.date, date!(2023 - 01 - 09));
        assert_eq!(entry.balance, dec!(1250.50));

        let category = storage.get_category(1).unwrap().unwrap();
        assert_eq!(category.kind, CategoryKind::Asset);
        assert!(category.is_active);
    }

    #[test]
    fn schema_rejects_duplicate_entry_pairs() {
        let storage = seeded();
        let entry = NewEntry {
            date: date!(2023 - 01 - 01),
            account_id: 1,
            balance: dec!(100),
        };
        storage.add_entry(&entry).unwrap();
        assert!(matches!(
            storage.add_entry(&entry).unwrap_err(),
            StorageError::UniqueViolation(_)
        ));
    }

    #[test]
    fn partial_index_allows_inactive_name_duplicates_only() {
        let storage = seeded();
        assert!(matches!(
            storage
                .add_account(&NewAccount {
                    name: "CHASE CHECKING".into(),
                    category_id: 1,
                    is_active: true,
                })
                .unwrap_err(),
            StorageError::UniqueViolation(_)
        ));
        storage
            .add_account(&NewAccount {
                name: "CHASE CHECKING".into(),
                category_id: 1,
                is_active: false,
            })
            .unwrap();
    }

    #[test]
    fn savepoints_nest_and_roll_back() {
        let storage = seeded();
        let outer = storage.begin().unwrap();
        storage
            .add_entry(&NewEntry {
                date: date!(2023 - 01 - 01),
                account_id: 1,
                balance: dec!(1),
            })
            .unwrap();

        let inner = storage.begin().unwrap();
        storage
            .add_entry(&NewEntry {
                date: date!(2023 - 02 - 01),
                account_id: 1,
                balance: dec!(2),
            })
            .unwrap();
        storage.commit(inner).unwrap();
        assert_eq!(storage.count_entries().unwrap(), 2);

        storage.rollback(outer).unwrap();
        assert_eq!(storage.count_entries().unwrap(), 0);
    }

    #[test]
    fn find_account_by_name_ignores_case() {
        let storage = seeded();
        let found = storage.find_account_by_name("chase checking").unwrap();
        assert_eq!(found.unwrap().id, 1);
    }
}
