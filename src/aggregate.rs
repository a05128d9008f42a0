//! Derived, read-side views computed from store snapshots.
//!
//! Everything here is a pure function over `&[AccountCategory]`,
//! `&[Account]` and `&[Entry]` slices: no storage access, no mutation.
//! Consumers subscribe to the three stores and recompute whichever views
//! they need when a new snapshot arrives.
//!
//! Rows that violate the ledger's invariants (a dangling account or
//! category reference, a duplicate `(account, date)` pair left behind by
//! legacy data) are data-integrity defects: duplicates resolve to the
//! latest-added row, dangling references are logged and skipped.

use rust_decimal::Decimal;
use time::Date;

use worthdb_core::{Account, AccountCategory, CategoryKind, Entry, RecordId};

/// An account flattened with its category and latest known balance.
#[derive(Debug, Clone, PartialEq)]
pub struct FormattedAccount {
    pub account_id: RecordId,
    pub name: String,
    pub category_id: RecordId,
    pub category_name: String,
    pub kind: CategoryKind,
    pub is_active: bool,
    pub balance: Decimal,
}

/// One account's balance line within a date group.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryLine {
    pub account_id: RecordId,
    pub account_name: String,
    pub balance: Decimal,
}

/// All balances recorded on one date.
#[derive(Debug, Clone, PartialEq)]
pub struct DateEntries {
    pub date: Date,
    pub lines: Vec<EntryLine>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateOrder {
    /// Oldest first, the shape time-series charts want.
    Ascending,
    /// Newest first, the shape display tables want.
    Descending,
}

/// Asset and liability totals as of one date.
#[derive(Debug, Clone, PartialEq)]
pub struct NetWorthSummary {
    pub assets: Decimal,
    pub liabilities: Decimal,
    pub net_worth: Decimal,
}

/// One point of the net-worth time series.
#[derive(Debug, Clone, PartialEq)]
pub struct NetWorthPoint {
    pub date: Date,
    pub assets: Decimal,
    pub liabilities: Decimal,
    pub net_worth: Decimal,
}

/// Flattens each account with its category and the balance of its most
/// recent entry (zero if it has none), sorted case-insensitively by
/// account name.
pub fn formatted_accounts(
    categories: &[AccountCategory],
    accounts: &[Account],
    entries: &[Entry],
    active_only: bool,
) -> Vec<FormattedAccount> {
    let mut formatted: Vec<FormattedAccount> = Vec::new();
    for account in accounts {
        if active_only && !account.is_active {
            continue;
        }
        let Some(category) = categories.iter().find(|c| c.id == account.category_id) else {
            tracing::warn!(
                account_id = account.id,
                category_id = account.category_id,
                "account references a missing category; skipping"
            );
            continue;
        };
        let balance = entries
            .iter()
            .filter(|entry| entry.account_id == account.id)
            .max_by_key(|entry| (entry.date, entry.id))
            .map(|entry| entry.balance)
            .unwrap_or(Decimal::ZERO);
        formatted.push(FormattedAccount {
            account_id: account.id,
            name: account.name.clone(),
            category_id: category.id,
            category_name: category.name.clone(),
            kind: category.kind,
            is_active: account.is_active,
            balance,
        });
    }
    formatted.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
    formatted
}

/// Groups entries by unique date into `(account, balance)` lines. Within a
/// date, a duplicate row for the same account overwrites the earlier one
/// (latest-added wins); line order follows first occurrence.
pub fn entries_by_date(accounts: &[Account], entries: &[Entry], order: DateOrder) -> Vec<DateEntries> {
    let mut groups: Vec<DateEntries> = Vec::new();
    for entry in entries {
        let Some(account) = accounts.iter().find(|a| a.id == entry.account_id) else {
            tracing::warn!(
                entry_id = entry.id,
                account_id = entry.account_id,
                "entry references a missing account; skipping"
            );
            continue;
        };
        let group_idx = match groups.iter().position(|g| g.date == entry.date) {
            Some(idx) => idx,
            None => {
                groups.push(DateEntries {
                    date: entry.date,
                    lines: Vec::new(),
                });
                groups.len() - 1
            }
        };
        let group = &mut groups[group_idx];
        match group.lines.iter_mut().find(|l| l.account_id == account.id) {
            Some(line) => line.balance = entry.balance,
            None => group.lines.push(EntryLine {
                account_id: account.id,
                account_name: account.name.clone(),
                balance: entry.balance,
            }),
        }
    }
    match order {
        DateOrder::Ascending => groups.sort_by_key(|group| group.date),
        DateOrder::Descending => groups.sort_by(|a, b| b.date.cmp(&a.date)),
    }
    groups
}

/// Net worth as of the most recent date with data, or `None` on an empty
/// ledger.
pub fn current_net_worth(
    categories: &[AccountCategory],
    accounts: &[Account],
    entries: &[Entry],
) -> Option<NetWorthSummary> {
    let groups = entries_by_date(accounts, entries, DateOrder::Ascending);
    let latest = groups.last()?;
    Some(summarize(categories, accounts, latest))
}

/// One `(assets, liabilities, net worth)` triple per date with data,
/// ascending by date.
pub fn net_worth_over_time(
    categories: &[AccountCategory],
    accounts: &[Account],
    entries: &[Entry],
) -> Vec<NetWorthPoint> {
    entries_by_date(accounts, entries, DateOrder::Ascending)
        .iter()
        .map(|group| {
            let summary = summarize(categories, accounts, group);
            NetWorthPoint {
                date: group.date,
                assets: summary.assets,
                liabilities: summary.liabilities,
                net_worth: summary.net_worth,
            }
        })
        .collect()
}

fn summarize(
    categories: &[AccountCategory],
    accounts: &[Account],
    group: &DateEntries,
) -> NetWorthSummary {
    let mut assets = Decimal::ZERO;
    let mut liabilities = Decimal::ZERO;
    for line in &group.lines {
        let kind = accounts
            .iter()
            .find(|a| a.id == line.account_id)
            .and_then(|account| categories.iter().find(|c| c.id == account.category_id))
            .map(|category| category.kind);
        match kind {
            Some(CategoryKind::Asset) => assets += line.balance,
            Some(CategoryKind::Liability) => liabilities += line.balance,
            None => tracing::warn!(
                account_id = line.account_id,
                "balance line could not be resolved to a category; skipping"
            ),
        }
    }
    NetWorthSummary {
        assets,
        liabilities,
        net_worth: assets - liabilities,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use time::macros::date;

    fn category(id: RecordId, name: &str, kind: CategoryKind) -> AccountCategory {
        AccountCategory {
            id,
            name: name.into(),
            kind,
            description: String::new(),
            is_active: true,
        }
    }

    fn account(id: RecordId, name: &str, category_id: RecordId) -> Account {
        Account {
            id,
            name: name.into(),
            category_id,
            is_active: true,
        }
    }

    fn entry(id: RecordId, date: Date, account_id: RecordId, balance: Decimal) -> Entry {
        Entry {
            id,
            date,
            account_id,
            balance,
        }
    }

    fn fixture() -> (Vec<AccountCategory>, Vec<Account>, Vec<Entry>) {
        let categories = vec![
            category(1, "Cash", CategoryKind::Asset),
            category(2, "Credit Cards", CategoryKind::Liability),
        ];
        let accounts = vec![
            account(1, "Chase Checking", 1),
            account(2, "Discover it", 2),
        ];
        let entries = vec![
            entry(1, date!(2023 - 01 - 01), 1, dec!(1000)),
            entry(2, date!(2023 - 01 - 01), 2, dec!(300)),
            entry(3, date!(2023 - 02 - 01), 1, dec!(1500)),
            entry(4, date!(2023 - 02 - 01), 2, dec!(250)),
        ];
        (categories, accounts, entries)
    }

    #[test]
    fn formatted_accounts_resolve_latest_balances_sorted_by_name() {
        let (categories, accounts, entries) = fixture();
        let formatted = formatted_accounts(&categories, &accounts, &entries, false);

        assert_eq!(formatted.len(), 2);
        assert_eq!(formatted[0].name, "Chase Checking");
        assert_eq!(formatted[0].balance, dec!(1500));
        assert_eq!(formatted[1].name, "Discover it");
        assert_eq!(formatted[1].kind, CategoryKind::Liability);
    }

    #[test]
    fn formatted_accounts_default_to_zero_without_entries() {
        let (categories, mut accounts, entries) = fixture();
        accounts.push(account(3, "Ally Savings", 1));
        let formatted = formatted_accounts(&categories, &accounts, &entries, false);
        let ally = formatted.iter().find(|f| f.account_id == 3).unwrap();
        assert_eq!(ally.balance, Decimal::ZERO);
    }

    #[test]
    fn formatted_accounts_can_filter_to_active_only() {
        let (categories, mut accounts, entries) = fixture();
        accounts[1].is_active = false;
        let formatted = formatted_accounts(&categories, &accounts, &entries, true);
        assert_eq!(formatted.len(), 1);
        assert_eq!(formatted[0].account_id, 1);
    }

    #[test]
    fn entries_by_date_orders_groups_both_ways() {
        let (_, accounts, entries) = fixture();
        let ascending = entries_by_date(&accounts, &entries, DateOrder::Ascending);
        assert_eq!(ascending[0].date, date!(2023 - 01 - 01));
        let descending = entries_by_date(&accounts, &entries, DateOrder::Descending);
        assert_eq!(descending[0].date, date!(2023 - 02 - 01));
        assert_eq!(descending[0].lines.len(), 2);
    }

    #[test]
    fn duplicate_rows_for_one_account_resolve_to_the_latest() {
        let (_, accounts, mut entries) = fixture();
        // legacy duplicate: same account and date, added later
        entries.push(entry(9, date!(2023 - 01 - 01), 1, dec!(999)));
        let groups = entries_by_date(&accounts, &entries, DateOrder::Ascending);
        let line = groups[0].lines.iter().find(|l| l.account_id == 1).unwrap();
        assert_eq!(line.balance, dec!(999));
        assert_eq!(groups[0].lines.len(), 2);
    }

    #[test]
    fn current_net_worth_uses_the_most_recent_date() {
        let (categories, accounts, entries) = fixture();
        let summary = current_net_worth(&categories, &accounts, &entries).unwrap();
        assert_eq!(summary.assets, dec!(1500));
        assert_eq!(summary.liabilities, dec!(250));
        assert_eq!(summary.net_worth, dec!(1250));
    }

    #[test]
    fn current_net_worth_is_none_on_an_empty_ledger() {
        assert!(current_net_worth(&[], &[], &[]).is_none());
    }

    #[test]
    fn net_worth_over_time_is_ascending_with_one_point_per_date() {
        let (categories, accounts, entries) = fixture();
        let points = net_worth_over_time(&categories, &accounts, &entries);
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].date, date!(2023 - 01 - 01));
        assert_eq!(points[0].net_worth, dec!(700));
        assert_eq!(points[1].net_worth, dec!(1250));
    }

    #[test]
    fn dangling_references_are_skipped_not_counted() {
        let (categories, accounts, mut entries) = fixture();
        entries.push(entry(9, date!(2023 - 02 - 01), 42, dec!(5000)));
        let summary = current_net_worth(&categories, &accounts, &entries).unwrap();
        assert_eq!(summary.assets, dec!(1500));
    }
}
