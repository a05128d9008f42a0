use std::sync::{Arc, Mutex};

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use time::macros::date;

use worthdb::{
    aggregate, import_export, AccountPatch, CategoryKind, CategoryPatch, EntryPatch,
    InMemoryStorage, Ledger, LedgerError, NewAccount, NewCategory, NewEntry, SqliteStorage,
    StorageBackend,
};

fn setup() -> Ledger {
    Ledger::new(Arc::new(InMemoryStorage::new())).expect("open ledger")
}

fn asset_category(ledger: &Ledger, name: &str) -> u64 {
    ledger
        .categories
        .add(NewCategory {
            name: name.into(),
            kind: CategoryKind::Asset,
            ..NewCategory::default()
        })
        .expect("add category")
}

fn liability_category(ledger: &Ledger, name: &str) -> u64 {
    ledger
        .categories
        .add(NewCategory {
            name: name.into(),
            kind: CategoryKind::Liability,
            ..NewCategory::default()
        })
        .expect("add category")
}

fn account(ledger: &Ledger, name: &str, category_id: u64) -> u64 {
    ledger
        .accounts
        .add(NewAccount {
            name: name.into(),
            category_id,
            ..NewAccount::default()
        })
        .expect("add account")
}

fn entry(ledger: &Ledger, account_id: u64, date: time::Date, balance: Decimal) -> u64 {
    ledger
        .entries
        .add(NewEntry {
            date,
            account_id,
            balance,
        })
        .expect("add entry")
}

// --- categories ---

#[test]
fn category_add_fills_defaults() {
    let ledger = setup();
    let id = asset_category(&ledger, "Checking");

    let category = ledger.categories.get(id).unwrap().unwrap();
    assert!(category.is_active);
    assert!(category.description.is_empty());
    assert_eq!(category.kind, CategoryKind::Asset);
}

#[test]
fn duplicate_category_name_is_rejected() {
    // scenario: add "Checking" twice
    let ledger = setup();
    asset_category(&ledger, "Checking");
    let err = ledger
        .categories
        .add(NewCategory {
            name: "Checking".into(),
            kind: CategoryKind::Asset,
            ..NewCategory::default()
        })
        .unwrap_err();
    assert!(matches!(err, LedgerError::Duplicate(_)));
}

#[test]
fn blank_category_name_is_rejected() {
    let ledger = setup();
    let err = ledger
        .categories
        .add(NewCategory {
            name: "   ".into(),
            kind: CategoryKind::Asset,
            ..NewCategory::default()
        })
        .unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)));
}

#[test]
fn category_update_merges_partial_fields() {
    let ledger = setup();
    let id = asset_category(&ledger, "Checking");

    ledger
        .categories
        .update(
            id,
            CategoryPatch {
                description: Some("day-to-day money".into()),
                ..CategoryPatch::default()
            },
        )
        .unwrap();

    let category = ledger.categories.get(id).unwrap().unwrap();
    assert_eq!(category.name, "Checking");
    assert_eq!(category.description, "day-to-day money");
}

#[test]
fn category_update_rejects_stealing_another_name() {
    let ledger = setup();
    asset_category(&ledger, "Checking");
    let savings = asset_category(&ledger, "Savings");

    let err = ledger
        .categories
        .update(
            savings,
            CategoryPatch {
                name: Some("Checking".into()),
                ..CategoryPatch::default()
            },
        )
        .unwrap_err();
    assert!(matches!(err, LedgerError::Duplicate(_)));

    // keeping its own name is not a collision
    ledger
        .categories
        .update(
            savings,
            CategoryPatch {
                name: Some("Savings".into()),
                ..CategoryPatch::default()
            },
        )
        .unwrap();
}

#[test]
fn category_update_of_missing_id_fails() {
    let ledger = setup();
    let err = ledger
        .categories
        .update(99, CategoryPatch::default())
        .unwrap_err();
    assert!(matches!(err, LedgerError::NotFound(_)));
}

#[test]
fn category_deactivation_is_blocked_by_active_accounts() {
    let ledger = setup();
    let cash = asset_category(&ledger, "Cash");
    let checking = account(&ledger, "Chase Checking", cash);

    let err = ledger.categories.deactivate(cash).unwrap_err();
    assert!(matches!(err, LedgerError::ReferentialIntegrity(_)));

    ledger.accounts.deactivate(checking).unwrap();
    ledger.categories.deactivate(cash).unwrap();
    assert!(!ledger.categories.get(cash).unwrap().unwrap().is_active);
}

#[test]
fn category_reactivation_has_no_precondition() {
    let ledger = setup();
    let cash = asset_category(&ledger, "Cash");
    ledger.categories.deactivate(cash).unwrap();

    ledger.categories.set_active_status(cash, true).unwrap();
    assert!(ledger.categories.get(cash).unwrap().unwrap().is_active);
}

// --- accounts ---

#[test]
fn account_add_requires_an_existing_category() {
    let ledger = setup();
    let err = ledger
        .accounts
        .add(NewAccount {
            name: "Chase Checking".into(),
            category_id: 42,
            ..NewAccount::default()
        })
        .unwrap_err();
    assert!(matches!(err, LedgerError::ReferentialIntegrity(_)));

    let err = ledger
        .accounts
        .add(NewAccount {
            name: "Chase Checking".into(),
            ..NewAccount::default()
        })
        .unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)));
}

#[test]
fn adding_a_matching_inactive_name_reactivates_in_place() {
    let ledger = setup();
    let cash = asset_category(&ledger, "Cash");
    let savings = asset_category(&ledger, "Savings");
    let id = account(&ledger, "Ally Savings", cash);
    ledger.accounts.deactivate(id).unwrap();

    // same name, different case and category: revives the same row
    let revived = ledger
        .accounts
        .add(NewAccount {
            name: "ALLY SAVINGS".into(),
            category_id: savings,
            ..NewAccount::default()
        })
        .unwrap();

    assert_eq!(revived, id);
    let stored = ledger.accounts.get(id).unwrap().unwrap();
    assert!(stored.is_active);
    assert_eq!(stored.category_id, savings);
    assert_eq!(stored.name, "ALLY SAVINGS");
    assert_eq!(ledger.accounts.get_all().unwrap().len(), 1);
}

#[test]
fn adding_a_matching_active_name_is_a_duplicate() {
    let ledger = setup();
    let cash = asset_category(&ledger, "Cash");
    account(&ledger, "Chase Checking", cash);

    let err = ledger
        .accounts
        .add(NewAccount {
            name: "chase checking".into(),
            category_id: cash,
            ..NewAccount::default()
        })
        .unwrap_err();
    assert!(matches!(err, LedgerError::Duplicate(_)));
}

#[test]
fn activating_an_account_under_an_inactive_category_fails() {
    // scenario: inactive category, account added under it, then activated
    let ledger = setup();
    let cash = ledger
        .categories
        .add(NewCategory {
            name: "Checking".into(),
            kind: CategoryKind::Asset,
            is_active: false,
            ..NewCategory::default()
        })
        .unwrap();
    let id = account(&ledger, "Chase Checking", cash);

    let err = ledger
        .accounts
        .update(
            id,
            AccountPatch {
                is_active: Some(true),
                ..AccountPatch::default()
            },
        )
        .unwrap_err();
    assert!(matches!(err, LedgerError::ReferentialIntegrity(_)));
}

#[test]
fn restore_succeeds_only_under_an_active_category() {
    let ledger = setup();
    let cash = asset_category(&ledger, "Cash");
    let id = account(&ledger, "Chase Checking", cash);

    ledger.accounts.deactivate(id).unwrap();
    ledger.categories.deactivate(cash).unwrap();

    let err = ledger.accounts.restore(id).unwrap_err();
    assert!(matches!(err, LedgerError::ReferentialIntegrity(_)));

    ledger.categories.set_active_status(cash, true).unwrap();
    ledger.accounts.restore(id).unwrap();
    assert!(ledger.accounts.get(id).unwrap().unwrap().is_active);
}

#[test]
fn account_filtered_reads_split_by_active_flag() {
    let ledger = setup();
    let cash = asset_category(&ledger, "Cash");
    let active = account(&ledger, "Chase Checking", cash);
    let dormant = account(&ledger, "Old Savings", cash);
    ledger.accounts.deactivate(dormant).unwrap();

    let active_ids: Vec<u64> = ledger
        .accounts
        .get_active()
        .unwrap()
        .iter()
        .map(|a| a.id)
        .collect();
    assert_eq!(active_ids, vec![active]);

    let inactive_ids: Vec<u64> = ledger
        .accounts
        .get_inactive()
        .unwrap()
        .iter()
        .map(|a| a.id)
        .collect();
    assert_eq!(inactive_ids, vec![dormant]);

    assert!(ledger
        .accounts
        .has_active_accounts_in_category(cash)
        .unwrap());
}

#[test]
fn account_rename_cannot_collide_with_an_active_name() {
    let ledger = setup();
    let cash = asset_category(&ledger, "Cash");
    account(&ledger, "Chase Checking", cash);
    let other = account(&ledger, "Ally Savings", cash);

    let err = ledger
        .accounts
        .update(
            other,
            AccountPatch {
                name: Some("Chase Checking".into()),
                ..AccountPatch::default()
            },
        )
        .unwrap_err();
    assert!(matches!(err, LedgerError::Duplicate(_)));
}

// --- entries ---

#[test]
fn duplicate_entry_for_account_and_date_is_rejected() {
    // scenario: two balances for one account on one date
    let ledger = setup();
    let cash = asset_category(&ledger, "Cash");
    let checking = account(&ledger, "Chase Checking", cash);
    entry(&ledger, checking, date!(2023 - 01 - 01), dec!(1000));

    let err = ledger
        .entries
        .add(NewEntry {
            date: date!(2023 - 01 - 01),
            account_id: checking,
            balance: dec!(2000),
        })
        .unwrap_err();
    assert!(matches!(err, LedgerError::Duplicate(_)));
}

#[test]
fn negative_balance_is_rejected() {
    let ledger = setup();
    let cash = asset_category(&ledger, "Cash");
    let checking = account(&ledger, "Chase Checking", cash);

    let err = ledger
        .entries
        .add(NewEntry {
            date: date!(2023 - 01 - 01),
            account_id: checking,
            balance: dec!(-5),
        })
        .unwrap_err();
    match err {
        LedgerError::Validation(msg) => assert!(msg.contains("negative")),
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[test]
fn entry_add_requires_an_existing_account() {
    let ledger = setup();
    let err = ledger
        .entries
        .add(NewEntry {
            date: date!(2023 - 01 - 01),
            account_id: 42,
            balance: dec!(10),
        })
        .unwrap_err();
    assert!(matches!(err, LedgerError::ReferentialIntegrity(_)));
}

#[test]
fn entry_update_revalidates_the_pair_against_others() {
    let ledger = setup();
    let cash = asset_category(&ledger, "Cash");
    let checking = account(&ledger, "Chase Checking", cash);
    let first = entry(&ledger, checking, date!(2023 - 01 - 01), dec!(1000));
    entry(&ledger, checking, date!(2023 - 02 - 01), dec!(1500));

    // moving the first entry onto the second's date collides
    let err = ledger
        .entries
        .update(
            first,
            EntryPatch {
                date: Some(date!(2023 - 02 - 01)),
                ..EntryPatch::default()
            },
        )
        .unwrap_err();
    assert!(matches!(err, LedgerError::Duplicate(_)));

    // updating the balance in place keeps the pair and is fine
    ledger
        .entries
        .update(
            first,
            EntryPatch {
                balance: Some(dec!(1100)),
                ..EntryPatch::default()
            },
        )
        .unwrap();
    assert_eq!(
        ledger.entries.get(first).unwrap().unwrap().balance,
        dec!(1100)
    );
}

#[test]
fn entry_removal_paths_report_missing_targets() {
    let ledger = setup();
    let cash = asset_category(&ledger, "Cash");
    let checking = account(&ledger, "Chase Checking", cash);
    let id = entry(&ledger, checking, date!(2023 - 01 - 01), dec!(1000));

    assert!(matches!(
        ledger.entries.remove(99).unwrap_err(),
        LedgerError::NotFound(_)
    ));
    assert!(matches!(
        ledger
            .entries
            .remove_all_on_date(date!(2024 - 01 - 01))
            .unwrap_err(),
        LedgerError::NotFound(_)
    ));

    ledger.entries.remove(id).unwrap();
    assert!(ledger.entries.get(id).unwrap().is_none());
}

#[test]
fn remove_all_on_date_deletes_the_whole_group() {
    let ledger = setup();
    let cash = asset_category(&ledger, "Cash");
    let checking = account(&ledger, "Chase Checking", cash);
    let savings = account(&ledger, "Ally Savings", cash);
    entry(&ledger, checking, date!(2023 - 01 - 01), dec!(1000));
    entry(&ledger, savings, date!(2023 - 01 - 01), dec!(5000));
    entry(&ledger, checking, date!(2023 - 02 - 01), dec!(1100));

    let removed = ledger
        .entries
        .remove_all_on_date(date!(2023 - 01 - 01))
        .unwrap();
    assert_eq!(removed, 2);
    assert_eq!(ledger.entries.get_all().unwrap().len(), 1);
}

#[test]
fn remove_all_empties_the_collection() {
    let ledger = setup();
    let cash = asset_category(&ledger, "Cash");
    let checking = account(&ledger, "Chase Checking", cash);
    entry(&ledger, checking, date!(2023 - 01 - 01), dec!(1000));

    ledger.entries.remove_all().unwrap();
    assert!(ledger.entries.get_all().unwrap().is_empty());
    assert!(ledger.entries.snapshot().is_empty());
}

#[test]
fn grouped_entries_flatten_back_to_the_original_set() {
    let ledger = setup();
    let cash = asset_category(&ledger, "Cash");
    let checking = account(&ledger, "Chase Checking", cash);
    let savings = account(&ledger, "Ally Savings", cash);
    entry(&ledger, checking, date!(2023 - 01 - 01), dec!(1000));
    entry(&ledger, savings, date!(2023 - 01 - 01), dec!(5000));
    entry(&ledger, checking, date!(2023 - 02 - 01), dec!(1100));

    let groups = ledger.entries.get_all_grouped().unwrap();
    assert_eq!(groups.len(), 2);

    let mut flattened: Vec<u64> = groups
        .iter()
        .flat_map(|group| group.entries.iter().map(|e| e.id))
        .collect();
    flattened.sort_unstable();
    let mut original: Vec<u64> = ledger
        .entries
        .get_all()
        .unwrap()
        .iter()
        .map(|e| e.id)
        .collect();
    original.sort_unstable();
    assert_eq!(flattened, original);
}

#[test]
fn most_recent_reads_pick_the_maximal_date() {
    let ledger = setup();
    let cash = asset_category(&ledger, "Cash");
    let checking = account(&ledger, "Chase Checking", cash);
    entry(&ledger, checking, date!(2023 - 02 - 01), dec!(1100));
    entry(&ledger, checking, date!(2023 - 01 - 01), dec!(1000));

    let recent = ledger
        .entries
        .get_most_recent_for_account(checking)
        .unwrap()
        .unwrap();
    assert_eq!(recent.date, date!(2023 - 02 - 01));

    let group = ledger.entries.get_most_recent_group().unwrap().unwrap();
    assert_eq!(group.date, date!(2023 - 02 - 01));

    assert_eq!(
        ledger
            .entries
            .get_account_balance(checking, date!(2023 - 01 - 01))
            .unwrap(),
        Some(dec!(1000))
    );
}

// --- aggregation over live snapshots ---

#[test]
fn net_worth_subtracts_liabilities_from_assets() {
    // scenario: one asset at 1000, one liability at 300, same date
    let ledger = setup();
    let cash = asset_category(&ledger, "Cash");
    let cards = liability_category(&ledger, "Credit Cards");
    let checking = account(&ledger, "Chase Checking", cash);
    let discover = account(&ledger, "Discover it", cards);
    entry(&ledger, checking, date!(2023 - 01 - 01), dec!(1000));
    entry(&ledger, discover, date!(2023 - 01 - 01), dec!(300));

    let summary = aggregate::current_net_worth(
        &ledger.categories.get_all().unwrap(),
        &ledger.accounts.get_all().unwrap(),
        &ledger.entries.get_all().unwrap(),
    )
    .unwrap();
    assert_eq!(summary.assets, dec!(1000));
    assert_eq!(summary.liabilities, dec!(300));
    assert_eq!(summary.net_worth, dec!(700));
}

// --- change notification ---

#[test]
fn subscribers_see_the_snapshot_after_every_mutation() {
    let ledger = setup();
    let seen: Arc<Mutex<Vec<usize>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    ledger.categories.subscribe(move |snapshot| {
        sink.lock().unwrap().push(snapshot.len());
    });

    asset_category(&ledger, "Cash");
    asset_category(&ledger, "Investments");

    // initial replay, then one snapshot per successful add
    assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2]);
}

#[test]
fn failed_mutations_do_not_publish() {
    let ledger = setup();
    asset_category(&ledger, "Cash");

    let seen: Arc<Mutex<Vec<usize>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let sub = ledger.categories.subscribe(move |snapshot| {
        sink.lock().unwrap().push(snapshot.len());
    });

    let _ = ledger
        .categories
        .add(NewCategory {
            name: "Cash".into(),
            kind: CategoryKind::Asset,
            ..NewCategory::default()
        })
        .unwrap_err();

    assert_eq!(*seen.lock().unwrap(), vec![1]);
    ledger.categories.unsubscribe(sub);
}

#[test]
fn ledger_open_primes_snapshots_from_storage() {
    let storage: Arc<dyn StorageBackend> = Arc::new(InMemoryStorage::new());
    {
        let ledger = Ledger::new(storage.clone()).unwrap();
        asset_category(&ledger, "Cash");
    }
    let reopened = Ledger::new(storage).unwrap();
    assert_eq!(reopened.categories.snapshot().len(), 1);
}

// --- import/export ---

fn seeded_ledger() -> Ledger {
    let ledger = setup();
    let cash = asset_category(&ledger, "Cash");
    let cards = liability_category(&ledger, "Credit Cards");
    let checking = account(&ledger, "Chase Checking", cash);
    let discover = account(&ledger, "Discover it", cards);
    entry(&ledger, checking, date!(2023 - 01 - 01), dec!(1000));
    entry(&ledger, discover, date!(2023 - 01 - 01), dec!(300));
    entry(&ledger, checking, date!(2023 - 02 - 01), dec!(1500));
    ledger
}

#[test]
fn export_import_round_trips_the_ledger() {
    let source = seeded_ledger();
    let json = import_export::export_json(&source).unwrap();

    let target = setup();
    let summary = import_export::import_json(&target, &json).unwrap();
    assert_eq!(summary.categories, 2);
    assert_eq!(summary.accounts, 2);
    assert_eq!(summary.entries, 3);

    // equivalent field values, with FK references intact across renumbering
    let exported_again = import_export::export_data(&target).unwrap();
    assert_eq!(exported_again.account_categories.len(), 2);
    let checking = exported_again
        .accounts
        .iter()
        .find(|a| a.name == "Chase Checking")
        .unwrap();
    let cash = exported_again
        .account_categories
        .iter()
        .find(|c| c.name == "Cash")
        .unwrap();
    assert_eq!(checking.category_id, cash.id);

    let summary = aggregate::current_net_worth(
        &target.categories.get_all().unwrap(),
        &target.accounts.get_all().unwrap(),
        &target.entries.get_all().unwrap(),
    )
    .unwrap();
    assert_eq!(summary.net_worth, dec!(1500));
}

#[test]
fn export_uses_the_envelope_wire_shape() {
    let source = seeded_ledger();
    let json = import_export::export_json(&source).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();

    assert!(value.get("entries").unwrap().is_array());
    assert!(value.get("accounts").unwrap().is_array());
    assert!(value.get("accountCategories").unwrap().is_array());
    assert_eq!(value["accountCategories"][0]["type"], "Asset");
    assert_eq!(value["entries"][0]["date"], "01/01/2023");
    assert_eq!(value["entries"][0]["balance"], 1000.0);
}

#[test]
fn import_into_a_populated_ledger_is_rejected() {
    let source = seeded_ledger();
    let envelope = import_export::export_data(&source).unwrap();

    let err = import_export::import_data(&source, envelope).unwrap_err();
    assert!(matches!(err, LedgerError::ImportState(_)));
}

#[test]
fn malformed_payloads_fail_validation() {
    let target = setup();
    let err = import_export::import_json(&target, "{\"accounts\": 5}").unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)));
}

#[test]
fn failed_imports_leave_the_ledger_empty() {
    let source = seeded_ledger();
    let mut envelope = import_export::export_data(&source).unwrap();
    // corrupt one entry so the replay fails after earlier inserts land
    envelope.entries[2].account_id = 999;

    let target = setup();
    let err = import_export::import_data(&target, envelope).unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)));

    assert!(target.categories.get_all().unwrap().is_empty());
    assert!(target.accounts.get_all().unwrap().is_empty());
    assert!(target.entries.get_all().unwrap().is_empty());
    assert!(target.categories.snapshot().is_empty());
}

// --- sqlite backend spot checks ---

#[test]
fn the_store_matrix_holds_on_sqlite() {
    let storage = Arc::new(SqliteStorage::new(":memory:").unwrap());
    let ledger = Ledger::new(storage).unwrap();

    let cash = asset_category(&ledger, "Cash");
    let cards = liability_category(&ledger, "Credit Cards");
    let checking = account(&ledger, "Chase Checking", cash);
    let discover = account(&ledger, "Discover it", cards);
    entry(&ledger, checking, date!(2023 - 01 - 01), dec!(1000));
    entry(&ledger, discover, date!(2023 - 01 - 01), dec!(300));

    assert!(matches!(
        ledger
            .entries
            .add(NewEntry {
                date: date!(2023 - 01 - 01),
                account_id: checking,
                balance: dec!(2000),
            })
            .unwrap_err(),
        LedgerError::Duplicate(_)
    ));
    assert!(matches!(
        ledger.categories.deactivate(cash).unwrap_err(),
        LedgerError::ReferentialIntegrity(_)
    ));

    let summary = aggregate::current_net_worth(
        &ledger.categories.get_all().unwrap(),
        &ledger.accounts.get_all().unwrap(),
        &ledger.entries.get_all().unwrap(),
    )
    .unwrap();
    assert_eq!(summary.net_worth, dec!(700));
}
