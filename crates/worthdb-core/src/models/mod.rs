use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::Date;

pub mod write;

/// Engine-assigned row id. Starts at 1 and is never reused; `0` never names
/// a real row and is treated as "absent" by validation.
pub type RecordId = u64;

time::serde::format_description!(mdy_date, Date, "[month]/[day]/[year]");

/// Whether balances recorded under a category count toward or against net
/// worth. Liabilities are stored as positive magnitudes and subtracted
/// during aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CategoryKind {
    Asset,
    Liability,
}

/// A named grouping of accounts, typed asset or liability.
///
/// Categories are never physically deleted; deactivation is the only
/// removal path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountCategory {
    pub id: RecordId,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: CategoryKind,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// A financial account belonging to exactly one category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: RecordId,
    pub name: String,
    pub category_id: RecordId,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// A dated balance snapshot for one account. At most one entry exists per
/// `(account_id, date)` pair.
///
/// Dates are day-granularity values serialized as `MM/DD/YYYY`; balances
/// serialize as plain JSON numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub id: RecordId,
    #[serde(with = "mdy_date")]
    pub date: Date,
    pub account_id: RecordId,
    #[serde(with = "rust_decimal::serde::float")]
    pub balance: Decimal,
}

/// Entries partitioned under one unique date.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupedEntry {
    pub date: Date,
    pub entries: Vec<Entry>,
}

fn default_true() -> bool {
    true
}
