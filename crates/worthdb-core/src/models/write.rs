use rust_decimal::Decimal;
use time::Date;

use super::{CategoryKind, RecordId};

/// Write command for a new account category. `description` and `is_active`
/// carry their defaults, so callers can fill only what they have:
///
/// ```
/// use worthdb_core::{CategoryKind, NewCategory};
///
/// let draft = NewCategory {
///     name: "Checking".into(),
///     kind: CategoryKind::Asset,
///     ..NewCategory::default()
/// };
/// assert!(draft.is_active);
/// ```
#[derive(Debug, Clone)]
pub struct NewCategory {
    pub name: String,
    pub kind: CategoryKind,
    pub description: String,
    pub is_active: bool,
}

impl Default for NewCategory {
    fn default() -> Self {
        Self {
            name: String::new(),
            kind: CategoryKind::Asset,
            description: String::new(),
            is_active: true,
        }
    }
}

/// Write command for a new account. A zero `category_id` means "absent" and
/// fails validation.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub name: String,
    pub category_id: RecordId,
    pub is_active: bool,
}

impl Default for NewAccount {
    fn default() -> Self {
        Self {
            name: String::new(),
            category_id: 0,
            is_active: true,
        }
    }
}

/// Write command for a new balance entry. All fields are required.
#[derive(Debug, Clone)]
pub struct NewEntry {
    pub date: Date,
    pub account_id: RecordId,
    pub balance: Decimal,
}

/// Partial update for a category. `kind` is deliberately absent: the
/// asset/liability type is immutable after creation.
#[derive(Debug, Clone, Default)]
pub struct CategoryPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct AccountPatch {
    pub name: Option<String>,
    pub category_id: Option<RecordId>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct EntryPatch {
    pub date: Option<Date>,
    pub account_id: Option<RecordId>,
    pub balance: Option<Decimal>,
}
