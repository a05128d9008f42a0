//! Core types and traits for WorthDB storage backends.
//!
//! This crate provides the `StorageBackend` trait and all associated record
//! types, enabling pluggable storage implementations in separate crates.

pub mod models;
pub mod storage;

// Re-export key types at crate root for convenience
pub use models::write::{
    AccountPatch, CategoryPatch, EntryPatch, NewAccount, NewCategory, NewEntry,
};
pub use models::{Account, AccountCategory, CategoryKind, Entry, GroupedEntry, RecordId};
pub use storage::{StorageBackend, StorageError, TransactionId};
