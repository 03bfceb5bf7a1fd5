//! Migration backfills for tally
//!
//! This crate repairs and populates data derived from a legacy source. Every
//! operation is safe to re-run to completion:
//!
//! - [`propagate_counterparties`] - copy a parent record's counterparty onto entries lacking one
//! - [`assign_resolved_counterparties`] - resolve remaining entries from their legacy identifiers
//! - [`import_payments`] - create payment events from legacy records, deduplicated by legacy id
//! - [`sync_rows`] - copy rows between environments as inserts or updates
//!
//! Each operation returns a [`BackfillReport`] with one [`ItemOutcome`] per
//! unit of work. Failures are recorded per item and never abort the run.
//!
//! # Example
//!
//! ```rust
//! use tally_backfill::{import_payments, BackfillOptions, LegacyPayment};
//! use tally_core::{Direction, LedgerEntry, MemoryStore, NaiveDate, PaymentMethod};
//! use rust_decimal_macros::dec;
//!
//! let entry =
//!     LedgerEntry::new("INV-1", Direction::Receivable, dec!(1000)).with_legacy_id("OLD-7");
//! let mut store = MemoryStore::new().with_entry(entry);
//! let records = vec![LegacyPayment {
//!     legacy_entry_ref: "OLD-7".to_string(),
//!     legacy_payment_id: "42".to_string(),
//!     amount: dec!(500),
//!     date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
//!     method: PaymentMethod::Cash,
//! }];
//!
//! let first = import_payments(&mut store, &records, &BackfillOptions::default());
//! let second = import_payments(&mut store, &records, &BackfillOptions::default());
//! assert_eq!(first.done_count(), 1);
//! assert_eq!(second.skipped_count(), 1);
//! assert_eq!(store.events.len(), 1);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod counterparty;
pub mod import;
pub mod legacy_csv;
pub mod sync;

use serde::Serialize;
use std::fmt;
use tally_core::{EntryId, ParentId};
use tracing::{debug, info, warn};

pub use counterparty::{
    assign_resolved_counterparties, propagate_counterparties, AssignedVia, Assignment,
};
pub use import::{import_payments, legacy_event_id, LegacyPayment};
pub use legacy_csv::{
    read_legacy_payments, read_legacy_payments_file, LegacyCsvReader, LegacyRecords,
};
pub use sync::{
    apply_sync, plan_sync, sync_rows, MemoryTable, Row, SyncAction, SyncOp, SyncRow, SyncTarget,
};

/// Options shared by all backfill operations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackfillOptions {
    /// Report what would change without writing anything.
    pub dry_run: bool,
}

impl BackfillOptions {
    /// Options for a dry run.
    #[must_use]
    pub const fn dry_run() -> Self {
        Self { dry_run: true }
    }
}

/// Why a unit of work was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SkipReason {
    /// The legacy payment was already imported under this entry.
    Duplicate {
        /// The entry the payment belongs to.
        entry_id: EntryId,
    },
    /// The legacy entry reference has no canonical entry.
    MappingMiss {
        /// The unmapped reference.
        legacy_ref: String,
    },
    /// The entry has no parent record to propagate from.
    NoParent,
    /// The parent record has no counterparty either.
    ParentUnresolved {
        /// The parent record.
        parent: ParentId,
    },
    /// The entry carries no legacy identifiers to resolve from.
    NoExternalRef,
    /// No candidate matched the legacy identifiers.
    Unresolved,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Duplicate { entry_id } => write!(f, "already imported under {entry_id}"),
            Self::MappingMiss { legacy_ref } => {
                write!(f, "no ledger entry mapped to legacy reference {legacy_ref}")
            }
            Self::NoParent => write!(f, "no parent record"),
            Self::ParentUnresolved { parent } => {
                write!(f, "parent {parent} has no counterparty")
            }
            Self::NoExternalRef => write!(f, "no legacy identifiers"),
            Self::Unresolved => write!(f, "no matching counterparty"),
        }
    }
}

/// Outcome of one unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemOutcome<T> {
    /// The work was done (or, in a dry run, would be done).
    Done(T),
    /// Nothing to do, for the given reason.
    Skipped(SkipReason),
    /// The work failed.
    Failed(String),
}

/// One unit of work and its outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemRecord<T> {
    /// Identifier of the unit (entry id, legacy payment id, row id).
    pub key: String,
    /// What happened.
    #[serde(flatten)]
    pub outcome: ItemOutcome<T>,
}

/// Counts of a backfill run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    /// Units done (or that would be done).
    pub done: usize,
    /// Units skipped.
    pub skipped: usize,
    /// Units failed.
    pub failed: usize,
}

/// Result of a backfill run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackfillReport<T> {
    /// Name of the operation.
    pub operation: &'static str,
    /// Whether this was a dry run.
    pub dry_run: bool,
    /// Per-unit outcomes, in processing order.
    pub items: Vec<ItemRecord<T>>,
}

impl<T> BackfillReport<T> {
    /// Create an empty report.
    #[must_use]
    pub const fn new(operation: &'static str, dry_run: bool) -> Self {
        Self {
            operation,
            dry_run,
            items: Vec::new(),
        }
    }

    /// Record the outcome of one unit of work.
    pub fn push(&mut self, key: impl Into<String>, outcome: ItemOutcome<T>) {
        let key = key.into();
        match &outcome {
            ItemOutcome::Done(_) => debug!(operation = self.operation, key = %key, "done"),
            ItemOutcome::Skipped(reason) => {
                debug!(operation = self.operation, key = %key, "skipped: {reason}");
            }
            ItemOutcome::Failed(error) => {
                warn!(operation = self.operation, key = %key, "failed: {error}");
            }
        }
        self.items.push(ItemRecord { key, outcome });
    }

    /// Units done.
    pub fn done(&self) -> impl Iterator<Item = (&str, &T)> {
        self.items.iter().filter_map(|r| match &r.outcome {
            ItemOutcome::Done(value) => Some((r.key.as_str(), value)),
            _ => None,
        })
    }

    /// Units skipped, with the reason.
    pub fn skipped(&self) -> impl Iterator<Item = (&str, &SkipReason)> {
        self.items.iter().filter_map(|r| match &r.outcome {
            ItemOutcome::Skipped(reason) => Some((r.key.as_str(), reason)),
            _ => None,
        })
    }

    /// Units failed, with the error.
    pub fn failed(&self) -> impl Iterator<Item = (&str, &str)> {
        self.items.iter().filter_map(|r| match &r.outcome {
            ItemOutcome::Failed(error) => Some((r.key.as_str(), error.as_str())),
            _ => None,
        })
    }

    /// Number of units done.
    pub fn done_count(&self) -> usize {
        self.done().count()
    }

    /// Number of units skipped.
    pub fn skipped_count(&self) -> usize {
        self.skipped().count()
    }

    /// Number of units failed.
    pub fn failed_count(&self) -> usize {
        self.failed().count()
    }

    /// Check if any unit failed.
    pub fn has_failures(&self) -> bool {
        self.failed().next().is_some()
    }

    /// All counts at once.
    pub fn summary(&self) -> Summary {
        Summary {
            done: self.done_count(),
            skipped: self.skipped_count(),
            failed: self.failed_count(),
        }
    }

    fn finish(self) -> Self {
        let summary = self.summary();
        info!(
            operation = self.operation,
            dry_run = self.dry_run,
            done = summary.done,
            skipped = summary.skipped,
            failed = summary.failed,
            "backfill finished"
        );
        self
    }
}
