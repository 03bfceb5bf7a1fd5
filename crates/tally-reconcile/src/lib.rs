//! Ledger reconciliation engine.
//!
//! This crate provides:
//! - Single-entry recomputation of paid, remaining and status ([`recompute`])
//! - Batch runs over many entries with per-entry failure isolation ([`run`])
//! - Store-driven batches that commit what changed ([`reconcile_store`])
//!
//! # Idempotence
//!
//! Recomputation only reads the entry and its payment events and returns a
//! [`ReconciliationResult`](tally_core::ReconciliationResult). Running it again
//! over the same events gives the same result, and once committed the next
//! run reports the entry as unchanged. Re-running after a partial failure is
//! therefore always safe.
//!
//! ```
//! use tally_core::{
//!     Direction, EntryFilter, LedgerEntry, MemoryStore, NaiveDate, PaymentEvent, PaymentMethod,
//! };
//! use tally_reconcile::{reconcile_store, BatchOptions};
//! use rust_decimal_macros::dec;
//!
//! let day = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
//! let payment = PaymentEvent::new("PAY-1", "INV-1", dec!(500), day, PaymentMethod::Cash).unwrap();
//! let mut store = MemoryStore::new()
//!     .with_entry(LedgerEntry::new("INV-1", Direction::Receivable, dec!(500)))
//!     .with_event(payment);
//!
//! let options = BatchOptions::new().with_as_of(day);
//! let first = reconcile_store(&mut store, &EntryFilter::all(), &options);
//! assert_eq!(first.updated_count, 1);
//!
//! let second = reconcile_store(&mut store, &EntryFilter::all(), &options);
//! assert_eq!(second.updated_count, 0);
//! assert_eq!(second.unchanged_count, 1);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod batch;
mod engine;

pub use batch::{
    reconcile_store, run, BatchOptions, BatchReport, DataQualityWarning, EntryFailure,
    EntryOutcome, FailureKind, DEFAULT_SAMPLE_LIMIT,
};
pub use engine::{recompute, recompute_as_of};
