//! Core types for tally
//!
//! This crate provides the fundamental types used throughout the tally project:
//!
//! - [`amount`] - Exact decimal arithmetic with a one-cent tolerance
//! - [`LedgerEntry`] - An obligation owed to or by the organization
//! - [`PaymentEvent`] - One payment applied to one entry
//! - [`CounterpartyCandidate`] - A target for identity resolution
//! - [`derive_status`] - Lifecycle status from amounts and due date
//! - [`ReconciliationResult`] - Before/after view of one recomputation
//! - [`store`] - Traits for the storage collaborators, plus [`MemoryStore`]
//!
//! # Example
//!
//! ```
//! use tally_core::{derive_status, Direction, EntryStatus, LedgerEntry, NaiveDate};
//! use rust_decimal_macros::dec;
//!
//! let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
//! let entry = LedgerEntry::new("INV-1", Direction::Receivable, dec!(10000));
//!
//! let status = derive_status(entry.owed, dec!(10000), entry.due_date, today, entry.status);
//! assert_eq!(status, EntryStatus::Paid);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod amount;
pub mod entry;
pub mod error;
pub mod reconciliation;
pub mod status;
pub mod store;

pub use amount::EPSILON;
pub use entry::{
    CounterpartyCandidate, CounterpartyId, Direction, EntryId, EntryStatus, EventId, ExternalRef,
    LedgerEntry, ParentId, PaymentEvent, PaymentMethod,
};
pub use error::{StoreError, ValidationError};
pub use reconciliation::ReconciliationResult;
pub use status::derive_status;
pub use store::{
    CandidateLookup, CounterpartyStore, EntryFilter, EntryReader, EventStore, LegacyMapping,
    MemoryStore, ResultWriter,
};

// Re-export commonly used external types
pub use chrono::NaiveDate;
pub use rust_decimal::Decimal;
