//! Error types shared across tally crates.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::entry::{EntryId, EventId};

/// Malformed input to a pure computation.
///
/// These are surfaced to the immediate caller and never silently ignored.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The entry owes a negative amount.
    #[error("entry {entry} has negative owed amount {owed}")]
    NegativeOwed {
        /// The offending entry.
        entry: EntryId,
        /// The owed amount.
        owed: Decimal,
    },

    /// A payment event carries a zero or negative amount.
    #[error("payment {event} has non-positive amount {amount}")]
    NonPositivePayment {
        /// The offending event.
        event: EventId,
        /// The amount.
        amount: Decimal,
    },

    /// A payment event was supplied for an entry it does not belong to.
    #[error("payment {event} belongs to entry {owner}, not {entry}")]
    ForeignEvent {
        /// The offending event.
        event: EventId,
        /// The entry the event claims to belong to.
        owner: EntryId,
        /// The entry being reconciled.
        entry: EntryId,
    },

    /// A payment event references no entry at all.
    #[error("payment {event} references no ledger entry")]
    MissingEntryReference {
        /// The offending event.
        event: EventId,
    },
}

/// A storage collaborator refused an operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The entry does not exist in the store.
    #[error("unknown ledger entry {0}")]
    UnknownEntry(EntryId),

    /// The write was rejected, e.g. by a constraint.
    #[error("write rejected for {key}: {reason}")]
    Rejected {
        /// Key of the rejected row.
        key: String,
        /// Reason given by the store.
        reason: String,
    },

    /// The write would duplicate an existing row.
    #[error("duplicate row {0}")]
    Duplicate(String),
}

impl StoreError {
    /// Create a rejection error.
    pub fn rejected(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Rejected {
            key: key.into(),
            reason: reason.into(),
        }
    }
}
