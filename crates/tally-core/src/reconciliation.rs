//! The outcome of recomputing one ledger entry.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::entry::{EntryId, EntryStatus, LedgerEntry};

/// Before/after view of one entry's derived fields.
///
/// Produced by recomputation, consumed by whoever commits it. Not persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationResult {
    /// The reconciled entry.
    pub entry_id: EntryId,
    /// Status before recomputation.
    pub previous_status: EntryStatus,
    /// Derived status.
    pub new_status: EntryStatus,
    /// Stored paid amount before recomputation.
    pub previous_paid: Decimal,
    /// Stored remaining amount before recomputation.
    pub previous_remaining: Decimal,
    /// Sum of the entry's payment events.
    pub new_paid: Decimal,
    /// Owed minus the new paid amount; negative when overpaid.
    pub new_remaining: Decimal,
    /// Whether committing this result would change anything.
    pub changed: bool,
}

impl ReconciliationResult {
    /// Check if the entry ends up overpaid.
    #[must_use]
    pub fn is_overpaid(&self) -> bool {
        self.new_remaining < Decimal::ZERO
    }

    /// Write the derived fields into an entry.
    ///
    /// Applying the same result twice leaves the entry as applying it once.
    pub fn apply_to(&self, entry: &mut LedgerEntry) {
        debug_assert_eq!(entry.id, self.entry_id, "result applied to wrong entry");
        entry.paid = self.new_paid;
        entry.remaining = self.new_remaining;
        entry.status = self.new_status;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::Direction;
    use rust_decimal_macros::dec;

    fn result() -> ReconciliationResult {
        ReconciliationResult {
            entry_id: EntryId::from("E1"),
            previous_status: EntryStatus::Pending,
            new_status: EntryStatus::Partial,
            previous_paid: dec!(0),
            previous_remaining: dec!(100),
            new_paid: dec!(40),
            new_remaining: dec!(60),
            changed: true,
        }
    }

    #[test]
    fn test_apply_to_is_idempotent() {
        let mut entry = LedgerEntry::new("E1", Direction::Receivable, dec!(100));
        let result = result();

        result.apply_to(&mut entry);
        let once = entry.clone();
        result.apply_to(&mut entry);

        assert_eq!(entry, once);
        assert_eq!(entry.paid, dec!(40));
        assert_eq!(entry.remaining, dec!(60));
        assert_eq!(entry.status, EntryStatus::Partial);
    }

    #[test]
    fn test_is_overpaid() {
        let mut result = result();
        assert!(!result.is_overpaid());
        result.new_remaining = dec!(-0.50);
        assert!(result.is_overpaid());
    }
}
