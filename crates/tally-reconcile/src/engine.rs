//! Single-entry recomputation.
//!
//! Sums an entry's payment events, derives remaining and status, and reports
//! whether anything differs from what is stored. Nothing is written here.

use chrono::{Local, NaiveDate};
use tally_core::amount::{self, approx_eq, EPSILON};
use tally_core::{derive_status, LedgerEntry, PaymentEvent, ReconciliationResult, ValidationError};

/// Recompute one entry as of today's local date.
pub fn recompute(
    entry: &LedgerEntry,
    events: &[PaymentEvent],
) -> Result<ReconciliationResult, ValidationError> {
    recompute_as_of(entry, events, Local::now().date_naive())
}

/// Recompute one entry as of `today`.
///
/// This function:
/// 1. Checks the entry and every event are well formed and that each event
///    belongs to the entry
/// 2. Sums the event amounts into the new paid total
/// 3. Derives remaining (`owed - paid`, not clamped) and the status
/// 4. Marks the result changed when paid or remaining moved by more than one
///    cent, or the status differs
///
/// Recomputing twice from the same events yields the same result, and the
/// second commit of it is a no-op.
///
/// # Example
///
/// ```
/// use tally_core::{Direction, EntryStatus, LedgerEntry, NaiveDate, PaymentEvent, PaymentMethod};
/// use tally_reconcile::recompute_as_of;
/// use rust_decimal_macros::dec;
///
/// let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
/// let entry = LedgerEntry::new("INV-1", Direction::Receivable, dec!(10000));
/// let method = PaymentMethod::BankTransfer;
/// let events = vec![PaymentEvent::new("PAY-1", "INV-1", dec!(3000), today, method).unwrap()];
///
/// let result = recompute_as_of(&entry, &events, today).unwrap();
/// assert_eq!(result.new_paid, dec!(3000));
/// assert_eq!(result.new_remaining, dec!(7000));
/// assert_eq!(result.new_status, EntryStatus::Partial);
/// assert!(result.changed);
/// ```
pub fn recompute_as_of(
    entry: &LedgerEntry,
    events: &[PaymentEvent],
    today: NaiveDate,
) -> Result<ReconciliationResult, ValidationError> {
    entry.validate()?;
    for event in events {
        event.validate()?;
        if event.entry_id != entry.id {
            return Err(ValidationError::ForeignEvent {
                event: event.id.clone(),
                owner: event.entry_id.clone(),
                entry: entry.id.clone(),
            });
        }
    }

    let new_paid = amount::sum(events.iter().map(|e| e.amount));
    let new_remaining = amount::subtract(entry.owed, new_paid);
    let new_status = derive_status(entry.owed, new_paid, entry.due_date, today, entry.status);

    let changed = !approx_eq(entry.paid, new_paid, EPSILON)
        || !approx_eq(entry.remaining, new_remaining, EPSILON)
        || new_status != entry.status;

    Ok(ReconciliationResult {
        entry_id: entry.id.clone(),
        previous_status: entry.status,
        new_status,
        previous_paid: entry.paid,
        previous_remaining: entry.remaining,
        new_paid,
        new_remaining,
        changed,
    })
}
