//! Lifecycle status derivation.
//!
//! Rules, evaluated in order:
//!
//! 1. `CANCELLED` stays `CANCELLED`.
//! 2. Nothing paid (within one cent) → `PENDING`.
//! 3. Owed minus paid within one cent (or overpaid) → `PAID`.
//! 4. Otherwise → `PARTIAL`.
//! 5. Anything but `PAID` with a due date strictly before today → `OVERDUE`.

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::amount::{is_near_zero, subtract, EPSILON};
use crate::entry::EntryStatus;

/// Derive the status of an obligation from its amounts and due date.
///
/// Callers must not pass a negative `owed`.
///
/// # Example
///
/// ```
/// use tally_core::{derive_status, EntryStatus, NaiveDate};
/// use rust_decimal_macros::dec;
///
/// let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
/// let yesterday = NaiveDate::from_ymd_opt(2024, 5, 31).unwrap();
///
/// assert_eq!(
///     derive_status(dec!(10000), dec!(3000), None, today, EntryStatus::Pending),
///     EntryStatus::Partial,
/// );
/// assert_eq!(
///     derive_status(dec!(10000), dec!(8000), Some(yesterday), today, EntryStatus::Partial),
///     EntryStatus::Overdue,
/// );
/// ```
#[must_use]
pub fn derive_status(
    owed: Decimal,
    paid: Decimal,
    due_date: Option<NaiveDate>,
    today: NaiveDate,
    current: EntryStatus,
) -> EntryStatus {
    if current == EntryStatus::Cancelled {
        return EntryStatus::Cancelled;
    }

    let candidate = if paid <= Decimal::ZERO || is_near_zero(paid, EPSILON) {
        EntryStatus::Pending
    } else if subtract(owed, paid) <= EPSILON {
        EntryStatus::Paid
    } else {
        EntryStatus::Partial
    };

    match due_date {
        Some(due) if candidate != EntryStatus::Paid && due < today => EntryStatus::Overdue,
        _ => candidate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    fn today() -> NaiveDate {
        date(2024, 6, 15)
    }

    #[test]
    fn test_nothing_paid_is_pending() {
        let status = derive_status(dec!(100), dec!(0), None, today(), EntryStatus::Pending);
        assert_eq!(status, EntryStatus::Pending);
    }

    #[test]
    fn test_sub_cent_payment_is_still_pending() {
        let status = derive_status(dec!(100), dec!(0.01), None, today(), EntryStatus::Pending);
        assert_eq!(status, EntryStatus::Pending);
    }

    #[test]
    fn test_partial_payment() {
        let status = derive_status(dec!(100), dec!(40), None, today(), EntryStatus::Pending);
        assert_eq!(status, EntryStatus::Partial);
    }

    #[test]
    fn test_paid_within_one_cent() {
        let status = derive_status(dec!(100), dec!(99.99), None, today(), EntryStatus::Partial);
        assert_eq!(status, EntryStatus::Paid);

        let status = derive_status(dec!(100), dec!(99.98), None, today(), EntryStatus::Partial);
        assert_eq!(status, EntryStatus::Partial);
    }

    #[test]
    fn test_overpaid_is_paid() {
        let status = derive_status(dec!(100), dec!(120), None, today(), EntryStatus::Partial);
        assert_eq!(status, EntryStatus::Paid);
    }

    #[test]
    fn test_overdue_overrides_pending_and_partial() {
        let due = Some(date(2024, 6, 14));
        assert_eq!(
            derive_status(dec!(100), dec!(0), due, today(), EntryStatus::Pending),
            EntryStatus::Overdue
        );
        assert_eq!(
            derive_status(dec!(100), dec!(50), due, today(), EntryStatus::Partial),
            EntryStatus::Overdue
        );
    }

    #[test]
    fn test_paid_is_never_overdue() {
        let due = Some(date(2020, 1, 1));
        let status = derive_status(dec!(100), dec!(100), due, today(), EntryStatus::Overdue);
        assert_eq!(status, EntryStatus::Paid);
    }

    #[test]
    fn test_due_today_is_not_overdue() {
        let status =
            derive_status(dec!(100), dec!(0), Some(today()), today(), EntryStatus::Pending);
        assert_eq!(status, EntryStatus::Pending);
    }

    #[test]
    fn test_overdue_recovers_when_due_date_moves() {
        let due = Some(date(2024, 7, 1));
        let status = derive_status(dec!(100), dec!(10), due, today(), EntryStatus::Overdue);
        assert_eq!(status, EntryStatus::Partial);
    }

    #[test]
    fn test_cancelled_is_terminal() {
        let due = Some(date(2020, 1, 1));
        for paid in [dec!(0), dec!(50), dec!(100), dec!(500)] {
            let status = derive_status(dec!(100), paid, due, today(), EntryStatus::Cancelled);
            assert_eq!(status, EntryStatus::Cancelled);
        }
    }

    #[test]
    fn test_zero_owed_nothing_paid_is_pending() {
        let status = derive_status(dec!(0), dec!(0), None, today(), EntryStatus::Pending);
        assert_eq!(status, EntryStatus::Pending);
    }
}
