//! Integration tests for the reconciliation engine.
//!
//! Tests cover the worked examples for recomputation, idempotent commits
//! through a store, and failure isolation in batches.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use tally_core::{
    Direction, EntryFilter, EntryId, EntryReader, EntryStatus, LedgerEntry, MemoryStore,
    NaiveDate, PaymentEvent, PaymentMethod, ReconciliationResult, ResultWriter, StoreError,
};
use tally_reconcile::{
    reconcile_store, recompute_as_of, run, BatchOptions, DataQualityWarning, FailureKind,
};

// ============================================================================
// Helper Functions
// ============================================================================

fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

fn today() -> NaiveDate {
    date(2024, 6, 15)
}

fn yesterday() -> NaiveDate {
    date(2024, 6, 14)
}

fn payment(id: &str, entry: &str, amount: Decimal) -> PaymentEvent {
    PaymentEvent::new(id, entry, amount, date(2024, 6, 1), PaymentMethod::BankTransfer).unwrap()
}

fn options() -> BatchOptions {
    BatchOptions::new().with_as_of(today())
}

/// A store whose writes fail for selected entries.
struct FlakyStore {
    inner: MemoryStore,
    reject: Vec<EntryId>,
    commits: usize,
}

impl EntryReader for FlakyStore {
    fn entries(&self, filter: &EntryFilter) -> Vec<LedgerEntry> {
        self.inner.entries(filter)
    }

    fn events_for(&self, entry: &EntryId) -> Vec<PaymentEvent> {
        self.inner.events_for(entry)
    }
}

impl ResultWriter for FlakyStore {
    fn commit(&mut self, result: &ReconciliationResult) -> Result<(), StoreError> {
        self.commits += 1;
        if self.reject.contains(&result.entry_id) {
            return Err(StoreError::rejected(
                result.entry_id.as_str(),
                "check constraint violated",
            ));
        }
        self.inner.commit(result)
    }
}

// ============================================================================
// Worked Examples
// ============================================================================

#[test]
fn test_example_partial() {
    let entry = LedgerEntry::new("E1", Direction::Receivable, dec!(10000));
    let result = recompute_as_of(&entry, &[payment("P1", "E1", dec!(3000))], today()).unwrap();

    assert_eq!(result.new_paid, dec!(3000));
    assert_eq!(result.new_remaining, dec!(7000));
    assert_eq!(result.new_status, EntryStatus::Partial);
}

#[test]
fn test_example_paid() {
    let entry = LedgerEntry::new("E1", Direction::Receivable, dec!(10000));
    let result = recompute_as_of(&entry, &[payment("P1", "E1", dec!(10000))], today()).unwrap();

    assert_eq!(result.new_paid, dec!(10000));
    assert_eq!(result.new_remaining, dec!(0));
    assert_eq!(result.new_status, EntryStatus::Paid);
}

#[test]
fn test_example_unpaid_past_due() {
    let entry =
        LedgerEntry::new("E1", Direction::Receivable, dec!(10000)).with_due_date(yesterday());
    let result = recompute_as_of(&entry, &[], today()).unwrap();

    assert_eq!(result.new_status, EntryStatus::Overdue);
}

#[test]
fn test_example_overdue_overrides_partial() {
    let entry =
        LedgerEntry::new("E1", Direction::Payable, dec!(10000)).with_due_date(yesterday());
    let events = [
        payment("P1", "E1", dec!(4000)),
        payment("P2", "E1", dec!(4000)),
    ];
    let result = recompute_as_of(&entry, &events, today()).unwrap();

    assert_eq!(result.new_paid, dec!(8000));
    assert_eq!(result.new_remaining, dec!(2000));
    assert_eq!(result.new_status, EntryStatus::Overdue);
}

// ============================================================================
// Idempotence
// ============================================================================

#[test]
fn test_double_commit_matches_single_commit() {
    let entry = LedgerEntry::new("E1", Direction::Receivable, dec!(900));
    let events = [payment("P1", "E1", dec!(300)), payment("P2", "E1", dec!(150))];

    let first = recompute_as_of(&entry, &events, today()).unwrap();
    let second = recompute_as_of(&entry, &events, today()).unwrap();
    assert_eq!(first, second);

    let mut once = entry.clone();
    first.apply_to(&mut once);

    let mut twice = entry;
    first.apply_to(&mut twice);
    second.apply_to(&mut twice);

    assert_eq!(once, twice);
    assert!(!recompute_as_of(&once, &events, today()).unwrap().changed);
}

#[test]
fn test_store_rerun_is_noop() {
    let mut store = MemoryStore::new()
        .with_entry(LedgerEntry::new("E1", Direction::Receivable, dec!(100)))
        .with_entry(
            LedgerEntry::new("E2", Direction::Payable, dec!(50)).with_due_date(yesterday()),
        )
        .with_event(payment("P1", "E1", dec!(60)));

    let first = reconcile_store(&mut store, &EntryFilter::all(), &options());
    assert_eq!(first.updated_count, 2);
    let snapshot = store.clone();

    let second = reconcile_store(&mut store, &EntryFilter::all(), &options());
    assert_eq!(second.updated_count, 0);
    assert_eq!(second.unchanged_count, 2);
    assert_eq!(store, snapshot);

    let e1 = store.entry(&EntryId::from("E1")).unwrap();
    assert_eq!(e1.paid + e1.remaining, e1.owed);
    assert_eq!(e1.status, EntryStatus::Partial);
}

#[test]
fn test_store_filter_limits_batch() {
    let mut store = MemoryStore::new()
        .with_entry(LedgerEntry::new("R1", Direction::Receivable, dec!(100)))
        .with_entry(LedgerEntry::new("P1", Direction::Payable, dec!(100)))
        .with_event(payment("EV1", "R1", dec!(100)))
        .with_event(payment("EV2", "P1", dec!(100)));

    let filter = EntryFilter::all().with_direction(Direction::Payable);
    let report = reconcile_store(&mut store, &filter, &options());

    assert_eq!(report.processed(), 1);
    assert_eq!(store.entry(&EntryId::from("P1")).unwrap().status, EntryStatus::Paid);
    assert_eq!(store.entry(&EntryId::from("R1")).unwrap().status, EntryStatus::Pending);
}

// ============================================================================
// Failure Isolation
// ============================================================================

#[test]
fn test_commit_failure_does_not_abort_batch() {
    let inner = MemoryStore::new()
        .with_entry(LedgerEntry::new("E1", Direction::Receivable, dec!(100)))
        .with_entry(LedgerEntry::new("E2", Direction::Receivable, dec!(100)))
        .with_entry(LedgerEntry::new("E3", Direction::Receivable, dec!(100)))
        .with_event(payment("P1", "E1", dec!(100)))
        .with_event(payment("P2", "E2", dec!(100)))
        .with_event(payment("P3", "E3", dec!(100)));
    let mut store = FlakyStore {
        inner,
        reject: vec![EntryId::from("E2")],
        commits: 0,
    };

    let report = reconcile_store(&mut store, &EntryFilter::all(), &options());

    assert_eq!(store.commits, 3);
    assert_eq!(report.updated_count, 2);
    assert_eq!(report.error_count, 1);
    assert_eq!(report.errors[0].entry_id.as_str(), "E2");
    assert_eq!(report.errors[0].kind, FailureKind::Commit);
    assert!(report.errors[0].message.contains("check constraint"));

    let e3 = store.inner.entry(&EntryId::from("E3")).unwrap();
    assert_eq!(e3.status, EntryStatus::Paid);
    let e2 = store.inner.entry(&EntryId::from("E2")).unwrap();
    assert_eq!(e2.status, EntryStatus::Pending);
}

#[test]
fn test_retry_after_partial_failure_converges() {
    let inner = MemoryStore::new()
        .with_entry(LedgerEntry::new("E1", Direction::Receivable, dec!(100)))
        .with_entry(LedgerEntry::new("E2", Direction::Receivable, dec!(100)))
        .with_event(payment("P1", "E1", dec!(40)))
        .with_event(payment("P2", "E2", dec!(40)));
    let mut store = FlakyStore {
        inner,
        reject: vec![EntryId::from("E2")],
        commits: 0,
    };

    let first = reconcile_store(&mut store, &EntryFilter::all(), &options());
    assert_eq!((first.updated_count, first.error_count), (1, 1));

    store.reject.clear();
    let second = reconcile_store(&mut store, &EntryFilter::all(), &options());
    assert_eq!(second.updated_count, 1);
    assert_eq!(second.unchanged_count, 1);
    assert_eq!(second.samples[0].entry_id.as_str(), "E2");
}

#[test]
fn test_validation_error_in_batch_is_reported() {
    let entries = vec![
        LedgerEntry::new("E1", Direction::Receivable, dec!(100)),
        LedgerEntry::new("E2", Direction::Receivable, dec!(100)),
    ];
    let mut events = HashMap::new();
    // E1's list contains an event owned by someone else
    events.insert(EntryId::from("E1"), vec![payment("P1", "E9", dec!(10))]);
    events.insert(EntryId::from("E2"), vec![payment("P2", "E2", dec!(10))]);

    let report = run(&entries, &events, &options());

    assert_eq!(report.error_count, 1);
    assert_eq!(report.updated_count, 1);
    assert!(report.errors[0].message.contains("P1"));
}

// ============================================================================
// Report Totals
// ============================================================================

#[test]
fn test_report_totals_and_overpayment_warning() {
    let entries = vec![
        LedgerEntry::new("E1", Direction::Receivable, dec!(100)),
        LedgerEntry::new("E2", Direction::Receivable, dec!(50)),
    ];
    let mut events = HashMap::new();
    events.insert(EntryId::from("E1"), vec![payment("P1", "E1", dec!(30))]);
    events.insert(EntryId::from("E2"), vec![payment("P2", "E2", dec!(80))]);

    let report = run(&entries, &events, &options());

    assert_eq!(report.total_owed, dec!(150));
    assert_eq!(report.total_paid, dec!(110));
    assert_eq!(report.total_remaining, dec!(40));
    assert_eq!(
        report.warnings,
        vec![DataQualityWarning::Overpaid {
            entry_id: EntryId::from("E2"),
            remaining: dec!(-30),
        }]
    );
}
