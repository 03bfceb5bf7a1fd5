//! Legacy payment import.

use crate::{BackfillOptions, BackfillReport, ItemOutcome, SkipReason};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tally_core::{
    EntryId, EventId, EventStore, LegacyMapping, PaymentEvent, PaymentMethod, StoreError,
};

/// One payment as exported from the legacy system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyPayment {
    /// The legacy identifier of the entry the payment belongs to.
    pub legacy_entry_ref: String,
    /// The legacy identifier of the payment itself.
    pub legacy_payment_id: String,
    /// Amount paid.
    pub amount: Decimal,
    /// Date of the payment.
    pub date: NaiveDate,
    /// How it was paid.
    #[serde(default)]
    pub method: PaymentMethod,
}

/// The event id an imported payment is stored under.
///
/// Derived from the canonical entry and the legacy payment id, so the same
/// legacy payment always lands on the same event.
#[must_use]
pub fn legacy_event_id(entry: &EntryId, legacy_payment_id: &str) -> EventId {
    EventId::new(format!("{entry}/legacy/{legacy_payment_id}"))
}

/// Create payment events from legacy payment records.
///
/// For each record:
/// 1. Look up the canonical entry for its legacy entry reference. A miss is
///    skipped, never guessed.
/// 2. Skip it if an event with the same legacy payment id already exists for
///    that entry, either in the store or earlier in this batch.
/// 3. Build the event, failing the record if the amount is not positive.
/// 4. Insert it, unless this is a dry run.
///
/// Running the same records twice creates each event once.
pub fn import_payments<S>(
    store: &mut S,
    records: &[LegacyPayment],
    options: &BackfillOptions,
) -> BackfillReport<PaymentEvent>
where
    S: LegacyMapping + EventStore,
{
    let mut report = BackfillReport::new("payment-import", options.dry_run);
    let mut seen: HashSet<(EntryId, &str)> = HashSet::new();

    for record in records {
        let key = record.legacy_payment_id.clone();
        let Some(entry_id) = store.canonical_entry(&record.legacy_entry_ref) else {
            report.push(
                key,
                ItemOutcome::Skipped(SkipReason::MappingMiss {
                    legacy_ref: record.legacy_entry_ref.clone(),
                }),
            );
            continue;
        };

        let payment_id = record.legacy_payment_id.as_str();
        if seen.contains(&(entry_id.clone(), payment_id))
            || store.has_legacy_event(&entry_id, payment_id)
        {
            report.push(key, ItemOutcome::Skipped(SkipReason::Duplicate { entry_id }));
            continue;
        }

        let event = match PaymentEvent::new(
            legacy_event_id(&entry_id, payment_id),
            entry_id.clone(),
            record.amount,
            record.date,
            record.method,
        ) {
            Ok(event) => event.with_legacy_id(payment_id),
            Err(e) => {
                report.push(key, ItemOutcome::Failed(e.to_string()));
                continue;
            }
        };

        let outcome = if options.dry_run {
            ItemOutcome::Done(event)
        } else {
            match store.insert_event(event.clone()) {
                Ok(()) => ItemOutcome::Done(event),
                Err(StoreError::Duplicate(_)) => ItemOutcome::Skipped(SkipReason::Duplicate {
                    entry_id: entry_id.clone(),
                }),
                Err(e) => ItemOutcome::Failed(e.to_string()),
            }
        };
        if !matches!(outcome, ItemOutcome::Failed(_)) {
            seen.insert((entry_id, payment_id));
        }
        report.push(key, outcome);
    }

    report.finish()
}
