//! Batch reconciliation.
//!
//! Drives [`recompute_as_of`] over many entries. Entries are independent, so
//! the computation runs on a rayon pool; outcomes are gathered back in input
//! order, which keeps reports identical between runs. A bad entry or a
//! rejected commit is folded into the report and never aborts the batch.

use chrono::{Local, NaiveDate};
use rayon::prelude::*;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;
use tally_core::{
    EntryFilter, EntryId, EntryReader, LedgerEntry, PaymentEvent, ReconciliationResult,
    ResultWriter, StoreError, ValidationError,
};
use tracing::{debug, info, warn};

use crate::engine::recompute_as_of;

/// Number of changed entries kept in a report by default.
pub const DEFAULT_SAMPLE_LIMIT: usize = 20;

/// Batch options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOptions {
    /// Date used for overdue checks; today's local date when unset.
    pub as_of: Option<NaiveDate>,
    /// Maximum number of changed entries kept as samples.
    pub sample_limit: usize,
    /// Whether to spread entries over a thread pool.
    pub parallel: bool,
    /// Size of a dedicated pool; the global rayon pool when unset.
    pub threads: Option<usize>,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            as_of: None,
            sample_limit: DEFAULT_SAMPLE_LIMIT,
            parallel: true,
            threads: None,
        }
    }
}

impl BatchOptions {
    /// Create default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate due dates against `date`.
    #[must_use]
    pub const fn with_as_of(mut self, date: NaiveDate) -> Self {
        self.as_of = Some(date);
        self
    }

    /// Keep at most `limit` samples.
    #[must_use]
    pub const fn with_sample_limit(mut self, limit: usize) -> Self {
        self.sample_limit = limit;
        self
    }

    /// Enable or disable parallel computation.
    #[must_use]
    pub const fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Use a dedicated pool of `threads` workers.
    #[must_use]
    pub const fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }

    /// The effective "today".
    #[must_use]
    pub fn today(&self) -> NaiveDate {
        self.as_of.unwrap_or_else(|| Local::now().date_naive())
    }
}

/// Why an entry could not be reconciled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureKind {
    /// The entry or its events are structurally invalid.
    Validation,
    /// The write collaborator rejected the commit.
    Commit,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation => write!(f, "validation"),
            Self::Commit => write!(f, "commit"),
        }
    }
}

/// A per-entry failure, with enough detail to act on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryFailure {
    /// The entry that failed.
    pub entry_id: EntryId,
    /// Failure category.
    pub kind: FailureKind,
    /// Error message.
    pub message: String,
}

impl EntryFailure {
    fn validation(entry_id: &EntryId, error: &ValidationError) -> Self {
        Self {
            entry_id: entry_id.clone(),
            kind: FailureKind::Validation,
            message: error.to_string(),
        }
    }

    fn commit(entry_id: &EntryId, error: &StoreError) -> Self {
        Self {
            entry_id: entry_id.clone(),
            kind: FailureKind::Commit,
            message: error.to_string(),
        }
    }
}

impl fmt::Display for EntryFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.entry_id, self.kind, self.message)
    }
}

/// Suspicious but valid data noticed during a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataQualityWarning {
    /// Payments exceed the owed amount; remaining is negative.
    Overpaid {
        /// The entry.
        entry_id: EntryId,
        /// The (negative) remaining amount.
        remaining: Decimal,
    },
    /// Events were supplied for an entry that is not in the batch.
    OrphanEvents {
        /// The missing entry.
        entry_id: EntryId,
        /// Number of events keyed to it.
        count: usize,
    },
}

impl fmt::Display for DataQualityWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Overpaid {
                entry_id,
                remaining,
            } => write!(f, "{entry_id} is overpaid (remaining {remaining})"),
            Self::OrphanEvents { entry_id, count } => {
                write!(f, "{count} payment(s) reference {entry_id}, which is not in the batch")
            }
        }
    }
}

/// Outcome of one entry in a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryOutcome {
    /// The derived fields changed (and were committed, when committing).
    Updated(ReconciliationResult),
    /// Nothing to do.
    Unchanged(ReconciliationResult),
    /// The entry could not be reconciled.
    Failed(EntryFailure),
}

/// Summary of a batch run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    /// Date used for overdue checks.
    pub as_of: NaiveDate,
    /// Entries whose derived fields changed.
    pub updated_count: usize,
    /// Entries already consistent.
    pub unchanged_count: usize,
    /// Entries that failed validation or commit.
    pub error_count: usize,
    /// The first changed results, in input order.
    pub samples: Vec<ReconciliationResult>,
    /// Every failure.
    pub errors: Vec<EntryFailure>,
    /// Data-quality warnings.
    pub warnings: Vec<DataQualityWarning>,
    /// Sum of owed over reconciled entries.
    pub total_owed: Decimal,
    /// Sum of paid over reconciled entries.
    pub total_paid: Decimal,
    /// Sum of remaining over reconciled entries.
    pub total_remaining: Decimal,
    #[serde(skip)]
    sample_limit: usize,
}

impl BatchReport {
    /// Create an empty report.
    #[must_use]
    pub const fn new(as_of: NaiveDate, sample_limit: usize) -> Self {
        Self {
            as_of,
            updated_count: 0,
            unchanged_count: 0,
            error_count: 0,
            samples: Vec::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
            total_owed: Decimal::ZERO,
            total_paid: Decimal::ZERO,
            total_remaining: Decimal::ZERO,
            sample_limit,
        }
    }

    /// Number of entries seen.
    #[must_use]
    pub const fn processed(&self) -> usize {
        self.updated_count + self.unchanged_count + self.error_count
    }

    /// Check if any entry failed.
    #[must_use]
    pub const fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    /// Fold one entry's outcome into the report.
    pub fn record(&mut self, entry: &LedgerEntry, outcome: EntryOutcome) {
        match outcome {
            EntryOutcome::Updated(result) => {
                debug!(
                    entry = %result.entry_id,
                    from = %result.previous_status,
                    to = %result.new_status,
                    paid = %result.new_paid,
                    "entry updated"
                );
                self.updated_count += 1;
                self.add_totals(entry, &result);
                if self.samples.len() < self.sample_limit {
                    self.samples.push(result);
                }
            }
            EntryOutcome::Unchanged(result) => {
                self.unchanged_count += 1;
                self.add_totals(entry, &result);
            }
            EntryOutcome::Failed(failure) => {
                warn!(entry = %failure.entry_id, kind = %failure.kind, "{}", failure.message);
                self.error_count += 1;
                self.errors.push(failure);
            }
        }
    }

    /// Add a data-quality warning.
    pub fn warn(&mut self, warning: DataQualityWarning) {
        warn!("{warning}");
        self.warnings.push(warning);
    }

    fn add_totals(&mut self, entry: &LedgerEntry, result: &ReconciliationResult) {
        self.total_owed += entry.owed;
        self.total_paid += result.new_paid;
        self.total_remaining += result.new_remaining;
        if result.is_overpaid() {
            self.warn(DataQualityWarning::Overpaid {
                entry_id: result.entry_id.clone(),
                remaining: result.new_remaining,
            });
        }
    }

    fn finish(&self) {
        info!(
            as_of = %self.as_of,
            updated = self.updated_count,
            unchanged = self.unchanged_count,
            errors = self.error_count,
            warnings = self.warnings.len(),
            "reconciliation batch finished"
        );
    }
}

/// Reconcile a batch of entries without committing anything.
///
/// Entries missing from `events_by_entry` are treated as having no payments.
#[allow(clippy::implicit_hasher)]
pub fn run(
    entries: &[LedgerEntry],
    events_by_entry: &HashMap<EntryId, Vec<PaymentEvent>>,
    options: &BatchOptions,
) -> BatchReport {
    let today = options.today();
    let mut report = BatchReport::new(today, options.sample_limit);

    let results = compute(entries, events_by_entry, today, options);
    for (entry, result) in entries.iter().zip(results) {
        let outcome = match result {
            Ok(result) if result.changed => EntryOutcome::Updated(result),
            Ok(result) => EntryOutcome::Unchanged(result),
            Err(e) => EntryOutcome::Failed(EntryFailure::validation(&entry.id, &e)),
        };
        report.record(entry, outcome);
    }

    let known: HashSet<&EntryId> = entries.iter().map(|e| &e.id).collect();
    let mut orphans: Vec<(&EntryId, usize)> = events_by_entry
        .iter()
        .filter(|(id, events)| !events.is_empty() && !known.contains(id))
        .map(|(id, events)| (id, events.len()))
        .collect();
    orphans.sort();
    for (entry_id, count) in orphans {
        report.warn(DataQualityWarning::OrphanEvents {
            entry_id: entry_id.clone(),
            count,
        });
    }

    report.finish();
    report
}

/// Read entries from a store, reconcile them, and commit every changed result.
///
/// Commits happen one entry at a time after the computation phase. A
/// rejected commit is recorded as a failure and the batch moves on.
pub fn reconcile_store<S>(
    store: &mut S,
    filter: &EntryFilter,
    options: &BatchOptions,
) -> BatchReport
where
    S: EntryReader + ResultWriter,
{
    let entries = store.entries(filter);
    let events_by_entry: HashMap<EntryId, Vec<PaymentEvent>> = entries
        .iter()
        .map(|e| (e.id.clone(), store.events_for(&e.id)))
        .collect();

    let today = options.today();
    let mut report = BatchReport::new(today, options.sample_limit);

    let results = compute(&entries, &events_by_entry, today, options);
    for (entry, result) in entries.iter().zip(results) {
        let outcome = match result {
            Ok(result) if result.changed => match store.commit(&result) {
                Ok(()) => EntryOutcome::Updated(result),
                Err(e) => EntryOutcome::Failed(EntryFailure::commit(&entry.id, &e)),
            },
            Ok(result) => EntryOutcome::Unchanged(result),
            Err(e) => EntryOutcome::Failed(EntryFailure::validation(&entry.id, &e)),
        };
        report.record(entry, outcome);
    }

    report.finish();
    report
}

fn compute(
    entries: &[LedgerEntry],
    events_by_entry: &HashMap<EntryId, Vec<PaymentEvent>>,
    today: NaiveDate,
    options: &BatchOptions,
) -> Vec<Result<ReconciliationResult, ValidationError>> {
    let work = |entry: &LedgerEntry| {
        let events = events_by_entry.get(&entry.id).map_or(&[][..], Vec::as_slice);
        recompute_as_of(entry, events, today)
    };

    if !options.parallel {
        return entries.iter().map(work).collect();
    }

    match options.threads {
        Some(threads) => match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
            Ok(pool) => pool.install(|| entries.par_iter().map(work).collect()),
            Err(e) => {
                warn!("could not build a {threads}-thread pool ({e}), using the global pool");
                entries.par_iter().map(work).collect()
            }
        },
        None => entries.par_iter().map(work).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use tally_core::{Direction, EntryStatus, PaymentMethod};

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    fn payment(id: &str, entry: &str, amount: Decimal) -> PaymentEvent {
        PaymentEvent::new(id, entry, amount, date(2024, 6, 1), PaymentMethod::Cash).unwrap()
    }

    fn options() -> BatchOptions {
        BatchOptions::new().with_as_of(date(2024, 6, 15))
    }

    #[test]
    fn test_default_options() {
        let options = BatchOptions::default();
        assert_eq!(options.sample_limit, DEFAULT_SAMPLE_LIMIT);
        assert!(options.parallel);
        assert_eq!(options.threads, None);
        assert_eq!(options.with_as_of(date(2024, 1, 1)).today(), date(2024, 1, 1));
    }

    #[test]
    fn test_missing_key_means_no_events() {
        let entries = vec![LedgerEntry::new("E1", Direction::Receivable, dec!(100))];
        let report = run(&entries, &HashMap::new(), &options());

        assert_eq!(report.unchanged_count, 1);
        assert_eq!(report.total_remaining, dec!(100));
    }

    #[test]
    fn test_sample_limit_keeps_first_changed() {
        let entries: Vec<LedgerEntry> = (0..5)
            .map(|i| LedgerEntry::new(format!("E{i}"), Direction::Payable, dec!(10)))
            .collect();
        let events: HashMap<EntryId, Vec<PaymentEvent>> = entries
            .iter()
            .map(|e| (e.id.clone(), vec![payment(&format!("P-{}", e.id), e.id.as_str(), dec!(4))]))
            .collect();

        let report = run(&entries, &events, &options().with_sample_limit(2));
        assert_eq!(report.updated_count, 5);
        let ids: Vec<&str> = report.samples.iter().map(|r| r.entry_id.as_str()).collect();
        assert_eq!(ids, vec!["E0", "E1"]);
    }

    #[test]
    fn test_orphan_events_warned() {
        let entries = vec![LedgerEntry::new("E1", Direction::Receivable, dec!(100))];
        let mut events = HashMap::new();
        events.insert(EntryId::from("GHOST"), vec![payment("P1", "GHOST", dec!(5))]);

        let report = run(&entries, &events, &options());
        assert_eq!(
            report.warnings,
            vec![DataQualityWarning::OrphanEvents {
                entry_id: EntryId::from("GHOST"),
                count: 1,
            }]
        );
    }

    #[test]
    fn test_orphans_found_in_large_batch() {
        let entries: Vec<LedgerEntry> = (0..20_000)
            .map(|i| LedgerEntry::new(format!("E{i}"), Direction::Receivable, dec!(10)))
            .collect();
        let mut events: HashMap<EntryId, Vec<PaymentEvent>> = entries
            .iter()
            .map(|e| (e.id.clone(), vec![payment(&format!("P-{}", e.id), e.id.as_str(), dec!(1))]))
            .collect();
        for ghost in ["GHOST-B", "GHOST-A"] {
            events.insert(EntryId::from(ghost), vec![payment("PG", ghost, dec!(5))]);
        }
        events.insert(EntryId::from("EMPTY"), Vec::new());

        let report = run(&entries, &events, &options());

        assert_eq!(report.updated_count, 20_000);
        let orphans: Vec<&str> = report
            .warnings
            .iter()
            .filter_map(|w| match w {
                DataQualityWarning::OrphanEvents { entry_id, .. } => Some(entry_id.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(orphans, vec!["GHOST-A", "GHOST-B"]);
    }

    #[test]
    fn test_sequential_and_parallel_agree() {
        let entries: Vec<LedgerEntry> = (0..50)
            .map(|i| {
                LedgerEntry::new(format!("E{i}"), Direction::Receivable, Decimal::from(100 + i))
                    .with_due_date(date(2024, 6, 1 + (i % 28) as u32))
            })
            .collect();
        let events: HashMap<EntryId, Vec<PaymentEvent>> = entries
            .iter()
            .enumerate()
            .filter(|(i, _)| i % 3 != 0)
            .map(|(i, e)| {
                (
                    e.id.clone(),
                    vec![payment(&format!("P{i}"), e.id.as_str(), Decimal::from(i as i64 * 3 + 1))],
                )
            })
            .collect();

        let sequential = run(&entries, &events, &options().with_parallel(false));
        let parallel = run(&entries, &events, &options());
        let pooled = run(&entries, &events, &options().with_threads(2));

        assert_eq!(sequential, parallel);
        assert_eq!(sequential, pooled);
    }

    #[test]
    fn test_failures_are_reported_not_thrown() {
        let entries = vec![
            LedgerEntry::new("BAD", Direction::Receivable, dec!(-1)),
            LedgerEntry::new("GOOD", Direction::Receivable, dec!(10)),
        ];
        let mut events = HashMap::new();
        events.insert(EntryId::from("GOOD"), vec![payment("P1", "GOOD", dec!(10))]);

        let report = run(&entries, &events, &options());
        assert_eq!(report.error_count, 1);
        assert_eq!(report.updated_count, 1);
        assert_eq!(report.errors[0].entry_id.as_str(), "BAD");
        assert_eq!(report.errors[0].kind, FailureKind::Validation);
        assert_eq!(report.samples[0].new_status, EntryStatus::Paid);
        // the failed entry contributes nothing to the totals
        assert_eq!(report.total_owed, dec!(10));
    }
}
