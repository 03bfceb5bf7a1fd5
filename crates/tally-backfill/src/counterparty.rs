//! Counterparty backfills.
//!
//! [`propagate_counterparties`] copies an already-resolved counterparty from a
//! parent record and never consults the resolver. [`assign_resolved_counterparties`]
//! is the separate pass that resolves from legacy identifiers.

use crate::{BackfillOptions, BackfillReport, ItemOutcome, SkipReason};
use serde::Serialize;
use std::collections::HashMap;
use tally_core::{
    CandidateLookup, CounterpartyCandidate, CounterpartyId, CounterpartyStore, Direction,
    EntryFilter, EntryReader, LedgerEntry, ParentId,
};
use tally_identity::{MatchRule, Resolution, Resolver};

/// Where an assigned counterparty came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "via", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssignedVia {
    /// Copied from the parent record.
    Parent {
        /// The parent record.
        parent: ParentId,
    },
    /// Resolved from the entry's legacy identifiers.
    Resolver {
        /// The rule that matched.
        rule: MatchRule,
    },
}

/// A counterparty assigned (or, in a dry run, to be assigned) to an entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Assignment {
    /// The counterparty.
    pub counterparty: CounterpartyId,
    /// How it was found.
    #[serde(flatten)]
    pub via: AssignedVia,
}

/// Copy the parent record's counterparty onto every entry lacking one.
///
/// Entries that already have a counterparty are left alone and not reported,
/// so a second run finds nothing to do. Entries without a parent, or whose
/// parent has no counterparty, are skipped for manual handling.
pub fn propagate_counterparties<S>(
    store: &mut S,
    options: &BackfillOptions,
) -> BackfillReport<Assignment>
where
    S: EntryReader + CounterpartyStore,
{
    let mut report = BackfillReport::new("counterparty-propagation", options.dry_run);

    for entry in unassigned(store) {
        let key = entry.id.to_string();
        let Some(parent) = entry.parent.clone() else {
            report.push(key, ItemOutcome::Skipped(SkipReason::NoParent));
            continue;
        };
        let Some(counterparty) = store.parent_counterparty(&parent) else {
            report.push(key, ItemOutcome::Skipped(SkipReason::ParentUnresolved { parent }));
            continue;
        };

        let assignment = Assignment {
            counterparty,
            via: AssignedVia::Parent { parent },
        };
        report.push(key, assign(store, &entry, assignment, options));
    }

    report.finish()
}

/// Resolve a counterparty for every entry lacking one from its legacy identifiers.
///
/// Receivables are matched against clients and payables against suppliers.
/// Entries without identifiers, or whose identifiers match nothing, are
/// skipped for manual handling.
pub fn assign_resolved_counterparties<S>(
    store: &mut S,
    resolver: &Resolver,
    options: &BackfillOptions,
) -> BackfillReport<Assignment>
where
    S: EntryReader + CounterpartyStore + CandidateLookup,
{
    let mut report = BackfillReport::new("counterparty-resolution", options.dry_run);
    let mut candidates: HashMap<Direction, Vec<CounterpartyCandidate>> = HashMap::new();

    for entry in unassigned(store) {
        let key = entry.id.to_string();
        let Some(reference) = &entry.external_ref else {
            report.push(key, ItemOutcome::Skipped(SkipReason::NoExternalRef));
            continue;
        };

        let pool = candidates
            .entry(entry.direction)
            .or_insert_with(|| store.candidates(entry.direction));
        let Resolution::Resolved { candidate, rule } = resolver.resolve(reference, pool) else {
            report.push(key, ItemOutcome::Skipped(SkipReason::Unresolved));
            continue;
        };

        let assignment = Assignment {
            counterparty: candidate,
            via: AssignedVia::Resolver { rule },
        };
        report.push(key, assign(store, &entry, assignment, options));
    }

    report.finish()
}

fn unassigned<S: EntryReader>(store: &S) -> Vec<LedgerEntry> {
    store
        .entries(&EntryFilter::all())
        .into_iter()
        .filter(|e| !e.has_counterparty())
        .collect()
}

fn assign<S: CounterpartyStore>(
    store: &mut S,
    entry: &LedgerEntry,
    assignment: Assignment,
    options: &BackfillOptions,
) -> ItemOutcome<Assignment> {
    if options.dry_run {
        return ItemOutcome::Done(assignment);
    }
    match store.assign_counterparty(&entry.id, &assignment.counterparty) {
        Ok(()) => ItemOutcome::Done(assignment),
        Err(e) => ItemOutcome::Failed(e.to_string()),
    }
}
