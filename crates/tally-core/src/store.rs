//! Storage seams.
//!
//! tally never talks to a database itself. Callers hand it collaborators
//! implementing these traits, and own I/O, pagination and transactions.
//! [`MemoryStore`] implements all of them over plain vectors and maps; it
//! backs the CLI dataset files and the test suites.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::entry::{
    CounterpartyCandidate, CounterpartyId, Direction, EntryId, LedgerEntry, ParentId,
    PaymentEvent,
};
use crate::error::StoreError;
use crate::reconciliation::ReconciliationResult;

/// Which entries a read should return.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EntryFilter {
    /// Only entries on this side.
    pub direction: Option<Direction>,
    /// Only entries due on or before this date (entries without a due date are excluded).
    pub due_on_or_before: Option<NaiveDate>,
}

impl EntryFilter {
    /// A filter matching every entry.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Restrict to one direction.
    #[must_use]
    pub const fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = Some(direction);
        self
    }

    /// Restrict to entries due on or before `date`.
    #[must_use]
    pub const fn with_due_on_or_before(mut self, date: NaiveDate) -> Self {
        self.due_on_or_before = Some(date);
        self
    }

    /// Check whether an entry passes the filter.
    #[must_use]
    pub fn matches(&self, entry: &LedgerEntry) -> bool {
        if self.direction.is_some_and(|d| d != entry.direction) {
            return false;
        }
        match self.due_on_or_before {
            Some(limit) => entry.due_date.is_some_and(|due| due <= limit),
            None => true,
        }
    }
}

/// Read access to ledger entries and their payment events.
pub trait EntryReader {
    /// Entries needing reconciliation.
    fn entries(&self, filter: &EntryFilter) -> Vec<LedgerEntry>;

    /// Payment events recorded against one entry.
    fn events_for(&self, entry: &EntryId) -> Vec<PaymentEvent>;
}

/// Atomic persistence of reconciliation results.
pub trait ResultWriter {
    /// Persist the new paid/remaining/status of one entry.
    fn commit(&mut self, result: &ReconciliationResult) -> Result<(), StoreError>;
}

/// Candidates eligible for identity resolution.
pub trait CandidateLookup {
    /// Clients for receivables, suppliers for payables.
    fn candidates(&self, direction: Direction) -> Vec<CounterpartyCandidate>;
}

/// Translation of legacy entry references into canonical entries.
pub trait LegacyMapping {
    /// Look up the canonical entry for a legacy reference.
    fn canonical_entry(&self, legacy_ref: &str) -> Option<EntryId>;
}

/// Creation of payment events.
pub trait EventStore {
    /// Check whether an event with this legacy identifier exists under `entry`.
    fn has_legacy_event(&self, entry: &EntryId, legacy_id: &str) -> bool;

    /// Persist a new event.
    fn insert_event(&mut self, event: PaymentEvent) -> Result<(), StoreError>;
}

/// Counterparty references on entries and their parent records.
pub trait CounterpartyStore {
    /// The counterparty already resolved on a parent record, if any.
    fn parent_counterparty(&self, parent: &ParentId) -> Option<CounterpartyId>;

    /// Persist a counterparty reference on an entry.
    fn assign_counterparty(
        &mut self,
        entry: &EntryId,
        counterparty: &CounterpartyId,
    ) -> Result<(), StoreError>;
}

/// In-memory implementation of every storage seam.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryStore {
    /// Ledger entries, in insertion order.
    #[serde(default)]
    pub entries: Vec<LedgerEntry>,
    /// Payment events, in insertion order.
    #[serde(default)]
    pub events: Vec<PaymentEvent>,
    /// Resolution candidates for receivables.
    #[serde(default)]
    pub clients: Vec<CounterpartyCandidate>,
    /// Resolution candidates for payables.
    #[serde(default)]
    pub suppliers: Vec<CounterpartyCandidate>,
    /// Explicit legacy reference → entry mapping.
    #[serde(default)]
    pub legacy_entries: BTreeMap<String, EntryId>,
    /// Counterparties resolved on parent records.
    #[serde(default)]
    pub parents: BTreeMap<ParentId, CounterpartyId>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry.
    #[must_use]
    pub fn with_entry(mut self, entry: LedgerEntry) -> Self {
        self.entries.push(entry);
        self
    }

    /// Add a payment event.
    #[must_use]
    pub fn with_event(mut self, event: PaymentEvent) -> Self {
        self.events.push(event);
        self
    }

    /// Add a client candidate.
    #[must_use]
    pub fn with_client(mut self, candidate: CounterpartyCandidate) -> Self {
        self.clients.push(candidate);
        self
    }

    /// Add a supplier candidate.
    #[must_use]
    pub fn with_supplier(mut self, candidate: CounterpartyCandidate) -> Self {
        self.suppliers.push(candidate);
        self
    }

    /// Map a legacy reference to an entry.
    #[must_use]
    pub fn with_legacy_entry(
        mut self,
        legacy_ref: impl Into<String>,
        entry: impl Into<EntryId>,
    ) -> Self {
        self.legacy_entries.insert(legacy_ref.into(), entry.into());
        self
    }

    /// Record the counterparty of a parent record.
    #[must_use]
    pub fn with_parent(
        mut self,
        parent: impl Into<ParentId>,
        counterparty: impl Into<CounterpartyId>,
    ) -> Self {
        self.parents.insert(parent.into(), counterparty.into());
        self
    }

    /// Look up an entry by id.
    #[must_use]
    pub fn entry(&self, id: &EntryId) -> Option<&LedgerEntry> {
        self.entries.iter().find(|e| &e.id == id)
    }

    fn entry_mut(&mut self, id: &EntryId) -> Result<&mut LedgerEntry, StoreError> {
        self.entries
            .iter_mut()
            .find(|e| &e.id == id)
            .ok_or_else(|| StoreError::UnknownEntry(id.clone()))
    }
}

impl EntryReader for MemoryStore {
    fn entries(&self, filter: &EntryFilter) -> Vec<LedgerEntry> {
        self.entries
            .iter()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect()
    }

    fn events_for(&self, entry: &EntryId) -> Vec<PaymentEvent> {
        self.events
            .iter()
            .filter(|e| &e.entry_id == entry)
            .cloned()
            .collect()
    }
}

impl ResultWriter for MemoryStore {
    fn commit(&mut self, result: &ReconciliationResult) -> Result<(), StoreError> {
        let entry = self.entry_mut(&result.entry_id)?;
        result.apply_to(entry);
        Ok(())
    }
}

impl CandidateLookup for MemoryStore {
    fn candidates(&self, direction: Direction) -> Vec<CounterpartyCandidate> {
        match direction {
            Direction::Receivable => self.clients.clone(),
            Direction::Payable => self.suppliers.clone(),
        }
    }
}

impl LegacyMapping for MemoryStore {
    fn canonical_entry(&self, legacy_ref: &str) -> Option<EntryId> {
        if let Some(id) = self.legacy_entries.get(legacy_ref) {
            return Some(id.clone());
        }
        self.entries
            .iter()
            .find(|e| e.legacy_id.as_deref() == Some(legacy_ref))
            .map(|e| e.id.clone())
    }
}

impl EventStore for MemoryStore {
    fn has_legacy_event(&self, entry: &EntryId, legacy_id: &str) -> bool {
        self.events
            .iter()
            .any(|e| &e.entry_id == entry && e.legacy_id.as_deref() == Some(legacy_id))
    }

    fn insert_event(&mut self, event: PaymentEvent) -> Result<(), StoreError> {
        if self.entry(&event.entry_id).is_none() {
            return Err(StoreError::UnknownEntry(event.entry_id));
        }
        if self.events.iter().any(|e| e.id == event.id) {
            return Err(StoreError::Duplicate(event.id.to_string()));
        }
        if let Some(legacy_id) = &event.legacy_id {
            if self.has_legacy_event(&event.entry_id, legacy_id) {
                return Err(StoreError::Duplicate(legacy_id.clone()));
            }
        }
        self.events.push(event);
        Ok(())
    }
}

impl CounterpartyStore for MemoryStore {
    fn parent_counterparty(&self, parent: &ParentId) -> Option<CounterpartyId> {
        self.parents.get(parent).cloned()
    }

    fn assign_counterparty(
        &mut self,
        entry: &EntryId,
        counterparty: &CounterpartyId,
    ) -> Result<(), StoreError> {
        let entry = self.entry_mut(entry)?;
        entry.counterparty = Some(counterparty.clone());
        Ok(())
    }
}
