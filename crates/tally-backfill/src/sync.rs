//! Cross-environment row sync.
//!
//! Rows are matched by key only. A source row whose key is absent from the
//! destination is inserted, and one whose key is present overwrites the
//! destination row. Nothing is ever deleted. There is no field-level merge
//! or conflict detection, so runs should be supervised.

use crate::{BackfillOptions, BackfillReport, ItemOutcome};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tally_core::StoreError;

/// A row with a stable identifying key.
pub trait SyncRow {
    /// The key rows are matched on.
    fn key(&self) -> &str;
}

/// Destination of a sync.
pub trait SyncTarget<R> {
    /// Check if a row with this key exists.
    fn contains(&self, key: &str) -> bool;

    /// Insert a new row.
    fn insert(&mut self, row: R) -> Result<(), StoreError>;

    /// Overwrite the row stored under `key`.
    fn update(&mut self, key: &str, row: R) -> Result<(), StoreError>;
}

/// A generic row: an `id` plus arbitrary fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    /// Row identifier.
    pub id: String,
    /// Remaining fields, copied verbatim.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Row {
    /// Create a row with no fields.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fields: Map::new(),
        }
    }

    /// Set a field.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }
}

impl SyncRow for Row {
    fn key(&self) -> &str {
        &self.id
    }
}

/// A planned write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", content = "row", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncOp<R> {
    /// The key is new to the destination.
    Insert(R),
    /// The key exists in the destination.
    Update(String, R),
}

impl<R> SyncOp<R> {
    /// The row being written.
    pub const fn row(&self) -> &R {
        match self {
            Self::Insert(row) | Self::Update(_, row) => row,
        }
    }
}

/// What was done with a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncAction {
    /// Inserted.
    Inserted,
    /// Overwritten.
    Updated,
}

/// An in-memory destination table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemoryTable<R> {
    rows: Vec<R>,
}

impl<R> Default for MemoryTable<R> {
    fn default() -> Self {
        Self { rows: Vec::new() }
    }
}

impl<R: SyncRow> MemoryTable<R> {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a table holding `rows`.
    #[must_use]
    pub const fn from_rows(rows: Vec<R>) -> Self {
        Self { rows }
    }

    /// All rows, in insertion order.
    #[must_use]
    pub fn rows(&self) -> &[R] {
        &self.rows
    }

    /// Look up a row by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&R> {
        self.rows.iter().find(|r| r.key() == key)
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl<R: SyncRow> SyncTarget<R> for MemoryTable<R> {
    fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    fn insert(&mut self, row: R) -> Result<(), StoreError> {
        if self.contains(row.key()) {
            return Err(StoreError::Duplicate(row.key().to_string()));
        }
        self.rows.push(row);
        Ok(())
    }

    fn update(&mut self, key: &str, row: R) -> Result<(), StoreError> {
        let slot = self
            .rows
            .iter_mut()
            .find(|r| r.key() == key)
            .ok_or_else(|| StoreError::rejected(key, "no row to update"))?;
        *slot = row;
        Ok(())
    }
}

/// Classify every source row as an insert or an update.
///
/// Inserts come first, then updates, each group in source order.
pub fn plan_sync<R, T>(source: &[R], destination: &T) -> Vec<SyncOp<R>>
where
    R: SyncRow + Clone,
    T: SyncTarget<R>,
{
    let (updates, inserts): (Vec<&R>, Vec<&R>) =
        source.iter().partition(|r| destination.contains(r.key()));

    inserts
        .into_iter()
        .map(|r| SyncOp::Insert(r.clone()))
        .chain(
            updates
                .into_iter()
                .map(|r| SyncOp::Update(r.key().to_string(), r.clone())),
        )
        .collect()
}

/// Apply a plan, isolating failures per row.
pub fn apply_sync<R, T>(
    destination: &mut T,
    plan: Vec<SyncOp<R>>,
    options: &BackfillOptions,
) -> BackfillReport<SyncAction>
where
    R: SyncRow,
    T: SyncTarget<R>,
{
    let mut report = BackfillReport::new("row-sync", options.dry_run);

    for op in plan {
        let key = op.row().key().to_string();
        let (action, result) = match op {
            SyncOp::Insert(_) if options.dry_run => (SyncAction::Inserted, Ok(())),
            SyncOp::Update(..) if options.dry_run => (SyncAction::Updated, Ok(())),
            SyncOp::Insert(row) => (SyncAction::Inserted, destination.insert(row)),
            SyncOp::Update(key, row) => (SyncAction::Updated, destination.update(&key, row)),
        };
        let outcome = match result {
            Ok(()) => ItemOutcome::Done(action),
            Err(e) => ItemOutcome::Failed(e.to_string()),
        };
        report.push(key, outcome);
    }

    report.finish()
}

/// Plan and apply a sync in one step.
pub fn sync_rows<R, T>(
    source: &[R],
    destination: &mut T,
    options: &BackfillOptions,
) -> BackfillReport<SyncAction>
where
    R: SyncRow + Clone,
    T: SyncTarget<R>,
{
    let plan = plan_sync(source, destination);
    apply_sync(destination, plan, options)
}
