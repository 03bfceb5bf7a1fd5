//! Rendering reports as text or JSON.

use crate::cmd::OutputFormat;
use serde::Serialize;
use std::io::{self, Write};
use tally_backfill::{AssignedVia, Assignment, BackfillReport, ItemOutcome, Summary, SyncAction};
use tally_core::PaymentEvent;
use tally_reconcile::BatchReport;

/// One-line description of a completed backfill item.
pub trait Describe {
    /// Describe the item.
    fn describe(&self) -> String;
}

impl Describe for Assignment {
    fn describe(&self) -> String {
        match &self.via {
            AssignedVia::Parent { parent } => {
                format!("{} (from parent {parent})", self.counterparty)
            }
            AssignedVia::Resolver { rule } => format!("{} (matched by {rule})", self.counterparty),
        }
    }
}

impl Describe for PaymentEvent {
    fn describe(&self) -> String {
        format!(
            "{} {} on {} -> {}",
            self.amount, self.method, self.date, self.entry_id
        )
    }
}

impl Describe for SyncAction {
    fn describe(&self) -> String {
        match self {
            Self::Inserted => "insert".to_string(),
            Self::Updated => "update".to_string(),
        }
    }
}

#[derive(Serialize)]
struct JsonBackfill<'a, T> {
    summary: Summary,
    #[serde(flatten)]
    report: &'a BackfillReport<T>,
}

/// Write a reconciliation report.
pub fn write_batch_report<W: Write>(
    out: &mut W,
    report: &BatchReport,
    format: OutputFormat,
    written: bool,
) -> io::Result<()> {
    if format == OutputFormat::Json {
        serde_json::to_writer_pretty(&mut *out, report)?;
        return writeln!(out);
    }

    writeln!(out, "Reconciliation as of {}", report.as_of)?;
    writeln!(
        out,
        "  {} processed: {} updated, {} unchanged, {} errors",
        report.processed(),
        report.updated_count,
        report.unchanged_count,
        report.error_count
    )?;
    writeln!(
        out,
        "  owed {}, paid {}, remaining {}",
        report.total_owed, report.total_paid, report.total_remaining
    )?;

    if !report.samples.is_empty() {
        writeln!(out)?;
        writeln!(out, "Changed entries (first {}):", report.samples.len())?;
        for result in &report.samples {
            writeln!(
                out,
                "  {}: {} -> {}, paid {} -> {}, remaining {} -> {}",
                result.entry_id,
                result.previous_status,
                result.new_status,
                result.previous_paid,
                result.new_paid,
                result.previous_remaining,
                result.new_remaining
            )?;
        }
    }

    if !report.errors.is_empty() {
        writeln!(out)?;
        writeln!(out, "Errors:")?;
        for failure in &report.errors {
            writeln!(out, "  {failure}")?;
        }
    }

    if !report.warnings.is_empty() {
        writeln!(out)?;
        writeln!(out, "Warnings:")?;
        for warning in &report.warnings {
            writeln!(out, "  {warning}")?;
        }
    }

    if !written && report.updated_count > 0 {
        writeln!(out)?;
        writeln!(out, "Nothing saved; rerun with --write to commit changes.")?;
    }
    Ok(())
}

/// Write a backfill report.
pub fn write_backfill_report<W: Write, T: Serialize + Describe>(
    out: &mut W,
    report: &BackfillReport<T>,
    format: OutputFormat,
) -> io::Result<()> {
    let summary = report.summary();
    if format == OutputFormat::Json {
        serde_json::to_writer_pretty(&mut *out, &JsonBackfill { summary, report })?;
        return writeln!(out);
    }

    writeln!(
        out,
        "{}{}: {} done, {} skipped, {} failed",
        report.operation,
        if report.dry_run { " (dry run)" } else { "" },
        summary.done,
        summary.skipped,
        summary.failed
    )?;
    for item in &report.items {
        let (label, detail) = match &item.outcome {
            ItemOutcome::Done(value) => ("done", value.describe()),
            ItemOutcome::Skipped(reason) => ("skipped", reason.to_string()),
            ItemOutcome::Failed(error) => ("FAILED", error.clone()),
        };
        writeln!(out, "  {:<8} {}: {detail}", label, item.key)?;
    }
    Ok(())
}
