//! tally-reconcile - Recompute derived fields for every ledger entry.
//!
//! # Usage
//!
//! ```bash
//! tally-reconcile ledger.json
//! tally-reconcile ledger.json --as-of 2024-06-30 --direction receivable --write
//! ```

use crate::cmd::completions::ShellType;
use crate::cmd::{init_tracing, OutputFormat};
use crate::dataset;
use crate::report;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use tally_core::{Direction, EntryFilter};
use tally_reconcile::{reconcile_store, BatchOptions, BatchReport, DEFAULT_SAMPLE_LIMIT};

/// Recompute paid, remaining and status for ledger entries.
#[derive(Parser, Debug)]
#[command(name = "tally-reconcile")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// The dataset file
    #[arg(value_name = "DATASET", required_unless_present = "generate_completions")]
    pub dataset: Option<PathBuf>,

    /// Generate shell completions and exit
    #[arg(long, value_name = "SHELL", hide = true)]
    pub generate_completions: Option<ShellType>,

    /// Evaluate due dates as of this date (default: today)
    #[arg(long, value_name = "YYYY-MM-DD")]
    pub as_of: Option<NaiveDate>,

    /// Only reconcile receivables or payables
    #[arg(long, value_name = "DIRECTION")]
    pub direction: Option<Direction>,

    /// Only reconcile entries due on or before this date
    #[arg(long, value_name = "YYYY-MM-DD")]
    pub due_before: Option<NaiveDate>,

    /// Number of changed entries to list
    #[arg(long, value_name = "N", default_value_t = DEFAULT_SAMPLE_LIMIT)]
    pub samples: usize,

    /// Size of the worker pool (default: one per core)
    #[arg(long, value_name = "N", conflicts_with = "sequential")]
    pub threads: Option<usize>,

    /// Reconcile on the current thread only
    #[arg(long)]
    pub sequential: bool,

    /// Save changes back to the dataset
    #[arg(short, long)]
    pub write: bool,

    /// Output format (text or json)
    #[arg(long, short = 'f', value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Show debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Suppress the report (just use exit code)
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    fn filter(&self) -> EntryFilter {
        let mut filter = EntryFilter::all();
        if let Some(direction) = self.direction {
            filter = filter.with_direction(direction);
        }
        if let Some(date) = self.due_before {
            filter = filter.with_due_on_or_before(date);
        }
        filter
    }

    fn options(&self) -> BatchOptions {
        let mut options = BatchOptions::new()
            .with_sample_limit(self.samples)
            .with_parallel(!self.sequential);
        if let Some(date) = self.as_of {
            options = options.with_as_of(date);
        }
        if let Some(threads) = self.threads {
            options = options.with_threads(threads);
        }
        options
    }
}

/// Reconcile the dataset and write the report to `out`.
///
/// The dataset is saved only with `--write`, and only when something changed.
pub fn execute<W: Write>(args: &Args, out: &mut W) -> Result<BatchReport> {
    let path = args.dataset.as_ref().context("DATASET is required")?;
    let mut store = dataset::load_store(path)?;

    let report = reconcile_store(&mut store, &args.filter(), &args.options());

    if args.write && report.updated_count > 0 {
        dataset::save_store(path, &store)?;
    }

    if !args.quiet {
        report::write_batch_report(out, &report, args.format, args.write)?;
        out.flush()?;
    }
    Ok(report)
}

fn run(args: &Args) -> Result<ExitCode> {
    let mut stdout = io::stdout().lock();
    let report = execute(args, &mut stdout)?;

    Ok(if report.has_errors() {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    })
}

/// Main entry point for the reconcile command.
pub fn main() -> ExitCode {
    main_with_name("tally-reconcile")
}

/// Main entry point with custom binary name.
pub fn main_with_name(bin_name: &str) -> ExitCode {
    let args = Args::parse();

    if let Some(shell) = args.generate_completions {
        crate::cmd::completions::generate_completions::<Args>(shell, bin_name);
        return ExitCode::SUCCESS;
    }

    init_tracing(args.verbose);

    match run(&args) {
        Ok(exit_code) => exit_code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(2)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use tally_core::{EntryId, EntryStatus, LedgerEntry, MemoryStore, PaymentEvent, PaymentMethod};

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    fn write_dataset(dir: &tempfile::TempDir) -> PathBuf {
        let path = dir.path().join("ledger.json");
        let store = MemoryStore::new()
            .with_entry(LedgerEntry::new("E1", Direction::Receivable, dec!(100)))
            .with_entry(
                LedgerEntry::new("E2", Direction::Payable, dec!(50))
                    .with_due_date(date(2024, 1, 1)),
            )
            .with_event(
                PaymentEvent::new("P1", "E1", dec!(100), date(2024, 1, 5), PaymentMethod::Card)
                    .unwrap(),
            );
        dataset::save_store(&path, &store).unwrap();
        path
    }

    fn args(extra: &[&str]) -> Args {
        let base = ["tally-reconcile", "--as-of", "2024-06-15"];
        Args::try_parse_from(base.iter().chain(extra)).unwrap()
    }

    fn reconcile(args: &Args) -> (BatchReport, String) {
        let mut out = Vec::new();
        let report = execute(args, &mut out).unwrap();
        (report, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from([
            "tally-reconcile",
            "ledger.json",
            "--direction",
            "payable",
            "--due-before",
            "2024-06-30",
            "--threads",
            "4",
        ])
        .unwrap();

        assert_eq!(args.direction, Some(Direction::Payable));
        assert_eq!(args.filter().due_on_or_before, Some(date(2024, 6, 30)));
        assert_eq!(args.options().threads, Some(4));
        assert!(args.options().parallel);
    }

    #[test]
    fn test_quiet_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_dataset(&dir);
        let path_arg = path.to_string_lossy().to_string();

        let (_, text) = reconcile(&args(&[path_arg.as_str(), "-q"]));
        assert!(text.is_empty());
    }

    #[test]
    fn test_sequential_conflicts_with_threads() {
        let parsed = Args::try_parse_from([
            "tally-reconcile",
            "ledger.json",
            "--sequential",
            "--threads",
            "2",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_without_write_leaves_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_dataset(&dir);
        let before = std::fs::read_to_string(&path).unwrap();

        let path_arg = path.to_string_lossy().to_string();
        let (report, text) = reconcile(&args(&[path_arg.as_str()]));

        assert_eq!(report.updated_count, 2);
        assert!(text.contains("rerun with --write"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
    }

    #[test]
    fn test_write_commits_and_rerun_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_dataset(&dir);
        let path_arg = path.to_string_lossy().to_string();

        reconcile(&args(&[path_arg.as_str(), "--write"]));
        let store = dataset::load_store(&path).unwrap();
        assert_eq!(store.entry(&EntryId::from("E1")).unwrap().status, EntryStatus::Paid);
        assert_eq!(store.entry(&EntryId::from("E2")).unwrap().status, EntryStatus::Overdue);

        let after_first = std::fs::read_to_string(&path).unwrap();
        let (second, _) = reconcile(&args(&[path_arg.as_str(), "--write"]));
        assert_eq!(second.updated_count, 0);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), after_first);
    }

    #[test]
    fn test_invalid_entry_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        let store =
            MemoryStore::new().with_entry(LedgerEntry::new("E1", Direction::Receivable, dec!(-5)));
        dataset::save_store(&path, &store).unwrap();

        let path_arg = path.to_string_lossy().to_string();
        let (report, text) = reconcile(&args(&[path_arg.as_str(), "--format", "json"]));

        assert!(report.has_errors());
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["errors"][0]["kind"], "VALIDATION");
    }
}
