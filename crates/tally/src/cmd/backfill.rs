//! tally-backfill - Run idempotent migration backfills.
//!
//! # Usage
//!
//! ```bash
//! tally-backfill counterparties ledger.json --write
//! tally-backfill resolve ledger.json --tax-id-placeholder 00000000 --dry-run
//! tally-backfill import-payments ledger.json legacy_payments.csv --write
//! tally-backfill sync staging_rows.json production_rows.json --write
//! ```
//!
//! Every subcommand reads its files, runs the backfill in memory and prints
//! the report. Files are only rewritten with `--write`. With `--dry-run` the
//! backfill itself writes nothing, so `--write` has no effect.

use crate::cmd::completions::ShellType;
use crate::cmd::{init_tracing, OutputFormat};
use crate::dataset;
use crate::report::{self, Describe};
use anyhow::Result;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use tally_backfill::{
    assign_resolved_counterparties, import_payments, propagate_counterparties, sync_rows,
    BackfillOptions, BackfillReport, LegacyCsvReader, MemoryTable, Row,
};
use tally_identity::{Resolver, ResolverOptions};
use tracing::warn;

/// Run idempotent migration backfills.
#[derive(Parser, Debug)]
#[command(name = "tally-backfill")]
#[command(author, version, about, long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Args {
    /// The backfill to run
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Generate shell completions and exit
    #[arg(long, value_name = "SHELL", hide = true, exclusive = true)]
    pub generate_completions: Option<ShellType>,

    /// Report what would change without changing anything
    #[arg(short = 'n', long, global = true)]
    pub dry_run: bool,

    /// Save changes back to the input files
    #[arg(short, long, global = true)]
    pub write: bool,

    /// Output format (text or json)
    #[arg(long, short = 'f', value_enum, default_value = "text", global = true)]
    pub format: OutputFormat,

    /// Show debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress the report (just use exit code)
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// Available backfills.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Copy each parent record's counterparty onto entries lacking one
    Counterparties {
        /// The dataset file
        dataset: PathBuf,
    },
    /// Resolve counterparties from legacy tax ids and names
    Resolve {
        /// The dataset file
        dataset: PathBuf,

        /// Extra tax id value that must never match (repeatable)
        #[arg(long, value_name = "VALUE")]
        tax_id_placeholder: Vec<String>,

        /// Extra name value that must never match (repeatable)
        #[arg(long, value_name = "VALUE")]
        name_placeholder: Vec<String>,
    },
    /// Import legacy payments as payment events
    ImportPayments {
        /// The dataset file
        dataset: PathBuf,

        /// Legacy payment records (.csv, or a JSON array)
        records: PathBuf,

        /// Date format of the CSV date column (strftime-style)
        #[arg(long, value_name = "FORMAT")]
        date_format: Option<String>,

        /// Decimal separator of the CSV amount column
        #[arg(long, value_name = "CHAR", default_value_t = '.')]
        decimal_separator: char,
    },
    /// Copy rows from one environment's table to another's
    Sync {
        /// Source rows (JSON array)
        source: PathBuf,

        /// Destination rows (JSON array)
        destination: PathBuf,
    },
}

impl Args {
    fn options(&self) -> BackfillOptions {
        BackfillOptions {
            dry_run: self.dry_run,
        }
    }

    fn persist(&self) -> bool {
        self.write && !self.dry_run
    }
}

/// Outcome of a backfill command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    /// Items done.
    pub done: usize,
    /// Items or input rows that failed.
    pub failed: usize,
}

/// Run the selected backfill and write the report to `out`.
pub fn execute<W: Write>(args: &Args, command: &Command, out: &mut W) -> Result<Outcome> {
    let options = args.options();

    match command {
        Command::Counterparties { dataset: path } => {
            let mut store = dataset::load_store(path)?;
            let report = propagate_counterparties(&mut store, &options);
            if args.persist() && report.done_count() > 0 {
                dataset::save_store(path, &store)?;
            }
            emit(args, out, &report, 0)
        }
        Command::Resolve {
            dataset: path,
            tax_id_placeholder,
            name_placeholder,
        } => {
            let mut resolver_options = ResolverOptions::default();
            for value in tax_id_placeholder {
                resolver_options = resolver_options.with_tax_id_placeholder(value.as_str());
            }
            for value in name_placeholder {
                resolver_options = resolver_options.with_name_placeholder(value.as_str());
            }
            let resolver = Resolver::with_options(resolver_options);

            let mut store = dataset::load_store(path)?;
            let report = assign_resolved_counterparties(&mut store, &resolver, &options);
            if args.persist() && report.done_count() > 0 {
                dataset::save_store(path, &store)?;
            }
            emit(args, out, &report, 0)
        }
        Command::ImportPayments {
            dataset: path,
            records,
            date_format,
            decimal_separator,
        } => {
            let mut csv_reader = LegacyCsvReader::new().with_decimal_separator(*decimal_separator);
            if let Some(format) = date_format {
                csv_reader = csv_reader.with_date_format(format.as_str());
            }

            let mut store = dataset::load_store(path)?;
            let legacy = dataset::load_legacy_payments(records, &csv_reader)?;
            for warning in &legacy.warnings {
                warn!(file = %records.display(), "skipped unreadable record: {warning}");
            }

            let report = import_payments(&mut store, &legacy.records, &options);
            if args.persist() && report.done_count() > 0 {
                dataset::save_store(path, &store)?;
            }
            emit(args, out, &report, legacy.warnings.len())
        }
        Command::Sync {
            source,
            destination,
        } => {
            let rows: Vec<Row> = dataset::load_json(source)?;
            let mut table: MemoryTable<Row> = dataset::load_json(destination)?;
            let report = sync_rows(&rows, &mut table, &options);
            if args.persist() && report.done_count() > 0 {
                dataset::save_json(destination, &table)?;
            }
            emit(args, out, &report, 0)
        }
    }
}

fn emit<W: Write, T: Serialize + Describe>(
    args: &Args,
    out: &mut W,
    report: &BackfillReport<T>,
    unreadable: usize,
) -> Result<Outcome> {
    if !args.quiet {
        report::write_backfill_report(out, report, args.format)?;
        if unreadable > 0 && args.format == OutputFormat::Text {
            writeln!(out, "  {unreadable} input record(s) could not be read")?;
        }
        out.flush()?;
    }
    Ok(Outcome {
        done: report.done_count(),
        failed: report.failed_count() + unreadable,
    })
}

fn run(args: &Args) -> Result<ExitCode> {
    let Some(command) = &args.command else {
        anyhow::bail!("a backfill subcommand is required");
    };
    let mut stdout = io::stdout().lock();
    let outcome = execute(args, command, &mut stdout)?;

    Ok(if outcome.failed > 0 {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    })
}

/// Main entry point for the backfill command.
pub fn main() -> ExitCode {
    main_with_name("tally-backfill")
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
