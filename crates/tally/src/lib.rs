//! Tally CLI tools.
//!
//! This crate provides command-line tools that drive the tally libraries
//! against a JSON dataset:
//!
//! - `tally-reconcile`: Recompute paid, remaining and status for every entry
//! - `tally-backfill`: Run migration backfills (counterparties, legacy payments, row sync)
//!
//! # Example Usage
//!
//! ```bash
//! tally-reconcile ledger.json --as-of 2024-06-30
//! tally-reconcile ledger.json --direction payable --write
//! tally-backfill import-payments ledger.json legacy_payments.csv --dry-run
//! tally-backfill sync staging_rows.json production_rows.json --write
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cmd;
pub mod dataset;
pub mod report;
