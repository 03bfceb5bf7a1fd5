//! Reading legacy payment exports from CSV.
//!
//! The export carries a header row naming at least `legacy_entry_ref`,
//! `legacy_payment_id`, `amount` and `date`. A `method` column is optional.
//! Column order does not matter.

use crate::LegacyPayment;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use tally_core::PaymentMethod;
use tracing::warn;

const REQUIRED_COLUMNS: [&str; 4] = ["legacy_entry_ref", "legacy_payment_id", "amount", "date"];

/// Records read from an export, plus the rows that could not be read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LegacyRecords {
    /// Parsed records, in file order.
    pub records: Vec<LegacyPayment>,
    /// One message per unreadable row.
    pub warnings: Vec<String>,
}

/// CSV reader for legacy payment exports.
#[derive(Debug, Clone)]
pub struct LegacyCsvReader {
    date_format: String,
    delimiter: u8,
    decimal_separator: char,
}

impl Default for LegacyCsvReader {
    fn default() -> Self {
        Self {
            date_format: "%Y-%m-%d".to_string(),
            delimiter: b',',
            decimal_separator: '.',
        }
    }
}

impl LegacyCsvReader {
    /// Create a reader for comma-separated files with ISO dates.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the chrono format of the date column.
    #[must_use]
    pub fn with_date_format(mut self, format: impl Into<String>) -> Self {
        self.date_format = format.into();
        self
    }

    /// Set the field delimiter.
    #[must_use]
    pub const fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Set the character that separates whole units from cents.
    ///
    /// Exports written with a `1.250,50` locale need `','`.
    #[must_use]
    pub const fn with_decimal_separator(mut self, separator: char) -> Self {
        self.decimal_separator = separator;
        self
    }

    /// Read an export file.
    pub fn read_file(&self, path: &Path) -> Result<LegacyRecords> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read file: {}", path.display()))?;
        self.read_str(&content)
    }

    /// Read export content.
    ///
    /// Fails only when the header is unreadable or lacks a required column.
    /// Bad rows become warnings.
    pub fn read_str(&self, content: &str) -> Result<LegacyRecords> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .delimiter(self.delimiter)
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());

        let header_map: HashMap<String, usize> = reader
            .headers()
            .context("Failed to read header row")?
            .iter()
            .enumerate()
            .map(|(i, h)| (h.to_lowercase(), i))
            .collect();
        for column in REQUIRED_COLUMNS {
            if !header_map.contains_key(column) {
                anyhow::bail!("Column '{column}' not found in header");
            }
        }

        let mut result = LegacyRecords::default();
        // the header is line 1
        let mut row_num = 1;

        for record in reader.records() {
            row_num += 1;
            let record = match record {
                Ok(r) => r,
                Err(e) => {
                    result.warnings.push(format!("Row {row_num}: parse error: {e}"));
                    continue;
                }
            };
            if record.iter().all(str::is_empty) {
                continue;
            }

            match self.parse_row(&record, &header_map) {
                Ok(payment) => result.records.push(payment),
                Err(e) => result.warnings.push(format!("Row {row_num}: {e:#}")),
            }
        }

        for warning in &result.warnings {
            warn!("{warning}");
        }
        Ok(result)
    }

    fn parse_row(
        &self,
        record: &csv::StringRecord,
        header_map: &HashMap<String, usize>,
    ) -> Result<LegacyPayment> {
        let legacy_entry_ref = required(record, header_map, "legacy_entry_ref")?;
        let legacy_payment_id = required(record, header_map, "legacy_payment_id")?;

        let amount_str = required(record, header_map, "amount")?;
        let amount = parse_legacy_amount(amount_str, self.decimal_separator)
            .with_context(|| format!("invalid amount '{amount_str}'"))?;

        let date_str = required(record, header_map, "date")?;
        let date = NaiveDate::parse_from_str(date_str, &self.date_format)
            .with_context(|| format!("invalid date '{date_str}'"))?;

        let method = match column(record, header_map, "method") {
            Some(value) => PaymentMethod::from_str(value)
                .map_err(anyhow::Error::msg)
                .with_context(|| format!("invalid method '{value}'"))?,
            None => PaymentMethod::default(),
        };

        Ok(LegacyPayment {
            legacy_entry_ref: legacy_entry_ref.to_string(),
            legacy_payment_id: legacy_payment_id.to_string(),
            amount,
            date,
            method,
        })
    }
}

/// Read legacy payments from CSV content with the default settings.
pub fn read_legacy_payments(content: &str) -> Result<LegacyRecords> {
    LegacyCsvReader::new().read_str(content)
}

/// Read legacy payments from a CSV file with the default settings.
pub fn read_legacy_payments_file(path: &Path) -> Result<LegacyRecords> {
    LegacyCsvReader::new().read_file(path)
}

fn column<'a>(
    record: &'a csv::StringRecord,
    header_map: &HashMap<String, usize>,
    name: &str,
) -> Option<&'a str> {
    header_map
        .get(name)
        .and_then(|&i| record.get(i))
        .filter(|v| !v.is_empty())
}

fn required<'a>(
    record: &'a csv::StringRecord,
    header_map: &HashMap<String, usize>,
    name: &str,
) -> Result<&'a str> {
    column(record, header_map, name).with_context(|| format!("missing {name}"))
}

/// Parse an export amount such as `500`, `$ 1,250.50` or `1.250,50 ARS`.
///
/// Letters and currency signs around the number are ignored, as is digit
/// grouping. Any other character makes the amount unreadable.
fn parse_legacy_amount(raw: &str, decimal_separator: char) -> Option<Decimal> {
    let mut number = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '0'..='9' => number.push(c),
            c if c == decimal_separator => number.push('.'),
            '-' if number.is_empty() => number.push('-'),
            '.' | ',' | '\'' | ' ' | '\u{a0}' => {}
            c if c.is_alphabetic() || matches!(c, '$' | '€' | '£') => {}
            _ => return None,
        }
    }
    if !number.bytes().any(|b| b.is_ascii_digit()) {
        return None;
    }
    Decimal::from_str(&number).ok()
}
