//! Reading and writing dataset files.
//!
//! A dataset is the JSON form of [`MemoryStore`]. Writes go to a sibling
//! temporary file first and are renamed into place, so an interrupted write
//! never leaves a truncated dataset behind.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::Path;
use tally_backfill::{LegacyCsvReader, LegacyPayment, LegacyRecords};
use tally_core::MemoryStore;

/// Load any JSON document.
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid JSON in {}", path.display()))
}

/// Save any value as pretty-printed JSON.
pub fn save_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut content = serde_json::to_string_pretty(value)
        .with_context(|| format!("Failed to serialize {}", path.display()))?;
    content.push('\n');

    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, content).with_context(|| format!("Failed to write {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("Failed to replace {}", path.display()))
}

/// Load a dataset.
pub fn load_store(path: &Path) -> Result<MemoryStore> {
    if !path.exists() {
        anyhow::bail!("file not found: {}", path.display());
    }
    load_json(path)
}

/// Save a dataset.
pub fn save_store(path: &Path, store: &MemoryStore) -> Result<()> {
    save_json(path, store)
}

/// Load legacy payment records.
///
/// `.csv` files go through `csv_reader`; anything else is read as a JSON array of records.
pub fn load_legacy_payments(path: &Path, csv_reader: &LegacyCsvReader) -> Result<LegacyRecords> {
    let is_csv = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
    if is_csv {
        return csv_reader.read_file(path);
    }

    let records: Vec<LegacyPayment> = load_json(path)?;
    Ok(LegacyRecords {
        records,
        warnings: Vec::new(),
    })
}
