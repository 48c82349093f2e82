//! Offline preparation steps: merging vendor exports, labelling deals,
//! normalizing the price table and dropping incomplete rows.

pub mod classify;
pub mod clean;
pub mod master;
pub mod merge;
pub mod standardize;

use crate::table::Table;
use anyhow::{Context, Result};
use std::path::Path;

pub(crate) fn read_table(path: &Path) -> Result<Table> {
    Table::read_csv(path).with_context(|| format!("Failed to read {}", path.display()))
}

pub(crate) fn write_table(table: &Table, path: &Path) -> Result<()> {
    table
        .write_csv(path)
        .with_context(|| format!("Failed to write {}", path.display()))
}

/// Fail with the names of all missing columns.
pub(crate) fn require_columns(table: &Table, required: &[&str], what: &str) -> Result<()> {
    let missing = table.missing_columns(required);
    if !missing.is_empty() {
        anyhow::bail!("Missing required columns in {}: {}", what, missing.join(", "));
    }
    Ok(())
}
