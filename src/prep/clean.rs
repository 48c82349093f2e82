//! Drop duplicate and incomplete deals and normalize value formats.

use super::{read_table, require_columns, write_table};
use crate::table::dates::{format_iso, parse_date};
use crate::table::{fmt_plain, round_to, ColumnCompleteness, Table};
use anyhow::Result;
use regex::Regex;
use std::path::Path;
use tracing::info;

pub const DEFAULT_REQUIRED: &[&str] = &[
    "T_minus_10_Date",
    "T_minus_10_Price",
    "T_plus_10_Date",
    "T_plus_10_Price",
    "Market_Cap_AD_mil",
    "ROA_percent",
    "Acquirer_GHG_Emissions",
];

const ANNOUNCE_COLUMNS: &[&str] = &["Deal Announce Date", "Announce Date"];
const METRIC_COLUMNS: &[&str] = &[
    "Market_Cap_AD_mil",
    "ROA_percent",
    "Announced Total Value (mil.)",
    "Acquirer_GHG_Emissions",
];
const STRING_COLUMNS: &[&str] = &["Acquirer Ticker", "Acquirer Name", "Target Name", "Deal Status"];

/// What a cleaning pass removed and what is left.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanReport {
    pub initial_rows: usize,
    pub duplicates_removed: usize,
    pub missing_before: Vec<(String, usize)>,
    pub incomplete_removed: usize,
    pub final_rows: usize,
    pub completeness: Vec<ColumnCompleteness>,
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Clean a deal table. Required columns must exist.
pub fn clean(mut table: Table, required: &[&str]) -> Result<(Table, CleanReport)> {
    require_columns(&table, required, "deal data")?;

    let initial_rows = table.len();
    let duplicates_removed = table.drop_duplicates();
    info!("Duplicate rows removed: {}", duplicates_removed);

    let missing_before: Vec<(String, usize)> = required
        .iter()
        .map(|c| (c.to_string(), table.missing_count(c)))
        .collect();
    for (column, missing) in &missing_before {
        info!("{}: {} missing values", column, missing);
    }

    let window_date = Regex::new(r"^T_(minus|plus)_\d+_Date$")?;
    let window_price = Regex::new(r"^T_(minus|plus)_\d+_Price$")?;
    let headers: Vec<String> = table.headers().to_vec();

    for column in &headers {
        if ANNOUNCE_COLUMNS.contains(&column.as_str()) || window_date.is_match(column) {
            let values = table
                .column_str(column)
                .into_iter()
                .map(|v| v.and_then(parse_date).map(format_iso).unwrap_or_default())
                .collect();
            table.put_column(column, values);
        } else if METRIC_COLUMNS.contains(&column.as_str()) || window_price.is_match(column) {
            let values = table
                .column_f64(column)
                .into_iter()
                .map(|v| fmt_plain(v.map(|x| round_to(x, 2))))
                .collect();
            table.put_column(column, values);
        }
    }

    for column in STRING_COLUMNS {
        table.map_column(column, |s| s.trim().to_string());
    }
    table.map_column("Deal Status", capitalize);

    let incomplete_removed = table.drop_missing(required);
    info!("Rows removed due to missing required values: {}", incomplete_removed);

    let report = CleanReport {
        initial_rows,
        duplicates_removed,
        missing_before,
        incomplete_removed,
        final_rows: table.len(),
        completeness: table.completeness(),
    };
    Ok((table, report))
}

pub fn run(input: &Path, output: &Path, required: &[String]) -> Result<CleanReport> {
    let table = read_table(input)?;
    info!("Initial number of rows: {}", table.len());

    let required: Vec<&str> = required.iter().map(String::as_str).collect();
    let (cleaned, report) = clean(table, &required)?;
    write_table(&cleaned, output)?;
    Ok(report)
}
