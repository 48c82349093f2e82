//! Benchmark-adjusted (abnormal) returns per analysis group.

use crate::models::{AnalysisGroup, Classification};
use crate::stats::descriptive::winsorize;
use crate::table::dates::{parse_date, parse_dmy};
use crate::table::{fmt_opt, Table};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use regex::Regex;
use std::path::Path;
use tracing::{debug, warn};

pub const SALES_COLUMN: &str = "Annual_Sales (Million $)";
pub const INTENSITY_COLUMN: &str = "Carbon_Intensity";

/// Decimal places of the computed columns in the group CSVs.
const OUTPUT_DECIMALS: usize = 6;

/// Date columns bounding the event window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventWindow {
    pub days: u32,
    pub start_column: String,
    pub end_column: String,
}

impl EventWindow {
    pub fn new(days: u32) -> Self {
        Self {
            days,
            start_column: format!("T_minus_{}_Date", days),
            end_column: format!("T_plus_{}_Date", days),
        }
    }

    /// Window length from a `..._{N}day...` file name, else from a
    /// `T_minus_{N}_Date` column.
    pub fn detect(path: &Path, table: &Table) -> Result<Self> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let from_name = Regex::new(r"(\d+)day")?
            .captures(&name)
            .and_then(|c| c[1].parse().ok());

        let days = match from_name {
            Some(days) => {
                debug!("Detected {}-day event window from filename", days);
                days
            }
            None => {
                let column = Regex::new(r"^T_minus_(\d+)_Date$")?;
                table
                    .headers()
                    .iter()
                    .find_map(|h| column.captures(h).and_then(|c| c[1].parse().ok()))
                    .context("Could not determine the day range")?
            }
        };

        let window = Self::new(days);
        let missing = table.missing_columns(&[window.start_column.as_str(), window.end_column.as_str()]);
        if !missing.is_empty() {
            anyhow::bail!("Required columns are missing: {}", missing.join(", "));
        }
        Ok(window)
    }
}

/// Daily benchmark returns in percent, sorted by date.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Benchmark {
    daily: Vec<(NaiveDate, f64)>,
}

impl Benchmark {
    pub fn load(path: &Path, limit: f64) -> Result<Self> {
        let table = Table::read_csv(path)
            .with_context(|| format!("Failed to read benchmark {}", path.display()))?;
        Self::from_table(&table, limit)
    }

    /// Parse `Date` (`dd-mm-YYYY`) and `Daily_return (%)`, winsorize the
    /// returns and drop incomplete rows.
    pub fn from_table(table: &Table, limit: f64) -> Result<Self> {
        table.require_column("Date")?;
        table.require_column("Daily_return (%)")?;

        let returns = winsorize(&table.column_f64("Daily_return (%)"), limit, limit);
        let mut daily: Vec<(NaiveDate, f64)> = table
            .column_str("Date")
            .into_iter()
            .zip(returns)
            .filter_map(|(date, ret)| Some((date.and_then(parse_dmy)?, ret?)))
            .collect();
        daily.sort_by_key(|(date, _)| *date);
        Ok(Self { daily })
    }

    pub fn len(&self) -> usize {
        self.daily.len()
    }

    pub fn is_empty(&self) -> bool {
        self.daily.is_empty()
    }

    /// Compounded return in percent over `[start, end]`, both inclusive.
    pub fn cumulative_return(&self, start: NaiveDate, end: NaiveDate) -> Option<f64> {
        let from = self.daily.partition_point(|(d, _)| *d < start);
        let to = self.daily.partition_point(|(d, _)| *d <= end);
        if from >= to {
            return None;
        }
        let growth = self.daily[from..to]
            .iter()
            .fold(1.0, |acc, (_, r)| acc * (1.0 + r / 100.0));
        Some((growth - 1.0) * 100.0)
    }
}

/// One analysis group with its abnormal returns.
#[derive(Debug, Clone)]
pub struct GroupReturns {
    pub group: AnalysisGroup,
    /// Group rows plus the computed columns, ready to be written.
    pub table: Table,
    pub abnormal: Vec<Option<f64>>,
    /// Present when the deal table carries sales.
    pub weighted: Option<Vec<Option<f64>>>,
    /// Sales with missing values as zero; present with the sales column.
    pub sales: Option<Vec<f64>>,
    /// `ln(CI + 1)` with missing CI as zero; present with the CI column.
    pub log_intensity: Option<Vec<f64>>,
}

fn group_rows(deals: &Table, group: AnalysisGroup) -> Table {
    deals.filter(|row| {
        let acquirer = row.get("Acquirer_Classification").and_then(Classification::from_label);
        let target = row.get("Target_Classification").and_then(Classification::from_label);
        group.contains(acquirer, target)
    })
}

fn fmt_column(values: &[Option<f64>]) -> Vec<String> {
    values.iter().map(|v| fmt_opt(*v, OUTPUT_DECIMALS)).collect()
}

/// Compute benchmark, abnormal and weighted returns for one group.
///
/// Winsorizing happens within the group.
pub fn group_returns(
    deals: &Table,
    group: AnalysisGroup,
    window: &EventWindow,
    benchmark: &Benchmark,
    limit: f64,
) -> GroupReturns {
    let mut table = group_rows(deals, group);
    let n = table.len();

    let benchmark_returns: Vec<Option<f64>> = table
        .rows()
        .map(|row| {
            let start = row.get(&window.start_column).and_then(parse_date);
            let end = row.get(&window.end_column).and_then(parse_date);
            let (Some(start), Some(end)) = (start, end) else {
                warn!("Missing date for row {} in {}", row.index() + 1, group);
                return None;
            };
            let ret = benchmark.cumulative_return(start, end);
            if ret.is_none() {
                warn!("No benchmark data found for dates between {} and {}", start, end);
            }
            ret
        })
        .collect();

    let percent = winsorize(&table.column_f64("Percent_Return"), limit, limit);
    let raw_abnormal: Vec<Option<f64>> = percent
        .iter()
        .zip(&benchmark_returns)
        .map(|(p, b)| Some((*p)? - (*b)?))
        .collect();
    let abnormal = winsorize(&raw_abnormal, limit, limit);

    table.put_column("Benchmark_Return", fmt_column(&benchmark_returns));
    table.put_column("Percent_Return", fmt_column(&percent));
    table.put_column("Abnormal_Return", fmt_column(&abnormal));

    let (sales, weighted) = if table.has_column(SALES_COLUMN) {
        let sales: Vec<f64> = table
            .column_f64(SALES_COLUMN)
            .into_iter()
            .map(|s| s.unwrap_or(0.0))
            .collect();
        let total: f64 = sales.iter().sum();

        let (weights, weighted): (Vec<f64>, Vec<Option<f64>>) = if total > 0.0 {
            sales
                .iter()
                .zip(&abnormal)
                .map(|(s, ar)| (s / total, ar.map(|a| a * s / total)))
                .unzip()
        } else {
            abnormal.iter().map(|ar| (1.0 / n as f64, *ar)).unzip()
        };

        table.put_column("Weighted_Abnormal_Return", fmt_column(&weighted));
        let weights: Vec<Option<f64>> = weights.into_iter().map(Some).collect();
        table.put_column("Weight", fmt_column(&weights));
        (Some(sales), Some(weighted))
    } else {
        (None, None)
    };

    let log_intensity = table.has_column(INTENSITY_COLUMN).then(|| {
        let logs: Vec<f64> = table
            .column_f64(INTENSITY_COLUMN)
            .into_iter()
            .map(|ci| (ci.unwrap_or(0.0) + 1.0).ln())
            .collect();
        let cells: Vec<Option<f64>> = logs.iter().map(|v| Some(*v)).collect();
        table.put_column("Log_Carbon_Intensity", fmt_column(&cells));
        logs
    });

    GroupReturns {
        group,
        table,
        abnormal,
        weighted,
        sales,
        log_intensity,
    }
}

/// File name of a group's result table.
pub fn group_file_name(group: AnalysisGroup, days: u32) -> String {
    format!("{}_{}day_results.csv", group.slug(), days)
}
