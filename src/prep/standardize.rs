//! Normalize the price table's column names and value formats.
//!
//! Vendor and hand-edited exports spell the same column many ways
//! (`t-10_price`, `T_MINUS_10_PRICE`, `tminus10 close price`...). Columns are
//! renamed in three passes: exact names, T-day patterns, then loose word
//! matches. Each target name is assigned at most once per pass after the
//! first.

use super::{read_table, write_table};
use crate::table::dates::{format_iso, parse_date, parse_date_dayfirst};
use crate::table::{fmt_plain, parse_f64, round_to, Table};
use anyhow::Result;
use regex::Regex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const DEFAULT_DAYS: u32 = 10;

/// Event window length encoded in a file name such as `prices_10day.csv`.
pub fn day_value_from_name(path: &Path) -> Option<u32> {
    let name = path.file_name()?.to_string_lossy();
    let re = Regex::new(r"(\d+)day").ok()?;
    re.captures(&name)?.get(1)?.as_str().parse().ok()
}

pub fn default_output(data_dir: &Path, days: u32) -> PathBuf {
    data_dir
        .join("3_processed")
        .join(format!("standardized_stock_data_{}day.csv", days))
}

/// Column names for one event window.
struct Layout {
    days: u32,
    mapping: Vec<(String, String)>,
    final_columns: Vec<String>,
}

impl Layout {
    fn new(days: u32) -> Self {
        let minus_date = format!("T_minus_{}_Date", days);
        let minus_price = format!("T_minus_{}_Price", days);
        let plus_date = format!("T_plus_{}_Date", days);
        let plus_price = format!("T_plus_{}_Price", days);

        let fixed = [
            ("announce date", "Announce Date"),
            ("reference_year", "Reference_Year"),
            ("reference year", "Reference_Year"),
            ("ticker", "Ticker"),
            ("acquirer name", "Acquirer Name"),
            ("annual_sales", "Annual_Sales"),
            ("acquirer_ghg_emissions", "Acquirer_GHG_Emissions"),
            ("carbon_intensity", "Carbon_Intensity"),
            ("acquirer_classification", "Acquirer_Classification"),
            ("target name", "Target Name"),
            ("target_classification", "Target_Classification"),
            ("seller name", "Seller Name"),
            ("announced total value (mil.)", "Announced Total Value (mil.)"),
            ("tv/ebitda", "TV/EBITDA"),
            ("percent_return", "Percent_Return"),
            ("deal status", "Deal Status"),
        ];
        let mut mapping: Vec<(String, String)> = fixed
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        for (key, target) in [
            (format!("t_minus_{}_date", days), &minus_date),
            (format!("t_minus_{}_price", days), &minus_price),
            (format!("t_plus_{}_date", days), &plus_date),
            (format!("t_plus_{}_price", days), &plus_price),
            (format!("t-{}_date", days), &minus_date),
            (format!("t-{}_price", days), &minus_price),
            (format!("t+{}_date", days), &plus_date),
            (format!("t+{}_price", days), &plus_price),
        ] {
            mapping.push((key, target.clone()));
        }

        let final_columns = [
            "Announce Date",
            "Reference_Year",
            "Ticker",
            "Acquirer Name",
            "Annual_Sales",
            "Acquirer_GHG_Emissions",
            "Carbon_Intensity",
            "Acquirer_Classification",
            "Target Name",
            "Target_Classification",
            "Seller Name",
            "Announced Total Value (mil.)",
            "TV/EBITDA",
            &minus_date,
            &minus_price,
            &plus_date,
            &plus_price,
            "Percent_Return",
            "Deal Status",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        Self {
            days,
            mapping,
            final_columns,
        }
    }

    fn minus(&self, field: &str) -> String {
        format!("T_minus_{}_{}", self.days, field)
    }

    fn plus(&self, field: &str) -> String {
        format!("T_plus_{}_{}", self.days, field)
    }

    /// T-day targets with their loose spellings, in matching order.
    fn patterns(&self) -> Vec<(String, Vec<Regex>)> {
        let n = self.days;
        [
            (self.minus("Date"), [format!("t[-_]{n}.*date"), format!("tminus{n}.*date")]),
            (self.minus("Price"), [format!("t[-_]{n}.*price"), format!("tminus{n}.*price")]),
            (self.plus("Date"), [format!("t[+_]{n}.*date"), format!("tplus{n}.*date")]),
            (self.plus("Price"), [format!("t[+_]{n}.*price"), format!("tplus{n}.*price")]),
        ]
        .into_iter()
        .map(|(target, pats)| {
            let compiled = pats.iter().filter_map(|p| Regex::new(p).ok()).collect();
            (target, compiled)
        })
        .collect()
    }
}

/// Work out the new name of every column, in header order.
fn rename_plan(headers: &[String], layout: &Layout) -> Vec<String> {
    let mut plan: Vec<Option<String>> = headers
        .iter()
        .map(|h| {
            let lower = h.to_lowercase();
            layout
                .mapping
                .iter()
                .find(|(key, _)| *key == lower)
                .map(|(_, target)| target.clone())
        })
        .collect();

    let assigned: HashSet<&String> = plan.iter().flatten().collect();
    let mut to_find: HashSet<String> = layout
        .final_columns
        .iter()
        .filter(|c| !assigned.contains(c))
        .cloned()
        .collect();

    let patterns = layout.patterns();
    for (idx, header) in headers.iter().enumerate() {
        if plan[idx].is_some() {
            continue;
        }
        let lower = header.to_lowercase();

        let by_pattern = patterns.iter().find(|(target, regexes)| {
            to_find.contains(target) && regexes.iter().any(|re| re.is_match(&lower))
        });
        if let Some((target, _)) = by_pattern {
            to_find.remove(target);
            plan[idx] = Some(target.clone());
            continue;
        }

        let loose = layout.mapping.iter().find(|(key, target)| {
            to_find.contains(target)
                && (lower.contains(key.as_str()) || key.split('_').any(|w| lower.contains(w)))
        });
        if let Some((_, target)) = loose {
            debug!("Matched column '{}' to '{}'", header, target);
            to_find.remove(target);
            plan[idx] = Some(target.clone());
        }
    }

    let mut seen = HashSet::new();
    plan.into_iter()
        .zip(headers)
        .enumerate()
        .map(|(i, (new, old))| {
            let name = new.unwrap_or_else(|| old.clone());
            if seen.insert(name.clone()) {
                name
            } else {
                format!("{}_dup{}", name, i)
            }
        })
        .collect()
}

fn round_column(table: &mut Table, column: &str, decimals: usize) {
    let values: Vec<String> = table
        .column_f64(column)
        .into_iter()
        .map(|v| fmt_plain(v.map(|x| round_to(x, decimals))))
        .collect();
    table.put_column(column, values);
}

/// Rewrite a date column as ISO dates, reparsing day-first when most cells fail.
fn normalize_dates(table: &mut Table, column: &str) {
    let raw: Vec<Option<String>> = table
        .column_str(column)
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect();

    let mut parsed: Vec<_> = raw.iter().map(|v| v.as_deref().and_then(parse_date)).collect();
    let failed = parsed.iter().filter(|d| d.is_none()).count();
    if failed as f64 > 0.5 * raw.len() as f64 {
        parsed = raw
            .iter()
            .map(|v| v.as_deref().and_then(parse_date_dayfirst))
            .collect();
    }

    let values = parsed
        .into_iter()
        .map(|d| d.map(format_iso).unwrap_or_default())
        .collect();
    table.put_column(column, values);
}

/// Standardize a price table for an N-day event window.
pub fn standardize(table: &Table, days: u32) -> Table {
    let layout = Layout::new(days);

    let mut renamed = table.clone();
    let plan = rename_plan(table.headers(), &layout);
    renamed.set_headers(plan);

    let order: Vec<&str> = layout.final_columns.iter().map(String::as_str).collect();
    let mut out = renamed.select_or_empty(&order);

    let rounding = [
        ("Annual_Sales".to_string(), 2),
        ("Acquirer_GHG_Emissions".to_string(), 2),
        ("Carbon_Intensity".to_string(), 4),
        ("Announced Total Value (mil.)".to_string(), 2),
        ("TV/EBITDA".to_string(), 2),
        (layout.minus("Price"), 2),
        (layout.plus("Price"), 2),
        ("Percent_Return".to_string(), 2),
    ];
    for (column, decimals) in &rounding {
        round_column(&mut out, column, *decimals);
    }

    for column in ["Announce Date".to_string(), layout.minus("Date"), layout.plus("Date")] {
        normalize_dates(&mut out, &column);
    }

    let minus_price = layout.minus("Price");
    let plus_price = layout.plus("Price");
    let minus_units = format!("{} ($)", minus_price);
    let plus_units = format!("{} ($)", plus_price);
    out.rename_columns(&[
        ("Annual_Sales", "Annual_Sales (Million $)"),
        ("Acquirer_GHG_Emissions", "Acquirer_GHG_Emissions (Metric Tonnes)"),
        (minus_price.as_str(), minus_units.as_str()),
        (plus_price.as_str(), plus_units.as_str()),
    ]);
    out
}

/// Standardize `input` and write it. Returns the output path and row count.
pub fn run(input: &Path, output: Option<&Path>, data_dir: &Path) -> Result<(PathBuf, usize)> {
    let days = day_value_from_name(input).unwrap_or(DEFAULT_DAYS);
    let output = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_output(data_dir, days));

    let table = read_table(input)?;
    info!("Standardizing {} rows for a {}-day window", table.len(), days);
    let standardized = standardize(&table, days);
    write_table(&standardized, &output)?;
    Ok((output, standardized.len()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_day_value_from_name() {
        assert_eq!(
            day_value_from_name(Path::new("data/master_data_with_stock_prices_5day.csv")),
            Some(5)
        );
        assert_eq!(day_value_from_name(Path::new("prices.csv")), None);
    }

    #[test]
    fn test_rename_passes() {
        let layout = Layout::new(10);
        let headers: Vec<String> = [
            "TICKER",
            "t-10_price",
            "T+10 Trading Date",
            "tplus10 close price",
            "Ticker",
            "misc",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        let plan = rename_plan(&headers, &layout);
        assert_eq!(plan[0], "Ticker");
        assert_eq!(plan[1], "T_minus_10_Price");
        assert_eq!(plan[2], "T_plus_10_Date");
        assert_eq!(plan[3], "T_plus_10_Price");
        assert_eq!(plan[4], "Ticker_dup4");
    }

    #[test]
    fn test_standardize_table() {
        let csv = "Announce Date,Ticker,annual_sales,Carbon_Intensity,t_minus_10_date,t_minus_10_price,t_plus_10_date,t_plus_10_price,percent_return,Extra\n\
                   15-03-2022,AAA,1234.567,0.123456,01-03-2022,10.005,29-03-2022,11,9.95,x\n\
                   16-03-2022,BBB,n/a,inf,02-03-2022,20.123,30-03-2022,19.5,-3.1,y\n";
        let table = Table::from_reader(csv.as_bytes()).unwrap();
        let out = standardize(&table, 10);

        assert_eq!(out.headers().len(), 19);
        assert_eq!(out.headers()[4], "Annual_Sales (Million $)");
        assert_eq!(out.headers()[14], "T_minus_10_Price ($)");
        assert!(!out.has_column("Extra"));

        assert_eq!(out.get(0, "Announce Date"), Some("2022-03-15"));
        assert_eq!(out.get(0, "T_plus_10_Date"), Some("2022-03-29"));
        assert_eq!(out.get(0, "Annual_Sales (Million $)"), Some("1234.57"));
        assert_eq!(out.get(0, "Carbon_Intensity"), Some("0.1235"));
        assert_eq!(out.get(1, "Annual_Sales (Million $)"), None);
        assert_eq!(out.get(1, "Carbon_Intensity"), None);
        assert_eq!(out.get(1, "Percent_Return"), Some("-3.1"));
        assert_eq!(out.get(0, "Seller Name"), None);
    }

    #[test]
    fn test_slash_dates_fall_back_to_day_first() {
        let csv = "Announce Date\n13/03/2022\n25/12/2021\n03/04/2022\n";
        let mut table = Table::from_reader(csv.as_bytes()).unwrap();
        normalize_dates(&mut table, "Announce Date");
        assert_eq!(table.get(0, "Announce Date"), Some("2022-03-13"));
        assert_eq!(table.get(2, "Announce Date"), Some("2022-04-03"));
    }
}
