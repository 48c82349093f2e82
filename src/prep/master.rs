//! Build the master table: deals with their price window, announce-date
//! financial metrics and prior-year emissions.

use super::merge::MeanAcc;
use super::{read_table, require_columns, write_table};
use crate::table::dates::{format_iso, parse_date};
use crate::table::{fmt_plain, Table};
use anyhow::Result;
use chrono::{Datelike, NaiveDate};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

/// Columns ahead of the price window.
const LEADING_COLUMNS: &[&str] = &[
    "Deal Announce Date",
    "Previous Year",
    "Acquirer Ticker",
    "Acquirer Name",
    "Target Name",
    "Seller Name",
    "Announced Total Value (mil.)",
    "TV/EBITDA",
];

/// Columns after the price window.
const TRAILING_COLUMNS: &[&str] = &[
    "Market_Cap_AD_mil",
    "Debt_to_Equity",
    "ROA_percent",
    "Acquirer_GHG_Emissions",
    "Deal Status",
];

fn normalize_ticker(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// Financial metrics per (ticker, announce date). The first row of a key wins.
pub fn metrics_by_deal(metrics: &Table) -> Result<HashMap<(String, NaiveDate), [String; 3]>> {
    require_columns(
        metrics,
        &["Ticker", "Announce Date", "Market_Cap_mil", "Debt_to_Equity", "ROA_percent"],
        "financial metrics",
    )?;

    let mut by_deal = HashMap::new();
    for row in metrics.rows() {
        let ticker = normalize_ticker(row.get("Ticker").unwrap_or_default());
        let Some(date) = row.get("Announce Date").and_then(parse_date) else {
            debug!("Skipping metrics row {} with unreadable date", row.index() + 1);
            continue;
        };
        if ticker.is_empty() {
            continue;
        }
        let values = ["Market_Cap_mil", "Debt_to_Equity", "ROA_percent"]
            .map(|c| row.get(c).unwrap_or_default().to_string());
        by_deal.entry((ticker, date)).or_insert(values);
    }
    Ok(by_deal)
}

/// Mean emissions per (ticker, reporting year).
pub fn emissions_by_year(ghg: &Table) -> Result<HashMap<(String, i32), f64>> {
    require_columns(ghg, &["Ticker", "periodenddate", "GHG_Emissions"], "GHG data")?;

    let mut acc: HashMap<(String, i32), MeanAcc> = HashMap::new();
    for row in ghg.rows() {
        let ticker = normalize_ticker(row.get("Ticker").unwrap_or_default());
        let Some(period) = row.get("periodenddate").and_then(parse_date) else {
            continue;
        };
        acc.entry((ticker, period.year()))
            .or_default()
            .add(row.get_f64("GHG_Emissions"));
    }

    Ok(acc
        .into_iter()
        .filter_map(|(key, a)| a.mean().map(|m| (key, m)))
        .collect())
}

/// Price window columns of the deal table, in their original order.
fn window_columns(deals: &Table) -> Vec<&str> {
    deals
        .headers()
        .iter()
        .map(String::as_str)
        .filter(|h| h.starts_with("T_minus_") || h.starts_with("T_plus_"))
        .collect()
}

/// Left-join metrics on (ticker, announce date) and emissions on the
/// year before the announcement. Every deal is kept.
pub fn build_master(deals: &Table, metrics: &Table, ghg: &Table) -> Result<(Table, usize)> {
    let mut deals = deals.clone();
    deals.rename_columns(&[
        ("Announce Date", "Deal Announce Date"),
        ("Ticker", "Acquirer Ticker"),
    ]);
    require_columns(&deals, &["Deal Announce Date", "Acquirer Ticker"], "M&A data")?;

    let metrics = metrics_by_deal(metrics)?;
    let emissions = emissions_by_year(ghg)?;

    let mut matched = 0;
    for row in 0..deals.len() {
        let ticker = normalize_ticker(deals.get(row, "Acquirer Ticker").unwrap_or_default());
        deals.set(row, "Acquirer Ticker", ticker.clone());

        let Some(date) = deals.get(row, "Deal Announce Date").and_then(parse_date) else {
            continue;
        };
        let previous = date.year() - 1;
        deals.set(row, "Deal Announce Date", format_iso(date));
        deals.set(row, "Previous Year", previous.to_string());

        if let Some([cap, de, roa]) = metrics.get(&(ticker.clone(), date)) {
            matched += 1;
            deals.set(row, "Market_Cap_AD_mil", cap.clone());
            deals.set(row, "Debt_to_Equity", de.clone());
            deals.set(row, "ROA_percent", roa.clone());
        }
        let ghg = emissions.get(&(ticker, previous)).copied();
        deals.set(row, "Acquirer_GHG_Emissions", fmt_plain(ghg));
    }

    let mut order: Vec<&str> = LEADING_COLUMNS.to_vec();
    order.extend(window_columns(&deals));
    order.extend_from_slice(TRAILING_COLUMNS);
    Ok((deals.select_or_empty(&order), matched))
}

/// Row counts reported after building the master table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MasterSummary {
    pub deals: usize,
    pub with_metrics: usize,
}

pub fn run(deals: &Path, metrics: &Path, ghg: &Path, output: &Path) -> Result<MasterSummary> {
    let deal_table = read_table(deals)?;
    let metrics_table = read_table(metrics)?;
    let ghg_table = read_table(ghg)?;
    info!(
        "Loaded {} deals, {} metrics rows, {} GHG rows",
        deal_table.len(),
        metrics_table.len(),
        ghg_table.len()
    );

    let (master, matched) = build_master(&deal_table, &metrics_table, &ghg_table)?;
    write_table(&master, output)?;

    for c in master.completeness() {
        debug!("{}: {} non-null ({:.1}%)", c.column, c.non_null, c.percent);
    }

    Ok(MasterSummary {
        deals: master.len(),
        with_metrics: matched,
    })
}
