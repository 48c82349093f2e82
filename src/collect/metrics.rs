//! Market capitalization and balance-sheet ratios at announcement.

use super::Fetcher;
use crate::market::ticker::clean_ticker;
use crate::market::{FinancialSnapshot, MarketError};
use crate::models::PriceStatus;
use crate::table::dates::{parse_date, parse_dmy};
use crate::table::{fmt_opt, round_to, Table};
use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate};
use std::path::Path;
use tracing::{info, warn};

pub const OUTPUT_COLUMNS: &[&str] = &[
    "Ticker",
    "Acquirer Name",
    "Announce Date",
    "Market_Cap_mil",
    "Debt_to_Equity",
    "ROA_percent",
    "Status",
];

/// Ratios computed for one deal.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DealMetrics {
    /// Millions of the listing currency.
    pub market_cap_mil: Option<f64>,
    pub debt_to_equity: Option<f64>,
    pub roa_percent: Option<f64>,
}

impl DealMetrics {
    /// Derive ratios from the announcement-day close and the latest statements.
    pub fn compute(close: Option<f64>, snapshot: &FinancialSnapshot) -> Self {
        let market_cap_mil = match (snapshot.shares_outstanding, close) {
            (Some(shares), Some(price)) if shares > 0.0 => Some(round_to(shares * price / 1e6, 2)),
            _ => None,
        };

        let debt_to_equity = match (snapshot.total_debt, snapshot.stockholders_equity) {
            (Some(debt), Some(equity)) if equity != 0.0 => Some(round_to(debt / equity, 2)),
            _ => None,
        };

        let roa_percent = match (snapshot.net_income, snapshot.total_assets) {
            (Some(income), Some(assets)) if assets != 0.0 => {
                Some(round_to(income / assets * 100.0, 2))
            }
            _ => None,
        };

        Self {
            market_cap_mil,
            debt_to_equity,
            roa_percent,
        }
    }
}

async fn metrics_for(
    fetcher: &Fetcher<'_>,
    symbol: &str,
    announce: NaiveDate,
) -> std::result::Result<DealMetrics, MarketError> {
    let end = announce + Duration::days(1);
    let what = format!("{} price on {}", symbol, announce);
    let close = match fetcher
        .policy
        .retry(&what, || fetcher.source.daily_history(symbol, announce, end))
        .await
    {
        Ok(bars) => bars.first().map(|b| b.close),
        Err(e) => {
            warn!("No price for {} on {}: {}", symbol, announce, e);
            None
        }
    };

    let what = format!("{} financial statements", symbol);
    let snapshot = fetcher
        .policy
        .retry(&what, || fetcher.source.financial_snapshot(symbol))
        .await?;

    Ok(DealMetrics::compute(close, &snapshot))
}

/// Fetch metrics for every deal, saving the output after each row.
///
/// Returns `(succeeded, failed)` row counts.
pub async fn fetch_metrics(fetcher: &Fetcher<'_>, input: &Path, output: &Path) -> Result<(usize, usize)> {
    let deals = Table::read_csv(input).with_context(|| format!("Failed to read {}", input.display()))?;
    let missing = deals.missing_columns(&["Ticker", "Acquirer Name", "Announce Date"]);
    if !missing.is_empty() {
        anyhow::bail!("{} is missing columns: {}", input.display(), missing.join(", "));
    }

    let mut metrics = deals.select_or_empty(OUTPUT_COLUMNS);
    let (mut succeeded, mut failed) = (0, 0);
    let pb = fetcher.progress_bar(metrics.len(), "Fetching financial metrics");

    for row in 0..metrics.len() {
        pb.inc(1);
        let raw_ticker = metrics.get(row, "Ticker").map(str::to_string);
        let Some(symbol) = raw_ticker.as_deref().and_then(clean_ticker) else {
            info!("Skipping missing ticker at row {}", row + 1);
            metrics.set(row, "Status", PriceStatus::InvalidTicker.to_string());
            failed += 1;
            continue;
        };

        let announce_raw = metrics.get(row, "Announce Date").unwrap_or_default();
        let Some(announce) = parse_dmy(announce_raw).or_else(|| parse_date(announce_raw)) else {
            metrics.set(row, "Status", PriceStatus::InvalidDate.to_string());
            failed += 1;
            continue;
        };

        match metrics_for(fetcher, &symbol, announce).await {
            Ok(m) => {
                metrics.set(row, "Market_Cap_mil", fmt_opt(m.market_cap_mil, 2));
                metrics.set(row, "Debt_to_Equity", fmt_opt(m.debt_to_equity, 2));
                metrics.set(row, "ROA_percent", fmt_opt(m.roa_percent, 2));
                metrics.set(row, "Status", PriceStatus::Success.to_string());
                succeeded += 1;
                info!("Successfully processed {}", symbol);
            }
            Err(e) => {
                warn!("Error processing {}: {}", symbol, e);
                metrics.set(row, "Status", PriceStatus::Error(e.to_string()).to_string());
                failed += 1;
            }
        }

        metrics
            .write_csv(output)
            .with_context(|| format!("Failed to write {}", output.display()))?;
    }

    pb.finish_and_clear();
    metrics
        .write_csv(output)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    Ok((succeeded, failed))
}
