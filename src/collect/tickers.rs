//! Company name to ticker symbol resolution.

use super::Fetcher;
use crate::market::ticker::TICKER_NOT_FOUND;
use crate::table::Table;
use anyhow::{Context, Result};
use std::collections::HashSet;
use std::path::Path;
use tracing::{info, warn};

pub const COMPANY_COLUMN: &str = "Company Name";
pub const TICKER_COLUMN: &str = "Ticker";

/// Counts reported after a lookup run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickerSummary {
    pub resolved: usize,
    pub not_found: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Look up one company, mapping failures to the marker strings stored in the output.
pub async fn resolve_ticker(fetcher: &Fetcher<'_>, company: &str) -> String {
    let what = format!("ticker lookup for {}", company);
    match fetcher
        .policy
        .retry(&what, || fetcher.source.lookup_symbol(company))
        .await
    {
        Ok(Some(symbol)) => symbol,
        Ok(None) => TICKER_NOT_FOUND.to_string(),
        Err(e) => {
            warn!("Error retrieving ticker for {}: {}", company, e);
            format!("Error: {}", e)
        }
    }
}

/// Resolve every company in `input`, appending results to `output` one row at a time.
///
/// Companies already present in `output` are skipped, so an interrupted run
/// can be restarted.
pub async fn fetch_tickers(fetcher: &Fetcher<'_>, input: &Path, output: &Path) -> Result<TickerSummary> {
    let companies = Table::read_csv(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    companies
        .require_column(COMPANY_COLUMN)
        .with_context(|| format!("{} has no company names", input.display()))?;

    let mut results = if output.exists() {
        Table::read_csv(output)
            .with_context(|| format!("Failed to read existing results {}", output.display()))?
            .select_or_empty(&[COMPANY_COLUMN, TICKER_COLUMN])
    } else {
        Table::new([COMPANY_COLUMN, TICKER_COLUMN])
    };

    let mut done: HashSet<String> = results
        .column_str(COMPANY_COLUMN)
        .into_iter()
        .flatten()
        .map(str::to_string)
        .collect();

    let mut summary = TickerSummary::default();
    let pb = fetcher.progress_bar(companies.len(), "Resolving tickers");

    for row in companies.rows() {
        pb.inc(1);
        let Some(company) = row.get(COMPANY_COLUMN) else {
            continue;
        };
        if !done.insert(company.to_string()) {
            summary.skipped += 1;
            continue;
        }

        let ticker = resolve_ticker(fetcher, company).await;
        if ticker == TICKER_NOT_FOUND {
            summary.not_found += 1;
        } else if ticker.starts_with("Error:") {
            summary.failed += 1;
        } else {
            summary.resolved += 1;
        }
        info!("Processed {} - Ticker: {}", company, ticker);

        results.push_row(vec![company.to_string(), ticker]);
        results
            .write_csv(output)
            .with_context(|| format!("Failed to write {}", output.display()))?;
    }

    pb.finish_and_clear();
    Ok(summary)
}
