//! Prior-year annual sales for each deal.

use super::Fetcher;
use crate::market::ticker::clean_ticker;
use crate::table::dates::{parse_date, parse_dmy};
use crate::table::{fmt_plain, Table};
use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate};
use std::path::Path;
use tracing::{info, warn};

pub const TICKER_COLUMN: &str = "Acquirer Ticker";
pub const DATE_COLUMN: &str = "Deal Announce Date";
pub const SALES_COLUMN: &str = "Annual_Sales";

/// Revenue of the newest fiscal period ending in or before `announce_year - 1`.
///
/// `revenue` is ordered newest first.
pub fn prior_year_revenue(revenue: &[(NaiveDate, f64)], announce: NaiveDate) -> Option<f64> {
    let previous_year = announce.year() - 1;
    revenue
        .iter()
        .find(|(period, _)| period.year() <= previous_year)
        .map(|(_, value)| *value)
}

async fn sales_for(fetcher: &Fetcher<'_>, symbol: &str, announce: Option<NaiveDate>) -> Option<f64> {
    let announce = announce?;
    let what = format!("annual revenue for {}", symbol);
    match fetcher
        .policy
        .retry(&what, || fetcher.source.annual_revenue(symbol))
        .await
    {
        Ok(revenue) => {
            let sales = prior_year_revenue(&revenue, announce);
            if sales.is_none() {
                warn!(
                    "Sales data not found for {} for the year {}",
                    symbol,
                    announce.year() - 1
                );
            }
            sales
        }
        Err(e) => {
            warn!("Error getting sales data for {}: {}", symbol, e);
            None
        }
    }
}

/// Fetch annual sales for every deal with a usable ticker.
///
/// Returns the number of rows written and how many of them have sales.
pub async fn fetch_sales(fetcher: &Fetcher<'_>, input: &Path, output: &Path) -> Result<(usize, usize)> {
    let deals = Table::read_csv(input).with_context(|| format!("Failed to read {}", input.display()))?;
    let missing = deals.missing_columns(&[TICKER_COLUMN, DATE_COLUMN]);
    if !missing.is_empty() {
        anyhow::bail!(
            "Required columns not found in {}: {}",
            input.display(),
            missing.join(", ")
        );
    }
    info!("Loaded {} rows from {}", deals.len(), input.display());

    let mut results = Table::new([TICKER_COLUMN, DATE_COLUMN, SALES_COLUMN]);
    let mut found = 0;
    let total = deals.len();

    for row in deals.rows() {
        let raw_ticker = row.get(TICKER_COLUMN);
        if let Some(symbol) = raw_ticker.and_then(clean_ticker) {
            let announce_raw = row.get(DATE_COLUMN).unwrap_or_default();
            let announce = parse_dmy(announce_raw).or_else(|| parse_date(announce_raw));
            info!("Processing {}/{}: {}", row.index() + 1, total, symbol);

            let sales = sales_for(fetcher, &symbol, announce).await;
            if sales.is_some() {
                found += 1;
            }
            results.push_row(vec![
                raw_ticker.unwrap_or_default().to_string(),
                announce_raw.to_string(),
                fmt_plain(sales),
            ]);
        }

        if (row.index() + 1) % 10 == 0 {
            info!("Processed {}/{} companies", row.index() + 1, total);
        }
    }

    results
        .write_csv(output)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    Ok((results.len(), found))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collect::test_fetcher;
    use crate::market::testing::{ymd, StaticSource};
    use tempfile::TempDir;

    #[test]
    fn test_prior_year_revenue() {
        let revenue = [
            (ymd(2022, 12, 31), 300.0),
            (ymd(2021, 12, 31), 200.0),
            (ymd(2020, 12, 31), 100.0),
        ];
        assert_eq!(prior_year_revenue(&revenue, ymd(2022, 6, 1)), Some(200.0));
        assert_eq!(prior_year_revenue(&revenue, ymd(2024, 1, 1)), Some(300.0));
        assert_eq!(prior_year_revenue(&revenue, ymd(2020, 6, 1)), None);
    }

    #[tokio::test]
    async fn test_fetch_sales() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("deals.csv");
        let output = dir.path().join("sales.csv");
        std::fs::write(
            &input,
            "Acquirer Ticker,Deal Announce Date\nBMW.SG,15-03-2022\n,01-01-2022\nXOM,15-03-2022\n",
        )
        .unwrap();

        let mut source = StaticSource::default();
        source
            .revenue
            .insert("BMW.DE".into(), vec![(ymd(2021, 12, 31), 111.5e9)]);
        let fetcher = test_fetcher(&source);

        let (rows, found) = fetch_sales(&fetcher, &input, &output).await.unwrap();
        assert_eq!((rows, found), (2, 1));

        let table = Table::read_csv(&output).unwrap();
        assert_eq!(table.get(0, "Acquirer Ticker"), Some("BMW.SG"));
        assert_eq!(table.get(0, "Annual_Sales"), Some("111500000000"));
        assert_eq!(table.get(1, "Acquirer Ticker"), Some("XOM"));
        assert_eq!(table.get(1, "Annual_Sales"), None);
    }
}
