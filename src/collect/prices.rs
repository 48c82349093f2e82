//! Closing prices around each announcement date.

use super::Fetcher;
use crate::market::ticker::clean_ticker;
use crate::market::trading::{clamp_to_today, close_on, nearest_trading_day, Direction};
use crate::models::PriceStatus;
use crate::table::dates::{format_iso, parse_date};
use crate::table::{fmt_f64, Table};
use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate};
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const ANNOUNCE_COLUMNS: &[&str] = &["Announce Date", "Announce_Date"];
pub const STATUS_COLUMN: &str = "Price_Status";
pub const RETURN_COLUMN: &str = "Percent_Return";

/// Calendar-day offsets of the event window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceWindow {
    pub days_before: u32,
    pub days_after: u32,
}

impl PriceWindow {
    pub fn before_date_column(&self) -> String {
        format!("T_minus_{}_Date", self.days_before)
    }

    pub fn before_price_column(&self) -> String {
        format!("T_minus_{}_Price", self.days_before)
    }

    pub fn after_date_column(&self) -> String {
        format!("T_plus_{}_Date", self.days_after)
    }

    pub fn after_price_column(&self) -> String {
        format!("T_plus_{}_Price", self.days_after)
    }

    /// Default output file inside the data directory.
    pub fn default_output(&self, data_dir: &Path) -> PathBuf {
        data_dir.join(format!(
            "2_interim/master_data_with_stock_prices_{}day.csv",
            self.days_after
        ))
    }
}

/// Prices fetched for one deal.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceRow {
    pub before: Option<(NaiveDate, f64)>,
    pub after: Option<(NaiveDate, f64)>,
    pub percent_return: Option<f64>,
    pub status: PriceStatus,
}

impl PriceRow {
    fn failed(status: PriceStatus) -> Self {
        Self {
            before: None,
            after: None,
            percent_return: None,
            status,
        }
    }

    fn write_into(&self, table: &mut Table, row: usize, window: &PriceWindow) {
        if let Some((date, price)) = self.before {
            table.set(row, &window.before_date_column(), format_iso(date));
            table.set(row, &window.before_price_column(), fmt_f64(price, 2));
        }
        if let Some((date, price)) = self.after {
            table.set(row, &window.after_date_column(), format_iso(date));
            table.set(row, &window.after_price_column(), fmt_f64(price, 2));
        }
        if let Some(ret) = self.percent_return {
            table.set(row, RETURN_COLUMN, fmt_f64(ret, 2));
        }
        table.set(row, STATUS_COLUMN, self.status.to_string());
    }
}

fn announce_cell<'a>(table: &'a Table, row: usize) -> Option<&'a str> {
    ANNOUNCE_COLUMNS.iter().find_map(|c| table.get(row, c))
}

/// A deal is identified by its ticker and announcement date; one acquirer
/// can announce several deals.
#[derive(Debug, PartialEq, Eq)]
enum AnnounceKey {
    Date(NaiveDate),
    Raw(String),
    Missing,
}

fn deal_key(table: &Table, row: usize) -> (Option<&str>, AnnounceKey) {
    let announce = match announce_cell(table, row) {
        Some(raw) => match parse_date(raw) {
            Some(date) => AnnounceKey::Date(date),
            None => AnnounceKey::Raw(raw.to_string()),
        },
        None => AnnounceKey::Missing,
    };
    (table.get(row, "Ticker"), announce)
}

/// Row of `table` holding the same deal as `deals[deal_row]`.
fn find_deal(table: &Table, deals: &Table, deal_row: usize) -> Option<usize> {
    let key = deal_key(deals, deal_row);
    (0..table.len()).find(|&r| deal_key(table, r) == key)
}

/// Fetch the window prices for one ticker and announcement date.
pub async fn fetch_row(
    fetcher: &Fetcher<'_>,
    raw_ticker: Option<&str>,
    announce: Option<&str>,
    window: PriceWindow,
    today: NaiveDate,
) -> PriceRow {
    let Some(symbol) = raw_ticker.and_then(clean_ticker) else {
        return PriceRow::failed(PriceStatus::InvalidTicker);
    };
    let Some(announce) = announce else {
        return PriceRow::failed(PriceStatus::MissingDate);
    };
    let Some(announce) = parse_date(announce) else {
        return PriceRow::failed(PriceStatus::InvalidDate);
    };

    let target_before = clamp_to_today(announce - Duration::days(window.days_before.into()), today);
    let target_after = clamp_to_today(announce + Duration::days(window.days_after.into()), today);

    let source = fetcher.source;
    let before = nearest_trading_day(
        source,
        &symbol,
        target_before,
        Direction::Backward,
        &fetcher.policy,
        fetcher.search,
    )
    .await;
    let after = nearest_trading_day(
        source,
        &symbol,
        target_after,
        Direction::Forward,
        &fetcher.policy,
        fetcher.search,
    )
    .await;

    let (Some(before_day), Some(after_day)) = (before, after) else {
        return PriceRow::failed(PriceStatus::NoTradingDays);
    };

    let before_price = match close_on(source, &symbol, before_day, &fetcher.policy).await {
        Ok(p) => p,
        Err(e) => return PriceRow::failed(PriceStatus::Error(e.to_string())),
    };
    let after_price = match close_on(source, &symbol, after_day, &fetcher.policy).await {
        Ok(p) => p,
        Err(e) => return PriceRow::failed(PriceStatus::Error(e.to_string())),
    };

    let (Some(before_price), Some(after_price)) = (before_price, after_price) else {
        return PriceRow::failed(PriceStatus::NoPriceData);
    };

    let percent_return =
        (before_price > 0.0).then(|| (after_price - before_price) / before_price * 100.0);

    PriceRow {
        before: Some((before_day, before_price)),
        after: Some((after_day, after_price)),
        percent_return,
        status: PriceStatus::Success,
    }
}

/// Counts reported after a price run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PriceSummary {
    pub processed: usize,
    pub succeeded: usize,
}

/// Rows of `deals` that still need prices, given an earlier output table.
fn rows_to_process(deals: &Table, existing: Option<&Table>, window: &PriceWindow) -> Vec<usize> {
    let Some(existing) = existing else {
        return (0..deals.len()).collect();
    };

    let price_cols = [window.before_price_column(), window.after_price_column()];
    (0..deals.len())
        .filter(|&r| match find_deal(existing, deals, r) {
            None => true,
            Some(e) => price_cols.iter().any(|c| existing.get(e, c).is_none()),
        })
        .collect()
}

/// Fetch prices for every deal in `input`, resuming from `output` if it exists.
pub async fn fetch_prices(
    fetcher: &Fetcher<'_>,
    input: &Path,
    output: &Path,
    window: PriceWindow,
    today: NaiveDate,
) -> Result<PriceSummary> {
    let mut deals = Table::read_csv(input).with_context(|| format!("Failed to read {}", input.display()))?;
    deals.require_column("Ticker")?;
    deals.drop_unnamed();

    let existing = if output.exists() {
        Some(Table::read_csv(output).with_context(|| format!("Failed to read {}", output.display()))?)
    } else {
        None
    };

    let pending = rows_to_process(&deals, existing.as_ref(), &window);
    if pending.is_empty() {
        info!("No new data to process");
        return Ok(PriceSummary::default());
    }
    info!(
        "Fetching T-{}/T+{} prices for {} rows with {} workers",
        window.days_before,
        window.days_after,
        pending.len(),
        fetcher.workers
    );

    let pb = fetcher.progress_bar(
        pending.len(),
        &format!("Fetching T-{}/T+{} stock prices", window.days_before, window.days_after),
    );

    let results: Vec<(usize, PriceRow)> = stream::iter(pending.iter().copied())
        .map(|r| {
            let ticker = deals.get(r, "Ticker");
            let announce = announce_cell(&deals, r);
            let pb = &pb;
            async move {
                let result = fetch_row(fetcher, ticker, announce, window, today).await;
                debug!("Row {} ({:?}): {}", r, ticker, result.status);
                pb.inc(1);
                (r, result)
            }
        })
        .buffer_unordered(fetcher.workers)
        .collect()
        .await;
    pb.finish_and_clear();

    let resuming = existing.is_some();
    let mut base = existing.unwrap_or_else(|| deals.clone());
    for col in [
        window.before_date_column(),
        window.before_price_column(),
        window.after_date_column(),
        window.after_price_column(),
    ] {
        base.ensure_column(&col);
    }
    base.ensure_column(RETURN_COLUMN);
    base.ensure_column(STATUS_COLUMN);

    let mut summary = PriceSummary::default();
    for (r, result) in &results {
        let target = if resuming {
            locate_or_append(&mut base, &deals, *r)
        } else {
            *r
        };
        result.write_into(&mut base, target, &window);
        summary.processed += 1;
        if result.status == PriceStatus::Success {
            summary.succeeded += 1;
        }
    }

    base.write_csv(output)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    Ok(summary)
}

/// Row of `base` holding the deal, or a fresh copy of the deal row.
fn locate_or_append(base: &mut Table, deals: &Table, deal_row: usize) -> usize {
    if let Some(found) = find_deal(base, deals, deal_row) {
        return found;
    }

    let values: Vec<(String, String)> = deals
        .headers()
        .iter()
        .map(|h| (h.clone(), deals.get(deal_row, h).unwrap_or_default().to_string()))
        .collect();
    base.push_row(Vec::new());
    let idx = base.len() - 1;
    for (column, value) in values {
        base.set(idx, &column, value);
    }
    idx
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collect::test_fetcher;
    use crate::market::testing::{ymd, StaticSource};
    use tempfile::TempDir;

    fn window() -> PriceWindow {
        PriceWindow {
            days_before: 2,
            days_after: 2,
        }
    }

    fn source() -> StaticSource {
        StaticSource::with_bars(
            "XOM",
            &[
                (ymd(2021, 1, 4), 40.0),
                (ymd(2021, 1, 5), 41.0),
                (ymd(2021, 1, 6), 42.0),
                (ymd(2021, 1, 7), 43.0),
                (ymd(2021, 1, 8), 44.0),
                (ymd(2021, 1, 11), 45.0),
            ],
        )
    }

    #[tokio::test]
    async fn test_fetch_row_success() {
        let source = source();
        let fetcher = test_fetcher(&source);
        let row = fetch_row(&fetcher, Some("$XOM"), Some("2021-01-07"), window(), ymd(2022, 1, 1)).await;

        assert_eq!(row.status, PriceStatus::Success);
        // T-2 = 5 Jan, walking back over [31 Dec, 5 Jan) gives 4 Jan.
        assert_eq!(row.before, Some((ymd(2021, 1, 4), 40.0)));
        // T+2 = 9 Jan (Saturday), walking forward gives 11 Jan.
        assert_eq!(row.after, Some((ymd(2021, 1, 11), 45.0)));
        assert_eq!(row.percent_return, Some(12.5));
    }

    #[tokio::test]
    async fn test_fetch_row_statuses() {
        let source = source();
        let fetcher = test_fetcher(&source);
        let today = ymd(2022, 1, 1);

        let row = fetch_row(&fetcher, Some("Ticker not found"), Some("2021-01-07"), window(), today).await;
        assert_eq!(row.status, PriceStatus::InvalidTicker);

        let row = fetch_row(&fetcher, Some("XOM"), None, window(), today).await;
        assert_eq!(row.status, PriceStatus::MissingDate);

        let row = fetch_row(&fetcher, Some("XOM"), Some("someday"), window(), today).await;
        assert_eq!(row.status, PriceStatus::InvalidDate);

        let row = fetch_row(&fetcher, Some("NOPE"), Some("2021-01-07"), window(), today).await;
        assert_eq!(row.status, PriceStatus::NoTradingDays);
    }

    #[tokio::test]
    async fn test_fetch_prices_writes_and_resumes() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("classified.csv");
        let output = window().default_output(dir.path());
        std::fs::write(
            &input,
            "Ticker,Acquirer Name,Announce Date\nXOM,Exxon,2021-01-07\nBAD,Bad Co,2021-01-07\n",
        )
        .unwrap();

        let source = source();
        let fetcher = test_fetcher(&source);
        let summary = fetch_prices(&fetcher, &input, &output, window(), ymd(2022, 1, 1))
            .await
            .unwrap();
        assert_eq!(summary.processed, 2);
        assert_eq!(summary.succeeded, 1);

        let table = Table::read_csv(&output).unwrap();
        assert_eq!(table.get(0, "T_minus_2_Price"), Some("40.00"));
        assert_eq!(table.get(0, "T_plus_2_Date"), Some("2021-01-11"));
        assert_eq!(table.get(0, "Percent_Return"), Some("12.50"));
        assert_eq!(table.get(0, "Price_Status"), Some("Success"));
        assert_eq!(table.get(1, "Price_Status"), Some("No valid trading days found"));

        // Only the row without prices is retried.
        let calls_before = source.history_calls.load(std::sync::atomic::Ordering::SeqCst);
        let summary = fetch_prices(&fetcher, &input, &output, window(), ymd(2022, 1, 1))
            .await
            .unwrap();
        assert_eq!(summary.processed, 1);
        assert!(source.history_calls.load(std::sync::atomic::Ordering::SeqCst) > calls_before);
        assert_eq!(Table::read_csv(&output).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_resume_keeps_deals_of_the_same_ticker_apart() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("classified.csv");
        let output = window().default_output(dir.path());
        std::fs::write(&input, "Ticker,Announce Date\nXOM,2021-01-07\n").unwrap();

        let source = source();
        let fetcher = test_fetcher(&source);
        fetch_prices(&fetcher, &input, &output, window(), ymd(2022, 1, 1))
            .await
            .unwrap();

        // A second deal by the same acquirer shows up after the first run.
        std::fs::write(&input, "Ticker,Announce Date\nXOM,2021-01-07\nXOM,2021-01-08\n").unwrap();
        let summary = fetch_prices(&fetcher, &input, &output, window(), ymd(2022, 1, 1))
            .await
            .unwrap();
        assert_eq!(summary.processed, 1);
        assert_eq!(summary.succeeded, 1);

        let table = Table::read_csv(&output).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(0, "Announce Date"), Some("2021-01-07"));
        assert_eq!(table.get(0, "Percent_Return"), Some("12.50"));
        assert_eq!(table.get(1, "Announce Date"), Some("2021-01-08"));
        // T-2 = 6 Jan walks back to 5 Jan, T+2 = 10 Jan walks forward to 11 Jan.
        assert_eq!(table.get(1, "T_minus_2_Price"), Some("41.00"));
        assert_eq!(table.get(1, "Percent_Return"), Some("9.76"));
    }

    #[tokio::test]
    async fn test_resume_appends_each_new_deal_once() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("classified.csv");
        let output = window().default_output(dir.path());
        std::fs::write(&input, "Ticker,Announce Date\nBAD,2021-01-07\n").unwrap();

        let source = source();
        let fetcher = test_fetcher(&source);
        fetch_prices(&fetcher, &input, &output, window(), ymd(2022, 1, 1))
            .await
            .unwrap();

        std::fs::write(
            &input,
            "Ticker,Announce Date\nBAD,2021-01-07\nXOM,2021-01-07\nXOM,2021-01-08\n",
        )
        .unwrap();
        let summary = fetch_prices(&fetcher, &input, &output, window(), ymd(2022, 1, 1))
            .await
            .unwrap();
        assert_eq!(summary.processed, 3);

        let table = Table::read_csv(&output).unwrap();
        assert_eq!(table.len(), 3);
        let xom: Vec<(Option<&str>, Option<&str>)> = (1..3)
            .map(|r| (table.get(r, "Announce Date"), table.get(r, "Percent_Return")))
            .collect();
        assert!(xom.contains(&(Some("2021-01-07"), Some("12.50"))));
        assert!(xom.contains(&(Some("2021-01-08"), Some("9.76"))));
    }
}
