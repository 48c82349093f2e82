//! Data collection steps backed by a market data source.
//!
//! Each step reads a deal table, queries the source row by row and writes
//! its results as a CSV. Failures of individual rows are recorded in the
//! output instead of aborting the batch.

pub mod metrics;
pub mod prices;
pub mod sales;
pub mod tickers;

use crate::config::FetchConfig;
use crate::market::trading::TradingDaySearch;
use crate::market::{MarketDataSource, RetryPolicy};
use indicatif::{ProgressBar, ProgressStyle};

/// Everything a collection step needs to talk to the market.
pub struct Fetcher<'a> {
    pub source: &'a dyn MarketDataSource,
    pub policy: RetryPolicy,
    pub search: TradingDaySearch,
    pub workers: usize,
    pub show_progress: bool,
}

impl<'a> Fetcher<'a> {
    pub fn new(source: &'a dyn MarketDataSource, config: &FetchConfig, show_progress: bool) -> Self {
        Self {
            source,
            policy: RetryPolicy::from(config),
            search: TradingDaySearch::from(config),
            workers: config.workers.max(1),
            show_progress,
        }
    }

    /// Progress bar for `len` rows; hidden when progress display is off.
    pub(crate) fn progress_bar(&self, len: usize, message: &str) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::new(len as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} {msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb.set_message(message.to_string());
        pb
    }
}

#[cfg(test)]
pub(crate) fn test_fetcher(source: &dyn MarketDataSource) -> Fetcher<'_> {
    Fetcher {
        source,
        policy: RetryPolicy::immediate(),
        search: TradingDaySearch::default(),
        workers: 2,
        show_progress: false,
    }
}
