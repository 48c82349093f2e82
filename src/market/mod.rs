//! Market data access.
//!
//! Collection steps talk to a [`MarketDataSource`]; the production source is
//! the Yahoo Finance HTTP client in [`yahoo`].

pub mod retry;
pub mod ticker;
pub mod trading;
pub mod yahoo;

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

pub use retry::RetryPolicy;
pub use yahoo::YahooClient;

/// Errors returned by market data sources.
#[derive(Debug, Error)]
pub enum MarketError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected HTTP status {status} for {symbol}")]
    Status { symbol: String, status: u16 },

    #[error("API error: {code} - {description}")]
    Api { code: String, description: String },

    #[error("No data returned for {0}")]
    NoData(String),

    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Gave up after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: usize,
        #[source]
        last: Box<MarketError>,
    },
}

/// One daily bar; only the close is used downstream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DailyBar {
    pub date: NaiveDate,
    pub close: f64,
}

/// Latest quarterly statement values used for financial ratios.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FinancialSnapshot {
    pub shares_outstanding: Option<f64>,
    pub total_debt: Option<f64>,
    pub stockholders_equity: Option<f64>,
    pub total_assets: Option<f64>,
    pub net_income: Option<f64>,
}

/// A provider of prices, fundamentals and symbol lookup.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Daily bars with `start <= date < end`, oldest first.
    async fn daily_history(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyBar>, MarketError>;

    /// Annual total revenue by fiscal period end, newest first.
    async fn annual_revenue(&self, symbol: &str) -> Result<Vec<(NaiveDate, f64)>, MarketError>;

    /// Most recent quarterly statement values.
    async fn financial_snapshot(&self, symbol: &str) -> Result<FinancialSnapshot, MarketError>;

    /// Resolve a company name to its primary listing symbol.
    async fn lookup_symbol(&self, company_name: &str) -> Result<Option<String>, MarketError>;
}
