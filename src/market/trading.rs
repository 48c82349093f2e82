//! Trading-day resolution around event dates.

use super::{MarketDataSource, MarketError, RetryPolicy};
use crate::config::FetchConfig;
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use tracing::debug;

/// Which way to walk when the target date is not a trading day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Backward,
    Forward,
}

/// Bounds on the trading-day walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TradingDaySearch {
    pub attempts: usize,
    pub lookaround_days: i64,
}

impl Default for TradingDaySearch {
    fn default() -> Self {
        Self {
            attempts: 10,
            lookaround_days: 5,
        }
    }
}

impl From<&FetchConfig> for TradingDaySearch {
    fn from(config: &FetchConfig) -> Self {
        Self {
            attempts: config.trading_day_attempts.max(1),
            lookaround_days: config.lookaround_days.max(1),
        }
    }
}

/// Future dates are pulled back to the latest weekday on or before `today`.
pub fn clamp_to_today(target: NaiveDate, today: NaiveDate) -> NaiveDate {
    if target <= today {
        return target;
    }
    let mut day = today;
    while matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
        day -= Duration::days(1);
    }
    day
}

/// Find the closest date with market data, walking in `direction`.
///
/// Each attempt looks at a window of `lookaround_days`: `[d - n, d)` going
/// backward (last bar wins) or `[d, d + n)` going forward (first bar wins).
/// An empty or failed window moves `d` one day further.
pub async fn nearest_trading_day(
    source: &dyn MarketDataSource,
    symbol: &str,
    target: NaiveDate,
    direction: Direction,
    policy: &RetryPolicy,
    search: TradingDaySearch,
) -> Option<NaiveDate> {
    let window = Duration::days(search.lookaround_days);
    let mut date = target;

    for attempt in 0..search.attempts {
        let (start, end) = match direction {
            Direction::Backward => (date - window, date),
            Direction::Forward => (date, date + window),
        };

        let what = format!("{} history {}..{}", symbol, start, end);
        match policy
            .retry(&what, || source.daily_history(symbol, start, end))
            .await
        {
            Ok(bars) if !bars.is_empty() => {
                let found = match direction {
                    Direction::Backward => bars.last(),
                    Direction::Forward => bars.first(),
                };
                return found.map(|b| b.date);
            }
            Ok(_) => debug!("{}: no bars in {}..{} (attempt {})", symbol, start, end, attempt + 1),
            Err(e) => debug!("{}: window {}..{} failed: {}", symbol, start, end, e),
        }

        date = match direction {
            Direction::Backward => date - Duration::days(1),
            Direction::Forward => date + Duration::days(1),
        };
    }

    None
}

/// Closing price on `date`, or the last close before it within a day.
pub async fn close_on(
    source: &dyn MarketDataSource,
    symbol: &str,
    date: NaiveDate,
    policy: &RetryPolicy,
) -> Result<Option<f64>, MarketError> {
    let start = date - Duration::days(1);
    let end = date + Duration::days(1);
    let what = format!("{} close on {}", symbol, date);
    let bars = policy
        .retry(&what, || source.daily_history(symbol, start, end))
        .await?;

    let close = bars
        .iter()
        .find(|b| b.date == date)
        .or_else(|| bars.last())
        .map(|b| b.close);
    Ok(close)
}
