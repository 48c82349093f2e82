//! Jittered exponential backoff around market data calls.

use super::MarketError;
use crate::config::FetchConfig;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Retry and pacing parameters for one kind of request.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub base_delay: Duration,
    pub multiplier: f64,
    /// Upper bound of the random extra added to each backoff.
    pub jitter: Duration,
    /// Every attempt is preceded by a random pause in `[pace_min, pace_max]`.
    pub pace_min: Duration,
    pub pace_max: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            multiplier: 2.0,
            jitter: Duration::from_millis(1000),
            pace_min: Duration::from_millis(1000),
            pace_max: Duration::from_millis(2000),
        }
    }
}

impl From<&FetchConfig> for RetryPolicy {
    fn from(config: &FetchConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            multiplier: config.backoff_multiplier,
            jitter: Duration::from_millis(config.jitter_ms),
            pace_min: Duration::from_millis(config.pace_min_ms),
            pace_max: Duration::from_millis(config.pace_max_ms.max(config.pace_min_ms)),
        }
    }
}

impl RetryPolicy {
    /// No sleeping at all; for tests and offline runs.
    pub fn immediate() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::ZERO,
            multiplier: 2.0,
            jitter: Duration::ZERO,
            pace_min: Duration::ZERO,
            pace_max: Duration::ZERO,
        }
    }

    /// Delay after failed attempt `attempt` (0-based), before jitter.
    pub fn base_backoff(&self, attempt: usize) -> Duration {
        let factor = self.multiplier.powi(attempt as i32);
        self.base_delay.mul_f64(factor)
    }

    /// Backoff with uniform jitter in `[0, jitter)`.
    pub fn backoff(&self, attempt: usize) -> Duration {
        self.base_backoff(attempt) + random_up_to(self.jitter)
    }

    /// A uniformly random pause between requests.
    pub fn pace_delay(&self) -> Duration {
        if self.pace_max <= self.pace_min {
            return self.pace_min;
        }
        let min = self.pace_min.as_millis() as u64;
        let max = self.pace_max.as_millis() as u64;
        Duration::from_millis(rand::rng().random_range(min..=max))
    }

    pub async fn pace(&self) {
        sleep_nonzero(self.pace_delay()).await;
    }

    /// Run `op` until it succeeds or the attempt budget is spent.
    pub async fn retry<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T, MarketError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, MarketError>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            self.pace().await;
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt + 1 >= attempts => {
                    warn!("{} failed after {} attempts: {}", what, attempts, e);
                    return Err(MarketError::RetriesExhausted {
                        attempts,
                        last: Box::new(e),
                    });
                }
                Err(e) => {
                    let delay = self.backoff(attempt);
                    debug!(
                        "{} attempt {} failed ({}); retrying in {:?}",
                        what,
                        attempt + 1,
                        e,
                        delay
                    );
                    sleep_nonzero(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

fn random_up_to(limit: Duration) -> Duration {
    let ms = limit.as_millis() as u64;
    if ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::rng().random_range(0..ms))
}

async fn sleep_nonzero(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}
