//! Group-level statistics written to the comprehensive analysis JSON.

use super::event::GroupReturns;
use crate::models::{
    CarbonIntensityAnalysis, GroupAnalysis, RegressionSummary, ReturnStatistics,
    SampleCharacteristics, SizeBucket, SizeEffectAnalysis, VolatilityAnalysis,
};
use crate::stats::descriptive::{mean, median, pearson, qcut4, std_dev, SIZE_LABELS};
use crate::stats::ols::{add_constant, robust_mean_test, OlsFit};
use ndarray::Array1;
use tracing::{info, warn};

/// Window length for which volatility is reported.
const VOLATILITY_WINDOW: u32 = 10;

fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

fn carbon_analysis(returns: &GroupReturns) -> CarbonIntensityAnalysis {
    let mut analysis = CarbonIntensityAnalysis {
        correlation: None,
        correlation_p_value: None,
        regression: None,
    };
    let Some(log_ci) = &returns.log_intensity else {
        return analysis;
    };
    let ar: Vec<f64> = returns.abnormal.iter().map(|a| a.unwrap_or(0.0)).collect();

    if let Some((r, p)) = pearson(log_ci, &ar) {
        analysis.correlation = Some(r);
        analysis.correlation_p_value = Some(p);
    }

    if ar.len() > 2 {
        match OlsFit::fit(&Array1::from(ar), &add_constant(log_ci)) {
            Ok(fit) => {
                analysis.regression = Some(RegressionSummary {
                    coefficient: fit.params[1],
                    p_value: fit.hc3_p_values[1],
                    r_squared: fit.r_squared,
                    robust_se: fit.hc3_bse[1],
                });
            }
            Err(e) => warn!("Error in regression analysis for {}: {}", returns.group, e),
        }
    }
    analysis
}

fn size_analysis(returns: &GroupReturns) -> SizeEffectAnalysis {
    let mut buckets = Vec::new();
    let labels = returns.sales.as_deref().and_then(qcut4);
    match labels {
        Some(labels) => {
            for label in SIZE_LABELS {
                let values: Vec<f64> = labels
                    .iter()
                    .zip(&returns.abnormal)
                    .filter(|(l, _)| **l == label)
                    .filter_map(|(_, ar)| *ar)
                    .collect();
                if let Some(m) = mean(&values) {
                    buckets.push(SizeBucket {
                        label: label.to_string(),
                        mean: m,
                        count: values.len(),
                    });
                }
            }
        }
        None if returns.sales.is_some() => {
            info!("Sales quartiles are not distinct for {}", returns.group);
        }
        None => {}
    }
    SizeEffectAnalysis {
        returns_by_size: buckets,
    }
}

/// Statistics of one group. `None` when the group has no abnormal returns.
pub fn analyze_group(
    returns: &GroupReturns,
    day_range: u32,
    trading_days_per_year: u32,
) -> Option<GroupAnalysis> {
    let ars: Vec<f64> = returns.abnormal.iter().flatten().copied().collect();
    if ars.is_empty() {
        info!("No valid abnormal returns for {}", returns.group);
        return None;
    }

    let n = ars.len();
    let positive = ars.iter().filter(|a| **a > 0.0).count();
    let negative = ars.iter().filter(|a| **a < 0.0).count();
    let std = std_dev(&ars);

    let (t_statistic, p_value) = match robust_mean_test(&ars) {
        Ok((t, p)) => (finite(t), finite(p)),
        Err(e) => {
            warn!("Robust t-test skipped for {}: {}", returns.group, e);
            (None, None)
        }
    };

    let volatility = match std {
        Some(s) if day_range == VOLATILITY_WINDOW => {
            let daily = s / f64::from(VOLATILITY_WINDOW).sqrt();
            Some(VolatilityAnalysis {
                daily,
                annualized: daily * f64::from(trading_days_per_year).sqrt(),
            })
        }
        _ => None,
    };

    Some(GroupAnalysis {
        day_range,
        sample: SampleCharacteristics {
            sample_size: n,
            positive,
            negative,
            win_ratio: positive as f64 / n as f64,
        },
        returns: ReturnStatistics {
            mean: mean(&ars)?,
            median: median(&ars)?,
            std_dev: std,
            t_statistic,
            p_value,
            weighted: returns
                .weighted
                .as_ref()
                .map(|w| w.iter().flatten().sum()),
        },
        carbon: carbon_analysis(returns),
        size: size_analysis(returns),
        volatility,
    })
}
