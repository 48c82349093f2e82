//! Descriptive statistics over plain slices.

use statrs::distribution::{ContinuousCDF, StudentsT};

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

pub fn median(values: &[f64]) -> Option<f64> {
    quantile(values, 0.5)
}

/// Sample standard deviation (`ddof = 1`).
pub fn std_dev(values: &[f64]) -> Option<f64> {
    let n = values.len();
    if n < 2 {
        return None;
    }
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    Some((ss / (n - 1) as f64).sqrt())
}

fn sorted(values: &[f64]) -> Vec<f64> {
    let mut v = values.to_vec();
    v.sort_by(|a, b| a.total_cmp(b));
    v
}

/// Quantile with linear interpolation between order statistics.
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let v = sorted(values);
    Some(quantile_sorted(&v, q))
}

fn quantile_sorted(v: &[f64], q: f64) -> f64 {
    let pos = q.clamp(0.0, 1.0) * (v.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    v[lo] + (v[hi] - v[lo]) * (pos - lo as f64)
}

/// Winsorize the non-missing values; missing entries stay missing.
///
/// With `n` present values, the `floor(lower * n)` smallest are raised to the
/// next order statistic and the `floor(upper * n)` largest lowered likewise.
pub fn winsorize(values: &[Option<f64>], lower: f64, upper: f64) -> Vec<Option<f64>> {
    let present: Vec<f64> = values.iter().flatten().copied().collect();
    let n = present.len();
    if n == 0 {
        return values.to_vec();
    }

    let v = sorted(&present);
    let low_idx = ((lower * n as f64) as usize).min(n - 1);
    let up_idx = n.saturating_sub((upper * n as f64) as usize).max(1);
    let floor = v[low_idx];
    let ceiling = v[up_idx - 1];

    values
        .iter()
        .map(|v| v.map(|x| x.max(floor).min(ceiling)))
        .collect()
}

/// Pearson correlation and two-sided p-value.
///
/// `None` with fewer than two points or a constant input.
pub fn pearson(x: &[f64], y: &[f64]) -> Option<(f64, f64)> {
    let n = x.len().min(y.len());
    if n < 2 {
        return None;
    }
    let (x, y) = (&x[..n], &y[..n]);
    let mx = mean(x)?;
    let my = mean(y)?;

    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (a, b) in x.iter().zip(y) {
        sxy += (a - mx) * (b - my);
        sxx += (a - mx).powi(2);
        syy += (b - my).powi(2);
    }
    if sxx == 0.0 || syy == 0.0 {
        return None;
    }

    let r = (sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0);
    if n == 2 {
        return Some((r, 1.0));
    }
    if (1.0 - r.abs()) < f64::EPSILON {
        return Some((r, 0.0));
    }

    let df = (n - 2) as f64;
    let t = r * (df / (1.0 - r * r)).sqrt();
    let p = StudentsT::new(0.0, 1.0, df)
        .map(|dist| 2.0 * dist.sf(t.abs()))
        .ok()?;
    Some((r, p))
}

pub const SIZE_LABELS: [&str; 4] = ["Small", "Medium", "Large", "Very Large"];

/// Assign each value to a size quartile.
///
/// `None` when quartile edges coincide, as happens with many equal values.
pub fn qcut4(values: &[f64]) -> Option<Vec<&'static str>> {
    if values.is_empty() {
        return None;
    }
    let v = sorted(values);
    let edges: Vec<f64> = [0.0, 0.25, 0.5, 0.75, 1.0]
        .iter()
        .map(|&q| quantile_sorted(&v, q))
        .collect();
    if edges.windows(2).any(|w| w[0] >= w[1]) {
        return None;
    }

    Some(
        values
            .iter()
            .map(|&x| {
                let bin = edges[1..]
                    .iter()
                    .position(|&edge| x <= edge)
                    .unwrap_or(3);
                SIZE_LABELS[bin]
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_basic_statistics() {
        let v = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_eq!(mean(&v), Some(5.0));
        assert_eq!(median(&v), Some(4.5));
        assert!(close(std_dev(&v).unwrap(), (32.0f64 / 7.0).sqrt()));
        assert_eq!(std_dev(&[1.0]), None);
        assert_eq!(mean(&[]), None);
    }

    #[test]
    fn test_quantile_interpolates() {
        let v = [1.0, 2.0, 3.0, 4.0];
        assert!(close(quantile(&v, 0.25).unwrap(), 1.75));
        assert!(close(quantile(&v, 0.5).unwrap(), 2.5));
        assert_eq!(quantile(&v, 0.0), Some(1.0));
        assert_eq!(quantile(&v, 1.0), Some(4.0));
    }

    #[test]
    fn test_winsorize_clips_tails() {
        let mut values: Vec<Option<f64>> = (1..=100).map(|i| Some(i as f64)).collect();
        values.push(None);
        let w = winsorize(&values, 0.01, 0.01);
        assert_eq!(w[0], Some(2.0));
        assert_eq!(w[50], Some(51.0));
        assert_eq!(w[99], Some(99.0));
        assert_eq!(w[100], None);
    }

    #[test]
    fn test_winsorize_small_samples_unchanged() {
        let values = vec![Some(-50.0), Some(1.0), Some(80.0)];
        assert_eq!(winsorize(&values, 0.01, 0.01), values);
        assert!(winsorize(&[None, None], 0.01, 0.01).iter().all(Option::is_none));
    }

    #[test]
    fn test_pearson() {
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        let y = [2.0, 4.0, 5.0, 4.0, 5.0];
        let (r, p) = pearson(&x, &y).unwrap();
        assert!((r - 0.7745966692).abs() < 1e-9);
        assert!((p - 0.1240).abs() < 1e-3);

        assert_eq!(pearson(&x, &[1.0; 5]), None);
        assert_eq!(pearson(&[1.0], &[2.0]), None);
        assert_eq!(pearson(&[1.0, 2.0], &[3.0, 5.0]), Some((1.0, 1.0)));
    }

    #[test]
    fn test_qcut4() {
        let v = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];
        let labels = qcut4(&v).unwrap();
        assert_eq!(labels[0], "Small");
        assert_eq!(labels[1], "Small");
        assert_eq!(labels[2], "Medium");
        assert_eq!(labels[5], "Large");
        assert_eq!(labels[7], "Very Large");

        assert_eq!(qcut4(&[0.0, 0.0, 0.0, 5.0]), None);
    }
}
