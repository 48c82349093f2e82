//! Breusch-Pagan and White tests for heteroskedastic residuals.

use super::ols::OlsFit;
use super::StatsError;
use ndarray::{Array1, Array2};
use statrs::distribution::{ChiSquared, ContinuousCDF};

/// Lagrange multiplier and F versions of an auxiliary-regression test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LmTest {
    pub lm: f64,
    pub lm_p_value: f64,
    pub f: f64,
    pub f_p_value: f64,
}

fn chi2_sf(x: f64, df: f64) -> f64 {
    match ChiSquared::new(df) {
        Ok(dist) => dist.sf(x),
        Err(_) => f64::NAN,
    }
}

/// Regress squared residuals on `exog` and report `n * R^2` and the F test.
fn auxiliary_test(residuals: &Array1<f64>, exog: &Array2<f64>) -> Result<LmTest, StatsError> {
    let y = residuals.mapv(|e| e * e);
    let aux = OlsFit::fit(&y, exog)?;
    let lm = aux.nobs as f64 * aux.r_squared;
    Ok(LmTest {
        lm,
        lm_p_value: chi2_sf(lm, aux.df_model as f64),
        f: aux.f_statistic.unwrap_or(f64::NAN),
        f_p_value: aux.f_p_value.unwrap_or(f64::NAN),
    })
}

/// Breusch-Pagan test against the regressors themselves (constant first).
pub fn breusch_pagan(residuals: &Array1<f64>, exog: &Array2<f64>) -> Result<LmTest, StatsError> {
    auxiliary_test(residuals, exog)
}

/// White test: regressors plus all squares and cross products.
pub fn white(residuals: &Array1<f64>, exog: &Array2<f64>) -> Result<LmTest, StatsError> {
    let (n, k) = exog.dim();
    let mut pairs = Vec::new();
    for i in 0..k {
        for j in i..k {
            pairs.push((i, j));
        }
    }

    let mut expanded = Array2::<f64>::zeros((n, pairs.len()));
    for row in 0..n {
        for (col, &(i, j)) in pairs.iter().enumerate() {
            expanded[[row, col]] = exog[[row, i]] * exog[[row, j]];
        }
    }
    auxiliary_test(residuals, &expanded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::ols::add_constant;

    fn fan_data() -> (Array1<f64>, Array2<f64>) {
        // Residual spread grows with x.
        let x: Vec<f64> = (1..=40).map(|i| i as f64 / 4.0).collect();
        let y: Vec<f64> = x
            .iter()
            .enumerate()
            .map(|(i, &v)| {
                let sign = if i % 2 == 0 { 1.0 } else { -1.0 };
                1.0 + 0.5 * v + sign * v * v
            })
            .collect();
        (Array1::from(y), add_constant(&x))
    }

    #[test]
    fn test_detects_fanning_residuals() {
        let (y, x) = fan_data();
        let fit = OlsFit::fit(&y, &x).unwrap();

        let bp = breusch_pagan(&fit.residuals, &x).unwrap();
        assert!(bp.lm > 0.0);
        assert!(bp.lm_p_value < 0.05);
        assert!(bp.f_p_value < 0.05);

        let w = white(&fit.residuals, &x).unwrap();
        assert!(w.lm >= bp.lm - 1e-9);
        assert!(w.lm_p_value < 0.05);
    }

    #[test]
    fn test_lm_matches_n_r_squared() {
        let (y, x) = fan_data();
        let fit = OlsFit::fit(&y, &x).unwrap();
        let aux = OlsFit::fit(&fit.residuals.mapv(|e| e * e), &x).unwrap();
        let bp = breusch_pagan(&fit.residuals, &x).unwrap();
        assert!((bp.lm - 40.0 * aux.r_squared).abs() < 1e-9);
        assert_eq!(bp.f, aux.f_statistic.unwrap());
    }

    #[test]
    fn test_reference_values() {
        // Expected values from an exact rational computation of the auxiliary
        // regressions; chi-squared tails in closed form for df 1 and 2.
        let x = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];
        let y = Array1::from(vec![1.1, 1.9, 3.2, 3.7, 5.6, 5.1, 7.9, 6.4]);
        let exog = add_constant(&x);
        let fit = OlsFit::fit(&y, &exog).unwrap();

        let bp = breusch_pagan(&fit.residuals, &exog).unwrap();
        assert!((bp.lm - 5.368_554_509_581_581).abs() < 1e-8);
        assert!((bp.lm_p_value - 0.020_502_961_701_051_464).abs() < 1e-7);
        assert!((bp.f - 12.240_925_063_725_205).abs() < 1e-7);

        let w = white(&fit.residuals, &exog).unwrap();
        assert!((w.lm - 5.877_878_635_806_037).abs() < 1e-8);
        assert!((w.lm_p_value - 0.052_921_832_219_085_89).abs() < 1e-7);
        assert!((w.f - 6.924_531_667_912_651).abs() < 1e-7);
    }

    #[test]
    fn test_white_needs_varying_regressor() {
        let y = Array1::from(vec![1.0, -1.0, 2.0, -2.0]);
        let x = add_constant(&[0.0; 4]);
        assert_eq!(white(&y, &x), Err(StatsError::SingularMatrix));
    }
}
