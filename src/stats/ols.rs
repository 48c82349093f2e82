//! Ordinary least squares with classical and HC3 standard errors.

use super::StatsError;
use nalgebra::DMatrix;
use ndarray::{Array1, Array2, Axis};
use statrs::distribution::{ContinuousCDF, FisherSnedecor, Normal, StudentsT};

/// Build a design matrix `[1, x]`.
pub fn add_constant(x: &[f64]) -> Array2<f64> {
    let mut design = Array2::ones((x.len(), 2));
    for (i, &v) in x.iter().enumerate() {
        design[[i, 1]] = v;
    }
    design
}

/// Invert a square matrix. Rank-deficient input is reported as singular
/// rather than inverted through rounding noise.
pub fn invert(matrix: &Array2<f64>) -> Result<Array2<f64>, StatsError> {
    let n = matrix.nrows();
    if matrix.ncols() != n {
        return Err(StatsError::DimensionMismatch {
            expected: n,
            got: matrix.ncols(),
        });
    }

    let m = DMatrix::from_row_iterator(n, n, matrix.iter().copied());
    let scale = m.amax().max(1.0);
    if m.rank(scale * 1e-12) < n {
        return Err(StatsError::SingularMatrix);
    }
    let inv = m.try_inverse().ok_or(StatsError::SingularMatrix)?;

    Ok(Array2::from_shape_fn((n, n), |(i, j)| inv[(i, j)]))
}

fn two_sided_t(t: f64, df: f64) -> f64 {
    match StudentsT::new(0.0, 1.0, df) {
        Ok(dist) if t.is_finite() => 2.0 * dist.sf(t.abs()),
        _ => f64::NAN,
    }
}

fn two_sided_normal(z: f64) -> f64 {
    match Normal::new(0.0, 1.0) {
        Ok(dist) if z.is_finite() => 2.0 * dist.sf(z.abs()),
        _ => f64::NAN,
    }
}

/// Result of an OLS fit. The first design column is assumed to be the constant.
#[derive(Debug, Clone)]
pub struct OlsFit {
    pub params: Array1<f64>,
    pub residuals: Array1<f64>,
    pub fitted: Array1<f64>,
    pub nobs: usize,
    pub df_model: usize,
    pub df_resid: usize,
    pub r_squared: f64,
    pub adj_r_squared: f64,
    /// `None` for an intercept-only model.
    pub f_statistic: Option<f64>,
    pub f_p_value: Option<f64>,
    pub bse: Array1<f64>,
    pub p_values: Array1<f64>,
    /// HC3 heteroskedasticity-robust standard errors.
    pub hc3_bse: Array1<f64>,
    /// Normal-approximation p-values for the HC3 z statistics.
    pub hc3_p_values: Array1<f64>,
}

impl OlsFit {
    pub fn fit(y: &Array1<f64>, x: &Array2<f64>) -> Result<Self, StatsError> {
        let (n, k) = x.dim();
        if y.len() != n {
            return Err(StatsError::DimensionMismatch {
                expected: n,
                got: y.len(),
            });
        }
        if n <= k {
            return Err(StatsError::InsufficientObservations {
                needed: k + 1,
                got: n,
            });
        }

        let xt = x.t();
        let xtx_inv = invert(&xt.dot(x))?;
        let params = xtx_inv.dot(&xt.dot(y));
        let fitted = x.dot(&params);
        let residuals = y - &fitted;

        let df_model = k - 1;
        let df_resid = n - k;
        let ssr = residuals.mapv(|e| e * e).sum();
        let y_mean = y.mean().unwrap_or(0.0);
        let tss = y.mapv(|v| (v - y_mean).powi(2)).sum();
        let r_squared = if tss > 0.0 { 1.0 - ssr / tss } else { 0.0 };
        let adj_r_squared = 1.0 - (1.0 - r_squared) * (n - 1) as f64 / df_resid as f64;

        let (f_statistic, f_p_value) = if df_model > 0 && ssr > 0.0 {
            let f = ((tss - ssr) / df_model as f64) / (ssr / df_resid as f64);
            let p = FisherSnedecor::new(df_model as f64, df_resid as f64)
                .map(|dist| dist.sf(f))
                .unwrap_or(f64::NAN);
            (Some(f), Some(p))
        } else {
            (None, None)
        };

        let sigma2 = ssr / df_resid as f64;
        let bse = xtx_inv.diag().mapv(|v| (v * sigma2).sqrt());
        let p_values = ndarray::Zip::from(&params)
            .and(&bse)
            .map_collect(|&b, &se| two_sided_t(b / se, df_resid as f64));

        let mut meat = Array2::<f64>::zeros((k, k));
        for (i, xi) in x.axis_iter(Axis(0)).enumerate() {
            let leverage = xi.dot(&xtx_inv.dot(&xi));
            let omega = residuals[i].powi(2) / (1.0 - leverage).powi(2);
            for a in 0..k {
                for b in 0..k {
                    meat[[a, b]] += omega * xi[a] * xi[b];
                }
            }
        }
        let hc3_cov = xtx_inv.dot(&meat).dot(&xtx_inv);
        let hc3_bse = hc3_cov.diag().mapv(f64::sqrt);
        let hc3_p_values = ndarray::Zip::from(&params)
            .and(&hc3_bse)
            .map_collect(|&b, &se| two_sided_normal(b / se));

        Ok(Self {
            params,
            residuals,
            fitted,
            nobs: n,
            df_model,
            df_resid,
            r_squared,
            adj_r_squared,
            f_statistic,
            f_p_value,
            bse,
            p_values,
            hc3_bse,
            hc3_p_values,
        })
    }
}

/// One-sample test of `mean == 0` using an intercept-only regression with
/// HC3 standard errors. Returns `(t, p)`.
pub fn robust_mean_test(values: &[f64]) -> Result<(f64, f64), StatsError> {
    let y = Array1::from(values.to_vec());
    let x = Array2::ones((values.len(), 1));
    let fit = OlsFit::fit(&y, &x)?;
    let t = fit.params[0] / fit.hc3_bse[0];
    Ok((t, fit.hc3_p_values[0]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn close(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() < tol
    }

    #[test]
    fn test_invert() {
        let m = array![[4.0, 7.0], [2.0, 6.0]];
        let inv = invert(&m).unwrap();
        assert!(close(inv[[0, 0]], 0.6, 1e-12));
        assert!(close(inv[[0, 1]], -0.7, 1e-12));
        assert!(close(inv[[1, 0]], -0.2, 1e-12));
        assert!(close(inv[[1, 1]], 0.4, 1e-12));

        let singular = array![[1.0, 2.0], [2.0, 4.0]];
        assert_eq!(invert(&singular), Err(StatsError::SingularMatrix));
    }

    #[test]
    fn test_simple_regression() {
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        let y = Array1::from(vec![2.0, 4.0, 5.0, 4.0, 5.0]);
        let fit = OlsFit::fit(&y, &add_constant(&x)).unwrap();

        assert!(close(fit.params[0], 2.2, 1e-10));
        assert!(close(fit.params[1], 0.6, 1e-10));
        assert!(close(fit.r_squared, 0.6, 1e-10));
        assert_eq!((fit.df_model, fit.df_resid), (1, 3));
        // SSR = 2.4, sigma^2 = 0.8, Var(slope) = 0.8 / 10.
        assert!(close(fit.bse[1], 0.08f64.sqrt(), 1e-10));
        assert!(close(fit.f_statistic.unwrap(), 4.5, 1e-10));
        assert!(close(fit.p_values[1], fit.f_p_value.unwrap(), 1e-9));
        assert!(close(fit.residuals.sum(), 0.0, 1e-10));
    }

    #[test]
    fn test_constant_regressor_is_singular() {
        let y = Array1::from(vec![1.0, 2.0, 3.0]);
        let result = OlsFit::fit(&y, &add_constant(&[0.0, 0.0, 0.0]));
        assert_eq!(result.err(), Some(StatsError::SingularMatrix));
    }

    #[test]
    fn test_constant_nonzero_regressor_is_singular() {
        // X'X is singular in exact arithmetic but not after rounding.
        let y = Array1::from(vec![1.0, 2.0, 4.0]);
        let result = OlsFit::fit(&y, &add_constant(&[0.693_147; 3]));
        assert_eq!(result.err(), Some(StatsError::SingularMatrix));
    }

    #[test]
    fn test_hc3_reference_values() {
        // Expected values from an exact rational computation of the same fit.
        let x = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];
        let y = Array1::from(vec![1.1, 1.9, 3.2, 3.7, 5.6, 5.1, 7.9, 6.4]);
        let fit = OlsFit::fit(&y, &add_constant(&x)).unwrap();

        assert!(close(fit.params[0], 0.360_714_285_714_285_7, 1e-10));
        assert!(close(fit.params[1], 0.889_285_714_285_714_2, 1e-10));
        assert!(close(fit.r_squared, 0.891_942_437_073_517, 1e-10));
        assert!(close(fit.hc3_bse[0], 0.568_217_381_217_960_5, 1e-9));
        assert!(close(fit.hc3_bse[1], 0.192_063_345_760_941_67, 1e-9));
        assert!(close(fit.hc3_p_values[0], 0.525_547_507_747_336_2, 1e-7));
        assert!(close(fit.hc3_p_values[1], 3.653_677_295_329_047_5e-6, 1e-9));
    }

    #[test]
    fn test_robust_mean_test() {
        // mean 2.5, residuals -1.5 -0.5 0.5 1.5, leverage 1/4 each.
        // HC3 var = sum(e^2 / 0.75^2) / 16 = 5 / 0.5625 / 16.
        let (t, p) = robust_mean_test(&[1.0, 2.0, 3.0, 4.0]).unwrap();
        let se = (5.0 / 0.5625 / 16.0f64).sqrt();
        assert!(close(t, 2.5 / se, 1e-10));
        assert!(p > 0.0 && p < 0.01);

        assert!(matches!(
            robust_mean_test(&[1.0]),
            Err(StatsError::InsufficientObservations { .. })
        ));
    }
}
