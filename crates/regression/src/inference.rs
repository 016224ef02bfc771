//! Covariance, confidence intervals and linear contrasts on fitted
//! coefficients.
//!
//! Both result kinds share this machinery through [`LikelihoodResults`]:
//! an implementor only provides the coefficients, the normalized
//! covariance, the per-column dispersion and the residual degrees of
//! freedom.

use ndarray::{Array1, Array2, Array3, ArrayBase, Axis, Data, Ix2, Zip};
use statrs::distribution::{ContinuousCDF, FisherSnedecor, StudentsT};
use voxel_stats::{positive_reciprocal, positive_reciprocals};

use crate::error::RegressionError;
use crate::linalg;
use crate::results::RegressionResults;
use crate::simple::SimpleRegressionResults;
use crate::whiten::Whitener;

/// Inference on the coefficients of a fitted linear model.
///
/// Shapes: `theta` is `k x m` (regressors by response columns), `cov` is
/// `k x k` and `dispersion` has length `m`. Contrasts are `q x k`.
pub trait LikelihoodResults {
    /// Fitted coefficients.
    fn theta(&self) -> &Array2<f64>;

    /// Normalized covariance of the coefficients.
    fn cov(&self) -> &Array2<f64>;

    /// Per-column dispersion.
    fn dispersion(&self) -> &Array1<f64>;

    /// Residual degrees of freedom.
    fn df_resid(&self) -> usize;

    /// Covariance of the coefficients for every column, `cov · dispersion`
    /// (`k x k x m`).
    fn vcov(&self) -> Array3<f64> {
        scale_by_dispersion(self.cov(), self.dispersion())
    }

    /// Covariance of `c · theta` for every column,
    /// `c · cov · cᵀ · dispersion` (`q x q x m`).
    ///
    /// # Errors
    ///
    /// See [`LikelihoodResults::f_contrast`].
    fn vcov_matrix<S>(&self, c: &ArrayBase<S, Ix2>) -> Result<Array3<f64>, RegressionError>
    where
        S: Data<Elem = f64>,
    {
        check_contrast(c, self.theta().nrows())?;
        let ccov = c.dot(self.cov()).dot(&c.t());
        Ok(scale_by_dispersion(&ccov, self.dispersion()))
    }

    /// Standard error of every coefficient in every column (`k x m`).
    ///
    /// A negative variance (possible only for a degenerate dispersion)
    /// yields NaN.
    fn standard_errors(&self) -> Array2<f64> {
        let diag = self.cov().diag();
        let dispersion = self.dispersion();
        Array2::from_shape_fn(self.theta().dim(), |(i, j)| {
            (diag[i] * dispersion[j]).sqrt()
        })
    }

    /// `theta / standard_error`, zero where the standard error is not
    /// positive.
    fn t_values(&self) -> Array2<f64> {
        self.theta() * &positive_reciprocals(&self.standard_errors())
    }

    /// Two-sided `1 - alpha` confidence bounds `(lower, upper)` for every
    /// coefficient, from Student's t with `df_resid` degrees of freedom.
    ///
    /// # Errors
    ///
    /// | Variant | Trigger |
    /// |---------|---------|
    /// | [`RegressionError::InvalidAlpha`] | `alpha` not in `(0, 1)` |
    /// | [`RegressionError::Distribution`] | `df_resid == 0` |
    fn conf_int(&self, alpha: f64) -> Result<(Array2<f64>, Array2<f64>), RegressionError> {
        if !(alpha > 0.0 && alpha < 1.0) {
            return Err(RegressionError::InvalidAlpha { alpha });
        }
        let q = students_t(self.df_resid())?.inverse_cdf(1.0 - alpha / 2.0);
        let half_width = self.standard_errors() * q;
        Ok((self.theta() - &half_width, self.theta() + &half_width))
    }

    /// Single-row contrast `c · theta` with its t statistic.
    ///
    /// # Errors
    ///
    /// [`RegressionError::InvalidContrast`] if `c` does not have exactly
    /// one row, otherwise as [`LikelihoodResults::f_contrast`].
    fn t_contrast<S>(&self, c: &ArrayBase<S, Ix2>) -> Result<TContrastResults, RegressionError>
    where
        S: Data<Elem = f64>,
    {
        if c.nrows() != 1 {
            return Err(RegressionError::InvalidContrast {
                reason: "t contrasts must have exactly one row",
            });
        }
        check_contrast(c, self.theta().nrows())?;

        let effect = c.dot(self.theta()).row(0).to_owned();
        let variance = c.dot(self.cov()).dot(&c.t())[[0, 0]];
        let sd = self.dispersion().mapv(|d| (variance * d).sqrt());
        let t = &effect * &positive_reciprocals(&sd);
        Ok(TContrastResults {
            effect,
            sd,
            t,
            df_den: self.df_resid(),
        })
    }

    /// Multi-row contrast `c · theta` with its F statistic.
    ///
    /// Per column, `F = (cθ)ᵀ (c · cov · cᵀ)⁻¹ (cθ) / (q · dispersion)`,
    /// zero where the dispersion is not positive.
    ///
    /// # Errors
    ///
    /// | Variant | Trigger |
    /// |---------|---------|
    /// | [`RegressionError::InvalidContrast`] | `c` has no rows |
    /// | [`RegressionError::ContrastDimensionMismatch`] | `c.ncols() != k` |
    /// | [`RegressionError::NonFiniteInput`] | `c` contains NaN or infinity |
    /// | [`RegressionError::SingularMatrix`] | `c · cov · cᵀ` is singular |
    fn f_contrast<S>(&self, c: &ArrayBase<S, Ix2>) -> Result<FContrastResults, RegressionError>
    where
        S: Data<Elem = f64>,
    {
        check_contrast(c, self.theta().nrows())?;
        let q = c.nrows();

        let ctheta = c.dot(self.theta());
        let ccov = c.dot(self.cov()).dot(&c.t());
        let inv = linalg::inverse(ccov.view())?;
        let quad = (inv.dot(&ctheta) * &ctheta).sum_axis(Axis(0));
        let f = Zip::from(&quad)
            .and(self.dispersion())
            .map_collect(|&qf, &d| qf * positive_reciprocal(q as f64 * d));

        Ok(FContrastResults {
            covariance: scale_by_dispersion(&ccov, self.dispersion()),
            effect: ctheta,
            f,
            df_num: q,
            df_den: self.df_resid(),
        })
    }
}

/// Outcome of [`LikelihoodResults::t_contrast`]; one entry per column.
#[derive(Debug, Clone, PartialEq)]
pub struct TContrastResults {
    /// `c · theta`.
    pub effect: Array1<f64>,
    /// Standard deviation of the effect.
    pub sd: Array1<f64>,
    /// `effect / sd`, zero where `sd` is not positive.
    pub t: Array1<f64>,
    /// Denominator degrees of freedom.
    pub df_den: usize,
}

impl TContrastResults {
    /// One-sided p-values `P(T > t)`.
    pub fn p_value(&self) -> Result<Array1<f64>, RegressionError> {
        let dist = students_t(self.df_den)?;
        Ok(self.t.mapv(|t| dist.sf(t)))
    }
}

/// Outcome of [`LikelihoodResults::f_contrast`].
#[derive(Debug, Clone, PartialEq)]
pub struct FContrastResults {
    /// `c · theta` (`q x m`).
    pub effect: Array2<f64>,
    /// Covariance of the effect (`q x q x m`).
    pub covariance: Array3<f64>,
    /// F statistic per column.
    pub f: Array1<f64>,
    /// Numerator degrees of freedom (contrast rows).
    pub df_num: usize,
    /// Denominator degrees of freedom.
    pub df_den: usize,
}

impl FContrastResults {
    /// Upper-tail p-values `P(F > f)`.
    pub fn p_value(&self) -> Result<Array1<f64>, RegressionError> {
        let dist = FisherSnedecor::new(self.df_num as f64, self.df_den as f64).map_err(|e| {
            RegressionError::Distribution {
                message: e.to_string(),
            }
        })?;
        Ok(self.f.mapv(|f| dist.sf(f)))
    }
}

fn check_contrast<S>(c: &ArrayBase<S, Ix2>, n_regressors: usize) -> Result<(), RegressionError>
where
    S: Data<Elem = f64>,
{
    if c.nrows() == 0 {
        return Err(RegressionError::InvalidContrast {
            reason: "contrast has no rows",
        });
    }
    if c.ncols() != n_regressors {
        return Err(RegressionError::ContrastDimensionMismatch {
            expected: n_regressors,
            got: c.ncols(),
        });
    }
    if c.iter().any(|v| !v.is_finite()) {
        return Err(RegressionError::NonFiniteInput { input: "contrast" });
    }
    Ok(())
}

fn scale_by_dispersion(matrix: &Array2<f64>, dispersion: &Array1<f64>) -> Array3<f64> {
    let (rows, cols) = matrix.dim();
    Array3::from_shape_fn((rows, cols, dispersion.len()), |(i, j, c)| {
        matrix[[i, j]] * dispersion[c]
    })
}

fn students_t(df: usize) -> Result<StudentsT, RegressionError> {
    StudentsT::new(0.0, 1.0, df as f64).map_err(|e| RegressionError::Distribution {
        message: e.to_string(),
    })
}

impl<W: Whitener> LikelihoodResults for RegressionResults<W> {
    fn theta(&self) -> &Array2<f64> {
        RegressionResults::theta(self)
    }

    fn cov(&self) -> &Array2<f64> {
        RegressionResults::cov(self)
    }

    fn dispersion(&self) -> &Array1<f64> {
        RegressionResults::dispersion(self)
    }

    fn df_resid(&self) -> usize {
        RegressionResults::df_resid(self)
    }
}

impl LikelihoodResults for SimpleRegressionResults {
    fn theta(&self) -> &Array2<f64> {
        SimpleRegressionResults::theta(self)
    }

    fn cov(&self) -> &Array2<f64> {
        SimpleRegressionResults::cov(self)
    }

    fn dispersion(&self) -> &Array1<f64> {
        SimpleRegressionResults::dispersion(self)
    }

    fn df_resid(&self) -> usize {
        SimpleRegressionResults::df_resid(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::OlsModel;
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use ndarray::array;

    // beta = [0.9, 0.9], SSE = 0.7, dispersion = 0.35,
    // (XᵀX)⁻¹ = [[0.7, -0.3], [-0.3, 0.2]], XᵀX = [[4, 6], [6, 14]].
    fn trend_fit() -> RegressionResults {
        let design = array![[1.0, 0.0], [1.0, 1.0], [1.0, 2.0], [1.0, 3.0]];
        OlsModel::new(design)
            .unwrap()
            .fit_vector(&array![1.0, 2.0, 2.0, 4.0])
            .unwrap()
    }

    #[test]
    fn vcov_scales_cov_by_dispersion() {
        let fit = trend_fit();
        let vcov = fit.vcov();
        assert_eq!(vcov.dim(), (2, 2, 1));
        assert_relative_eq!(vcov[[0, 0, 0]], 0.7 * 0.35, epsilon = 1e-12);
        assert_relative_eq!(vcov[[0, 1, 0]], -0.3 * 0.35, epsilon = 1e-12);
        assert_relative_eq!(vcov[[1, 1, 0]], 0.2 * 0.35, epsilon = 1e-12);
    }

    #[test]
    fn vcov_matrix_of_identity_is_vcov() {
        let fit = trend_fit();
        let c = Array2::<f64>::eye(2);
        assert_abs_diff_eq!(fit.vcov_matrix(&c).unwrap(), fit.vcov(), epsilon = 1e-12);
    }

    #[test]
    fn vcov_matrix_of_difference() {
        let fit = trend_fit();
        let c = array![[1.0, -1.0]];
        let v = fit.vcov_matrix(&c).unwrap();
        assert_eq!(v.dim(), (1, 1, 1));
        // 0.7 + 0.2 - 2 * (-0.3) = 1.5
        assert_relative_eq!(v[[0, 0, 0]], 1.5 * 0.35, epsilon = 1e-12);
    }

    #[test]
    fn t_values_and_standard_errors() {
        let fit = trend_fit();
        let se = fit.standard_errors();
        assert_relative_eq!(se[[1, 0]], (0.2_f64 * 0.35).sqrt(), epsilon = 1e-12);
        let t = fit.t_values();
        assert_relative_eq!(t[[1, 0]], 0.9 / (0.07_f64).sqrt(), epsilon = 1e-10);
    }

    #[test]
    fn t_contrast_on_slope() {
        let fit = trend_fit();
        let res = fit.t_contrast(&array![[0.0, 1.0]]).unwrap();
        assert_relative_eq!(res.effect[0], 0.9, epsilon = 1e-12);
        assert_relative_eq!(res.sd[0], (0.07_f64).sqrt(), epsilon = 1e-12);
        assert_relative_eq!(res.t[0], 0.9 / (0.07_f64).sqrt(), epsilon = 1e-10);
        assert_eq!(res.df_den, 2);
        let p = res.p_value().unwrap();
        assert!(p[0] > 0.0 && p[0] < 0.05);
    }

    #[test]
    fn t_contrast_of_zero_effect_has_half_p_value() {
        let fit = trend_fit();
        let res = fit.t_contrast(&array![[0.0, 0.0]]).unwrap();
        assert_eq!(res.t[0], 0.0);
        assert_relative_eq!(res.p_value().unwrap()[0], 0.5, epsilon = 1e-12);
    }

    #[test]
    fn t_contrast_rejects_multiple_rows() {
        let fit = trend_fit();
        let err = fit.t_contrast(&Array2::<f64>::eye(2)).unwrap_err();
        assert!(matches!(err, RegressionError::InvalidContrast { .. }));
    }

    #[test]
    fn contrast_must_match_regressors() {
        let fit = trend_fit();
        let err = fit.f_contrast(&array![[1.0, 0.0, 0.0]]).unwrap_err();
        assert_eq!(
            err,
            RegressionError::ContrastDimensionMismatch {
                expected: 2,
                got: 3
            }
        );
    }

    #[test]
    fn contrast_must_have_rows() {
        let fit = trend_fit();
        let err = fit.f_contrast(&Array2::<f64>::zeros((0, 2))).unwrap_err();
        assert!(matches!(err, RegressionError::InvalidContrast { .. }));
    }

    #[test]
    fn f_contrast_on_both_coefficients() {
        let fit = trend_fit();
        let res = fit.f_contrast(&Array2::<f64>::eye(2)).unwrap();
        // θᵀ XᵀX θ = 0.81 * 30 = 24.3; F = 24.3 / (2 * 0.35)
        assert_relative_eq!(res.f[0], 24.3 / 0.7, epsilon = 1e-9);
        assert_eq!(res.df_num, 2);
        assert_eq!(res.df_den, 2);
        assert_eq!(res.effect.dim(), (2, 1));
        assert_eq!(res.covariance.dim(), (2, 2, 1));
        let p = res.p_value().unwrap();
        assert!(p[0] > 0.0 && p[0] < 0.05);
    }

    #[test]
    fn single_row_f_is_t_squared() {
        let fit = trend_fit();
        let c = array![[0.0, 1.0]];
        let t = fit.t_contrast(&c).unwrap();
        let f = fit.f_contrast(&c).unwrap();
        assert_relative_eq!(f.f[0], t.t[0] * t.t[0], epsilon = 1e-9);
    }

    #[test]
    fn f_contrast_rejects_singular_covariance() {
        let fit = trend_fit();
        let err = fit.f_contrast(&array![[0.0, 1.0], [0.0, 2.0]]).unwrap_err();
        assert_eq!(err, RegressionError::SingularMatrix);
    }

    #[test]
    fn conf_int_brackets_theta() {
        let fit = trend_fit();
        let (lower, upper) = fit.conf_int(0.05).unwrap();
        // t(0.975, df = 2) = 4.302653
        let half = 4.302_652_729_911 * (0.07_f64).sqrt();
        assert_relative_eq!(lower[[1, 0]], 0.9 - half, epsilon = 1e-6);
        assert_relative_eq!(upper[[1, 0]], 0.9 + half, epsilon = 1e-6);
    }

    #[test]
    fn conf_int_rejects_bad_alpha() {
        let fit = trend_fit();
        for alpha in [0.0, 1.0, -0.1, f64::NAN] {
            assert!(matches!(
                fit.conf_int(alpha),
                Err(RegressionError::InvalidAlpha { .. })
            ));
        }
    }

    #[test]
    fn conf_int_needs_residual_dof() {
        let design = array![[1.0, 0.0], [1.0, 1.0]];
        let fit = OlsModel::new(design)
            .unwrap()
            .fit_vector(&array![1.0, 2.0])
            .unwrap();
        assert!(matches!(
            fit.conf_int(0.05),
            Err(RegressionError::Distribution { .. })
        ));
    }

    #[test]
    fn compact_results_give_same_inference() {
        let fit = trend_fit();
        let simple = fit.to_simple();
        let c = array![[1.0, 1.0]];
        assert_eq!(fit.t_contrast(&c).unwrap(), simple.t_contrast(&c).unwrap());
        assert_eq!(fit.vcov(), simple.vcov());
    }
}
