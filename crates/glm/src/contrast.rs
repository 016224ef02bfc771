//! Voxel-wise contrasts across label groups, with fixed-effects
//! combination.

use std::ops::{Add, Div, Mul};

use ndarray::{Array1, Array2, Array3, ArrayBase, Data, Ix2, Zip, s};
use statrs::distribution::{ContinuousCDF, FisherSnedecor, Normal, StudentsT};
use voxel_regression::{LikelihoodResults, linalg};

use crate::error::GlmError;
use crate::glm::GlmOutput;

/// Floor on a t-contrast variance before taking its square root.
const TINY: f64 = 1e-50;

/// Cap on the degrees of freedom passed to the reference distributions.
const DOF_MAX: f64 = 1e10;

/// P-values are clamped to `[P_MIN, 1 - P_MAX_GAP]` before conversion to
/// z-scores.
const P_MIN: f64 = 1e-300;
const P_MAX_GAP: f64 = 1e-16;

/// Kind of test a contrast is evaluated with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContrastType {
    /// Student's t, single-row contrast.
    T,
    /// Fisher's F, one or more rows.
    F,
}

impl ContrastType {
    /// `T` for a single-row contrast, `F` otherwise.
    pub fn infer(n_rows: usize) -> Self {
        if n_rows == 1 { Self::T } else { Self::F }
    }
}

/// A contrast evaluated at every voxel.
///
/// `effect` is `dim x n_voxels` and `variance` is
/// `dim x dim x n_voxels`. Contrasts of the same type and dimension can be
/// summed for a fixed-effects combination across runs.
#[derive(Debug, Clone, PartialEq)]
pub struct Contrast {
    effect: Array2<f64>,
    variance: Array3<f64>,
    dof: f64,
    contrast_type: ContrastType,
}

impl Contrast {
    /// Builds a contrast from its effect and variance.
    ///
    /// # Errors
    ///
    /// [`GlmError::InvalidContrast`] if the effect has no rows, if the
    /// variance is not `dim x dim x n_voxels`, or if a t contrast has more
    /// than one row.
    pub fn new(
        effect: Array2<f64>,
        variance: Array3<f64>,
        dof: f64,
        contrast_type: ContrastType,
    ) -> Result<Self, GlmError> {
        let (dim, n) = effect.dim();
        if dim == 0 {
            return Err(GlmError::InvalidContrast {
                reason: "contrast has no rows",
            });
        }
        if contrast_type == ContrastType::T && dim != 1 {
            return Err(GlmError::InvalidContrast {
                reason: "t contrasts must have exactly one row",
            });
        }
        if variance.dim() != (dim, dim, n) {
            return Err(GlmError::InvalidContrast {
                reason: "variance must be dim x dim x n_voxels",
            });
        }
        Ok(Self {
            effect,
            variance,
            dof,
            contrast_type,
        })
    }

    /// Returns the effect (`dim x n_voxels`).
    pub fn effect(&self) -> &Array2<f64> {
        &self.effect
    }

    /// Returns the variance of the effect (`dim x dim x n_voxels`).
    pub fn variance(&self) -> &Array3<f64> {
        &self.variance
    }

    /// Returns the number of contrast rows.
    pub fn dim(&self) -> usize {
        self.effect.nrows()
    }

    /// Returns the residual degrees of freedom.
    pub fn dof(&self) -> f64 {
        self.dof
    }

    /// Returns the test type.
    pub fn contrast_type(&self) -> ContrastType {
        self.contrast_type
    }

    /// Returns the number of voxels.
    pub fn n_voxels(&self) -> usize {
        self.effect.ncols()
    }

    /// Test statistic against a zero baseline.
    pub fn stat(&self) -> Result<Array1<f64>, GlmError> {
        self.stat_at(0.0)
    }

    /// Test statistic against `baseline`.
    ///
    /// t: `(effect - baseline) / sqrt(max(variance, 1e-50))`.
    /// F: `eᵀ V⁻¹ e / dim` with `e = effect - baseline`.
    ///
    /// # Errors
    ///
    /// [`GlmError::Regression`] wrapping
    /// [`SingularMatrix`](voxel_regression::RegressionError::SingularMatrix)
    /// if an F variance block cannot be inverted.
    pub fn stat_at(&self, baseline: f64) -> Result<Array1<f64>, GlmError> {
        match self.contrast_type {
            ContrastType::T => Ok(Zip::from(self.effect.row(0))
                .and(self.variance.slice(s![0, 0, ..]))
                .map_collect(|&e, &v| (e - baseline) / v.max(TINY).sqrt())),
            ContrastType::F => {
                let dim = self.dim() as f64;
                (0..self.n_voxels())
                    .map(|voxel| -> Result<f64, GlmError> {
                        let e = self.effect.column(voxel).mapv(|v| v - baseline);
                        let v = self.variance.slice(s![.., .., voxel]);
                        let x = linalg::solve(v, e.view())?;
                        Ok(e.dot(&x) / dim)
                    })
                    .collect()
            }
        }
    }

    /// Upper-tail p-values against a zero baseline.
    pub fn p_value(&self) -> Result<Array1<f64>, GlmError> {
        self.p_value_at(0.0)
    }

    /// Upper-tail p-values of [`Contrast::stat_at`].
    ///
    /// # Errors
    ///
    /// [`GlmError::Distribution`] if `dof` is not positive.
    pub fn p_value_at(&self, baseline: f64) -> Result<Array1<f64>, GlmError> {
        let stat = self.stat_at(baseline)?;
        let dof = self.dof.min(DOF_MAX);
        let to_err = |message: String| GlmError::Distribution { message };
        match self.contrast_type {
            ContrastType::T => {
                let dist = StudentsT::new(0.0, 1.0, dof).map_err(|e| to_err(e.to_string()))?;
                Ok(stat.mapv(|t| dist.sf(t)))
            }
            ContrastType::F => {
                let dist = FisherSnedecor::new(self.dim() as f64, dof)
                    .map_err(|e| to_err(e.to_string()))?;
                Ok(stat.mapv(|f| dist.sf(f)))
            }
        }
    }

    /// Standard-normal z-scores with the same upper-tail probability as
    /// [`Contrast::p_value`].
    pub fn z_score(&self) -> Result<Array1<f64>, GlmError> {
        self.z_score_at(0.0)
    }

    /// Z-scores of [`Contrast::p_value_at`], with p-values clamped away
    /// from 0 and 1.
    pub fn z_score_at(&self, baseline: f64) -> Result<Array1<f64>, GlmError> {
        let p = self.p_value_at(baseline)?;
        let normal = Normal::new(0.0, 1.0).map_err(|e| GlmError::Distribution {
            message: e.to_string(),
        })?;
        Ok(p.mapv(|p| -normal.inverse_cdf(p.clamp(P_MIN, 1.0 - P_MAX_GAP))))
    }
}

impl Add for Contrast {
    type Output = Result<Contrast, GlmError>;

    /// Fixed-effects combination: effects, variances and degrees of
    /// freedom are summed.
    fn add(self, other: Contrast) -> Self::Output {
        if self.contrast_type != other.contrast_type {
            return Err(GlmError::IncompatibleContrasts {
                reason: "contrast types differ",
            });
        }
        if self.effect.dim() != other.effect.dim() {
            return Err(GlmError::IncompatibleContrasts {
                reason: "contrast shapes differ",
            });
        }
        Ok(Contrast {
            effect: self.effect + &other.effect,
            variance: self.variance + &other.variance,
            dof: self.dof + other.dof,
            contrast_type: self.contrast_type,
        })
    }
}

impl Mul<f64> for Contrast {
    type Output = Contrast;

    /// Scales the effect by `scalar` and the variance by `scalar²`.
    fn mul(self, scalar: f64) -> Contrast {
        Contrast {
            effect: self.effect * scalar,
            variance: self.variance * (scalar * scalar),
            ..self
        }
    }
}

impl Div<f64> for Contrast {
    type Output = Contrast;

    /// Divides the effect by `scalar` and the variance by `scalar²`.
    fn div(self, scalar: f64) -> Contrast {
        Contrast {
            effect: self.effect / scalar,
            variance: self.variance / (scalar * scalar),
            ..self
        }
    }
}

/// Evaluates `con` (`dim x n_regressors`) at every voxel of a GLM fit.
///
/// Each label's fit contributes `con · theta` and `con · cov · conᵀ ·
/// dispersion` for its voxels; the pieces are scattered back into voxel
/// order. When `contrast_type` is `None` it is inferred from the row
/// count.
///
/// # Errors
///
/// | Variant | Trigger |
/// |---------|---------|
/// | [`GlmError::InvalidContrast`] | `con` has no rows, or a t contrast has several |
/// | [`GlmError::Regression`] | `con` does not match the design or is non-finite |
pub fn compute_contrast<S>(
    output: &GlmOutput,
    con: &ArrayBase<S, Ix2>,
    contrast_type: Option<ContrastType>,
) -> Result<Contrast, GlmError>
where
    S: Data<Elem = f64>,
{
    let dim = con.nrows();
    if dim == 0 {
        return Err(GlmError::InvalidContrast {
            reason: "contrast has no rows",
        });
    }
    let contrast_type = contrast_type.unwrap_or_else(|| ContrastType::infer(dim));
    if contrast_type == ContrastType::T && dim > 1 {
        return Err(GlmError::InvalidContrast {
            reason: "t contrasts must have exactly one row",
        });
    }

    let n = output.n_voxels();
    let mut effect = Array2::zeros((dim, n));
    let mut variance = Array3::zeros((dim, dim, n));
    let mut dof: Option<f64> = None;

    for (label, voxels) in output.voxel_groups() {
        let Some(result) = output.result_for(label) else {
            continue;
        };
        let label_variance = result.vcov_matrix(con)?;
        let label_effect = con.dot(result.theta());
        for (k, &voxel) in voxels.iter().enumerate() {
            effect.column_mut(voxel).assign(&label_effect.column(k));
            variance
                .slice_mut(s![.., .., voxel])
                .assign(&label_variance.slice(s![.., .., k]));
        }
        // Every label is fit against the same design.
        let label_dof = result.df_resid() as f64;
        debug_assert!(
            dof.is_none_or(|d| d == label_dof),
            "labels disagree on residual dof"
        );
        dof.get_or_insert(label_dof);
    }

    Contrast::new(effect, variance, dof.unwrap_or(0.0), contrast_type)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    fn t_contrast(effect: Array1<f64>, variance: Array1<f64>, dof: f64) -> Contrast {
        let n = effect.len();
        let effect = effect.insert_axis(ndarray::Axis(0));
        let variance = variance
            .into_shape_with_order((1, 1, n))
            .unwrap();
        Contrast::new(effect, variance, dof, ContrastType::T).unwrap()
    }

    #[test]
    fn infer_type_from_rows() {
        assert_eq!(ContrastType::infer(1), ContrastType::T);
        assert_eq!(ContrastType::infer(2), ContrastType::F);
    }

    #[test]
    fn t_stat_divides_by_sd() {
        let c = t_contrast(array![2.0, -3.0], array![4.0, 9.0], 10.0);
        let stat = c.stat().unwrap();
        assert_relative_eq!(stat[0], 1.0);
        assert_relative_eq!(stat[1], -1.0);
    }

    #[test]
    fn t_stat_floors_zero_variance() {
        let c = t_contrast(array![0.0, 1e-30], array![0.0, 0.0], 10.0);
        let stat = c.stat().unwrap();
        assert_eq!(stat[0], 0.0);
        assert_relative_eq!(stat[1], 1e-30 / TINY.sqrt());
    }

    #[test]
    fn t_stat_with_baseline() {
        let c = t_contrast(array![3.0], array![4.0], 10.0);
        assert_relative_eq!(c.stat_at(1.0).unwrap()[0], 1.0);
    }

    #[test]
    fn zero_t_has_half_p_and_zero_z() {
        let c = t_contrast(array![0.0], array![1.0], 20.0);
        assert_relative_eq!(c.p_value().unwrap()[0], 0.5, epsilon = 1e-12);
        assert!(c.z_score().unwrap()[0].abs() < 1e-8);
    }

    #[test]
    fn z_score_is_clamped() {
        let c = t_contrast(array![1e6, -1e6], array![1.0, 1.0], 100.0);
        let z = c.z_score().unwrap();
        assert!(z.iter().all(|v| v.is_finite()));
        assert!(z[0] > 30.0);
        assert!(z[1] < -8.0);
    }

    #[test]
    fn large_dof_t_is_close_to_normal() {
        let c = t_contrast(array![1.96], array![1.0], 1e4);
        let p = c.p_value().unwrap()[0];
        assert_relative_eq!(p, 0.025, epsilon = 1e-3);
        assert_relative_eq!(c.z_score().unwrap()[0], 1.96, epsilon = 1e-3);
    }

    #[test]
    fn f_stat_is_mahalanobis_over_dim() {
        let effect = array![[1.0], [2.0]];
        let mut variance = Array3::zeros((2, 2, 1));
        variance[[0, 0, 0]] = 2.0;
        variance[[1, 1, 0]] = 4.0;
        let c = Contrast::new(effect, variance, 10.0, ContrastType::F).unwrap();
        // (1/2 + 4/4) / 2
        assert_relative_eq!(c.stat().unwrap()[0], 0.75, epsilon = 1e-12);
        let p = c.p_value().unwrap()[0];
        assert!(p > 0.0 && p < 1.0);
    }

    #[test]
    fn f_stat_rejects_singular_variance() {
        let c = Contrast::new(
            array![[1.0], [1.0]],
            Array3::zeros((2, 2, 1)),
            10.0,
            ContrastType::F,
        )
        .unwrap();
        assert!(matches!(c.stat(), Err(GlmError::Regression(_))));
    }

    #[test]
    fn new_validates_shapes() {
        let err = Contrast::new(
            Array2::zeros((2, 3)),
            Array3::zeros((2, 2, 3)),
            5.0,
            ContrastType::T,
        )
        .unwrap_err();
        assert!(matches!(err, GlmError::InvalidContrast { .. }));

        let err = Contrast::new(
            Array2::zeros((2, 3)),
            Array3::zeros((2, 2, 2)),
            5.0,
            ContrastType::F,
        )
        .unwrap_err();
        assert!(matches!(err, GlmError::InvalidContrast { .. }));
    }

    #[test]
    fn add_sums_effects_variances_and_dof() {
        let a = t_contrast(array![1.0, 2.0], array![1.0, 1.0], 10.0);
        let b = t_contrast(array![3.0, 2.0], array![3.0, 1.0], 12.0);
        let sum = (a + b).unwrap();
        assert_eq!(sum.effect(), &array![[4.0, 4.0]]);
        assert_eq!(sum.variance().slice(s![0, 0, ..]), array![4.0, 2.0]);
        assert_eq!(sum.dof(), 22.0);
        assert_eq!(sum.contrast_type(), ContrastType::T);
    }

    #[test]
    fn add_rejects_mixed_types() {
        let a = t_contrast(array![1.0], array![1.0], 10.0);
        let b = Contrast::new(
            array![[1.0]],
            Array3::ones((1, 1, 1)),
            10.0,
            ContrastType::F,
        )
        .unwrap();
        assert_eq!(
            (a + b).unwrap_err(),
            GlmError::IncompatibleContrasts {
                reason: "contrast types differ"
            }
        );
    }

    #[test]
    fn add_rejects_mismatched_voxels() {
        let a = t_contrast(array![1.0], array![1.0], 10.0);
        let b = t_contrast(array![1.0, 2.0], array![1.0, 1.0], 10.0);
        assert!(matches!(
            a + b,
            Err(GlmError::IncompatibleContrasts { .. })
        ));
    }

    #[test]
    fn scaling_keeps_t_stat() {
        let c = t_contrast(array![2.0, -1.0], array![4.0, 0.25], 10.0);
        let stat = c.stat().unwrap();
        let halved = c.clone() / 2.0;
        assert_eq!(halved.effect(), &array![[1.0, -0.5]]);
        assert_relative_eq!(halved.variance()[[0, 0, 0]], 1.0);
        let tripled = c * 3.0;
        assert_relative_eq!(tripled.stat().unwrap()[0], stat[0], epsilon = 1e-12);
        assert_relative_eq!(halved.stat().unwrap()[1], stat[1], epsilon = 1e-12);
    }

    #[test]
    fn non_positive_dof_fails_p_value() {
        let c = t_contrast(array![1.0], array![1.0], 0.0);
        assert!(c.stat().is_ok());
        assert!(matches!(c.p_value(), Err(GlmError::Distribution { .. })));
    }

    #[test]
    fn dof_is_shared_residual_dof_across_labels() {
        use rand::SeedableRng;
        use rand_distr::Distribution;

        let n = 200;
        let x = Array2::from_shape_fn((n, 2), |(t, j)| if j == 0 { 1.0 } else { (t % 20 / 10) as f64 });
        let mut rng = rand::rngs::StdRng::seed_from_u64(11);
        let normal = rand_distr::Normal::new(0.0, 1.0).unwrap();
        let phis = [-0.5, 0.0, 0.6];
        let mut y = Array2::zeros((n, phis.len()));
        for (j, &phi) in phis.iter().enumerate() {
            let mut e = 0.0;
            for t in 0..n {
                e = phi * e + normal.sample(&mut rng);
                y[[t, j]] = e;
            }
        }

        let out = crate::run_glm(&y, &x, &crate::GlmConfig::new()).unwrap();
        assert_eq!(out.results().len(), 3, "labels = {:?}", out.labels());
        assert!(out.results().values().all(|r| r.df_resid() == n - 2));
        let con = compute_contrast(&out, &array![[0.0, 1.0]], None).unwrap();
        assert_eq!(con.dof(), (n - 2) as f64);
    }

    #[test]
    fn empty_output_has_zero_dof() {
        let x = Array2::from_shape_fn((6, 2), |(t, j)| if j == 0 { 1.0 } else { t as f64 });
        let y = Array2::<f64>::zeros((6, 0));
        let out = crate::run_glm(&y, &x, &crate::GlmConfig::new()).unwrap();
        let con = compute_contrast(&out, &array![[0.0, 1.0]], None).unwrap();
        assert_eq!(con.n_voxels(), 0);
        assert_eq!(con.dof(), 0.0);
    }
}
