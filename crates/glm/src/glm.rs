//! Mass-univariate GLM fitting with AR(1) noise grouping.

use std::collections::BTreeMap;

use ndarray::{ArrayBase, Axis, Data, Ix2};
use rayon::prelude::*;
use tracing::debug;
use voxel_regression::{ArModel, OlsModel, SimpleRegressionResults};
use voxel_stats::lag1_autocorrelation;

use crate::config::{GlmConfig, NoiseModel};
use crate::error::GlmError;

/// Per-voxel labels plus one compact fit per label.
///
/// Every voxel carries the label of the model that was fit to it. With
/// [`NoiseModel::Ols`] all voxels share label `0`; with
/// [`NoiseModel::Ar1`] the label is the voxel's discretised lag-1
/// autocorrelation, `trunc(ar1 · bins)`.
#[derive(Debug, Clone)]
pub struct GlmOutput {
    labels: Vec<i64>,
    bins: usize,
    noise_model: NoiseModel,
    results: BTreeMap<i64, SimpleRegressionResults>,
}

impl GlmOutput {
    /// Returns the label of every voxel, in response-column order.
    pub fn labels(&self) -> &[i64] {
        &self.labels
    }

    /// Returns the fits keyed by label.
    pub fn results(&self) -> &BTreeMap<i64, SimpleRegressionResults> {
        &self.results
    }

    /// Returns the fit for one label.
    pub fn result_for(&self, label: i64) -> Option<&SimpleRegressionResults> {
        self.results.get(&label)
    }

    /// Returns the AR(1) coefficient used for `label`, or `None` if no
    /// voxel carries it.
    pub fn rho_for(&self, label: i64) -> Option<f64> {
        self.results
            .contains_key(&label)
            .then(|| label as f64 / self.bins as f64)
    }

    /// Returns the bin count the labels were computed with.
    pub fn bins(&self) -> usize {
        self.bins
    }

    /// Returns the noise model the output was produced with.
    pub fn noise_model(&self) -> NoiseModel {
        self.noise_model
    }

    /// Returns the number of voxels (response columns).
    pub fn n_voxels(&self) -> usize {
        self.labels.len()
    }

    /// Voxel indices grouped by label, ascending within each group.
    pub(crate) fn voxel_groups(&self) -> BTreeMap<i64, Vec<usize>> {
        group_by_label(&self.labels)
    }
}

fn group_by_label(labels: &[i64]) -> BTreeMap<i64, Vec<usize>> {
    let mut groups: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
    for (voxel, &label) in labels.iter().enumerate() {
        groups.entry(label).or_default().push(voxel);
    }
    groups
}

/// Discretises an autocorrelation onto `1 / bins` steps, truncating toward
/// zero.
fn ar1_label(ar1: f64, bins: usize) -> i64 {
    (ar1 * bins as f64).trunc() as i64
}

/// Fits a GLM to every voxel of `y` (`n_scans x n_voxels`) against the
/// design `x` (`n_scans x n_regressors`).
///
/// An OLS fit is always computed first. For [`NoiseModel::Ar1`] each
/// voxel's OLS residuals give a lag-1 autocorrelation, voxels are grouped
/// by its discretised value and one AR(1) model per group is fit in
/// parallel.
///
/// # Errors
///
/// | Variant | Trigger |
/// |---------|---------|
/// | [`GlmError::InvalidBins`] | `config.bins() == 0` |
/// | [`GlmError::RowMismatch`] | `y.nrows() != x.nrows()` |
/// | [`GlmError::Regression`] | the design is empty or any input is non-finite |
#[tracing::instrument(skip_all, fields(n_scans = y.nrows(), n_voxels = y.ncols(), noise_model = ?config.noise_model()))]
pub fn run_glm<S, T>(
    y: &ArrayBase<S, Ix2>,
    x: &ArrayBase<T, Ix2>,
    config: &GlmConfig,
) -> Result<GlmOutput, GlmError>
where
    S: Data<Elem = f64>,
    T: Data<Elem = f64>,
{
    config.validate()?;
    if y.nrows() != x.nrows() {
        return Err(GlmError::RowMismatch {
            design_rows: x.nrows(),
            response_rows: y.nrows(),
        });
    }

    let design = x.to_owned();
    let y = y.view();
    let bins = config.bins();
    let ols_result = OlsModel::new(design.clone())?.fit(&y)?;

    let (labels, results) = match config.noise_model() {
        NoiseModel::Ols => {
            let labels = vec![0_i64; y.ncols()];
            let results = BTreeMap::from([(0_i64, ols_result.to_simple())]);
            (labels, results)
        }
        NoiseModel::Ar1 => {
            let labels: Vec<i64> = ols_result
                .resid()
                .axis_iter(Axis(1))
                .map(|resid| ar1_label(lag1_autocorrelation(resid), bins))
                .collect();
            let groups = group_by_label(&labels);
            debug!(n_groups = groups.len(), "fitting AR(1) groups");

            let results = groups
                .into_par_iter()
                .map(|(label, voxels)| -> Result<(i64, SimpleRegressionResults), GlmError> {
                    let rho = label as f64 / bins as f64;
                    debug!(label, rho, n_voxels = voxels.len(), "fitting AR(1) group");
                    let columns = y.select(Axis(1), &voxels);
                    let fit = ArModel::new(design.clone(), rho)?.fit(&columns)?;
                    Ok((label, fit.to_simple()))
                })
                .collect::<Result<BTreeMap<_, _>, GlmError>>()?;
            (labels, results)
        }
    };

    Ok(GlmOutput {
        labels,
        bins,
        noise_model: config.noise_model(),
        results,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{Array2, array};

    fn design(n: usize) -> Array2<f64> {
        Array2::from_shape_fn((n, 2), |(t, j)| if j == 0 { 1.0 } else { t as f64 })
    }

    #[test]
    fn label_truncates_toward_zero() {
        assert_eq!(ar1_label(0.259, 10), 2);
        assert_eq!(ar1_label(-0.259, 10), -2);
        assert_eq!(ar1_label(0.0, 100), 0);
        assert_eq!(ar1_label(0.999, 1), 0);
    }

    #[test]
    fn groups_preserve_voxel_order() {
        let groups = group_by_label(&[3, 1, 3, 0, 1]);
        assert_eq!(groups[&0], vec![3]);
        assert_eq!(groups[&1], vec![1, 4]);
        assert_eq!(groups[&3], vec![0, 2]);
    }

    #[test]
    fn ols_noise_model_uses_single_label() {
        let x = design(6);
        let y = array![
            [1.0, 0.0],
            [2.0, 1.0],
            [2.0, 0.0],
            [4.0, 1.0],
            [5.0, 0.0],
            [5.5, 1.0]
        ];
        let config = GlmConfig::new().with_noise_model(NoiseModel::Ols);
        let out = run_glm(&y, &x, &config).unwrap();
        assert_eq!(out.labels(), &[0, 0]);
        assert_eq!(out.results().len(), 1);
        assert_eq!(out.rho_for(0), Some(0.0));
        assert_eq!(out.n_voxels(), 2);

        let direct = OlsModel::new(x).unwrap().fit(&y).unwrap();
        assert_abs_diff_eq!(
            out.result_for(0).unwrap().theta().clone(),
            direct.theta().clone(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn zero_variance_voxel_gets_label_zero() {
        let x = design(5);
        // A silent voxel has exactly zero residual energy.
        let y = Array2::<f64>::zeros((5, 1));
        let out = run_glm(&y, &x, &GlmConfig::new()).unwrap();
        assert_eq!(out.labels(), &[0]);
        assert_eq!(out.rho_for(0), Some(0.0));
    }

    #[test]
    fn rho_for_unknown_label_is_none() {
        let x = design(5);
        let y = Array2::from_elem((5, 1), 1.0);
        let out = run_glm(&y, &x, &GlmConfig::new()).unwrap();
        assert_eq!(out.rho_for(1000), None);
    }

    #[test]
    fn row_mismatch_rejected() {
        let err = run_glm(&Array2::<f64>::zeros((4, 2)), &design(5), &GlmConfig::new()).unwrap_err();
        assert_eq!(
            err,
            GlmError::RowMismatch {
                design_rows: 5,
                response_rows: 4
            }
        );
    }

    #[test]
    fn zero_bins_rejected() {
        let config = GlmConfig::new().with_bins(0);
        let err = run_glm(&Array2::<f64>::zeros((5, 1)), &design(5), &config).unwrap_err();
        assert_eq!(err, GlmError::InvalidBins { bins: 0 });
    }

    #[test]
    fn non_finite_response_surfaces_regression_error() {
        let mut y = Array2::<f64>::zeros((5, 1));
        y[[2, 0]] = f64::NAN;
        let err = run_glm(&y, &design(5), &GlmConfig::new()).unwrap_err();
        assert!(matches!(err, GlmError::Regression(_)));
    }
}
