//! Compact results that keep only what contrasts and re-scoring need.

use std::sync::Arc;

use ndarray::{Array1, Array2, ArrayBase, Data, Ix2};
use voxel_stats::positive_reciprocals;

use crate::error::RegressionError;
use crate::model::Nuisance;
use crate::results::RegressionResults;
use crate::whiten::Whitener;

/// A reduced-memory view of a fit.
///
/// Keeps the coefficients, covariance, dispersion, nuisance parameters and
/// degrees of freedom, plus a shared handle on the unwhitened design. The
/// response, its whitened copy and the residuals are dropped, so residuals
/// are recomputed against a response passed in by the caller.
///
/// Predictions use the *unwhitened* design, unlike
/// [`RegressionResults::predicted`].
#[derive(Debug, Clone)]
pub struct SimpleRegressionResults {
    theta: Array2<f64>,
    cov: Array2<f64>,
    dispersion: Array1<f64>,
    nuisance: Option<Nuisance>,
    df_total: usize,
    df_model: usize,
    df_resid: usize,
    design: Arc<Array2<f64>>,
}

impl SimpleRegressionResults {
    /// Extracts the compact representation from a full fit.
    pub fn new<W: Whitener>(results: &RegressionResults<W>) -> Self {
        let df_total = results.y().nrows();
        let df_model = results.model().df_model();
        Self {
            theta: results.theta().clone(),
            cov: results.cov().clone(),
            dispersion: results.dispersion().clone(),
            nuisance: results.nuisance().cloned(),
            df_total,
            df_model,
            df_resid: df_total - df_model,
            design: results.model().shared_design(),
        }
    }

    /// Returns the coefficients (`n_regressors x n_cols`).
    pub fn theta(&self) -> &Array2<f64> {
        &self.theta
    }

    /// Returns the normalized covariance of the coefficients.
    pub fn cov(&self) -> &Array2<f64> {
        &self.cov
    }

    /// Returns the per-column dispersion.
    pub fn dispersion(&self) -> &Array1<f64> {
        &self.dispersion
    }

    /// Returns the nuisance parameters, if any.
    pub fn nuisance(&self) -> Option<&Nuisance> {
        self.nuisance.as_ref()
    }

    /// Returns the number of observations.
    pub fn df_total(&self) -> usize {
        self.df_total
    }

    /// Returns the rank of the design.
    pub fn df_model(&self) -> usize {
        self.df_model
    }

    /// Returns the residual degrees of freedom.
    pub fn df_resid(&self) -> usize {
        self.df_resid
    }

    /// Returns the unwhitened design the coefficients were fit against.
    pub fn design(&self) -> &Array2<f64> {
        &self.design
    }

    /// Linear predictor `X · theta` on the unwhitened design.
    pub fn predicted(&self) -> Array2<f64> {
        self.design.dot(&self.theta)
    }

    /// Residuals of `y` against the stored coefficients.
    ///
    /// # Errors
    ///
    /// [`RegressionError::DimensionMismatch`] if `y` is not
    /// `n_obs x n_cols`.
    pub fn resid<S>(&self, y: &ArrayBase<S, Ix2>) -> Result<Array2<f64>, RegressionError>
    where
        S: Data<Elem = f64>,
    {
        if y.nrows() != self.design.nrows() {
            return Err(RegressionError::DimensionMismatch {
                what: "response rows",
                expected: self.design.nrows(),
                got: y.nrows(),
            });
        }
        if y.ncols() != self.theta.ncols() {
            return Err(RegressionError::DimensionMismatch {
                what: "response columns",
                expected: self.theta.ncols(),
                got: y.ncols(),
            });
        }
        Ok(y - &self.predicted())
    }

    /// Residuals of `y` scaled by `1 / sqrt(dispersion)`, masked to zero
    /// where the dispersion is not positive.
    pub fn norm_resid<S>(&self, y: &ArrayBase<S, Ix2>) -> Result<Array2<f64>, RegressionError>
    where
        S: Data<Elem = f64>,
    {
        let scale = positive_reciprocals(&self.dispersion.mapv(f64::sqrt));
        Ok(self.resid(y)? * &scale)
    }

    /// Always fails: the whitening context needed for the likelihood is not
    /// retained.
    pub fn log_likelihood<S>(&self, _y: &ArrayBase<S, Ix2>) -> Result<Array1<f64>, RegressionError>
    where
        S: Data<Elem = f64>,
    {
        Err(RegressionError::UnsupportedOperation {
            operation: "log_likelihood",
        })
    }
}
