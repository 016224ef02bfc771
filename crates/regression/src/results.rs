//! Full results of a least-squares fit.

use std::sync::OnceLock;

use ndarray::{Array1, Array2, Axis};
use voxel_stats::{column_variance, positive_reciprocals};

use crate::error::RegressionError;
use crate::model::{LinearModel, Nuisance};
use crate::simple::SimpleRegressionResults;
use crate::whiten::{Identity, Whitener};

/// The outcome of [`LinearModel::fit`].
///
/// Holds the coefficients, the response, its whitened version, the
/// whitened residuals, the normalized covariance and the dispersion, plus a
/// handle on the model that produced them. Derived quantities are computed
/// on first access and cached for the lifetime of the value; the cache is
/// thread-safe, so a result can be shared across threads.
///
/// All per-column quantities have one entry per response column.
#[derive(Debug, Clone)]
pub struct RegressionResults<W: Whitener = Identity> {
    theta: Array2<f64>,
    y: Array2<f64>,
    model: LinearModel<W>,
    wy: Array2<f64>,
    wresid: Array2<f64>,
    cov: Array2<f64>,
    dispersion: Array1<f64>,
    nuisance: Option<Nuisance>,

    predicted: OnceLock<Array2<f64>>,
    resid: OnceLock<Array2<f64>>,
    norm_resid: OnceLock<Array2<f64>>,
    sse: OnceLock<Array1<f64>>,
    r_square: OnceLock<Array1<f64>>,
    mse: OnceLock<Array1<f64>>,
}

impl<W: Whitener> RegressionResults<W> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        theta: Array2<f64>,
        y: Array2<f64>,
        model: LinearModel<W>,
        wy: Array2<f64>,
        wresid: Array2<f64>,
        cov: Array2<f64>,
        dispersion: Array1<f64>,
    ) -> Self {
        Self {
            theta,
            y,
            model,
            wy,
            wresid,
            cov,
            dispersion,
            nuisance: None,
            predicted: OnceLock::new(),
            resid: OnceLock::new(),
            norm_resid: OnceLock::new(),
            sse: OnceLock::new(),
            r_square: OnceLock::new(),
            mse: OnceLock::new(),
        }
    }

    /// Attaches nuisance parameters used by [`log_likelihood`].
    ///
    /// [`log_likelihood`]: RegressionResults::log_likelihood
    pub fn with_nuisance(mut self, nuisance: Nuisance) -> Self {
        self.nuisance = Some(nuisance);
        self
    }

    /// Returns the coefficients (`n_regressors x n_cols`).
    pub fn theta(&self) -> &Array2<f64> {
        &self.theta
    }

    /// Returns the response the model was fit to.
    pub fn y(&self) -> &Array2<f64> {
        &self.y
    }

    /// Returns the whitened response.
    pub fn wy(&self) -> &Array2<f64> {
        &self.wy
    }

    /// Returns the whitened residuals `wY - wX · theta`.
    pub fn wresid(&self) -> &Array2<f64> {
        &self.wresid
    }

    /// Returns the normalized covariance of the coefficients.
    pub fn cov(&self) -> &Array2<f64> {
        &self.cov
    }

    /// Returns the per-column dispersion (residual variance estimate).
    pub fn dispersion(&self) -> &Array1<f64> {
        &self.dispersion
    }

    /// Returns the nuisance parameters, if any were attached.
    pub fn nuisance(&self) -> Option<&Nuisance> {
        self.nuisance.as_ref()
    }

    /// Returns the model that produced this fit.
    pub fn model(&self) -> &LinearModel<W> {
        &self.model
    }

    /// Returns the whitened design of the producing model.
    pub fn wdesign(&self) -> &Array2<f64> {
        self.model.wdesign()
    }

    /// Returns the number of observations.
    pub fn df_total(&self) -> usize {
        self.model.df_total()
    }

    /// Returns the rank of the design.
    pub fn df_model(&self) -> usize {
        self.model.df_model()
    }

    /// Returns the residual degrees of freedom.
    pub fn df_resid(&self) -> usize {
        self.model.df_resid()
    }

    /// Linear predictor `wX · theta`.
    pub fn predicted(&self) -> &Array2<f64> {
        self.predicted
            .get_or_init(|| self.model.wdesign().dot(&self.theta))
    }

    /// Residuals `Y - predicted`.
    ///
    /// The observed response is the unwhitened one while the prediction
    /// uses the whitened design; for OLS the two designs coincide.
    pub fn resid(&self) -> &Array2<f64> {
        self.resid.get_or_init(|| &self.y - self.predicted())
    }

    /// Residuals scaled by `1 / sqrt(dispersion)`, masked to zero where the
    /// dispersion is not positive.
    pub fn norm_resid(&self) -> &Array2<f64> {
        self.norm_resid.get_or_init(|| {
            let scale = positive_reciprocals(&self.dispersion.mapv(f64::sqrt));
            self.resid() * &scale
        })
    }

    /// Whitened residual sum of squares (a pseudo-SSE for non-OLS models).
    pub fn sse(&self) -> &Array1<f64> {
        self.sse
            .get_or_init(|| self.wresid.map_axis(Axis(0), |col| col.dot(&col)))
    }

    /// `var(predicted) / var(wY)` (a pseudo-R² for non-OLS models).
    pub fn r_square(&self) -> &Array1<f64> {
        self.r_square.get_or_init(|| {
            column_variance(self.predicted().view()) / column_variance(self.wy.view())
        })
    }

    /// Mean squared error `SSE / df_resid`.
    pub fn mse(&self) -> &Array1<f64> {
        self.mse
            .get_or_init(|| self.sse() / self.df_resid() as f64)
    }

    /// Log-likelihood of the model at `theta`, using the attached nuisance
    /// parameters when present.
    pub fn log_likelihood(&self) -> Result<Array1<f64>, RegressionError> {
        self.model
            .log_likelihood(&self.theta, &self.y, self.nuisance.as_ref())
    }

    /// Projects this fit onto the compact representation.
    pub fn to_simple(&self) -> SimpleRegressionResults {
        SimpleRegressionResults::new(self)
    }
}

impl<W: Whitener> From<&RegressionResults<W>> for SimpleRegressionResults {
    fn from(results: &RegressionResults<W>) -> Self {
        SimpleRegressionResults::new(results)
    }
}
