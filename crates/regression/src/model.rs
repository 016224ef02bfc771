//! The whitened least-squares estimator.

use std::f64::consts::PI;
use std::sync::Arc;

use ndarray::{Array1, Array2, ArrayBase, ArrayView2, Axis, Data, Ix1, Ix2, Zip};
use tracing::{debug, warn};

use crate::error::RegressionError;
use crate::linalg;
use crate::results::RegressionResults;
use crate::whiten::{ArSpec, ArWhitener, Identity, WeightedWhitener, Whitener};

/// Ordinary least squares: no whitening.
pub type OlsModel = LinearModel<Identity>;

/// Least squares with AR(p) prewhitening.
pub type ArModel = LinearModel<ArWhitener>;

/// Weighted least squares.
pub type WlsModel = LinearModel<WeightedWhitener>;

/// Nuisance parameters for the profile log-likelihood.
///
/// `sigma2` is the noise variance plugged into the likelihood. It holds
/// either one value shared by every response column or one value per
/// column. Without it the maximum-likelihood plug-in `SSE / n` is used.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Nuisance {
    sigma2: Option<Array1<f64>>,
}

impl Nuisance {
    /// A nuisance set with no variance estimate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets one variance per response column.
    pub fn with_sigma2(mut self, sigma2: Array1<f64>) -> Self {
        self.sigma2 = Some(sigma2);
        self
    }

    /// Sets one variance shared by all response columns.
    pub fn with_scalar_sigma2(self, sigma2: f64) -> Self {
        self.with_sigma2(Array1::from_elem(1, sigma2))
    }

    /// Returns the variance estimate, if any.
    pub fn sigma2(&self) -> Option<&Array1<f64>> {
        self.sigma2.as_ref()
    }
}

#[derive(Debug)]
struct ModelInner<W> {
    whitener: W,
    design: Arc<Array2<f64>>,
    wdesign: Array2<f64>,
    calc_beta: Array2<f64>,
    normalized_cov_beta: Array2<f64>,
    df_total: usize,
    df_model: usize,
    df_resid: usize,
}

/// A general linear model `Y = X beta + e` fit by least squares after a
/// whitening transform `W` has been applied to both `X` and `Y`.
///
/// Everything that depends only on the design (whitened design, its
/// pseudoinverse, the normalized covariance and the degrees of freedom)
/// is computed once at construction and shared by every [`fit`] call.
/// Cloning is cheap: clones share the same precomputed state.
///
/// # Example
///
/// ```
/// use ndarray::array;
/// use voxel_regression::OlsModel;
///
/// let design = array![[1.0, 0.0], [1.0, 1.0], [1.0, 2.0], [1.0, 3.0]];
/// let model = OlsModel::new(design).unwrap();
/// let fit = model.fit_vector(&array![1.0, 2.0, 2.0, 4.0]).unwrap();
/// assert!(fit.r_square()[0] < 1.0);
/// ```
///
/// [`fit`]: LinearModel::fit
#[derive(Debug)]
pub struct LinearModel<W: Whitener = Identity> {
    inner: Arc<ModelInner<W>>,
}

impl<W: Whitener> Clone for LinearModel<W> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl OlsModel {
    /// Creates an OLS model for `design` (observations in rows).
    ///
    /// No intercept column is added.
    pub fn new(design: Array2<f64>) -> Result<Self, RegressionError> {
        Self::with_whitener(design, Identity)
    }
}

impl ArModel {
    /// Creates an AR(p) model.
    ///
    /// `rho` is either an order (`usize`, coefficients start at zero) or
    /// explicit coefficients (`f64`, `Vec<f64>`, [`ArSpec`]). Note that
    /// `ArModel::new(x, 1usize)` and `ArModel::new(x, 1.0)` are different
    /// models.
    pub fn new(design: Array2<f64>, rho: impl Into<ArSpec>) -> Result<Self, RegressionError> {
        Self::with_whitener(design, ArWhitener::new(rho)?)
    }

    /// Returns the AR order `p`.
    pub fn order(&self) -> usize {
        self.inner.whitener.order()
    }

    /// Returns the AR coefficients, lag 1 first.
    pub fn rho(&self) -> &[f64] {
        self.inner.whitener.rho()
    }
}

impl WlsModel {
    /// Creates a WLS model with one non-negative weight per observation.
    pub fn new(design: Array2<f64>, weights: Array1<f64>) -> Result<Self, RegressionError> {
        Self::with_whitener(design, WeightedWhitener::new(weights)?)
    }
}

impl<W: Whitener> LinearModel<W> {
    /// Creates a model for `design` with an arbitrary whitening strategy.
    ///
    /// # Errors
    ///
    /// | Variant | Trigger |
    /// |---------|---------|
    /// | [`RegressionError::EmptyDesign`] | design has no rows or no columns |
    /// | [`RegressionError::NonFiniteInput`] | design contains NaN or infinity |
    /// | [`RegressionError::DimensionMismatch`] | whitener is tied to a different row count |
    #[tracing::instrument(skip_all, fields(n_obs = design.nrows(), n_regressors = design.ncols()))]
    pub fn with_whitener(design: Array2<f64>, whitener: W) -> Result<Self, RegressionError> {
        let (rows, cols) = design.dim();
        if rows == 0 || cols == 0 {
            return Err(RegressionError::EmptyDesign { rows, cols });
        }
        if design.iter().any(|v| !v.is_finite()) {
            return Err(RegressionError::NonFiniteInput { input: "design" });
        }
        if let Some(n) = whitener.n_observations().filter(|&n| n != rows) {
            return Err(RegressionError::DimensionMismatch {
                what: "whitener observations",
                expected: rows,
                got: n,
            });
        }

        let wdesign = whitener.whiten(design.view());
        let calc_beta = linalg::pinv(wdesign.view())?;
        let normalized_cov_beta = calc_beta.dot(&calc_beta.t());

        let df_total = wdesign.nrows();
        let tol = design.iter().map(|v| v.abs()).sum::<f64>() * f64::EPSILON;
        let df_model = linalg::matrix_rank(design.view(), tol);
        let df_resid = df_total - df_model;

        debug!(df_total, df_model, df_resid, "model initialised");
        if df_model < cols {
            warn!(rank = df_model, n_regressors = cols, "design matrix is rank deficient");
        }
        if rows <= cols {
            warn!(
                n_obs = rows,
                n_regressors = cols,
                "no residual degrees of freedom; dispersion will not be finite"
            );
        }

        Ok(Self {
            inner: Arc::new(ModelInner {
                whitener,
                design: Arc::new(design),
                wdesign,
                calc_beta,
                normalized_cov_beta,
                df_total,
                df_model,
                df_resid,
            }),
        })
    }

    /// Returns the whitening strategy.
    pub fn whitener(&self) -> &W {
        &self.inner.whitener
    }

    /// Returns the (unwhitened) design matrix.
    pub fn design(&self) -> &Array2<f64> {
        &self.inner.design
    }

    /// Returns a shared handle on the design matrix.
    pub(crate) fn shared_design(&self) -> Arc<Array2<f64>> {
        Arc::clone(&self.inner.design)
    }

    /// Returns the whitened design matrix.
    pub fn wdesign(&self) -> &Array2<f64> {
        &self.inner.wdesign
    }

    /// Returns the pseudoinverse of the whitened design (`k x n`).
    pub fn calc_beta(&self) -> &Array2<f64> {
        &self.inner.calc_beta
    }

    /// Returns `calc_beta · calc_betaᵀ` (`k x k`).
    pub fn normalized_cov_beta(&self) -> &Array2<f64> {
        &self.inner.normalized_cov_beta
    }

    /// Returns the number of observations.
    pub fn df_total(&self) -> usize {
        self.inner.df_total
    }

    /// Returns the numeric rank of the unwhitened design.
    pub fn df_model(&self) -> usize {
        self.inner.df_model
    }

    /// Returns `df_total - df_model`.
    pub fn df_resid(&self) -> usize {
        self.inner.df_resid
    }

    /// Returns the number of observations (design rows).
    pub fn n_observations(&self) -> usize {
        self.inner.design.nrows()
    }

    /// Returns the number of regressors (design columns).
    pub fn n_regressors(&self) -> usize {
        self.inner.design.ncols()
    }

    /// Applies this model's whitening transform to `x`.
    ///
    /// # Errors
    ///
    /// [`RegressionError::DimensionMismatch`] if the strategy is tied to a
    /// row count that `x` does not have.
    pub fn whiten<S>(&self, x: &ArrayBase<S, Ix2>) -> Result<Array2<f64>, RegressionError>
    where
        S: Data<Elem = f64>,
    {
        if let Some(n) = self.inner.whitener.n_observations().filter(|&n| n != x.nrows()) {
            return Err(RegressionError::DimensionMismatch {
                what: "rows to whiten",
                expected: n,
                got: x.nrows(),
            });
        }
        Ok(self.inner.whitener.whiten(x.view()))
    }

    fn check_response(&self, y: ArrayView2<'_, f64>) -> Result<(), RegressionError> {
        if y.nrows() != self.n_observations() {
            return Err(RegressionError::DimensionMismatch {
                what: "response rows",
                expected: self.n_observations(),
                got: y.nrows(),
            });
        }
        if y.iter().any(|v| !v.is_finite()) {
            return Err(RegressionError::NonFiniteInput { input: "response" });
        }
        Ok(())
    }

    /// Fits the model to every column of `y` (`n_obs x n_cols`).
    ///
    /// Computes `beta = pinv(wX) · wY`, the whitened residuals and the
    /// per-column dispersion `sum(wresid²) / (n_obs - n_regressors)`.
    ///
    /// # Errors
    ///
    /// | Variant | Trigger |
    /// |---------|---------|
    /// | [`RegressionError::DimensionMismatch`] | `y.nrows() != n_obs` |
    /// | [`RegressionError::NonFiniteInput`] | `y` contains NaN or infinity |
    #[tracing::instrument(skip_all, fields(n_cols = y.ncols()))]
    pub fn fit<S>(&self, y: &ArrayBase<S, Ix2>) -> Result<RegressionResults<W>, RegressionError>
    where
        S: Data<Elem = f64>,
    {
        self.check_response(y.view())?;

        let wy = self.inner.whitener.whiten(y.view());
        let beta = self.inner.calc_beta.dot(&wy);
        let wresid = &wy - &self.inner.wdesign.dot(&beta);
        let denom = self.n_observations() as f64 - self.n_regressors() as f64;
        let dispersion = wresid.map_axis(Axis(0), |col| col.dot(&col)) / denom;

        Ok(RegressionResults::new(
            beta,
            y.to_owned(),
            self.clone(),
            wy,
            wresid,
            self.inner.normalized_cov_beta.clone(),
            dispersion,
        ))
    }

    /// Fits the model to a single response vector.
    pub fn fit_vector<S>(&self, y: &ArrayBase<S, Ix1>) -> Result<RegressionResults<W>, RegressionError>
    where
        S: Data<Elem = f64>,
    {
        self.fit(&y.view().insert_axis(Axis(1)))
    }

    /// Profile log-likelihood of `beta` for every column of `y`.
    ///
    /// ```text
    /// loglf = -n/2 · ln(2π σ²) - SSE / (2σ²)
    /// ```
    ///
    /// with `n = df_total`, `SSE` the whitened residual sum of squares and
    /// `σ²` taken from `nuisance` or, when absent, its maximum-likelihood
    /// value `SSE / n`.
    ///
    /// # Errors
    ///
    /// [`RegressionError::DimensionMismatch`] if `beta`, `y` and the design
    /// disagree, or if `nuisance` has neither one nor `n_cols` variances.
    pub fn log_likelihood<S, T>(
        &self,
        beta: &ArrayBase<S, Ix2>,
        y: &ArrayBase<T, Ix2>,
        nuisance: Option<&Nuisance>,
    ) -> Result<Array1<f64>, RegressionError>
    where
        S: Data<Elem = f64>,
        T: Data<Elem = f64>,
    {
        self.check_response(y.view())?;
        if beta.nrows() != self.n_regressors() {
            return Err(RegressionError::DimensionMismatch {
                what: "coefficient rows",
                expected: self.n_regressors(),
                got: beta.nrows(),
            });
        }
        if beta.ncols() != y.ncols() {
            return Err(RegressionError::DimensionMismatch {
                what: "coefficient columns",
                expected: y.ncols(),
                got: beta.ncols(),
            });
        }

        let wy = self.inner.whitener.whiten(y.view());
        let resid = wy - self.inner.wdesign.dot(beta);
        let n = self.df_total() as f64;
        let sse = resid.map_axis(Axis(0), |col| col.dot(&col));

        let sigma2 = match nuisance.and_then(Nuisance::sigma2) {
            Some(s) if s.len() == 1 => Array1::from_elem(sse.len(), s[0]),
            Some(s) if s.len() == sse.len() => s.clone(),
            Some(s) => {
                return Err(RegressionError::DimensionMismatch {
                    what: "nuisance variances",
                    expected: sse.len(),
                    got: s.len(),
                });
            }
            None => &sse / n,
        };

        Ok(Zip::from(&sse)
            .and(&sigma2)
            .map_collect(|&sse, &s2| -n / 2.0 * (2.0 * PI * s2).ln() - sse / (2.0 * s2)))
    }

    /// Profile log-likelihood for a single response vector.
    pub fn log_likelihood_vector<S, T>(
        &self,
        beta: &ArrayBase<S, Ix1>,
        y: &ArrayBase<T, Ix1>,
        nuisance: Option<&Nuisance>,
    ) -> Result<f64, RegressionError>
    where
        S: Data<Elem = f64>,
        T: Data<Elem = f64>,
    {
        let loglf = self.log_likelihood(
            &beta.view().insert_axis(Axis(1)),
            &y.view().insert_axis(Axis(1)),
            nuisance,
        )?;
        Ok(loglf[0])
    }
}
