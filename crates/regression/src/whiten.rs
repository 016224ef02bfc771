//! Whitening strategies applied to the design and the response before
//! the least-squares fit.
//!
//! | Strategy | Model | Transform |
//! |----------|-------|-----------|
//! | [`Identity`] | OLS | none |
//! | [`ArWhitener`] | AR(p) | cumulative lag differencing with `rho` |
//! | [`WeightedWhitener`] | WLS | row `t` scaled by `sqrt(w_t)` |

use ndarray::{Array1, Array2, ArrayView2, ArrayViewD, Axis, s};

use crate::error::RegressionError;

/// A linear transform applied column-wise to the design and the response.
///
/// Implementations must accept any number of columns: the same transform
/// whitens the `n x k` design once and every `n x m` response later.
pub trait Whitener: Send + Sync {
    /// Returns the whitened copy of `x`.
    fn whiten(&self, x: ArrayView2<'_, f64>) -> Array2<f64>;

    /// Number of rows this transform is tied to, if any.
    ///
    /// Strategies that carry per-observation state (weights) return
    /// `Some(n)`; shift-invariant ones return `None`.
    fn n_observations(&self) -> Option<usize> {
        None
    }
}

/// The OLS transform: returns its input unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Identity;

impl Whitener for Identity {
    fn whiten(&self, x: ArrayView2<'_, f64>) -> Array2<f64> {
        x.to_owned()
    }
}

/// How the AR part of an [`ArWhitener`] is specified.
///
/// The two variants are deliberately distinct: `ArSpec::from(1usize)` is an
/// AR(1) model with a zero coefficient, while `ArSpec::from(1.0)` is an
/// AR(1) model whose coefficient is `1.0`.
#[derive(Debug, Clone, PartialEq)]
pub enum ArSpec {
    /// Order `p`; coefficients start at zero.
    Order(usize),
    /// Explicit coefficients `rho[0..p]`, lag 1 first.
    Coefficients(Vec<f64>),
}

impl ArSpec {
    /// Builds a coefficient spec from an array of any dimensionality.
    ///
    /// Length-1 axes are squeezed away. A 0-D result becomes a single
    /// coefficient; a 1-D result is taken as is.
    ///
    /// # Errors
    ///
    /// [`RegressionError::InvalidArShape`] if more than one axis remains
    /// after squeezing.
    pub fn from_array(rho: ArrayViewD<'_, f64>) -> Result<Self, RegressionError> {
        let squeezed: Vec<usize> = rho.shape().iter().copied().filter(|&d| d != 1).collect();
        if squeezed.len() > 1 {
            return Err(RegressionError::InvalidArShape { shape: squeezed });
        }
        Ok(ArSpec::Coefficients(rho.iter().copied().collect()))
    }

    /// Returns the AR order `p`.
    pub fn order(&self) -> usize {
        match self {
            ArSpec::Order(p) => *p,
            ArSpec::Coefficients(rho) => rho.len(),
        }
    }

    fn into_coefficients(self) -> Vec<f64> {
        match self {
            ArSpec::Order(p) => vec![0.0; p],
            ArSpec::Coefficients(rho) => rho,
        }
    }
}

impl From<usize> for ArSpec {
    fn from(order: usize) -> Self {
        ArSpec::Order(order)
    }
}

impl From<f64> for ArSpec {
    fn from(rho: f64) -> Self {
        ArSpec::Coefficients(vec![rho])
    }
}

impl From<Vec<f64>> for ArSpec {
    fn from(rho: Vec<f64>) -> Self {
        ArSpec::Coefficients(rho)
    }
}

impl From<&[f64]> for ArSpec {
    fn from(rho: &[f64]) -> Self {
        ArSpec::Coefficients(rho.to_vec())
    }
}

impl From<Array1<f64>> for ArSpec {
    fn from(rho: Array1<f64>) -> Self {
        ArSpec::Coefficients(rho.to_vec())
    }
}

/// AR(p) prewhitening filter.
///
/// For each lag `i = 1..=p` in turn, rows `i..` of the running output have
/// `rho[i-1]` times rows `..n-i` of the *original* input subtracted. For
/// rows `t >= p` this yields `x[t] - sum_i rho[i-1] x[t-i]`; the first `p`
/// rows only receive the lags that fit inside the series.
#[derive(Debug, Clone, PartialEq)]
pub struct ArWhitener {
    rho: Vec<f64>,
}

impl ArWhitener {
    /// Creates the filter from an order or explicit coefficients.
    ///
    /// # Errors
    ///
    /// [`RegressionError::NonFiniteInput`] if a coefficient is NaN or
    /// infinite.
    pub fn new(spec: impl Into<ArSpec>) -> Result<Self, RegressionError> {
        let rho = spec.into().into_coefficients();
        if rho.iter().any(|r| !r.is_finite()) {
            return Err(RegressionError::NonFiniteInput { input: "rho" });
        }
        Ok(Self { rho })
    }

    /// Returns the AR order `p`.
    pub fn order(&self) -> usize {
        self.rho.len()
    }

    /// Returns the AR coefficients, lag 1 first.
    pub fn rho(&self) -> &[f64] {
        &self.rho
    }
}

impl Whitener for ArWhitener {
    fn whiten(&self, x: ArrayView2<'_, f64>) -> Array2<f64> {
        let n = x.nrows();
        let mut out = x.to_owned();
        for (i, &r) in self.rho.iter().enumerate() {
            let lag = i + 1;
            if lag >= n {
                break;
            }
            out.slice_mut(s![lag.., ..])
                .scaled_add(-r, &x.slice(s![..n - lag, ..]));
        }
        out
    }
}

/// WLS prewhitening: scales row `t` by `sqrt(w_t)`.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedWhitener {
    sqrt_weights: Array1<f64>,
}

impl WeightedWhitener {
    /// Creates the filter from one non-negative weight per observation.
    ///
    /// # Errors
    ///
    /// [`RegressionError::InvalidWeights`] if `weights` is empty or has a
    /// negative entry, [`RegressionError::NonFiniteInput`] if it has a NaN
    /// or infinite entry.
    pub fn new(weights: Array1<f64>) -> Result<Self, RegressionError> {
        if weights.is_empty() {
            return Err(RegressionError::InvalidWeights {
                reason: "weights must not be empty",
            });
        }
        if weights.iter().any(|w| !w.is_finite()) {
            return Err(RegressionError::NonFiniteInput { input: "weights" });
        }
        if weights.iter().any(|&w| w < 0.0) {
            return Err(RegressionError::InvalidWeights {
                reason: "weights must be non-negative",
            });
        }
        Ok(Self {
            sqrt_weights: weights.mapv(f64::sqrt),
        })
    }

    /// Returns the weights (squares of the row scale factors).
    pub fn weights(&self) -> Array1<f64> {
        self.sqrt_weights.mapv(|s| s * s)
    }
}

impl Whitener for WeightedWhitener {
    /// # Panics
    ///
    /// Panics if `x` does not have one row per weight; [`LinearModel`]
    /// checks row counts before whitening.
    ///
    /// [`LinearModel`]: crate::LinearModel
    fn whiten(&self, x: ArrayView2<'_, f64>) -> Array2<f64> {
        assert_eq!(
            x.nrows(),
            self.sqrt_weights.len(),
            "WeightedWhitener: row count does not match weights"
        );
        &x * &self.sqrt_weights.view().insert_axis(Axis(1))
    }

    fn n_observations(&self) -> Option<usize> {
        Some(self.sqrt_weights.len())
    }
}
