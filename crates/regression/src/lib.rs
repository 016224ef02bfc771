//! # voxel-regression
//!
//! Ordinary, weighted and autoregressive least squares for many response
//! columns at once, built on a single whitening abstraction.
//!
//! ## Workflow
//!
//! ```mermaid
//! graph LR
//!     A["OlsModel::new(x)?"] -->|".fit(&y)?"| R["RegressionResults"]
//!     B["ArModel::new(x, rho)?"] -->|".fit(&y)?"| R
//!     C["WlsModel::new(x, w)?"] -->|".fit(&y)?"| R
//!     R --> D[".predicted() / .resid() / .sse() / .r_square()"]
//!     R -->|".to_simple()"| S["SimpleRegressionResults"]
//!     R --> T["LikelihoodResults: vcov, t_contrast, f_contrast"]
//!     S --> T
//! ```
//!
//! A model is a design matrix plus a [`Whitener`]. Everything that depends
//! only on the design is computed once at construction, so one model can
//! be fit to any number of response matrices, from any number of threads.
//!
//! ## Quick Start
//!
//! ```
//! use ndarray::array;
//! use voxel_regression::{ArModel, LikelihoodResults};
//!
//! let x = array![[1.0, 0.0], [1.0, 1.0], [1.0, 2.0], [1.0, 3.0], [1.0, 4.0]];
//! let y = array![[0.1], [1.2], [1.9], [3.2], [3.9]];
//!
//! let fit = ArModel::new(x, 0.3)?.fit(&y)?;
//! let slope = fit.t_contrast(&array![[0.0, 1.0]])?;
//! assert!(slope.t[0] > 0.0);
//! # Ok::<(), voxel_regression::RegressionError>(())
//! ```
//!
//! ## Glossary
//!
//! | Symbol | Accessor | Meaning |
//! |--------|----------|---------|
//! | wX, wY | [`LinearModel::wdesign`], [`RegressionResults::wy`] | Whitened design and response |
//! | theta | [`RegressionResults::theta`] | Coefficients, `pinv(wX) · wY` |
//! | cov | [`LinearModel::normalized_cov_beta`] | `pinv(wX) · pinv(wX)ᵀ` |
//! | dispersion | [`RegressionResults::dispersion`] | `SSE / (n_obs - n_regressors)` per column |
//! | rho | [`ArModel::rho`] | AR coefficients, lag 1 first |

mod error;
mod inference;
pub mod linalg;
mod model;
mod results;
mod simple;
mod whiten;

pub use error::RegressionError;
pub use inference::{FContrastResults, LikelihoodResults, TContrastResults};
pub use model::{ArModel, LinearModel, Nuisance, OlsModel, WlsModel};
pub use results::RegressionResults;
pub use simple::SimpleRegressionResults;
pub use whiten::{ArSpec, ArWhitener, Identity, WeightedWhitener, Whitener};
