//! # voxel-glm
//!
//! Mass-univariate general linear model over a scans-by-voxels response
//! matrix, with AR(1) noise handled by grouping voxels on their estimated
//! autocorrelation.
//!
//! ## Pipeline
//!
//! 1. **OLS**: fit the design to every voxel at once.
//! 2. **Label**: per voxel, lag-1 autocorrelation of the OLS residuals,
//!    truncated onto a grid of `1 / bins` steps.
//! 3. **Refit**: one AR(1) model per distinct label, in parallel.
//! 4. **Contrast**: evaluate `c · theta` per label and scatter it back into
//!    voxel order as a [`Contrast`] (t or F), which gives statistics,
//!    p-values and z-scores.
//!
//! ## Quick Start
//!
//! ```
//! use ndarray::{Array2, array};
//! use voxel_glm::{GlmConfig, compute_contrast, run_glm};
//!
//! let x = Array2::from_shape_fn((6, 2), |(t, j)| if j == 0 { 1.0 } else { t as f64 });
//! let y = array![
//!     [0.1, 1.0],
//!     [1.1, 0.9],
//!     [1.9, 1.2],
//!     [3.2, 0.8],
//!     [3.9, 1.1],
//!     [5.1, 1.0]
//! ];
//!
//! let output = run_glm(&y, &x, &GlmConfig::new())?;
//! let slope = compute_contrast(&output, &array![[0.0, 1.0]], None)?;
//! let z = slope.z_score()?;
//! assert!(z[0] > z[1]);
//! # Ok::<(), voxel_glm::GlmError>(())
//! ```

mod config;
mod contrast;
mod error;
mod glm;

pub use config::{GlmConfig, NoiseModel};
pub use contrast::{Contrast, ContrastType, compute_contrast};
pub use error::GlmError;
pub use glm::{GlmOutput, run_glm};
