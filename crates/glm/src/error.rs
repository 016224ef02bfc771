//! Error types for the voxel-glm crate.

use voxel_regression::RegressionError;

/// Error type for all fallible operations in the voxel-glm crate.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GlmError {
    /// Returned when the AR(1) discretisation has no bins.
    #[error("bins must be at least 1, got {bins}")]
    InvalidBins {
        /// The rejected bin count.
        bins: usize,
    },

    /// Returned when a configuration source cannot be parsed.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the parse failure.
        message: String,
    },

    /// Returned when the response and the design disagree on the number
    /// of scans.
    #[error("response has {response_rows} scans but the design has {design_rows}")]
    RowMismatch {
        /// Rows of the design matrix.
        design_rows: usize,
        /// Rows of the response matrix.
        response_rows: usize,
    },

    /// Returned when a contrast cannot be evaluated with the requested test.
    #[error("invalid contrast: {reason}")]
    InvalidContrast {
        /// Why the contrast was rejected.
        reason: &'static str,
    },

    /// Returned when two contrasts cannot be combined.
    #[error("incompatible contrasts: {reason}")]
    IncompatibleContrasts {
        /// What differs between the operands.
        reason: &'static str,
    },

    /// Returned when a reference distribution cannot be built.
    #[error("distribution error: {message}")]
    Distribution {
        /// Description of the underlying statrs failure.
        message: String,
    },

    /// A failure inside model fitting or inference.
    #[error("regression failed: {0}")]
    Regression(#[from] RegressionError),
}
