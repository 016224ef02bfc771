//! Error types for the voxel-regression crate.

/// Error type for all fallible operations in the voxel-regression crate.
///
/// Every failure is a shape, value or configuration mismatch reported
/// synchronously to the caller; nothing here is retried.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RegressionError {
    /// Returned when the design matrix has no rows or no columns.
    #[error("design matrix is empty ({rows}x{cols})")]
    EmptyDesign {
        /// Number of rows in the design.
        rows: usize,
        /// Number of columns in the design.
        cols: usize,
    },

    /// Returned when an input array contains NaN or infinity.
    #[error("non-finite value in {input}")]
    NonFiniteInput {
        /// Name of the input containing the non-finite value.
        input: &'static str,
    },

    /// Returned when two arrays that must agree along an axis do not.
    #[error("{what}: expected {expected}, got {got}")]
    DimensionMismatch {
        /// Description of the checked extent.
        what: &'static str,
        /// Extent implied by the model.
        expected: usize,
        /// Extent actually supplied.
        got: usize,
    },

    /// Returned when AR coefficients are neither a scalar nor a vector.
    #[error("AR parameters must be a scalar or a vector, got shape {shape:?}")]
    InvalidArShape {
        /// Shape of the supplied coefficient array after squeezing.
        shape: Vec<usize>,
    },

    /// Returned when WLS weights are unusable.
    #[error("invalid weights: {reason}")]
    InvalidWeights {
        /// Why the weights were rejected.
        reason: &'static str,
    },

    /// Returned when an operation is not available on a result type.
    #[error("{operation} is not supported on compact results")]
    UnsupportedOperation {
        /// Name of the rejected operation.
        operation: &'static str,
    },

    /// Returned when a contrast matrix has an unusable shape for the test.
    #[error("invalid contrast: {reason}")]
    InvalidContrast {
        /// Why the contrast was rejected.
        reason: &'static str,
    },

    /// Returned when a contrast does not have one column per regressor.
    #[error("contrast has {got} columns but the model has {expected} regressors")]
    ContrastDimensionMismatch {
        /// Number of regressors in the fitted model.
        expected: usize,
        /// Number of contrast columns supplied.
        got: usize,
    },

    /// Returned when a confidence level is outside `(0, 1)`.
    #[error("alpha must lie strictly between 0 and 1, got {alpha}")]
    InvalidAlpha {
        /// The rejected significance level.
        alpha: f64,
    },

    /// Returned when a matrix that must be inverted is singular.
    #[error("matrix is singular")]
    SingularMatrix,

    /// Returned when a reference distribution cannot be built.
    ///
    /// The message is a `String` because statrs errors do not implement
    /// `Clone`.
    #[error("distribution error: {message}")]
    Distribution {
        /// Description of the underlying statrs failure.
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_empty_design() {
        let err = RegressionError::EmptyDesign { rows: 0, cols: 3 };
        assert_eq!(err.to_string(), "design matrix is empty (0x3)");
    }

    #[test]
    fn error_non_finite_input() {
        let err = RegressionError::NonFiniteInput { input: "response" };
        assert_eq!(err.to_string(), "non-finite value in response");
    }

    #[test]
    fn error_dimension_mismatch() {
        let err = RegressionError::DimensionMismatch {
            what: "response rows",
            expected: 10,
            got: 9,
        };
        assert_eq!(err.to_string(), "response rows: expected 10, got 9");
    }

    #[test]
    fn error_invalid_ar_shape() {
        let err = RegressionError::InvalidArShape { shape: vec![2, 2] };
        assert_eq!(
            err.to_string(),
            "AR parameters must be a scalar or a vector, got shape [2, 2]"
        );
    }

    #[test]
    fn error_invalid_weights() {
        let err = RegressionError::InvalidWeights {
            reason: "weights must be non-negative",
        };
        assert_eq!(
            err.to_string(),
            "invalid weights: weights must be non-negative"
        );
    }

    #[test]
    fn error_unsupported_operation() {
        let err = RegressionError::UnsupportedOperation {
            operation: "log_likelihood",
        };
        assert_eq!(
            err.to_string(),
            "log_likelihood is not supported on compact results"
        );
    }

    #[test]
    fn error_invalid_contrast() {
        let err = RegressionError::InvalidContrast {
            reason: "t contrasts must have exactly one row",
        };
        assert_eq!(
            err.to_string(),
            "invalid contrast: t contrasts must have exactly one row"
        );
    }

    #[test]
    fn error_contrast_dimension_mismatch() {
        let err = RegressionError::ContrastDimensionMismatch {
            expected: 3,
            got: 2,
        };
        assert_eq!(
            err.to_string(),
            "contrast has 2 columns but the model has 3 regressors"
        );
    }

    #[test]
    fn error_invalid_alpha() {
        let err = RegressionError::InvalidAlpha { alpha: 1.5 };
        assert_eq!(
            err.to_string(),
            "alpha must lie strictly between 0 and 1, got 1.5"
        );
    }

    #[test]
    fn error_singular_matrix() {
        assert_eq!(RegressionError::SingularMatrix.to_string(), "matrix is singular");
    }

    #[test]
    fn error_distribution() {
        let err = RegressionError::Distribution {
            message: "bad freedom".to_string(),
        };
        assert_eq!(err.to_string(), "distribution error: bad freedom");
    }

    #[test]
    fn error_is_std_error() {
        fn assert_impl<T: std::error::Error>() {}
        assert_impl::<RegressionError>();
    }

    #[test]
    fn error_is_send_and_sync() {
        fn assert_impl<T: Send + Sync>() {}
        assert_impl::<RegressionError>();
    }
}
