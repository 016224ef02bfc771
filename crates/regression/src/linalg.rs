//! Dense linear algebra on `ndarray` matrices, backed by `nalgebra`.
//!
//! Matrices are copied into a column-major `DMatrix` for decomposition and
//! copied back afterwards. The matrices involved are design-sized
//! (observations x regressors) or smaller, so the copies are not the cost
//! that matters.

use nalgebra::{DMatrix, DVector};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

use crate::error::RegressionError;

fn to_dmatrix(a: ArrayView2<'_, f64>) -> DMatrix<f64> {
    DMatrix::from_fn(a.nrows(), a.ncols(), |i, j| a[[i, j]])
}

fn to_array2(m: &DMatrix<f64>) -> Array2<f64> {
    Array2::from_shape_fn((m.nrows(), m.ncols()), |(i, j)| m[(i, j)])
}

/// Singular values of `a`, in no particular order.
pub fn singular_values(a: ArrayView2<'_, f64>) -> Array1<f64> {
    if a.is_empty() {
        return Array1::zeros(0);
    }
    to_dmatrix(a).singular_values().iter().copied().collect()
}

/// Moore-Penrose pseudoinverse of `a` (shape `cols x rows`).
///
/// Singular values at or below `max(rows, cols) * eps * sigma_max` are
/// treated as zero.
pub fn pinv(a: ArrayView2<'_, f64>) -> Result<Array2<f64>, RegressionError> {
    let (rows, cols) = a.dim();
    if rows == 0 || cols == 0 {
        return Ok(Array2::zeros((cols, rows)));
    }
    let svd = to_dmatrix(a).svd(true, true);
    let sigma_max = svd.singular_values.iter().copied().fold(0.0, f64::max);
    let cutoff = rows.max(cols) as f64 * f64::EPSILON * sigma_max;
    let inv = svd
        .pseudo_inverse(cutoff)
        .map_err(|_| RegressionError::SingularMatrix)?;
    Ok(to_array2(&inv))
}

/// Numeric rank of `a`: the number of singular values strictly above `tol`.
pub fn matrix_rank(a: ArrayView2<'_, f64>, tol: f64) -> usize {
    singular_values(a).iter().filter(|&&s| s > tol).count()
}

/// Inverse of a square matrix.
///
/// # Errors
///
/// [`RegressionError::SingularMatrix`] if `a` is not invertible, and
/// [`RegressionError::DimensionMismatch`] if it is not square.
pub fn inverse(a: ArrayView2<'_, f64>) -> Result<Array2<f64>, RegressionError> {
    if a.nrows() != a.ncols() {
        return Err(RegressionError::DimensionMismatch {
            what: "columns of square matrix",
            expected: a.nrows(),
            got: a.ncols(),
        });
    }
    to_dmatrix(a)
        .try_inverse()
        .map(|inv| to_array2(&inv))
        .ok_or(RegressionError::SingularMatrix)
}

/// Solves `a x = b` for square `a` via LU decomposition.
pub fn solve(a: ArrayView2<'_, f64>, b: ArrayView1<'_, f64>) -> Result<Array1<f64>, RegressionError> {
    if a.nrows() != a.ncols() || a.nrows() != b.len() {
        return Err(RegressionError::DimensionMismatch {
            what: "rows of linear system",
            expected: a.nrows(),
            got: b.len(),
        });
    }
    let rhs = DVector::from_iterator(b.len(), b.iter().copied());
    to_dmatrix(a)
        .lu()
        .solve(&rhs)
        .map(|x| x.iter().copied().collect())
        .ok_or(RegressionError::SingularMatrix)
}
