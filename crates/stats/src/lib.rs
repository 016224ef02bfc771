//! Numeric helpers shared by the voxel regression crates.
//!
//! Everything here is total: degenerate inputs (short series, zero
//! variance, non-positive scales) map to a documented fallback value
//! rather than an error.

use ndarray::{Array, Array1, ArrayBase, ArrayView1, ArrayView2, Axis, Data, Dimension};

/// Reciprocal of `x` where `x > 0`, and `0.0` everywhere else.
///
/// Used to normalise by a scale estimate without dividing by zero: a
/// zero, negative or NaN scale masks the normalised value to zero.
pub fn positive_reciprocal(x: f64) -> f64 {
    if x > 0.0 { 1.0 / x } else { 0.0 }
}

/// Element-wise [`positive_reciprocal`] over an array of any dimension.
pub fn positive_reciprocals<S, D>(values: &ArrayBase<S, D>) -> Array<f64, D>
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    values.mapv(positive_reciprocal)
}

/// Population variance (N denominator) of every column of `data`.
///
/// Returns zeros when `data` has no rows.
pub fn column_variance(data: ArrayView2<'_, f64>) -> Array1<f64> {
    let n = data.nrows();
    if n == 0 {
        return Array1::zeros(data.ncols());
    }
    let nf = n as f64;
    data.axis_iter(Axis(1))
        .map(|col| {
            let m = col.sum() / nf;
            col.fold(0.0, |acc, &x| acc + (x - m) * (x - m)) / nf
        })
        .collect()
}

/// Lag-1 autocorrelation of a residual series, `Σ r[t]·r[t-1] / Σ r[t]²`.
///
/// The series is not demeaned. Returns 0.0 for series shorter than two
/// samples or with zero energy.
pub fn lag1_autocorrelation(residuals: ArrayView1<'_, f64>) -> f64 {
    let n = residuals.len();
    if n < 2 {
        return 0.0;
    }
    let energy: f64 = residuals.iter().map(|r| r * r).sum();
    let cross: f64 = (1..n).map(|t| residuals[t] * residuals[t - 1]).sum();
    cross * positive_reciprocal(energy)
}
