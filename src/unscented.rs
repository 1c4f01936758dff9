//! Propagation of sigma-point sets and the weighted moments taken over them.
//!
//! Sets are stored one point per column. Sums are taken relative to the
//! centre point (column 0), which is exact for identical points and equal to
//! the plain weighted sum otherwise because the weights add up to one.

use crate::error::{check_len, UkfError};

/// Applies `f` to every column of `points`.
///
/// Every output must have `dim` rows and only finite entries.
pub fn propagate<F>(
    points: &na::DMatrix<f64>,
    dim: usize,
    what: &'static str,
    f: F,
) -> Result<na::DMatrix<f64>, UkfError>
where
    F: Fn(&na::DVector<f64>) -> na::DVector<f64>,
{
    let mut out = na::DMatrix::zeros(dim, points.ncols());
    for i in 0..points.ncols() {
        let y = f(&points.column(i).into_owned());
        check_len(what, dim, y.len())?;
        if y.iter().any(|v| !v.is_finite()) {
            return Err(UkfError::NonFiniteValue { what });
        }
        out.set_column(i, &y);
    }
    log::trace!("{what} sigma points: {out}");
    Ok(out)
}

/// Per-row weighted average of the columns.
pub fn weighted_mean(points: &na::DMatrix<f64>, weights: &na::DVector<f64>) -> na::DVector<f64> {
    let center = points.column(0).into_owned();
    let mut mean = center.clone();
    for i in 1..points.ncols() {
        mean += weights[i] * (points.column(i) - &center);
    }
    mean
}

/// `noise + Σ wᵢ (xᵢ − mean)(xᵢ − mean)ᵀ`.
pub fn weighted_covariance(
    points: &na::DMatrix<f64>,
    mean: &na::DVector<f64>,
    weights: &na::DVector<f64>,
    noise: &na::DMatrix<f64>,
) -> na::DMatrix<f64> {
    let mut p = noise.clone();
    for i in 0..points.ncols() {
        let d = points.column(i) - mean;
        p += weights[i] * &d * d.transpose();
    }
    // 対称性の維持
    (&p + p.transpose()) * 0.5
}

/// `Σ wᵢ (aᵢ − mean_a)(bᵢ − mean_b)ᵀ`, accumulated over every point.
pub fn weighted_cross_covariance(
    a: &na::DMatrix<f64>,
    mean_a: &na::DVector<f64>,
    b: &na::DMatrix<f64>,
    mean_b: &na::DVector<f64>,
    weights: &na::DVector<f64>,
) -> na::DMatrix<f64> {
    let mut pxy = na::DMatrix::zeros(a.nrows(), b.nrows());
    for i in 0..a.ncols() {
        pxy += weights[i] * (a.column(i) - mean_a) * (b.column(i) - mean_b).transpose();
    }
    pxy
}

#[cfg(test)]
mod tests {
    use super::*;
    use na::{dmatrix, dvector};

    fn approx_eq(a: f64, b: f64, tol: f64) {
        assert!((a - b).abs() < tol, "expected {a} ≈ {b} (tol = {tol})");
    }

    fn weights() -> na::DVector<f64> {
        dvector![1.0 / 3.0, 1.0 / 6.0, 1.0 / 6.0, 1.0 / 6.0, 1.0 / 6.0]
    }

    fn points() -> na::DMatrix<f64> {
        dmatrix![
            2.0, 3.0, 2.0, 1.0, 2.0;
            3.0, 3.0, 4.0, 3.0, 2.0
        ]
    }

    #[test]
    fn propagate_applies_function_per_column() {
        let out = propagate(&points(), 1, "observation", |x| dvector![x[0] + x[1]]).unwrap();
        assert_eq!(out, dmatrix![5.0, 6.0, 6.0, 4.0, 4.0]);
    }

    #[test]
    fn propagate_rejects_wrong_size() {
        let err = propagate(&points(), 2, "process", |x| dvector![x[0]]).unwrap_err();
        assert_eq!(
            err,
            UkfError::DimensionMismatch {
                what: "process",
                expected: 2,
                found: 1
            }
        );
    }

    #[test]
    fn propagate_rejects_nan() {
        let err = propagate(&points(), 1, "observation", |x| dvector![(x[0] - 2.5).sqrt()])
            .unwrap_err();
        assert_eq!(err, UkfError::NonFiniteValue { what: "observation" });
    }

    #[test]
    fn mean_and_covariance() {
        let w = weights();
        let mean = weighted_mean(&points(), &w);
        approx_eq(mean[0], 2.0, 1e-15);
        approx_eq(mean[1], 3.0, 1e-15);
        let p = weighted_covariance(&points(), &mean, &w, &na::DMatrix::identity(2, 2));
        approx_eq(p[(0, 0)], 1.0 + 1.0 / 3.0, 1e-15);
        approx_eq(p[(1, 1)], 1.0 + 1.0 / 3.0, 1e-15);
        approx_eq(p[(0, 1)], 0.0, 1e-15);
    }

    #[test]
    fn identical_points_have_zero_spread() {
        let x = dmatrix![0.1, 0.1, 0.1; 0.7, 0.7, 0.7];
        let w = dvector![0.2, 0.4, 0.4];
        let mean = weighted_mean(&x, &w);
        let p = weighted_covariance(&x, &mean, &w, &na::DMatrix::zeros(2, 2));
        assert_eq!(p, na::DMatrix::<f64>::zeros(2, 2));
    }

    #[test]
    fn cross_covariance_sums_every_term() {
        let w = weights();
        let x = points();
        let mx = weighted_mean(&x, &w);
        let y = dmatrix![5.0, 6.0, 6.0, 4.0, 4.0];
        let my = weighted_mean(&y, &w);
        approx_eq(my[0], 5.0, 1e-15);
        let pxy = weighted_cross_covariance(&x, &mx, &y, &my, &w);
        assert_eq!(pxy.shape(), (2, 1));
        // both state components move one-for-one with the sum
        approx_eq(pxy[(0, 0)], 1.0 / 3.0, 1e-15);
        approx_eq(pxy[(1, 0)], 1.0 / 3.0, 1e-15);
    }
}
