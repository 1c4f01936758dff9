use crate::error::{check_len, check_square, UkfError};
use crate::weights::SigmaWeights;

/// Principal square root `S` of a symmetric positive semi-definite matrix, `S·S = P`.
///
/// Eigenvalues within rounding distance of zero are clamped; anything more
/// negative fails instead of producing NaN.
pub fn matrix_sqrt(p: &na::DMatrix<f64>, what: &'static str) -> Result<na::DMatrix<f64>, UkfError> {
    check_square(what, p.nrows(), p)?;
    if p.iter().any(|v| !v.is_finite()) {
        return Err(UkfError::NonPositiveDefiniteCovariance { what });
    }
    // 対称性の維持
    let sym = (p + p.transpose()) * 0.5;
    let eigen = na::SymmetricEigen::new(sym);
    let scale = eigen.eigenvalues.amax().max(1.0);
    let tol = p.nrows() as f64 * f64::EPSILON * scale;
    if eigen.eigenvalues.iter().any(|&l| l < -tol) {
        log::debug!("{what} eigenvalues: {}", eigen.eigenvalues.transpose());
        return Err(UkfError::NonPositiveDefiniteCovariance { what });
    }
    let root = eigen.eigenvalues.map(|l| l.max(0.0).sqrt());
    let v = &eigen.eigenvectors;
    Ok(v * na::DMatrix::from_diagonal(&root) * v.transpose())
}

/// Standard set: column 0 is the mean, columns `1..=L` and `L+1..=2L` are
/// `mean ± sqrt(γ)·S[:, i]`.
pub fn sigma_points(
    x: &na::DVector<f64>,
    p: &na::DMatrix<f64>,
    w: &SigmaWeights,
) -> Result<na::DMatrix<f64>, UkfError> {
    let n = x.len();
    check_square("state covariance", n, p)?;
    let l = matrix_sqrt(p, "state covariance")? * w.sqrt_gamma;
    let mut sigma_points = na::DMatrix::zeros(n, 2 * n + 1);
    sigma_points.set_column(0, x);
    for i in 0..n {
        sigma_points.set_column(1 + i, &(x + l.column(i)));
        sigma_points.set_column(1 + n + i, &(x - l.column(i)));
    }
    Ok(sigma_points)
}

/// Recycled set: the 2L+1 propagated points unchanged, then `2L` points at
/// `prior[:, 0] ± sqrt(γ_ext)·sqrt(Q)[:, i]`.
///
/// The process function is not evaluated again; the extra points only carry
/// the spread the process noise adds.
pub fn extended_sigma_points(
    prior: &na::DMatrix<f64>,
    q: &na::DMatrix<f64>,
    w: &SigmaWeights,
) -> Result<na::DMatrix<f64>, UkfError> {
    let n = prior.nrows();
    check_len("propagated sigma points", 2 * n + 1, prior.ncols())?;
    check_square("process noise", n, q)?;
    let l = matrix_sqrt(q, "process noise")? * w.sqrt_gamma;
    let center = prior.column(0).into_owned();
    let mut sigma_points = na::DMatrix::zeros(n, 4 * n + 1);
    sigma_points.columns_mut(0, 2 * n + 1).copy_from(prior);
    for i in 0..n {
        sigma_points.set_column(2 * n + 1 + i, &(&center + l.column(i)));
        sigma_points.set_column(3 * n + 1 + i, &(&center - l.column(i)));
    }
    Ok(sigma_points)
}
