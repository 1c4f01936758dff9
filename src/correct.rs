use crate::error::UkfError;

/// Posterior estimate together with the gain that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Correction {
    pub state: na::DVector<f64>,
    pub covariance: na::DMatrix<f64>,
    pub kalman_gain: na::DMatrix<f64>,
}

fn norm1(m: &na::DMatrix<f64>) -> f64 {
    m.column_iter().map(|c| c.lp_norm(1)).fold(0.0, f64::max)
}

/// Inverse of the innovation covariance, refusing anything numerically singular.
fn invert_innovation(pyy: &na::DMatrix<f64>) -> Result<na::DMatrix<f64>, UkfError> {
    let inv = pyy
        .clone()
        .try_inverse()
        .ok_or(UkfError::SingularInnovationCovariance)?;
    if inv.iter().any(|v| !v.is_finite()) || norm1(pyy) * norm1(&inv) > 1.0 / f64::EPSILON {
        return Err(UkfError::SingularInnovationCovariance);
    }
    Ok(inv)
}

/// Kalman update.
///
/// `K = Pxy·Pyy⁻¹`, `x = x⁻ + K(y − y⁻)`, `P = P⁻ − K·Pyy·Kᵀ`.
pub fn correct(
    x_prior: &na::DVector<f64>,
    p_prior: &na::DMatrix<f64>,
    y_prior: &na::DVector<f64>,
    pyy: &na::DMatrix<f64>,
    pxy: &na::DMatrix<f64>,
    y_obs: &na::DVector<f64>,
) -> Result<Correction, UkfError> {
    let k = pxy * invert_innovation(pyy)?;
    let state = x_prior + &k * (y_obs - y_prior);
    let p = p_prior - &k * pyy * k.transpose();
    // 対称性の維持
    let covariance = (&p + p.transpose()) * 0.5;
    if state.iter().chain(covariance.iter()).any(|v| !v.is_finite()) {
        return Err(UkfError::NonFiniteValue { what: "posterior" });
    }
    Ok(Correction {
        state,
        covariance,
        kalman_gain: k,
    })
}
