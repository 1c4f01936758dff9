use crate::error::UkfError;

/// How the observation update obtains its sigma points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SigmaStrategy {
    /// Pass the 2L+1 predicted points straight to the observation function.
    Standard,
    /// Reuse the 2L+1 predicted points and add 2L points spread by the process noise (4L+1 total).
    #[default]
    Recycled,
}

impl SigmaStrategy {
    /// Number of sigma points for state dimension `dim`.
    pub fn point_count(self, dim: usize) -> usize {
        match self {
            SigmaStrategy::Standard => 2 * dim + 1,
            SigmaStrategy::Recycled => 4 * dim + 1,
        }
    }

    // gamma = L + κ or 2L + κ
    fn base(self, dim: usize) -> f64 {
        match self {
            SigmaStrategy::Standard => dim as f64,
            SigmaStrategy::Recycled => 2.0 * dim as f64,
        }
    }
}

/// Sigma-point weights and the scaling that goes with them.
#[derive(Debug, Clone, PartialEq)]
pub struct SigmaWeights {
    pub weights: na::DVector<f64>,
    pub gamma: f64,
    pub sqrt_gamma: f64,
}

impl SigmaWeights {
    /// Centre weight `κ/γ`, every other weight `1/(2γ)`.
    ///
    /// The weights sum to one for any finite κ with `γ > 0`. A negative κ gives
    /// a negative centre weight, which is still a valid unscented weighting but
    /// makes the covariance estimate less robust near degenerate covariances.
    pub fn compute(dim: usize, kappa: f64, strategy: SigmaStrategy) -> Result<Self, UkfError> {
        let gamma = strategy.base(dim) + kappa;
        if !kappa.is_finite() || !(gamma > 0.0) {
            return Err(UkfError::InvalidSpread { kappa, dim });
        }
        let mut weights =
            na::DVector::from_element(strategy.point_count(dim), 1.0 / (2.0 * gamma));
        weights[0] = kappa / gamma;
        Ok(Self {
            weights,
            gamma,
            sqrt_gamma: gamma.sqrt(),
        })
    }

    /// The centre weight when it is negative.
    pub fn negative_centre_weight(&self) -> Option<f64> {
        Some(self.weights[0]).filter(|w| *w < 0.0)
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, tol: f64) {
        assert!((a - b).abs() < tol, "expected {a} ≈ {b} (tol = {tol})");
    }

    #[test]
    fn two_dimensional_reference_values() {
        let w = SigmaWeights::compute(2, 1.0, SigmaStrategy::Standard).unwrap();
        approx_eq(w.gamma, 3.0, 1e-15);
        approx_eq(w.sqrt_gamma, 3f64.sqrt(), 1e-15);
        assert_eq!(w.len(), 5);
        approx_eq(w.weights[0], 1.0 / 3.0, 1e-15);
        for i in 1..5 {
            approx_eq(w.weights[i], 1.0 / 6.0, 1e-15);
        }
    }

    #[test]
    fn recycled_uses_twice_the_dimension() {
        let w = SigmaWeights::compute(2, 1.0, SigmaStrategy::Recycled).unwrap();
        approx_eq(w.gamma, 5.0, 1e-15);
        assert_eq!(w.len(), 9);
        approx_eq(w.weights[0], 0.2, 1e-15);
        approx_eq(w.weights[8], 0.1, 1e-15);
    }

    #[test]
    fn weights_sum_to_one() {
        for dim in 1..8 {
            for kappa in [-0.5, 0.0, 0.25, 1.0, 3.0, 10.0] {
                for strategy in [SigmaStrategy::Standard, SigmaStrategy::Recycled] {
                    let w = SigmaWeights::compute(dim, kappa, strategy).unwrap();
                    approx_eq(w.weights.sum(), 1.0, 1e-12);
                }
            }
        }
    }

    #[test]
    fn non_positive_spread_is_rejected() {
        assert_eq!(
            SigmaWeights::compute(2, -2.0, SigmaStrategy::Standard),
            Err(UkfError::InvalidSpread {
                kappa: -2.0,
                dim: 2
            })
        );
        // the recycled set tolerates the same kappa
        assert!(SigmaWeights::compute(2, -2.0, SigmaStrategy::Recycled).is_ok());
    }

    #[test]
    fn non_finite_kappa_is_rejected() {
        for kappa in [f64::INFINITY, f64::NEG_INFINITY, f64::NAN] {
            for strategy in [SigmaStrategy::Standard, SigmaStrategy::Recycled] {
                assert!(matches!(
                    SigmaWeights::compute(3, kappa, strategy),
                    Err(UkfError::InvalidSpread { dim: 3, .. })
                ));
            }
        }
    }

    #[test]
    fn negative_centre_weight_only_for_negative_kappa() {
        let w = SigmaWeights::compute(2, 1.0, SigmaStrategy::Standard).unwrap();
        assert_eq!(w.negative_centre_weight(), None);
        let w = SigmaWeights::compute(2, 0.0, SigmaStrategy::Recycled).unwrap();
        assert_eq!(w.negative_centre_weight(), None);
        let w = SigmaWeights::compute(2, -1.0, SigmaStrategy::Recycled).unwrap();
        approx_eq(w.negative_centre_weight().unwrap(), -1.0 / 3.0, 1e-15);
    }
}
