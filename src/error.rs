/// Errors raised while building or stepping the filter.
///
/// A failed step never touches the committed belief.
#[derive(Debug, Clone, PartialEq)]
pub enum UkfError {
    /// A vector or matrix does not have the configured size.
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },
    /// The covariance has no real square root (negative eigenvalue or non-finite entries).
    NonPositiveDefiniteCovariance { what: &'static str },
    /// The innovation covariance cannot be inverted.
    SingularInnovationCovariance,
    /// A process or observation function produced NaN or infinity.
    NonFiniteValue { what: &'static str },
    /// `gamma` would be zero or negative for this kappa.
    InvalidSpread { kappa: f64, dim: usize },
}

impl core::fmt::Display for UkfError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            UkfError::DimensionMismatch {
                what,
                expected,
                found,
            } => write!(f, "{what}: expected dimension {expected}, found {found}"),
            UkfError::NonPositiveDefiniteCovariance { what } => {
                write!(f, "{what} is not positive semi-definite")
            }
            UkfError::SingularInnovationCovariance => {
                write!(f, "innovation covariance is singular")
            }
            UkfError::NonFiniteValue { what } => write!(f, "{what} produced a non-finite value"),
            UkfError::InvalidSpread { kappa, dim } => {
                write!(f, "kappa {kappa} gives a non-positive spread for state dimension {dim}")
            }
        }
    }
}

impl std::error::Error for UkfError {}

/// Checks a vector length against the configured dimension.
pub(crate) fn check_len(what: &'static str, expected: usize, found: usize) -> Result<(), UkfError> {
    if expected != found {
        return Err(UkfError::DimensionMismatch {
            what,
            expected,
            found,
        });
    }
    Ok(())
}

/// Checks that `m` is `dim × dim`.
pub(crate) fn check_square(
    what: &'static str,
    dim: usize,
    m: &na::DMatrix<f64>,
) -> Result<(), UkfError> {
    check_len(what, dim, m.nrows())?;
    check_len(what, dim, m.ncols())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mismatch_is_reported() {
        let err = check_len("state", 2, 3).unwrap_err();
        assert_eq!(
            err,
            UkfError::DimensionMismatch {
                what: "state",
                expected: 2,
                found: 3
            }
        );
        assert_eq!(err.to_string(), "state: expected dimension 2, found 3");
    }

    #[test]
    fn square_check_looks_at_both_sides() {
        let m = na::DMatrix::<f64>::zeros(2, 3);
        assert!(check_square("Q", 2, &m).is_err());
        assert!(check_square("Q", 2, &na::DMatrix::identity(2, 2)).is_ok());
    }
}
