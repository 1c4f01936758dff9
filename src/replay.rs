use rayon::prelude::*;

use crate::error::UkfError;
use crate::ukf::{Belief, StepOptions, UnscentedKalmanFilter};

/// One `(u_k, y_{k+1})` pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub input: na::DVector<f64>,
    pub observation: na::DVector<f64>,
}

impl Sample {
    pub fn new(input: na::DVector<f64>, observation: na::DVector<f64>) -> Self {
        Self { input, observation }
    }
}

/// What `replay` does when a step fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Stop and return the error.
    #[default]
    Abort,
    /// Keep the last committed belief for that sample and carry on.
    Skip,
}

/// Runs committed steps over `samples` in order, one belief per sample.
pub fn replay<'a, I>(
    ukf: &mut UnscentedKalmanFilter,
    samples: I,
    policy: FailurePolicy,
) -> Result<Vec<Belief>, UkfError>
where
    I: IntoIterator<Item = &'a Sample>,
{
    let mut beliefs = Vec::new();
    for (k, s) in samples.into_iter().enumerate() {
        match ukf.step(&s.input, &s.observation, StepOptions::commit()) {
            Ok(b) => beliefs.push(b),
            Err(e) if policy == FailurePolicy::Skip => {
                log::warn!("sample {k}: {e}, keeping previous estimate");
                beliefs.push(ukf.belief().clone());
            }
            Err(e) => {
                log::error!("sample {k}: {e}");
                return Err(e);
            }
        }
    }
    Ok(beliefs)
}

/// Replays the same samples through independent filters on the rayon pool.
///
/// Results come back in the order of `filters`.
pub fn replay_parallel(
    filters: Vec<UnscentedKalmanFilter>,
    samples: &[Sample],
    policy: FailurePolicy,
) -> Vec<Result<Vec<Belief>, UkfError>> {
    filters
        .into_par_iter()
        .map(|mut ukf| replay(&mut ukf, samples, policy))
        .collect()
}
