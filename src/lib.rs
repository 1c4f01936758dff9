//! Battery state-of-charge estimation with an unscented Kalman filter.
//!
//! The filter takes `(input, observation)` pairs in time order and returns
//! `(state, covariance)` after each step. Sigma points for the observation
//! update are either the 2L+1 predicted points or a recycled 4L+1 set that
//! reuses them and adds the process-noise spread.

extern crate nalgebra as na;

pub mod config;
pub mod correct;
pub mod dataset;
pub mod error;
pub mod models;
pub mod replay;
pub mod sigma;
pub mod ukf;
pub mod unscented;
pub mod weights;

pub use config::{Observation, UkfConfig};
pub use error::UkfError;
pub use replay::{replay, replay_parallel, FailurePolicy, Sample};
pub use ukf::{Belief, StepOptions, StepReport, UnscentedKalmanFilter};
pub use weights::{SigmaStrategy, SigmaWeights};
