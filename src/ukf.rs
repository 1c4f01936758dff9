use crate::config::{Observation, ProcessFn, UkfConfig};
use crate::correct::correct;
use crate::error::{check_len, check_square, UkfError};
use crate::sigma::{extended_sigma_points, matrix_sqrt, sigma_points};
use crate::unscented::{propagate, weighted_covariance, weighted_cross_covariance, weighted_mean};
use crate::weights::{SigmaStrategy, SigmaWeights};

/// State estimate and its covariance.
#[derive(Debug, Clone, PartialEq)]
pub struct Belief {
    pub state: na::DVector<f64>,
    pub covariance: na::DMatrix<f64>,
}

/// Per-step switches. Noise overrides apply to that step only.
#[derive(Debug, Clone, Copy, Default)]
pub struct StepOptions<'a> {
    pub commit: bool,
    pub process_noise: Option<&'a na::DMatrix<f64>>,
    pub observation_noise: Option<&'a na::DMatrix<f64>>,
}

impl<'a> StepOptions<'a> {
    /// Replace the stored belief with the posterior on success.
    pub fn commit() -> Self {
        Self {
            commit: true,
            ..Default::default()
        }
    }

    /// Leave the stored belief untouched.
    pub fn dry_run() -> Self {
        Self::default()
    }

    pub fn with_process_noise(mut self, q: &'a na::DMatrix<f64>) -> Self {
        self.process_noise = Some(q);
        self
    }

    pub fn with_observation_noise(mut self, r: &'a na::DMatrix<f64>) -> Self {
        self.observation_noise = Some(r);
        self
    }
}

/// Intermediate quantities of one step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepReport {
    pub x1_prior: na::DVector<f64>,
    pub p1_prior: na::DMatrix<f64>,
    pub y_prior: na::DVector<f64>,
    pub pyy: na::DMatrix<f64>,
    pub pxy: na::DMatrix<f64>,
    pub kalman_gain: na::DMatrix<f64>,
    /// `y − y_prior`
    pub innovation: na::DVector<f64>,
    pub posterior: Belief,
}

/// Unscented Kalman filter with optional sigma-point recycling.
///
/// The configuration is fixed at construction; only `step` with
/// [`StepOptions::commit`] (and the explicit setters) change the filter.
pub struct UnscentedKalmanFilter {
    process: ProcessFn,
    observation: Observation,
    belief: Belief,
    q: na::DMatrix<f64>,
    r: na::DMatrix<f64>,
    input: na::DVector<f64>,
    strategy: SigmaStrategy,
    kappa: f64,
    weights: SigmaWeights,
    weights_ext: SigmaWeights,
    state_dim: usize,
    output_dim: usize,
}

impl UnscentedKalmanFilter {
    pub fn new(config: UkfConfig) -> Result<Self, UkfError> {
        let UkfConfig {
            process,
            observation,
            x0,
            p0,
            q,
            r,
            u0,
            strategy,
            kappa,
        } = config;
        let n = x0.len();
        check_square("initial covariance", n, &p0)?;
        matrix_sqrt(&p0, "initial covariance")?;

        let q = q.unwrap_or_else(|| na::DMatrix::identity(n, n));
        check_square("process noise", n, &q)?;
        if strategy == SigmaStrategy::Recycled {
            matrix_sqrt(&q, "process noise")?;
        }

        let y0 = observation.evaluate(&x0, &u0);
        if y0.iter().any(|v| !v.is_finite()) {
            return Err(UkfError::NonFiniteValue {
                what: "observation function",
            });
        }
        let m = y0.len();
        let r = r.unwrap_or_else(|| na::DMatrix::identity(m, m));
        check_square("observation noise", m, &r)?;

        let (weights, weights_ext) = weight_sets(n, kappa, strategy)?;

        log::debug!("ukf: state dim {n}, output dim {m}, {strategy:?}, kappa {kappa}");
        Ok(Self {
            process,
            observation,
            belief: Belief {
                state: x0,
                covariance: p0,
            },
            q,
            r,
            input: u0,
            strategy,
            kappa,
            weights,
            weights_ext,
            state_dim: n,
            output_dim: m,
        })
    }

    /// One predict/correct cycle for `(u_k, y_{k+1})`.
    pub fn step(
        &mut self,
        input: &na::DVector<f64>,
        observation: &na::DVector<f64>,
        options: StepOptions,
    ) -> Result<Belief, UkfError> {
        self.step_report(input, observation, options)
            .map(|report| report.posterior)
    }

    /// Same as [`step`](Self::step) but keeps the priors, covariances and gain.
    pub fn step_report(
        &mut self,
        input: &na::DVector<f64>,
        observation: &na::DVector<f64>,
        options: StepOptions,
    ) -> Result<StepReport, UkfError> {
        let report = self.compute(input, observation, &options)?;
        if options.commit {
            self.belief = report.posterior.clone();
            self.input = input.clone();
        }
        Ok(report)
    }

    fn compute(
        &self,
        input: &na::DVector<f64>,
        y_obs: &na::DVector<f64>,
        options: &StepOptions,
    ) -> Result<StepReport, UkfError> {
        let (n, m) = (self.state_dim, self.output_dim);
        check_len("observation", m, y_obs.len())?;
        let q = options.process_noise.unwrap_or(&self.q);
        check_square("process noise", n, q)?;
        let r = options.observation_noise.unwrap_or(&self.r);
        check_square("observation noise", m, r)?;

        // predict
        let sigmas = sigma_points(&self.belief.state, &self.belief.covariance, &self.weights)?;
        let sigmas_f = propagate(&sigmas, n, "process function", |x| (self.process)(x, input))?;
        let x1_prior = weighted_mean(&sigmas_f, &self.weights.weights);
        let p1_prior = weighted_covariance(&sigmas_f, &x1_prior, &self.weights.weights, q);

        // observation
        let (sigmas_x, w) = match self.strategy {
            SigmaStrategy::Standard => (sigmas_f, &self.weights),
            SigmaStrategy::Recycled => (
                extended_sigma_points(&sigmas_f, q, &self.weights_ext)?,
                &self.weights_ext,
            ),
        };
        let sigmas_h = propagate(&sigmas_x, m, "observation function", |x| {
            self.observation.evaluate(x, input)
        })?;
        let y_prior = weighted_mean(&sigmas_h, &w.weights);
        let pyy = weighted_covariance(&sigmas_h, &y_prior, &w.weights, r);
        let pxy = weighted_cross_covariance(&sigmas_x, &x1_prior, &sigmas_h, &y_prior, &w.weights);

        // update
        let c = correct(&x1_prior, &p1_prior, &y_prior, &pyy, &pxy, y_obs)?;
        let innovation = y_obs - &y_prior;
        log::debug!(
            "ukf: innovation {:?}, gain {:?}",
            innovation.as_slice(),
            c.kalman_gain.as_slice()
        );
        Ok(StepReport {
            x1_prior,
            p1_prior,
            y_prior,
            pyy,
            pxy,
            kalman_gain: c.kalman_gain,
            innovation,
            posterior: Belief {
                state: c.state,
                covariance: c.covariance,
            },
        })
    }

    // 推定した状態を返す
    pub fn state(&self) -> &na::DVector<f64> {
        &self.belief.state
    }

    pub fn covariance(&self) -> &na::DMatrix<f64> {
        &self.belief.covariance
    }

    pub fn belief(&self) -> &Belief {
        &self.belief
    }

    /// Input of the last committed step (the initial input before any).
    pub fn input(&self) -> &na::DVector<f64> {
        &self.input
    }

    pub fn state_dim(&self) -> usize {
        self.state_dim
    }

    pub fn output_dim(&self) -> usize {
        self.output_dim
    }

    pub fn strategy(&self) -> SigmaStrategy {
        self.strategy
    }

    pub fn kappa(&self) -> f64 {
        self.kappa
    }

    pub fn weights(&self) -> &SigmaWeights {
        match self.strategy {
            SigmaStrategy::Standard => &self.weights,
            SigmaStrategy::Recycled => &self.weights_ext,
        }
    }

    pub fn set_kappa(&mut self, kappa: f64) -> Result<(), UkfError> {
        let (weights, weights_ext) = weight_sets(self.state_dim, kappa, self.strategy)?;
        self.kappa = kappa;
        self.weights = weights;
        self.weights_ext = weights_ext;
        Ok(())
    }

    pub fn set_process_noise(&mut self, q: na::DMatrix<f64>) -> Result<(), UkfError> {
        check_square("process noise", self.state_dim, &q)?;
        if self.strategy == SigmaStrategy::Recycled {
            matrix_sqrt(&q, "process noise")?;
        }
        self.q = q;
        Ok(())
    }

    pub fn set_observation_noise(&mut self, r: na::DMatrix<f64>) -> Result<(), UkfError> {
        check_square("observation noise", self.output_dim, &r)?;
        self.r = r;
        Ok(())
    }

    pub fn process_noise(&self) -> &na::DMatrix<f64> {
        &self.q
    }

    pub fn observation_noise(&self) -> &na::DMatrix<f64> {
        &self.r
    }
}

/// Prediction weights and the 4L+1 observation weights, warning once if the
/// set `strategy` observes with has a negative centre weight.
fn weight_sets(
    n: usize,
    kappa: f64,
    strategy: SigmaStrategy,
) -> Result<(SigmaWeights, SigmaWeights), UkfError> {
    let weights = SigmaWeights::compute(n, kappa, SigmaStrategy::Standard)?;
    let weights_ext = SigmaWeights::compute(n, kappa, SigmaStrategy::Recycled)?;
    let observed = match strategy {
        SigmaStrategy::Standard => &weights,
        SigmaStrategy::Recycled => &weights_ext,
    };
    if let Some(w0) = observed.negative_centre_weight() {
        log::warn!("kappa = {kappa} gives a negative centre weight ({w0:.4})");
    }
    Ok((weights, weights_ext))
}

impl core::fmt::Debug for UnscentedKalmanFilter {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("UnscentedKalmanFilter")
            .field("observation", &self.observation)
            .field("belief", &self.belief)
            .field("strategy", &self.strategy)
            .field("kappa", &self.kappa)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use na::{dmatrix, dvector};

    fn assert_close(a: &na::DMatrix<f64>, b: &na::DMatrix<f64>) {
        assert_eq!(a.shape(), b.shape());
        for (x, y) in a.iter().zip(b.iter()) {
            assert!((x - y).abs() < 1e-12, "expected {b} ≈ {a}");
        }
    }

    fn linear() -> UkfConfig {
        UkfConfig::new(
            |x, u| dvector![x[0] + u[0], x[1] + u[0]],
            dvector![1.0, 2.0],
            na::DMatrix::identity(2, 2),
        )
    }

    #[test]
    fn dimensions_follow_the_observation_function() {
        let ukf = UnscentedKalmanFilter::new(linear()).unwrap();
        assert_eq!((ukf.state_dim(), ukf.output_dim()), (2, 2));
        let ukf = UnscentedKalmanFilter::new(
            linear().observation(Observation::state(|x| dvector![x[0] * x[1]])),
        )
        .unwrap();
        assert_eq!(ukf.output_dim(), 1);
        assert_eq!(ukf.observation_noise(), &na::DMatrix::<f64>::identity(1, 1));
        assert_eq!(ukf.weights().len(), 9);
    }

    #[test]
    fn wrong_noise_shapes_are_rejected() {
        let err = UnscentedKalmanFilter::new(linear().process_noise(na::DMatrix::identity(3, 3)))
            .unwrap_err();
        assert!(matches!(err, UkfError::DimensionMismatch { .. }));
        let err =
            UnscentedKalmanFilter::new(linear().observation_noise(dmatrix![1.0])).unwrap_err();
        assert!(matches!(err, UkfError::DimensionMismatch { .. }));
    }

    #[test]
    fn dry_run_leaves_belief_alone() {
        let mut ukf = UnscentedKalmanFilter::new(linear()).unwrap();
        let before = ukf.belief().clone();
        let post = ukf
            .step(&dvector![1.0], &dvector![2.5, 3.5], StepOptions::dry_run())
            .unwrap();
        assert_eq!(ukf.belief(), &before);
        assert_ne!(post, before);
        let committed = ukf
            .step(&dvector![1.0], &dvector![2.5, 3.5], StepOptions::commit())
            .unwrap();
        assert_eq!(post, committed);
        assert_eq!(ukf.belief(), &committed);
        assert_eq!(ukf.input(), &dvector![1.0]);
    }

    #[test]
    fn override_is_not_persisted() {
        let mut ukf = UnscentedKalmanFilter::new(linear()).unwrap();
        let q = na::DMatrix::identity(2, 2) * 4.0;
        let report = ukf
            .step_report(
                &dvector![0.0],
                &dvector![1.0, 2.0],
                StepOptions::dry_run().with_process_noise(&q),
            )
            .unwrap();
        // prior spread of I plus the overridden noise
        assert!((report.p1_prior[(0, 0)] - 5.0).abs() < 1e-12);
        assert_eq!(ukf.process_noise(), &na::DMatrix::<f64>::identity(2, 2));

        let bad = na::DMatrix::identity(3, 3);
        let err = ukf
            .step(
                &dvector![0.0],
                &dvector![1.0, 2.0],
                StepOptions::commit().with_observation_noise(&bad),
            )
            .unwrap_err();
        assert!(matches!(err, UkfError::DimensionMismatch { .. }));
    }

    #[test]
    fn observation_noise_override_applies_to_one_step() {
        let mut ukf =
            UnscentedKalmanFilter::new(linear().strategy(SigmaStrategy::Standard)).unwrap();
        let r = na::DMatrix::identity(2, 2) * 4.0;
        let (u, y) = (dvector![0.0], dvector![1.0, 2.0]);

        // propagated spread of P₀ = I plus the overridden R
        let report = ukf
            .step_report(&u, &y, StepOptions::dry_run().with_observation_noise(&r))
            .unwrap();
        assert_close(&report.pyy, &(na::DMatrix::identity(2, 2) * 5.0));
        assert_close(&report.pxy, &na::DMatrix::identity(2, 2));

        let report = ukf.step_report(&u, &y, StepOptions::dry_run()).unwrap();
        assert_close(&report.pyy, &(na::DMatrix::identity(2, 2) * 2.0));
        assert_eq!(ukf.observation_noise(), &na::DMatrix::<f64>::identity(2, 2));
    }

    #[test]
    fn process_noise_override_spreads_the_extended_points() {
        let mut ukf =
            UnscentedKalmanFilter::new(linear().strategy(SigmaStrategy::Recycled)).unwrap();
        let q = na::DMatrix::identity(2, 2) * 4.0;
        let (u, y) = (dvector![0.0], dvector![1.0, 2.0]);

        // γ = 3 for the propagated points, γ_ext = 5 with weights 1/10 for
        // the observation set:
        //   propagated ±√3·e_i       -> 2·0.1·3 = 0.6
        //   extended   ±√5·√Q·e_i    -> 2·0.1·5·q
        let report = ukf
            .step_report(&u, &y, StepOptions::dry_run().with_process_noise(&q))
            .unwrap();
        assert_close(&report.p1_prior, &(na::DMatrix::identity(2, 2) * 5.0));
        assert_close(&report.pxy, &(na::DMatrix::identity(2, 2) * 4.6));
        assert_close(&report.pyy, &(na::DMatrix::identity(2, 2) * 5.6));

        let report = ukf.step_report(&u, &y, StepOptions::dry_run()).unwrap();
        assert_close(&report.p1_prior, &(na::DMatrix::identity(2, 2) * 2.0));
        assert_close(&report.pxy, &(na::DMatrix::identity(2, 2) * 1.6));
        assert_close(&report.pyy, &(na::DMatrix::identity(2, 2) * 2.6));
        assert_eq!(ukf.process_noise(), &na::DMatrix::<f64>::identity(2, 2));
    }

    #[test]
    fn non_finite_kappa_is_an_invalid_spread() {
        let err = UnscentedKalmanFilter::new(linear().kappa(f64::INFINITY)).unwrap_err();
        assert!(matches!(err, UkfError::InvalidSpread { dim: 2, .. }));

        let mut ukf = UnscentedKalmanFilter::new(linear()).unwrap();
        assert!(matches!(
            ukf.set_kappa(f64::NAN),
            Err(UkfError::InvalidSpread { .. })
        ));
        assert_eq!(ukf.kappa(), 1.0);
    }

    #[test]
    fn retuning_kappa() {
        let mut ukf =
            UnscentedKalmanFilter::new(linear().strategy(SigmaStrategy::Standard)).unwrap();
        ukf.set_kappa(2.0).unwrap();
        assert_eq!(ukf.kappa(), 2.0);
        assert!((ukf.weights().weights[0] - 0.5).abs() < 1e-15);
        assert!(ukf.set_kappa(-5.0).is_err());
        assert_eq!(ukf.kappa(), 2.0);
    }

    #[test]
    fn retuning_noise_is_validated() {
        let mut ukf = UnscentedKalmanFilter::new(linear()).unwrap();
        assert!(ukf.set_process_noise(dmatrix![1.0, 2.0; 2.0, 1.0]).is_err());
        assert!(ukf.set_observation_noise(na::DMatrix::identity(2, 2) * 0.1).is_ok());
        assert_eq!(ukf.observation_noise()[(1, 1)], 0.1);
    }
}
