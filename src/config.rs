use crate::weights::SigmaStrategy;

/// Process function: `(state, input) -> state`.
pub type ProcessFn =
    Box<dyn Fn(&na::DVector<f64>, &na::DVector<f64>) -> na::DVector<f64> + Send + Sync>;
/// Observation function of the state alone.
pub type StateObservationFn = Box<dyn Fn(&na::DVector<f64>) -> na::DVector<f64> + Send + Sync>;
/// Observation function that also sees the input.
pub type InputObservationFn =
    Box<dyn Fn(&na::DVector<f64>, &na::DVector<f64>) -> na::DVector<f64> + Send + Sync>;

/// Observation model. `StateInput` is the "input at output" case.
#[derive(Default)]
pub enum Observation {
    /// `y = x`
    #[default]
    Identity,
    State(StateObservationFn),
    StateInput(InputObservationFn),
}

impl Observation {
    pub fn state<H>(h: H) -> Self
    where
        H: Fn(&na::DVector<f64>) -> na::DVector<f64> + Send + Sync + 'static,
    {
        Observation::State(Box::new(h))
    }

    pub fn state_input<H>(h: H) -> Self
    where
        H: Fn(&na::DVector<f64>, &na::DVector<f64>) -> na::DVector<f64> + Send + Sync + 'static,
    {
        Observation::StateInput(Box::new(h))
    }

    pub fn input_at_output(&self) -> bool {
        matches!(self, Observation::StateInput(_))
    }

    pub(crate) fn evaluate(&self, x: &na::DVector<f64>, u: &na::DVector<f64>) -> na::DVector<f64> {
        match self {
            Observation::Identity => x.clone(),
            Observation::State(h) => h(x),
            Observation::StateInput(h) => h(x, u),
        }
    }
}

impl core::fmt::Debug for Observation {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Observation::Identity => write!(f, "Identity"),
            Observation::State(_) => write!(f, "State(..)"),
            Observation::StateInput(_) => write!(f, "StateInput(..)"),
        }
    }
}

/// Everything the filter needs at construction.
///
/// ```
/// use nalgebra::{dmatrix, dvector};
/// use soc_ukf::{Observation, SigmaStrategy, UkfConfig, UnscentedKalmanFilter};
///
/// let config = UkfConfig::new(
///     |x, u| dvector![x[0] + u[0], x[1] + u[0]],
///     dvector![1.0, 2.0],
///     dmatrix![1.0, 0.0; 0.0, 1.0],
/// )
/// .observation(Observation::state(|x| dvector![x.norm()]))
/// .strategy(SigmaStrategy::Standard);
/// let ukf = UnscentedKalmanFilter::new(config).unwrap();
/// assert_eq!(ukf.output_dim(), 1);
/// ```
pub struct UkfConfig {
    pub(crate) process: ProcessFn,
    pub(crate) observation: Observation,
    pub(crate) x0: na::DVector<f64>,
    pub(crate) p0: na::DMatrix<f64>,
    pub(crate) q: Option<na::DMatrix<f64>>,
    pub(crate) r: Option<na::DMatrix<f64>>,
    pub(crate) u0: na::DVector<f64>,
    pub(crate) strategy: SigmaStrategy,
    pub(crate) kappa: f64,
}

impl UkfConfig {
    pub const DEFAULT_KAPPA: f64 = 1.0;

    /// Identity observation, `Q = I`, `R = I`, `u0 = [0]`, recycled points, `κ = 1`.
    pub fn new<F>(process: F, x0: na::DVector<f64>, p0: na::DMatrix<f64>) -> Self
    where
        F: Fn(&na::DVector<f64>, &na::DVector<f64>) -> na::DVector<f64> + Send + Sync + 'static,
    {
        Self {
            process: Box::new(process),
            observation: Observation::Identity,
            x0,
            p0,
            q: None,
            r: None,
            u0: na::DVector::zeros(1),
            strategy: SigmaStrategy::default(),
            kappa: Self::DEFAULT_KAPPA,
        }
    }

    pub fn observation(mut self, observation: Observation) -> Self {
        self.observation = observation;
        self
    }

    pub fn process_noise(mut self, q: na::DMatrix<f64>) -> Self {
        self.q = Some(q);
        self
    }

    pub fn observation_noise(mut self, r: na::DMatrix<f64>) -> Self {
        self.r = Some(r);
        self
    }

    /// Input used to probe the observation function at construction.
    pub fn initial_input(mut self, u0: na::DVector<f64>) -> Self {
        self.u0 = u0;
        self
    }

    pub fn strategy(mut self, strategy: SigmaStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn kappa(mut self, kappa: f64) -> Self {
        self.kappa = kappa;
        self
    }

    pub fn input_at_output(&self) -> bool {
        self.observation.input_at_output()
    }
}

impl core::fmt::Debug for UkfConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("UkfConfig")
            .field("observation", &self.observation)
            .field("x0", &self.x0)
            .field("p0", &self.p0)
            .field("q", &self.q)
            .field("r", &self.r)
            .field("u0", &self.u0)
            .field("strategy", &self.strategy)
            .field("kappa", &self.kappa)
            .finish_non_exhaustive()
    }
}
