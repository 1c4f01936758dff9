//! Battery models for SOC estimation.

use na::{dvector, DMatrix, DVector};

use crate::config::{Observation, UkfConfig};

/// Two-state energy model: `x = [internal resistance, SOC]`, `u = [V, I]`.
///
/// The voltage curve is the open-circuit fit used for the lab packs; SOC
/// drains by the delivered energy `V·I·dt` over the critical energy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolaBattery {
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
    /// Open-circuit voltage at full charge.
    pub vo: f64,
    /// Voltage at the knee.
    pub vl: f64,
    /// Usable energy in joules.
    pub e_crit: f64,
    pub dt: f64,
}

impl Default for PolaBattery {
    fn default() -> Self {
        Self {
            alpha: 0.0053193,
            beta: 11.505,
            gamma: 1.5538,
            vo: 41.405,
            vl: 33.481,
            e_crit: 1389900.0,
            dt: 1.0,
        }
    }
}

impl PolaBattery {
    pub fn process(&self, x: &DVector<f64>, u: &DVector<f64>) -> DVector<f64> {
        let (v, i) = (u[0], u[1]);
        dvector![x[0], x[1] - v * i * self.dt / self.e_crit]
    }

    /// Terminal voltage. NaN for a negative SOC.
    pub fn observe(&self, x: &DVector<f64>, u: &DVector<f64>) -> DVector<f64> {
        let (r, soc) = (x[0], x[1]);
        let i = u[1];
        dvector![self.open_circuit_voltage(soc) - i * r]
    }

    pub fn open_circuit_voltage(&self, soc: f64) -> f64 {
        let Self {
            alpha,
            beta,
            gamma,
            vo,
            vl,
            ..
        } = *self;
        vl + (vo - vl) * (gamma * (soc - 1.0)).exp()
            + alpha * vl * (soc - 1.0)
            + (1.0 - alpha) * vl * ((-beta).exp() - (-beta * soc.sqrt()).exp())
    }

    /// Filter configuration with this model as process and observation.
    ///
    /// The observation sees the input, so `u0` must be `[V, I]`.
    pub fn config(self, x0: DVector<f64>, p0: DMatrix<f64>, u0: DVector<f64>) -> UkfConfig {
        UkfConfig::new(move |x, u| self.process(x, u), x0, p0)
            .observation(Observation::state_input(move |x, u| self.observe(x, u)))
            .initial_input(u0)
    }
}
