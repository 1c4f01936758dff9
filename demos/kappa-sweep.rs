extern crate nalgebra as na;

use anyhow::Result;
use log::LevelFilter;
use na::{dmatrix, dvector};
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use rand_xoshiro::Xoshiro256PlusPlus;
use simple_logger::SimpleLogger;
use soc_ukf::models::PolaBattery;
use soc_ukf::{replay_parallel, FailurePolicy, Sample, UnscentedKalmanFilter};

const STEPS: usize = 2000;
const CURRENT: f64 = 12.0;
const SIGMA_V: f64 = 0.05;
const KAPPAS: [f64; 6] = [-1.0, 0.0, 0.5, 1.0, 2.0, 3.0];

fn main() -> Result<()> {
    SimpleLogger::new().with_level(LevelFilter::Warn).init()?;

    let battery = PolaBattery::default();
    let normal = Normal::new(0.0, SIGMA_V)?;
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(0);

    // 真値と観測の生成
    let mut x_act = dvector![0.26, 0.9];
    let mut v = battery.observe(&x_act, &dvector![0.0, CURRENT])[0];
    let v0 = v;
    let mut samples = Vec::with_capacity(STEPS);
    let mut soc_act = Vec::with_capacity(STEPS);
    for _ in 0..STEPS {
        let u = dvector![v, CURRENT];
        x_act = battery.process(&x_act, &u);
        v = battery.observe(&x_act, &u)[0] + normal.sample(&mut rng);
        samples.push(Sample::new(u, dvector![v]));
        soc_act.push(x_act[1]);
    }

    let filters = KAPPAS
        .iter()
        .map(|&kappa| {
            let config = battery
                .config(
                    dvector![0.26, 0.7],
                    dmatrix![4e-8, 0.0; 0.0, 1e-2],
                    dvector![v0, CURRENT],
                )
                .process_noise(dmatrix![5e-8, 0.0; 0.0, 1e-6])
                .observation_noise(dmatrix![SIGMA_V * SIGMA_V])
                .kappa(kappa);
            UnscentedKalmanFilter::new(config)
        })
        .collect::<Result<Vec<_>, _>>()?;

    let now = std::time::Instant::now();
    let results = replay_parallel(filters, &samples, FailurePolicy::Skip);
    println!("elapsed: {:?}", now.elapsed());

    for (kappa, result) in KAPPAS.iter().zip(results) {
        let beliefs = result?;
        let rmse = (beliefs
            .iter()
            .zip(&soc_act)
            .map(|(b, s)| (b.state[1] - s).powi(2))
            .sum::<f64>()
            / STEPS as f64)
            .sqrt();
        let last = beliefs.last().map(|b| b.state[1]).unwrap_or(f64::NAN);
        println!(
            "kappa: {:5.2} rmse: {:8.5} soc_est: {:6.4} soc_act: {:6.4}",
            kappa,
            rmse,
            last,
            soc_act[STEPS - 1]
        );
    }
    Ok(())
}
