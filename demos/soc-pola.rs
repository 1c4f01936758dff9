extern crate nalgebra as na;

use anyhow::Result;
use log::LevelFilter;
use na::{dmatrix, dvector};
use rand_distr::{Distribution, Normal};
use simple_logger::SimpleLogger;
use soc_ukf::dataset::EstimateWriter;
use soc_ukf::models::PolaBattery;
use soc_ukf::{SigmaStrategy, StepOptions, UnscentedKalmanFilter};

const DT: f64 = 1.0;
const CURRENT: f64 = 10.0;
// 電圧計のノイズ
const SIGMA_V: f64 = 0.05;
const V_CUTOFF: f64 = 33.0;

fn main() -> Result<()> {
    SimpleLogger::new().with_level(LevelFilter::Info).init()?;

    let battery = PolaBattery {
        dt: DT,
        ..Default::default()
    };
    let normal = Normal::new(0.0, SIGMA_V)?;

    for strategy in [SigmaStrategy::Standard, SigmaStrategy::Recycled] {
        let mut rng = rand::thread_rng();
        let mut x_act = dvector![0.26, 0.85];
        let mut v_meas = battery.observe(&x_act, &dvector![0.0, CURRENT])[0];

        let config = battery
            .config(
                dvector![0.26, 0.6],
                dmatrix![2e-4_f64.powi(2), 0.0; 0.0, 1e-1_f64.powi(2)],
                dvector![v_meas, CURRENT],
            )
            .process_noise(dmatrix![5e-8, 0.0; 0.0, 1e-6])
            .observation_noise(dmatrix![SIGMA_V * SIGMA_V])
            .strategy(strategy);
        let mut ukf = UnscentedKalmanFilter::new(config)?;

        // ログファイルの作成
        let file_path = format!("logs/soc-pola/{:?}.csv", strategy).to_lowercase();
        let mut wtr = EstimateWriter::create(&file_path, 2)?;

        let mut k = 0;
        while v_meas > V_CUTOFF && x_act[1] > 0.05 {
            let u = dvector![v_meas, CURRENT];
            x_act = battery.process(&x_act, &u);
            v_meas = battery.observe(&x_act, &u)[0] + normal.sample(&mut rng);
            let est = ukf.step(&u, &dvector![v_meas], StepOptions::commit())?;
            wtr.write(k as f64 * DT, &est)?;

            if k % 100 == 0 {
                print!("t: {:6.0} ", k as f64 * DT);
                print!("v: {:6.2} ", v_meas);
                print!("soc_act: {:5.3} ", x_act[1]);
                print!("soc_est: {:5.3} ", est.state[1]);
                println!("p: {:9.2e}", est.covariance[(1, 1)]);
            }
            k += 1;
        }
        wtr.flush()?;
        log::info!("{:?}: {} steps written to {}", strategy, k, file_path);
    }
    Ok(())
}
