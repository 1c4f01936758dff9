extern crate nalgebra as na;

use anyhow::Result;
use log::LevelFilter;
use na::{dmatrix, dvector};
use rand_distr::{Distribution, Normal};
use simple_logger::SimpleLogger;
use soc_ukf::{Observation, SigmaStrategy, StepOptions, UkfConfig, UnscentedKalmanFilter};

const R: f64 = 0.1;

// 状態遷移関数
fn fx(x: &na::DVector<f64>, u: &na::DVector<f64>) -> na::DVector<f64> {
    dvector![x[0] + u[0], x[1] + u[0]]
}

// 観測関数 原点からの距離
fn hx(x: &na::DVector<f64>) -> na::DVector<f64> {
    dvector![(x[0].powi(2) + x[1].powi(2)).sqrt()]
}

// センサ出力をシミュレーション
fn sensor(x_act: &na::DVector<f64>) -> na::DVector<f64> {
    let normal = Normal::new(hx(x_act)[0], R.sqrt()).unwrap();
    dvector![normal.sample(&mut rand::thread_rng())]
}

fn main() -> Result<()> {
    SimpleLogger::new().with_level(LevelFilter::Info).init()?;

    // 一回目は基準シナリオ
    let mut ukf = UnscentedKalmanFilter::new(
        UkfConfig::new(fx, dvector![1.0, 2.0], dmatrix![1.0, 0.0; 0.0, 1.0])
            .observation(Observation::state(hx))
            .strategy(SigmaStrategy::Standard),
    )?;
    let post = ukf.step(&dvector![1.0], &dvector![1.1], StepOptions::commit())?;
    println!("reference x: {}", post.state.transpose());
    println!("reference p: {}", post.covariance);

    for strategy in [SigmaStrategy::Standard, SigmaStrategy::Recycled] {
        println!("--- {:?}", strategy);
        let mut ukf = UnscentedKalmanFilter::new(
            UkfConfig::new(fx, dvector![1.0, 2.0], dmatrix![10.0, 0.0; 0.0, 10.0])
                .observation(Observation::state(hx))
                .process_noise(dmatrix![0.01, 0.0; 0.0, 0.01])
                .observation_noise(dmatrix![R])
                .strategy(strategy),
        )?;
        let mut x_act = dvector![3.0, 1.0];
        for _ in 0..50 {
            let u = dvector![0.1];
            x_act = fx(&x_act, &u);
            let x_obs = sensor(&x_act);
            let x_est = ukf.step(&u, &x_obs, StepOptions::commit())?;

            print!("x_act: ({:7.2},{:7.2}) ", x_act[0], x_act[1]);
            print!("x_obs: {:7.2}, ", x_obs[0]);
            print!("x_est: ({:7.2},{:7.2}), ", x_est.state[0], x_est.state[1]);
            println!(
                "p: [{:6.3}, {:6.3}]",
                x_est.covariance[(0, 0)],
                x_est.covariance[(1, 1)]
            );
        }
    }
    Ok(())
}
