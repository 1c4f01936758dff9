extern crate nalgebra as na;

use anyhow::{bail, Context, Result};
use log::LevelFilter;
use na::{dmatrix, dvector};
use simple_logger::SimpleLogger;
use soc_ukf::dataset::{energy_soc, read_experiment_log, samples_from_records};
use soc_ukf::models::PolaBattery;
use soc_ukf::{replay, FailurePolicy, UnscentedKalmanFilter};

// 使い方: cargo run --example replay-csv -- logs/experiment.csv [logs/replay.csv]
fn main() -> Result<()> {
    SimpleLogger::new().with_level(LevelFilter::Info).init()?;

    let mut args = std::env::args().skip(1);
    let Some(input) = args.next() else {
        bail!("usage: replay-csv <experiment.csv> [output.csv]");
    };
    let output = args.next().unwrap_or_else(|| "logs/replay.csv".to_string());

    let records = read_experiment_log(&input)?;
    if records.len() < 2 {
        bail!("{input}: need at least two rows, found {}", records.len());
    }
    let soc_ref = energy_soc(&records)?;
    let samples = samples_from_records(&records);

    let first = &records[0];
    let config = PolaBattery::default()
        .config(
            dvector![0.26, 0.85],
            dmatrix![2e-4_f64.powi(2), 0.0; 0.0, 1e-3_f64.powi(2)],
            dvector![first.voltage, first.current()],
        )
        .process_noise(dmatrix![5e-8, 0.0; 0.0, 1e-6])
        .observation_noise(dmatrix![0.9]);
    let mut ukf = UnscentedKalmanFilter::new(config)?;
    let beliefs = replay(&mut ukf, &samples, FailurePolicy::Skip)?;

    let mut wtr = csv::Writer::from_path(&output).with_context(|| format!("creating {output}"))?;
    wtr.write_record(["t", "soc_ref", "soc_est", "p_soc", "r_est"])?;
    for ((rec, soc), b) in records[1..].iter().zip(&soc_ref[1..]).zip(&beliefs) {
        wtr.write_record(&[
            rec.t.to_string(),
            soc.to_string(),
            b.state[1].to_string(),
            b.covariance[(1, 1)].to_string(),
            b.state[0].to_string(),
        ])?;
    }
    wtr.flush()?;
    log::info!("{} estimates written to {}", beliefs.len(), output);
    Ok(())
}
