//! Experiment logs in and estimates out, both as CSV.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use csv::ReaderBuilder;
use na::dvector;
use serde::Deserialize;

use crate::replay::Sample;
use crate::ukf::Belief;

/// One row of the electronic-load log: `t,V,I1,I2,I3`, no header.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ExperimentRecord {
    pub t: f64,
    pub voltage: f64,
    pub i1: f64,
    pub i2: f64,
    pub i3: f64,
}

impl ExperimentRecord {
    /// Total current over the three load channels.
    pub fn current(&self) -> f64 {
        self.i1 + self.i2 + self.i3
    }
}

pub fn read_experiment_log<P: AsRef<Path>>(path: P) -> Result<Vec<ExperimentRecord>> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    read_records(file).with_context(|| format!("reading {}", path.display()))
}

pub fn read_records<R: Read>(rdr: R) -> Result<Vec<ExperimentRecord>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .trim(csv::Trim::All)
        .from_reader(rdr);
    let mut records = Vec::new();
    for (line, row) in reader.deserialize::<ExperimentRecord>().enumerate() {
        records.push(row.with_context(|| format!("row {}", line + 1))?);
    }
    Ok(records)
}

/// Pairs `u_k = [V_k, I_k]` with `y_{k+1} = [V_{k+1}]`.
pub fn samples_from_records(records: &[ExperimentRecord]) -> Vec<Sample> {
    records
        .windows(2)
        .map(|w| {
            Sample::new(
                dvector![w[0].voltage, w[0].current()],
                dvector![w[1].voltage],
            )
        })
        .collect()
}

/// Reference SOC from delivered energy: `1 − E_k / E_total`, trapezoidal in `t`.
pub fn energy_soc(records: &[ExperimentRecord]) -> Result<Vec<f64>> {
    let mut energy = Vec::with_capacity(records.len());
    let mut acc = 0.0;
    energy.push(acc);
    for w in records.windows(2) {
        let p0 = w[0].voltage * w[0].current();
        let p1 = w[1].voltage * w[1].current();
        acc += 0.5 * (p0 + p1) * (w[1].t - w[0].t);
        energy.push(acc);
    }
    let total = acc;
    if !(total > 0.0) {
        bail!("no energy delivered over the log (total {total})");
    }
    Ok(energy.into_iter().map(|e| 1.0 - e / total).collect())
}

/// CSV sink for `(t, belief)` rows: `t, x0.., p00, p01, ..` (row-major covariance).
pub struct EstimateWriter<W: Write> {
    wtr: csv::Writer<W>,
    dim: usize,
}

impl EstimateWriter<File> {
    pub fn create<P: AsRef<Path>>(path: P, dim: usize) -> Result<Self> {
        let path = path.as_ref();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating {}", dir.display()))?;
        }
        let wtr = csv::Writer::from_path(path)
            .with_context(|| format!("creating {}", path.display()))?;
        Self::with_writer(wtr, dim)
    }
}

impl<W: Write> EstimateWriter<W> {
    pub fn new(w: W, dim: usize) -> Result<Self> {
        Self::with_writer(csv::Writer::from_writer(w), dim)
    }

    fn with_writer(mut wtr: csv::Writer<W>, dim: usize) -> Result<Self> {
        let mut header = vec!["t".to_string()];
        header.extend((0..dim).map(|i| format!("x{i}")));
        for r in 0..dim {
            header.extend((0..dim).map(|c| format!("p{r}{c}")));
        }
        wtr.write_record(&header)?;
        Ok(Self { wtr, dim })
    }

    pub fn write(&mut self, t: f64, belief: &Belief) -> Result<()> {
        if belief.state.len() != self.dim {
            bail!(
                "belief has dimension {}, writer expects {}",
                belief.state.len(),
                self.dim
            );
        }
        let mut row = vec![t.to_string()];
        row.extend(belief.state.iter().map(|v| v.to_string()));
        for r in 0..self.dim {
            row.extend((0..self.dim).map(|c| belief.covariance[(r, c)].to_string()));
        }
        self.wtr.write_record(&row)?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.wtr.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> Result<W> {
        self.wtr
            .into_inner()
            .map_err(|e| anyhow::anyhow!("flushing estimates: {}", e.error()))
    }
}
