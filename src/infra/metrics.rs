// ============================================================
// Layer 6 — Metrics Logger
// ============================================================
// Appends one CSV row per completed epoch.
//
// Output file: checkpoints/metrics.csv
//
//   epoch,loss,hidden_size,samples,failed_batches,elapsed_ms
//   1,0.004213,10,1000,0,8123
//   2,0.002871,10,1000,1,7990
//   ...
//
// Rows are appended across runs; a resumed run continues the
// epoch numbering, so the file stays one continuous log.

use anyhow::Result;
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::PathBuf,
};

use crate::domain::history::EpochMetrics;

const HEADER: &str = "epoch,loss,hidden_size,samples,failed_batches,elapsed_ms";

/// Logs epoch metrics to a CSV file for later analysis.
pub struct MetricsLogger {
    /// Full path to the CSV file
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Writes the CSV header if the file doesn't exist yet.
    pub fn new(csv_path: impl Into<PathBuf>) -> Result<Self> {
        let csv_path = csv_path.into();
        if let Some(dir) = csv_path.parent() {
            fs::create_dir_all(dir)?;
        }

        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)?;
            writeln!(f, "{HEADER}")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    /// Append one epoch's metrics as a new row in the CSV.
    pub fn log(&self, m: &EpochMetrics) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)?;

        writeln!(
            f,
            "{},{:.6},{},{},{},{}",
            m.epoch,
            m.loss,
            m.hidden_size,
            m.samples,
            m.failed_batches,
            m.elapsed_ms,
        )?;

        tracing::debug!("Logged epoch {} metrics: loss={:.6}", m.epoch, m.loss);
        Ok(())
    }
}
