//! Append-mode CSV metrics log.
//!
//! The header is written only when the file is created, so repeated runs
//! accumulate rows in one file.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use crate::kernel::metrics::Metrics;

pub const CSV_HEADER: &str =
    "gen,welfare,inequality,hardship,polarization_mean,polarization_std,openness,conformity";

pub struct MetricsLog {
    file: std::fs::File,
}

impl MetricsLog {
    /// Open (creating if needed) the log at `path`.
    pub fn open(path: &Path) -> std::io::Result<Self> {
        let is_new = !path.exists();
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        if is_new {
            writeln!(file, "{}", CSV_HEADER)?;
        }
        Ok(Self { file })
    }

    pub fn append(&mut self, generation: u64, metrics: &Metrics) -> std::io::Result<()> {
        writeln!(
            self.file,
            "{},{:.4},{:.4},{:.4},{:.4},{:.4},{:.4},{:.4}",
            generation,
            metrics.global_welfare,
            metrics.global_inequality,
            metrics.global_hardship,
            metrics.polarization_mean,
            metrics.polarization_std,
            metrics.avg_openness,
            metrics.avg_conformity
        )
    }
}
