// ============================================================
// Layer 6 — Summaries and Accuracy Accounting
// ============================================================
// Two pieces:
//
//   MetricsLogger   — one CSV per phase (train_logs/, test_logs/)
//                     with a row per step:
//                       step,cross_entropy,accuracy,elapsed_ms
//
//   AccuracyTracker — the windowed accuracy reported every
//                     `window` steps, and the epoch accuracy
//                     (mean of the windows since the last epoch)
//
// Window accuracy is "correct answers since the last report
// divided by the window length", so a window always has the
// same denominator even if it was closed early.
//
// Example CSV output:
//   step,cross_entropy,accuracy,elapsed_ms
//   1,1.791759,0.000000,412
//   2,1.772013,1.000000,398
//
// Reference: Rust Book §12 (I/O and File Handling)

use anyhow::{Context, Result};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};
use serde::{Deserialize, Serialize};

const CSV_HEADER: &str = "step,cross_entropy,accuracy,elapsed_ms";

/// One row of the per-step summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepMetrics {
    /// Global step the row belongs to
    pub step: usize,

    /// Cross-entropy loss of this step
    pub cross_entropy: f64,

    /// Accuracy of this step, in [0.0, 1.0]
    pub accuracy: f64,

    /// Wall time of the forward (and backward) pass
    pub elapsed_ms: u128,
}

/// Appends step metrics to a CSV file for later analysis.
pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Create a logger writing `metrics.csv` under `dir`.
    /// Writes the CSV header if the file doesn't exist yet, so a
    /// restored run keeps appending to the same file.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create log directory '{}'", dir.display()))?;

        let csv_path = dir.join("metrics.csv");
        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)?;
            writeln!(f, "{CSV_HEADER}")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    pub fn log(&self, m: &StepMetrics) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("Cannot open '{}'", self.csv_path.display()))?;

        writeln!(
            f,
            "{},{:.6},{:.6},{}",
            m.step, m.cross_entropy, m.accuracy, m.elapsed_ms,
        )?;
        Ok(())
    }
}

/// Windowed and per-epoch accuracy bookkeeping.
#[derive(Debug, Clone)]
pub struct AccuracyTracker {
    window:  usize,
    correct: f64,
    windows: Vec<f64>,
}

impl AccuracyTracker {
    pub fn new(window: usize) -> Self {
        Self { window: window.max(1), correct: 0.0, windows: Vec::new() }
    }

    /// Count one step's accuracy towards the open window.
    pub fn record(&mut self, accuracy: f64) {
        self.correct += accuracy;
    }

    /// Close the current window and return its accuracy.
    pub fn close_window(&mut self) -> f64 {
        let acc = self.correct / self.window as f64;
        self.windows.push(acc);
        self.correct = 0.0;
        acc
    }

    /// Mean of the windows closed since the last epoch, if any.
    pub fn close_epoch(&mut self) -> Option<f64> {
        if self.windows.is_empty() {
            return None;
        }
        let mean = self.windows.iter().sum::<f64>() / self.windows.len() as f64;
        self.windows.clear();
        Some(mean)
    }
}
