// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates a training run:
//
//   Step 1: Validate the configuration
//   Step 2: Open the train and test segmented sets   (Layer 4)
//   Step 3: Build the Network (restore check, config) (Layer 5/6)
//   Step 4: Train                                    (Layer 5)
//
// Reference: Burn Book §5 (Training)

use anyhow::{bail, Result};
use burn::backend::{wgpu::WgpuDevice, Autodiff, Wgpu};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::data::reader::ClipReader;
use crate::domain::{clip::ClipShape, cnn_kind::CnnKind};
use crate::ml::{
    features::output_shape,
    model::ActionClassifierConfig,
    trainer::{Network, TrainingSummary},
};

type TrainBackend = Autodiff<Wgpu>;

// ─── Training Configuration ──────────────────────────────────────────────────
// All settings of a training run. Serialisable so it can be saved
// next to the checkpoint and reloaded by the `test` command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    pub cnn:          CnnKind,
    pub frames:       usize,
    pub height:       usize,
    pub width:        usize,
    pub classes:      usize,
    pub lr:           f64,
    pub restore:      bool,
    pub train_dir:    String,
    pub test_dir:     String,
    pub logs_dir:     String,
    pub max_steps:    Option<usize>,
    pub report_every: usize,
    pub test_every:   usize,
    pub test_steps:   usize,
    pub seed:         Option<u64>,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            cnn:          CnnKind::Common,
            frames:       16,
            height:       112,
            width:        112,
            classes:      6,
            lr:           1e-4,
            restore:      false,
            train_dir:    "dataset/data/segmented_set1".to_string(),
            test_dir:     "dataset/data/segmented_set2".to_string(),
            logs_dir:     "network".to_string(),
            max_steps:    None,
            report_every: 10,
            test_every:   100,
            test_steps:   100,
            seed:         None,
        }
    }
}

impl TrainConfig {
    pub fn clip_shape(&self) -> ClipShape {
        ClipShape::new(self.frames, self.height, self.width)
    }

    pub fn model_config(&self) -> ActionClassifierConfig {
        ActionClassifierConfig::new(self.cnn, self.height, self.width, self.classes)
    }

    /// Checkpoint and train summaries live here.
    pub fn train_logs_dir(&self) -> PathBuf {
        PathBuf::from(&self.logs_dir).join("train_logs")
    }

    pub fn test_logs_dir(&self) -> PathBuf {
        PathBuf::from(&self.logs_dir).join("test_logs")
    }

    /// Reject settings the training loop cannot honour.
    pub fn validate(&self) -> Result<()> {
        if self.frames == 0 {
            bail!("--frames must be at least 1");
        }
        if self.classes < 2 {
            bail!("--classes must be at least 2, got {}", self.classes);
        }
        if !(self.lr > 0.0 && self.lr.is_finite()) {
            bail!("--lr must be a positive number, got {}", self.lr);
        }
        if self.report_every == 0 {
            bail!("--report-every must be at least 1");
        }
        if self.test_every == 0 || self.test_every % self.report_every != 0 {
            bail!(
                "--test-every ({}) must be a positive multiple of --report-every ({})",
                self.test_every, self.report_every
            );
        }
        if self.test_steps == 0 || self.test_steps % self.report_every != 0 {
            bail!(
                "--test-steps ({}) must be a positive multiple of --report-every ({})",
                self.test_steps, self.report_every
            );
        }
        output_shape(self.cnn, self.height, self.width)?;
        Ok(())
    }

    /// Check that a checkpoint saved with `self` can be restored into a
    /// model built from `other`.
    pub fn ensure_compatible(&self, other: &TrainConfig) -> Result<()> {
        let mismatch = |name: &str, saved: String, given: String| -> Result<()> {
            if saved != given {
                bail!("Cannot restore: checkpoint was trained with --{name} {saved}, got {given}");
            }
            Ok(())
        };
        mismatch("cnn", self.cnn.to_string(), other.cnn.to_string())?;
        mismatch("height", self.height.to_string(), other.height.to_string())?;
        mismatch("width", self.width.to_string(), other.width.to_string())?;
        mismatch("classes", self.classes.to_string(), other.classes.to_string())
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    /// Execute the full training pipeline end to end
    pub fn execute(&self) -> Result<TrainingSummary> {
        let cfg = &self.config;

        // ── Step 1: Validate ─────────────────────────────────────────────────
        cfg.validate()?;

        // ── Step 2: Open readers ─────────────────────────────────────────────
        // The test reader gets a different seed so both sets are not
        // sampled in lock-step.
        let shape        = cfg.clip_shape();
        let train_reader = ClipReader::open(&cfg.train_dir, shape, cfg.seed)?;
        let test_reader  = ClipReader::open(&cfg.test_dir, shape, cfg.seed.map(|s| s ^ 0x5eed))?;

        // ── Step 3: Build the Network ────────────────────────────────────────
        // Checks a restore against the saved train_config.json before
        // replacing it with this run's settings.
        let mut network = Network::new(
            cfg.clone(),
            Box::new(train_reader),
            Box::new(test_reader),
        )?;

        // ── Step 4: Train ────────────────────────────────────────────────────
        let device = WgpuDevice::default();
        tracing::info!("Using WGPU device: {:?}", device);
        tracing::info!("Using {} feature extractor", cfg.cnn);
        network.begin_training::<TrainBackend>(&device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        TrainConfig::default().validate().unwrap();
    }

    #[test]
    fn test_cadence_must_align_with_reports() {
        let cfg = TrainConfig { test_every: 25, ..TrainConfig::default() };
        assert!(cfg.validate().is_err());

        let cfg = TrainConfig { test_steps: 15, ..TrainConfig::default() };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn frame_size_must_suit_the_extractor() {
        let cfg = TrainConfig { cnn: CnnKind::Vgg16, height: 16, width: 16, ..TrainConfig::default() };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn restore_needs_the_same_architecture() {
        let saved = TrainConfig::default();
        let ok    = TrainConfig { lr: 1e-3, max_steps: Some(5), restore: true, ..saved.clone() };
        saved.ensure_compatible(&ok).unwrap();

        let other_cnn = TrainConfig { cnn: CnnKind::Vgg16, ..saved.clone() };
        let err = saved.ensure_compatible(&other_cnn).unwrap_err();
        assert!(err.to_string().contains("--cnn common"));

        let other_width = TrainConfig { width: 128, ..saved.clone() };
        assert!(saved.ensure_compatible(&other_width).is_err());
    }

    #[test]
    fn log_directories_nest_under_logs_dir() {
        let cfg = TrainConfig { logs_dir: "runs/a".into(), ..TrainConfig::default() };
        assert_eq!(cfg.train_logs_dir(), PathBuf::from("runs/a/train_logs"));
        assert_eq!(cfg.test_logs_dir(), PathBuf::from("runs/a/test_logs"));
    }
}
