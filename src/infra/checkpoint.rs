// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Keeps one rolling checkpoint in the train log directory and
// overwrites it at every report step:
//
//   network/train_logs/
//     model.mpk.gz          ← model weights
//     optimizer.mpk.gz      ← Adam moment estimates
//     training_state.json   ← global step at save time
//     train_config.json     ← everything needed to rebuild the model
//
// Weights are stored at full precision so a restored run keeps
// training from exactly where it stopped.
//
// Reference: Burn Book §5 (Records and Checkpointing)
//            Rust Book §9 (Error Handling)

use anyhow::{Context, Result};
use burn::{
    optim::Optimizer,
    prelude::*,
    record::{FullPrecisionSettings, NamedMpkGzFileRecorder, Recorder},
    tensor::backend::AutodiffBackend,
};
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};

use crate::application::train_use_case::TrainConfig;
use crate::ml::model::ActionClassifier;

type CheckpointRecorder = NamedMpkGzFileRecorder<FullPrecisionSettings>;

const MODEL_FILE:     &str = "model";
const OPTIMIZER_FILE: &str = "optimizer";
const STATE_FILE:     &str = "training_state.json";
const CONFIG_FILE:    &str = "train_config.json";

/// Progress stored alongside the weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingState {
    /// Number of optimizer updates applied to the saved weights
    pub global_step: usize,
}

/// Manages saving and loading of the rolling checkpoint.
pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Create a new CheckpointManager.
    /// Creates the directory if it doesn't already exist.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        fs::create_dir_all(&dir).ok();
        Self { dir }
    }

    /// Path of the model weights, without the extension the recorder adds.
    pub fn model_path(&self) -> PathBuf {
        self.dir.join(MODEL_FILE)
    }

    /// True once a full checkpoint has been written.
    pub fn exists(&self) -> bool {
        self.dir.join(STATE_FILE).exists()
            && self.dir.join(format!("{MODEL_FILE}.mpk.gz")).exists()
    }

    /// Save model, optimizer state and global step.
    ///
    /// The state file is written last, so `exists()` only turns true
    /// after the weights are on disk.
    pub fn save<B, O>(
        &self,
        model:       &ActionClassifier<B>,
        optim:       &O,
        global_step: usize,
    ) -> Result<PathBuf>
    where
        B: AutodiffBackend,
        O: Optimizer<ActionClassifier<B>, B>,
    {
        let model_path = self.model_path();
        CheckpointRecorder::new()
            .record(model.clone().into_record(), model_path.clone())
            .with_context(|| format!("Failed to save model to '{}'", model_path.display()))?;

        let optim_path = self.dir.join(OPTIMIZER_FILE);
        Recorder::<B>::record(&CheckpointRecorder::new(), optim.to_record(), optim_path.clone())
            .with_context(|| format!("Failed to save optimizer to '{}'", optim_path.display()))?;

        let state = TrainingState { global_step };
        fs::write(self.dir.join(STATE_FILE), serde_json::to_string(&state)?)
            .with_context(|| format!("Failed to write {STATE_FILE}"))?;

        tracing::debug!("Saved checkpoint at step {}", global_step);
        Ok(model_path)
    }

    /// Load model weights into a model of the same architecture.
    pub fn load_model<B: Backend>(
        &self,
        model:  ActionClassifier<B>,
        device: &B::Device,
    ) -> Result<ActionClassifier<B>> {
        let path   = self.model_path();
        let record = CheckpointRecorder::new()
            .load(path.clone(), device)
            .with_context(|| {
                format!("Cannot load checkpoint '{}'. Have you trained the model first?",
                    path.display())
            })?;
        Ok(model.load_record(record))
    }

    /// Restore optimizer state saved by `save`.
    pub fn load_optimizer<B, O>(&self, optim: O, device: &B::Device) -> Result<O>
    where
        B: AutodiffBackend,
        O: Optimizer<ActionClassifier<B>, B>,
    {
        let path   = self.dir.join(OPTIMIZER_FILE);
        let record: O::Record = Recorder::<B>::load(&CheckpointRecorder::new(), path.clone(), device)
            .with_context(|| format!("Cannot load optimizer state '{}'", path.display()))?;
        Ok(optim.load_record(record))
    }

    pub fn load_state(&self) -> Result<TrainingState> {
        let path = self.dir.join(STATE_FILE);
        let s = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read '{}'. Has a checkpoint been saved?", path.display()))?;
        Ok(serde_json::from_str(&s)?)
    }

    /// Save the training configuration to JSON.
    pub fn save_config(&self, cfg: &TrainConfig) -> Result<()> {
        let path = self.dir.join(CONFIG_FILE);
        let json = serde_json::to_string_pretty(cfg)?;
        fs::write(&path, json)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;
        tracing::debug!("Saved training config to '{}'", path.display());
        Ok(())
    }

    /// Load the training configuration from JSON.
    pub fn load_config(&self) -> Result<TrainConfig> {
        let path = self.dir.join(CONFIG_FILE);
        let json = fs::read_to_string(&path)
            .with_context(|| {
                format!(
                    "Cannot read config from '{}'. \
                     Make sure you have run 'train' before 'test'.",
                    path.display()
                )
            })?;
        Ok(serde_json::from_str(&json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};
    use burn::optim::AdamConfig;

    use crate::domain::cnn_kind::CnnKind;
    use crate::ml::model::ActionClassifierConfig;

    type TestBackend = Autodiff<NdArray<f32>>;

    #[test]
    fn config_round_trips_through_json() {
        let dir  = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(dir.path());
        let cfg  = TrainConfig { cnn: CnnKind::Inception, frames: 4, ..TrainConfig::default() };

        ckpt.save_config(&cfg).unwrap();
        let loaded = ckpt.load_config().unwrap();
        assert_eq!(loaded.cnn, CnnKind::Inception);
        assert_eq!(loaded.frames, 4);
    }

    #[test]
    fn missing_checkpoint_is_reported() {
        let dir  = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(dir.path().join("empty"));
        assert!(!ckpt.exists());
        assert!(ckpt.load_state().is_err());
        assert!(ckpt.load_config().is_err());
    }

    #[test]
    fn weights_and_step_survive_a_save() {
        let dir    = tempfile::tempdir().unwrap();
        let ckpt   = CheckpointManager::new(dir.path());
        let device = Default::default();
        let cfg    = ActionClassifierConfig::new(CnnKind::Common, 16, 16, 3).with_hidden_size(4);

        let model: ActionClassifier<TestBackend> = cfg.init(&device).unwrap();
        let optim = AdamConfig::new().init::<TestBackend, ActionClassifier<TestBackend>>();
        ckpt.save(&model, &optim, 30).unwrap();

        assert!(ckpt.exists());
        assert_eq!(ckpt.load_state().unwrap(), TrainingState { global_step: 30 });

        let fresh: ActionClassifier<TestBackend> = cfg.init(&device).unwrap();
        let restored = ckpt.load_model(fresh, &device).unwrap();
        let original: Vec<f32> = model.head.weight.val().into_data().to_vec().unwrap();
        let loaded:   Vec<f32> = restored.head.weight.val().into_data().to_vec().unwrap();
        assert_eq!(original, loaded);

        let optim = AdamConfig::new().init::<TestBackend, ActionClassifier<TestBackend>>();
        assert!(ckpt.load_optimizer(optim, &device).is_ok());
    }
}
