// ============================================================
// Layer 2 — TestUseCase
// ============================================================
// Standalone evaluation of a saved checkpoint:
//
//   Step 1: Load train_config.json from <logs>/train_logs  (Layer 6)
//   Step 2: Apply command-line overrides and validate
//   Step 3: Open the test set                             (Layer 4)
//   Step 4: Run begin_test on the inference backend       (Layer 5)

use anyhow::Result;
use burn::backend::{wgpu::WgpuDevice, Wgpu};
use std::path::PathBuf;

use crate::application::train_use_case::TrainConfig;
use crate::data::reader::ClipReader;
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::trainer::{TestSummary, Tester};

type InferBackend = Wgpu;

pub struct TestUseCase {
    config: TrainConfig,
}

impl TestUseCase {
    pub fn new(
        logs_dir:   String,
        test_dir:   Option<String>,
        test_steps: Option<usize>,
        seed:       Option<u64>,
    ) -> Result<Self> {
        let ckpt       = CheckpointManager::new(PathBuf::from(&logs_dir).join("train_logs"));
        let mut config = ckpt.load_config()?;

        // The run may have been moved since training.
        config.logs_dir = logs_dir;
        if let Some(dir) = test_dir {
            config.test_dir = dir;
        }
        if let Some(steps) = test_steps {
            config.test_steps = steps;
        }
        config.seed = seed;
        config.validate()?;

        Ok(Self { config })
    }

    pub fn config(&self) -> &TrainConfig {
        &self.config
    }

    pub fn execute(&self) -> Result<TestSummary> {
        let cfg    = &self.config;
        let reader = ClipReader::open(&cfg.test_dir, cfg.clip_shape(), cfg.seed)?;

        let device = WgpuDevice::default();
        tracing::info!("Using WGPU device: {:?}", device);

        let mut tester = Tester::new(cfg.clone(), Box::new(reader))?;
        tester.begin_test::<InferBackend>(&device)
    }
}
