// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Step-driven train / test loop with Adam.
//
// Every step draws one random clip and applies one update. On a
// fixed cadence the loop also:
//
//   every `report_every` steps  → log window accuracy, save checkpoint
//   every `test_every` steps    → log epoch accuracy, run begin_test
//
// begin_test rebuilds the model on the inner (non-autodiff)
// backend from the checkpoint just written. Without autodiff,
// batch norm uses its running statistics and dropout is off.
//
// Reference: Burn Book §5, Kingma & Ba (2015) Adam

use anyhow::{bail, Result};
use burn::{
    data::dataloader::batcher::Batcher,
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use std::time::Instant;

use crate::application::train_use_case::TrainConfig;
use crate::data::batcher::ClipBatcher;
use crate::domain::{clip::VideoClip, traits::ExampleSource};
use crate::infra::{
    checkpoint::CheckpointManager,
    metrics::{AccuracyTracker, MetricsLogger, StepMetrics},
};
use crate::ml::model::{ActionClassifier, ClassificationOutput};

/// What a `begin_training` call achieved.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainingSummary {
    pub global_step:        usize,
    pub steps_run:          usize,
    pub last_test_accuracy: Option<f64>,
}

/// Result of one `begin_test` pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TestSummary {
    /// Global step of the checkpoint that was evaluated
    pub global_step: usize,
    /// Mean of the window accuracies over the pass
    pub accuracy:    f64,
}

fn fetch(reader: &mut dyn ExampleSource, classes: usize) -> Result<VideoClip> {
    let clip = reader.random_example()?;
    if clip.label as usize >= classes {
        bail!("Clip label {} is outside the {} configured classes", clip.label, classes);
    }
    Ok(clip)
}

fn log_params<B: Backend>(model: &ActionClassifier<B>) {
    tracing::info!("Number of trainable parameters: {}", model.num_params());
    for (name, count) in model.param_summary() {
        tracing::debug!("  {:<8} {}", name, count);
    }
}

// ─── Tester ───────────────────────────────────────────────────────────────────

/// Evaluates the saved checkpoint on the test set.
pub struct Tester {
    cfg:    TrainConfig,
    reader: Box<dyn ExampleSource>,
    ckpt:   CheckpointManager,
    writer: MetricsLogger,
}

impl Tester {
    pub fn new(cfg: TrainConfig, reader: Box<dyn ExampleSource>) -> Result<Self> {
        let ckpt   = CheckpointManager::new(cfg.train_logs_dir());
        let writer = MetricsLogger::new(cfg.test_logs_dir())?;
        Ok(Self { cfg, reader, ckpt, writer })
    }

    pub fn begin_test<B: Backend>(&mut self, device: &B::Device) -> Result<TestSummary> {
        let model: ActionClassifier<B> = self.cfg.model_config().init(device)?;
        let model       = self.ckpt.load_model(model, device)?;
        let global_step = self.ckpt.load_state()?.global_step;
        tracing::info!("Model restored from step {}", global_step);
        log_params(&model);

        let batcher     = ClipBatcher::<B>::new(device.clone());
        let window      = self.cfg.report_every;
        let mut tracker = AccuracyTracker::new(window);

        for sc in 1..=self.cfg.test_steps {
            let clip    = fetch(self.reader.as_mut(), self.cfg.classes)?;
            let started = Instant::now();
            let out: ClassificationOutput<B> = model.forward_classification(batcher.batch(vec![clip]))?;
            let accuracy      = out.accuracy();
            let cross_entropy = out.loss_value();

            tracker.record(accuracy);
            self.writer.log(&StepMetrics {
                step: global_step,
                cross_entropy,
                accuracy,
                elapsed_ms: started.elapsed().as_millis(),
            })?;
            tracing::info!("[test] Accuracy on step {}: {}", global_step, accuracy);

            if sc % window == 0 {
                let acc = tracker.close_window();
                tracing::info!("[test] Accuracy for {} steps: {:.2}", window, acc);
            }
        }

        let accuracy = tracker.close_epoch().unwrap_or_default();
        tracing::info!("[test] Test accuracy: {:.4}", accuracy);
        Ok(TestSummary { global_step, accuracy })
    }
}

// ─── Network ──────────────────────────────────────────────────────────────────

/// Owns the readers, summaries and checkpoint of one training run.
pub struct Network {
    cfg:          TrainConfig,
    train_reader: Box<dyn ExampleSource>,
    ckpt:         CheckpointManager,
    train_writer: MetricsLogger,
    tester:       Tester,
}

impl Network {
    pub fn new(
        cfg:          TrainConfig,
        train_reader: Box<dyn ExampleSource>,
        test_reader:  Box<dyn ExampleSource>,
    ) -> Result<Self> {
        cfg.validate()?;
        let ckpt = CheckpointManager::new(cfg.train_logs_dir());
        if cfg.restore {
            // must run before save_config replaces the saved run
            ckpt.load_config()?.ensure_compatible(&cfg)?;
        }
        ckpt.save_config(&cfg)?;

        let train_writer = MetricsLogger::new(cfg.train_logs_dir())?;
        let tester       = Tester::new(cfg.clone(), test_reader)?;
        Ok(Self { cfg, train_reader, ckpt, train_writer, tester })
    }

    /// Run the train loop until `max_steps` (forever when unset).
    pub fn begin_training<B: AutodiffBackend>(&mut self, device: &B::Device) -> Result<TrainingSummary> {
        let mut model: ActionClassifier<B> = self.cfg.model_config().init(device)?;
        let mut optim = AdamConfig::new().init::<B, ActionClassifier<B>>();
        let mut global_step = 0;

        if self.cfg.restore {
            model       = self.ckpt.load_model(model, device)?;
            optim       = self.ckpt.load_optimizer(optim, device)?;
            global_step = self.ckpt.load_state()?.global_step;
            tracing::info!("Model restored at step {}", global_step);
        }
        log_params(&model);

        let batcher     = ClipBatcher::<B>::new(device.clone());
        let window      = self.cfg.report_every;
        let mut tracker = AccuracyTracker::new(window);
        let mut last_test_accuracy = None;

        let mut i = 1;
        while self.cfg.max_steps.map_or(true, |max| i <= max) {
            let clip    = fetch(self.train_reader.as_mut(), self.cfg.classes)?;
            let started = Instant::now();

            let out           = model.forward_classification(batcher.batch(vec![clip]))?;
            let accuracy      = out.accuracy();
            let cross_entropy = out.loss_value();

            let grads = GradientsParams::from_grads(out.loss.backward(), &model);
            model = optim.step(self.cfg.lr, model, grads);
            global_step += 1;

            tracker.record(accuracy);
            self.train_writer.log(&StepMetrics {
                step: global_step,
                cross_entropy,
                accuracy,
                elapsed_ms: started.elapsed().as_millis(),
            })?;
            tracing::info!("[train] Accuracy on step {}: {}", global_step, accuracy);

            if i % window == 0 {
                let acc = tracker.close_window();
                tracing::info!("[train] Accuracy for {} steps: {:.2}", window, acc);

                let path = self.ckpt.save(&model, &optim, global_step)?;
                tracing::info!("[train] Model saved in file: {}", path.display());

                if i % self.cfg.test_every == 0 {
                    if let Some(epoch) = tracker.close_epoch() {
                        tracing::info!("[train] Epoch accuracy: {:.4}", epoch);
                    }
                    let test = self.begin_test::<B::InnerBackend>(device)?;
                    last_test_accuracy = Some(test.accuracy);
                }
            }
            i += 1;
        }

        tracing::info!("Training stopped at step {}", global_step);
        Ok(TrainingSummary { global_step, steps_run: i - 1, last_test_accuracy })
    }

    /// Evaluate the latest checkpoint on the test set.
    pub fn begin_test<B: Backend>(&mut self, device: &B::Device) -> Result<TestSummary> {
        self.tester.begin_test::<B>(device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};
    use std::fs;

    use crate::domain::{clip::ClipShape, cnn_kind::CnnKind};

    type TestBackend = Autodiff<NdArray<f32>>;

    /// Cycles through labels; brightness depends on the label.
    struct CyclingSource {
        shape: ClipShape,
        next:  u32,
        labels: u32,
    }

    impl ExampleSource for CyclingSource {
        fn random_example(&mut self) -> Result<VideoClip> {
            let label = self.next % self.labels;
            self.next += 1;
            let value = (label * 80) as u8;
            VideoClip::new(label, self.shape, vec![value; self.shape.pixel_len()])
        }
    }

    fn config(logs_dir: &std::path::Path) -> TrainConfig {
        TrainConfig {
            cnn:          CnnKind::Common,
            frames:       2,
            height:       12,
            width:        12,
            classes:      3,
            lr:           1e-3,
            logs_dir:     logs_dir.to_string_lossy().into_owned(),
            max_steps:    Some(20),
            report_every: 5,
            test_every:   10,
            test_steps:   5,
            seed:         Some(0),
            ..TrainConfig::default()
        }
    }

    fn source(cfg: &TrainConfig, labels: u32) -> Box<dyn ExampleSource> {
        Box::new(CyclingSource { shape: cfg.clip_shape(), next: 0, labels })
    }

    fn csv_rows(path: std::path::PathBuf) -> usize {
        fs::read_to_string(path).unwrap().lines().count() - 1
    }

    #[test]
    fn training_checkpoints_and_tests_on_cadence() {
        let dir    = tempfile::tempdir().unwrap();
        let cfg    = config(dir.path());
        let device = Default::default();

        let mut network = Network::new(cfg.clone(), source(&cfg, 3), source(&cfg, 3)).unwrap();
        let summary = network.begin_training::<TestBackend>(&device).unwrap();

        assert_eq!(summary.global_step, 20);
        assert_eq!(summary.steps_run, 20);
        let acc = summary.last_test_accuracy.unwrap();
        assert!((0.0..=1.0).contains(&acc));

        let ckpt = CheckpointManager::new(cfg.train_logs_dir());
        assert!(ckpt.exists());
        assert_eq!(ckpt.load_state().unwrap().global_step, 20);

        assert_eq!(csv_rows(cfg.train_logs_dir().join("metrics.csv")), 20);
        // tests at steps 10 and 20, five examples each
        assert_eq!(csv_rows(cfg.test_logs_dir().join("metrics.csv")), 10);
    }

    #[test]
    fn restore_continues_the_global_step() {
        let dir    = tempfile::tempdir().unwrap();
        let cfg    = TrainConfig { max_steps: Some(10), ..config(dir.path()) };
        let device = Default::default();

        Network::new(cfg.clone(), source(&cfg, 3), source(&cfg, 3))
            .unwrap()
            .begin_training::<TestBackend>(&device)
            .unwrap();

        let resumed = TrainConfig { restore: true, max_steps: Some(5), ..cfg };
        let summary = Network::new(resumed.clone(), source(&resumed, 3), source(&resumed, 3))
            .unwrap()
            .begin_training::<TestBackend>(&device)
            .unwrap();

        assert_eq!(summary.global_step, 15);
        let state = CheckpointManager::new(resumed.train_logs_dir()).load_state().unwrap();
        assert_eq!(state.global_step, 15);
    }

    #[test]
    fn restore_without_checkpoint_fails() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = TrainConfig { restore: true, ..config(dir.path()) };
        assert!(Network::new(cfg.clone(), source(&cfg, 3), source(&cfg, 3)).is_err());
    }

    #[test]
    fn restore_with_another_architecture_is_rejected() {
        let dir    = tempfile::tempdir().unwrap();
        let cfg    = TrainConfig { max_steps: Some(10), ..config(dir.path()) };
        let device = Default::default();

        Network::new(cfg.clone(), source(&cfg, 3), source(&cfg, 3))
            .unwrap()
            .begin_training::<TestBackend>(&device)
            .unwrap();

        let switched = TrainConfig {
            cnn:     CnnKind::Inception,
            height:  32,
            width:   32,
            restore: true,
            ..cfg.clone()
        };
        let err = Network::new(switched.clone(), source(&switched, 3), source(&switched, 3))
            .err()
            .unwrap();
        assert!(err.to_string().contains("cnn"));

        // the saved run is left untouched
        let saved = CheckpointManager::new(cfg.train_logs_dir()).load_config().unwrap();
        assert_eq!(saved.cnn, CnnKind::Common);
        assert_eq!(saved.height, 12);

        let more_classes = TrainConfig { classes: 4, restore: true, ..cfg };
        assert!(Network::new(more_classes.clone(), source(&more_classes, 3), source(&more_classes, 3)).is_err());
    }

    #[test]
    fn inception_runs_a_full_train_and_test_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = TrainConfig {
            cnn:          CnnKind::Inception,
            frames:       1,
            height:       32,
            width:        32,
            max_steps:    Some(1),
            report_every: 1,
            test_every:   1,
            test_steps:   1,
            ..config(dir.path())
        };
        let device = Default::default();

        let mut network = Network::new(cfg.clone(), source(&cfg, 3), source(&cfg, 3)).unwrap();
        let summary = network.begin_training::<TestBackend>(&device).unwrap();

        assert_eq!(summary.global_step, 1);
        assert!(summary.last_test_accuracy.is_some());
        assert_eq!(csv_rows(cfg.test_logs_dir().join("metrics.csv")), 1);
    }

    #[test]
    fn inference_backend_is_deterministic() {
        type InferBackend = <TestBackend as AutodiffBackend>::InnerBackend;

        let device = Default::default();
        let cfg    = crate::ml::model::ActionClassifierConfig::new(CnnKind::Vgg16, 32, 32, 3)
            .with_hidden_size(4);
        let model: ActionClassifier<InferBackend> = cfg.init(&device).unwrap();

        let shape   = ClipShape::new(2, 32, 32);
        let pixels  = (0..shape.pixel_len()).map(|i| (i % 199) as u8).collect();
        let clip    = VideoClip::new(1, shape, pixels).unwrap();
        let batcher = ClipBatcher::<InferBackend>::new(device);

        // dropout is off and batch norm uses running statistics
        let logits = |clip: VideoClip| -> Vec<f32> {
            let out = model.forward_classification(batcher.batch(vec![clip])).unwrap();
            out.logits.into_data().to_vec().unwrap()
        };
        assert_eq!(logits(clip.clone()), logits(clip));
    }

    #[test]
    fn out_of_range_label_is_an_error() {
        let dir    = tempfile::tempdir().unwrap();
        let cfg    = config(dir.path());
        let device = Default::default();

        // labels 0..5 but only 3 classes configured
        let mut network = Network::new(cfg.clone(), source(&cfg, 5), source(&cfg, 3)).unwrap();
        assert!(network.begin_training::<TestBackend>(&device).is_err());
    }
}
