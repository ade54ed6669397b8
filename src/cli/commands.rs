// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the two subcommands, `train` and `test`, and all
// their configurable flags.
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand};

use crate::application::train_use_case::TrainConfig;
use crate::domain::cnn_kind::CnnKind;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train the action classifier, testing it periodically
    Train(TrainArgs),

    /// Evaluate the saved checkpoint on the test set
    Test(TestArgs),
}

/// All arguments for the `train` command.
#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Convolutional feature extractor: common, inception or vgg16
    #[arg(long, default_value = "common")]
    pub cnn: CnnKind,

    /// Frames per clip (the LSTM sequence length)
    #[arg(long, default_value_t = 16)]
    pub frames: usize,

    /// Frame height in pixels
    #[arg(long, default_value_t = 112)]
    pub height: usize,

    /// Frame width in pixels
    #[arg(long, default_value_t = 112)]
    pub width: usize,

    /// Number of action classes
    #[arg(long, default_value_t = 6)]
    pub classes: usize,

    /// Adam learning rate
    #[arg(long, default_value_t = 1e-4)]
    pub lr: f64,

    /// Continue from the checkpoint in <logs-dir>/train_logs
    #[arg(long)]
    pub restore: bool,

    /// Segmented set used for training
    #[arg(long, default_value = "dataset/data/segmented_set1")]
    pub train_dir: String,

    /// Segmented set used for periodic testing
    #[arg(long, default_value = "dataset/data/segmented_set2")]
    pub test_dir: String,

    /// Root of train_logs/ (checkpoint, train summaries) and test_logs/
    #[arg(long, default_value = "network")]
    pub logs_dir: String,

    /// Stop after this many steps; runs until interrupted when omitted
    #[arg(long)]
    pub max_steps: Option<usize>,

    /// Steps between accuracy reports and checkpoints
    #[arg(long, default_value_t = 10)]
    pub report_every: usize,

    /// Steps between test passes (multiple of --report-every)
    #[arg(long, default_value_t = 100)]
    pub test_every: usize,

    /// Examples evaluated per test pass (multiple of --report-every)
    #[arg(long, default_value_t = 100)]
    pub test_steps: usize,

    /// Seed for example sampling
    #[arg(long)]
    pub seed: Option<u64>,
}

/// The application layer never sees clap types.
impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            cnn:          a.cnn,
            frames:       a.frames,
            height:       a.height,
            width:        a.width,
            classes:      a.classes,
            lr:           a.lr,
            restore:      a.restore,
            train_dir:    a.train_dir,
            test_dir:     a.test_dir,
            logs_dir:     a.logs_dir,
            max_steps:    a.max_steps,
            report_every: a.report_every,
            test_every:   a.test_every,
            test_steps:   a.test_steps,
            seed:         a.seed,
        }
    }
}

/// All arguments for the `test` command
#[derive(Args, Debug)]
pub struct TestArgs {
    /// Directory holding train_logs/ from a previous `train` run
    #[arg(long, default_value = "network")]
    pub logs_dir: String,

    /// Override the test set recorded in the saved config
    #[arg(long)]
    pub test_dir: Option<String>,

    /// Override the number of examples to evaluate
    #[arg(long)]
    pub test_steps: Option<usize>,

    /// Seed for example sampling
    #[arg(long)]
    pub seed: Option<u64>,
}
