// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Entry point for all user interaction. Parses arguments with
// clap and hands off to Layer 2 (application).
//
//   1. `train` — trains the classifier, testing it periodically
//   2. `test`  — evaluates the saved checkpoint on the test set
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, TestArgs, TrainArgs};

#[derive(Parser, Debug)]
#[command(
    name = "action-net",
    version = "0.1.0",
    about = "Train a CNN + LSTM action classifier on segmented video clips."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Dispatch to the matching use case.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args) => run_train(args),
            Commands::Test(args)  => run_test(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    tracing::info!("Starting training on clips in: {}", args.train_dir);

    let summary = TrainUseCase::new(args.into()).execute()?;
    println!(
        "Training stopped at step {} after {} steps.",
        summary.global_step, summary.steps_run
    );
    if let Some(acc) = summary.last_test_accuracy {
        println!("Last test accuracy: {:.2}%", acc * 100.0);
    }
    Ok(())
}

fn run_test(args: TestArgs) -> Result<()> {
    use crate::application::test_use_case::TestUseCase;

    let use_case = TestUseCase::new(args.logs_dir, args.test_dir, args.test_steps, args.seed)?;
    let summary  = use_case.execute()?;
    println!(
        "Test accuracy at step {}: {:.2}%",
        summary.global_step,
        summary.accuracy * 100.0
    );
    Ok(())
}
