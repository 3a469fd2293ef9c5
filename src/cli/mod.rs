// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Entry point for all user interaction. Parses arguments with
// clap and delegates all work to Layer 2 (application).
//
//   1. `train`    — trains the estimator on an image set
//   2. `estimate` — predicts the compressed size of one image
//   3. `synth`    — generates a synthetic image set

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, EstimateArgs, SynthArgs, TrainArgs};

#[derive(Parser, Debug)]
#[command(
    name = "img-ratio-estimator",
    version,
    about = "Learn how well images compress across formats, qualities and widths, then estimate sizes without encoding."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Route to the use case; the CLI layer never computes.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args)    => run_train(args),
            Commands::Estimate(args) => run_estimate(args),
            Commands::Synth(args)    => run_synth(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    tracing::info!("Starting training on dataset: {}", args.dataset);
    let outcome = TrainUseCase::new(args.into()).execute()?;

    println!("\nTraining complete.");
    if let Some(last) = outcome.history.last() {
        println!("  Epochs run:   {}", outcome.history.len());
        println!("  Final loss:   {:.6}", last.loss);
    }
    println!("  Hidden size:  {}", outcome.hidden_size);
    if let Some(loss) = outcome.probe_loss {
        println!("  Held-out MSE: {loss:.6}");
    }
    println!("  Chart:        {}", outcome.chart.display());
    Ok(())
}

fn run_estimate(args: EstimateArgs) -> Result<()> {
    use crate::application::estimate_use_case::EstimateUseCase;

    let use_case = EstimateUseCase::new(args.checkpoint_dir.clone())?;
    let estimate = use_case.estimate(&args.into())?;

    println!(
        "\n{} at quality {}, {}x{}:",
        estimate.format, estimate.quality, estimate.width, estimate.height
    );
    println!("  Raw size:        {} bytes", estimate.raw_bytes);
    println!("  Predicted ratio: {:.4}", estimate.predicted_ratio);
    println!("  Predicted size:  {} bytes", estimate.predicted_bytes);
    if let Some(m) = &estimate.measured {
        println!("  Actual ratio:    {:.4}", m.ratio);
        println!("  Actual size:     {} bytes", m.bytes);
        if let Some(err) = estimate.relative_error() {
            println!("  Error:           {:+.1}%", err * 100.0);
        }
    }
    Ok(())
}

fn run_synth(args: SynthArgs) -> Result<()> {
    use crate::application::synth_use_case::SynthUseCase;

    let path = SynthUseCase::new(args.into()).execute()?;
    println!("Dataset written to {}", path.display());
    Ok(())
}
