// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the three subcommands: `train`, `estimate` and `synth`
// and all their configurable flags.
//
// clap's derive macros generate the help text, the errors for
// missing args and the FromStr conversions (formats, optimizer).

use std::path::PathBuf;

use clap::{Args, Subcommand};

use crate::application::{
    estimate_use_case::EstimateRequest,
    synth_use_case::SynthConfig,
    train_use_case::TrainConfig,
};
use crate::domain::format::ImageFormat;
use crate::ml::optimizer::OptimizerKind;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train the compression ratio estimator on an image set
    Train(TrainArgs),

    /// Estimate the compressed size of one image with a trained checkpoint
    Estimate(EstimateArgs),

    /// Generate a synthetic image set from a prompt bank
    Synth(SynthArgs),
}

/// All arguments for the `train` command.
#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Dataset name under --datasets-dir, or a path to a dataset JSON file
    #[arg(long)]
    pub dataset: String,

    #[arg(long, default_value = "image_datasets")]
    pub datasets_dir: PathBuf,

    /// Directory for checkpoints, the run config and metrics.csv
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: PathBuf,

    /// Where the training chart is written
    #[arg(long, default_value = ".plots")]
    pub plots_dir: PathBuf,

    /// Hidden layer width of a fresh model (ignored when resuming)
    #[arg(long, default_value_t = 10)]
    pub hidden_size: usize,

    #[arg(long, default_value_t = 0.01)]
    pub lr: f64,

    /// adam, sgd or rmsprop
    #[arg(long, default_value_t = OptimizerKind::Adam)]
    pub optimizer: OptimizerKind,

    #[arg(long, default_value_t = 50)]
    pub epochs: usize,

    #[arg(long, default_value_t = 1000)]
    pub samples_per_epoch: usize,

    #[arg(long, default_value_t = 32)]
    pub batch_size: usize,

    #[arg(long, default_value_t = 2)]
    pub min_quality: u32,

    #[arg(long, default_value_t = 100)]
    pub max_quality: u32,

    #[arg(long, default_value_t = 64)]
    pub min_width: u32,

    #[arg(long, default_value_t = 2048)]
    pub max_width: u32,

    /// Formats to sample from (jpeg, png, webp)
    #[arg(long, num_args = 1.., default_values_t = [ImageFormat::Webp, ImageFormat::Jpeg])]
    pub formats: Vec<ImageFormat>,

    /// Save a checkpoint every N epochs (0 saves only at the end)
    #[arg(long, default_value_t = 5)]
    pub save_interval: usize,

    /// Start from scratch even if a checkpoint exists
    #[arg(long)]
    pub no_load: bool,

    /// Write every encoded training sample to this directory
    #[arg(long)]
    pub save_samples: Option<PathBuf>,

    /// Seed for sampling and weight init; random when absent
    #[arg(long)]
    pub seed: Option<u64>,

    /// Hidden units added per growth
    #[arg(long, default_value_t = 8)]
    pub growth_step: usize,

    /// Grow the hidden layer every N epochs
    #[arg(long)]
    pub grow_every: Option<usize>,

    /// Grow after N epochs without relative loss improvement
    #[arg(long, default_value_t = 5)]
    pub plateau_patience: usize,

    /// Disable plateau-triggered growth
    #[arg(long)]
    pub no_plateau_growth: bool,

    /// Relative improvement that counts as progress for plateau detection
    #[arg(long, default_value_t = 0.01)]
    pub min_improvement: f64,

    #[arg(long, default_value_t = 256)]
    pub max_hidden_size: usize,

    /// Failed batches tolerated per epoch before the run aborts
    #[arg(long, default_value_t = 10)]
    pub max_failed_batches: usize,
}

/// The application layer never sees clap types.
impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            dataset:             a.dataset,
            datasets_dir:        a.datasets_dir,
            checkpoint_dir:      a.checkpoint_dir,
            plots_dir:           a.plots_dir,
            initial_hidden_size: a.hidden_size,
            learning_rate:       a.lr,
            optimizer:           a.optimizer,
            epochs:              a.epochs,
            samples_per_epoch:   a.samples_per_epoch,
            batch_size:          a.batch_size,
            min_quality:         a.min_quality,
            max_quality:         a.max_quality,
            min_width:           a.min_width,
            max_width:           a.max_width,
            formats:             a.formats,
            save_interval:       a.save_interval,
            no_load:             a.no_load,
            save_samples:        a.save_samples,
            seed:                a.seed,
            growth_step:         a.growth_step,
            grow_every:          a.grow_every,
            plateau_patience:    (!a.no_plateau_growth).then_some(a.plateau_patience),
            min_improvement:     a.min_improvement,
            max_hidden_size:     a.max_hidden_size,
            max_failed_batches:  a.max_failed_batches,
        }
    }
}

/// All arguments for the `estimate` command
#[derive(Args, Debug)]
pub struct EstimateArgs {
    /// Image to estimate
    #[arg(long)]
    pub image: PathBuf,

    #[arg(long, default_value_t = ImageFormat::Webp)]
    pub format: ImageFormat,

    #[arg(long, default_value_t = 80)]
    pub quality: u32,

    /// Target width; the image's own width when absent
    #[arg(long)]
    pub width: Option<u32>,

    /// Encode the image for real and compare
    #[arg(long)]
    pub verify: bool,

    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: PathBuf,
}

impl From<EstimateArgs> for EstimateRequest {
    fn from(a: EstimateArgs) -> Self {
        EstimateRequest {
            image:   a.image,
            format:  a.format,
            quality: a.quality,
            width:   a.width,
            verify:  a.verify,
        }
    }
}

/// All arguments for the `synth` command
#[derive(Args, Debug)]
pub struct SynthArgs {
    /// Prompt bank JSON ({"prefix", "suffix", "prompts"}); built-in bank when absent
    #[arg(long)]
    pub prompts: Option<PathBuf>,

    #[arg(long, default_value = "image_datasets")]
    pub out_dir: PathBuf,

    #[arg(long, default_value_t = 10)]
    pub num_images: usize,

    #[arg(long, default_value_t = 512)]
    pub width: u32,

    #[arg(long, default_value_t = 512)]
    pub height: u32,

    /// Amplitude falloff of the pattern octaves; higher is smoother
    #[arg(long, default_value_t = 1.5)]
    pub fractal_power: f64,

    #[arg(long)]
    pub seed: Option<u64>,
}

impl From<SynthArgs> for SynthConfig {
    fn from(a: SynthArgs) -> Self {
        SynthConfig {
            prompts:       a.prompts,
            out_dir:       a.out_dir,
            num_images:    a.num_images,
            width:         a.width,
            height:        a.height,
            fractal_power: a.fractal_power,
            seed:          a.seed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;

    #[test]
    fn test_train_defaults_match_config_defaults() {
        let cli = Cli::try_parse_from(["img-ratio-estimator", "train", "--dataset", "set"]).unwrap();
        let Commands::Train(args) = cli.command else { panic!("expected train") };
        let cfg: TrainConfig = args.into();
        assert_eq!(cfg, TrainConfig { dataset: "set".into(), ..TrainConfig::default() });
    }

    #[test]
    fn test_train_flags_are_parsed() {
        let cli = Cli::try_parse_from([
            "img-ratio-estimator", "train", "--dataset", "set",
            "--formats", "png", "jpg", "--optimizer", "sgd",
            "--no-plateau-growth", "--grow-every", "4", "--seed", "9",
        ])
        .unwrap();
        let Commands::Train(args) = cli.command else { panic!("expected train") };
        let cfg: TrainConfig = args.into();
        assert_eq!(cfg.formats, vec![ImageFormat::Png, ImageFormat::Jpeg]);
        assert_eq!(cfg.optimizer, OptimizerKind::Sgd);
        assert_eq!(cfg.plateau_patience, None);
        assert_eq!(cfg.grow_every, Some(4));
        assert_eq!(cfg.seed, Some(9));
    }

    #[test]
    fn test_unknown_format_is_rejected() {
        let res = Cli::try_parse_from([
            "img-ratio-estimator", "estimate", "--image", "a.png", "--format", "gif",
        ]);
        assert!(res.is_err());
    }
}
