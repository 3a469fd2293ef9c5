// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates a full training run in order:
//
//   Step 1: Open the checkpoint store        (Layer 6 - infra)
//   Step 2: Build the estimator              (Layer 5 - ml)
//   Step 3: Resume from the last checkpoint  (Layer 5 / 6)
//   Step 4: Load the image set               (Layer 4 - data)
//   Step 5: Build the sample generator       (Layer 4 - data)
//   Step 6: Save the run config              (Layer 6 - infra)
//   Step 7: Run the training loop            (Layer 5 - ml)
//   Step 8: Score the held-out probe set     (Layer 4 / 5)
//   Step 9: Render the training chart        (Layer 6 - infra)

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::data::{
    dataset::ProbeSet,
    generator::{SampleGenerator, SamplerConfig},
    loader::{resolve_dataset_path, ImageDataset},
};
use crate::domain::{format::ImageFormat, history::TrainingHistory};
use crate::infra::{
    chart::PerformanceReporter,
    checkpoint::CheckpointStore,
    metrics::MetricsLogger,
    progress::ConsoleObserver,
};
use crate::ml::{
    estimator::{CompressionEstimator, EstimatorConfig, RatioEstimator, TrainBackend, MODEL_NAME},
    optimizer::OptimizerKind,
    trainer::{GrowthPolicy, Trainer, TrainerConfig},
};

// ─── Training Configuration ──────────────────────────────────────────────────
// All parameters of a training run. Saved next to the checkpoint
// as train_config.json.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainConfig {
    /// Dataset name (looked up in datasets_dir) or path to a dataset JSON file
    pub dataset:             String,
    pub datasets_dir:        PathBuf,
    pub checkpoint_dir:      PathBuf,
    pub plots_dir:           PathBuf,

    pub initial_hidden_size: usize,
    pub learning_rate:       f64,
    pub optimizer:           OptimizerKind,
    pub epochs:              usize,
    pub samples_per_epoch:   usize,
    pub batch_size:          usize,

    pub min_quality:         u32,
    pub max_quality:         u32,
    pub min_width:           u32,
    pub max_width:           u32,
    pub formats:             Vec<ImageFormat>,

    pub save_interval:       usize,
    pub no_load:             bool,
    pub save_samples:        Option<PathBuf>,
    pub seed:                Option<u64>,

    pub growth_step:         usize,
    pub grow_every:          Option<usize>,
    pub plateau_patience:    Option<usize>,
    pub min_improvement:     f64,
    pub max_hidden_size:     usize,
    pub max_failed_batches:  usize,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            dataset:             "dataset".to_string(),
            datasets_dir:        PathBuf::from("image_datasets"),
            checkpoint_dir:      PathBuf::from("checkpoints"),
            plots_dir:           PathBuf::from(".plots"),
            initial_hidden_size: 10,
            learning_rate:       0.01,
            optimizer:           OptimizerKind::Adam,
            epochs:              50,
            samples_per_epoch:   1000,
            batch_size:          32,
            min_quality:         2,
            max_quality:         100,
            min_width:           64,
            max_width:           2048,
            formats:             vec![ImageFormat::Webp, ImageFormat::Jpeg],
            save_interval:       5,
            no_load:             false,
            save_samples:        None,
            seed:                None,
            growth_step:         8,
            grow_every:          None,
            plateau_patience:    Some(5),
            min_improvement:     0.01,
            max_hidden_size:     256,
            max_failed_batches:  10,
        }
    }
}

impl TrainConfig {
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.epochs > 0, "epochs must be at least 1");
        anyhow::ensure!(self.batch_size > 0, "batch size must be at least 1");
        anyhow::ensure!(self.samples_per_epoch > 0, "samples per epoch must be at least 1");
        anyhow::ensure!(self.initial_hidden_size > 0, "initial hidden size must be at least 1");
        anyhow::ensure!(
            self.learning_rate.is_finite() && self.learning_rate > 0.0,
            "learning rate must be a positive number, got {}",
            self.learning_rate
        );
        self.sampler_config().validate()?;
        Ok(())
    }

    pub fn sampler_config(&self) -> SamplerConfig {
        SamplerConfig {
            formats:       self.formats.clone(),
            quality_range: (self.min_quality, self.max_quality),
            width_range:   (self.min_width, self.max_width),
        }
    }

    pub fn trainer_config(&self) -> TrainerConfig {
        TrainerConfig {
            epochs:              self.epochs,
            batch_size:          self.batch_size,
            samples_per_epoch:   self.samples_per_epoch,
            checkpoint_interval: self.save_interval,
            max_failed_batches:  self.max_failed_batches,
            growth: GrowthPolicy {
                every_epochs:     self.grow_every,
                plateau_patience: self.plateau_patience,
                min_improvement:  self.min_improvement,
                max_hidden_size:  self.max_hidden_size,
            },
        }
    }

    pub fn estimator_config(&self) -> EstimatorConfig {
        let config = EstimatorConfig::new(self.initial_hidden_size, self.learning_rate)
            .with_optimizer(self.optimizer)
            .with_growth_step(self.growth_step);
        match self.seed {
            Some(seed) => config.with_seed(seed),
            None       => config.with_seed(rand::random()),
        }
    }
}

/// What a finished run produced.
#[derive(Debug)]
pub struct TrainOutcome {
    pub history:     TrainingHistory,
    pub hidden_size: usize,
    /// MSE on freshly drawn samples the run never trained on
    pub probe_loss:  Option<f32>,
    pub chart:       PathBuf,
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<TrainOutcome> {
        let cfg = &self.config;
        cfg.validate().context("invalid training configuration")?;

        // ── Step 1: Checkpoint store ──────────────────────────────────────────
        let store = CheckpointStore::new(&cfg.checkpoint_dir, MODEL_NAME)
            .context("cannot open the checkpoint directory")?;

        // ── Step 2–3: Estimator, resumed unless --no-load ─────────────────────
        let mut estimator =
            RatioEstimator::<TrainBackend>::new(cfg.estimator_config(), Default::default());
        if !cfg.no_load {
            estimator
                .load_checkpoint(&store)
                .context("cannot resume from the checkpoint (use --no-load to start fresh)")?;
        }

        // ── Step 4: Image set ─────────────────────────────────────────────────
        let dataset_path = resolve_dataset_path(&cfg.dataset, &cfg.datasets_dir);
        let dataset = ImageDataset::open(&dataset_path).context("cannot load the dataset")?;

        // ── Step 5: Sample generator ──────────────────────────────────────────
        let mut generator = match cfg.seed {
            Some(seed) => SampleGenerator::seeded(dataset, cfg.sampler_config(), seed),
            None       => SampleGenerator::new(dataset, cfg.sampler_config()),
        }
        .context("cannot set up the sample generator")?;
        // Held-out probe; drawn before export is attached so it never lands in --save-samples
        let probe = ProbeSet::draw(&mut generator, cfg.batch_size);
        let mut generator = match &cfg.save_samples {
            Some(dir) => generator
                .with_export_dir(dir)
                .with_context(|| format!("cannot create sample directory '{}'", dir.display()))?,
            None => generator,
        };

        // ── Step 6: Run config snapshot ───────────────────────────────────────
        store.save_config(cfg).context("cannot save the run configuration")?;

        // ── Step 7: Training loop ─────────────────────────────────────────────
        let metrics = MetricsLogger::new(store.metrics_path())?;
        let mut observer = ConsoleObserver::new().with_metrics(metrics);
        tracing::info!(
            "Training with {} samples/epoch, batch size {}",
            cfg.samples_per_epoch, cfg.batch_size
        );
        let history = Trainer::new(cfg.trainer_config())
            .with_store(store)
            .train(&mut estimator, &mut generator, &mut observer)
            .context("training failed")?;

        // ── Step 8: Held-out probe ────────────────────────────────────────────
        let probe_loss = estimator.evaluate(probe.samples()).ok();
        if let Some(loss) = probe_loss {
            tracing::info!("Held-out MSE on {} fresh samples: {:.6}", probe.samples().len(), loss);
        }

        // ── Step 9: Chart ─────────────────────────────────────────────────────
        let chart = chart_path(&cfg.plots_dir);
        PerformanceReporter::default()
            .render_to_file(&history, &chart)
            .context("cannot render the training chart")?;

        Ok(TrainOutcome {
            history,
            hidden_size: estimator.hidden_size(),
            probe_loss,
            chart,
        })
    }
}

fn chart_path(plots_dir: &Path) -> PathBuf {
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    plots_dir.join(format!("{MODEL_NAME}_training_{stamp}.svg"))
}
