// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Online training: every epoch draws fresh samples from the
// generator, so there is no fixed train/validation split.
//
// Per epoch:
//   1. ceil(samples_per_epoch / batch_size) batches from the generator
//   2. train_step per batch; a batch with no usable sample or a
//      non-finite loss is skipped and counted as failed
//   3. more than max_failed_batches failures (or no successful
//      batch at all) aborts the run with TrainError::EpochFailed
//   4. append EpochMetrics to the history
//   5. grow the estimator on schedule or on a loss plateau
//   6. checkpoint every checkpoint_interval epochs
//
// A final checkpoint is written when the run ends.

use std::time::Instant;

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::data::generator::SampleGenerator;
use crate::domain::{
    history::{EpochMetrics, TrainingHistory},
    traits::{ImageCorpus, TrainingObserver},
};
use crate::infra::checkpoint::CheckpointStore;
use crate::ml::estimator::{CompressionEstimator, EstimatorError};

#[derive(Debug, Error)]
pub enum TrainError {
    #[error("epoch {epoch} failed: {failed} failed batches (limit {limit})")]
    EpochFailed { epoch: usize, failed: usize, limit: usize },

    #[error(transparent)]
    Estimator(#[from] EstimatorError),
}

// ─── Configuration ────────────────────────────────────────────────────────────
/// When the trainer calls `grow()`. Both triggers may be active.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrowthPolicy {
    /// Grow after every N epochs
    pub every_epochs:     Option<usize>,
    /// Grow after N epochs without relative improvement
    pub plateau_patience: Option<usize>,
    /// Relative loss decrease that counts as improvement
    pub min_improvement:  f64,
    /// Never grow beyond this many hidden units
    pub max_hidden_size:  usize,
}

impl GrowthPolicy {
    pub fn disabled() -> Self {
        Self {
            every_epochs:     None,
            plateau_patience: None,
            min_improvement:  0.0,
            max_hidden_size:  0,
        }
    }
}

impl Default for GrowthPolicy {
    fn default() -> Self {
        Self {
            every_epochs:     None,
            plateau_patience: Some(5),
            min_improvement:  0.01,
            max_hidden_size:  256,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainerConfig {
    pub epochs:              usize,
    pub batch_size:          usize,
    pub samples_per_epoch:   usize,
    /// 0 disables periodic checkpoints (the final one is still written)
    pub checkpoint_interval: usize,
    pub max_failed_batches:  usize,
    pub growth:              GrowthPolicy,
}

impl TrainerConfig {
    pub fn batches_per_epoch(&self) -> usize {
        self.samples_per_epoch.div_ceil(self.batch_size.max(1))
    }
}

// ─── Trainer ──────────────────────────────────────────────────────────────────
pub struct Trainer {
    config: TrainerConfig,
    store:  Option<CheckpointStore>,
}

impl Trainer {
    pub fn new(config: TrainerConfig) -> Self {
        Self { config, store: None }
    }

    /// Checkpoint into `store` during and after training.
    pub fn with_store(mut self, store: CheckpointStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn train<E, C, R>(
        &self,
        estimator: &mut E,
        generator: &mut SampleGenerator<C, R>,
        observer:  &mut dyn TrainingObserver,
    ) -> Result<TrainingHistory, TrainError>
    where
        E: CompressionEstimator,
        C: ImageCorpus,
        R: Rng,
    {
        let cfg = &self.config;
        let batches = cfg.batches_per_epoch();
        let first_epoch = estimator.epoch() + 1;
        let last_epoch  = estimator.epoch() + cfg.epochs;
        let mut history = TrainingHistory::new();
        let mut last_growth = 0;
        let mut saved_at = None;

        tracing::info!(
            "Training epochs {}..={} ({} batches of {} per epoch)",
            first_epoch, last_epoch, batches, cfg.batch_size
        );

        for epoch in first_epoch..=last_epoch {
            let started = Instant::now();
            observer.on_epoch_start(epoch, last_epoch, batches);

            let hidden_size = estimator.hidden_size();
            let mut loss_sum = 0.0f64;
            let mut samples  = 0usize;
            let mut failed   = 0usize;

            for b in 0..batches {
                let wanted = cfg.batch_size.min(cfg.samples_per_epoch - b * cfg.batch_size);
                let drawn  = generator.next_batch(wanted);
                for failure in &drawn.failures {
                    tracing::warn!("Epoch {} batch {}: sample slot dropped: {}", epoch, b + 1, failure);
                }

                let outcome = if drawn.samples.is_empty() {
                    Err(format!("all {wanted} sample slots failed"))
                } else {
                    match estimator.train_step(&drawn.samples) {
                        Ok(loss) => Ok(loss),
                        Err(e @ (EstimatorError::NonFiniteLoss(_) | EstimatorError::EmptyBatch)) => {
                            Err(e.to_string())
                        }
                        Err(e) => return Err(e.into()),
                    }
                };

                match outcome {
                    Ok(loss) => {
                        loss_sum += f64::from(loss) * drawn.samples.len() as f64;
                        samples  += drawn.samples.len();
                        observer.on_batch(epoch, b + 1, loss);
                    }
                    Err(reason) => {
                        failed += 1;
                        tracing::warn!("Epoch {} batch {} skipped: {}", epoch, b + 1, reason);
                        observer.on_batch_skipped(epoch, b + 1, &reason);
                        if failed > cfg.max_failed_batches {
                            return Err(TrainError::EpochFailed { epoch, failed, limit: cfg.max_failed_batches });
                        }
                    }
                }
            }

            if samples == 0 {
                return Err(TrainError::EpochFailed { epoch, failed, limit: cfg.max_failed_batches });
            }

            estimator.complete_epoch();
            let metrics = EpochMetrics {
                epoch,
                loss: loss_sum / samples as f64,
                hidden_size,
                samples,
                failed_batches: failed,
                elapsed_ms: started.elapsed().as_millis() as u64,
            };
            observer.on_epoch_end(&metrics);
            history.push(metrics);

            // ── Growth ────────────────────────────────────────────────────────
            if epoch < last_epoch && self.should_grow(&history, epoch - first_epoch + 1, last_growth, hidden_size) {
                let extra = estimator.growth_step().min(cfg.growth.max_hidden_size - hidden_size);
                let (from, to) = estimator.grow_by(extra);
                last_growth = epoch;
                if to > from {
                    observer.on_growth(epoch, from, to);
                }
            }

            // ── Checkpoint ────────────────────────────────────────────────────
            if let Some(store) = &self.store {
                if cfg.checkpoint_interval > 0 && epoch % cfg.checkpoint_interval == 0 {
                    estimator.save_checkpoint(store)?;
                    saved_at = Some(epoch);
                    observer.on_checkpoint(epoch);
                }
            }
        }

        if let Some(store) = &self.store {
            if saved_at != Some(last_epoch) {
                estimator.save_checkpoint(store)?;
                observer.on_checkpoint(last_epoch);
            }
        }

        tracing::info!("Training complete: {} epochs", history.len());
        Ok(history)
    }

    /// `run_epoch` counts epochs of this run from 1.
    fn should_grow(&self, history: &TrainingHistory, run_epoch: usize, last_growth: usize, hidden_size: usize) -> bool {
        let policy = &self.config.growth;
        if hidden_size >= policy.max_hidden_size {
            return false;
        }
        let scheduled = policy.every_epochs.is_some_and(|n| n > 0 && run_epoch % n == 0);
        let plateaued = policy.plateau_patience.is_some_and(|patience| {
            patience > 0 && history.epochs_without_improvement(last_growth, policy.min_improvement) >= patience
        });
        scheduled || plateaued
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{
        dataset::ProbeSet,
        generator::SamplerConfig,
        test_support::{checker_corpus, BrokenCorpus},
    };
    use crate::domain::{format::ImageFormat, traits::SilentObserver};
    use crate::ml::estimator::{EstimatorConfig, RatioEstimator, TrainBackend, MODEL_NAME};

    fn trainer_config(epochs: usize) -> TrainerConfig {
        TrainerConfig {
            epochs,
            batch_size:          5,
            samples_per_epoch:   10,
            checkpoint_interval: 1,
            max_failed_batches:  0,
            growth:              GrowthPolicy::disabled(),
        }
    }

    fn sampler() -> SamplerConfig {
        SamplerConfig {
            formats:       vec![ImageFormat::Jpeg],
            quality_range: (50, 50),
            width_range:   (100, 100),
        }
    }

    fn estimator() -> RatioEstimator<TrainBackend> {
        RatioEstimator::new(EstimatorConfig::new(10, 0.01), Default::default())
    }

    #[test]
    fn test_five_images_three_epochs() {
        let tmp = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(tmp.path(), MODEL_NAME).unwrap();
        let mut gen = SampleGenerator::seeded(checker_corpus(5, 128, 96), sampler(), 1).unwrap();
        let mut est = estimator();

        let history = Trainer::new(trainer_config(3))
            .with_store(store.clone())
            .train(&mut est, &mut gen, &mut SilentObserver)
            .unwrap();

        assert_eq!(history.len(), 3);
        for (i, m) in history.epochs().iter().enumerate() {
            assert_eq!(m.epoch, i + 1);
            assert!(m.loss.is_finite() && m.loss >= 0.0);
            assert_eq!(m.samples, 10);
            assert_eq!(m.failed_batches, 0);
        }
        let manifest = store.read_manifest().unwrap().unwrap();
        assert_eq!(manifest.epoch, 3);
        assert!(tmp.path().join(format!("{}.mpk.gz", manifest.weights_file)).exists());

        // A reloaded estimator scores a fixed batch identically
        let probe = ProbeSet::draw(&mut gen, 8);
        let mut reloaded = estimator();
        assert!(reloaded.load_checkpoint(&store).unwrap());
        assert_eq!(
            est.evaluate(probe.samples()).unwrap(),
            reloaded.evaluate(probe.samples()).unwrap()
        );
    }

    #[test]
    fn test_resumed_run_continues_epoch_numbers() {
        let mut gen = SampleGenerator::seeded(checker_corpus(2, 120, 120), sampler(), 2).unwrap();
        let mut est = estimator();
        let trainer = Trainer::new(trainer_config(2));
        trainer.train(&mut est, &mut gen, &mut SilentObserver).unwrap();
        let second = trainer.train(&mut est, &mut gen, &mut SilentObserver).unwrap();
        let epochs: Vec<_> = second.epochs().iter().map(|m| m.epoch).collect();
        assert_eq!(epochs, vec![3, 4]);
    }

    #[test]
    fn test_unusable_corpus_fails_the_epoch() {
        let mut gen = SampleGenerator::seeded(BrokenCorpus(3), sampler(), 0).unwrap();
        let mut est = estimator();
        let mut cfg = trainer_config(2);
        cfg.max_failed_batches = 1;
        let err = Trainer::new(cfg).train(&mut est, &mut gen, &mut SilentObserver).unwrap_err();
        assert!(matches!(err, TrainError::EpochFailed { epoch: 1, failed: 2, limit: 1 }));
    }

    #[test]
    fn test_scheduled_growth_is_monotonic() {
        let mut gen = SampleGenerator::seeded(checker_corpus(2, 120, 120), sampler(), 3).unwrap();
        let mut est = estimator();
        let mut cfg = trainer_config(5);
        cfg.growth = GrowthPolicy {
            every_epochs:     Some(2),
            plateau_patience: None,
            min_improvement:  0.0,
            max_hidden_size:  100,
        };

        let history = Trainer::new(cfg).train(&mut est, &mut gen, &mut SilentObserver).unwrap();
        let sizes: Vec<_> = history.epochs().iter().map(|m| m.hidden_size).collect();
        assert_eq!(sizes, vec![10, 10, 18, 18, 26]);
        assert_eq!(history.growth_epochs(), vec![3, 5]);
        assert!(sizes.windows(2).all(|w| w[1] >= w[0]));
    }

    #[test]
    fn test_growth_stops_at_max_hidden_size() {
        let mut gen = SampleGenerator::seeded(checker_corpus(2, 120, 120), sampler(), 4).unwrap();
        let mut est = estimator();
        let mut cfg = trainer_config(4);
        cfg.growth = GrowthPolicy {
            every_epochs:     Some(1),
            plateau_patience: None,
            min_improvement:  0.0,
            max_hidden_size:  18,
        };
        Trainer::new(cfg).train(&mut est, &mut gen, &mut SilentObserver).unwrap();
        assert_eq!(est.hidden_size(), 18);
    }

    #[test]
    fn test_last_growth_is_capped_at_max_hidden_size() {
        let mut gen = SampleGenerator::seeded(checker_corpus(2, 120, 120), sampler(), 5).unwrap();
        let mut est = estimator();
        let mut cfg = trainer_config(3);
        cfg.growth = GrowthPolicy {
            every_epochs:     Some(1),
            plateau_patience: None,
            min_improvement:  0.0,
            max_hidden_size:  14,
        };

        let history = Trainer::new(cfg).train(&mut est, &mut gen, &mut SilentObserver).unwrap();
        let sizes: Vec<_> = history.epochs().iter().map(|m| m.hidden_size).collect();
        assert_eq!(sizes, vec![10, 14, 14]);
        assert_eq!(est.hidden_size(), 14);
    }

    #[test]
    fn test_batch_count_rounds_up() {
        let mut cfg = trainer_config(1);
        cfg.samples_per_epoch = 11;
        assert_eq!(cfg.batches_per_epoch(), 3);
    }
}
