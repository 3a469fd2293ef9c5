// ============================================================
// Layer 5 — Compression Ratio Estimator
// ============================================================
// Owns the estimator state:
//
//   net        RatioNet (weights, current hidden size)
//   optim      the optimizer picked at construction, with its state
//   step       optimizer steps taken so far
//   epoch      epochs completed so far
//
// and exposes the operations the trainer and the CLI need:
// predict, evaluate, train_step, grow, save_checkpoint and
// load_checkpoint.
//
// Loss is MSE in ratio space. The network's sigmoid output keeps
// predictions inside (0, 1), so no extra clamping is needed.
//
// Checkpoint policy: a checkpoint may only grow the estimator.
// Loading rebuilds the network at the saved hidden size when it is
// at least the current one; a smaller saved size, a different input
// width or a different model name is a CheckpointMismatch.

use burn::{
    backend::{Autodiff, NdArray},
    data::dataloader::batcher::Batcher,
    module::AutodiffModule,
    nn::loss::{MseLoss, Reduction},
    optim::GradientsParams,
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use thiserror::Error;

use crate::data::batcher::{encode_input, input_tensor, RatioBatch, RatioBatcher, INPUT_DIM};
use crate::domain::{
    format::ImageFormat,
    sample::{CompressionSample, ImageFeatures},
};
use crate::infra::checkpoint::{CheckpointError, CheckpointManifest, CheckpointStore};
use crate::ml::{
    model::{RatioNet, RatioNetConfig},
    optimizer::{self, NetOptimizer, OptimizerKind},
};

/// CPU training backend.
pub type TrainBackend = Autodiff<NdArray>;

/// Identity written into every checkpoint manifest.
pub const MODEL_NAME: &str = "ratio_estimator";

type NetRecord<B> = <RatioNet<B> as Module<B>>::Record;

#[derive(Debug, Error)]
pub enum EstimatorError {
    #[error("cannot train or evaluate on an empty batch")]
    EmptyBatch,

    #[error("loss is not finite ({0})")]
    NonFiniteLoss(f32),

    #[error("checkpoint does not fit this estimator: {0}")]
    CheckpointMismatch(String),

    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
}

// ─── Capability set ───────────────────────────────────────────────────────────
/// What the trainer drives. Implemented by RatioEstimator for any
/// autodiff backend.
pub trait CompressionEstimator {
    /// Estimated ratio for one query. Does not change any state.
    fn predict(&self, features: &ImageFeatures, format: ImageFormat, quality: u32, width: u32) -> f32;

    /// Mean squared error over `batch` without updating anything.
    fn evaluate(&self, batch: &[CompressionSample]) -> Result<f32, EstimatorError>;

    /// One optimizer step on `batch`; returns the batch loss.
    fn train_step(&mut self, batch: &[CompressionSample]) -> Result<f32, EstimatorError>;

    /// Hidden units added by one `grow()`.
    fn growth_step(&self) -> usize;

    /// Add `extra` hidden units; returns (old size, new size).
    fn grow_by(&mut self, extra: usize) -> (usize, usize);

    /// Add `growth_step()` hidden units; returns (old size, new size).
    fn grow(&mut self) -> (usize, usize) {
        self.grow_by(self.growth_step())
    }

    fn hidden_size(&self) -> usize;

    /// Mark one more epoch as completed.
    fn complete_epoch(&mut self);

    fn epoch(&self) -> usize;

    fn save_checkpoint(&self, store: &CheckpointStore) -> Result<(), EstimatorError>;

    /// `Ok(false)` when the store holds no checkpoint yet.
    fn load_checkpoint(&mut self, store: &CheckpointStore) -> Result<bool, EstimatorError>;
}

// ─── Configuration ────────────────────────────────────────────────────────────
#[derive(Config, Debug)]
pub struct EstimatorConfig {
    pub initial_hidden_size: usize,
    pub learning_rate:       f64,
    #[config(default = "OptimizerKind::Adam")]
    pub optimizer:           OptimizerKind,
    /// Hidden units added by each grow()
    #[config(default = 8)]
    pub growth_step:         usize,
    /// Seeds the backend's parameter initialisation
    #[config(default = 42)]
    pub seed:                u64,
}

// ─── RatioEstimator ───────────────────────────────────────────────────────────
pub struct RatioEstimator<B: AutodiffBackend> {
    config:  EstimatorConfig,
    net:     RatioNet<B>,
    optim:   Box<dyn NetOptimizer<B>>,
    batcher: RatioBatcher<B>,
    device:  B::Device,
    step:    u64,
    epoch:   usize,
}

impl<B: AutodiffBackend> RatioEstimator<B> {
    pub fn new(config: EstimatorConfig, device: B::Device) -> Self {
        B::seed(config.seed);
        let net = RatioNetConfig::new(INPUT_DIM, config.initial_hidden_size).init(&device);
        tracing::info!(
            "Estimator ready: {} inputs, {} hidden units, {} (lr={})",
            INPUT_DIM, config.initial_hidden_size, config.optimizer, config.learning_rate
        );
        Self {
            optim:   optimizer::build::<B>(config.optimizer),
            batcher: RatioBatcher::new(device.clone()),
            net,
            device,
            config,
            step:  0,
            epoch: 0,
        }
    }

    pub fn steps(&self) -> u64 {
        self.step
    }

    /// Estimates for many encoded queries at once.
    pub fn predict_rows(&self, rows: &[[f32; INPUT_DIM]]) -> Vec<f32> {
        if rows.is_empty() {
            return Vec::new();
        }
        // valid() → RatioNet<B::InnerBackend>, no autodiff graph
        let net = self.net.valid();
        net.forward(input_tensor::<B::InnerBackend>(rows, &self.device))
            .into_data()
            .iter::<f32>()
            .collect()
    }

    fn batch(&self, samples: &[CompressionSample]) -> Result<RatioBatch<B>, EstimatorError> {
        if samples.is_empty() {
            return Err(EstimatorError::EmptyBatch);
        }
        Ok(self.batcher.batch(samples.to_vec()))
    }

    fn check_manifest(&self, manifest: &CheckpointManifest) -> Result<(), EstimatorError> {
        if manifest.model != MODEL_NAME {
            return Err(EstimatorError::CheckpointMismatch(format!(
                "saved model is '{}', expected '{MODEL_NAME}'",
                manifest.model
            )));
        }
        if manifest.input_dim != INPUT_DIM {
            return Err(EstimatorError::CheckpointMismatch(format!(
                "saved input width {} != {INPUT_DIM}",
                manifest.input_dim
            )));
        }
        if manifest.hidden_size < self.hidden_size() {
            return Err(EstimatorError::CheckpointMismatch(format!(
                "saved hidden size {} is smaller than the current {} (hidden size never shrinks)",
                manifest.hidden_size,
                self.hidden_size()
            )));
        }
        Ok(())
    }
}

impl<B: AutodiffBackend> CompressionEstimator for RatioEstimator<B> {
    fn predict(&self, features: &ImageFeatures, format: ImageFormat, quality: u32, width: u32) -> f32 {
        let row = encode_input(features, format, quality, width);
        self.predict_rows(&[row]).first().copied().unwrap_or(f32::NAN)
    }

    fn evaluate(&self, batch: &[CompressionSample]) -> Result<f32, EstimatorError> {
        if batch.is_empty() {
            return Err(EstimatorError::EmptyBatch);
        }
        let rows: Vec<_> = batch
            .iter()
            .map(|s| encode_input(&s.features, s.format, s.quality, s.width))
            .collect();
        let preds = self.predict_rows(&rows);
        let mse = preds
            .iter()
            .zip(batch)
            .map(|(p, s)| (p - s.ratio).powi(2))
            .sum::<f32>()
            / batch.len() as f32;
        Ok(mse)
    }

    fn train_step(&mut self, batch: &[CompressionSample]) -> Result<f32, EstimatorError> {
        let RatioBatch { inputs, targets } = self.batch(batch)?;

        let preds = self.net.forward(inputs);
        let loss  = MseLoss::new().forward(preds, targets, Reduction::Mean);
        let value = loss.clone().into_scalar().elem::<f32>();
        if !value.is_finite() {
            return Err(EstimatorError::NonFiniteLoss(value));
        }

        // Backward pass + optimizer update
        let grads = GradientsParams::from_grads(loss.backward(), &self.net);
        self.net  = self.optim.step(self.config.learning_rate, self.net.clone(), grads);
        self.step += 1;
        Ok(value)
    }

    fn growth_step(&self) -> usize {
        self.config.growth_step
    }

    fn grow_by(&mut self, extra: usize) -> (usize, usize) {
        let from = self.hidden_size();
        if extra == 0 {
            return (from, from);
        }
        self.net   = self.net.clone().grow(extra);
        // Grown parameters have new ids; old optimizer state no longer applies
        self.optim = optimizer::build::<B>(self.config.optimizer);
        let to = self.hidden_size();
        tracing::info!("Estimator grown: {} → {} hidden units", from, to);
        (from, to)
    }

    fn hidden_size(&self) -> usize {
        self.net.hidden_size()
    }

    fn complete_epoch(&mut self) {
        self.epoch += 1;
    }

    fn epoch(&self) -> usize {
        self.epoch
    }

    fn save_checkpoint(&self, store: &CheckpointStore) -> Result<(), EstimatorError> {
        let revision = store.next_revision()?;
        let weights_file   = store.artifact_stem("weights", revision);
        let optimizer_file = store.artifact_stem("optim", revision);

        store.save_record::<B, _>(self.net.clone().into_record(), &weights_file)?;
        self.optim.save(store, &optimizer_file)?;

        store.commit(&CheckpointManifest {
            model:          MODEL_NAME.to_string(),
            revision,
            input_dim:      INPUT_DIM,
            hidden_size:    self.hidden_size(),
            optimizer:      self.config.optimizer,
            learning_rate:  self.config.learning_rate,
            step:           self.step,
            epoch:          self.epoch,
            weights_file,
            optimizer_file,
            saved_at:       chrono::Utc::now(),
        })?;
        tracing::debug!("Saved checkpoint revision {} (epoch {})", revision, self.epoch);
        Ok(())
    }

    fn load_checkpoint(&mut self, store: &CheckpointStore) -> Result<bool, EstimatorError> {
        let Some(manifest) = store.read_manifest()? else {
            tracing::info!("No checkpoint in '{}', starting fresh", store.dir().display());
            return Ok(false);
        };
        self.check_manifest(&manifest)?;

        let record: NetRecord<B> = store.load_record::<B, _>(&manifest.weights_file, &self.device)?;
        self.net = RatioNetConfig::new(manifest.input_dim, manifest.hidden_size)
            .init::<B>(&self.device)
            .load_record(record);

        let fresh = optimizer::build::<B>(self.config.optimizer);
        self.optim = if manifest.optimizer == self.config.optimizer {
            match fresh.load(store, &manifest.optimizer_file, &self.device) {
                Ok(optim) => optim,
                Err(e) => {
                    tracing::warn!("Optimizer state not restored, starting it fresh: {}", e);
                    optimizer::build::<B>(self.config.optimizer)
                }
            }
        } else {
            tracing::warn!(
                "Checkpoint used {}, this run uses {}; optimizer state starts fresh",
                manifest.optimizer, self.config.optimizer
            );
            fresh
        };
        if (manifest.learning_rate - self.config.learning_rate).abs() > f64::EPSILON {
            tracing::info!(
                "Learning rate changed since the checkpoint: {} → {}",
                manifest.learning_rate, self.config.learning_rate
            );
        }

        self.step  = manifest.step;
        self.epoch = manifest.epoch;
        tracing::info!(
            "Loaded checkpoint revision {} (epoch {}, {} hidden units)",
            manifest.revision, manifest.epoch, manifest.hidden_size
        );
        Ok(true)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::features::log_pixels;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn estimator(hidden: usize, lr: f64) -> RatioEstimator<TrainBackend> {
        RatioEstimator::new(EstimatorConfig::new(hidden, lr), Default::default())
    }

    fn random_sample(rng: &mut StdRng, ratio: f32) -> CompressionSample {
        let (w, h) = (rng.gen_range(64..512u32), rng.gen_range(64..512u32));
        let width = rng.gen_range(16..=w);
        let features = ImageFeatures {
            native_width:  w,
            native_height: h,
            mean_luma:     rng.gen(),
            luma_std:      rng.gen::<f32>() * 0.5,
            edge_density:  rng.gen::<f32>() * 0.3,
            high_freq:     rng.gen::<f32>() * 0.3,
            colorfulness:  rng.gen::<f32>() * 0.6,
            entropy:       rng.gen(),
            aspect:        h as f32 / w as f32,
            log_pixels:    log_pixels(w, h),
        };
        let height = features.height_at(width);
        CompressionSample {
            image_index: 0,
            features,
            format: ImageFormat::ALL[rng.gen_range(0..3)],
            quality: rng.gen_range(1..=100),
            width,
            height,
            compressed_bytes: 0,
            ratio,
        }
    }

    fn batch(rng: &mut StdRng, n: usize, ratio: f32) -> Vec<CompressionSample> {
        (0..n).map(|_| random_sample(rng, ratio)).collect()
    }

    #[test]
    fn test_converges_on_constant_label() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut est = estimator(10, 0.05);
        let mut last = f32::MAX;
        for _ in 0..500 {
            last = est.train_step(&batch(&mut rng, 16, 0.25)).unwrap();
        }
        assert!(last < 2e-3, "final loss {last}");
        for s in batch(&mut rng, 20, 0.25) {
            let p = est.predict(&s.features, s.format, s.quality, s.width);
            assert!((p - 0.25).abs() < 0.03, "prediction {p}");
        }
        assert_eq!(est.steps(), 500);
    }

    #[test]
    fn test_empty_batch_is_rejected() {
        let mut est = estimator(4, 0.01);
        assert!(matches!(est.train_step(&[]), Err(EstimatorError::EmptyBatch)));
        assert!(matches!(est.evaluate(&[]), Err(EstimatorError::EmptyBatch)));
    }

    #[test]
    fn test_predict_does_not_change_state() {
        let mut rng = StdRng::seed_from_u64(2);
        let est = estimator(6, 0.01);
        let s = random_sample(&mut rng, 0.1);
        let a = est.predict(&s.features, s.format, s.quality, s.width);
        let b = est.predict(&s.features, s.format, s.quality, s.width);
        assert_eq!(a, b);
        assert!(a > 0.0 && a < 1.0);
    }

    #[test]
    fn test_grow_keeps_predictions() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut est = estimator(10, 0.02);
        for _ in 0..20 {
            est.train_step(&batch(&mut rng, 8, 0.4)).unwrap();
        }
        let probe = batch(&mut rng, 12, 0.4);
        let rows: Vec<_> = probe
            .iter()
            .map(|s| encode_input(&s.features, s.format, s.quality, s.width))
            .collect();
        let before = est.predict_rows(&rows);

        assert_eq!(est.grow(), (10, 18));
        assert_eq!(est.hidden_size(), 18);
        let after = est.predict_rows(&rows);
        for (a, b) in before.iter().zip(&after) {
            assert!((a - b).abs() < 1e-6, "{a} vs {b}");
        }

        // Still trainable after growth
        let loss = est.train_step(&probe).unwrap();
        assert!(loss.is_finite());
    }

    #[test]
    fn test_checkpoint_round_trip_after_growth() {
        let tmp = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(tmp.path(), MODEL_NAME).unwrap();
        let mut rng = StdRng::seed_from_u64(4);

        let mut saved = estimator(10, 0.02);
        for _ in 0..10 {
            saved.train_step(&batch(&mut rng, 8, 0.3)).unwrap();
        }
        saved.grow();
        for _ in 0..5 {
            saved.train_step(&batch(&mut rng, 8, 0.3)).unwrap();
        }
        saved.complete_epoch();
        saved.save_checkpoint(&store).unwrap();

        let mut loaded = estimator(10, 0.02);
        assert!(loaded.load_checkpoint(&store).unwrap());
        assert_eq!(loaded.hidden_size(), 18);
        assert_eq!(loaded.epoch(), 1);
        assert_eq!(loaded.steps(), 15);

        let probe = batch(&mut rng, 16, 0.3);
        assert_eq!(saved.evaluate(&probe).unwrap(), loaded.evaluate(&probe).unwrap());

        // Optimizer state came along: the next step lands in the same place
        let next = batch(&mut rng, 8, 0.3);
        let (la, lb) = (saved.train_step(&next).unwrap(), loaded.train_step(&next).unwrap());
        assert!((la - lb).abs() < 1e-6);
        let (ea, eb) = (saved.evaluate(&probe).unwrap(), loaded.evaluate(&probe).unwrap());
        assert!((ea - eb).abs() < 1e-6, "{ea} vs {eb}");
    }

    #[test]
    fn test_smaller_checkpoint_is_a_mismatch() {
        let tmp = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(tmp.path(), MODEL_NAME).unwrap();
        estimator(10, 0.01).save_checkpoint(&store).unwrap();

        let mut bigger = estimator(64, 0.01);
        assert!(matches!(
            bigger.load_checkpoint(&store),
            Err(EstimatorError::CheckpointMismatch(_))
        ));
        assert_eq!(bigger.hidden_size(), 64);
    }

    #[test]
    fn test_other_optimizer_loads_weights_only() {
        let tmp = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(tmp.path(), MODEL_NAME).unwrap();
        let mut rng = StdRng::seed_from_u64(5);
        let mut adam = estimator(8, 0.01);
        adam.train_step(&batch(&mut rng, 8, 0.2)).unwrap();
        adam.save_checkpoint(&store).unwrap();

        let mut sgd = RatioEstimator::<TrainBackend>::new(
            EstimatorConfig::new(8, 0.01).with_optimizer(OptimizerKind::Sgd),
            Default::default(),
        );
        assert!(sgd.load_checkpoint(&store).unwrap());
        let probe = batch(&mut rng, 8, 0.2);
        assert_eq!(adam.evaluate(&probe).unwrap(), sgd.evaluate(&probe).unwrap());
        assert!(sgd.train_step(&probe).is_ok());
    }

    #[test]
    fn test_missing_checkpoint_is_not_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(tmp.path(), MODEL_NAME).unwrap();
        let mut est = estimator(10, 0.01);
        assert!(!est.load_checkpoint(&store).unwrap());
        assert_eq!(est.hidden_size(), 10);
    }
}
