// ============================================================
// Layer 2 — Estimate Use Case
// ============================================================
// Loads the latest checkpoint and predicts how well one image
// compresses for a given format, quality and width:
//
//   1. Read the checkpoint manifest and rebuild the estimator at
//      the saved shape and optimizer
//   2. Decode the image and extract its content features
//   3. Predict the ratio, convert it to an expected byte count
//   4. Optionally encode for real and report the error

use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::application::train_use_case::TrainConfig;
use crate::data::{codec, features};
use crate::domain::{
    format::ImageFormat,
    sample::{compression_ratio, raster_bytes, scaled_height},
};
use crate::infra::checkpoint::CheckpointStore;
use crate::ml::estimator::{
    CompressionEstimator, EstimatorConfig, RatioEstimator, TrainBackend, MODEL_NAME,
};

#[derive(Debug, Clone)]
pub struct EstimateRequest {
    pub image:   PathBuf,
    pub format:  ImageFormat,
    pub quality: u32,
    /// Target width; the image's own width when absent
    pub width:   Option<u32>,
    /// Also run the real encoder and compare
    pub verify:  bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Measured {
    pub bytes: usize,
    pub ratio: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Estimate {
    pub format:          ImageFormat,
    pub quality:         u32,
    pub width:           u32,
    pub height:          u32,
    pub raw_bytes:       u64,
    pub predicted_ratio: f32,
    pub predicted_bytes: u64,
    pub measured:        Option<Measured>,
}

impl Estimate {
    /// Relative size error of the prediction, when a real encode was run.
    pub fn relative_error(&self) -> Option<f64> {
        self.measured
            .as_ref()
            .filter(|m| m.bytes > 0)
            .map(|m| (self.predicted_bytes as f64 - m.bytes as f64) / m.bytes as f64)
    }
}

pub struct EstimateUseCase {
    estimator: RatioEstimator<TrainBackend>,
    trained:   Option<TrainConfig>,
}

impl EstimateUseCase {
    pub fn new(checkpoint_dir: impl Into<PathBuf>) -> Result<Self> {
        let checkpoint_dir = checkpoint_dir.into();
        let store = CheckpointStore::new(&checkpoint_dir, MODEL_NAME)?;
        let manifest = store.read_manifest()?.with_context(|| {
            format!(
                "no checkpoint in '{}'. Have you run 'train' first?",
                checkpoint_dir.display()
            )
        })?;

        let config = EstimatorConfig::new(manifest.hidden_size, manifest.learning_rate)
            .with_optimizer(manifest.optimizer);
        let mut estimator = RatioEstimator::<TrainBackend>::new(config, Default::default());
        estimator.load_checkpoint(&store).context("cannot load the checkpoint")?;

        let trained = store.load_config::<TrainConfig>().unwrap_or_else(|e| {
            tracing::warn!("Ignoring unreadable run config: {e}");
            None
        });
        Ok(Self { estimator, trained })
    }

    pub fn estimate(&self, request: &EstimateRequest) -> Result<Estimate> {
        let image = image::open(&request.image)
            .with_context(|| format!("cannot read image '{}'", request.image.display()))?
            .to_rgb8();
        let (native_w, native_h) = image.dimensions();
        let width = request.width.unwrap_or(native_w);
        anyhow::ensure!(width > 0, "target width must be at least 1");
        self.warn_if_untrained(request.format, request.quality, width);

        let feats  = features::extract(&image);
        let height = scaled_height(native_w, native_h, width);
        let raw    = raster_bytes(width, height);
        let ratio  = self.estimator.predict(&feats, request.format, request.quality, width);

        let measured = if request.verify {
            let encoded = codec::compress(&image, request.format, f64::from(request.quality), f64::from(width))
                .context("reference encode failed")?;
            Some(Measured {
                bytes: encoded.bytes.len(),
                ratio: compression_ratio(encoded.bytes.len(), encoded.width, encoded.height),
            })
        } else {
            None
        };

        Ok(Estimate {
            format:          request.format,
            quality:         request.quality,
            width,
            height,
            raw_bytes:       raw,
            predicted_ratio: ratio,
            predicted_bytes: (f64::from(ratio) * raw as f64).round() as u64,
            measured,
        })
    }

    fn warn_if_untrained(&self, format: ImageFormat, quality: u32, width: u32) {
        let Some(cfg) = &self.trained else { return };
        if !cfg.formats.contains(&format) {
            tracing::warn!("The estimator was not trained on {format}; expect a poor estimate");
        }
        if quality < cfg.min_quality || quality > cfg.max_quality {
            tracing::warn!(
                "Quality {} is outside the trained range {}..={}",
                quality, cfg.min_quality, cfg.max_quality
            );
        }
        if width < cfg.min_width || width > cfg.max_width {
            tracing::warn!(
                "Width {} is outside the trained range {}..={}",
                width, cfg.min_width, cfg.max_width
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn test_missing_checkpoint_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let err = EstimateUseCase::new(tmp.path()).err().unwrap();
        assert!(err.to_string().contains("Have you run 'train' first?"));
    }

    #[test]
    fn test_estimate_with_verification() {
        let tmp = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(tmp.path(), MODEL_NAME).unwrap();
        RatioEstimator::<TrainBackend>::new(EstimatorConfig::new(6, 0.01), Default::default())
            .save_checkpoint(&store)
            .unwrap();

        let img_path = tmp.path().join("probe.png");
        RgbImage::from_fn(80, 40, |x, y| Rgb([(x * 3) as u8, (y * 5) as u8, 90]))
            .save(&img_path)
            .unwrap();

        let use_case = EstimateUseCase::new(tmp.path()).unwrap();
        let estimate = use_case
            .estimate(&EstimateRequest {
                image:   img_path,
                format:  ImageFormat::Jpeg,
                quality: 70,
                width:   Some(40),
                verify:  true,
            })
            .unwrap();

        assert_eq!((estimate.width, estimate.height), (40, 20));
        assert_eq!(estimate.raw_bytes, 40 * 20 * 3);
        assert!(estimate.predicted_ratio > 0.0 && estimate.predicted_ratio < 1.0);
        let measured = estimate.measured.as_ref().unwrap();
        assert!(measured.bytes > 0);
        assert!(estimate.relative_error().unwrap().is_finite());
    }
}
