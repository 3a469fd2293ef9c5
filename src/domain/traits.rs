// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The seams between the training pipeline and its collaborators:
//
//   ImageCorpus      — where source pixels come from
//                      (ImageDataset on disk, in-memory in tests)
//   ImageGenerator   — the rendering tool that produces new source
//                      images for a dataset build
//   TrainingObserver — progress reporting out of the trainer
//                      (console bars in the CLI, silent in tests)

use anyhow::Result;
use image::{ImageError, RgbImage};

use crate::domain::history::EpochMetrics;

// ─── ImageCorpus ──────────────────────────────────────────────────────────────
/// A read-only, indexable collection of source images.
pub trait ImageCorpus {
    /// Number of images available.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Decode image `index` as 8-bit RGB.
    fn load_pixels(&self, index: usize) -> std::result::Result<RgbImage, ImageError>;

    /// Short human-readable identifier for logs.
    fn describe(&self, index: usize) -> String {
        format!("image #{index}")
    }
}

// ─── ImageGenerator ───────────────────────────────────────────────────────────
/// Rendering parameters passed through to the generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationParams {
    pub width:  u32,
    pub height: u32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self { width: 512, height: 512 }
    }
}

/// Anything that can turn a prompt and a seed into an image.
///
/// Remote renderers hide their queueing and polling behind this call;
/// it returns only once the image is available.
pub trait ImageGenerator {
    fn generate(&mut self, prompt: &str, seed: u64, params: &GenerationParams) -> Result<RgbImage>;
}

// ─── TrainingObserver ─────────────────────────────────────────────────────────
/// Receives progress events from the trainer. Every hook has a no-op
/// default so implementations only override what they display.
pub trait TrainingObserver {
    fn on_epoch_start(&mut self, _epoch: usize, _total_epochs: usize, _batches: usize) {}

    fn on_batch(&mut self, _epoch: usize, _batch: usize, _loss: f32) {}

    fn on_batch_skipped(&mut self, _epoch: usize, _batch: usize, _reason: &str) {}

    fn on_epoch_end(&mut self, _metrics: &EpochMetrics) {}

    fn on_growth(&mut self, _epoch: usize, _from: usize, _to: usize) {}

    fn on_checkpoint(&mut self, _epoch: usize) {}
}

/// Observer that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentObserver;

impl TrainingObserver for SilentObserver {}
