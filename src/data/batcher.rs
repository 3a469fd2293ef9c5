// ============================================================
// Layer 4 — Ratio Batcher
// ============================================================
// Implements Burn's Batcher trait to turn a Vec<CompressionSample>
// into model-ready tensors.
//
// Input row layout (INPUT_DIM columns):
//
//   [ 0 .. 8 )   image content statistics (ImageFeatures::stats)
//   [ 8 .. 11)   one-hot format (jpeg, png, webp)
//   11           quality / 100
//   12           target width / native width
//   13           ln(target pixel count) relative to 4096×4096
//
// Output:
//   inputs  [batch_size, INPUT_DIM]
//   targets [batch_size, 1]           compression ratio labels

use burn::{data::dataloader::batcher::Batcher, prelude::*};

use crate::data::features::log_pixels;
use crate::domain::{
    format::ImageFormat,
    sample::{CompressionSample, ImageFeatures, FEATURE_DIM},
};

/// Width of one encoded input row.
pub const INPUT_DIM: usize = FEATURE_DIM + ImageFormat::COUNT + 3;

/// Encode one (image, format, quality, width) query as a model input row.
pub fn encode_input(
    features: &ImageFeatures,
    format:   ImageFormat,
    quality:  u32,
    width:    u32,
) -> [f32; INPUT_DIM] {
    let mut row = [0.0f32; INPUT_DIM];
    row[..FEATURE_DIM].copy_from_slice(&features.stats());
    row[FEATURE_DIM + format.index()] = 1.0;

    let tail = FEATURE_DIM + ImageFormat::COUNT;
    row[tail]     = quality.min(100) as f32 / 100.0;
    row[tail + 1] = width as f32 / features.native_width.max(1) as f32;
    row[tail + 2] = log_pixels(width, features.height_at(width));
    row
}

/// Stack encoded rows into a `[rows, INPUT_DIM]` tensor.
pub fn input_tensor<B: Backend>(rows: &[[f32; INPUT_DIM]], device: &B::Device) -> Tensor<B, 2> {
    let flat: Vec<f32> = rows.iter().flatten().copied().collect();
    Tensor::<B, 2>::from_data(TensorData::new(flat, [rows.len(), INPUT_DIM]), device)
}

// ─── RatioBatch ───────────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct RatioBatch<B: Backend> {
    /// Encoded queries — shape: [batch_size, INPUT_DIM]
    pub inputs: Tensor<B, 2>,

    /// Ratio labels — shape: [batch_size, 1]
    pub targets: Tensor<B, 2>,
}

// ─── RatioBatcher ─────────────────────────────────────────────────────────────
#[derive(Clone, Debug)]
pub struct RatioBatcher<B: Backend> {
    /// Device the tensors are created on
    pub device: B::Device,
}

impl<B: Backend> RatioBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }
}

impl<B: Backend> Batcher<CompressionSample, RatioBatch<B>> for RatioBatcher<B> {
    fn batch(&self, items: Vec<CompressionSample>) -> RatioBatch<B> {
        let rows: Vec<[f32; INPUT_DIM]> = items
            .iter()
            .map(|s| encode_input(&s.features, s.format, s.quality, s.width))
            .collect();
        let labels: Vec<f32> = items.iter().map(|s| s.ratio).collect();

        let inputs  = input_tensor::<B>(&rows, &self.device);
        let targets = Tensor::<B, 2>::from_data(
            TensorData::new(labels, [items.len(), 1]),
            &self.device,
        );

        RatioBatch { inputs, targets }
    }
}
