// ============================================================
// Layer 3 — Compression Sample Domain Types
// ============================================================
// A sample pairs what the estimator can see about an image
// (its content statistics plus the requested encoding) with what
// actually happened when the image was encoded.
//
// Label definition, used for both training and inference:
//
//   ratio = compressed_bytes / (encoded_width * encoded_height * 3)
//
// i.e. encoded size relative to the 8-bit RGB raster that was fed
// to the codec. Multiplying a predicted ratio by that raster size
// gives a predicted byte count.

use serde::{Deserialize, Serialize};

use crate::domain::format::ImageFormat;

/// Channels of the raster handed to every codec (8-bit RGB).
pub const RASTER_CHANNELS: u64 = 3;

/// Number of content statistics in [`ImageFeatures::stats`].
pub const FEATURE_DIM: usize = 8;

/// Content statistics of a source image, computed once per image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImageFeatures {
    pub native_width:  u32,
    pub native_height: u32,
    /// Mean luminance, 0..1
    pub mean_luma: f32,
    /// Luminance standard deviation, 0..0.5
    pub luma_std: f32,
    /// Mean absolute horizontal + vertical luminance gradient
    pub edge_density: f32,
    /// Mean absolute 4-neighbour Laplacian response
    pub high_freq: f32,
    /// Hasler–Süsstrunk colourfulness, scaled to roughly 0..1
    pub colorfulness: f32,
    /// Luminance histogram entropy divided by 8 bits
    pub entropy: f32,
    /// native_height / native_width
    pub aspect: f32,
    /// ln(pixel count) relative to a 4096×4096 image
    pub log_pixels: f32,
}

impl ImageFeatures {
    /// The content statistics in model input order.
    pub fn stats(&self) -> [f32; FEATURE_DIM] {
        [
            self.mean_luma,
            self.luma_std,
            self.edge_density,
            self.high_freq,
            self.colorfulness,
            self.entropy,
            self.aspect,
            self.log_pixels,
        ]
    }

    /// Height of this image once resized to `width`, aspect preserved.
    pub fn height_at(&self, width: u32) -> u32 {
        scaled_height(self.native_width, self.native_height, width)
    }
}

/// `floor(height * target_width / width)`, never below one row.
pub fn scaled_height(width: u32, height: u32, target_width: u32) -> u32 {
    if width == 0 {
        return 1;
    }
    let h = u64::from(height) * u64::from(target_width) / u64::from(width);
    h.clamp(1, u64::from(u32::MAX)) as u32
}

/// Size of the uncompressed raster a codec receives.
pub fn raster_bytes(width: u32, height: u32) -> u64 {
    u64::from(width) * u64::from(height) * RASTER_CHANNELS
}

/// The compression ratio label for an encoding of `width`×`height`.
pub fn compression_ratio(compressed_bytes: usize, width: u32, height: u32) -> f32 {
    let raw = raster_bytes(width, height).max(1);
    (compressed_bytes as f64 / raw as f64) as f32
}

/// One labelled training example. Lives only as long as its batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompressionSample {
    /// Index of the source image in the corpus
    pub image_index: usize,
    pub features:    ImageFeatures,
    pub format:      ImageFormat,
    pub quality:     u32,
    pub width:       u32,
    pub height:      u32,
    pub compressed_bytes: usize,
    /// `compressed_bytes / (width * height * 3)`
    pub ratio: f32,
}
