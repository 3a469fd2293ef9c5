// ============================================================
// Layer 4 — Codec Adapter
// ============================================================
// Encodes an RGB raster with one of the supported codecs after an
// optional aspect-preserving resize:
//
//   (image, format, quality, width) → EncodedImage
//
// Quality and width arrive as floats and are rounded first.
// Resize policy:
//   width <  native → area averaging (imageops::thumbnail)
//   width >  native → linear interpolation
//   width == native → encoded as-is
//
// Per-codec quality handling:
//   jpeg  1..=100 (clamped)
//   webp  0..=100 (clamped, lossy)
//   png   zlib effort: 0-2 fast, 3-6 default, 7+ best
//
// Pure function: same inputs and codec versions → same bytes.

use std::borrow::Cow;

use image::{
    codecs::{
        jpeg::JpegEncoder,
        png::{CompressionType, FilterType as PngFilter, PngEncoder},
    },
    imageops::{self, FilterType},
    ExtendedColorType, ImageEncoder, RgbImage,
};
use thiserror::Error;

use crate::domain::{format::ImageFormat, sample::scaled_height};

#[derive(Debug, Error)]
pub enum CodecError {
    /// The requested width rounds to less than one pixel
    #[error("target width {0} is not a positive pixel count")]
    InvalidWidth(f64),

    /// The codec rejected the raster
    #[error("failed to encode {format} image: {reason}")]
    Encoding { format: ImageFormat, reason: String },
}

/// Result of one encode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub bytes:   Vec<u8>,
    /// Rounded requested quality
    pub quality: u32,
    /// Width of the encoded raster
    pub width:   u32,
    /// Height of the encoded raster
    pub height:  u32,
}

/// Resize (if needed) and encode `image`.
pub fn compress(
    image:   &RgbImage,
    format:  ImageFormat,
    quality: f64,
    width:   f64,
) -> Result<EncodedImage, CodecError> {
    let width_px = width.round();
    if !(width_px >= 1.0) || width_px > f64::from(u32::MAX) {
        return Err(CodecError::InvalidWidth(width));
    }
    let width_px = width_px as u32;
    let quality  = quality.round().clamp(0.0, f64::from(u32::MAX)) as u32;

    let raster = resize_to_width(image, width_px);
    let (w, h) = raster.dimensions();

    let bytes = match format {
        ImageFormat::Jpeg => encode_jpeg(&raster, quality),
        ImageFormat::Png  => encode_png(&raster, quality),
        ImageFormat::Webp => encode_webp(&raster, quality),
    }?;

    Ok(EncodedImage { bytes, quality, width: w, height: h })
}

/// Aspect-preserving resize to `width`; borrows when nothing changes.
pub fn resize_to_width(image: &RgbImage, width: u32) -> Cow<'_, RgbImage> {
    let (w, h) = image.dimensions();
    if width == w {
        return Cow::Borrowed(image);
    }
    let height = scaled_height(w, h, width);
    let resized = if width < w {
        imageops::thumbnail(image, width, height)
    } else {
        imageops::resize(image, width, height, FilterType::Triangle)
    };
    Cow::Owned(resized)
}

fn encode_jpeg(raster: &RgbImage, quality: u32) -> Result<Vec<u8>, CodecError> {
    let q = quality.clamp(1, 100) as u8;
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, q)
        .encode_image(raster)
        .map_err(|e| CodecError::Encoding { format: ImageFormat::Jpeg, reason: e.to_string() })?;
    Ok(out)
}

fn encode_png(raster: &RgbImage, level: u32) -> Result<Vec<u8>, CodecError> {
    let compression = match level {
        0..=2 => CompressionType::Fast,
        3..=6 => CompressionType::Default,
        _     => CompressionType::Best,
    };
    let mut out = Vec::new();
    PngEncoder::new_with_quality(&mut out, compression, PngFilter::Adaptive)
        .write_image(raster.as_raw(), raster.width(), raster.height(), ExtendedColorType::Rgb8)
        .map_err(|e| CodecError::Encoding { format: ImageFormat::Png, reason: e.to_string() })?;
    Ok(out)
}

fn encode_webp(raster: &RgbImage, quality: u32) -> Result<Vec<u8>, CodecError> {
    let q = quality.min(100) as f32;
    let memory = webp::Encoder::from_rgb(raster.as_raw(), raster.width(), raster.height())
        .encode_simple(false, q)
        .map_err(|e| CodecError::Encoding { format: ImageFormat::Webp, reason: format!("{e:?}") })?;
    Ok(memory.to_vec())
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, Rgb};

    fn gradient(w: u32, h: u32) -> RgbImage {
        RgbImage::from_fn(w, h, |x, y| {
            Rgb([(x * 255 / w.max(1)) as u8, (y * 255 / h.max(1)) as u8, ((x + y) % 256) as u8])
        })
    }

    fn has_signature(format: ImageFormat, bytes: &[u8]) -> bool {
        match format {
            ImageFormat::Jpeg => bytes.starts_with(&[0xFF, 0xD8, 0xFF]),
            ImageFormat::Png  => bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]),
            ImageFormat::Webp => bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP",
        }
    }

    #[test]
    fn test_output_width_and_signature_for_every_format() {
        let img = gradient(160, 120);
        for format in ImageFormat::ALL {
            for (quality, width) in [(10.0, 40.0), (55.0, 100.0), (95.0, 160.0)] {
                let out = compress(&img, format, quality, width).unwrap();
                assert_eq!(out.width, width as u32, "{format} q{quality} w{width}");
                assert!(has_signature(format, &out.bytes), "{format} signature");
            }
        }
    }

    #[test]
    fn test_resize_round_trip_dimensions() {
        let img = gradient(200, 150);
        for format in ImageFormat::ALL {
            for width in [1.0, 37.0, 100.0, 200.0, 260.0] {
                let out     = compress(&img, format, 80.0, width).unwrap();
                let decoded = image::load_from_memory(&out.bytes).unwrap();
                let expect_h = scaled_height(200, 150, width as u32);
                assert_eq!(decoded.dimensions(), (width as u32, expect_h), "{format} w{width}");
                assert_eq!((out.width, out.height), (width as u32, expect_h));
            }
        }
    }

    #[test]
    fn test_quality_and_width_are_rounded() {
        let img = gradient(64, 64);
        let out = compress(&img, ImageFormat::Jpeg, 49.6, 31.4).unwrap();
        assert_eq!(out.quality, 50);
        assert_eq!(out.width, 31);
    }

    #[test]
    fn test_native_width_encodes_unchanged_raster() {
        let img = gradient(48, 32);
        assert!(matches!(resize_to_width(&img, 48), Cow::Borrowed(_)));
        let out = compress(&img, ImageFormat::Png, 9.0, 48.0).unwrap();
        let decoded = image::load_from_memory(&out.bytes).unwrap().to_rgb8();
        // PNG is lossless, so the raster survives exactly
        assert_eq!(decoded, img);
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let img = gradient(90, 60);
        for format in ImageFormat::ALL {
            let a = compress(&img, format, 70.0, 45.0).unwrap();
            let b = compress(&img, format, 70.0, 45.0).unwrap();
            assert_eq!(a, b, "{format}");
        }
    }

    #[test]
    fn test_lower_quality_is_smaller_for_lossy_codecs() {
        let img = RgbImage::from_fn(128, 128, |x, y| {
            let v = ((x * 37 + y * 91) ^ (x * y)) as u8;
            Rgb([v, v.wrapping_mul(3), v.wrapping_add(90)])
        });
        for format in [ImageFormat::Jpeg, ImageFormat::Webp] {
            let low  = compress(&img, format, 10.0, 128.0).unwrap();
            let high = compress(&img, format, 95.0, 128.0).unwrap();
            assert!(low.bytes.len() < high.bytes.len(), "{format}");
        }
    }

    #[test]
    fn test_non_positive_width_is_rejected() {
        let img = gradient(16, 16);
        assert!(matches!(
            compress(&img, ImageFormat::Jpeg, 50.0, 0.2),
            Err(CodecError::InvalidWidth(_))
        ));
        assert!(matches!(
            compress(&img, ImageFormat::Webp, 50.0, f64::NAN),
            Err(CodecError::InvalidWidth(_))
        ));
    }
}
