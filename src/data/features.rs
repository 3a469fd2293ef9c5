// ============================================================
// Layer 4 — Image Feature Extraction
// ============================================================
// Reduces a source image to the content statistics the estimator
// sees. Everything is computed on a copy scaled down to at most
// ANALYSIS_EDGE pixels on its longest side, so cost is bounded
// no matter how large the source is.

use image::{imageops, RgbImage};

use crate::domain::sample::ImageFeatures;

/// Longest side of the analysis copy.
const ANALYSIS_EDGE: u32 = 256;

/// ln(4096 * 4096): pixel counts are reported relative to this.
const LOG_PIXELS_REF: f64 = 16.635_532_333_438_686;

pub fn extract(image: &RgbImage) -> ImageFeatures {
    let (native_width, native_height) = image.dimensions();
    let view = analysis_copy(image);
    let (w, h) = (view.width() as usize, view.height() as usize);

    // ── Luminance plane ──────────────────────────────────────────────────────
    let luma: Vec<f32> = view
        .pixels()
        .map(|p| (0.299 * f32::from(p[0]) + 0.587 * f32::from(p[1]) + 0.114 * f32::from(p[2])) / 255.0)
        .collect();
    let n = luma.len().max(1) as f32;
    let mean_luma = luma.iter().sum::<f32>() / n;
    let luma_std  = (luma.iter().map(|l| (l - mean_luma).powi(2)).sum::<f32>() / n).sqrt();

    // ── Gradients and Laplacian ──────────────────────────────────────────────
    let at = |x: usize, y: usize| luma[y * w + x];
    let mut grad_sum = 0.0f32;
    let mut grad_n   = 0usize;
    let mut lap_sum  = 0.0f32;
    let mut lap_n    = 0usize;
    for y in 0..h {
        for x in 0..w {
            let c = at(x, y);
            if x + 1 < w {
                grad_sum += (at(x + 1, y) - c).abs();
                grad_n   += 1;
            }
            if y + 1 < h {
                grad_sum += (at(x, y + 1) - c).abs();
                grad_n   += 1;
            }
            if x > 0 && y > 0 && x + 1 < w && y + 1 < h {
                let lap = 4.0 * c - at(x - 1, y) - at(x + 1, y) - at(x, y - 1) - at(x, y + 1);
                lap_sum += lap.abs();
                lap_n   += 1;
            }
        }
    }
    let edge_density = if grad_n > 0 { grad_sum / grad_n as f32 } else { 0.0 };
    let high_freq    = if lap_n  > 0 { lap_sum  / lap_n  as f32 } else { 0.0 };

    ImageFeatures {
        native_width,
        native_height,
        mean_luma,
        luma_std,
        edge_density,
        high_freq,
        colorfulness: colorfulness(&view),
        entropy:      luma_entropy(&luma),
        aspect:       native_height as f32 / native_width.max(1) as f32,
        log_pixels:   log_pixels(native_width, native_height),
    }
}

fn analysis_copy(image: &RgbImage) -> RgbImage {
    let (w, h) = image.dimensions();
    let longest = w.max(h);
    if longest <= ANALYSIS_EDGE {
        return image.clone();
    }
    let scale = f64::from(ANALYSIS_EDGE) / f64::from(longest);
    let tw = ((f64::from(w) * scale).round() as u32).max(1);
    let th = ((f64::from(h) * scale).round() as u32).max(1);
    imageops::thumbnail(image, tw, th)
}

/// Hasler & Süsstrunk (2003), divided by 255.
fn colorfulness(image: &RgbImage) -> f32 {
    let n = (image.width() as usize * image.height() as usize).max(1) as f64;
    let (mut rg_sum, mut yb_sum, mut rg_sq, mut yb_sq) = (0.0f64, 0.0f64, 0.0f64, 0.0f64);
    for p in image.pixels() {
        let (r, g, b) = (f64::from(p[0]), f64::from(p[1]), f64::from(p[2]));
        let rg = r - g;
        let yb = 0.5 * (r + g) - b;
        rg_sum += rg;
        yb_sum += yb;
        rg_sq  += rg * rg;
        yb_sq  += yb * yb;
    }
    let (rg_mean, yb_mean) = (rg_sum / n, yb_sum / n);
    let rg_var = (rg_sq / n - rg_mean * rg_mean).max(0.0);
    let yb_var = (yb_sq / n - yb_mean * yb_mean).max(0.0);
    let std_root  = (rg_var + yb_var).sqrt();
    let mean_root = (rg_mean * rg_mean + yb_mean * yb_mean).sqrt();
    ((std_root + 0.3 * mean_root) / 255.0) as f32
}

/// Shannon entropy of the 256-bin luminance histogram, in units of 8 bits.
fn luma_entropy(luma: &[f32]) -> f32 {
    if luma.is_empty() {
        return 0.0;
    }
    let mut hist = [0u32; 256];
    for &l in luma {
        hist[(l * 255.0).round().clamp(0.0, 255.0) as usize] += 1;
    }
    let n = luma.len() as f64;
    let bits: f64 = hist
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = f64::from(c) / n;
            -p * p.log2()
        })
        .sum();
    (bits / 8.0) as f32
}

/// ln(pixel count) relative to a 4096×4096 image.
pub fn log_pixels(w: u32, h: u32) -> f32 {
    let pixels = (u64::from(w) * u64::from(h)).max(1) as f64;
    (pixels.ln() / LOG_PIXELS_REF) as f32
}
