// ============================================================
// Layer 4 — Dataset Builder
// ============================================================
// Produces a new image set by driving an ImageGenerator with
// prompts from a prompt bank:
//
//   prompts.json  { "prefix": "...", "suffix": "...", "prompts": [...] }
//       │
//       ▼  for each image: random prompt, random seed in 1..=999999
//   ImageGenerator::generate(prefix + prompt + suffix, seed)
//       │
//       ▼
//   <base>/dataset_YYYYmmdd_HHMMSS/
//     images/image_0000.png
//     images/image_0001.png
//     dataset.json
//
// FractalPatternGenerator renders offline, so datasets can be built
// without an external text-to-image service.

use std::{
    f64::consts::TAU,
    fs,
    path::{Path, PathBuf},
};

use anyhow::Result;
use image::{Rgb, RgbImage};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::domain::{
    image_set::{ImageRecord, ImageSet},
    traits::{GenerationParams, ImageGenerator},
};

/// Renderer seeds are drawn from this range.
pub const SEED_RANGE: std::ops::RangeInclusive<u64> = 1..=999_999;

const DATASET_FILE: &str = "dataset.json";
const IMAGES_DIR:   &str = "images";

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("prompt bank has no prompts")]
    EmptyPromptBank,

    #[error("cannot read prompt bank '{path}'")]
    ReadBank {
        path:   PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("'{path}' is not a valid prompt bank")]
    ParseBank {
        path:   PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("I/O error at '{path}'")]
    Io {
        path:   PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("generator failed on image {index}: {source:#}")]
    Generate { index: usize, source: anyhow::Error },

    #[error("cannot save '{path}'")]
    SaveImage {
        path:   PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("cannot serialise the image set")]
    Serialise(#[from] serde_json::Error),
}

// ─── PromptBank ───────────────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptBank {
    #[serde(default)]
    pub prefix:  String,
    #[serde(default)]
    pub suffix:  String,
    pub prompts: Vec<String>,
}

impl PromptBank {
    pub fn load(path: &Path) -> Result<Self, BuildError> {
        let json = fs::read_to_string(path).map_err(|source| BuildError::ReadBank {
            path: path.to_path_buf(),
            source,
        })?;
        let bank: Self = serde_json::from_str(&json).map_err(|source| BuildError::ParseBank {
            path: path.to_path_buf(),
            source,
        })?;
        if bank.prompts.is_empty() {
            return Err(BuildError::EmptyPromptBank);
        }
        Ok(bank)
    }

    /// `prefix + base + suffix`, trimmed.
    pub fn full_prompt(&self, base: &str) -> String {
        format!("{}{}{}", self.prefix, base, self.suffix).trim().to_string()
    }
}

impl Default for PromptBank {
    fn default() -> Self {
        Self {
            prefix: "a detailed photograph of ".into(),
            suffix: ", natural light".into(),
            prompts: [
                "a mountain lake at dawn",
                "a crowded city street",
                "a bowl of fruit on a wooden table",
                "a close-up of tree bark",
                "a foggy forest path",
                "a brick wall covered in graffiti",
                "a calm sea under an overcast sky",
                "a field of sunflowers",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

// ─── Building ─────────────────────────────────────────────────────────────────
/// Create `<base>/dataset_<timestamp>` and return it.
pub fn make_output_dir(base: &Path) -> Result<PathBuf, BuildError> {
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let dir = base.join(format!("dataset_{stamp}"));
    fs::create_dir_all(&dir).map_err(|source| BuildError::Io { path: dir.clone(), source })?;
    Ok(dir)
}

/// Render `count` images into `<out_dir>/images/` and return their records.
/// Metadata is left empty.
pub fn build_image_set<G: ImageGenerator + ?Sized, R: Rng>(
    generator: &mut G,
    bank:      &PromptBank,
    count:     usize,
    out_dir:   &Path,
    params:    &GenerationParams,
    rng:       &mut R,
) -> Result<ImageSet, BuildError> {
    if bank.prompts.is_empty() {
        return Err(BuildError::EmptyPromptBank);
    }
    let img_dir = out_dir.join(IMAGES_DIR);
    fs::create_dir_all(&img_dir).map_err(|source| BuildError::Io { path: img_dir.clone(), source })?;

    let mut set = ImageSet::default();
    for i in 0..count {
        let base   = &bank.prompts[rng.gen_range(0..bank.prompts.len())];
        let prompt = bank.full_prompt(base);
        let seed   = rng.gen_range(SEED_RANGE);
        tracing::info!("Generating image {}/{} (seed {}): {}", i + 1, count, seed, prompt);

        let image = generator
            .generate(&prompt, seed, params)
            .map_err(|source| BuildError::Generate { index: i, source })?;

        let relative = format!("{IMAGES_DIR}/image_{i:04}.png");
        let path = out_dir.join(&relative);
        image
            .save(&path)
            .map_err(|source| BuildError::SaveImage { path: path.clone(), source })?;
        tracing::debug!("Saved '{}'", path.display());

        set.images.push(ImageRecord::new(prompt, base.as_str(), relative, seed));
    }
    Ok(set)
}

/// Fill the standard metadata block.
pub fn stamp_metadata(set: &mut ImageSet, prompt_bank: &str) {
    set.metadata.insert("created_at".into(), Value::from(chrono::Local::now().to_rfc3339()));
    set.metadata.insert("num_images".into(), Value::from(set.len()));
    set.metadata.insert("prompt_bank".into(), Value::from(prompt_bank));
}

pub fn write_image_set(set: &ImageSet, path: &Path) -> Result<(), BuildError> {
    let json = serde_json::to_string_pretty(set)?;
    fs::write(path, json).map_err(|source| BuildError::Io { path: path.to_path_buf(), source })
}

/// Full build: timestamped directory, images, `dataset.json`.
/// Returns the path of the written dataset file.
pub fn build_dataset<G: ImageGenerator + ?Sized, R: Rng>(
    generator:   &mut G,
    bank:        &PromptBank,
    bank_source: &str,
    count:       usize,
    base_dir:    &Path,
    params:      &GenerationParams,
    rng:         &mut R,
) -> Result<PathBuf, BuildError> {
    let out_dir = make_output_dir(base_dir)?;
    tracing::info!("Creating dataset at '{}'", out_dir.display());

    let mut set = build_image_set(generator, bank, count, &out_dir, params, rng)?;
    stamp_metadata(&mut set, bank_source);

    let path = out_dir.join(DATASET_FILE);
    write_image_set(&set, &path)?;
    Ok(path)
}

// ─── FractalPatternGenerator ──────────────────────────────────────────────────
/// Offline renderer: each channel is the sum of a horizontal and a
/// vertical "fractal rhythm", a stack of sine octaves whose amplitude
/// falls off as 1 / i^power. Prompt and seed pick the phases, so the
/// same (prompt, seed) always renders the same image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FractalPatternGenerator {
    pub fractal_power: f64,
    pub octaves:       u32,
}

impl Default for FractalPatternGenerator {
    fn default() -> Self {
        Self { fractal_power: 1.5, octaves: 8 }
    }
}

impl ImageGenerator for FractalPatternGenerator {
    fn generate(&mut self, prompt: &str, seed: u64, params: &GenerationParams) -> Result<RgbImage> {
        anyhow::ensure!(
            params.width > 0 && params.height > 0,
            "cannot render a {}x{} image",
            params.width,
            params.height
        );
        let mut rng = StdRng::seed_from_u64(seed ^ fnv1a(prompt.as_bytes()));

        let channels: Vec<(Vec<f64>, Vec<f64>)> = (0..3)
            .map(|_| {
                let rows = fractal_rhythm(params.width as usize, self.fractal_power, self.octaves, &mut rng);
                let cols = fractal_rhythm(params.height as usize, self.fractal_power, self.octaves, &mut rng);
                (rows, cols)
            })
            .collect();

        Ok(RgbImage::from_fn(params.width, params.height, |x, y| {
            let px = |c: usize| {
                let (rows, cols) = &channels[c];
                (0.5 * (rows[x as usize] + cols[y as usize]) * 255.0).round() as u8
            };
            Rgb([px(0), px(1), px(2)])
        }))
    }
}

/// Normalised to [0, 1]; a flat signal maps to 0.5.
fn fractal_rhythm<R: Rng>(size: usize, power: f64, octaves: u32, rng: &mut R) -> Vec<f64> {
    let phases: Vec<f64> = (0..octaves).map(|_| rng.gen_range(0.0..TAU)).collect();
    let signal: Vec<f64> = (0..size)
        .map(|n| {
            let t = if size > 1 { n as f64 / (size - 1) as f64 } else { 0.0 };
            phases
                .iter()
                .enumerate()
                .map(|(k, phase)| {
                    let i = (k + 1) as f64;
                    (TAU * 2f64.powf(i) * t + phase).sin() / i.powf(power)
                })
                .sum()
        })
        .collect();

    let min = signal.iter().copied().fold(f64::INFINITY, f64::min);
    let max = signal.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let span = max - min;
    signal
        .into_iter()
        .map(|v| if span > f64::EPSILON { (v - min) / span } else { 0.5 })
        .collect()
}

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0xcbf2_9ce4_8422_2325u64, |h, &b| {
        (h ^ u64::from(b)).wrapping_mul(0x0000_0100_0000_01b3)
    })
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::loader::ImageDataset;
    use crate::domain::traits::ImageCorpus;

    fn small() -> GenerationParams {
        GenerationParams { width: 48, height: 32 }
    }

    #[test]
    fn test_fractal_generator_is_deterministic() {
        let mut gen = FractalPatternGenerator::default();
        let a = gen.generate("a fox", 42, &small()).unwrap();
        let b = gen.generate("a fox", 42, &small()).unwrap();
        let c = gen.generate("a fox", 43, &small()).unwrap();
        let d = gen.generate("a cat", 42, &small()).unwrap();
        assert_eq!(a.dimensions(), (48, 32));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
    }

    #[test]
    fn test_fractal_generator_rejects_empty_canvas() {
        let mut gen = FractalPatternGenerator::default();
        assert!(gen.generate("x", 1, &GenerationParams { width: 0, height: 10 }).is_err());
    }

    #[test]
    fn test_full_prompt_is_trimmed() {
        let bank = PromptBank {
            prefix:  "  photo of ".into(),
            suffix:  " ".into(),
            prompts: vec!["a dog".into()],
        };
        assert_eq!(bank.full_prompt("a dog"), "photo of a dog");
    }

    #[test]
    fn test_prompt_bank_without_prompts_is_rejected() {
        let tmp  = tempfile::tempdir().unwrap();
        let path = tmp.path().join("prompts.json");
        fs::write(&path, r#"{ "prefix": "x", "prompts": [] }"#).unwrap();
        assert!(matches!(PromptBank::load(&path), Err(BuildError::EmptyPromptBank)));
    }

    #[test]
    fn test_built_dataset_loads_back() {
        let tmp  = tempfile::tempdir().unwrap();
        let bank = PromptBank::default();
        let mut gen = FractalPatternGenerator::default();
        let mut rng = StdRng::seed_from_u64(3);

        let path = build_dataset(&mut gen, &bank, "builtin", 3, tmp.path(), &small(), &mut rng).unwrap();
        assert_eq!(path.file_name().unwrap(), "dataset.json");
        let dir_name = path.parent().unwrap().file_name().unwrap().to_string_lossy().to_string();
        assert!(dir_name.starts_with("dataset_"));

        let dataset = ImageDataset::open(&path).unwrap();
        let set = dataset.image_set();
        assert_eq!(set.len(), 3);
        assert_eq!(set.metadata["num_images"], 3);
        assert_eq!(set.metadata["prompt_bank"], "builtin");
        assert!(set.metadata.contains_key("created_at"));
        assert_eq!(set.images[1].image_path, "images/image_0001.png");
        for record in &set.images {
            assert!(SEED_RANGE.contains(&record.seed));
            assert!(bank.prompts.contains(&record.prompt_base));
            assert_eq!(record.prompt, bank.full_prompt(&record.prompt_base));
        }
        assert_eq!(dataset.load_pixels(2).unwrap().dimensions(), (48, 32));
    }
}
