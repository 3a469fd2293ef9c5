// ============================================================
// Layer 2 — Synth Use Case
// ============================================================
// Builds a new image set for training:
//
//   1. Load the prompt bank (or use the built-in one)
//   2. Render images with the offline fractal pattern generator
//   3. Write images/ and dataset.json into a timestamped directory

use std::path::PathBuf;

use anyhow::{Context, Result};
use rand::{rngs::StdRng, SeedableRng};

use crate::data::builder::{build_dataset, FractalPatternGenerator, PromptBank};
use crate::domain::traits::GenerationParams;

#[derive(Debug, Clone)]
pub struct SynthConfig {
    /// Prompt bank JSON; the built-in bank when absent
    pub prompts:       Option<PathBuf>,
    /// Base directory; the dataset goes into dataset_<timestamp>/ below it
    pub out_dir:       PathBuf,
    pub num_images:    usize,
    pub width:         u32,
    pub height:        u32,
    pub fractal_power: f64,
    pub seed:          Option<u64>,
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            prompts:       None,
            out_dir:       PathBuf::from("image_datasets"),
            num_images:    10,
            width:         512,
            height:        512,
            fractal_power: 1.5,
            seed:          None,
        }
    }
}

pub struct SynthUseCase {
    config: SynthConfig,
}

impl SynthUseCase {
    pub fn new(config: SynthConfig) -> Self {
        Self { config }
    }

    /// Returns the path of the written dataset.json.
    pub fn execute(&self) -> Result<PathBuf> {
        let cfg = &self.config;
        anyhow::ensure!(cfg.num_images > 0, "number of images must be at least 1");

        let (bank, source) = match &cfg.prompts {
            Some(path) => (
                PromptBank::load(path).context("cannot load the prompt bank")?,
                path.display().to_string(),
            ),
            None => (PromptBank::default(), "builtin".to_string()),
        };

        let mut rng = match cfg.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None       => StdRng::from_entropy(),
        };
        let mut generator = FractalPatternGenerator {
            fractal_power: cfg.fractal_power,
            ..FractalPatternGenerator::default()
        };
        let params = GenerationParams { width: cfg.width, height: cfg.height };

        build_dataset(&mut generator, &bank, &source, cfg.num_images, &cfg.out_dir, &params, &mut rng)
            .context("dataset build failed")
    }
}
