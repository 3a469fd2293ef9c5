// ============================================================
// Layer 4 — Sample Generator
// ============================================================
// Produces an endless stream of labelled CompressionSamples from a
// corpus of source images. Nothing is precomputed: every sample is
// a fresh random draw of
//
//   image    uniform over the corpus
//   format   uniform over the allowed formats
//   quality  uniform integer in [min_quality, max_quality]
//   width    uniform integer in [min_width, min(max_width, native_width)]
//
// followed by a real encode through the codec adapter. Images
// narrower than min_width cannot honour the width range and count
// as a failed draw.
//
// A slot is retried up to MAX_DRAW_ATTEMPTS times (each attempt a
// completely new draw) before its SampleGenerationError is reported.

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use image::ImageError;
use rand::{rngs::StdRng, Rng, SeedableRng};
use thiserror::Error;

use crate::data::{
    codec::{self, CodecError, EncodedImage},
    features,
};
use crate::domain::{
    format::ImageFormat,
    sample::{compression_ratio, CompressionSample, ImageFeatures},
    traits::ImageCorpus,
};

/// Draws per batch slot before the slot is given up.
pub const MAX_DRAW_ATTEMPTS: usize = 5;

// ─── Configuration ────────────────────────────────────────────────────────────
/// Parameter space the generator samples from. Ranges are inclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplerConfig {
    pub formats:       Vec<ImageFormat>,
    pub quality_range: (u32, u32),
    pub width_range:   (u32, u32),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SamplerError {
    #[error("at least one output format is required")]
    NoFormats,

    #[error("invalid quality range {0}..={1}")]
    QualityRange(u32, u32),

    #[error("invalid width range {0}..={1} (widths start at 1 and min must not exceed max)")]
    WidthRange(u32, u32),

    #[error("the image corpus is empty")]
    EmptyCorpus,
}

impl SamplerConfig {
    pub fn validate(&self) -> Result<(), SamplerError> {
        if self.formats.is_empty() {
            return Err(SamplerError::NoFormats);
        }
        let (qmin, qmax) = self.quality_range;
        if qmin > qmax {
            return Err(SamplerError::QualityRange(qmin, qmax));
        }
        let (wmin, wmax) = self.width_range;
        if wmin == 0 || wmin > wmax {
            return Err(SamplerError::WidthRange(wmin, wmax));
        }
        Ok(())
    }
}

// ─── Errors ───────────────────────────────────────────────────────────────────
/// Why a single draw produced no sample.
#[derive(Debug, Error)]
pub enum DrawError {
    #[error("cannot load {image}: {source}")]
    Image {
        image:  String,
        #[source]
        source: ImageError,
    },

    #[error("{image} is {native}px wide, narrower than the minimum width {min}")]
    TooNarrow { image: String, native: u32, min: u32 },

    #[error("codec failure on {image}: {source}")]
    Codec {
        image:  String,
        #[source]
        source: CodecError,
    },
}

/// A batch slot for which every draw failed.
#[derive(Debug, Error)]
#[error("no sample after {attempts} draws; last failure: {last}")]
pub struct SampleGenerationError {
    pub attempts: usize,
    #[source]
    pub last:     DrawError,
}

/// The usable samples of one batch request plus the slots that failed.
#[derive(Debug, Default)]
pub struct SampleBatch {
    pub samples:  Vec<CompressionSample>,
    pub failures: Vec<SampleGenerationError>,
}

// ─── SampleGenerator ──────────────────────────────────────────────────────────
pub struct SampleGenerator<C, R = StdRng> {
    corpus:   C,
    config:   SamplerConfig,
    rng:      R,
    /// Features depend only on the source image, so they are computed once
    features: HashMap<usize, ImageFeatures>,
    export:   Option<PathBuf>,
    produced: u64,
}

impl<C: ImageCorpus> SampleGenerator<C, StdRng> {
    /// Generator seeded from OS entropy.
    pub fn new(corpus: C, config: SamplerConfig) -> Result<Self, SamplerError> {
        Self::with_rng(corpus, config, StdRng::from_entropy())
    }

    /// Reproducible generator.
    pub fn seeded(corpus: C, config: SamplerConfig, seed: u64) -> Result<Self, SamplerError> {
        Self::with_rng(corpus, config, StdRng::seed_from_u64(seed))
    }
}

impl<C: ImageCorpus, R: Rng> SampleGenerator<C, R> {
    pub fn with_rng(corpus: C, config: SamplerConfig, rng: R) -> Result<Self, SamplerError> {
        config.validate()?;
        if corpus.is_empty() {
            return Err(SamplerError::EmptyCorpus);
        }
        Ok(Self {
            corpus,
            config,
            rng,
            features: HashMap::new(),
            export:   None,
            produced: 0,
        })
    }

    /// Also write every generated sample's encoded bytes into `dir`.
    pub fn with_export_dir(mut self, dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        self.export = Some(dir);
        Ok(self)
    }

    /// Total samples produced so far.
    pub fn produced(&self) -> u64 {
        self.produced
    }

    /// Draw `batch_size` slots. Failed slots are reported, not retried
    /// beyond their own attempt budget.
    pub fn next_batch(&mut self, batch_size: usize) -> SampleBatch {
        let mut batch = SampleBatch {
            samples:  Vec::with_capacity(batch_size),
            failures: Vec::new(),
        };
        for _ in 0..batch_size {
            match self.next_sample() {
                Ok(sample) => batch.samples.push(sample),
                Err(e)     => batch.failures.push(e),
            }
        }
        batch
    }

    /// One sample, retrying fresh draws up to [`MAX_DRAW_ATTEMPTS`] times.
    pub fn next_sample(&mut self) -> Result<CompressionSample, SampleGenerationError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.draw() {
                Ok((sample, encoded)) => {
                    self.produced += 1;
                    self.export_sample(&sample, &encoded);
                    return Ok(sample);
                }
                Err(e) if attempt < MAX_DRAW_ATTEMPTS => {
                    tracing::debug!("Draw {} failed, redrawing: {}", attempt, e);
                }
                Err(e) => return Err(SampleGenerationError { attempts: attempt, last: e }),
            }
        }
    }

    fn draw(&mut self) -> Result<(CompressionSample, EncodedImage), DrawError> {
        let index = self.rng.gen_range(0..self.corpus.len());
        let image = self.corpus.load_pixels(index).map_err(|source| DrawError::Image {
            image: self.corpus.describe(index),
            source,
        })?;
        let native_width = image.width();

        let (wmin, wmax) = self.config.width_range;
        if native_width < wmin {
            return Err(DrawError::TooNarrow {
                image:  self.corpus.describe(index),
                native: native_width,
                min:    wmin,
            });
        }

        let format = self.config.formats[self.rng.gen_range(0..self.config.formats.len())];
        let (qmin, qmax) = self.config.quality_range;
        let quality = self.rng.gen_range(qmin..=qmax);
        let width   = self.rng.gen_range(wmin..=wmax.min(native_width));

        let features = *self
            .features
            .entry(index)
            .or_insert_with(|| features::extract(&image));

        let encoded = codec::compress(&image, format, f64::from(quality), f64::from(width))
            .map_err(|source| DrawError::Codec { image: self.corpus.describe(index), source })?;

        let sample = CompressionSample {
            image_index: index,
            features,
            format,
            quality,
            width: encoded.width,
            height: encoded.height,
            compressed_bytes: encoded.bytes.len(),
            ratio: compression_ratio(encoded.bytes.len(), encoded.width, encoded.height),
        };
        Ok((sample, encoded))
    }

    fn export_sample(&self, sample: &CompressionSample, encoded: &EncodedImage) {
        let Some(dir) = &self.export else { return };
        let path = export_path(dir, self.produced, sample);
        if let Err(e) = fs::write(&path, &encoded.bytes) {
            tracing::warn!("Cannot export sample to '{}': {}", path.display(), e);
        }
    }
}

fn export_path(dir: &Path, serial: u64, sample: &CompressionSample) -> PathBuf {
    dir.join(format!(
        "sample_{serial:06}_{}_q{}_w{}.{}",
        sample.format,
        sample.quality,
        sample.width,
        sample.format.extension(),
    ))
}

/// The generator never runs dry: `next()` always returns `Some`.
impl<C: ImageCorpus, R: Rng> Iterator for SampleGenerator<C, R> {
    type Item = Result<CompressionSample, SampleGenerationError>;

    fn next(&mut self) -> Option<Self::Item> {
        Some(self.next_sample())
    }
}
