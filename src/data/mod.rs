// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything from source images on disk to tensor batches.
//
//   dataset.json + images/
//       │
//       ▼
//   ImageDataset      → reads the image set, serves RGB pixels
//       │
//       ▼
//   SampleGenerator   → random (format, quality, width) draws,
//       │               real encodes via the codec adapter,
//       │               content features per source image
//       ▼
//   RatioBatcher      → stacks samples into tensor batches
//
// The dataset builder runs the other way round: prompts in,
// dataset.json + images/ out.

/// Encode an image in a given format, quality and width
pub mod codec;

/// Content statistics of a source image
pub mod features;

/// Reads an ImageSet JSON file and its images
pub mod loader;

/// Endless stream of labelled compression samples
pub mod generator;

/// Implements Burn's Batcher trait to create tensor batches
pub mod batcher;

/// Fixed sample sets behind Burn's Dataset trait
pub mod dataset;

/// Builds new image sets from a prompt bank
pub mod builder;

#[cfg(test)]
pub(crate) mod test_support;
