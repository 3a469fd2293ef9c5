// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust structs, enums and traits describing what the
// system works with. No Burn types and no file I/O here.

// Codec names and parsing
pub mod format;

// ImageRecord / ImageSet — the dataset file model
pub mod image_set;

// ImageFeatures / CompressionSample and the ratio label
pub mod sample;

// Per-epoch metrics and the training history
pub mod history;

// Collaborator traits (corpus, generator, observer)
pub mod traits;
