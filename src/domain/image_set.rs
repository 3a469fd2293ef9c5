// ============================================================
// Layer 3 — Image Set Domain Types
// ============================================================
// The dataset file written by the image-generation step and read
// back wholesale for training:
//
//   {
//     "images":   [ { "prompt", "prompt_base", "image_path", "seed" }, ... ],
//     "metadata": { "created_at": ..., "num_images": ..., ... }
//   }
//
// `image_path` is relative to the directory holding the JSON file.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One generated source image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRecord {
    /// Full prompt sent to the renderer (prefix + base + suffix)
    pub prompt: String,

    /// The prompt-bank entry the full prompt was built from
    #[serde(default)]
    pub prompt_base: String,

    /// Path of the image file, relative to the dataset file
    pub image_path: String,

    /// Renderer seed used for this image
    pub seed: u64,
}

impl ImageRecord {
    pub fn new(
        prompt:      impl Into<String>,
        prompt_base: impl Into<String>,
        image_path:  impl Into<String>,
        seed:        u64,
    ) -> Self {
        Self {
            prompt:      prompt.into(),
            prompt_base: prompt_base.into(),
            image_path:  image_path.into(),
            seed,
        }
    }

    /// Label used in logs.
    pub fn label(&self) -> String {
        if self.prompt_base.is_empty() {
            format!("{} (seed {})", self.image_path, self.seed)
        } else {
            format!("{} [{}] (seed {})", self.image_path, self.prompt_base, self.seed)
        }
    }
}

/// An ordered collection of image records plus free-form metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageSet {
    #[serde(default)]
    pub images: Vec<ImageRecord>,

    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl ImageSet {
    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_prompt_base_defaults_to_empty() {
        let json = r#"{
            "images": [ { "prompt": "a red fox", "image_path": "images/image_0000.png", "seed": 7 } ],
            "metadata": { "num_images": 1 }
        }"#;
        let set: ImageSet = serde_json::from_str(json).unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.images[0].prompt_base, "");
        assert_eq!(set.images[0].seed, 7);
        assert_eq!(set.metadata["num_images"], 1);
    }
}
