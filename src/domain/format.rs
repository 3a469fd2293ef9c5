// ============================================================
// Layer 3 — Image Format
// ============================================================
// The set of codecs the estimator knows about. Parsing happens
// at the edges (CLI, config files); everything inside the crate
// works with the enum.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A format name that no codec in this crate can produce.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported image format '{0}' (expected one of: jpeg, png, webp)")]
pub struct UnsupportedFormatError(pub String);

/// An output codec the estimator can be trained on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Jpeg,
    Png,
    Webp,
}

impl ImageFormat {
    /// Every supported format, in one-hot encoding order.
    pub const ALL: [ImageFormat; 3] = [ImageFormat::Jpeg, ImageFormat::Png, ImageFormat::Webp];

    /// Number of supported formats (width of the one-hot block).
    pub const COUNT: usize = Self::ALL.len();

    /// Position of this format in the one-hot block.
    pub fn index(self) -> usize {
        match self {
            ImageFormat::Jpeg => 0,
            ImageFormat::Png  => 1,
            ImageFormat::Webp => 2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpeg",
            ImageFormat::Png  => "png",
            ImageFormat::Webp => "webp",
        }
    }

    /// File extension used when encoded samples are written to disk.
    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Png  => "png",
            ImageFormat::Webp => "webp",
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ImageFormat {
    type Err = UnsupportedFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" => Ok(ImageFormat::Jpeg),
            "png"          => Ok(ImageFormat::Png),
            "webp"         => Ok(ImageFormat::Webp),
            _              => Err(UnsupportedFormatError(s.to_string())),
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_formats() {
        assert_eq!("jpeg".parse::<ImageFormat>().unwrap(), ImageFormat::Jpeg);
        assert_eq!("JPG".parse::<ImageFormat>().unwrap(),  ImageFormat::Jpeg);
        assert_eq!("webp".parse::<ImageFormat>().unwrap(), ImageFormat::Webp);
        assert_eq!(" png ".parse::<ImageFormat>().unwrap(), ImageFormat::Png);
    }

    #[test]
    fn test_parse_unknown_format_fails() {
        let err = "gif".parse::<ImageFormat>().unwrap_err();
        assert_eq!(err, UnsupportedFormatError("gif".to_string()));
    }

    #[test]
    fn test_indices_cover_one_hot_block() {
        let mut seen = [false; ImageFormat::COUNT];
        for f in ImageFormat::ALL {
            seen[f.index()] = true;
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn test_serde_uses_lowercase_names() {
        let json = serde_json::to_string(&ImageFormat::Webp).unwrap();
        assert_eq!(json, "\"webp\"");
        let back: ImageFormat = serde_json::from_str("\"jpeg\"").unwrap();
        assert_eq!(back, ImageFormat::Jpeg);
    }
}
