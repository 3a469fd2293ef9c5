// ============================================================
// Layer 4 — Image Set Loader
// ============================================================
// Reads an ImageSet JSON file wholesale and serves its images to
// the sample generator. Image paths inside the file are relative
// to the file's own directory:
//
//   datasets/dataset_20250101_120000/
//     dataset.json          ← { "images": [...], "metadata": {...} }
//     images/image_0000.png ← "image_path": "images/image_0000.png"
//
// A bare dataset name (no extension, no separators) is looked up
// as <datasets_dir>/<name>.json.

use std::{
    fs,
    path::{Path, PathBuf},
};

use image::{ImageError, RgbImage};
use thiserror::Error;

use crate::domain::{image_set::ImageSet, traits::ImageCorpus};

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("cannot read dataset file '{path}'")]
    Io {
        path:   PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("'{path}' is not a valid image set (expected {{\"images\": [...], \"metadata\": {{...}}}})")]
    Parse {
        path:   PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("dataset '{0}' contains no images")]
    Empty(PathBuf),
}

/// Resolve a dataset identifier to a JSON file path.
pub fn resolve_dataset_path(identifier: &str, datasets_dir: &Path) -> PathBuf {
    let as_path = Path::new(identifier);
    let is_bare_name = as_path.extension().is_none() && as_path.components().count() == 1;
    if is_bare_name {
        datasets_dir.join(format!("{identifier}.json"))
    } else {
        as_path.to_path_buf()
    }
}

/// An image set loaded from disk, with its base directory.
#[derive(Debug, Clone)]
pub struct ImageDataset {
    root: PathBuf,
    set:  ImageSet,
}

impl ImageDataset {
    /// Load and validate the dataset file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DatasetError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .map_err(|source| DatasetError::Io { path: path.to_path_buf(), source })?;
        let set: ImageSet = serde_json::from_str(&json)
            .map_err(|source| DatasetError::Parse { path: path.to_path_buf(), source })?;
        if set.is_empty() {
            return Err(DatasetError::Empty(path.to_path_buf()));
        }

        let root = path.parent().map(Path::to_path_buf).unwrap_or_default();
        tracing::info!("Loaded dataset '{}' with {} images", path.display(), set.len());
        Ok(Self { root, set })
    }

    pub fn image_set(&self) -> &ImageSet {
        &self.set
    }

    /// Absolute (or root-relative) path of image `index`.
    pub fn image_path(&self, index: usize) -> Option<PathBuf> {
        self.set.images.get(index).map(|r| self.root.join(&r.image_path))
    }
}

impl ImageCorpus for ImageDataset {
    fn len(&self) -> usize {
        self.set.len()
    }

    fn load_pixels(&self, index: usize) -> Result<RgbImage, ImageError> {
        let path = self.image_path(index).ok_or_else(|| {
            ImageError::IoError(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no image record at index {index}"),
            ))
        })?;
        Ok(image::open(&path)?.to_rgb8())
    }

    fn describe(&self, index: usize) -> String {
        self.set
            .images
            .get(index)
            .map(|r| r.label())
            .unwrap_or_else(|| format!("image #{index}"))
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::image_set::ImageRecord;
    use image::Rgb;

    #[test]
    fn test_bare_names_resolve_into_datasets_dir() {
        let dir = Path::new("image_datasets");
        assert_eq!(resolve_dataset_path("faces", dir), dir.join("faces.json"));
        assert_eq!(
            resolve_dataset_path("other/dataset.json", dir),
            PathBuf::from("other/dataset.json")
        );
    }

    #[test]
    fn test_open_resolves_paths_relative_to_file() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("images")).unwrap();
        RgbImage::from_pixel(20, 10, Rgb([1, 2, 3]))
            .save(tmp.path().join("images/image_0000.png"))
            .unwrap();

        let mut set = ImageSet::default();
        set.images.push(ImageRecord::new("p", "b", "images/image_0000.png", 3));
        let file = tmp.path().join("dataset.json");
        fs::write(&file, serde_json::to_string(&set).unwrap()).unwrap();

        let ds = ImageDataset::open(&file).unwrap();
        assert_eq!(ds.len(), 1);
        let px = ds.load_pixels(0).unwrap();
        assert_eq!(px.dimensions(), (20, 10));
        assert!(ds.load_pixels(1).is_err());
    }

    #[test]
    fn test_empty_and_malformed_sets_are_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let empty = tmp.path().join("empty.json");
        fs::write(&empty, r#"{"images": [], "metadata": {}}"#).unwrap();
        assert!(matches!(ImageDataset::open(&empty), Err(DatasetError::Empty(_))));

        let bad = tmp.path().join("bad.json");
        fs::write(&bad, r#"{"images": "nope"}"#).unwrap();
        assert!(matches!(ImageDataset::open(&bad), Err(DatasetError::Parse { .. })));

        assert!(matches!(
            ImageDataset::open(tmp.path().join("missing.json")),
            Err(DatasetError::Io { .. })
        ));
    }
}
