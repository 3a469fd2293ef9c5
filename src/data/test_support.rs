//! In-memory corpora shared by the unit tests of the data and ml layers.

use image::{ImageError, Rgb, RgbImage};

use crate::domain::traits::ImageCorpus;

pub struct InMemoryCorpus {
    images: Vec<RgbImage>,
}

impl InMemoryCorpus {
    pub fn new(images: Vec<RgbImage>) -> Self {
        Self { images }
    }
}

impl ImageCorpus for InMemoryCorpus {
    fn len(&self) -> usize {
        self.images.len()
    }

    fn load_pixels(&self, index: usize) -> Result<RgbImage, ImageError> {
        Ok(self.images[index].clone())
    }
}

/// Corpus of `n` entries that all fail to load.
pub struct BrokenCorpus(pub usize);

impl ImageCorpus for BrokenCorpus {
    fn len(&self) -> usize {
        self.0
    }

    fn load_pixels(&self, index: usize) -> Result<RgbImage, ImageError> {
        Err(ImageError::IoError(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("image {index} is gone"),
        )))
    }
}

/// `n` distinct checkerboard-and-gradient images of `w`×`h`.
pub fn checker_corpus(n: usize, w: u32, h: u32) -> InMemoryCorpus {
    let images = (0..n as u32)
        .map(|i| {
            let cell = 2 + i * 3;
            RgbImage::from_fn(w, h, |x, y| {
                let on = ((x / cell) + (y / cell)) % 2 == 0;
                let base = if on { 200 } else { 30 };
                Rgb([base, (x * 255 / w.max(1)) as u8, ((y + i * 40) % 256) as u8])
            })
        })
        .collect();
    InMemoryCorpus::new(images)
}
