use std::path::{Path, PathBuf};

use featbench_core::Image;
use image::imageops::{self, FilterType};
use tracing::debug;
use crate::error::{BenchError, BenchResult};

/// Longest side kept by [`FileImageSource`] by default
pub const DEFAULT_MAX_SIDE: u32 = 800;

/// The two benchmark images: the query object and the reference scene
#[derive(Debug, Clone)]
pub struct ImagePair {
    pub query: Image,
    pub reference: Image,
}

impl ImagePair {
    pub fn new(query: Image, reference: Image) -> Self {
        Self { query, reference }
    }

    /// Either image having no pixels ends the run
    pub fn validate(&self) -> BenchResult<()> {
        for (which, img) in [("query", &self.query), ("reference", &self.reference)] {
            if img.width() == 0 || img.height() == 0 {
                return Err(BenchError::EmptyImage { which });
            }
        }
        Ok(())
    }
}

pub trait ImageSource {
    fn load(&self) -> BenchResult<ImagePair>;
}

/// Decodes both images from disk as 8-bit grayscale
#[derive(Debug, Clone)]
pub struct FileImageSource {
    query: PathBuf,
    reference: PathBuf,
    max_side: u32,
}

impl FileImageSource {
    pub fn new(query: impl Into<PathBuf>, reference: impl Into<PathBuf>) -> Self {
        Self {
            query: query.into(),
            reference: reference.into(),
            max_side: DEFAULT_MAX_SIDE,
        }
    }

    /// Images larger than `max_side` on either side are downsized; 0 disables
    pub fn with_max_side(mut self, max_side: u32) -> Self {
        self.max_side = max_side;
        self
    }

    fn decode(&self, path: &Path) -> BenchResult<Image> {
        let img = image::open(path)
            .map_err(|source| BenchError::Decode {
                path: path.to_path_buf(),
                source,
            })?
            .to_luma8();
        debug!(path = %path.display(), width = img.width(), height = img.height(), "decoded");
        Ok(limit_size(img, self.max_side))
    }
}

impl ImageSource for FileImageSource {
    fn load(&self) -> BenchResult<ImagePair> {
        Ok(ImagePair::new(self.decode(&self.query)?, self.decode(&self.reference)?))
    }
}

/// Hands out copies of images already in memory
#[derive(Debug, Clone)]
pub struct InMemorySource {
    pair: ImagePair,
}

impl InMemorySource {
    pub fn new(query: Image, reference: Image) -> Self {
        Self {
            pair: ImagePair::new(query, reference),
        }
    }
}

impl ImageSource for InMemorySource {
    fn load(&self) -> BenchResult<ImagePair> {
        Ok(self.pair.clone())
    }
}

/// Downsizes `img` so neither side exceeds `max_side`, keeping the aspect ratio
pub fn limit_size(img: Image, max_side: u32) -> Image {
    let (w, h) = img.dimensions();
    if max_side == 0 || (w <= max_side && h <= max_side) {
        return img;
    }
    let scale = (max_side as f64 / w as f64).min(max_side as f64 / h as f64);
    let nw = ((w as f64 * scale).round() as u32).clamp(1, max_side);
    let nh = ((h as f64 * scale).round() as u32).clamp(1, max_side);
    imageops::resize(&img, nw, nh, FilterType::Triangle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::GrayImage;

    #[test]
    fn test_limit_size_keeps_aspect() {
        let small = limit_size(GrayImage::new(1600, 1200), 800);
        assert_eq!(small.dimensions(), (800, 600));
        let tall = limit_size(GrayImage::new(300, 1000), 800);
        assert_eq!(tall.dimensions(), (240, 800));
    }

    #[test]
    fn test_limit_size_leaves_small_images() {
        assert_eq!(limit_size(GrayImage::new(640, 480), 800).dimensions(), (640, 480));
        assert_eq!(limit_size(GrayImage::new(4000, 10), 0).dimensions(), (4000, 10));
    }

    #[test]
    fn test_empty_image_is_fatal() {
        let pair = ImagePair::new(GrayImage::new(10, 10), GrayImage::new(0, 0));
        assert!(matches!(pair.validate(), Err(BenchError::EmptyImage { which: "reference" })));
    }

    #[test]
    fn test_missing_file_reports_path() {
        let source = FileImageSource::new("/nonexistent/query.png", "/nonexistent/ref.png");
        match source.load() {
            Err(BenchError::Decode { path, .. }) => assert!(path.ends_with("query.png")),
            other => panic!("expected decode error, got {other:?}"),
        }
    }
}
