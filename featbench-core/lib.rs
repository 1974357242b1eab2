//! Data model shared by every stage of the featbench pipeline.
//!
//! Images are 8-bit grayscale rasters. A detector turns an image into
//! [`Keypoint`]s, a descriptor strategy turns those keypoints into
//! [`Descriptors`], and [`Features`] keeps the two index-aligned so matching
//! and estimation can dereference indices safely.

use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Row-major 8-bit grayscale image
pub type Image = image::GrayImage;

/// Localized feature point with the metadata detectors attach to it.
///
/// Only `x`/`y` are consulted by the pipeline; the rest is passed through
/// untouched from detector to descriptor.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    /// Diameter of the meaningful neighbourhood in pixels
    pub size: f32,
    /// Orientation in radians, 0 when the detector does not estimate one
    pub angle: f32,
    pub response: f32,
    pub octave: u8,
}

impl Keypoint {
    pub fn new(x: f32, y: f32, size: f32) -> Self {
        Self {
            x,
            y,
            size,
            angle: 0.0,
            response: 0.0,
            octave: 0,
        }
    }

    pub fn with_angle(mut self, angle: f32) -> Self {
        self.angle = angle;
        self
    }

    pub fn with_response(mut self, response: f32) -> Self {
        self.response = response;
        self
    }

    pub fn with_octave(mut self, octave: u8) -> Self {
        self.octave = octave;
        self
    }

    /// Image position as a tuple
    pub fn pt(&self) -> (f32, f32) {
        (self.x, self.y)
    }
}

/// Descriptor matrix, one row per keypoint.
///
/// Binary rows are compared with Hamming distance, float rows with L2.
#[derive(Debug, Clone, PartialEq)]
pub enum Descriptors {
    Binary(Vec<Vec<u8>>),
    Float(Vec<Vec<f32>>),
}

impl Descriptors {
    pub fn len(&self) -> usize {
        match self {
            Descriptors::Binary(rows) => rows.len(),
            Descriptors::Float(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_binary(&self) -> bool {
        matches!(self, Descriptors::Binary(_))
    }

    /// Row length in elements (bytes for binary, floats otherwise)
    pub fn dim(&self) -> usize {
        match self {
            Descriptors::Binary(rows) => rows.first().map_or(0, Vec::len),
            Descriptors::Float(rows) => rows.first().map_or(0, Vec::len),
        }
    }

    pub fn truncate(&mut self, len: usize) {
        match self {
            Descriptors::Binary(rows) => rows.truncate(len),
            Descriptors::Float(rows) => rows.truncate(len),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeatureError {
    #[error("{keypoints} keypoints but {descriptors} descriptors")]
    MisalignedLengths { keypoints: usize, descriptors: usize },
    #[error("descriptor rows have inconsistent length: expected {expected}, found {found}")]
    RaggedDescriptors { expected: usize, found: usize },
}

pub type FeatureResult<T> = Result<T, FeatureError>;

/// Keypoints and their descriptors, index-aligned.
#[derive(Debug, Clone, PartialEq)]
pub struct Features {
    keypoints: Vec<Keypoint>,
    descriptors: Descriptors,
}

impl Features {
    /// Pair keypoints with descriptors; lengths must agree and rows must be uniform.
    pub fn new(keypoints: Vec<Keypoint>, descriptors: Descriptors) -> FeatureResult<Self> {
        if keypoints.len() != descriptors.len() {
            return Err(FeatureError::MisalignedLengths {
                keypoints: keypoints.len(),
                descriptors: descriptors.len(),
            });
        }

        let expected = descriptors.dim();
        let ragged = match &descriptors {
            Descriptors::Binary(rows) => rows.iter().map(Vec::len).find(|&n| n != expected),
            Descriptors::Float(rows) => rows.iter().map(Vec::len).find(|&n| n != expected),
        };
        if let Some(found) = ragged {
            return Err(FeatureError::RaggedDescriptors { expected, found });
        }

        Ok(Self {
            keypoints,
            descriptors,
        })
    }

    pub fn keypoints(&self) -> &[Keypoint] {
        &self.keypoints
    }

    pub fn descriptors(&self) -> &Descriptors {
        &self.descriptors
    }

    pub fn len(&self) -> usize {
        self.keypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keypoints.is_empty()
    }

    pub fn is_binary(&self) -> bool {
        self.descriptors.is_binary()
    }

    /// Keep the first `cap` entries of both collections
    pub fn truncate(&mut self, cap: usize) {
        self.keypoints.truncate(cap);
        self.descriptors.truncate(cap);
    }

    pub fn into_parts(self) -> (Vec<Keypoint>, Descriptors) {
        (self.keypoints, self.descriptors)
    }
}

/// One nearest-neighbour hit from the matching stage.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Candidate {
    pub query_idx: usize,
    pub train_idx: usize,
    /// Hamming or L2 distance, never negative
    pub distance: f32,
    /// Set when the neighbour was synthesised by the single-match fallback
    pub synthetic: bool,
}

impl Candidate {
    pub fn new(query_idx: usize, train_idx: usize, distance: f32) -> Self {
        Self {
            query_idx,
            train_idx,
            distance,
            synthetic: false,
        }
    }
}

/// Initialize Rayon thread pool with the specified number of threads
#[cfg(feature = "parallel")]
pub fn init_thread_pool(n_threads: usize) -> Result<(), rayon::ThreadPoolBuildError> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(n_threads)
        .build_global()
}

/// Number of worker threads to use when none is configured
#[cfg(feature = "parallel")]
pub fn default_threads() -> usize {
    num_cpus::get().max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn keypoints(n: usize) -> Vec<Keypoint> {
        (0..n).map(|i| Keypoint::new(i as f32, 0.0, 7.0)).collect()
    }

    #[test]
    fn test_misaligned_lengths_rejected() {
        let result = Features::new(keypoints(3), Descriptors::Float(vec![vec![0.0; 4]; 2]));
        assert_eq!(
            result,
            Err(FeatureError::MisalignedLengths {
                keypoints: 3,
                descriptors: 2
            })
        );
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let rows = vec![vec![0u8; 32], vec![0u8; 16]];
        let result = Features::new(keypoints(2), Descriptors::Binary(rows));
        assert!(matches!(result, Err(FeatureError::RaggedDescriptors { expected: 32, found: 16 })));
    }

    #[test]
    fn test_descriptor_kind() {
        let binary = Descriptors::Binary(vec![vec![0u8; 32]]);
        let float = Descriptors::Float(vec![vec![0.0f32; 128]]);
        assert!(binary.is_binary());
        assert!(!float.is_binary());
        assert_eq!(binary.dim(), 32);
        assert_eq!(float.dim(), 128);
        assert_eq!(Descriptors::Float(Vec::new()).dim(), 0);
    }

    #[test]
    fn test_truncate_keeps_prefix() {
        let rows = (0..5).map(|i| vec![i as u8; 8]).collect();
        let mut features = Features::new(keypoints(5), Descriptors::Binary(rows)).unwrap();
        features.truncate(2);
        assert_eq!(features.keypoints()[1].x, 1.0);
        match features.descriptors() {
            Descriptors::Binary(rows) => assert_eq!(rows[1][0], 1),
            Descriptors::Float(_) => panic!("expected binary rows"),
        }
    }

    proptest! {
        #[test]
        fn truncation_keeps_collections_aligned(len in 0usize..64, cap in 0usize..80) {
            let rows = vec![vec![0.5f32; 16]; len];
            let mut features = Features::new(keypoints(len), Descriptors::Float(rows)).unwrap();
            features.truncate(cap);
            prop_assert_eq!(features.keypoints().len(), len.min(cap));
            prop_assert_eq!(features.descriptors().len(), len.min(cap));
        }
    }
}
