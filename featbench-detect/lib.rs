//! Keypoint detectors for the featbench pipeline.
//!
//! Every detector implements [`DetectKeypoints`] and reports keypoints in
//! original image coordinates. Detectors never fail on featureless input;
//! they return an empty list instead.

mod error;
mod filters;
mod types;

pub mod brisk;
pub mod dog;
pub mod fast;
pub mod hessian;
pub mod orb;
pub mod pyramid;
pub mod refinement;
pub mod utils;

pub use brisk::{BriskDetector, BriskParams};
pub use dog::{DogDetector, SiftParams};
pub use error::{DetectError, DetectResult};
pub use fast::{FastDetector, FastParams, FAST_KEYPOINT_SIZE};
pub use hessian::{HessianDetector, SurfParams};
pub use orb::{OrbDetector, OrbParams};
pub use types::{ScaleLevel, ScoredKeypoint};

use featbench_core::{Image, Keypoint};

/// A strategy that locates keypoints in a grayscale image
pub trait DetectKeypoints {
    fn detect(&self, img: &Image) -> DetectResult<Vec<Keypoint>>;
}
