//! Keypoint descriptors for the featbench pipeline.
//!
//! Binary descriptors (BRIEF, ORB, BRISK, FREAK) produce packed bit strings
//! compared with Hamming distance; SIFT and SURF produce unit-length float
//! vectors compared with L2. Every implementation returns exactly one row per
//! input keypoint, in input order.

mod error;
mod pattern;

pub mod brief;
pub mod brisk;
pub mod freak;
pub mod sampling;
pub mod sift;
pub mod surf;

pub use brief::{BinaryTestPattern, BriefDescriptor, BriefParams, OrbDescriptor, OrbDescriptorParams};
pub use brisk::BriskDescriptor;
pub use error::{DescribeError, DescribeResult};
pub use freak::FreakDescriptor;
pub use sift::{SiftDescriptor, SiftDescriptorParams};
pub use surf::SurfDescriptor;

use featbench_core::{Descriptors, Image, Keypoint};

/// A strategy that computes a descriptor row for every keypoint
pub trait DescribeKeypoints {
    /// Whether rows are packed bits (Hamming) rather than floats (L2)
    fn is_binary(&self) -> bool;

    /// Row length: bytes for binary descriptors, floats otherwise
    fn size(&self) -> usize;

    fn compute(&self, img: &Image, keypoints: &[Keypoint]) -> DescribeResult<Descriptors>;
}
