use featbench_core::{Descriptors, Image, Keypoint};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use crate::error::{DescribeError, DescribeResult};
use crate::sampling::{bilinear_sample, ensure_non_empty, map_keypoints, set_bit, smooth};
use crate::DescribeKeypoints;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Seed for the sampling pattern; both images of a pair must share it
pub const PATTERN_SEED: u64 = 0x0b51_ef00;

/// Point pairs compared by a binary intensity test, offsets from the keypoint
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryTestPattern {
    pairs: Vec<[(f32, f32); 2]>,
}

impl BinaryTestPattern {
    /// `n_bits` pairs drawn uniformly from a `patch_size` square
    pub fn random(n_bits: usize, patch_size: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let half = (patch_size / 2) as i32;
        let mut point = || (rng.random_range(-half..=half) as f32, rng.random_range(-half..=half) as f32);
        let pairs = (0..n_bits).map(|_| [point(), point()]).collect();
        Self { pairs }
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Run every test around `kp`, with the pattern rotated by `angle`
    /// radians and stretched by `scale`
    pub fn describe(&self, img: &Image, kp: &Keypoint, angle: f32, scale: f32) -> Vec<u8> {
        let (s, c) = angle.sin_cos();
        let (s, c) = (s * scale, c * scale);
        let mut bits = vec![0u8; self.pairs.len().div_ceil(8)];
        for (i, [(x1, y1), (x2, y2)]) in self.pairs.iter().enumerate() {
            let v1 = bilinear_sample(img, kp.x + c * x1 - s * y1, kp.y + s * x1 + c * y1);
            let v2 = bilinear_sample(img, kp.x + c * x2 - s * y2, kp.y + s * x2 + c * y2);
            if v1 < v2 {
                set_bit(&mut bits, i);
            }
        }
        bits
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct BriefParams {
    /// Descriptor length in bytes
    pub bytes: usize,
    pub patch_size: usize,
    /// Gaussian pre-smoothing
    pub smoothing_sigma: f32,
}

impl Default for BriefParams {
    fn default() -> Self {
        Self {
            bytes: 32,
            patch_size: 48,
            smoothing_sigma: 2.0,
        }
    }
}

/// Unsteered BRIEF: keypoint orientation is ignored
#[derive(Debug, Clone)]
pub struct BriefDescriptor {
    params: BriefParams,
    pattern: BinaryTestPattern,
}

impl BriefDescriptor {
    pub fn new(params: BriefParams) -> DescribeResult<Self> {
        if ![16, 32, 64].contains(&params.bytes) {
            return Err(DescribeError::InvalidParameter {
                name: "bytes",
                reason: "must be 16, 32 or 64",
            });
        }
        if params.patch_size < 8 {
            return Err(DescribeError::InvalidParameter {
                name: "patch_size",
                reason: "must be at least 8",
            });
        }
        let pattern = BinaryTestPattern::random(params.bytes * 8, params.patch_size, PATTERN_SEED);
        Ok(Self { params, pattern })
    }

    pub fn params(&self) -> &BriefParams {
        &self.params
    }
}

impl DescribeKeypoints for BriefDescriptor {
    fn is_binary(&self) -> bool {
        true
    }

    fn size(&self) -> usize {
        self.params.bytes
    }

    fn compute(&self, img: &Image, keypoints: &[Keypoint]) -> DescribeResult<Descriptors> {
        ensure_non_empty(img)?;
        let smoothed = smooth(img, self.params.smoothing_sigma);
        let rows = map_keypoints(keypoints, |kp| self.pattern.describe(&smoothed, kp, 0.0, 1.0));
        Ok(Descriptors::Binary(rows))
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct OrbDescriptorParams {
    /// Side of the sampling square at the keypoint's own scale
    pub patch_size: usize,
    pub smoothing_sigma: f32,
}

impl Default for OrbDescriptorParams {
    fn default() -> Self {
        Self {
            patch_size: 31,
            smoothing_sigma: 2.0,
        }
    }
}

/// Steered BRIEF: 256 tests rotated by the keypoint angle and scaled by its size
#[derive(Debug, Clone)]
pub struct OrbDescriptor {
    params: OrbDescriptorParams,
    pattern: BinaryTestPattern,
}

pub const ORB_DESCRIPTOR_BYTES: usize = 32;

impl OrbDescriptor {
    pub fn new(params: OrbDescriptorParams) -> DescribeResult<Self> {
        if params.patch_size < 8 {
            return Err(DescribeError::InvalidParameter {
                name: "patch_size",
                reason: "must be at least 8",
            });
        }
        let pattern = BinaryTestPattern::random(ORB_DESCRIPTOR_BYTES * 8, params.patch_size, PATTERN_SEED ^ 1);
        Ok(Self { params, pattern })
    }

    pub fn params(&self) -> &OrbDescriptorParams {
        &self.params
    }
}

impl DescribeKeypoints for OrbDescriptor {
    fn is_binary(&self) -> bool {
        true
    }

    fn size(&self) -> usize {
        ORB_DESCRIPTOR_BYTES
    }

    fn compute(&self, img: &Image, keypoints: &[Keypoint]) -> DescribeResult<Descriptors> {
        ensure_non_empty(img)?;
        let smoothed = smooth(img, self.params.smoothing_sigma);
        let patch = self.params.patch_size as f32;
        let rows = map_keypoints(keypoints, |kp| {
            let scale = if kp.size > 0.0 { kp.size / patch } else { 1.0 };
            self.pattern.describe(&smoothed, kp, kp.angle, scale)
        });
        Ok(Descriptors::Binary(rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    fn textured(size: u32) -> Image {
        GrayImage::from_fn(size, size, |x, y| Luma([((x * 37 + y * 91) % 251) as u8]))
    }

    #[test]
    fn test_pattern_is_deterministic() {
        let a = BinaryTestPattern::random(256, 31, 7);
        let b = BinaryTestPattern::random(256, 31, 7);
        assert_eq!(a, b);
        assert_eq!(a.len(), 256);
        assert_ne!(a, BinaryTestPattern::random(256, 31, 8));
    }

    #[test]
    fn test_brief_one_row_per_keypoint() {
        let brief = BriefDescriptor::new(BriefParams::default()).unwrap();
        let kps = vec![Keypoint::new(30.0, 30.0, 7.0), Keypoint::new(0.0, 0.0, 7.0)];
        let desc = brief.compute(&textured(64), &kps).unwrap();
        assert!(desc.is_binary());
        assert_eq!(desc.len(), 2);
        assert_eq!(desc.dim(), 32);
    }

    #[test]
    fn test_brief_ignores_angle() {
        let brief = BriefDescriptor::new(BriefParams::default()).unwrap();
        let img = textured(64);
        let a = brief.compute(&img, &[Keypoint::new(32.0, 32.0, 7.0)]).unwrap();
        let b = brief.compute(&img, &[Keypoint::new(32.0, 32.0, 7.0).with_angle(1.0)]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_brief_rejects_odd_length() {
        let params = BriefParams {
            bytes: 20,
            ..BriefParams::default()
        };
        assert!(BriefDescriptor::new(params).is_err());
    }

    #[test]
    fn test_orb_is_steered() {
        let orb = OrbDescriptor::new(OrbDescriptorParams::default()).unwrap();
        let img = textured(96);
        let a = orb.compute(&img, &[Keypoint::new(48.0, 48.0, 31.0)]).unwrap();
        let b = orb.compute(&img, &[Keypoint::new(48.0, 48.0, 31.0).with_angle(1.2)]).unwrap();
        assert_ne!(a, b);
        assert_eq!(a.dim(), ORB_DESCRIPTOR_BYTES);
    }

    #[test]
    fn test_empty_image_is_an_error() {
        let orb = OrbDescriptor::new(OrbDescriptorParams::default()).unwrap();
        let img = GrayImage::new(0, 0);
        assert!(matches!(orb.compute(&img, &[]), Err(DescribeError::EmptyImage { .. })));
    }
}
