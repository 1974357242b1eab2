use featbench_core::{Descriptors, Image, Keypoint};
use crate::error::DescribeResult;
use crate::pattern::{all_pairs, gradient_orientation, ring, sample_points, PatternPoint};
use crate::sampling::{ensure_non_empty, integral, map_keypoints, set_bit, Integral};
use crate::DescribeKeypoints;

pub const BRISK_DESCRIPTOR_BYTES: usize = 64;

/// Keypoint diameter the unit pattern is laid out for
const BASIC_SIZE: f32 = 12.0;
const RADIUS_SCALE: f32 = 0.85;
const RING_RADII: [f32; 5] = [0.0, 2.9, 4.9, 7.4, 10.8];
const RING_COUNTS: [usize; 5] = [1, 10, 14, 15, 20];
/// Pairs closer than this are compared
const SHORT_PAIR_MAX: f32 = 5.85;
/// Pairs farther than this vote for the orientation
const LONG_PAIR_MIN: f32 = 8.2;

/// 60-point concentric pattern: long pairs estimate orientation, 512 short
/// pairs produce the bits
#[derive(Debug, Clone)]
pub struct BriskDescriptor {
    points: Vec<PatternPoint>,
    short_pairs: Vec<(usize, usize)>,
    long_pairs: Vec<(usize, usize)>,
}

impl Default for BriskDescriptor {
    fn default() -> Self {
        Self::new()
    }
}

impl BriskDescriptor {
    pub fn new() -> Self {
        let points: Vec<PatternPoint> = RING_RADII
            .iter()
            .zip(RING_COUNTS)
            .flat_map(|(&r, n)| {
                let radius = r * RADIUS_SCALE;
                let sigma = if n == 1 { 0.5 } else { std::f32::consts::PI * radius / (2.0 * n as f32) };
                ring(radius, n, 0.0, sigma)
            })
            .collect();

        let mut short_pairs = Vec::new();
        let mut long_pairs = Vec::new();
        for (i, j, d) in all_pairs(&points) {
            if d < SHORT_PAIR_MAX && short_pairs.len() < BRISK_DESCRIPTOR_BYTES * 8 {
                short_pairs.push((i, j));
            } else if d > LONG_PAIR_MIN {
                long_pairs.push((i, j));
            }
        }

        Self {
            points,
            short_pairs,
            long_pairs,
        }
    }

    fn describe(&self, img: &Image, integral: &Integral, kp: &Keypoint) -> Vec<u8> {
        let scale = if kp.size > 0.0 { kp.size / BASIC_SIZE } else { 1.0 };
        let upright = sample_points(img, integral, &self.points, kp.pt(), scale, 0.0);
        let angle = gradient_orientation(&self.points, &upright, &self.long_pairs);
        let rotated = sample_points(img, integral, &self.points, kp.pt(), scale, angle);

        let mut bits = vec![0u8; BRISK_DESCRIPTOR_BYTES];
        for (bit, &(i, j)) in self.short_pairs.iter().enumerate() {
            if rotated[i] > rotated[j] {
                set_bit(&mut bits, bit);
            }
        }
        bits
    }
}

impl DescribeKeypoints for BriskDescriptor {
    fn is_binary(&self) -> bool {
        true
    }

    fn size(&self) -> usize {
        BRISK_DESCRIPTOR_BYTES
    }

    fn compute(&self, img: &Image, keypoints: &[Keypoint]) -> DescribeResult<Descriptors> {
        ensure_non_empty(img)?;
        let integral = integral(img);
        let rows = map_keypoints(keypoints, |kp| self.describe(img, &integral, kp));
        Ok(Descriptors::Binary(rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    #[test]
    fn test_pattern_layout() {
        let brisk = BriskDescriptor::new();
        assert_eq!(brisk.points.len(), 60);
        assert_eq!(brisk.short_pairs.len(), 512);
        assert!(!brisk.long_pairs.is_empty());
    }

    #[test]
    fn test_descriptor_shape() {
        let img = GrayImage::from_fn(64, 64, |x, y| Luma([((x * 13) ^ (y * 7)) as u8]));
        let kps = vec![Keypoint::new(32.0, 32.0, 12.0), Keypoint::new(2.0, 60.0, 24.0)];
        let desc = BriskDescriptor::new().compute(&img, &kps).unwrap();
        assert!(desc.is_binary());
        assert_eq!(desc.len(), 2);
        assert_eq!(desc.dim(), BRISK_DESCRIPTOR_BYTES);
    }

    #[test]
    fn test_flat_patch_gives_zero_bits() {
        let img = GrayImage::from_pixel(64, 64, Luma([77]));
        let desc = BriskDescriptor::new().compute(&img, &[Keypoint::new(32.0, 32.0, 12.0)]).unwrap();
        match desc {
            Descriptors::Binary(rows) => assert!(rows[0].iter().all(|&b| b == 0)),
            Descriptors::Float(_) => panic!("expected binary rows"),
        }
    }
}
