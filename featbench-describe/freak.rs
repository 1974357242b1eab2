use std::f32::consts::PI;

use featbench_core::{Descriptors, Image, Keypoint};
use crate::error::DescribeResult;
use crate::pattern::{all_pairs, gradient_orientation, ring, sample_points, PatternPoint};
use crate::sampling::{ensure_non_empty, integral, map_keypoints, set_bit, Integral};
use crate::DescribeKeypoints;

pub const FREAK_DESCRIPTOR_BYTES: usize = 64;

const POINTS_PER_RING: usize = 6;
/// Rings whose points vote for the orientation
const ORIENTATION_RINGS: usize = 3;

/// Ring radii as a fraction of the keypoint diameter, outermost first
fn ring_radii() -> [f32; 8] {
    let big = 2.0 / 3.0;
    let small = 2.0 / 24.0;
    let unit = (big - small) / 21.0;
    [big, big - 6.0 * unit, big - 11.0 * unit, big - 15.0 * unit, big - 18.0 * unit, big - 20.0 * unit, small, 0.0]
}

/// Retina-like pattern: 43 points on rings that get denser and sharper
/// towards the centre; the 512 widest pairs produce the bits
#[derive(Debug, Clone)]
pub struct FreakDescriptor {
    points: Vec<PatternPoint>,
    pairs: Vec<(usize, usize)>,
    orientation_pairs: Vec<(usize, usize)>,
}

impl Default for FreakDescriptor {
    fn default() -> Self {
        Self::new()
    }
}

impl FreakDescriptor {
    pub fn new() -> Self {
        let radii = ring_radii();
        let mut points: Vec<PatternPoint> = radii[..7]
            .iter()
            .enumerate()
            .flat_map(|(i, &r)| {
                let phase = if i % 2 == 1 { PI / POINTS_PER_RING as f32 } else { 0.0 };
                ring(r, POINTS_PER_RING, phase, r / 2.0)
            })
            .collect();
        points.push(PatternPoint {
            x: 0.0,
            y: 0.0,
            sigma: radii[6] / 2.0,
        });

        let mut candidates = all_pairs(&points);
        // Coarse-to-fine: widest pairs first, stable on ties
        candidates.sort_by(|a, b| b.2.total_cmp(&a.2));
        let pairs = candidates
            .iter()
            .take(FREAK_DESCRIPTOR_BYTES * 8)
            .map(|&(i, j, _)| (i, j))
            .collect();

        let outer = ORIENTATION_RINGS * POINTS_PER_RING;
        let orientation_pairs = all_pairs(&points[..outer]).into_iter().map(|(i, j, _)| (i, j)).collect();

        Self {
            points,
            pairs,
            orientation_pairs,
        }
    }

    fn describe(&self, img: &Image, integral: &Integral, kp: &Keypoint) -> Vec<u8> {
        let scale = kp.size.max(1.0);
        let upright = sample_points(img, integral, &self.points, kp.pt(), scale, 0.0);
        let angle = gradient_orientation(&self.points, &upright, &self.orientation_pairs);
        let rotated = sample_points(img, integral, &self.points, kp.pt(), scale, angle);

        let mut bits = vec![0u8; FREAK_DESCRIPTOR_BYTES];
        for (bit, &(i, j)) in self.pairs.iter().enumerate() {
            if rotated[i] > rotated[j] {
                set_bit(&mut bits, bit);
            }
        }
        bits
    }
}

impl DescribeKeypoints for FreakDescriptor {
    fn is_binary(&self) -> bool {
        true
    }

    fn size(&self) -> usize {
        FREAK_DESCRIPTOR_BYTES
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
        let freak = FreakDescriptor::new();
        assert_eq!(freak.points.len(), 43);
        assert_eq!(freak.pairs.len(), 512);
        assert_eq!(freak.orientation_pairs.len(), 18 * 17 / 2);
    }

    #[test]
    fn test_descriptor_shape() {
        let img = GrayImage::from_fn(80, 80, |x, y| Luma([((x * 29 + y * 3) % 200) as u8]));
        let kps = vec![Keypoint::new(40.0, 40.0, 22.0)];
        let desc = FreakDescriptor::new().compute(&img, &kps).unwrap();
        assert_eq!(desc.len(), 1);
        assert_eq!(desc.dim(), FREAK_DESCRIPTOR_BYTES);
    }

    #[test]
    fn test_orientation_is_estimated_not_read() {
        let img = GrayImage::from_fn(81, 81, |x, y| Luma([((x * 7 + y * y) % 230) as u8]));
        let freak = FreakDescriptor::new();
        let a = freak.compute(&img, &[Keypoint::new(40.0, 40.0, 22.0)]).unwrap();
        let b = freak.compute(&img, &[Keypoint::new(40.0, 40.0, 22.0).with_angle(0.7)]).unwrap();
        assert_eq!(a, b);
    }
}
