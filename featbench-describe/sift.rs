use std::f32::consts::TAU;

use featbench_core::{Descriptors, Image, Keypoint};
use crate::error::{DescribeError, DescribeResult};
use crate::sampling::{ensure_non_empty, gradient, map_keypoints};
use crate::DescribeKeypoints;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

const SPATIAL_BINS: usize = 4;
const ORIENTATION_BINS: usize = 8;
pub const SIFT_DESCRIPTOR_LEN: usize = SPATIAL_BINS * SPATIAL_BINS * ORIENTATION_BINS;

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SiftDescriptorParams {
    /// Spatial bin width as a fraction of the keypoint diameter
    pub bin_scale: f32,
    pub min_bin_width: f32,
    pub max_bin_width: f32,
    /// Histogram entries are clipped to this after the first normalisation
    pub clip: f32,
}

impl Default for SiftDescriptorParams {
    fn default() -> Self {
        Self {
            bin_scale: 0.25,
            min_bin_width: 3.0,
            max_bin_width: 8.0,
            clip: 0.2,
        }
    }
}

/// 4x4 grid of 8-bin gradient orientation histograms, rotated to the
/// keypoint angle, 128 floats of unit length
#[derive(Debug, Clone)]
pub struct SiftDescriptor {
    params: SiftDescriptorParams,
}

impl SiftDescriptor {
    pub fn new(params: SiftDescriptorParams) -> DescribeResult<Self> {
        if params.min_bin_width <= 0.0 || params.max_bin_width < params.min_bin_width {
            return Err(DescribeError::InvalidParameter {
                name: "min_bin_width",
                reason: "bin widths must be positive and ordered",
            });
        }
        if !(0.0..=1.0).contains(&params.clip) || params.clip == 0.0 {
            return Err(DescribeError::InvalidParameter {
                name: "clip",
                reason: "must be in (0, 1]",
            });
        }
        Ok(Self { params })
    }

    fn describe(&self, img: &Image, kp: &Keypoint) -> Vec<f32> {
        let bin_width = (kp.size * self.params.bin_scale).clamp(self.params.min_bin_width, self.params.max_bin_width);
        let (sin, cos) = kp.angle.sin_cos();
        let half_bins = SPATIAL_BINS as f32 / 2.0;
        let radius = (bin_width * std::f32::consts::SQRT_2 * (SPATIAL_BINS as f32 + 1.0) * 0.5).round() as i64;
        let weight_denom = 2.0 * half_bins * half_bins;
        let (cx, cy) = (kp.x.round() as i64, kp.y.round() as i64);

        let mut hist = vec![0.0f32; SIFT_DESCRIPTOR_LEN];
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                // Offset in the keypoint frame, in bins
                let rx = (cos * dx as f32 + sin * dy as f32) / bin_width;
                let ry = (-sin * dx as f32 + cos * dy as f32) / bin_width;
                let cbin = rx + half_bins - 0.5;
                let rbin = ry + half_bins - 0.5;
                if cbin <= -1.0 || rbin <= -1.0 || cbin >= SPATIAL_BINS as f32 || rbin >= SPATIAL_BINS as f32 {
                    continue;
                }

                let (gx, gy) = gradient(img, cx + dx, cy + dy);
                let magnitude = (gx * gx + gy * gy).sqrt();
                if magnitude == 0.0 {
                    continue;
                }
                let orientation = (gy.atan2(gx) - kp.angle).rem_euclid(TAU);
                let obin = orientation / TAU * ORIENTATION_BINS as f32;
                let weight = magnitude * (-(rx * rx + ry * ry) / weight_denom).exp();

                Self::accumulate(&mut hist, rbin, cbin, obin, weight);
            }
        }

        Self::normalize(&mut hist, self.params.clip);
        hist
    }

    /// Trilinear vote into the two nearest bins along each axis
    fn accumulate(hist: &mut [f32], rbin: f32, cbin: f32, obin: f32, weight: f32) {
        let (r0, c0, o0) = (rbin.floor(), cbin.floor(), obin.floor());
        let (dr, dc, dor) = (rbin - r0, cbin - c0, obin - o0);

        for (ri, rw) in [(r0 as i64, 1.0 - dr), (r0 as i64 + 1, dr)] {
            if ri < 0 || ri >= SPATIAL_BINS as i64 {
                continue;
            }
            for (ci, cw) in [(c0 as i64, 1.0 - dc), (c0 as i64 + 1, dc)] {
                if ci < 0 || ci >= SPATIAL_BINS as i64 {
                    continue;
                }
                for (oi, ow) in [(o0 as i64, 1.0 - dor), (o0 as i64 + 1, dor)] {
                    let oi = oi.rem_euclid(ORIENTATION_BINS as i64) as usize;
                    let idx = (ri as usize * SPATIAL_BINS + ci as usize) * ORIENTATION_BINS + oi;
                    hist[idx] += weight * rw * cw * ow;
                }
            }
        }
    }

    /// Unit length, clip, unit length again; an all-zero histogram stays zero
    fn normalize(hist: &mut [f32], clip: f32) {
        let norm = hist.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm == 0.0 {
            return;
        }
        hist.iter_mut().for_each(|v| *v = (*v / norm).min(clip));
        let norm = hist.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            hist.iter_mut().for_each(|v| *v /= norm);
        }
    }
}

impl DescribeKeypoints for SiftDescriptor {
    fn is_binary(&self) -> bool {
        false
    }

    fn size(&self) -> usize {
        SIFT_DESCRIPTOR_LEN
    }

    fn compute(&self, img: &Image, keypoints: &[Keypoint]) -> DescribeResult<Descriptors> {
        ensure_non_empty(img)?;
        Ok(Descriptors::Float(map_keypoints(keypoints, |kp| self.describe(img, kp))))
    }
}
