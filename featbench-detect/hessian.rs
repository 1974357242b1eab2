use std::collections::HashSet;

use featbench_core::{Image, Keypoint};
use image::{ImageBuffer, Luma};
use imageproc::integral_image::integral_image;
use crate::error::{DetectError, DetectResult};
use crate::refinement::KeypointRefinement;
use crate::DetectKeypoints;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

type Integral = ImageBuffer<Luma<u32>, Vec<u32>>;

/// Weight of the mixed derivative in the determinant approximation
const DXY_WEIGHT: f32 = 0.9;

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SurfParams {
    /// Minimum determinant of the approximated Hessian
    pub hessian_threshold: f32,
    pub n_octaves: usize,
    pub n_octave_layers: usize,
    /// 128-element descriptors instead of 64; read by the descriptor side
    pub extended: bool,
    /// Skip orientation assignment
    pub upright: bool,
}

impl Default for SurfParams {
    fn default() -> Self {
        Self {
            hessian_threshold: 100.0,
            n_octaves: 3,
            n_octave_layers: 3,
            extended: false,
            upright: false,
        }
    }
}

/// Determinant-of-Hessian blob detector on box filters over an integral image
#[derive(Debug, Clone)]
pub struct HessianDetector {
    params: SurfParams,
}

/// Determinant responses of one filter size, sampled every `step` pixels
struct ResponseLayer {
    size: u32,
    step: u32,
    cols: u32,
    rows: u32,
    det: Vec<f32>,
}

impl ResponseLayer {
    #[inline]
    fn at(&self, c: u32, r: u32) -> f32 {
        self.det[(r * self.cols + c) as usize]
    }
}

impl HessianDetector {
    pub fn new(params: SurfParams) -> DetectResult<Self> {
        if params.n_octaves == 0 || params.n_octave_layers == 0 {
            return Err(DetectError::InvalidParameter {
                name: "n_octaves",
                reason: "octaves and layers must be positive",
            });
        }
        if params.hessian_threshold < 0.0 {
            return Err(DetectError::InvalidParameter {
                name: "hessian_threshold",
                reason: "must be non-negative",
            });
        }
        Ok(Self { params })
    }

    pub fn params(&self) -> &SurfParams {
        &self.params
    }

    /// Box filter side for `layer` of `octave`: 9, 15, 21, ... at octave 0
    pub fn filter_size(octave: usize, layer: usize) -> u32 {
        3 * ((2u32 << octave) * (layer as u32 + 1) + 1)
    }

    /// Sum over `[x0, x1) x [y0, y1)`, clipped to the image
    fn box_sum(integral: &Integral, x0: i64, y0: i64, x1: i64, y1: i64) -> i64 {
        let w = integral.width() as i64 - 1;
        let h = integral.height() as i64 - 1;
        let (x0, x1) = (x0.clamp(0, w), x1.clamp(0, w));
        let (y0, y1) = (y0.clamp(0, h), y1.clamp(0, h));
        if x1 <= x0 || y1 <= y0 {
            return 0;
        }
        let at = |x: i64, y: i64| integral.get_pixel(x as u32, y as u32)[0] as i64;
        at(x1, y1) - at(x0, y1) - at(x1, y0) + at(x0, y0)
    }

    /// Area-normalised determinant at `(x, y)` for filter side `size`
    fn hessian_det(integral: &Integral, x: i64, y: i64, size: u32) -> f32 {
        let lobe = (size / 3) as i64;
        let half = (size as i64 - 1) / 2;
        let mid = lobe / 2;

        let dyy = Self::box_sum(integral, x - lobe + 1, y - half, x + lobe, y + half + 1)
            - 3 * Self::box_sum(integral, x - lobe + 1, y - mid, x + lobe, y + mid + 1);
        let dxx = Self::box_sum(integral, x - half, y - lobe + 1, x + half + 1, y + lobe)
            - 3 * Self::box_sum(integral, x - mid, y - lobe + 1, x + mid + 1, y + lobe);
        let dxy = Self::box_sum(integral, x + 1, y - lobe, x + lobe + 1, y)
            + Self::box_sum(integral, x - lobe, y + 1, x, y + lobe + 1)
            - Self::box_sum(integral, x - lobe, y - lobe, x, y)
            - Self::box_sum(integral, x + 1, y + 1, x + lobe + 1, y + lobe + 1);

        let norm = 1.0 / (size * size) as f32;
        let (dxx, dyy, dxy) = (dxx as f32 * norm, dyy as f32 * norm, dxy as f32 * norm);
        dxx * dyy - (DXY_WEIGHT * dxy).powi(2)
    }

    fn build_layer(integral: &Integral, size: u32, step: u32, width: u32, height: u32) -> ResponseLayer {
        let cols = width / step;
        let rows = height / step;
        let mut det = Vec::with_capacity((cols * rows) as usize);
        for r in 0..rows {
            for c in 0..cols {
                det.push(Self::hessian_det(integral, (c * step) as i64, (r * step) as i64, size));
            }
        }
        ResponseLayer { size, step, cols, rows, det }
    }

    /// Strict maximum of its 3x3x3 neighbourhood on the shared sampling grid
    fn is_local_max(layers: &[ResponseLayer], idx: usize, c: u32, r: u32, value: f32) -> bool {
        for (offset, layer) in layers[idx - 1..=idx + 1].iter().enumerate() {
            for dr in -1i64..=1 {
                for dc in -1i64..=1 {
                    if offset == 1 && dr == 0 && dc == 0 {
                        continue;
                    }
                    let (cc, rr) = (c as i64 + dc, r as i64 + dr);
                    if cc < 0 || rr < 0 || cc >= layer.cols as i64 || rr >= layer.rows as i64 {
                        continue;
                    }
                    if layer.at(cc as u32, rr as u32) >= value {
                        return false;
                    }
                }
            }
        }
        true
    }
}

impl DetectKeypoints for HessianDetector {
    fn detect(&self, img: &Image) -> DetectResult<Vec<Keypoint>> {
        let (w, h) = img.dimensions();
        let integral: Integral = integral_image::<_, u32>(img);
        let n_sizes = self.params.n_octave_layers + 2;

        let mut keypoints = Vec::new();
        // Filter sizes repeat across octaves; a sample shared by two octaves is emitted once
        let mut seen: HashSet<(u32, u32, u32)> = HashSet::new();
        for octave in 0..self.params.n_octaves {
            let step = 1u32 << octave;
            let largest = Self::filter_size(octave, n_sizes - 1);
            if largest >= w.min(h) {
                break;
            }
            let layers: Vec<ResponseLayer> = (0..n_sizes)
                .map(|layer| Self::build_layer(&integral, Self::filter_size(octave, layer), step, w, h))
                .collect();

            for idx in 1..=self.params.n_octave_layers {
                let layer = &layers[idx];
                // Keep the next larger filter inside the image
                let margin = layers[idx + 1].size / 2 + 1;
                for r in 0..layer.rows {
                    for c in 0..layer.cols {
                        let (x, y) = (c * layer.step, r * layer.step);
                        if x < margin || y < margin || x + margin >= w || y + margin >= h {
                            continue;
                        }
                        let value = layer.at(c, r);
                        if value <= self.params.hessian_threshold || !Self::is_local_max(&layers, idx, c, r, value) {
                            continue;
                        }
                        if !seen.insert((x, y, layer.size)) {
                            continue;
                        }

                        let scale = 1.2 * layer.size as f32 / 9.0;
                        let angle = if self.params.upright {
                            0.0
                        } else {
                            let patch = (12.0 * scale).round() as usize | 1;
                            KeypointRefinement::compute_orientation(img, x as f32, y as f32, patch)
                        };
                        keypoints.push(
                            Keypoint::new(x as f32, y as f32, 2.0 * scale)
                                .with_angle(angle)
                                .with_response(value)
                                .with_octave(octave as u8),
                        );
                    }
                }
            }
        }

        Ok(keypoints)
    }
}
