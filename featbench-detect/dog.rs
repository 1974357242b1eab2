use std::f32::consts::{PI, TAU};

use featbench_core::{Image, Keypoint};
use crate::error::{DetectError, DetectResult};
use crate::filters::Plane;
use crate::refinement::KeypointRefinement;
use crate::DetectKeypoints;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Blur already present in the input image
const ASSUMED_BLUR: f32 = 0.5;
/// Extrema closer than this to an octave border are skipped
const IMG_BORDER: usize = 5;
/// Octaves stop once the shorter side drops below this
const MIN_OCTAVE_SIDE: usize = 16;
const ORI_BINS: usize = 36;
const ORI_SIG_FACTOR: f32 = 1.5;
const ORI_RADIUS_FACTOR: f32 = 3.0 * ORI_SIG_FACTOR;

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SiftParams {
    /// Strongest keypoints kept, 0 keeps all
    pub n_features: usize,
    /// Layers sampled per octave
    pub n_octave_layers: usize,
    pub contrast_threshold: f32,
    /// Ratio of principal curvatures above which an extremum is an edge
    pub edge_threshold: f32,
    pub sigma: f32,
}

impl Default for SiftParams {
    fn default() -> Self {
        Self {
            n_features: 500,
            n_octave_layers: 3,
            contrast_threshold: 0.04,
            edge_threshold: 10.0,
            sigma: 1.6,
        }
    }
}

struct Octave {
    gaussians: Vec<Plane>,
    dogs: Vec<Plane>,
}

/// Sub-pixel offset and interpolated contrast of an extremum
struct Refined {
    dx: f32,
    dy: f32,
    ds: f32,
    contrast: f32,
}

/// Difference-of-Gaussians blob detector with gradient-histogram orientation
#[derive(Debug, Clone)]
pub struct DogDetector {
    params: SiftParams,
}

impl DogDetector {
    pub fn new(params: SiftParams) -> DetectResult<Self> {
        if params.n_octave_layers == 0 {
            return Err(DetectError::InvalidParameter {
                name: "n_octave_layers",
                reason: "must be positive",
            });
        }
        if params.sigma <= ASSUMED_BLUR {
            return Err(DetectError::InvalidParameter {
                name: "sigma",
                reason: "must exceed the assumed input blur of 0.5",
            });
        }
        if params.contrast_threshold < 0.0 || params.edge_threshold <= 1.0 {
            return Err(DetectError::InvalidParameter {
                name: "edge_threshold",
                reason: "thresholds must be non-negative and the edge ratio above 1",
            });
        }
        Ok(Self { params })
    }

    pub fn params(&self) -> &SiftParams {
        &self.params
    }

    /// Incremental blur applied between consecutive Gaussian layers
    fn layer_sigmas(&self) -> Vec<f32> {
        let s = self.params.n_octave_layers;
        let k = 2f32.powf(1.0 / s as f32);
        let mut sigmas = vec![self.params.sigma];
        for i in 1..s + 3 {
            let prev = self.params.sigma * k.powi(i as i32 - 1);
            let total = prev * k;
            sigmas.push((total * total - prev * prev).sqrt());
        }
        sigmas
    }

    fn build_octaves(&self, img: &Image) -> Vec<Octave> {
        let s = self.params.n_octave_layers;
        let sigmas = self.layer_sigmas();
        let initial = (self.params.sigma.powi(2) - ASSUMED_BLUR.powi(2)).max(0.01).sqrt();

        let mut base = Plane::from_image(img).gaussian_blur(initial);
        let mut octaves = Vec::new();
        while base.width.min(base.height) >= MIN_OCTAVE_SIDE {
            let mut gaussians = Vec::with_capacity(s + 3);
            gaussians.push(base);
            for sigma in &sigmas[1..] {
                let next = gaussians[gaussians.len() - 1].gaussian_blur(*sigma);
                gaussians.push(next);
            }
            let dogs = gaussians.windows(2).map(|pair| pair[1].difference(&pair[0])).collect();

            // Layer s has twice the base sigma
            base = gaussians[s].decimate();
            octaves.push(Octave { gaussians, dogs });
        }
        octaves
    }

    fn is_extremum(dogs: &[Plane], layer: usize, x: usize, y: usize) -> bool {
        let v = dogs[layer].at(x, y);
        for plane in &dogs[layer - 1..=layer + 1] {
            for yy in y - 1..=y + 1 {
                for xx in x - 1..=x + 1 {
                    let n = plane.at(xx, yy);
                    if (v > 0.0 && n > v) || (v <= 0.0 && n < v) {
                        return false;
                    }
                }
            }
        }
        true
    }

    /// One Newton step on the 3D quadratic, then the contrast and edge tests
    fn refine(&self, dogs: &[Plane], layer: usize, x: usize, y: usize) -> Option<Refined> {
        let (prev, cur, next) = (&dogs[layer - 1], &dogs[layer], &dogs[layer + 1]);
        let v = cur.at(x, y);

        let gx = (cur.at(x + 1, y) - cur.at(x - 1, y)) * 0.5;
        let gy = (cur.at(x, y + 1) - cur.at(x, y - 1)) * 0.5;
        let gs = (next.at(x, y) - prev.at(x, y)) * 0.5;

        let dxx = cur.at(x + 1, y) + cur.at(x - 1, y) - 2.0 * v;
        let dyy = cur.at(x, y + 1) + cur.at(x, y - 1) - 2.0 * v;
        let dss = next.at(x, y) + prev.at(x, y) - 2.0 * v;
        let dxy = (cur.at(x + 1, y + 1) - cur.at(x - 1, y + 1) - cur.at(x + 1, y - 1) + cur.at(x - 1, y - 1)) * 0.25;
        let dxs = (next.at(x + 1, y) - next.at(x - 1, y) - prev.at(x + 1, y) + prev.at(x - 1, y)) * 0.25;
        let dys = (next.at(x, y + 1) - next.at(x, y - 1) - prev.at(x, y + 1) + prev.at(x, y - 1)) * 0.25;

        // Cramer's rule on H * offset = -g
        let det = dxx * (dyy * dss - dys * dys) - dxy * (dxy * dss - dys * dxs) + dxs * (dxy * dys - dyy * dxs);
        if det.abs() < 1e-12 {
            return None;
        }
        let (bx, by, bs) = (-gx, -gy, -gs);
        let ox = (bx * (dyy * dss - dys * dys) - dxy * (by * dss - dys * bs) + dxs * (by * dys - dyy * bs)) / det;
        let oy = (dxx * (by * dss - dys * bs) - bx * (dxy * dss - dys * dxs) + dxs * (dxy * bs - by * dxs)) / det;
        let os = (dxx * (dyy * bs - by * dys) - dxy * (dxy * bs - by * dxs) + bx * (dxy * dys - dyy * dxs)) / det;
        if ox.abs() >= 1.0 || oy.abs() >= 1.0 || os.abs() >= 1.0 {
            return None;
        }

        let contrast = v + 0.5 * (gx * ox + gy * oy + gs * os);
        if contrast.abs() * (self.params.n_octave_layers as f32) < self.params.contrast_threshold {
            return None;
        }

        let trace = dxx + dyy;
        let det2 = dxx * dyy - dxy * dxy;
        let r = self.params.edge_threshold;
        if det2 <= 0.0 || trace * trace * r >= (r + 1.0) * (r + 1.0) * det2 {
            return None;
        }

        Some(Refined { dx: ox, dy: oy, ds: os, contrast })
    }

    /// Dominant gradient direction around `(x, y)` in radians
    fn orientation(gauss: &Plane, x: usize, y: usize, scale: f32) -> f32 {
        let radius = (ORI_RADIUS_FACTOR * scale).round() as i64;
        let weight_sigma = ORI_SIG_FACTOR * scale;
        let denom = 2.0 * weight_sigma * weight_sigma;
        let mut hist = [0.0f32; ORI_BINS];

        for dy in -radius..=radius {
            let yy = y as i64 + dy;
            if yy <= 0 || yy >= gauss.height as i64 - 1 {
                continue;
            }
            for dx in -radius..=radius {
                let xx = x as i64 + dx;
                if xx <= 0 || xx >= gauss.width as i64 - 1 {
                    continue;
                }
                let (xx, yy) = (xx as usize, yy as usize);
                let gx = gauss.at(xx + 1, yy) - gauss.at(xx - 1, yy);
                let gy = gauss.at(xx, yy + 1) - gauss.at(xx, yy - 1);
                let magnitude = (gx * gx + gy * gy).sqrt();
                if magnitude == 0.0 {
                    continue;
                }
                let angle = gy.atan2(gx).rem_euclid(TAU);
                let bin = ((angle / TAU) * ORI_BINS as f32).round() as usize % ORI_BINS;
                let weight = (-((dx * dx + dy * dy) as f32) / denom).exp();
                hist[bin] += weight * magnitude;
            }
        }

        // [1 4 6 4 1] / 16 circular smoothing
        let mut smooth = [0.0f32; ORI_BINS];
        for (i, s) in smooth.iter_mut().enumerate() {
            let at = |off: isize| hist[(i as isize + off).rem_euclid(ORI_BINS as isize) as usize];
            *s = (at(-2) + at(2)) / 16.0 + (at(-1) + at(1)) * 4.0 / 16.0 + at(0) * 6.0 / 16.0;
        }

        let (peak, &max) = smooth
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .unwrap_or((0, &0.0));
        if max <= 0.0 {
            return 0.0;
        }
        let left = smooth[(peak + ORI_BINS - 1) % ORI_BINS];
        let right = smooth[(peak + 1) % ORI_BINS];
        let curvature = left - 2.0 * max + right;
        let offset = if curvature != 0.0 { 0.5 * (left - right) / curvature } else { 0.0 };

        let angle = (peak as f32 + offset) * TAU / ORI_BINS as f32;
        if angle > PI {
            angle - TAU
        } else {
            angle
        }
    }
}

impl DetectKeypoints for DogDetector {
    fn detect(&self, img: &Image) -> DetectResult<Vec<Keypoint>> {
        let s = self.params.n_octave_layers;
        let prelim = 0.5 * self.params.contrast_threshold / s as f32;

        let mut keypoints = Vec::new();
        for (o, octave) in self.build_octaves(img).iter().enumerate() {
            let (w, h) = (octave.dogs[0].width, octave.dogs[0].height);
            if w <= 2 * IMG_BORDER || h <= 2 * IMG_BORDER {
                continue;
            }
            let octave_scale = (1u32 << o) as f32;

            for layer in 1..=s {
                let dog = &octave.dogs[layer];
                for y in IMG_BORDER..h - IMG_BORDER {
                    for x in IMG_BORDER..w - IMG_BORDER {
                        if dog.at(x, y).abs() <= prelim || !Self::is_extremum(&octave.dogs, layer, x, y) {
                            continue;
                        }
                        let Some(refined) = self.refine(&octave.dogs, layer, x, y) else {
                            continue;
                        };

                        let layer_scale = self.params.sigma * 2f32.powf((layer as f32 + refined.ds) / s as f32);
                        let angle = Self::orientation(&octave.gaussians[layer], x, y, layer_scale);
                        keypoints.push(
                            Keypoint::new(
                                (x as f32 + refined.dx) * octave_scale,
                                (y as f32 + refined.dy) * octave_scale,
                                2.0 * layer_scale * octave_scale,
                            )
                            .with_angle(angle)
                            .with_response(refined.contrast.abs())
                            .with_octave(o as u8),
                        );
                    }
                }
            }
        }

        KeypointRefinement::retain_best(&mut keypoints, self.params.n_features);
        Ok(keypoints)
    }
}
