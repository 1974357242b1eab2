use featbench_core::{Image, Keypoint};
use crate::error::{DetectError, DetectResult};
use crate::fast::{FastDetector, FastParams};
use crate::pyramid::ImagePyramid;
use crate::refinement::KeypointRefinement;
use crate::DetectKeypoints;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct OrbParams {
    /// Upper bound on keypoints across all levels
    pub n_features: usize,
    pub scale_factor: f32,
    pub n_levels: usize,
    pub fast_threshold: u8,
    /// Diameter of the orientation patch at level 0
    pub patch_size: usize,
    /// Keypoints closer than this to the level border are discarded
    pub border: u32,
}

impl Default for OrbParams {
    fn default() -> Self {
        Self {
            n_features: 700,
            scale_factor: 1.2,
            n_levels: 8,
            fast_threshold: 20,
            patch_size: 31,
            border: 16,
        }
    }
}

/// Oriented FAST on a scale pyramid, ranked by Harris response.
///
/// Each level gets a share of `n_features` that shrinks geometrically with
/// the scale; inside a level keypoints are emitted strongest first.
#[derive(Debug, Clone)]
pub struct OrbDetector {
    params: OrbParams,
    fast: FastDetector,
}

impl OrbDetector {
    pub fn new(params: OrbParams) -> DetectResult<Self> {
        if params.scale_factor <= 1.0 {
            return Err(DetectError::InvalidParameter {
                name: "scale_factor",
                reason: "must be greater than 1",
            });
        }
        if params.n_levels == 0 || params.n_features == 0 {
            return Err(DetectError::InvalidParameter {
                name: "n_levels",
                reason: "levels and feature budget must be positive",
            });
        }
        if params.patch_size % 2 == 0 {
            return Err(DetectError::InvalidParameter {
                name: "patch_size",
                reason: "must be odd",
            });
        }
        let fast = FastDetector::new(FastParams::with_threshold(params.fast_threshold))?;
        Ok(Self { params, fast })
    }

    pub fn params(&self) -> &OrbParams {
        &self.params
    }

    /// Feature budget per level, geometric in `1 / scale_factor`
    fn features_per_level(&self, n_levels: usize) -> Vec<usize> {
        let factor = 1.0 / self.params.scale_factor;
        let total = self.params.n_features as f32;
        let first = total * (1.0 - factor) / (1.0 - factor.powi(n_levels as i32));

        let mut budgets: Vec<usize> = (0..n_levels)
            .map(|level| (first * factor.powi(level as i32)).round() as usize)
            .collect();
        let assigned: usize = budgets[..n_levels - 1].iter().sum();
        budgets[n_levels - 1] = self.params.n_features.saturating_sub(assigned);
        budgets
    }

    fn detect_level(&self, level_img: &Image, budget: usize) -> DetectResult<Vec<Keypoint>> {
        let (w, h) = level_img.dimensions();
        let border = self.params.border;
        if budget == 0 || w <= 2 * border || h <= 2 * border {
            return Ok(Vec::new());
        }

        let mut keypoints: Vec<Keypoint> = self
            .fast
            .detect(level_img)?
            .into_iter()
            .filter(|kp| {
                let (x, y) = (kp.x as u32, kp.y as u32);
                x >= border && y >= border && x < w - border && y < h - border
            })
            .map(|kp| {
                let harris = KeypointRefinement::harris_response(level_img, kp.x as u32, kp.y as u32);
                kp.with_response(harris)
            })
            .collect();

        KeypointRefinement::retain_best(&mut keypoints, budget);
        Ok(keypoints)
    }
}

impl DetectKeypoints for OrbDetector {
    fn detect(&self, img: &Image) -> DetectResult<Vec<Keypoint>> {
        let (w, h) = img.dimensions();
        let levels = ImagePyramid::generate_scale_levels(w, h, self.params.scale_factor, self.params.n_levels);
        if levels.is_empty() {
            return Ok(Vec::new());
        }
        let pyramid = ImagePyramid::build_image_pyramid(img, &levels);
        let budgets = self.features_per_level(levels.len());

        let mut keypoints = Vec::new();
        for ((level, level_img), budget) in levels.iter().zip(&pyramid).zip(budgets) {
            for kp in self.detect_level(level_img, budget)? {
                let angle = KeypointRefinement::compute_orientation(level_img, kp.x, kp.y, self.params.patch_size);
                keypoints.push(Keypoint {
                    x: kp.x * level.scale,
                    y: kp.y * level.scale,
                    size: self.params.patch_size as f32 * level.scale,
                    angle,
                    response: kp.response,
                    octave: level.level as u8,
                });
            }
        }

        Ok(keypoints)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    /// Bright 6x6 squares on a dark background, one per `spacing` cell
    fn square_grid(size: u32, spacing: u32) -> Image {
        GrayImage::from_fn(size, size, |x, y| {
            if x % spacing < 6 && y % spacing < 6 { Luma([210]) } else { Luma([40]) }
        })
    }

    #[test]
    fn test_rejects_bad_params() {
        let params = OrbParams {
            scale_factor: 1.0,
            ..OrbParams::default()
        };
        assert!(OrbDetector::new(params).is_err());

        let params = OrbParams {
            patch_size: 30,
            ..OrbParams::default()
        };
        assert!(OrbDetector::new(params).is_err());
    }

    #[test]
    fn test_budget_sums_to_feature_count() {
        let detector = OrbDetector::new(OrbParams::default()).unwrap();
        let budgets = detector.features_per_level(8);
        assert_eq!(budgets.iter().sum::<usize>(), 700);
        assert!(budgets[0] > budgets[7]);
    }

    #[test]
    fn test_detects_within_budget_and_bounds() {
        let params = OrbParams {
            n_features: 50,
            ..OrbParams::default()
        };
        let detector = OrbDetector::new(params).unwrap();
        let img = square_grid(160, 16);
        let keypoints = detector.detect(&img).unwrap();

        assert!(!keypoints.is_empty());
        assert!(keypoints.len() <= 50);
        for kp in &keypoints {
            assert!(kp.x >= 0.0 && kp.x < 160.0);
            assert!(kp.y >= 0.0 && kp.y < 160.0);
            assert!(kp.angle.is_finite());
            assert!(kp.size >= 31.0);
        }
    }

    #[test]
    fn test_tiny_image_yields_nothing() {
        let detector = OrbDetector::new(OrbParams::default()).unwrap();
        let img = GrayImage::from_pixel(20, 20, Luma([0]));
        assert!(detector.detect(&img).unwrap().is_empty());
    }
}
