use featbench_core::{Image, Keypoint};
use crate::error::{DetectError, DetectResult};
use crate::fast::{FastDetector, FastParams};
use crate::pyramid::ImagePyramid;
use crate::refinement::KeypointRefinement;
use crate::types::ScoredKeypoint;
use crate::DetectKeypoints;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Keypoint diameter at octave 0 with a unit pattern scale
pub const BRISK_BASIC_SIZE: f32 = 12.0;

/// Minimum spacing between keypoints after cross-octave suppression
const CROSS_OCTAVE_RADIUS: f32 = 3.0;

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct BriskParams {
    /// FAST threshold applied on every octave
    pub threshold: u8,
    /// Halvings below the input image; 0 detects at full resolution only
    pub octaves: usize,
    /// Scale of the sampling pattern; also scales reported keypoint sizes
    pub pattern_scale: f32,
}

impl Default for BriskParams {
    fn default() -> Self {
        Self {
            threshold: 30,
            octaves: 3,
            pattern_scale: 1.0,
        }
    }
}

/// FAST on a dyadic pyramid with suppression across octaves
#[derive(Debug, Clone)]
pub struct BriskDetector {
    params: BriskParams,
    fast: FastDetector,
}

impl BriskDetector {
    pub fn new(params: BriskParams) -> DetectResult<Self> {
        if params.pattern_scale <= 0.0 {
            return Err(DetectError::InvalidParameter {
                name: "pattern_scale",
                reason: "must be positive",
            });
        }
        let fast = FastDetector::new(FastParams::with_threshold(params.threshold))?;
        Ok(Self { params, fast })
    }

    pub fn params(&self) -> &BriskParams {
        &self.params
    }
}

impl DetectKeypoints for BriskDetector {
    fn detect(&self, img: &Image) -> DetectResult<Vec<Keypoint>> {
        let (w, h) = img.dimensions();
        let levels = ImagePyramid::generate_scale_levels(w, h, 2.0, self.params.octaves + 1);
        let pyramid = ImagePyramid::build_image_pyramid(img, &levels);

        let mut candidates = Vec::new();
        for (level, level_img) in levels.iter().zip(&pyramid) {
            for kp in self.fast.detect(level_img)? {
                let keypoint = Keypoint::new(
                    kp.x * level.scale,
                    kp.y * level.scale,
                    BRISK_BASIC_SIZE * self.params.pattern_scale * level.scale,
                )
                .with_response(kp.response)
                .with_octave(level.level as u8);
                candidates.push(ScoredKeypoint {
                    keypoint,
                    response: kp.response,
                });
            }
        }

        Ok(KeypointRefinement::non_maximum_suppression(&candidates, CROSS_OCTAVE_RADIUS)
            .into_iter()
            .map(|scored| scored.keypoint)
            .collect())
    }
}
