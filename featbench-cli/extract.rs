use featbench_core::{Features, Image, Keypoint};
use featbench_describe::DescribeKeypoints;
use featbench_detect::DetectKeypoints;
use serde::{Deserialize, Serialize};
use tracing::debug;
use crate::error::ExtractionError;

/// Default cap on keypoints kept per image
pub const DEFAULT_KEYPOINT_CAP: usize = 500;

/// Which keypoints survive when a detector emits more than the cap
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TruncationPolicy {
    /// First N in the order the detector emitted them
    #[default]
    EmissionOrder,
    /// N highest responses; equal responses keep emission order
    StrongestResponse,
}

impl TruncationPolicy {
    pub fn apply(&self, keypoints: &mut Vec<Keypoint>, cap: usize) {
        if keypoints.len() <= cap {
            return;
        }
        if *self == TruncationPolicy::StrongestResponse {
            // stable sort keeps emission order among ties
            keypoints.sort_by(|a, b| b.response.total_cmp(&a.response));
        }
        keypoints.truncate(cap);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    pub keypoint_cap: usize,
    pub truncation: TruncationPolicy,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            keypoint_cap: DEFAULT_KEYPOINT_CAP,
            truncation: TruncationPolicy::default(),
        }
    }
}

/// Detects, truncates to the cap, then describes the surviving keypoints.
///
/// `image` names the input in the error raised when nothing could be
/// described.
pub fn extract_features<D, E>(
    img: &Image,
    detector: &D,
    descriptor: &E,
    config: &ExtractionConfig,
    image: &'static str,
) -> Result<Features, ExtractionError>
where
    D: DetectKeypoints + ?Sized,
    E: DescribeKeypoints + ?Sized,
{
    let mut keypoints = detector.detect(img)?;
    let detected = keypoints.len();
    config.truncation.apply(&mut keypoints, config.keypoint_cap);

    let descriptors = descriptor.compute(img, &keypoints)?;
    let mut features = Features::new(keypoints, descriptors)?;
    features.truncate(config.keypoint_cap);
    debug!(image, detected, kept = features.len(), "extracted features");

    if features.is_empty() {
        return Err(ExtractionError::EmptyDescriptors { image });
    }
    Ok(features)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{resolve_descriptor, resolve_localizer, StrategyParams};
    use image::{GrayImage, Luma};
    use proptest::prelude::*;

    fn keypoints(responses: &[f32]) -> Vec<Keypoint> {
        responses
            .iter()
            .enumerate()
            .map(|(i, &r)| Keypoint::new(i as f32, 0.0, 7.0).with_response(r))
            .collect()
    }

    /// Bright 6x6 squares every `pitch` pixels on a dark background
    fn squares(size: u32, pitch: u32) -> GrayImage {
        GrayImage::from_fn(size, size, |x, y| {
            if x % pitch >= 5 && x % pitch < 11 && y % pitch >= 5 && y % pitch < 11 {
                Luma([220])
            } else {
                Luma([30])
            }
        })
    }

    #[test]
    fn test_emission_order_keeps_prefix() {
        let mut kps = keypoints(&[1.0, 5.0, 3.0, 9.0]);
        TruncationPolicy::EmissionOrder.apply(&mut kps, 2);
        assert_eq!(kps.iter().map(|k| k.x).collect::<Vec<_>>(), vec![0.0, 1.0]);
    }

    #[test]
    fn test_strongest_response_ranks() {
        let mut kps = keypoints(&[1.0, 5.0, 3.0, 9.0, 5.0]);
        TruncationPolicy::StrongestResponse.apply(&mut kps, 3);
        assert_eq!(kps.iter().map(|k| k.x).collect::<Vec<_>>(), vec![3.0, 1.0, 4.0]);
    }

    #[test]
    fn test_under_cap_untouched() {
        let mut kps = keypoints(&[3.0, 1.0]);
        TruncationPolicy::StrongestResponse.apply(&mut kps, 5);
        assert_eq!(kps[0].response, 3.0);
    }

    #[test]
    fn test_descriptor_only_pipeline_uses_fast() {
        let params = StrategyParams::default();
        let img = squares(96, 16);
        let detector = resolve_localizer("BRIEF", &params).unwrap();
        let descriptor = resolve_descriptor("BRIEF", &params).unwrap();
        let features = extract_features(&img, &detector, &descriptor, &ExtractionConfig::default(), "query").unwrap();
        assert!(!features.is_empty());
        assert!(features.is_binary());
        assert_eq!(features.descriptors().dim(), 32);
    }

    #[test]
    fn test_flat_image_is_empty() {
        let params = StrategyParams::default();
        let img = GrayImage::from_pixel(64, 64, Luma([128]));
        let detector = resolve_localizer("FAST", &params).unwrap();
        let descriptor = resolve_descriptor("ORB", &params).unwrap();
        let err = extract_features(&img, &detector, &descriptor, &ExtractionConfig::default(), "reference").unwrap_err();
        assert!(matches!(err, ExtractionError::EmptyDescriptors { image: "reference" }));
    }

    #[test]
    fn test_cap_applies_to_both_sides() {
        let params = StrategyParams::default();
        let img = squares(128, 16);
        let detector = resolve_localizer("FAST", &params).unwrap();
        let descriptor = resolve_descriptor("BRIEF", &params).unwrap();
        let config = ExtractionConfig {
            keypoint_cap: 10,
            ..ExtractionConfig::default()
        };
        let features = extract_features(&img, &detector, &descriptor, &config, "query").unwrap();
        assert_eq!(features.len(), 10);
        assert_eq!(features.keypoints().len(), features.descriptors().len());
    }

    proptest! {
        #[test]
        fn prop_truncation_length(n in 0usize..60, cap in 0usize..80, strongest in any::<bool>()) {
            let responses: Vec<f32> = (0..n).map(|i| ((i * 37) % 11) as f32).collect();
            let mut kps = keypoints(&responses);
            let policy = if strongest { TruncationPolicy::StrongestResponse } else { TruncationPolicy::EmissionOrder };
            policy.apply(&mut kps, cap);
            prop_assert_eq!(kps.len(), n.min(cap));
        }
    }
}
