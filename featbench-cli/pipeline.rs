use std::cell::Cell;
use std::time::{Duration, Instant};

use featbench_core::{Candidate, Features, Image};
use featbench_describe::DescribeKeypoints;
use featbench_homography::{correspondences, find_homography, project_corners, RansacConfig, SAMPLE_SIZE};
use featbench_match::{match_with_fallback, FallbackPolicy, RatioTest};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use tracing::debug;
use crate::error::PipelineError;
use crate::extract::{extract_features, ExtractionConfig};
use crate::harness::{CombinationKey, MatchResult, Stage};
use crate::registry::{resolve_descriptor, resolve_localizer, resolve_matcher, StrategyParams};

/// Everything a single combination run reads
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub extraction: ExtractionConfig,
    pub fallback: FallbackPolicy,
    pub ransac: RansacConfig,
    pub strategies: StrategyParams,
}

/// Intermediate products kept for visualization
#[derive(Debug, Clone)]
pub struct CombinationArtifacts {
    pub query: Features,
    pub reference: Features,
    pub good_matches: Vec<Candidate>,
    /// Query outline in the reference frame when the homography succeeded
    pub corners: Option<[Point2<f64>; 4]>,
}

/// A combination that stopped early, with the stage it was in
#[derive(Debug)]
pub struct CombinationFailure {
    pub stage: Stage,
    pub error: PipelineError,
    pub elapsed: Duration,
}

#[derive(Debug, Clone)]
pub struct CombinationRun {
    pub result: MatchResult,
    pub artifacts: CombinationArtifacts,
}

/// Runs extraction, matching, ratio filtering and homography estimation for one key.
///
/// The clock starts before the strategies are built and stops once the
/// homography has been estimated.
pub fn run_combination(
    query: &Image,
    reference: &Image,
    key: &CombinationKey,
    config: &PipelineConfig,
) -> Result<CombinationRun, CombinationFailure> {
    let start = Instant::now();
    let stage = Cell::new(Stage::Extracting);

    let attempt = || -> Result<CombinationRun, PipelineError> {
        let params = &config.strategies;
        let detector = resolve_localizer(&key.detector, params)?;
        let descriptor = resolve_descriptor(&key.descriptor, params)?;

        let query_features = extract_features(query, &detector, &descriptor, &config.extraction, "query")?;
        let reference_features = extract_features(reference, &detector, &descriptor, &config.extraction, "reference")?;

        stage.set(Stage::Matching);
        let is_binary = descriptor.is_binary();
        let matcher = resolve_matcher(&key.matcher, is_binary, params)?;
        let neighbors = match_with_fallback(
            &matcher,
            query_features.descriptors(),
            reference_features.descriptors(),
            &config.fallback,
        )?;

        stage.set(Stage::Filtering);
        let good_matches = RatioTest::for_descriptors(is_binary).filter(&neighbors);

        stage.set(Stage::Estimating);
        let mut homography = None;
        if good_matches.len() >= SAMPLE_SIZE {
            let (src, dst) = correspondences(&good_matches, query_features.keypoints(), reference_features.keypoints());
            match find_homography(&src, &dst, &config.ransac) {
                Ok(estimate) => homography = Some(estimate.homography),
                Err(err) => debug!(combination = %key, error = %err, "homography estimation failed"),
            }
        }
        let elapsed = start.elapsed();

        let corners = homography.and_then(|h| project_corners(&h, query.width(), query.height()));
        Ok(CombinationRun {
            result: MatchResult {
                total_matches: neighbors.len(),
                good_matches: good_matches.len(),
                elapsed,
                homography_success: homography.is_some(),
            },
            artifacts: CombinationArtifacts {
                query: query_features,
                reference: reference_features,
                good_matches,
                corners,
            },
        })
    };

    attempt().map_err(|error| CombinationFailure {
        stage: stage.get(),
        error,
        elapsed: start.elapsed(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ExtractionError, RegistryError};
    use image::{GrayImage, Luma};

    fn blank() -> Image {
        GrayImage::from_pixel(64, 64, Luma([90]))
    }

    #[test]
    fn test_unknown_name_fails_while_extracting() {
        let key = CombinationKey::new("HARRIS", "ORB", "BF");
        let failure = run_combination(&blank(), &blank(), &key, &PipelineConfig::default()).unwrap_err();
        assert_eq!(failure.stage, Stage::Extracting);
        assert!(matches!(
            failure.error,
            PipelineError::Registry(RegistryError::UnknownDetector(_))
        ));
    }

    #[test]
    fn test_empty_descriptors_abandon_combination() {
        let key = CombinationKey::new("FAST", "BRIEF", "BF");
        let failure = run_combination(&blank(), &blank(), &key, &PipelineConfig::default()).unwrap_err();
        assert!(matches!(
            failure.error,
            PipelineError::Extraction(ExtractionError::EmptyDescriptors { image: "query" })
        ));
    }
}
