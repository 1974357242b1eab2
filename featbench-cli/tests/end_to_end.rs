mod common;

use common::{apply, noisy, rectangles, similarity, warp};
use featbench::{run_combination, CombinationKey, PipelineConfig};
use nalgebra::Point2;

fn corners(size: u32) -> [Point2<f64>; 4] {
    let s = size as f64;
    [
        Point2::new(0.0, 0.0),
        Point2::new(s, 0.0),
        Point2::new(s, s),
        Point2::new(0.0, s),
    ]
}

#[test]
fn identical_images_match_everything() {
    let img = noisy(&rectangles(200, 20, 30, 7), 6, 1);
    let key = CombinationKey::new("FAST", "SIFT", "BF");
    let run = run_combination(&img, &img, &key, &PipelineConfig::default()).unwrap();

    let result = run.result;
    assert!(result.total_matches > 10);
    assert_eq!(result.total_matches, run.artifacts.query.len());
    assert_eq!(result.good_matches, result.total_matches);
    assert!(result.homography_success);

    for (found, expected) in run.artifacts.corners.unwrap().iter().zip(corners(200)) {
        assert!((found - expected).norm() < 0.5, "{found} vs {expected}");
    }
    for m in &run.artifacts.good_matches {
        assert_eq!(m.query_idx, m.train_idx);
        assert_eq!(m.distance, 0.0);
    }
}

#[test]
fn rotated_and_scaled_copy_is_located() {
    let query = rectangles(240, 50, 40, 11);
    let transform = similarity(240, 12f64.to_radians(), 0.9, (4.0, -3.0));
    let reference = warp(&query, &transform);

    let key = CombinationKey::new("ORB", "ORB", "BF");
    let run = run_combination(&query, &reference, &key, &PipelineConfig::default()).unwrap();
    assert!(run.result.good_matches >= 10, "only {} good matches", run.result.good_matches);
    assert!(run.result.homography_success);

    let projected = run.artifacts.corners.unwrap();
    for (found, corner) in projected.iter().zip(corners(240)) {
        let expected = apply(&transform, corner);
        assert!((found - expected).norm() < 5.0, "{found} vs {expected}");
    }
}

#[test]
fn descriptor_only_detector_localizes_with_fast() {
    let img = rectangles(160, 16, 20, 3);
    let key = CombinationKey::new("BRIEF", "BRIEF", "BF");
    let run = run_combination(&img, &img, &key, &PipelineConfig::default()).unwrap();
    assert!(run.result.total_matches > 0);
    assert!(run.artifacts.query.is_binary());
    assert!(run
        .artifacts
        .query
        .keypoints()
        .iter()
        .all(|kp| kp.size == featbench::featbench_detect::FAST_KEYPOINT_SIZE));
}

#[test]
fn keypoint_cap_bounds_candidates() {
    let img = rectangles(200, 20, 40, 5);
    let mut config = PipelineConfig::default();
    config.extraction.keypoint_cap = 25;
    let key = CombinationKey::new("FAST", "ORB", "BF");
    let run = run_combination(&img, &img, &key, &config).unwrap();
    assert_eq!(run.artifacts.query.len(), 25);
    assert_eq!(run.artifacts.reference.len(), 25);
    assert_eq!(run.result.total_matches, 25);
}

#[test]
fn approximate_matchers_serve_both_kinds() {
    let img = rectangles(200, 20, 30, 9);
    for key in [
        CombinationKey::new("FAST", "SURF", "FLANN"),
        CombinationKey::new("FAST", "ORB", "FLANN"),
    ] {
        let run = run_combination(&img, &img, &key, &PipelineConfig::default()).unwrap();
        assert!(run.result.total_matches > 0, "{key}");
        assert!(run.result.good_matches > 0, "{key}");
    }
}
