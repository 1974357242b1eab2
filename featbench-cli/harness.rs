use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use crate::error::{BenchResult, RegistryError};
use crate::pipeline::{run_combination, PipelineConfig};
use crate::registry::{is_valid_pair, MatcherKind, Strategy};
use crate::report::Reporter;
use crate::source::{ImagePair, ImageSource};
use crate::visualize::{MatchVisual, VisualizationSink};

/// `(detector, descriptor, matcher)` names as requested
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CombinationKey {
    pub detector: String,
    pub descriptor: String,
    pub matcher: String,
}

impl CombinationKey {
    pub fn new(detector: impl Into<String>, descriptor: impl Into<String>, matcher: impl Into<String>) -> Self {
        Self {
            detector: detector.into(),
            descriptor: descriptor.into(),
            matcher: matcher.into(),
        }
    }
}

impl fmt::Display for CombinationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.detector, self.descriptor, self.matcher)
    }
}

/// Scores for one combination; immutable once recorded
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MatchResult {
    /// Neighbour lists produced, one per query descriptor
    pub total_matches: usize,
    /// Lists that passed the ratio test
    pub good_matches: usize,
    pub elapsed: Duration,
    pub homography_success: bool,
}

impl MatchResult {
    pub fn zeroed(elapsed: Duration) -> Self {
        Self {
            elapsed,
            ..Self::default()
        }
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed.as_secs_f64() * 1000.0
    }
}

/// Lifecycle of a combination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Pending,
    Extracting,
    Matching,
    Filtering,
    Estimating,
    Recorded,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Pending => "pending",
            Stage::Extracting => "extracting",
            Stage::Matching => "matching",
            Stage::Filtering => "filtering",
            Stage::Estimating => "estimating",
            Stage::Recorded => "recorded",
            Stage::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Recorded,
    /// Stopped during `stage`; the result is zeroed
    Failed { stage: Stage, reason: String },
}

impl Outcome {
    pub fn stage(&self) -> Stage {
        match self {
            Outcome::Recorded => Stage::Recorded,
            Outcome::Failed { .. } => Stage::Failed,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CombinationRecord {
    pub key: CombinationKey,
    pub result: MatchResult,
    pub outcome: Outcome,
}

impl CombinationRecord {
    pub fn recorded(key: CombinationKey, result: MatchResult) -> Self {
        Self {
            key,
            result,
            outcome: Outcome::Recorded,
        }
    }

    pub fn failed(key: CombinationKey, stage: Stage, reason: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            key,
            result: MatchResult::zeroed(elapsed),
            outcome: Outcome::Failed {
                stage,
                reason: reason.into(),
            },
        }
    }

    pub fn is_recorded(&self) -> bool {
        self.outcome == Outcome::Recorded
    }
}

/// Results keyed by combination, in the order combinations were first recorded
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BenchmarkResults {
    records: Vec<CombinationRecord>,
}

impl BenchmarkResults {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `record`, replacing any earlier record for the same key in place
    pub fn record(&mut self, record: CombinationRecord) {
        match self.records.iter_mut().find(|r| r.key == record.key) {
            Some(existing) => *existing = record,
            None => self.records.push(record),
        }
    }

    pub fn get(&self, key: &CombinationKey) -> Option<&CombinationRecord> {
        self.records.iter().find(|r| &r.key == key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CombinationRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Most good matches; ties go to the earliest record
    pub fn best_by_quality(&self) -> Option<&CombinationRecord> {
        self.records.iter().fold(None, |best, r| match best {
            Some(b) if r.result.good_matches <= b.result.good_matches => Some(b),
            _ => Some(r),
        })
    }

    /// Shortest elapsed time over every record, failed ones included; ties
    /// go to the earliest record
    pub fn fastest(&self) -> Option<&CombinationRecord> {
        self.records.iter().fold(None, |best, r| match best {
            Some(b) if r.result.elapsed >= b.result.elapsed => Some(b),
            _ => Some(r),
        })
    }
}

impl<'a> IntoIterator for &'a BenchmarkResults {
    type Item = &'a CombinationRecord;
    type IntoIter = std::slice::Iter<'a, CombinationRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// Strategy names crossed by grid mode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub detectors: Vec<String>,
    pub descriptors: Vec<String>,
    pub matchers: Vec<String>,
    /// Leave binary descriptors with the approximate matcher out of the grid
    pub skip_flann_binary: bool,
}

impl Default for GridConfig {
    fn default() -> Self {
        let names = |list: &[Strategy]| list.iter().map(|s| s.as_str().to_string()).collect();
        Self {
            detectors: names(&[Strategy::Sift, Strategy::Surf, Strategy::Orb, Strategy::Fast, Strategy::Brisk]),
            descriptors: names(&[
                Strategy::Sift,
                Strategy::Surf,
                Strategy::Orb,
                Strategy::Brief,
                Strategy::Freak,
                Strategy::Brisk,
            ]),
            matchers: MatcherKind::ALL.iter().map(|m| m.as_str().to_string()).collect(),
            skip_flann_binary: true,
        }
    }
}

impl GridConfig {
    /// Keys in traversal order: detector outer, descriptor middle, matcher inner
    pub fn combinations(&self) -> Vec<CombinationKey> {
        let mut keys = Vec::new();
        for detector in &self.detectors {
            for descriptor in &self.descriptors {
                if !is_valid_pair(detector, descriptor) {
                    debug!(detector, descriptor, "skipping invalid pair");
                    continue;
                }
                let binary = Strategy::parse(descriptor).is_some_and(|s| s.is_binary_descriptor());
                for matcher in &self.matchers {
                    let approximate = matcher.parse::<MatcherKind>().is_ok_and(|m| m.is_approximate());
                    if self.skip_flann_binary && binary && approximate {
                        continue;
                    }
                    keys.push(CombinationKey::new(detector.as_str(), descriptor.as_str(), matcher.as_str()));
                }
            }
        }
        keys
    }
}

/// Runs combinations sequentially and accumulates their results.
pub struct Harness {
    config: PipelineConfig,
    reporters: Vec<Box<dyn Reporter>>,
    sink: Option<Box<dyn VisualizationSink>>,
}

impl Harness {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            reporters: Vec::new(),
            sink: None,
        }
    }

    pub fn with_reporter(mut self, reporter: impl Reporter + 'static) -> Self {
        self.reporters.push(Box::new(reporter));
        self
    }

    pub fn with_sink(mut self, sink: impl VisualizationSink + 'static) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Every combination of `grid`
    pub fn run_grid(&mut self, source: &dyn ImageSource, grid: &GridConfig) -> BenchResult<BenchmarkResults> {
        let images = source.load()?;
        images.validate()?;
        let keys = grid.combinations();
        info!(combinations = keys.len(), "processing all valid combinations");
        self.run_keys(&images, &keys)
    }

    /// One combination; an invalid pairing is rejected before anything runs
    pub fn run_single(&mut self, source: &dyn ImageSource, key: &CombinationKey) -> BenchResult<BenchmarkResults> {
        if !is_valid_pair(&key.detector, &key.descriptor) {
            return Err(RegistryError::InvalidPair {
                detector: key.detector.clone(),
                descriptor: key.descriptor.clone(),
            }
            .into());
        }
        let images = source.load()?;
        images.validate()?;
        self.run_keys(&images, std::slice::from_ref(key))
    }

    pub fn run_keys(&mut self, images: &ImagePair, keys: &[CombinationKey]) -> BenchResult<BenchmarkResults> {
        let mut results = BenchmarkResults::new();
        for key in keys {
            let record = self.run_one(images, key);
            for reporter in &mut self.reporters {
                reporter.record(&record)?;
            }
            results.record(record);
        }
        for reporter in &mut self.reporters {
            reporter.finish(&results)?;
        }
        Ok(results)
    }

    fn run_one(&mut self, images: &ImagePair, key: &CombinationKey) -> CombinationRecord {
        info!(combination = %key, "processing");
        match run_combination(&images.query, &images.reference, key, &self.config) {
            Ok(run) => {
                let result = run.result;
                info!(
                    combination = %key,
                    matches = result.total_matches,
                    good = result.good_matches,
                    ms = result.elapsed_ms(),
                    homography = result.homography_success,
                    "recorded"
                );
                if let Some(sink) = self.sink.as_mut().filter(|_| !run.artifacts.good_matches.is_empty()) {
                    let visual = MatchVisual {
                        key,
                        query: &images.query,
                        reference: &images.reference,
                        query_keypoints: run.artifacts.query.keypoints(),
                        reference_keypoints: run.artifacts.reference.keypoints(),
                        good_matches: &run.artifacts.good_matches,
                        corners: run.artifacts.corners,
                    };
                    if let Err(err) = sink.render(&visual) {
                        warn!(combination = %key, error = %err, "visualization failed");
                    }
                }
                CombinationRecord::recorded(key.clone(), result)
            }
            Err(failure) => {
                warn!(combination = %key, stage = %failure.stage, error = %failure.error, "combination failed");
                CombinationRecord::failed(key.clone(), failure.stage, failure.error.to_string(), failure.elapsed)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    fn recorded(name: &str, good: usize, elapsed: u64) -> CombinationRecord {
        CombinationRecord::recorded(
            CombinationKey::new(name, "ORB", "BF"),
            MatchResult {
                total_matches: 100,
                good_matches: good,
                elapsed: ms(elapsed),
                homography_success: true,
            },
        )
    }

    #[test]
    fn test_ranking() {
        let mut results = BenchmarkResults::new();
        results.record(recorded("A", 12, 120));
        results.record(recorded("B", 45, 80));
        results.record(recorded("C", 7, 200));
        assert_eq!(results.best_by_quality().unwrap().result.good_matches, 45);
        assert_eq!(results.fastest().unwrap().result.elapsed, ms(80));
    }

    #[test]
    fn test_ties_go_to_first() {
        let mut results = BenchmarkResults::new();
        results.record(recorded("A", 10, 50));
        results.record(recorded("B", 10, 50));
        assert_eq!(results.best_by_quality().unwrap().key.detector, "A");
        assert_eq!(results.fastest().unwrap().key.detector, "A");
    }

    #[test]
    fn test_failed_records_rank_by_elapsed_time() {
        let mut results = BenchmarkResults::new();
        results.record(recorded("A", 3, 80));
        results.record(CombinationRecord::failed(
            CombinationKey::new("B", "SIFT", "BF"),
            Stage::Extracting,
            "no descriptors",
            ms(2),
        ));
        assert_eq!(results.fastest().unwrap().key.detector, "B");
        assert_eq!(results.best_by_quality().unwrap().key.detector, "A");

        // Zeroed good matches still tie-break to the first record
        let mut failed_first = BenchmarkResults::new();
        failed_first.record(CombinationRecord::failed(
            CombinationKey::new("X", "ORB", "BF"),
            Stage::Matching,
            "boom",
            ms(5),
        ));
        failed_first.record(recorded("C", 0, 5));
        assert_eq!(failed_first.fastest().unwrap().key.detector, "X");
        assert_eq!(failed_first.best_by_quality().unwrap().key.detector, "X");
    }

    #[test]
    fn test_record_replaces_in_place() {
        let mut results = BenchmarkResults::new();
        results.record(recorded("A", 1, 10));
        results.record(recorded("B", 2, 10));
        results.record(recorded("A", 9, 10));
        assert_eq!(results.len(), 2);
        let order: Vec<_> = results.iter().map(|r| (r.key.detector.as_str(), r.result.good_matches)).collect();
        assert_eq!(order, vec![("A", 9), ("B", 2)]);
    }

    #[test]
    fn test_zeroed_result_keeps_time() {
        let r = MatchResult::zeroed(ms(12));
        assert_eq!((r.total_matches, r.good_matches, r.homography_success), (0, 0, false));
        assert_eq!(r.elapsed_ms(), 12.0);
    }

    #[test]
    fn test_default_grid() {
        let keys = GridConfig::default().combinations();
        // 2 float descriptors x 2 matchers + 4 binary descriptors x BF, for 5 detectors
        assert_eq!(keys.len(), 40);
        assert_eq!(keys[0], CombinationKey::new("SIFT", "SIFT", "BF"));
        assert!(!keys
            .iter()
            .any(|k| k.matcher == "FLANN" && Strategy::parse(&k.descriptor).unwrap().is_binary_descriptor()));
    }

    #[test]
    fn test_grid_keeps_flann_binary_when_asked() {
        let grid = GridConfig {
            detectors: vec!["ORB".into()],
            descriptors: vec!["ORB".into()],
            skip_flann_binary: false,
            ..GridConfig::default()
        };
        assert_eq!(grid.combinations().len(), 2);
    }

    #[test]
    fn test_grid_skips_descriptor_only_detectors() {
        let grid = GridConfig {
            detectors: vec!["BRIEF".into(), "FAST".into()],
            descriptors: vec!["BRIEF".into()],
            ..GridConfig::default()
        };
        let keys = grid.combinations();
        assert_eq!(keys, vec![CombinationKey::new("FAST", "BRIEF", "BF")]);
    }
}
