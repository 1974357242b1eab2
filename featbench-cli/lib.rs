//! Feature-matching benchmark harness.
//!
//! Crosses detector, descriptor and matcher strategies over a pair of
//! images. Each combination extracts capped feature sets, matches them with
//! k=2 neighbours, keeps matches that pass the ratio test and fits a RANSAC
//! homography; the harness records one [`MatchResult`] per combination and
//! ranks them by good matches and by speed.
//!
//! ```no_run
//! use featbench::{FileImageSource, GridConfig, Harness, PipelineConfig, TableReporter};
//!
//! let source = FileImageSource::new("box.png", "box_in_scene.png");
//! let mut harness = Harness::new(PipelineConfig::default()).with_reporter(TableReporter::stdout());
//! let results = harness.run_grid(&source, &GridConfig::default())?;
//! println!("{:?}", results.best_by_quality().map(|r| &r.key));
//! # Ok::<(), featbench::BenchError>(())
//! ```

mod error;

pub mod config;
pub mod extract;
pub mod harness;
pub mod pipeline;
pub mod registry;
pub mod report;
pub mod source;
pub mod visualize;

pub use config::BenchConfig;
pub use error::{BenchError, BenchResult, ConfigError, ExtractionError, PipelineError, RegistryError};
pub use extract::{extract_features, ExtractionConfig, TruncationPolicy, DEFAULT_KEYPOINT_CAP};
pub use harness::{
    BenchmarkResults, CombinationKey, CombinationRecord, GridConfig, Harness, MatchResult, Outcome, Stage,
};
pub use pipeline::{run_combination, CombinationArtifacts, CombinationFailure, CombinationRun, PipelineConfig};
pub use registry::{
    is_valid_pair, resolve_descriptor, resolve_detector, resolve_localizer, resolve_matcher, Descriptor, Detector,
    Matcher, MatcherKind, Strategy, StrategyParams,
};
pub use report::{JsonReporter, Reporter, TableReporter};
pub use source::{limit_size, FileImageSource, ImagePair, ImageSource, InMemorySource, DEFAULT_MAX_SIDE};
pub use visualize::{compose, JpegSink, MatchVisual, VisualizationSink};

pub use featbench_core;
pub use featbench_describe;
pub use featbench_detect;
pub use featbench_homography;
pub use featbench_match;

/// Sets up the global worker pool; 0 uses every core
#[cfg(feature = "parallel")]
pub fn init_workers(threads: usize) -> BenchResult<()> {
    let n = if threads == 0 { featbench_core::default_threads() } else { threads };
    featbench_core::init_thread_pool(n)?;
    Ok(())
}
