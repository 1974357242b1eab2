use std::path::PathBuf;

use featbench_core::FeatureError;
use featbench_describe::DescribeError;
use featbench_detect::DetectError;
use featbench_homography::HomographyError;
use featbench_match::MatchError;
use thiserror::Error;

/// Name resolution and strategy construction failures
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegistryError {
    #[error("unknown detector: {0}")]
    UnknownDetector(String),

    #[error("unknown descriptor: {0}")]
    UnknownDescriptor(String),

    #[error("unknown matcher: {0}")]
    UnknownMatcher(String),

    #[error("{0} only describes keypoints and cannot detect them")]
    DescriptorOnly(String),

    #[error("{0} only detects keypoints and cannot describe them")]
    DetectorOnly(String),

    #[error("invalid pairing: {detector} detector with {descriptor} descriptor")]
    InvalidPair { detector: String, descriptor: String },

    #[error("detector construction failed: {0}")]
    Detect(#[from] DetectError),

    #[error("descriptor construction failed: {0}")]
    Describe(#[from] DescribeError),

    #[error("matcher construction failed: {0}")]
    Match(#[from] MatchError),
}

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("no descriptors were computed for the {image} image")]
    EmptyDescriptors { image: &'static str },

    #[error(transparent)]
    Detect(#[from] DetectError),

    #[error(transparent)]
    Describe(#[from] DescribeError),

    #[error(transparent)]
    Feature(#[from] FeatureError),
}

/// Why a single combination ended without a recorded result
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Match(#[from] MatchError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read or write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid TOML: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("TOML serialization failed: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Match(#[from] MatchError),

    #[error(transparent)]
    Homography(#[from] HomographyError),
}

/// Failures that end the whole run
#[derive(Debug, Error)]
pub enum BenchError {
    #[error("the {which} image is empty")]
    EmptyImage { which: &'static str },

    #[error("failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("failed to encode visualization {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[cfg(feature = "parallel")]
    #[error("thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

pub type BenchResult<T> = Result<T, BenchError>;
