use std::path::{Path, PathBuf};

use featbench_match::FallbackPolicy;
use serde::{Deserialize, Serialize};
use crate::error::ConfigError;
use crate::extract::TruncationPolicy;
use crate::harness::GridConfig;
use crate::pipeline::PipelineConfig;
use crate::registry::{resolve_descriptor, resolve_detector, MatcherKind, Strategy};
use crate::source::DEFAULT_MAX_SIDE;

/// Complete benchmark configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_image: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_image: Option<PathBuf>,
    /// Longest image side after loading; 0 keeps the original size
    pub max_image_side: u32,
    /// Worker threads when built with `parallel`; 0 uses every core
    pub threads: usize,
    /// Directory for per-combination match images; none disables them
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
    pub grid: GridConfig,
    pub pipeline: PipelineConfig,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            query_image: None,
            reference_image: None,
            max_image_side: DEFAULT_MAX_SIDE,
            threads: 0,
            output_dir: None,
            grid: GridConfig::default(),
            pipeline: PipelineConfig::default(),
        }
    }
}

impl BenchConfig {
    pub fn with_images(mut self, query: impl Into<PathBuf>, reference: impl Into<PathBuf>) -> Self {
        self.query_image = Some(query.into());
        self.reference_image = Some(reference.into());
        self
    }

    pub fn with_keypoint_cap(mut self, cap: usize) -> Self {
        self.pipeline.extraction.keypoint_cap = cap;
        self
    }

    pub fn with_truncation(mut self, policy: TruncationPolicy) -> Self {
        self.pipeline.extraction.truncation = policy;
        self
    }

    pub fn with_fallback(mut self, policy: FallbackPolicy) -> Self {
        self.pipeline.fallback = policy;
        self
    }

    /// Human-readable one-line summary
    pub fn summary(&self) -> String {
        format!(
            "BenchConfig: cap={}, truncation={:?}, fallback={}x{}, ransac={}px/{} iters, grid={} combinations",
            self.pipeline.extraction.keypoint_cap,
            self.pipeline.extraction.truncation,
            if self.pipeline.fallback.enabled { "on " } else { "off " },
            self.pipeline.fallback.second_neighbor_scale,
            self.pipeline.ransac.reprojection_threshold,
            self.pipeline.ransac.max_iterations,
            self.grid.combinations().len(),
        )
    }

    /// Checks every value a run depends on, including that strategy
    /// parameters construct
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pipeline.extraction.keypoint_cap == 0 {
            return Err(ConfigError::Invalid("keypoint_cap must be positive".into()));
        }
        self.pipeline.fallback.validate()?;
        self.pipeline.ransac.validate()?;

        for name in &self.grid.detectors {
            match Strategy::parse(name) {
                Some(s) if s.is_descriptor_only() => {}
                _ => {
                    resolve_detector(name, &self.pipeline.strategies)?;
                }
            }
        }
        for name in &self.grid.descriptors {
            resolve_descriptor(name, &self.pipeline.strategies)?;
        }
        for name in &self.grid.matchers {
            name.parse::<MatcherKind>()?;
        }
        Ok(())
    }

    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        write_file(path.as_ref(), &self.to_json()?)
    }

    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        Self::from_json(&read_file(path.as_ref())?)
    }

    pub fn save_toml<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        write_file(path.as_ref(), &self.to_toml()?)
    }

    pub fn load_toml<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        Self::from_toml(&read_file(path.as_ref())?)
    }

    /// Picks the format from the extension; anything but `.json` is read as TOML
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json")) {
            Self::load_json(path)
        } else {
            Self::load_toml(path)
        }
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }
}

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn write_file(path: &Path, contents: &str) -> Result<(), ConfigError> {
    std::fs::write(path, contents).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}
