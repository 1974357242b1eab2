//! Closed strategy sets and name resolution.
//!
//! Names are matched case-insensitively. Detector, descriptor and matcher
//! strategies dispatch through the [`Detector`], [`Descriptor`] and
//! [`Matcher`] enums so the pipeline stays free of trait objects.

use std::fmt;
use std::str::FromStr;

use featbench_core::{Candidate, Descriptors, Image, Keypoint};
use featbench_describe::{
    BriefDescriptor, BriefParams, BriskDescriptor, DescribeKeypoints, DescribeResult, FreakDescriptor,
    OrbDescriptor, OrbDescriptorParams, SiftDescriptor, SiftDescriptorParams, SurfDescriptor,
};
use featbench_detect::{
    BriskDetector, BriskParams, DetectKeypoints, DetectResult, DogDetector, FastDetector, FastParams, HessianDetector,
    OrbDetector, OrbParams, SiftParams, SurfParams,
};
use featbench_match::{
    BruteForceMatcher, KdForestMatcher, KdForestParams, KnnMatch, LshMatcher, LshParams, MatcherResult, Metric,
};
use serde::{Deserialize, Serialize};
use tracing::debug;
use crate::error::RegistryError;

/// Every feature algorithm name the registry knows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    Sift,
    Surf,
    Orb,
    Brisk,
    Fast,
    Brief,
    Freak,
}

impl Strategy {
    pub const ALL: [Strategy; 7] = [
        Strategy::Sift,
        Strategy::Surf,
        Strategy::Orb,
        Strategy::Brisk,
        Strategy::Fast,
        Strategy::Brief,
        Strategy::Freak,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Sift => "SIFT",
            Strategy::Surf => "SURF",
            Strategy::Orb => "ORB",
            Strategy::Brisk => "BRISK",
            Strategy::Fast => "FAST",
            Strategy::Brief => "BRIEF",
            Strategy::Freak => "FREAK",
        }
    }

    /// Names with no detection capability
    pub fn is_descriptor_only(&self) -> bool {
        matches!(self, Strategy::Brief | Strategy::Freak)
    }

    /// Names with no description capability
    pub fn is_detector_only(&self) -> bool {
        matches!(self, Strategy::Fast)
    }

    /// Whether the descriptor of this name produces packed bits
    pub fn is_binary_descriptor(&self) -> bool {
        matches!(self, Strategy::Orb | Strategy::Brisk | Strategy::Brief | Strategy::Freak)
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str().eq_ignore_ascii_case(name.trim()))
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatcherKind {
    /// Exhaustive search
    Bf,
    /// Approximate index chosen from the descriptor kind
    Flann,
}

impl MatcherKind {
    pub const ALL: [MatcherKind; 2] = [MatcherKind::Bf, MatcherKind::Flann];

    pub fn as_str(&self) -> &'static str {
        match self {
            MatcherKind::Bf => "BF",
            MatcherKind::Flann => "FLANN",
        }
    }

    pub fn is_approximate(&self) -> bool {
        matches!(self, MatcherKind::Flann)
    }
}

impl FromStr for MatcherKind {
    type Err = RegistryError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(name.trim()))
            .ok_or_else(|| RegistryError::UnknownMatcher(name.to_string()))
    }
}

impl fmt::Display for MatcherKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Construction parameters for every strategy, passed through untouched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyParams {
    pub sift: SiftParams,
    pub sift_descriptor: SiftDescriptorParams,
    pub surf: SurfParams,
    pub orb: OrbParams,
    pub orb_descriptor: OrbDescriptorParams,
    pub brisk: BriskParams,
    pub fast: FastParams,
    pub brief: BriefParams,
    /// Localizes keypoints for descriptor-only strategies
    pub fallback_fast: FastParams,
    pub kd_forest: KdForestParams,
    pub lsh: LshParams,
}

impl Default for StrategyParams {
    fn default() -> Self {
        Self {
            sift: SiftParams::default(),
            sift_descriptor: SiftDescriptorParams::default(),
            surf: SurfParams::default(),
            orb: OrbParams::default(),
            orb_descriptor: OrbDescriptorParams::default(),
            brisk: BriskParams::default(),
            fast: FastParams::default(),
            brief: BriefParams::default(),
            fallback_fast: FastParams::with_threshold(20),
            kd_forest: KdForestParams::default(),
            lsh: LshParams::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Detector {
    Sift(DogDetector),
    Surf(HessianDetector),
    Orb(OrbDetector),
    Brisk(BriskDetector),
    Fast(FastDetector),
}

impl Detector {
    pub fn strategy(&self) -> Strategy {
        match self {
            Detector::Sift(_) => Strategy::Sift,
            Detector::Surf(_) => Strategy::Surf,
            Detector::Orb(_) => Strategy::Orb,
            Detector::Brisk(_) => Strategy::Brisk,
            Detector::Fast(_) => Strategy::Fast,
        }
    }
}

impl DetectKeypoints for Detector {
    fn detect(&self, img: &Image) -> DetectResult<Vec<Keypoint>> {
        match self {
            Detector::Sift(d) => d.detect(img),
            Detector::Surf(d) => d.detect(img),
            Detector::Orb(d) => d.detect(img),
            Detector::Brisk(d) => d.detect(img),
            Detector::Fast(d) => d.detect(img),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Descriptor {
    Sift(SiftDescriptor),
    Surf(SurfDescriptor),
    Orb(OrbDescriptor),
    Brief(BriefDescriptor),
    Freak(FreakDescriptor),
    Brisk(BriskDescriptor),
}

impl Descriptor {
    pub fn strategy(&self) -> Strategy {
        match self {
            Descriptor::Sift(_) => Strategy::Sift,
            Descriptor::Surf(_) => Strategy::Surf,
            Descriptor::Orb(_) => Strategy::Orb,
            Descriptor::Brief(_) => Strategy::Brief,
            Descriptor::Freak(_) => Strategy::Freak,
            Descriptor::Brisk(_) => Strategy::Brisk,
        }
    }

    fn inner(&self) -> &dyn DescribeKeypoints {
        match self {
            Descriptor::Sift(d) => d,
            Descriptor::Surf(d) => d,
            Descriptor::Orb(d) => d,
            Descriptor::Brief(d) => d,
            Descriptor::Freak(d) => d,
            Descriptor::Brisk(d) => d,
        }
    }
}

impl DescribeKeypoints for Descriptor {
    fn is_binary(&self) -> bool {
        self.inner().is_binary()
    }

    fn size(&self) -> usize {
        self.inner().size()
    }

    fn compute(&self, img: &Image, keypoints: &[Keypoint]) -> DescribeResult<Descriptors> {
        self.inner().compute(img, keypoints)
    }
}

#[derive(Debug, Clone)]
pub enum Matcher {
    BruteForce(BruteForceMatcher),
    KdForest(KdForestMatcher),
    Lsh(LshMatcher),
}

impl KnnMatch for Matcher {
    fn name(&self) -> &'static str {
        match self {
            Matcher::BruteForce(m) => m.name(),
            Matcher::KdForest(m) => m.name(),
            Matcher::Lsh(m) => m.name(),
        }
    }

    fn knn_match(&self, query: &Descriptors, train: &Descriptors, k: usize) -> MatcherResult<Vec<Vec<Candidate>>> {
        match self {
            Matcher::BruteForce(m) => m.knn_match(query, train, k),
            Matcher::KdForest(m) => m.knn_match(query, train, k),
            Matcher::Lsh(m) => m.knn_match(query, train, k),
        }
    }
}

pub fn resolve_detector(name: &str, params: &StrategyParams) -> Result<Detector, RegistryError> {
    let strategy = Strategy::parse(name).ok_or_else(|| RegistryError::UnknownDetector(name.to_string()))?;
    let detector = match strategy {
        Strategy::Sift => Detector::Sift(DogDetector::new(params.sift.clone())?),
        Strategy::Surf => Detector::Surf(HessianDetector::new(params.surf.clone())?),
        Strategy::Orb => Detector::Orb(OrbDetector::new(params.orb.clone())?),
        Strategy::Brisk => Detector::Brisk(BriskDetector::new(params.brisk.clone())?),
        Strategy::Fast => Detector::Fast(FastDetector::new(params.fast.clone())?),
        Strategy::Brief | Strategy::Freak => return Err(RegistryError::DescriptorOnly(strategy.to_string())),
    };
    Ok(detector)
}

/// Detector used to place keypoints for `name`.
///
/// Descriptor-only names get the fixed-threshold FAST detector from
/// `params.fallback_fast`; every other name resolves as a detector.
pub fn resolve_localizer(name: &str, params: &StrategyParams) -> Result<Detector, RegistryError> {
    match Strategy::parse(name) {
        Some(strategy) if strategy.is_descriptor_only() => {
            debug!(requested = %strategy, "descriptor-only detector, localizing with FAST");
            Ok(Detector::Fast(FastDetector::new(params.fallback_fast.clone())?))
        }
        _ => resolve_detector(name, params),
    }
}

pub fn resolve_descriptor(name: &str, params: &StrategyParams) -> Result<Descriptor, RegistryError> {
    let strategy = Strategy::parse(name).ok_or_else(|| RegistryError::UnknownDescriptor(name.to_string()))?;
    let descriptor = match strategy {
        Strategy::Sift => Descriptor::Sift(SiftDescriptor::new(params.sift_descriptor.clone())?),
        Strategy::Surf => Descriptor::Surf(SurfDescriptor::new(params.surf.extended)),
        Strategy::Orb => Descriptor::Orb(OrbDescriptor::new(params.orb_descriptor.clone())?),
        Strategy::Brief => Descriptor::Brief(BriefDescriptor::new(params.brief.clone())?),
        Strategy::Freak => Descriptor::Freak(FreakDescriptor::new()),
        Strategy::Brisk => Descriptor::Brisk(BriskDescriptor::new()),
        Strategy::Fast => return Err(RegistryError::DetectorOnly(strategy.to_string())),
    };
    Ok(descriptor)
}

/// Matcher for `name`; the approximate index is picked from `is_binary`
pub fn resolve_matcher(name: &str, is_binary: bool, params: &StrategyParams) -> Result<Matcher, RegistryError> {
    let matcher = match (name.parse::<MatcherKind>()?, is_binary) {
        (MatcherKind::Bf, binary) => Matcher::BruteForce(BruteForceMatcher::new(Metric::for_binary(binary))),
        (MatcherKind::Flann, true) => Matcher::Lsh(LshMatcher::new(params.lsh.clone())?),
        (MatcherKind::Flann, false) => Matcher::KdForest(KdForestMatcher::new(params.kd_forest.clone())?),
    };
    Ok(matcher)
}

/// False whenever `detector` names a descriptor-only strategy
pub fn is_valid_pair(detector: &str, _descriptor: &str) -> bool {
    !Strategy::parse(detector).is_some_and(|s| s.is_descriptor_only())
}
