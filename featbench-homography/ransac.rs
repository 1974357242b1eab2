use nalgebra::Point2;
use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::SeedableRng;
use tracing::debug;
use crate::dlt::dlt;
use crate::error::{HomographyError, HomographyResult};
use crate::Homography;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Correspondences drawn per hypothesis
pub const SAMPLE_SIZE: usize = 4;

/// Twice the triangle area below which three sample points count as collinear
const COLLINEAR_EPS: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RansacConfig {
    /// Max reprojection error in pixels for an inlier
    pub reprojection_threshold: f64,
    pub max_iterations: usize,
    /// Probability of drawing at least one all-inlier sample
    pub confidence: f64,
    pub seed: u64,
}

impl Default for RansacConfig {
    fn default() -> Self {
        Self {
            reprojection_threshold: 3.0,
            max_iterations: 2000,
            confidence: 0.995,
            seed: 0x5eed,
        }
    }
}

impl RansacConfig {
    pub fn validate(&self) -> HomographyResult<()> {
        if !(self.reprojection_threshold > 0.0) {
            return Err(HomographyError::InvalidParameter {
                name: "reprojection_threshold",
                reason: "must be positive",
            });
        }
        if self.max_iterations == 0 {
            return Err(HomographyError::InvalidParameter {
                name: "max_iterations",
                reason: "must be positive",
            });
        }
        if !(self.confidence > 0.0 && self.confidence < 1.0) {
            return Err(HomographyError::InvalidParameter {
                name: "confidence",
                reason: "must lie strictly between 0 and 1",
            });
        }
        Ok(())
    }

    /// Iterations needed to hit `confidence` at the given inlier ratio, capped
    /// at `max_iterations`
    pub fn required_iterations(&self, inlier_ratio: f64) -> usize {
        let w = inlier_ratio.clamp(0.0, 1.0).powi(SAMPLE_SIZE as i32);
        if w >= 1.0 {
            return 1;
        }
        if w <= 0.0 {
            return self.max_iterations;
        }
        let n = (1.0 - self.confidence).ln() / (1.0 - w).ln();
        if n.is_finite() {
            (n.ceil() as usize).clamp(1, self.max_iterations)
        } else {
            self.max_iterations
        }
    }
}

/// A fitted transform with the indices of the pairs that agree with it
#[derive(Debug, Clone, PartialEq)]
pub struct HomographyEstimate {
    pub homography: Homography,
    pub inliers: Vec<usize>,
    pub iterations: usize,
}

fn collinear(a: &Point2<f64>, b: &Point2<f64>, c: &Point2<f64>) -> bool {
    let cross = (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x);
    cross.abs() < COLLINEAR_EPS
}

/// True when any three of the sampled points lie on a line
fn degenerate_sample(points: &[Point2<f64>]) -> bool {
    let n = points.len();
    for i in 0..n {
        for j in i + 1..n {
            for k in j + 1..n {
                if collinear(&points[i], &points[j], &points[k]) {
                    return true;
                }
            }
        }
    }
    false
}

fn inliers_of(h: &Homography, src: &[Point2<f64>], dst: &[Point2<f64>], threshold: f64) -> Vec<usize> {
    let max_sq = threshold * threshold;
    src.iter()
        .zip(dst)
        .enumerate()
        .filter(|(_, (p, q))| h.project(p).is_some_and(|proj| (proj - *q).norm_squared() <= max_sq))
        .map(|(i, _)| i)
        .collect()
}

/// Robust `H` with `dst ~ H src`.
///
/// Draws minimal samples from a seeded generator, rejects samples with three
/// collinear points, keeps the largest consensus set and shrinks the
/// iteration budget as the inlier ratio improves. The winner is refit by
/// least squares over its inliers; the result must be finite and invertible.
pub fn find_homography(
    src: &[Point2<f64>],
    dst: &[Point2<f64>],
    config: &RansacConfig,
) -> HomographyResult<HomographyEstimate> {
    config.validate()?;
    if src.len() != dst.len() {
        return Err(HomographyError::LengthMismatch {
            src: src.len(),
            dst: dst.len(),
        });
    }
    let n = src.len();
    if n < SAMPLE_SIZE {
        return Err(HomographyError::TooFewCorrespondences { found: n });
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut best: Option<(Homography, Vec<usize>)> = None;
    let mut budget = config.max_iterations;
    let mut iterations = 0;

    while iterations < budget {
        iterations += 1;
        let picked = sample(&mut rng, n, SAMPLE_SIZE).into_vec();
        let s: Vec<Point2<f64>> = picked.iter().map(|&i| src[i]).collect();
        let d: Vec<Point2<f64>> = picked.iter().map(|&i| dst[i]).collect();
        if degenerate_sample(&s) || degenerate_sample(&d) {
            continue;
        }

        let Some(h) = dlt(&s, &d).ok().and_then(Homography::from_matrix) else {
            continue;
        };
        let inliers = inliers_of(&h, src, dst, config.reprojection_threshold);
        if best.as_ref().map_or(true, |(_, b)| inliers.len() > b.len()) {
            budget = config.required_iterations(inliers.len() as f64 / n as f64);
            best = Some((h, inliers));
        }
    }

    let Some((model, inliers)) = best.filter(|(_, inl)| inl.len() >= SAMPLE_SIZE) else {
        return Err(HomographyError::NoConsensus { iterations });
    };

    let s: Vec<Point2<f64>> = inliers.iter().map(|&i| src[i]).collect();
    let d: Vec<Point2<f64>> = inliers.iter().map(|&i| dst[i]).collect();
    let (homography, inliers) = match dlt(&s, &d).ok().and_then(Homography::from_matrix) {
        Some(refit) => {
            let refit_inliers = inliers_of(&refit, src, dst, config.reprojection_threshold);
            if refit_inliers.len() >= inliers.len() {
                (refit, refit_inliers)
            } else {
                (model, inliers)
            }
        }
        None => (model, inliers),
    };

    debug!(iterations, inliers = inliers.len(), total = n, "RANSAC finished");
    Ok(HomographyEstimate {
        homography,
        inliers,
        iterations,
    })
}
