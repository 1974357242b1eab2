//! Robust planar homography estimation.
//!
//! [`find_homography`] fits `dst ~ H src` with RANSAC over minimal samples
//! and a normalized DLT refit. [`correspondences`] turns ratio-filtered
//! matches into point pairs, and [`project_corners`] maps an image outline
//! through the fitted transform.

mod error;

pub mod dlt;
pub mod ransac;

pub use error::{HomographyError, HomographyResult};
pub use ransac::{find_homography, HomographyEstimate, RansacConfig, SAMPLE_SIZE};

use featbench_core::{Candidate, Keypoint};
use nalgebra::{Matrix3, Point2};
use tracing::debug;

/// Smallest |det| accepted for a transform scaled to `H[2,2] == 1`
const MIN_DETERMINANT: f64 = 1e-10;

/// A finite, invertible 3x3 projective transform
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Homography(Matrix3<f64>);

impl Homography {
    pub fn identity() -> Self {
        Self(Matrix3::identity())
    }

    /// `None` for non-finite or singular matrices
    pub fn from_matrix(m: Matrix3<f64>) -> Option<Self> {
        if !m.iter().all(|v| v.is_finite()) {
            return None;
        }
        let scale = m.norm();
        if scale <= f64::EPSILON {
            return None;
        }
        // determinant of the unit-norm matrix, so the test ignores overall scale
        if (m / scale).determinant().abs() < MIN_DETERMINANT {
            return None;
        }
        Some(Self(m))
    }

    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.0
    }

    /// Image of `p`, or `None` when it maps to the line at infinity
    pub fn project(&self, p: &Point2<f64>) -> Option<Point2<f64>> {
        let v = self.0 * p.to_homogeneous();
        if v.z.abs() <= f64::EPSILON {
            return None;
        }
        Some(Point2::new(v.x / v.z, v.y / v.z))
    }

    pub fn inverse(&self) -> Option<Self> {
        self.0.try_inverse().and_then(Self::from_matrix)
    }
}

/// Corners `(0,0) (w,0) (w,h) (0,h)` of a `width` x `height` image mapped through `h`
pub fn project_corners(h: &Homography, width: u32, height: u32) -> Option<[Point2<f64>; 4]> {
    let (w, ht) = (width as f64, height as f64);
    Some([
        h.project(&Point2::new(0.0, 0.0))?,
        h.project(&Point2::new(w, 0.0))?,
        h.project(&Point2::new(w, ht))?,
        h.project(&Point2::new(0.0, ht))?,
    ])
}

/// Source and destination points for `matches`; pairs whose indices fall
/// outside either keypoint list are dropped
pub fn correspondences(
    matches: &[Candidate],
    query: &[Keypoint],
    train: &[Keypoint],
) -> (Vec<Point2<f64>>, Vec<Point2<f64>>) {
    let (src, dst): (Vec<_>, Vec<_>) = matches
        .iter()
        .filter_map(|m| {
            let q = query.get(m.query_idx)?;
            let t = train.get(m.train_idx)?;
            Some((
                Point2::new(q.x as f64, q.y as f64),
                Point2::new(t.x as f64, t.y as f64),
            ))
        })
        .unzip();
    if src.len() < matches.len() {
        debug!(dropped = matches.len() - src.len(), "stale match indices");
    }
    (src, dst)
}
