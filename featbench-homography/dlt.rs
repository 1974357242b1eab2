//! Normalized direct linear transform.

use nalgebra::{DMatrix, Matrix3, Point2};
use crate::error::{HomographyError, HomographyResult};

/// Translate to the centroid and scale so the mean distance from it is sqrt(2).
///
/// Returns the normalized points and the similarity that produced them, or
/// `None` when every point coincides.
pub fn normalize_points(points: &[Point2<f64>]) -> Option<(Vec<Point2<f64>>, Matrix3<f64>)> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f64;
    let (sx, sy) = points.iter().fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
    let (cx, cy) = (sx / n, sy / n);
    let mean_dist = points
        .iter()
        .map(|p| ((p.x - cx).powi(2) + (p.y - cy).powi(2)).sqrt())
        .sum::<f64>()
        / n;
    if mean_dist <= f64::EPSILON {
        return None;
    }

    let s = std::f64::consts::SQRT_2 / mean_dist;
    let t = Matrix3::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0);
    let normalized = points
        .iter()
        .map(|p| Point2::new(s * (p.x - cx), s * (p.y - cy)))
        .collect();
    Some((normalized, t))
}

/// Least-squares `H` with `dst ~ H src` over all given pairs.
///
/// Solves `A h = 0` by SVD on the stacked design matrix, padded to 9x9 when
/// only four pairs are given, and scales the result so `H[2,2] == 1` where
/// possible.
pub fn dlt(src: &[Point2<f64>], dst: &[Point2<f64>]) -> HomographyResult<Matrix3<f64>> {
    if src.len() != dst.len() {
        return Err(HomographyError::LengthMismatch {
            src: src.len(),
            dst: dst.len(),
        });
    }
    let n = src.len();
    if n < 4 {
        return Err(HomographyError::TooFewCorrespondences { found: n });
    }

    let (src_n, t_src) = normalize_points(src).ok_or(HomographyError::Degenerate)?;
    let (dst_n, t_dst) = normalize_points(dst).ok_or(HomographyError::Degenerate)?;

    let rows = (2 * n).max(9);
    let mut a = DMatrix::<f64>::zeros(rows, 9);
    for (i, (p, q)) in src_n.iter().zip(&dst_n).enumerate() {
        let (x, y, u, v) = (p.x, p.y, q.x, q.y);
        let r0 = 2 * i;
        let r1 = r0 + 1;

        a[(r0, 0)] = -x;
        a[(r0, 1)] = -y;
        a[(r0, 2)] = -1.0;
        a[(r0, 6)] = u * x;
        a[(r0, 7)] = u * y;
        a[(r0, 8)] = u;

        a[(r1, 3)] = -x;
        a[(r1, 4)] = -y;
        a[(r1, 5)] = -1.0;
        a[(r1, 6)] = v * x;
        a[(r1, 7)] = v * y;
        a[(r1, 8)] = v;
    }

    let svd = a.svd(false, true);
    let v_t = svd.v_t.ok_or(HomographyError::Degenerate)?;
    let null = v_t.row(svd.singular_values.imin());

    let h_n = Matrix3::from_fn(|r, c| null[3 * r + c]);
    let t_dst_inv = t_dst.try_inverse().ok_or(HomographyError::Degenerate)?;
    let mut h = t_dst_inv * h_n * t_src;

    let scale = h[(2, 2)];
    if scale.abs() > f64::EPSILON {
        h /= scale;
    } else {
        let norm = h.norm();
        if norm <= f64::EPSILON {
            return Err(HomographyError::Degenerate);
        }
        h /= norm;
    }
    Ok(h)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalized_points_are_centred() {
        let pts = vec![
            Point2::new(10.0, 10.0),
            Point2::new(30.0, 10.0),
            Point2::new(30.0, 50.0),
            Point2::new(10.0, 50.0),
        ];
        let (norm, t) = normalize_points(&pts).unwrap();
        let cx: f64 = norm.iter().map(|p| p.x).sum::<f64>() / 4.0;
        let cy: f64 = norm.iter().map(|p| p.y).sum::<f64>() / 4.0;
        assert!(cx.abs() < 1e-12 && cy.abs() < 1e-12);

        let mean = norm.iter().map(|p| p.coords.norm()).sum::<f64>() / 4.0;
        assert!((mean - std::f64::consts::SQRT_2).abs() < 1e-12);

        let mapped = t * pts[2].to_homogeneous();
        assert!((mapped.x - norm[2].x).abs() < 1e-12);
    }

    #[test]
    fn test_coincident_points_cannot_normalize() {
        assert!(normalize_points(&[Point2::new(1.0, 1.0); 4]).is_none());
    }

    #[test]
    fn test_dlt_recovers_translation() {
        let src = vec![
            Point2::new(0.0, 0.0),
            Point2::new(100.0, 0.0),
            Point2::new(100.0, 80.0),
            Point2::new(0.0, 80.0),
            Point2::new(40.0, 30.0),
        ];
        let dst: Vec<_> = src.iter().map(|p| Point2::new(p.x + 7.0, p.y - 3.0)).collect();
        let h = dlt(&src, &dst).unwrap();
        let expected = Matrix3::new(1.0, 0.0, 7.0, 0.0, 1.0, -3.0, 0.0, 0.0, 1.0);
        assert!((h - expected).abs().max() < 1e-9);
    }

    #[test]
    fn test_dlt_length_checks() {
        let p = vec![Point2::new(0.0, 0.0); 3];
        assert_eq!(dlt(&p, &p), Err(HomographyError::TooFewCorrespondences { found: 3 }));
        assert!(matches!(dlt(&p, &p[..2]), Err(HomographyError::LengthMismatch { .. })));
    }
}
