use featbench_core::{Image, Keypoint};
use crate::types::ScoredKeypoint;

/// Orientation, corner scoring and suppression helpers shared by the detectors
pub struct KeypointRefinement;

impl KeypointRefinement {
    /// Orientation from the intensity centroid of a circular patch (radians).
    ///
    /// The patch is clipped to the image; a flat patch yields 0.
    pub fn compute_orientation(img: &Image, x: f32, y: f32, patch_size: usize) -> f32 {
        let (w, h) = (img.width() as i32, img.height() as i32);
        let raw = img.as_raw();
        let half = (patch_size / 2) as i32;
        let radius_sq = half * half;
        let (cx, cy) = (x.round() as i32, y.round() as i32);

        let mut m10 = 0i64;
        let mut m01 = 0i64;

        for dy in -half..=half {
            let yy = cy + dy;
            if yy < 0 || yy >= h {
                continue;
            }
            for dx in -half..=half {
                let xx = cx + dx;
                if xx < 0 || xx >= w || dx * dx + dy * dy > radius_sq {
                    continue;
                }
                let val = raw[(yy * w + xx) as usize] as i64;
                m10 += dx as i64 * val;
                m01 += dy as i64 * val;
            }
        }

        if m10 == 0 && m01 == 0 {
            0.0
        } else {
            (m01 as f32).atan2(m10 as f32)
        }
    }

    /// Harris corner response over a 7x7 window of Sobel gradients
    pub fn harris_response(img: &Image, x: u32, y: u32) -> f32 {
        const HALF: i32 = 3;
        let (w, h) = (img.width() as i32, img.height() as i32);
        let (x, y) = (x as i32, y as i32);
        if x < HALF + 1 || y < HALF + 1 || x >= w - HALF - 1 || y >= h - HALF - 1 {
            return 0.0;
        }

        let mut ixx = 0.0f64;
        let mut ixy = 0.0f64;
        let mut iyy = 0.0f64;

        for dy in -HALF..=HALF {
            for dx in -HALF..=HALF {
                let (gx, gy) = Self::sobel(img, (x + dx) as u32, (y + dy) as u32);
                ixx += (gx * gx) as f64;
                ixy += (gx * gy) as f64;
                iyy += (gy * gy) as f64;
            }
        }

        // det(M) - k * trace(M)^2
        let k = 0.04f64;
        let det = ixx * iyy - ixy * ixy;
        let trace = ixx + iyy;
        (det - k * trace * trace) as f32
    }

    /// Sobel gradients, caller guarantees a 1-pixel border
    fn sobel(img: &Image, x: u32, y: u32) -> (f32, f32) {
        let p = |dx: i32, dy: i32| img.get_pixel((x as i32 + dx) as u32, (y as i32 + dy) as u32)[0] as f32;

        let gx = p(1, -1) + 2.0 * p(1, 0) + p(1, 1) - p(-1, -1) - 2.0 * p(-1, 0) - p(-1, 1);
        let gy = p(-1, 1) + 2.0 * p(0, 1) + p(1, 1) - p(-1, -1) - 2.0 * p(0, -1) - p(1, -1);

        (gx / 8.0, gy / 8.0)
    }

    /// Greedy radius suppression, strongest first.
    ///
    /// The survivors come back ordered by decreasing response.
    pub fn non_maximum_suppression(keypoints: &[ScoredKeypoint], min_distance: f32) -> Vec<ScoredKeypoint> {
        if keypoints.is_empty() {
            return Vec::new();
        }

        let mut sorted_keypoints = keypoints.to_vec();
        sorted_keypoints.sort_by(|a, b| b.response.total_cmp(&a.response));

        let mut suppressed: Vec<ScoredKeypoint> = Vec::new();
        let min_distance_sq = min_distance * min_distance;

        for candidate in sorted_keypoints {
            let is_local_max = suppressed.iter().all(|existing| {
                let dx = candidate.keypoint.x - existing.keypoint.x;
                let dy = candidate.keypoint.y - existing.keypoint.y;
                dx * dx + dy * dy >= min_distance_sq
            });

            if is_local_max {
                suppressed.push(candidate);
            }
        }

        suppressed
    }

    /// Keep the `n` keypoints with the largest response; stable on ties
    pub fn retain_best(keypoints: &mut Vec<Keypoint>, n: usize) {
        if n == 0 || keypoints.len() <= n {
            return;
        }
        keypoints.sort_by(|a, b| b.response.total_cmp(&a.response));
        keypoints.truncate(n);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    fn square_image(size: u32) -> Image {
        GrayImage::from_fn(size, size, |x, y| {
            let c = size / 2;
            if x.abs_diff(c) <= 4 && y.abs_diff(c) <= 4 {
                Luma([220])
            } else {
                Luma([40])
            }
        })
    }

    fn scored(x: f32, y: f32, response: f32) -> ScoredKeypoint {
        ScoredKeypoint {
            keypoint: Keypoint::new(x, y, 7.0).with_response(response),
            response,
        }
    }

    #[test]
    fn test_orientation_points_at_bright_side() {
        // Bright half-plane to the right of the keypoint
        let img = GrayImage::from_fn(41, 41, |x, _| if x > 20 { Luma([200]) } else { Luma([0]) });
        let angle = KeypointRefinement::compute_orientation(&img, 20.0, 20.0, 15);
        assert!(angle.abs() < 1e-3, "angle was {}", angle);

        let flat = GrayImage::from_pixel(41, 41, Luma([90]));
        assert_eq!(KeypointRefinement::compute_orientation(&flat, 20.0, 20.0, 15), 0.0);
    }

    #[test]
    fn test_harris_prefers_corner_over_flat() {
        let img = square_image(40);
        let corner = KeypointRefinement::harris_response(&img, 16, 16);
        let flat = KeypointRefinement::harris_response(&img, 6, 6);
        assert!(corner > 0.0);
        assert_eq!(flat, 0.0);
        assert_eq!(KeypointRefinement::harris_response(&img, 1, 1), 0.0);
    }

    #[test]
    fn test_non_maximum_suppression_spacing() {
        let input = vec![scored(10.0, 10.0, 1.0), scored(11.0, 10.0, 5.0), scored(30.0, 30.0, 2.0)];
        let kept = KeypointRefinement::non_maximum_suppression(&input, 3.0);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].response, 5.0);
        assert_eq!(kept[1].response, 2.0);
    }

    #[test]
    fn test_retain_best() {
        let mut kps: Vec<Keypoint> = [3.0, 9.0, 1.0, 7.0]
            .iter()
            .map(|&r| Keypoint::new(0.0, 0.0, 7.0).with_response(r))
            .collect();
        KeypointRefinement::retain_best(&mut kps, 2);
        let responses: Vec<f32> = kps.iter().map(|k| k.response).collect();
        assert_eq!(responses, vec![9.0, 7.0]);
    }
}
