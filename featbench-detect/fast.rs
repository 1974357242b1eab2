use featbench_core::{Image, Keypoint};
use crate::error::{DetectError, DetectResult};
use crate::types::CornerType;
use crate::utils::has_contiguous_arc;
use crate::DetectKeypoints;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// FAST requires a 3-pixel border on each side
const MIN_SIZE: u32 = 7;

/// Bresenham circle of radius 3, clockwise from 12 o'clock
pub const FAST_OFFSETS: [(i32, i32); 16] = [
    (0, -3), (1, -3), (2, -2), (3, -1),
    (3, 0), (3, 1), (2, 2), (1, 3),
    (0, 3), (-1, 3), (-2, 2), (-3, 1),
    (-3, 0), (-3, -1), (-2, -2), (-1, -3),
];

/// Size reported for every FAST keypoint (circle diameter)
pub const FAST_KEYPOINT_SIZE: f32 = 7.0;

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct FastParams {
    /// Intensity difference a ring pixel needs to count as brighter/darker
    pub threshold: u8,
    /// Contiguous ring pixels required (9 gives FAST-9/16)
    pub arc_length: usize,
    pub nonmax_suppression: bool,
}

impl Default for FastParams {
    fn default() -> Self {
        Self {
            threshold: 20,
            arc_length: 9,
            nonmax_suppression: true,
        }
    }
}

impl FastParams {
    pub fn with_threshold(threshold: u8) -> Self {
        Self {
            threshold,
            ..Self::default()
        }
    }
}

/// Segment-test corner detector.
///
/// Keypoints are emitted in raster order (row-major), which is the order the
/// extraction stage truncates in.
#[derive(Debug, Clone)]
pub struct FastDetector {
    params: FastParams,
}

impl FastDetector {
    /// Creates a new FAST detector with validation
    pub fn new(params: FastParams) -> DetectResult<Self> {
        // 0 would detect everything, >127 could cause issues with u8 arithmetic
        if params.threshold == 0 || params.threshold > 127 {
            return Err(DetectError::InvalidThreshold(params.threshold));
        }
        if params.arc_length < 9 || params.arc_length > 12 {
            return Err(DetectError::InvalidParameter {
                name: "arc_length",
                reason: "must be between 9 and 12",
            });
        }
        Ok(Self { params })
    }

    pub fn params(&self) -> &FastParams {
        &self.params
    }

    /// Classify one pixel with the segment test and return its corner score
    pub(crate) fn segment_test(&self, raw: &[u8], width: u32, x: u32, y: u32) -> (CornerType, f32) {
        let w = width as i32;
        let idx = |dx: i32, dy: i32| ((y as i32 + dy) * w + x as i32 + dx) as usize;

        let p = raw[idx(0, 0)] as i32;
        let t = self.params.threshold as i32;

        let mut bright_mask = 0u16;
        let mut dark_mask = 0u16;
        let mut bright_sum = 0i32;
        let mut dark_sum = 0i32;

        for (i, &(dx, dy)) in FAST_OFFSETS.iter().enumerate() {
            let q = raw[idx(dx, dy)] as i32;
            if q >= p + t {
                bright_mask |= 1 << i;
                bright_sum += q - p - t;
            } else if q <= p - t {
                dark_mask |= 1 << i;
                dark_sum += p - q - t;
            }
        }

        if has_contiguous_arc(bright_mask, self.params.arc_length) {
            (CornerType::Bright, (bright_sum + t) as f32)
        } else if has_contiguous_arc(dark_mask, self.params.arc_length) {
            (CornerType::Dark, (dark_sum + t) as f32)
        } else {
            (CornerType::None, 0.0)
        }
    }

    /// Corner candidates of one row as `(x, score)`
    fn scan_row(&self, raw: &[u8], width: u32, y: u32) -> Vec<(u32, f32)> {
        (3..width - 3)
            .filter_map(|x| match self.segment_test(raw, width, x, y) {
                (CornerType::None, _) => None,
                (_, score) => Some((x, score)),
            })
            .collect()
    }

    /// All pixels passing the segment test, raster order, before suppression
    pub fn detect_raw(&self, img: &Image) -> DetectResult<Vec<Keypoint>> {
        let (w, h) = img.dimensions();
        if w < MIN_SIZE || h < MIN_SIZE {
            return Err(DetectError::ImageTooSmall {
                width: w,
                height: h,
                min_size: MIN_SIZE,
            });
        }
        let raw = img.as_raw();

        let rows = 3..h - 3;
        #[cfg(feature = "parallel")]
        let rows = rows.into_par_iter();
        let per_row: Vec<(u32, Vec<(u32, f32)>)> = rows.map(|y| (y, self.scan_row(raw, w, y))).collect();

        let mut corners = Vec::new();
        for (y, row) in per_row {
            for (x, score) in row {
                corners.push(Keypoint::new(x as f32, y as f32, FAST_KEYPOINT_SIZE).with_response(score));
            }
        }
        Ok(corners)
    }

    /// 3x3 suppression on the score map; ties go to the earlier pixel in raster order
    fn suppress(corners: Vec<Keypoint>, width: u32, height: u32) -> Vec<Keypoint> {
        let mut score_map = vec![0.0f32; (width * height) as usize];
        for kp in &corners {
            score_map[(kp.y as u32 * width + kp.x as u32) as usize] = kp.response;
        }

        corners
            .into_iter()
            .filter(|kp| {
                let (x, y) = (kp.x as i32, kp.y as i32);
                (-1..=1).all(|dy: i32| {
                    (-1..=1).all(|dx: i32| {
                        if dx == 0 && dy == 0 {
                            return true;
                        }
                        let neighbour = score_map[((y + dy) as u32 * width + (x + dx) as u32) as usize];
                        let earlier = dy < 0 || (dy == 0 && dx < 0);
                        if earlier {
                            kp.response > neighbour
                        } else {
                            kp.response >= neighbour
                        }
                    })
                })
            })
            .collect()
    }
}

impl DetectKeypoints for FastDetector {
    fn detect(&self, img: &Image) -> DetectResult<Vec<Keypoint>> {
        let corners = self.detect_raw(img)?;
        if !self.params.nonmax_suppression {
            return Ok(corners);
        }
        let (w, h) = img.dimensions();
        Ok(Self::suppress(corners, w, h))
    }
}
