use std::path::PathBuf;

use featbench_core::{Candidate, Image, Keypoint};
use image::{imageops, DynamicImage, Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_circle_mut, draw_line_segment_mut};
use nalgebra::Point2;
use tracing::debug;
use crate::error::{BenchError, BenchResult};
use crate::harness::CombinationKey;

const OUTLINE: Rgb<u8> = Rgb([0, 255, 0]);
const OUTLINE_WIDTH: i32 = 2;

/// What a sink needs to draw one combination's matches
#[derive(Debug, Clone, Copy)]
pub struct MatchVisual<'a> {
    pub key: &'a CombinationKey,
    pub query: &'a Image,
    pub reference: &'a Image,
    pub query_keypoints: &'a [Keypoint],
    pub reference_keypoints: &'a [Keypoint],
    pub good_matches: &'a [Candidate],
    /// Query outline projected into the reference image
    pub corners: Option<[Point2<f64>; 4]>,
}

pub trait VisualizationSink {
    fn render(&mut self, visual: &MatchVisual<'_>) -> BenchResult<()>;
}

fn match_color(i: usize) -> Rgb<u8> {
    let h = (i as u32).wrapping_mul(2_654_435_761);
    Rgb([(h >> 24) as u8 | 0x40, (h >> 16) as u8 | 0x40, (h >> 8) as u8 | 0x40])
}

/// Query on the left, reference on the right, good matches joined by lines
/// and the projected outline drawn over the reference
pub fn compose(visual: &MatchVisual<'_>) -> RgbImage {
    let (qw, qh) = visual.query.dimensions();
    let (rw, rh) = visual.reference.dimensions();
    let mut canvas = RgbImage::new(qw + rw, qh.max(rh));
    imageops::overlay(&mut canvas, &DynamicImage::ImageLuma8(visual.query.clone()).into_rgb8(), 0, 0);
    imageops::overlay(
        &mut canvas,
        &DynamicImage::ImageLuma8(visual.reference.clone()).into_rgb8(),
        qw as i64,
        0,
    );

    let offset = qw as f32;
    for (i, m) in visual.good_matches.iter().enumerate() {
        let (Some(q), Some(r)) = (
            visual.query_keypoints.get(m.query_idx),
            visual.reference_keypoints.get(m.train_idx),
        ) else {
            continue;
        };
        let color = match_color(i);
        draw_hollow_circle_mut(&mut canvas, (q.x as i32, q.y as i32), 3, color);
        draw_hollow_circle_mut(&mut canvas, ((r.x + offset) as i32, r.y as i32), 3, color);
        draw_line_segment_mut(&mut canvas, (q.x, q.y), (r.x + offset, r.y), color);
    }

    if let Some(corners) = visual.corners {
        for i in 0..4 {
            let a = corners[i];
            let b = corners[(i + 1) % 4];
            for d in -OUTLINE_WIDTH / 2..=OUTLINE_WIDTH / 2 {
                let d = d as f32;
                draw_line_segment_mut(
                    &mut canvas,
                    (a.x as f32 + offset + d, a.y as f32 + d),
                    (b.x as f32 + offset + d, b.y as f32 + d),
                    OUTLINE,
                );
            }
        }
    }
    canvas
}

/// Writes `result_<detector>_<descriptor>_<matcher>.jpg` into a directory
#[derive(Debug, Clone)]
pub struct JpegSink {
    dir: PathBuf,
}

impl JpegSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, key: &CombinationKey) -> PathBuf {
        self.dir.join(format!("result_{key}.jpg"))
    }
}

impl VisualizationSink for JpegSink {
    fn render(&mut self, visual: &MatchVisual<'_>) -> BenchResult<()> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path_for(visual.key);
        compose(visual).save(&path).map_err(|source| BenchError::Encode {
            path: path.clone(),
            source,
        })?;
        debug!(path = %path.display(), "saved visualization");
        Ok(())
    }
}
