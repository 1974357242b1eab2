use featbench_core::{Descriptors, Image, Keypoint};
use crate::error::DescribeResult;
use crate::sampling::{bilinear_sample, ensure_non_empty, map_keypoints};
use crate::DescribeKeypoints;

const GRID: usize = 4;
const SAMPLES_PER_CELL: usize = 5;
const MIN_SCALE: f32 = 1.0;
const MAX_SCALE: f32 = 6.0;

/// Sums of oriented Haar-like responses over a 4x4 grid, unit length.
///
/// The basic form stores `(sum dx, sum dy, sum |dx|, sum |dy|)` per cell (64
/// floats); the extended form splits each pair by the sign of the other
/// response (128 floats).
#[derive(Debug, Clone, Default)]
pub struct SurfDescriptor {
    extended: bool,
}

impl SurfDescriptor {
    pub fn new(extended: bool) -> Self {
        Self { extended }
    }

    pub fn is_extended(&self) -> bool {
        self.extended
    }

    fn describe(&self, img: &Image, kp: &Keypoint) -> Vec<f32> {
        let scale = (kp.size / 2.0).clamp(MIN_SCALE, MAX_SCALE);
        let (sin, cos) = kp.angle.sin_cos();
        let to_image = |u: f32, v: f32| (kp.x + cos * u - sin * v, kp.y + sin * u + cos * v);
        let per_cell = if self.extended { 8 } else { 4 };
        let half_window = (GRID * SAMPLES_PER_CELL) as f32 / 2.0;
        let weight_sigma = 3.3 * scale;

        let mut desc = Vec::with_capacity(GRID * GRID * per_cell);
        for cell_y in 0..GRID {
            for cell_x in 0..GRID {
                let mut sums = [0.0f32; 8];
                for sy in 0..SAMPLES_PER_CELL {
                    for sx in 0..SAMPLES_PER_CELL {
                        // Sample centre in the keypoint frame
                        let u = ((cell_x * SAMPLES_PER_CELL + sx) as f32 - half_window + 0.5) * scale;
                        let v = ((cell_y * SAMPLES_PER_CELL + sy) as f32 - half_window + 0.5) * scale;
                        let sample = |du: f32, dv: f32| {
                            let (x, y) = to_image(u + du, v + dv);
                            bilinear_sample(img, x, y)
                        };
                        let dx = sample(scale, 0.0) - sample(-scale, 0.0);
                        let dy = sample(0.0, scale) - sample(0.0, -scale);
                        let w = (-(u * u + v * v) / (2.0 * weight_sigma * weight_sigma)).exp();
                        let (dx, dy) = (dx * w, dy * w);

                        if self.extended {
                            let split = if dy >= 0.0 { 0 } else { 2 };
                            sums[split] += dx;
                            sums[split + 1] += dx.abs();
                            let split = if dx >= 0.0 { 4 } else { 6 };
                            sums[split] += dy;
                            sums[split + 1] += dy.abs();
                        } else {
                            sums[0] += dx;
                            sums[1] += dy;
                            sums[2] += dx.abs();
                            sums[3] += dy.abs();
                        }
                    }
                }
                desc.extend_from_slice(&sums[..per_cell]);
            }
        }

        let norm = desc.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            desc.iter_mut().for_each(|v| *v /= norm);
        }
        desc
    }
}

impl DescribeKeypoints for SurfDescriptor {
    fn is_binary(&self) -> bool {
        false
    }

    fn size(&self) -> usize {
        if self.extended { 128 } else { 64 }
    }

    fn compute(&self, img: &Image, keypoints: &[Keypoint]) -> DescribeResult<Descriptors> {
        ensure_non_empty(img)?;
        Ok(Descriptors::Float(map_keypoints(keypoints, |kp| self.describe(img, kp))))
    }
}
