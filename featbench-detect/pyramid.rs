use featbench_core::Image;
use image::imageops::{self, FilterType};
use crate::types::ScaleLevel;

/// Smallest side a pyramid level may have before the pyramid stops growing
const MIN_LEVEL_SIZE: u32 = 32;

/// Image pyramid operations for multi-scale feature detection
pub struct ImagePyramid;

impl ImagePyramid {
    /// Generate up to `max_levels` scale levels, each `scale_factor` smaller than the last
    pub fn generate_scale_levels(width: u32, height: u32, scale_factor: f32, max_levels: usize) -> Vec<ScaleLevel> {
        let mut levels = Vec::new();
        let mut current_scale = 1.0f32;

        for level in 0..max_levels {
            let scaled_width = (width as f32 / current_scale).round() as u32;
            let scaled_height = (height as f32 / current_scale).round() as u32;

            // Stop when image becomes too small for meaningful detection
            if scaled_width < MIN_LEVEL_SIZE || scaled_height < MIN_LEVEL_SIZE {
                break;
            }

            levels.push(ScaleLevel {
                level,
                scale: current_scale,
                width: scaled_width,
                height: scaled_height,
            });

            current_scale *= scale_factor;
        }

        levels
    }

    /// Build image pyramid from base image
    pub fn build_image_pyramid(img: &Image, scale_levels: &[ScaleLevel]) -> Vec<Image> {
        scale_levels
            .iter()
            .map(|scale_level| {
                if scale_level.level == 0 {
                    img.clone()
                } else {
                    imageops::resize(img, scale_level.width, scale_level.height, FilterType::Triangle)
                }
            })
            .collect()
    }
}
