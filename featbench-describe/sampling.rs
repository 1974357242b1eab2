//! Sub-pixel sampling shared by the descriptors.

use featbench_core::{Image, Keypoint};
use image::{ImageBuffer, Luma};
use imageproc::filter::gaussian_blur_f32;
use imageproc::integral_image::integral_image;
use crate::error::{DescribeError, DescribeResult};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

pub(crate) type Integral = ImageBuffer<Luma<u32>, Vec<u32>>;

pub(crate) fn ensure_non_empty(img: &Image) -> DescribeResult<()> {
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return Err(DescribeError::EmptyImage { width, height });
    }
    Ok(())
}

/// Bilinear interpolation; samples outside the image clamp to the nearest edge pixel
pub fn bilinear_sample(img: &Image, x: f32, y: f32) -> f32 {
    let (w, h) = (img.width() as usize, img.height() as usize);
    let raw = img.as_raw();
    let x0 = x.floor();
    let y0 = y.floor();

    if x0 < 0.0 || y0 < 0.0 || x0 + 1.0 >= w as f32 || y0 + 1.0 >= h as f32 {
        let cx = x.round().clamp(0.0, (w - 1) as f32) as usize;
        let cy = y.round().clamp(0.0, (h - 1) as f32) as usize;
        return raw[cy * w + cx] as f32;
    }

    let dx = x - x0;
    let dy = y - y0;
    let (xi, yi) = (x0 as usize, y0 as usize);

    let p00 = raw[yi * w + xi] as f32;
    let p10 = raw[yi * w + xi + 1] as f32;
    let p01 = raw[(yi + 1) * w + xi] as f32;
    let p11 = raw[(yi + 1) * w + xi + 1] as f32;

    let top = p00 * (1.0 - dx) + p10 * dx;
    let bottom = p01 * (1.0 - dx) + p11 * dx;
    top * (1.0 - dy) + bottom * dy
}

/// Gaussian pre-smoothing for the point-pair tests
pub fn smooth(img: &Image, sigma: f32) -> Image {
    if sigma <= 0.0 {
        img.clone()
    } else {
        gaussian_blur_f32(img, sigma)
    }
}

pub(crate) fn integral(img: &Image) -> Integral {
    integral_image::<_, u32>(img)
}

/// Mean intensity of the square of half-width `radius` around `(x, y)`.
///
/// Radii below one pixel fall back to a bilinear sample; the square is
/// clipped to the image.
pub(crate) fn box_mean(img: &Image, integral: &Integral, x: f32, y: f32, radius: f32) -> f32 {
    if radius < 1.0 {
        return bilinear_sample(img, x, y);
    }
    let (w, h) = (img.width() as i64, img.height() as i64);
    let r = radius.round() as i64;
    let (cx, cy) = (x.round() as i64, y.round() as i64);
    let x0 = (cx - r).clamp(0, w);
    let y0 = (cy - r).clamp(0, h);
    let x1 = (cx + r + 1).clamp(0, w);
    let y1 = (cy + r + 1).clamp(0, h);
    if x1 <= x0 || y1 <= y0 {
        return bilinear_sample(img, x, y);
    }

    let at = |x: i64, y: i64| integral.get_pixel(x as u32, y as u32)[0] as i64;
    let sum = at(x1, y1) - at(x0, y1) - at(x1, y0) + at(x0, y0);
    sum as f32 / ((x1 - x0) * (y1 - y0)) as f32
}

/// Central-difference gradient at an integer pixel, clamped at the border
pub(crate) fn gradient(img: &Image, x: i64, y: i64) -> (f32, f32) {
    let (w, h) = (img.width() as i64, img.height() as i64);
    let p = |x: i64, y: i64| img.get_pixel(x.clamp(0, w - 1) as u32, y.clamp(0, h - 1) as u32)[0] as f32;
    (p(x + 1, y) - p(x - 1, y), p(x, y + 1) - p(x, y - 1))
}

/// Set bit `i` of a little-endian bit string
#[inline]
pub(crate) fn set_bit(bytes: &mut [u8], i: usize) {
    bytes[i / 8] |= 1 << (i % 8);
}

/// Per-keypoint map, parallel when the `parallel` feature is on; order is preserved
pub(crate) fn map_keypoints<T, F>(keypoints: &[Keypoint], f: F) -> Vec<T>
where
    T: Send,
    F: Fn(&Keypoint) -> T + Sync + Send,
{
    #[cfg(feature = "parallel")]
    {
        keypoints.par_iter().map(f).collect()
    }
    #[cfg(not(feature = "parallel"))]
    {
        keypoints.iter().map(f).collect()
    }
}
