#![allow(dead_code)]

use image::{GrayImage, Luma};
use nalgebra::{Matrix3, Point2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Overlapping rectangles of random intensity inside a `margin` border of black
pub fn rectangles(size: u32, margin: u32, count: usize, seed: u64) -> GrayImage {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut img = GrayImage::new(size, size);
    for _ in 0..count {
        let w = rng.random_range(8..36);
        let h = rng.random_range(8..36);
        let x0 = rng.random_range(margin..size - margin - w);
        let y0 = rng.random_range(margin..size - margin - h);
        let value = rng.random_range(60u8..=255);
        for y in y0..y0 + h {
            for x in x0..x0 + w {
                img.put_pixel(x, y, Luma([value]));
            }
        }
    }
    img
}

/// Adds seeded uniform noise in `-amplitude..=amplitude` to every pixel
pub fn noisy(img: &GrayImage, amplitude: i16, seed: u64) -> GrayImage {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut out = img.clone();
    for p in out.pixels_mut() {
        let v = p[0] as i16 + rng.random_range(-amplitude..=amplitude);
        p[0] = v.clamp(0, 255) as u8;
    }
    out
}

/// Rotation by `angle` radians and isotropic `scale` about the image centre
pub fn similarity(size: u32, angle: f64, scale: f64, shift: (f64, f64)) -> Matrix3<f64> {
    let c = size as f64 / 2.0;
    let (sin, cos) = angle.sin_cos();
    let to_origin = Matrix3::new(1.0, 0.0, -c, 0.0, 1.0, -c, 0.0, 0.0, 1.0);
    let rotate = Matrix3::new(scale * cos, -scale * sin, 0.0, scale * sin, scale * cos, 0.0, 0.0, 0.0, 1.0);
    let back = Matrix3::new(1.0, 0.0, c + shift.0, 0.0, 1.0, c + shift.1, 0.0, 0.0, 1.0);
    back * rotate * to_origin
}

pub fn apply(m: &Matrix3<f64>, p: Point2<f64>) -> Point2<f64> {
    let v = m * p.to_homogeneous();
    Point2::new(v.x / v.z, v.y / v.z)
}

/// Output pixel `p` takes the bilinear sample at `m^-1 p`; outside is black
pub fn warp(img: &GrayImage, m: &Matrix3<f64>) -> GrayImage {
    let inv = m.try_inverse().expect("invertible transform");
    let (w, h) = img.dimensions();
    GrayImage::from_fn(w, h, |x, y| {
        let src = apply(&inv, Point2::new(x as f64, y as f64));
        let (x0, y0) = (src.x.floor(), src.y.floor());
        if x0 < 0.0 || y0 < 0.0 || x0 + 1.0 >= w as f64 || y0 + 1.0 >= h as f64 {
            return Luma([0]);
        }
        let (fx, fy) = (src.x - x0, src.y - y0);
        let (xi, yi) = (x0 as u32, y0 as u32);
        let px = |dx: u32, dy: u32| img.get_pixel(xi + dx, yi + dy)[0] as f64;
        let top = px(0, 0) * (1.0 - fx) + px(1, 0) * fx;
        let bottom = px(0, 1) * (1.0 - fx) + px(1, 1) * fx;
        Luma([(top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8])
    })
}
