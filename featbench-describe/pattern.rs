//! Concentric sampling patterns for the retina-style binary descriptors.

use std::f32::consts::TAU;

use featbench_core::Image;
use crate::sampling::{box_mean, Integral};

/// Pattern point in unit-scale coordinates with its smoothing radius
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct PatternPoint {
    pub x: f32,
    pub y: f32,
    pub sigma: f32,
}

/// `count` points evenly spaced on a circle, starting at `phase` radians
pub(crate) fn ring(radius: f32, count: usize, phase: f32, sigma: f32) -> impl Iterator<Item = PatternPoint> {
    (0..count).map(move |k| {
        let theta = phase + TAU * k as f32 / count as f32;
        PatternPoint {
            x: radius * theta.cos(),
            y: radius * theta.sin(),
            sigma,
        }
    })
}

/// Smoothed intensity of every pattern point around `(cx, cy)`
pub(crate) fn sample_points(
    img: &Image,
    integral: &Integral,
    points: &[PatternPoint],
    (cx, cy): (f32, f32),
    scale: f32,
    angle: f32,
) -> Vec<f32> {
    let (s, c) = angle.sin_cos();
    points
        .iter()
        .map(|p| {
            let (px, py) = (p.x * scale, p.y * scale);
            box_mean(img, integral, cx + c * px - s * py, cy + s * px + c * py, p.sigma * scale)
        })
        .collect()
}

/// Direction of the mean local gradient over `pairs`, radians
pub(crate) fn gradient_orientation(points: &[PatternPoint], intensities: &[f32], pairs: &[(usize, usize)]) -> f32 {
    let (mut gx, mut gy) = (0.0f32, 0.0f32);
    for &(i, j) in pairs {
        let (dx, dy) = (points[j].x - points[i].x, points[j].y - points[i].y);
        let norm = dx * dx + dy * dy;
        if norm == 0.0 {
            continue;
        }
        let diff = (intensities[j] - intensities[i]) / norm;
        gx += diff * dx;
        gy += diff * dy;
    }
    if gx == 0.0 && gy == 0.0 {
        0.0
    } else {
        gy.atan2(gx)
    }
}

/// All index pairs `i < j` with their unit-scale distance
pub(crate) fn all_pairs(points: &[PatternPoint]) -> Vec<(usize, usize, f32)> {
    let mut pairs = Vec::with_capacity(points.len() * points.len() / 2);
    for j in 1..points.len() {
        for i in 0..j {
            let d = ((points[i].x - points[j].x).powi(2) + (points[i].y - points[j].y).powi(2)).sqrt();
            pairs.push((i, j, d));
        }
    }
    pairs
}
