//! Float image helpers for the scale-space detectors.

use featbench_core::Image;

/// Single-channel float plane, row-major
#[derive(Debug, Clone)]
pub struct Plane {
    pub width: usize,
    pub height: usize,
    pub data: Vec<f32>,
}

impl Plane {
    /// Copy an 8-bit image into `[0, 1]`
    pub fn from_image(img: &Image) -> Self {
        Self {
            width: img.width() as usize,
            height: img.height() as usize,
            data: img.as_raw().iter().map(|&v| v as f32 / 255.0).collect(),
        }
    }

    #[inline]
    pub fn at(&self, x: usize, y: usize) -> f32 {
        self.data[y * self.width + x]
    }

    /// Clamp-to-edge lookup
    #[inline]
    pub fn at_clamped(&self, x: i64, y: i64) -> f32 {
        let x = x.clamp(0, self.width as i64 - 1) as usize;
        let y = y.clamp(0, self.height as i64 - 1) as usize;
        self.data[y * self.width + x]
    }

    /// Every second pixel in both directions
    pub fn decimate(&self) -> Self {
        let width = (self.width / 2).max(1);
        let height = (self.height / 2).max(1);
        let mut data = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                data.push(self.at((2 * x).min(self.width - 1), (2 * y).min(self.height - 1)));
            }
        }
        Self { width, height, data }
    }

    /// Separable Gaussian blur with a `ceil(3 sigma)` radius and clamped borders
    pub fn gaussian_blur(&self, sigma: f32) -> Self {
        if sigma <= 0.0 {
            return self.clone();
        }
        let radius = (3.0 * sigma).ceil() as i64;
        let mut kernel: Vec<f32> = (-radius..=radius)
            .map(|i| (-((i * i) as f32) / (2.0 * sigma * sigma)).exp())
            .collect();
        let norm: f32 = kernel.iter().sum();
        kernel.iter_mut().for_each(|k| *k /= norm);

        let mut horizontal = vec![0.0f32; self.data.len()];
        for y in 0..self.height {
            for x in 0..self.width {
                horizontal[y * self.width + x] = kernel
                    .iter()
                    .enumerate()
                    .map(|(i, k)| k * self.at_clamped(x as i64 + i as i64 - radius, y as i64))
                    .sum();
            }
        }
        let horizontal = Self {
            width: self.width,
            height: self.height,
            data: horizontal,
        };

        let mut data = vec![0.0f32; self.data.len()];
        for y in 0..self.height {
            for x in 0..self.width {
                data[y * self.width + x] = kernel
                    .iter()
                    .enumerate()
                    .map(|(i, k)| k * horizontal.at_clamped(x as i64, y as i64 + i as i64 - radius))
                    .sum();
            }
        }

        Self {
            width: self.width,
            height: self.height,
            data,
        }
    }

    /// `self - other`, same dimensions assumed
    pub fn difference(&self, other: &Self) -> Self {
        Self {
            width: self.width,
            height: self.height,
            data: self.data.iter().zip(&other.data).map(|(a, b)| a - b).collect(),
        }
    }
}
