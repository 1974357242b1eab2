use featbench_core::Descriptors;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Distance used to compare descriptor rows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Metric {
    Hamming,
    L2,
}

impl Metric {
    /// Hamming for binary descriptors, L2 otherwise
    pub fn for_binary(is_binary: bool) -> Self {
        if is_binary {
            Metric::Hamming
        } else {
            Metric::L2
        }
    }

    pub fn for_descriptors(descriptors: &Descriptors) -> Self {
        Self::for_binary(descriptors.is_binary())
    }
}

/// Number of differing bits
#[inline]
pub fn hamming(a: &[u8], b: &[u8]) -> u32 {
    a.iter().zip(b).map(|(x, y)| (x ^ y).count_ones()).sum()
}

/// Squared Euclidean distance
#[inline]
pub fn l2_squared(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

#[inline]
pub fn l2(a: &[f32], b: &[f32]) -> f32 {
    l2_squared(a, b).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hamming() {
        assert_eq!(hamming(&[0b1010_1010, 0xFF], &[0b0101_0101, 0xFF]), 8);
        assert_eq!(hamming(&[0u8; 32], &[0u8; 32]), 0);
    }

    #[test]
    fn test_l2() {
        assert_eq!(l2(&[0.0, 0.0], &[3.0, 4.0]), 5.0);
        assert_eq!(l2_squared(&[1.0], &[3.0]), 4.0);
    }

    #[test]
    fn test_metric_follows_kind() {
        assert_eq!(Metric::for_binary(true), Metric::Hamming);
        assert_eq!(Metric::for_descriptors(&Descriptors::Float(vec![])), Metric::L2);
    }
}
