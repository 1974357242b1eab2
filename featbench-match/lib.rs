//! Descriptor matching for the featbench pipeline.
//!
//! Every matcher answers k-nearest-neighbour queries over a pair of
//! descriptor sets. [`match_with_fallback`] wraps the bulk 2-NN call with
//! the single-nearest fallback, and [`RatioTest`] turns neighbour lists into
//! good matches.

mod error;
mod neighbors;

pub mod brute_force;
pub mod distance;
pub mod fallback;
pub mod kdtree;
pub mod lsh;
pub mod ratio;

pub use brute_force::BruteForceMatcher;
pub use distance::Metric;
pub use error::{MatchError, MatcherResult};
pub use fallback::{match_with_fallback, FallbackPolicy, K_NEIGHBORS};
pub use kdtree::{KdForestMatcher, KdForestParams};
pub use lsh::{LshMatcher, LshParams};
pub use ratio::{RatioTest, BINARY_RATIO, FLOAT_RATIO};

use featbench_core::{Candidate, Descriptors};

/// A nearest-neighbour strategy over descriptor rows
pub trait KnnMatch {
    fn name(&self) -> &'static str;

    /// Up to `k` neighbours for each query row, ascending by distance.
    ///
    /// The outer vector has one entry per query row, in query order.
    fn knn_match(&self, query: &Descriptors, train: &Descriptors, k: usize) -> MatcherResult<Vec<Vec<Candidate>>>;
}

/// Both sets must share a kind and, when non-empty, a row length
pub(crate) fn check_compatible(query: &Descriptors, train: &Descriptors) -> MatcherResult<()> {
    if query.is_binary() != train.is_binary() {
        return Err(MatchError::KindMismatch);
    }
    if !query.is_empty() && !train.is_empty() && query.dim() != train.dim() {
        return Err(MatchError::DimensionMismatch {
            query: query.dim(),
            train: train.dim(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mismatch() {
        let a = Descriptors::Binary(vec![vec![0u8; 4]]);
        let b = Descriptors::Float(vec![vec![0.0; 4]]);
        assert_eq!(check_compatible(&a, &b), Err(MatchError::KindMismatch));
    }

    #[test]
    fn test_dimension_mismatch() {
        let a = Descriptors::Float(vec![vec![0.0; 64]]);
        let b = Descriptors::Float(vec![vec![0.0; 128]]);
        assert_eq!(
            check_compatible(&a, &b),
            Err(MatchError::DimensionMismatch { query: 64, train: 128 })
        );
        assert!(check_compatible(&a, &Descriptors::Float(vec![])).is_ok());
    }
}
