use featbench_core::{Candidate, Descriptors};
use tracing::{debug, warn};
use crate::brute_force::BruteForceMatcher;
use crate::error::{MatchError, MatcherResult};
use crate::KnnMatch;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Neighbours requested from the bulk call
pub const K_NEIGHBORS: usize = 2;

/// What to do when the bulk 2-NN call fails.
///
/// When enabled, every query is matched to its single nearest train row
/// with an exhaustive search in the metric that fits the descriptors, and a
/// second neighbour at `second_neighbor_scale` times that distance is
/// appended with `synthetic` set.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct FallbackPolicy {
    pub enabled: bool,
    pub second_neighbor_scale: f32,
}

impl Default for FallbackPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            second_neighbor_scale: 1.5,
        }
    }
}

impl FallbackPolicy {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> MatcherResult<()> {
        if !self.second_neighbor_scale.is_finite() || self.second_neighbor_scale < 1.0 {
            return Err(MatchError::InvalidParameter {
                name: "second_neighbor_scale",
                reason: "must be finite and at least 1",
            });
        }
        Ok(())
    }
}

/// 2-NN lists for every query, degrading to single-nearest matching per `policy`
pub fn match_with_fallback<M: KnnMatch + ?Sized>(
    matcher: &M,
    query: &Descriptors,
    train: &Descriptors,
    policy: &FallbackPolicy,
) -> MatcherResult<Vec<Vec<Candidate>>> {
    let err = match matcher.knn_match(query, train, K_NEIGHBORS) {
        Ok(lists) => return Ok(lists),
        Err(err) if !policy.enabled => return Err(err),
        Err(err) => err,
    };
    warn!(matcher = matcher.name(), error = %err, "k-NN failed, falling back to single nearest neighbour");

    let single = BruteForceMatcher::for_descriptors(query).knn_match(query, train, 1)?;
    let lists: Vec<Vec<Candidate>> = single
        .into_iter()
        .map(|list| match list.first() {
            Some(&nearest) => {
                let second = Candidate {
                    distance: nearest.distance * policy.second_neighbor_scale,
                    synthetic: true,
                    ..nearest
                };
                vec![nearest, second]
            }
            None => Vec::new(),
        })
        .collect();
    debug!(queries = lists.len(), "synthesised second neighbours");
    Ok(lists)
}
