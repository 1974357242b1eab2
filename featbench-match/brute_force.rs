use featbench_core::{Candidate, Descriptors};
use crate::distance::{hamming, l2, Metric};
use crate::error::{MatchError, MatcherResult};
use crate::neighbors::{map_queries, Nearest};
use crate::{check_compatible, KnnMatch};

/// Exhaustive search; returns `min(k, train.len())` neighbours per query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BruteForceMatcher {
    metric: Metric,
}

impl BruteForceMatcher {
    pub fn new(metric: Metric) -> Self {
        Self { metric }
    }

    /// Matcher whose metric fits `descriptors`
    pub fn for_descriptors(descriptors: &Descriptors) -> Self {
        Self::new(Metric::for_descriptors(descriptors))
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }
}

impl KnnMatch for BruteForceMatcher {
    fn name(&self) -> &'static str {
        "brute-force"
    }

    fn knn_match(&self, query: &Descriptors, train: &Descriptors, k: usize) -> MatcherResult<Vec<Vec<Candidate>>> {
        check_compatible(query, train)?;
        match (self.metric, query, train) {
            (Metric::Hamming, Descriptors::Binary(q), Descriptors::Binary(t)) => Ok(map_queries(q.len(), |qi| {
                let mut nearest = Nearest::new(k);
                for (ti, row) in t.iter().enumerate() {
                    nearest.offer(ti, hamming(&q[qi], row) as f32);
                }
                nearest.into_candidates(qi)
            })),
            (Metric::L2, Descriptors::Float(q), Descriptors::Float(t)) => Ok(map_queries(q.len(), |qi| {
                let mut nearest = Nearest::new(k);
                for (ti, row) in t.iter().enumerate() {
                    nearest.offer(ti, l2(&q[qi], row));
                }
                nearest.into_candidates(qi)
            })),
            (Metric::Hamming, _, _) => Err(MatchError::UnsupportedDescriptors {
                index: "Hamming brute-force",
                kind: "float",
            }),
            (Metric::L2, _, _) => Err(MatchError::UnsupportedDescriptors {
                index: "L2 brute-force",
                kind: "binary",
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn float_rows(values: &[f32]) -> Descriptors {
        Descriptors::Float(values.iter().map(|&v| vec![v, 0.0]).collect())
    }

    #[test]
    fn test_two_nearest_l2() {
        let matcher = BruteForceMatcher::new(Metric::L2);
        let query = float_rows(&[1.1]);
        let train = float_rows(&[0.0, 1.0, 3.0, 1.5]);
        let out = matcher.knn_match(&query, &train, 2).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0][0].train_idx, 1);
        assert_eq!(out[0][1].train_idx, 3);
        assert!(out[0][0].distance <= out[0][1].distance);
    }

    #[test]
    fn test_hamming_distances() {
        let matcher = BruteForceMatcher::new(Metric::Hamming);
        let query = Descriptors::Binary(vec![vec![0b0000_1111]]);
        let train = Descriptors::Binary(vec![vec![0b1111_1111], vec![0b0000_1110], vec![0b0000_0000]]);
        let out = matcher.knn_match(&query, &train, 2).unwrap();
        assert_eq!(out[0][0].train_idx, 1);
        assert_eq!(out[0][0].distance, 1.0);
        assert_eq!(out[0][1].distance, 4.0);
    }

    #[test]
    fn test_small_train_set_gives_short_lists() {
        let matcher = BruteForceMatcher::new(Metric::L2);
        let out = matcher.knn_match(&float_rows(&[0.0, 1.0]), &float_rows(&[5.0]), 2).unwrap();
        assert!(out.iter().all(|list| list.len() == 1));
        let out = matcher.knn_match(&float_rows(&[0.0]), &float_rows(&[]), 2).unwrap();
        assert!(out[0].is_empty());
    }

    #[test]
    fn test_wrong_kind_is_an_error() {
        let matcher = BruteForceMatcher::new(Metric::Hamming);
        let result = matcher.knn_match(&float_rows(&[0.0]), &float_rows(&[1.0]), 2);
        assert!(matches!(result, Err(MatchError::UnsupportedDescriptors { .. })));
    }
}
