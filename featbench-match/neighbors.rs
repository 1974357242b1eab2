//! Neighbour bookkeeping shared by the matchers.

use featbench_core::Candidate;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Bounded list of the `k` closest train rows seen so far, ascending by
/// distance; ties keep the lower train index first
#[derive(Debug, Clone)]
pub(crate) struct Nearest {
    k: usize,
    hits: Vec<(usize, f32)>,
}

impl Nearest {
    pub fn new(k: usize) -> Self {
        Self {
            k,
            hits: Vec::with_capacity(k + 1),
        }
    }

    /// Distance a newcomer must beat to enter a full list
    pub fn worst(&self) -> f32 {
        if self.hits.len() < self.k {
            f32::INFINITY
        } else {
            self.hits.last().map_or(f32::INFINITY, |&(_, d)| d)
        }
    }

    pub fn offer(&mut self, train_idx: usize, distance: f32) {
        if self.k == 0 {
            return;
        }
        let pos = self
            .hits
            .partition_point(|&(idx, d)| d < distance || (d == distance && idx < train_idx));
        if pos >= self.k {
            return;
        }
        self.hits.insert(pos, (train_idx, distance));
        self.hits.truncate(self.k);
    }

    pub fn into_candidates(self, query_idx: usize) -> Vec<Candidate> {
        self.hits
            .into_iter()
            .map(|(train_idx, distance)| Candidate::new(query_idx, train_idx, distance))
            .collect()
    }
}

/// Per-query map, parallel under the `parallel` feature; output keeps query order
pub(crate) fn map_queries<T, F>(n_queries: usize, f: F) -> Vec<T>
where
    T: Send,
    F: Fn(usize) -> T + Sync + Send,
{
    #[cfg(feature = "parallel")]
    {
        (0..n_queries).into_par_iter().map(f).collect()
    }
    #[cfg(not(feature = "parallel"))]
    {
        (0..n_queries).map(f).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_keeps_k_smallest_in_order() {
        let mut nearest = Nearest::new(2);
        for (idx, d) in [(0, 5.0), (1, 3.0), (2, 9.0), (3, 1.0)] {
            nearest.offer(idx, d);
        }
        let out = nearest.into_candidates(7);
        assert_eq!(out.len(), 2);
        assert_eq!((out[0].train_idx, out[0].distance), (3, 1.0));
        assert_eq!((out[1].train_idx, out[1].distance), (1, 3.0));
        assert!(out.iter().all(|c| c.query_idx == 7 && !c.synthetic));
    }

    #[test]
    fn test_ties_prefer_lower_index() {
        let mut nearest = Nearest::new(1);
        nearest.offer(4, 2.0);
        nearest.offer(1, 2.0);
        assert_eq!(nearest.into_candidates(0)[0].train_idx, 1);
    }

    proptest! {
        #[test]
        fn prop_matches_sorted_prefix(dists in proptest::collection::vec(0u32..100, 0..40), k in 0usize..5) {
            let mut nearest = Nearest::new(k);
            for (i, &d) in dists.iter().enumerate() {
                nearest.offer(i, d as f32);
            }
            let mut expected: Vec<(usize, f32)> = dists.iter().enumerate().map(|(i, &d)| (i, d as f32)).collect();
            expected.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
            expected.truncate(k);

            let got: Vec<(usize, f32)> = nearest.into_candidates(0).iter().map(|c| (c.train_idx, c.distance)).collect();
            prop_assert_eq!(got, expected);
        }
    }
}
