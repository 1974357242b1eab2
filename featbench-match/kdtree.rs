use std::cmp::Ordering;
use std::collections::BinaryHeap;

use featbench_core::{Candidate, Descriptors};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use crate::distance::l2_squared;
use crate::error::{MatchError, MatcherResult};
use crate::neighbors::{map_queries, Nearest};
use crate::{check_compatible, KnnMatch};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Rows sampled when estimating per-dimension variance at a node
const VARIANCE_SAMPLES: usize = 100;
/// Split dimension is drawn from this many highest-variance dimensions
const TOP_DIMENSIONS: usize = 5;
const MAX_LEAF_SIZE: usize = 1;

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct KdForestParams {
    pub trees: usize,
    /// Leaf rows examined per query across all trees
    pub checks: usize,
    pub seed: u64,
}

impl Default for KdForestParams {
    fn default() -> Self {
        Self {
            trees: 4,
            checks: 32,
            seed: 0x6b64,
        }
    }
}

#[derive(Debug, Clone)]
enum Node {
    Leaf(Vec<usize>),
    Split {
        dim: usize,
        value: f32,
        left: usize,
        right: usize,
    },
}

/// One randomized tree as a node arena, root at index 0
#[derive(Debug, Clone)]
struct Tree {
    nodes: Vec<Node>,
}

/// Pending branch ordered by its lower distance bound, closest first
#[derive(Debug, Clone, Copy)]
struct Branch {
    bound: f32,
    tree: usize,
    node: usize,
}

impl PartialEq for Branch {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Branch {}

impl PartialOrd for Branch {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Branch {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap
        other
            .bound
            .total_cmp(&self.bound)
            .then_with(|| other.tree.cmp(&self.tree))
            .then_with(|| other.node.cmp(&self.node))
    }
}

fn build_node(nodes: &mut Vec<Node>, rows: &[Vec<f32>], indices: Vec<usize>, rng: &mut StdRng) -> usize {
    let slot = nodes.len();
    nodes.push(Node::Leaf(Vec::new()));

    if indices.len() <= MAX_LEAF_SIZE {
        nodes[slot] = Node::Leaf(indices);
        return slot;
    }

    let dim = rows[indices[0]].len();
    let sample = &indices[..indices.len().min(VARIANCE_SAMPLES)];
    let mut mean = vec![0.0f32; dim];
    for &i in sample {
        for (m, v) in mean.iter_mut().zip(&rows[i]) {
            *m += v;
        }
    }
    mean.iter_mut().for_each(|m| *m /= sample.len() as f32);

    let mut variance = vec![0.0f32; dim];
    for &i in sample {
        for ((var, v), m) in variance.iter_mut().zip(&rows[i]).zip(&mean) {
            *var += (v - m) * (v - m);
        }
    }

    let mut by_variance: Vec<usize> = (0..dim).collect();
    by_variance.sort_by(|&a, &b| variance[b].total_cmp(&variance[a]));
    let top = by_variance.len().min(TOP_DIMENSIONS);
    let split_dim = by_variance[rng.random_range(0..top)];
    let value = mean[split_dim];

    let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices.iter().copied().partition(|&i| rows[i][split_dim] < value);
    if left_idx.is_empty() || right_idx.is_empty() {
        // All rows share the split value
        nodes[slot] = Node::Leaf(indices);
        return slot;
    }

    let left = build_node(nodes, rows, left_idx, rng);
    let right = build_node(nodes, rows, right_idx, rng);
    nodes[slot] = Node::Split {
        dim: split_dim,
        value,
        left,
        right,
    };
    slot
}

/// Randomized KD-tree forest searched best-bin-first over real-valued rows
#[derive(Debug, Clone)]
pub struct KdForestMatcher {
    params: KdForestParams,
}

impl KdForestMatcher {
    pub fn new(params: KdForestParams) -> MatcherResult<Self> {
        if params.trees == 0 || params.checks == 0 {
            return Err(MatchError::InvalidParameter {
                name: "trees",
                reason: "trees and checks must be positive",
            });
        }
        Ok(Self { params })
    }

    pub fn params(&self) -> &KdForestParams {
        &self.params
    }

    fn build(&self, rows: &[Vec<f32>]) -> Vec<Tree> {
        let mut rng = StdRng::seed_from_u64(self.params.seed);
        (0..self.params.trees)
            .map(|_| {
                let mut nodes = Vec::new();
                build_node(&mut nodes, rows, (0..rows.len()).collect(), &mut rng);
                Tree { nodes }
            })
            .collect()
    }

    fn search(&self, forest: &[Tree], rows: &[Vec<f32>], query: &[f32], k: usize, query_idx: usize) -> Vec<Candidate> {
        let mut nearest = Nearest::new(k);
        let mut seen = vec![false; rows.len()];
        let mut checked = 0usize;
        let mut heap: BinaryHeap<Branch> = (0..forest.len())
            .map(|tree| Branch {
                bound: 0.0,
                tree,
                node: 0,
            })
            .collect();

        while let Some(branch) = heap.pop() {
            if checked >= self.params.checks && nearest.worst().is_finite() {
                break;
            }
            if branch.bound > nearest.worst() {
                continue;
            }

            // Descend to a leaf, queueing the far side of every split
            let nodes = &forest[branch.tree].nodes;
            let mut node = branch.node;
            loop {
                match &nodes[node] {
                    Node::Split { dim, value, left, right } => {
                        let diff = query[*dim] - value;
                        let (near, far) = if diff < 0.0 { (*left, *right) } else { (*right, *left) };
                        heap.push(Branch {
                            bound: branch.bound.max(diff * diff),
                            tree: branch.tree,
                            node: far,
                        });
                        node = near;
                    }
                    Node::Leaf(indices) => {
                        for &i in indices {
                            if !seen[i] {
                                seen[i] = true;
                                checked += 1;
                                nearest.offer(i, l2_squared(query, &rows[i]));
                            }
                        }
                        break;
                    }
                }
            }
        }

        let mut candidates = nearest.into_candidates(query_idx);
        candidates.iter_mut().for_each(|c| c.distance = c.distance.sqrt());
        candidates
    }
}

impl KnnMatch for KdForestMatcher {
    fn name(&self) -> &'static str {
        "kd-tree forest"
    }

    fn knn_match(&self, query: &Descriptors, train: &Descriptors, k: usize) -> MatcherResult<Vec<Vec<Candidate>>> {
        check_compatible(query, train)?;
        let (Descriptors::Float(q), Descriptors::Float(t)) = (query, train) else {
            return Err(MatchError::UnsupportedDescriptors {
                index: "kd-tree forest",
                kind: "binary",
            });
        };
        if t.len() < k {
            return Err(MatchError::InsufficientTrainSet {
                required: k,
                available: t.len(),
            });
        }

        let forest = self.build(t);
        Ok(map_queries(q.len(), |qi| self.search(&forest, t, &q[qi], k, qi)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brute_force::BruteForceMatcher;
    use crate::distance::Metric;

    fn grid_rows(n: usize) -> Vec<Vec<f32>> {
        (0..n)
            .map(|i| vec![(i % 10) as f32, (i / 10) as f32, ((i * 7) % 13) as f32])
            .collect()
    }

    #[test]
    fn test_rejects_binary_rows() {
        let matcher = KdForestMatcher::new(KdForestParams::default()).unwrap();
        let rows = Descriptors::Binary(vec![vec![0u8; 4]; 3]);
        assert!(matches!(
            matcher.knn_match(&rows, &rows, 2),
            Err(MatchError::UnsupportedDescriptors { .. })
        ));
    }

    #[test]
    fn test_needs_k_train_rows() {
        let matcher = KdForestMatcher::new(KdForestParams::default()).unwrap();
        let one = Descriptors::Float(vec![vec![1.0, 2.0]]);
        assert_eq!(
            matcher.knn_match(&one, &one, 2),
            Err(MatchError::InsufficientTrainSet { required: 2, available: 1 })
        );
    }

    #[test]
    fn test_exact_hits_are_found() {
        let matcher = KdForestMatcher::new(KdForestParams::default()).unwrap();
        let rows = Descriptors::Float(grid_rows(60));
        let out = matcher.knn_match(&rows, &rows, 2).unwrap();
        for (qi, list) in out.iter().enumerate() {
            assert_eq!(list.len(), 2);
            assert_eq!(list[0].train_idx, qi);
            assert_eq!(list[0].distance, 0.0);
            assert!(list[1].distance > 0.0);
        }
    }

    #[test]
    fn test_generous_checks_agree_with_brute_force() {
        let params = KdForestParams {
            checks: 1000,
            ..KdForestParams::default()
        };
        let matcher = KdForestMatcher::new(params).unwrap();
        let train = Descriptors::Float(grid_rows(80));
        let query = Descriptors::Float(vec![vec![3.4, 2.2, 5.1], vec![8.9, 6.1, 0.2]]);

        let approx = matcher.knn_match(&query, &train, 2).unwrap();
        let exact = BruteForceMatcher::new(Metric::L2).knn_match(&query, &train, 2).unwrap();
        for (a, e) in approx.iter().zip(&exact) {
            assert!((a[0].distance - e[0].distance).abs() < 1e-5);
            assert!((a[1].distance - e[1].distance).abs() < 1e-5);
        }
    }
}
