use std::collections::HashMap;

use featbench_core::{Candidate, Descriptors};
use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::SeedableRng;
use crate::distance::hamming;
use crate::error::{MatchError, MatcherResult};
use crate::neighbors::{map_queries, Nearest};
use crate::{check_compatible, KnnMatch};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct LshParams {
    pub tables: usize,
    /// Bits per hash key
    pub key_size: usize,
    /// Buckets within this Hamming distance of the query key are also probed
    pub multi_probe_level: usize,
    /// Upper bound on distance evaluations per query
    pub checks: usize,
    pub seed: u64,
}

impl Default for LshParams {
    fn default() -> Self {
        Self {
            tables: 6,
            key_size: 12,
            multi_probe_level: 1,
            checks: 50,
            seed: 0x15b,
        }
    }
}

/// One hash table: the sampled bit positions and the buckets they address
struct Table {
    bits: Vec<usize>,
    buckets: HashMap<u32, Vec<usize>>,
}

impl Table {
    fn key(&self, row: &[u8]) -> u32 {
        self.bits
            .iter()
            .enumerate()
            .fold(0u32, |key, (i, &bit)| key | ((((row[bit / 8] >> (bit % 8)) & 1) as u32) << i))
    }
}

/// Multi-probe locality-sensitive hashing over binary rows
#[derive(Debug, Clone)]
pub struct LshMatcher {
    params: LshParams,
}

impl LshMatcher {
    pub fn new(params: LshParams) -> MatcherResult<Self> {
        if params.tables == 0 {
            return Err(MatchError::InvalidParameter {
                name: "tables",
                reason: "must be positive",
            });
        }
        if params.key_size == 0 || params.key_size > 32 {
            return Err(MatchError::InvalidParameter {
                name: "key_size",
                reason: "must be between 1 and 32",
            });
        }
        if params.multi_probe_level > 2 {
            return Err(MatchError::InvalidParameter {
                name: "multi_probe_level",
                reason: "must be at most 2",
            });
        }
        Ok(Self { params })
    }

    pub fn params(&self) -> &LshParams {
        &self.params
    }

    fn build(&self, rows: &[Vec<u8>]) -> Vec<Table> {
        let total_bits = rows.first().map_or(0, |r| r.len() * 8);
        let key_size = self.params.key_size.min(total_bits);
        let mut rng = StdRng::seed_from_u64(self.params.seed);

        (0..self.params.tables)
            .map(|_| {
                let bits = sample(&mut rng, total_bits, key_size).into_vec();
                let mut table = Table {
                    bits,
                    buckets: HashMap::new(),
                };
                for (i, row) in rows.iter().enumerate() {
                    let key = table.key(row);
                    table.buckets.entry(key).or_default().push(i);
                }
                table
            })
            .collect()
    }

    /// The query key and every key within `multi_probe_level` flipped bits
    fn probe_keys(&self, key: u32, key_size: usize) -> Vec<u32> {
        let mut keys = vec![key];
        if self.params.multi_probe_level >= 1 {
            keys.extend((0..key_size).map(|i| key ^ (1 << i)));
        }
        if self.params.multi_probe_level >= 2 {
            for i in 0..key_size {
                keys.extend((i + 1..key_size).map(|j| key ^ (1 << i) ^ (1 << j)));
            }
        }
        keys
    }

    fn search(&self, tables: &[Table], rows: &[Vec<u8>], query: &[u8], k: usize, query_idx: usize) -> Vec<Candidate> {
        let mut nearest = Nearest::new(k);
        let mut seen = vec![false; rows.len()];
        let mut checked = 0usize;

        'tables: for table in tables {
            let key = table.key(query);
            for probe in self.probe_keys(key, table.bits.len()) {
                let Some(bucket) = table.buckets.get(&probe) else {
                    continue;
                };
                for &i in bucket {
                    if seen[i] {
                        continue;
                    }
                    seen[i] = true;
                    nearest.offer(i, hamming(query, &rows[i]) as f32);
                    checked += 1;
                    if checked >= self.params.checks && nearest.worst().is_finite() {
                        break 'tables;
                    }
                }
            }
        }

        nearest.into_candidates(query_idx)
    }
}

impl KnnMatch for LshMatcher {
    fn name(&self) -> &'static str {
        "LSH"
    }

    /// Lists may hold fewer than `k` entries when the probed buckets are sparse
    fn knn_match(&self, query: &Descriptors, train: &Descriptors, k: usize) -> MatcherResult<Vec<Vec<Candidate>>> {
        check_compatible(query, train)?;
        let (Descriptors::Binary(q), Descriptors::Binary(t)) = (query, train) else {
            return Err(MatchError::UnsupportedDescriptors {
                index: "LSH",
                kind: "float",
            });
        };
        if t.len() < k {
            return Err(MatchError::InsufficientTrainSet {
                required: k,
                available: t.len(),
            });
        }

        let tables = self.build(t);
        Ok(map_queries(q.len(), |qi| self.search(&tables, t, &q[qi], k, qi)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    fn random_rows(n: usize, seed: u64) -> Vec<Vec<u8>> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n).map(|_| (0..32).map(|_| rng.random::<u8>()).collect()).collect()
    }

    #[test]
    fn test_rejects_float_rows() {
        let matcher = LshMatcher::new(LshParams::default()).unwrap();
        let rows = Descriptors::Float(vec![vec![0.0; 4]; 3]);
        assert!(matches!(
            matcher.knn_match(&rows, &rows, 2),
            Err(MatchError::UnsupportedDescriptors { .. })
        ));
    }

    #[test]
    fn test_needs_k_train_rows() {
        let matcher = LshMatcher::new(LshParams::default()).unwrap();
        let one = Descriptors::Binary(vec![vec![7u8; 32]]);
        assert!(matches!(
            matcher.knn_match(&one, &one, 2),
            Err(MatchError::InsufficientTrainSet { required: 2, available: 1 })
        ));
    }

    #[test]
    fn test_identical_rows_hash_together() {
        let matcher = LshMatcher::new(LshParams::default()).unwrap();
        let rows = Descriptors::Binary(random_rows(40, 3));
        let out = matcher.knn_match(&rows, &rows, 2).unwrap();
        for (qi, list) in out.iter().enumerate() {
            assert!(!list.is_empty() && list.len() <= 2);
            assert_eq!(list[0].train_idx, qi);
            assert_eq!(list[0].distance, 0.0);
        }
    }

    #[test]
    fn test_probe_keys() {
        let matcher = LshMatcher::new(LshParams::default()).unwrap();
        let keys = matcher.probe_keys(0b101, 4);
        assert_eq!(keys.len(), 5);
        assert!(keys.contains(&0b100) && keys.contains(&0b1101));
    }

    #[test]
    fn test_rejects_oversized_key() {
        let params = LshParams {
            key_size: 40,
            ..LshParams::default()
        };
        assert!(LshMatcher::new(params).is_err());
    }
}
