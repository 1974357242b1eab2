use featbench_core::Candidate;

/// Lowe ratio for binary descriptors
pub const BINARY_RATIO: f32 = 0.80;
/// Lowe ratio for real-valued descriptors
pub const FLOAT_RATIO: f32 = 0.75;

/// Keeps a neighbour list's best hit when it is clearly closer than the runner-up
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatioTest {
    threshold: f32,
}

impl RatioTest {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    /// Threshold chosen by descriptor kind alone
    pub fn for_descriptors(is_binary: bool) -> Self {
        Self::new(if is_binary { BINARY_RATIO } else { FLOAT_RATIO })
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Lists with fewer than two entries are rejected
    pub fn accepts(&self, neighbors: &[Candidate]) -> bool {
        match neighbors {
            [best, second, ..] => best.distance < self.threshold * second.distance,
            _ => false,
        }
    }

    /// Best hit of every accepted list, in query order
    pub fn filter(&self, lists: &[Vec<Candidate>]) -> Vec<Candidate> {
        lists
            .iter()
            .filter(|list| self.accepts(list))
            .map(|list| list[0])
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn pair(d0: f32, d1: f32) -> Vec<Candidate> {
        vec![Candidate::new(0, 1, d0), Candidate::new(0, 2, d1)]
    }

    #[test]
    fn test_thresholds_by_kind() {
        assert_eq!(RatioTest::for_descriptors(true).threshold(), 0.80);
        assert_eq!(RatioTest::for_descriptors(false).threshold(), 0.75);
    }

    #[test]
    fn test_short_lists_rejected() {
        let test = RatioTest::for_descriptors(false);
        assert!(!test.accepts(&[]));
        assert!(!test.accepts(&[Candidate::new(0, 0, 0.0)]));
    }

    #[test]
    fn test_boundary_is_strict() {
        let test = RatioTest::new(0.5);
        assert!(!test.accepts(&pair(5.0, 10.0)));
        assert!(test.accepts(&pair(4.9, 10.0)));
    }

    #[test]
    fn test_filter_keeps_best_hits() {
        let test = RatioTest::for_descriptors(true);
        let lists = vec![pair(1.0, 10.0), pair(9.0, 10.0), vec![], pair(0.0, 3.0)];
        let kept = test.filter(&lists);
        assert_eq!(kept.len(), 2);
        assert!(kept.iter().all(|c| c.train_idx == 1));
    }

    #[test]
    fn test_zero_distances_are_rejected() {
        // 0 < t * 0 never holds
        assert!(!RatioTest::for_descriptors(true).accepts(&pair(0.0, 0.0)));
    }

    proptest! {
        #[test]
        fn prop_flag_only_changes_threshold(d0 in 0.0f32..100.0, d1 in 0.0f32..100.0) {
            let list = pair(d0, d1);
            prop_assert_eq!(RatioTest::for_descriptors(true).accepts(&list), d0 < 0.80 * d1);
            prop_assert_eq!(RatioTest::for_descriptors(false).accepts(&list), d0 < 0.75 * d1);
        }
    }
}
