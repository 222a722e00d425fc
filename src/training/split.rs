//! Seeded train/test split

use crate::{HoopsError, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Row indices of each partition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainTestSplit {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

impl TrainTestSplit {
    /// Shuffle `0..n` with `seed` and hold out `ceil(test_size * n)` rows
    pub fn new(n: usize, test_size: f64, seed: u64) -> Result<Self> {
        if !(test_size > 0.0 && test_size < 1.0) {
            return Err(HoopsError::Config(format!(
                "test_size must be between 0 and 1, got {}",
                test_size
            )));
        }
        let n_test = (test_size * n as f64).ceil() as usize;
        if n_test == 0 || n_test >= n {
            return Err(HoopsError::InsufficientData {
                samples: n,
                required: 2,
            });
        }

        let mut indices: Vec<usize> = (0..n).collect();
        let mut rng = StdRng::seed_from_u64(seed);
        indices.shuffle(&mut rng);

        let train = indices.split_off(n_test);
        Ok(TrainTestSplit {
            train,
            test: indices,
        })
    }

    /// Pick the rows of `values` for a partition
    pub fn select<T: Clone>(values: &[T], indices: &[usize]) -> Vec<T> {
        indices.iter().map(|&i| values[i].clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_split_partitions_rows() {
        let split = TrainTestSplit::new(101, 0.2, 42).unwrap();
        assert_eq!(split.test.len(), 21);
        assert_eq!(split.train.len(), 80);

        let all: HashSet<_> = split.train.iter().chain(&split.test).collect();
        assert_eq!(all.len(), 101);
    }

    #[test]
    fn test_split_is_seeded() {
        let a = TrainTestSplit::new(50, 0.2, 42).unwrap();
        let b = TrainTestSplit::new(50, 0.2, 42).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_split_rejects_tiny_inputs() {
        assert!(TrainTestSplit::new(1, 0.2, 42).is_err());
        assert!(TrainTestSplit::new(10, 0.0, 42).is_err());
        assert!(TrainTestSplit::new(10, 1.0, 42).is_err());
    }

    #[test]
    fn test_select() {
        let values = ["a", "b", "c"];
        assert_eq!(TrainTestSplit::select(&values, &[2, 0]), vec!["c", "a"]);
    }
}
