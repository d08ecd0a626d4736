//! Stratified k-fold splitting shared by the outer evaluation loop and the
//! inner calibration loop.
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SubsampleError};

/// One train/test partition of the sample indices, both sorted ascending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fold {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Stratified k-fold splitter with an explicit seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StratifiedKFold {
    pub n_splits: usize,
    pub shuffle: bool,
    pub seed: u64,
}

impl StratifiedKFold {
    pub fn new(n_splits: usize, seed: u64) -> Self {
        Self {
            n_splits,
            shuffle: true,
            seed,
        }
    }

    /// Partition `0..labels.len()` into `n_splits` folds.
    ///
    /// Each class is shuffled on its own and dealt round-robin over the
    /// folds with a counter that carries over from one class to the next,
    /// so fold sizes differ by at most one and every test fold keeps the
    /// overall class ratio.
    pub fn split(&self, labels: &[u8]) -> Result<Vec<Fold>> {
        if self.n_splits < 2 {
            return Err(SubsampleError::InvalidConfig(format!(
                "n_splits must be at least 2, got {}",
                self.n_splits
            )));
        }

        let mut by_class: [Vec<usize>; 2] = [Vec::new(), Vec::new()];
        for (i, &label) in labels.iter().enumerate() {
            match label {
                0 | 1 => by_class[label as usize].push(i),
                other => {
                    return Err(SubsampleError::NonBinaryLabel {
                        column: "<target>".to_string(),
                        row: i,
                        value: other as f64,
                    })
                }
            }
        }

        for (class, members) in by_class.iter().enumerate() {
            if members.len() < self.n_splits {
                return Err(SubsampleError::InsufficientClassMembers {
                    class: class as u8,
                    count: members.len(),
                    n_splits: self.n_splits,
                });
            }
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut assignment = vec![0usize; labels.len()];
        let mut counter = 0usize;
        for members in by_class.iter_mut() {
            if self.shuffle {
                members.shuffle(&mut rng);
            }
            for &idx in members.iter() {
                assignment[idx] = counter % self.n_splits;
                counter += 1;
            }
        }

        let folds = (0..self.n_splits)
            .map(|fold| {
                let (test, train): (Vec<usize>, Vec<usize>) =
                    (0..labels.len()).partition(|&i| assignment[i] == fold);
                log::trace!(
                    "fold {}: {} train / {} test samples",
                    fold,
                    train.len(),
                    test.len()
                );
                Fold { train, test }
            })
            .collect();

        Ok(folds)
    }
}
