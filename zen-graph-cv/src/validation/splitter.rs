/**
 * @file zen-graph-cv/src/validation/splitter.rs
 * @brief Repeated stratified k-fold index splitting
 *
 * Each repeat draws its own ChaCha8 stream from `(seed, repeat)`, shuffles
 * every class's members, and deals them round-robin into `folds` buckets.
 * The dealing cursor carries over from one class to the next, which gives:
 *
 * - each class contributes `floor(n_c / k)` or `ceil(n_c / k)` members to
 *   every bucket
 * - bucket sizes differ by at most one
 *
 * Bucket `f` is the test set of split `f`; the other buckets form its
 * training set. Both index lists are returned in ascending order.
 */

use std::collections::BTreeMap;

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::errors::{GraphCVError, GraphCVResult};
use crate::gnn::Dataset;

/// Derive an independent 64-bit seed for `stream` from `seed` (splitmix64)
pub(crate) fn mix_seed(seed: u64, stream: u64) -> u64 {
    let mut z = seed ^ stream.wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// One (train, test) split
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoldAssignment {
    pub repeat: usize,
    pub fold: usize,
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
}

/// Repeated stratified k-fold splitter over class labels
#[derive(Debug, Clone)]
pub struct StratifiedKFold {
    folds: usize,
    n_repeats: usize,
    seed: u64,
    n_samples: usize,
    classes: BTreeMap<usize, Vec<usize>>,
}

impl StratifiedKFold {
    /**
     * Validate the labels against `folds` and prepare the class groups.
     *
     * Fails with `InvalidConfiguration` when `folds < 2` or `n_repeats == 0`,
     * and with `InsufficientClassSamples` when even the largest class has
     * fewer than `folds` members. A smaller class that falls short is only
     * logged: it lands in as many test folds as it has members.
     */
    pub fn new(labels: &[usize], folds: usize, n_repeats: usize, seed: u64) -> GraphCVResult<Self> {
        if folds < 2 {
            return Err(GraphCVError::InvalidConfiguration(format!(
                "folds must be at least 2, got {}",
                folds
            )));
        }
        if n_repeats == 0 {
            return Err(GraphCVError::InvalidConfiguration(
                "n_repeats must be greater than 0".to_string(),
            ));
        }
        if labels.is_empty() {
            return Err(GraphCVError::InvalidInput(
                "Cannot split an empty label set".to_string(),
            ));
        }

        let mut classes: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (index, &class) in labels.iter().enumerate() {
            classes.entry(class).or_default().push(index);
        }

        let (&largest, members) = classes
            .iter()
            .max_by(|a, b| a.1.len().cmp(&b.1.len()).then(b.0.cmp(a.0)))
            .ok_or_else(|| GraphCVError::InvalidInput("Cannot split an empty label set".to_string()))?;
        if members.len() < folds {
            return Err(GraphCVError::InsufficientClassSamples {
                class: largest,
                count: members.len(),
                folds,
            });
        }

        for (&class, members) in &classes {
            if members.len() < folds {
                log::warn!(
                    "class {} has only {} members, fewer than {} folds; some test folds will hold none of it",
                    class,
                    members.len(),
                    folds
                );
            }
        }

        Ok(Self {
            folds,
            n_repeats,
            seed,
            n_samples: labels.len(),
            classes,
        })
    }

    /// Splitter over a dataset's class labels
    pub fn from_dataset(
        dataset: &Dataset,
        folds: usize,
        n_repeats: usize,
        seed: u64,
    ) -> GraphCVResult<Self> {
        Self::new(&dataset.class_labels()?, folds, n_repeats, seed)
    }

    pub fn folds(&self) -> usize {
        self.folds
    }

    pub fn n_repeats(&self) -> usize {
        self.n_repeats
    }

    pub fn n_samples(&self) -> usize {
        self.n_samples
    }

    /// Total number of splits, `folds * n_repeats`
    pub fn num_splits(&self) -> usize {
        self.folds * self.n_repeats
    }

    /// Member counts per class id
    pub fn class_counts(&self) -> BTreeMap<usize, usize> {
        self.classes
            .iter()
            .map(|(&class, members)| (class, members.len()))
            .collect()
    }

    /// Test buckets of one repeat, each sorted ascending
    pub fn repeat_buckets(&self, repeat: usize) -> Vec<Vec<usize>> {
        let mut rng = ChaCha8Rng::seed_from_u64(mix_seed(self.seed, repeat as u64));
        let mut buckets = vec![Vec::with_capacity(self.n_samples / self.folds + 1); self.folds];
        let mut cursor = 0;

        for members in self.classes.values() {
            let mut shuffled = members.clone();
            shuffled.shuffle(&mut rng);
            for index in shuffled {
                buckets[cursor % self.folds].push(index);
                cursor += 1;
            }
        }

        for bucket in &mut buckets {
            bucket.sort_unstable();
        }
        buckets
    }

    /// Lazy sequence of all splits, repeat-major then fold order
    pub fn split(&self) -> FoldSplits<'_> {
        FoldSplits {
            splitter: self,
            repeat: 0,
            fold: 0,
            buckets: Vec::new(),
        }
    }
}

/// Iterator returned by [`StratifiedKFold::split`]
#[derive(Debug, Clone)]
pub struct FoldSplits<'s> {
    splitter: &'s StratifiedKFold,
    repeat: usize,
    fold: usize,
    buckets: Vec<Vec<usize>>,
}

impl Iterator for FoldSplits<'_> {
    type Item = FoldAssignment;

    fn next(&mut self) -> Option<Self::Item> {
        if self.repeat >= self.splitter.n_repeats {
            return None;
        }

        if self.fold == 0 {
            self.buckets = self.splitter.repeat_buckets(self.repeat);
        }

        let test_indices = self.buckets[self.fold].clone();
        let mut train_indices: Vec<usize> = self
            .buckets
            .iter()
            .enumerate()
            .filter(|&(fold, _)| fold != self.fold)
            .flat_map(|(_, bucket)| bucket.iter().copied())
            .collect();
        train_indices.sort_unstable();

        let assignment = FoldAssignment {
            repeat: self.repeat,
            fold: self.fold,
            train_indices,
            test_indices,
        };

        self.fold += 1;
        if self.fold == self.splitter.folds {
            self.fold = 0;
            self.repeat += 1;
        }

        Some(assignment)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let done = self.repeat * self.splitter.folds + self.fold;
        let remaining = self.splitter.num_splits().saturating_sub(done);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for FoldSplits<'_> {}
