//! Aggregate statistics over per-fold test accuracies

use std::collections::BTreeMap;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::errors::{GraphCVError, GraphCVResult};
use crate::training::FitResult;

/// Mean and population standard deviation of the fold accuracies
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct CrossValidationSummary {
    pub mean_accuracy: f64,
    /// Population standard deviation (divides by N)
    pub std_accuracy: f64,
    /// Accuracies in fold order
    pub raw_accuracies: Vec<f64>,
    pub min_accuracy: f64,
    pub max_accuracy: f64,
    /// Mean accuracy of each repeat, in repeat order. Empty when built
    /// from bare accuracies.
    pub repeat_means: Vec<f64>,
}

/// Summarize the ordered fold results of an evaluation run
pub fn summarize(results: &[FitResult]) -> GraphCVResult<CrossValidationSummary> {
    let accuracies: Vec<f64> = results.iter().map(|r| r.test_accuracy as f64).collect();
    let mut summary = summarize_accuracies(&accuracies)?;

    let mut per_repeat: BTreeMap<usize, (f64, usize)> = BTreeMap::new();
    for result in results {
        let entry = per_repeat.entry(result.repeat).or_insert((0.0, 0));
        entry.0 += result.test_accuracy as f64;
        entry.1 += 1;
    }
    summary.repeat_means = per_repeat
        .values()
        .map(|&(sum, count)| sum / count as f64)
        .collect();

    Ok(summary)
}

/// Summarize raw accuracies; fails with `EmptyResultSet` on an empty slice
pub fn summarize_accuracies(accuracies: &[f64]) -> GraphCVResult<CrossValidationSummary> {
    if accuracies.is_empty() {
        return Err(GraphCVError::EmptyResultSet);
    }

    let n = accuracies.len() as f64;
    let mean = accuracies.iter().sum::<f64>() / n;
    let variance = accuracies.iter().map(|a| (a - mean).powi(2)).sum::<f64>() / n;

    let min = accuracies.iter().copied().fold(f64::INFINITY, f64::min);
    let max = accuracies.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    Ok(CrossValidationSummary {
        mean_accuracy: mean,
        std_accuracy: variance.sqrt(),
        raw_accuracies: accuracies.to_vec(),
        min_accuracy: min,
        max_accuracy: max,
        repeat_means: Vec::new(),
    })
}

impl CrossValidationSummary {
    pub fn num_folds(&self) -> usize {
        self.raw_accuracies.len()
    }

    /**
     * Equal-width bucket counts of the raw accuracies between min and max.
     *
     * The last bucket is closed on the right. When every accuracy is the
     * same, all of them land in the first bucket.
     */
    pub fn histogram(&self, bins: usize) -> Vec<usize> {
        let mut counts = vec![0; bins];
        if bins == 0 {
            return counts;
        }

        let width = (self.max_accuracy - self.min_accuracy) / bins as f64;
        for &accuracy in &self.raw_accuracies {
            let bucket = if width > 0.0 {
                (((accuracy - self.min_accuracy) / width).floor() as usize).min(bins - 1)
            } else {
                0
            };
            counts[bucket] += 1;
        }
        counts
    }
}

impl fmt::Display for CrossValidationSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Accuracy over {} folds: {:.4} ± {:.4}",
            self.num_folds(),
            self.mean_accuracy,
            self.std_accuracy
        )
    }
}
