//! Cross-validation configuration, builder and validation
//!
//! Defaults: 10 folds repeated 5 times, up to 200 epochs per fold, and
//! early stopping on validation loss with a patience of 25 epochs.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::errors::{GraphCVError, GraphCVResult};
use crate::training::EarlyStoppingPolicy;

/// Every option the evaluation run recognises
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, PartialEq)]
pub struct CrossValidationConfig {
    /// Maximum training epochs per fold
    pub epochs: usize,

    /// k in k-fold
    pub folds: usize,

    /// Number of independent k-fold repetitions
    pub n_repeats: usize,

    /// Graphs per batch
    pub batch_size: usize,

    /// Epochs without improvement before a fold stops early
    pub patience: usize,

    /// Minimum validation-loss decrease that counts as improvement
    pub min_delta: f32,

    /// Seed for fold assignment, training-order shuffles and model init
    pub seed: u64,

    /// Shuffle each fold's training indices once before batching
    pub shuffle_training: bool,

    /// Restore the best-validation weights before the final test evaluation
    pub restore_best_weights: bool,
}

impl Default for CrossValidationConfig {
    fn default() -> Self {
        Self {
            epochs: 200,
            folds: 10,
            n_repeats: 5,
            batch_size: 30,
            patience: 25,
            min_delta: 0.0,
            seed: 42,
            shuffle_training: true,
            restore_best_weights: true,
        }
    }
}

impl CrossValidationConfig {
    pub fn builder() -> CrossValidationConfigBuilder {
        CrossValidationConfigBuilder::new()
    }

    /// Check every option; the orchestrator calls this before any fold runs
    pub fn validate(&self) -> GraphCVResult<()> {
        if self.folds < 2 {
            return Err(GraphCVError::InvalidConfiguration(format!(
                "folds must be at least 2, got {}",
                self.folds
            )));
        }

        if self.n_repeats == 0 {
            return Err(GraphCVError::InvalidConfiguration(
                "n_repeats must be greater than 0".to_string(),
            ));
        }

        if self.epochs == 0 {
            return Err(GraphCVError::InvalidConfiguration(
                "epochs must be greater than 0".to_string(),
            ));
        }

        if self.batch_size == 0 {
            return Err(GraphCVError::InvalidConfiguration(
                "batch_size must be greater than 0".to_string(),
            ));
        }

        if !self.min_delta.is_finite() || self.min_delta < 0.0 {
            return Err(GraphCVError::InvalidConfiguration(format!(
                "min_delta must be finite and non-negative, got {}",
                self.min_delta
            )));
        }

        Ok(())
    }

    /// Total number of fold evaluations the run performs
    pub fn total_folds(&self) -> usize {
        self.folds * self.n_repeats
    }

    /// Early-stopping policy handed to the training runner
    pub fn early_stopping(&self) -> EarlyStoppingPolicy {
        EarlyStoppingPolicy {
            patience: self.patience,
            min_delta: self.min_delta,
            restore_best_weights: self.restore_best_weights,
        }
    }

    /// Load and validate a JSON config; missing fields take their defaults
    #[cfg(feature = "serde")]
    pub fn from_json_str(json: &str) -> GraphCVResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    #[cfg(feature = "serde")]
    pub fn to_json_string(&self) -> GraphCVResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Configuration builder for an evaluation run
#[derive(Debug, Clone, Default)]
pub struct CrossValidationConfigBuilder {
    config: CrossValidationConfig,
}

impl CrossValidationConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn epochs(mut self, epochs: usize) -> Self {
        self.config.epochs = epochs;
        self
    }

    pub fn folds(mut self, folds: usize) -> Self {
        self.config.folds = folds;
        self
    }

    pub fn n_repeats(mut self, n_repeats: usize) -> Self {
        self.config.n_repeats = n_repeats;
        self
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.config.batch_size = batch_size;
        self
    }

    pub fn patience(mut self, patience: usize) -> Self {
        self.config.patience = patience;
        self
    }

    pub fn min_delta(mut self, min_delta: f32) -> Self {
        self.config.min_delta = min_delta;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }

    pub fn shuffle_training(mut self, shuffle: bool) -> Self {
        self.config.shuffle_training = shuffle;
        self
    }

    pub fn restore_best_weights(mut self, restore: bool) -> Self {
        self.config.restore_best_weights = restore;
        self
    }

    /// Build the final configuration
    pub fn build(self) -> GraphCVResult<CrossValidationConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
