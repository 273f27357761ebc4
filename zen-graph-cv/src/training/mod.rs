//! Per-fold training with early stopping
//!
//! This module provides:
//! - The [`TrainableModel`] contract the harness trains against
//! - [`ModelFactory`] for building one fresh model per fold
//! - The early-stopping state machine ([`EarlyStopping`])
//! - [`TrainingRunner`], which drives one fold's epochs and final evaluation

/// Early stopping state machine
pub mod early_stopping;
pub use early_stopping::{EarlyStopping, EarlyStoppingPolicy, StoppingState};

/// Fold training loop
pub mod runner;
pub use runner::{
    BatchEvaluation, EpochRecord, FitResult, FoldContext, ModelFactory, TrainableModel,
    TrainingHistory, TrainingRunner,
};
