//! Repeated stratified k-fold evaluation for graph classifiers
//!
//! This crate estimates how well a graph classification model generalizes by
//! training a fresh model on every fold of a repeated, class-stratified
//! k-fold split and reporting the mean and population standard deviation of
//! the fold test accuracies.
//!
//! Graphs differ in node count, so every batch is zero-padded to the largest
//! node count in the dataset and carries a boolean mask marking real nodes.
//!
//! ## Pipeline
//!
//! - [`validation::StratifiedKFold`]: seeded, class-balanced fold assignment
//! - [`gnn::PaddedBatchGenerator`]: restartable padded batch flows per index set
//! - [`training::TrainingRunner`]: epoch loop with an early-stopping state machine
//! - [`validation::CrossValidator`]: drives every fold in splitter order
//! - [`validation::summarize`]: aggregates the fold accuracies
//!
//! ### Quick Start:
//!
//! ```rust
//! use zen_graph_cv::gnn::{generate_synthetic_dataset, SyntheticDatasetConfig};
//! use zen_graph_cv::models::MeanPoolClassifier;
//! use zen_graph_cv::{CrossValidationConfig, CrossValidator};
//!
//! # fn main() -> zen_graph_cv::GraphCVResult<()> {
//! let dataset = generate_synthetic_dataset(&SyntheticDatasetConfig::default())?;
//!
//! let config = CrossValidationConfig::builder()
//!     .folds(3)
//!     .n_repeats(1)
//!     .epochs(5)
//!     .batch_size(8)
//!     .build()?;
//!
//! let factory = MeanPoolClassifier::factory(4, 2, 0.1);
//! let (results, summary) = CrossValidator::new(config).evaluate_and_summarize(&dataset, &factory)?;
//!
//! assert_eq!(results.len(), 3);
//! println!("{}", summary);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod errors;
pub mod gnn;
pub mod models;
pub mod training;
pub mod validation;

// Re-export the types most callers need
pub use config::{CrossValidationConfig, CrossValidationConfigBuilder};
pub use errors::{GraphCVError, GraphCVResult};
pub use gnn::{BatchFlow, Dataset, GraphRecord, Label, LabelEncoding, PaddedBatch, PaddedBatchGenerator};
pub use training::{
    BatchEvaluation, EarlyStoppingPolicy, FitResult, FoldContext, ModelFactory, StoppingState,
    TrainableModel, TrainingHistory, TrainingRunner,
};
pub use validation::{summarize, CrossValidationSummary, CrossValidator, StratifiedKFold};
