/**
 * @file zen-graph-cv/src/validation/mod.rs
 * @brief Repeated stratified k-fold evaluation
 *
 * - [`StratifiedKFold`]: seeded, class-balanced fold assignment
 * - [`CrossValidator`]: runs every fold through the training runner
 * - [`summarize`]: mean and population std of the fold accuracies
 */

pub mod orchestrator;
pub mod splitter;
pub mod summary;

pub use orchestrator::CrossValidator;
pub use splitter::{FoldAssignment, FoldSplits, StratifiedKFold};
pub use summary::{summarize, summarize_accuracies, CrossValidationSummary};
