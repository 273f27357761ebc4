/**
 * @file zen-graph-cv/src/errors.rs
 * @brief Error types for the cross-validation harness
 *
 * Every failure in this crate is structural or a configuration problem, so
 * nothing is retried. Errors raised inside a fold carry the repeat and fold
 * index at which they happened.
 */

/// Crate-wide error type
#[derive(Debug, thiserror::Error)]
pub enum GraphCVError {
    #[error("class {class} has {count} samples, fewer than the {folds} folds requested")]
    InsufficientClassSamples {
        class: usize,
        count: usize,
        folds: usize,
    },

    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("Index {index} out of range for dataset of {len} graphs")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Non-finite loss {loss} at repeat {repeat}, fold {fold}, epoch {epoch}")]
    NonFiniteLoss {
        repeat: usize,
        fold: usize,
        epoch: usize,
        loss: f32,
    },

    #[error("Empty {split} batch sequence at repeat {repeat}, fold {fold}")]
    EmptyBatchSequence {
        repeat: usize,
        fold: usize,
        split: &'static str,
    },

    #[error("Cannot summarize an empty result set")]
    EmptyResultSet,

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    #[cfg(feature = "serde")]
    #[error("Config serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GraphCVError {
    /// True when the error was raised while a fold was training or evaluating.
    pub fn is_fold_failure(&self) -> bool {
        matches!(
            self,
            GraphCVError::NonFiniteLoss { .. }
                | GraphCVError::EmptyBatchSequence { .. }
                | GraphCVError::Model(_)
        )
    }
}

/// Result alias used throughout the crate
pub type GraphCVResult<T> = Result<T, GraphCVError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_failure_classification() {
        let err = GraphCVError::NonFiniteLoss { repeat: 0, fold: 3, epoch: 7, loss: f32::NAN };
        assert!(err.is_fold_failure());
        assert!(err.to_string().contains("fold 3"));

        let err = GraphCVError::EmptyBatchSequence { repeat: 1, fold: 0, split: "test" };
        assert!(err.is_fold_failure());
        assert_eq!(err.to_string(), "Empty test batch sequence at repeat 1, fold 0");

        assert!(!GraphCVError::EmptyResultSet.is_fold_failure());
        assert!(!GraphCVError::IndexOutOfRange { index: 4, len: 2 }.is_fold_failure());
    }
}
