//! Reference models implementing [`TrainableModel`](crate::training::TrainableModel)

pub mod mean_pool;

pub use mean_pool::{propagate, MeanPoolClassifier, MeanPoolWeights};
