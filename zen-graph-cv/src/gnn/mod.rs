/**
 * @file zen-graph-cv/src/gnn/mod.rs
 * @brief Graph data model and padded batching
 *
 * | Concern | Type |
 * |---------|------|
 * | One graph | [`GraphRecord`] (dense features + dense adjacency) |
 * | Graph label | [`Label`], encoded by [`LabelEncoding`] |
 * | Labeled collection | [`Dataset`] |
 * | Fixed-shape batches | [`PaddedBatchGenerator`] → [`BatchFlow`] → [`PaddedBatch`] |
 */

pub mod batching;
pub mod data;

pub use batching::{masked_mean, BatchFlow, BatchIter, PaddedBatch, PaddedBatchGenerator};
pub use data::{
    generate_random_graph, generate_synthetic_dataset, Adjacency, Dataset, GraphRecord, Label,
    LabelEncoding, NodeFeatures, NodeIndex, SyntheticDatasetConfig,
};
