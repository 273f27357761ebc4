/**
 * @file zen-graph-cv/src/gnn/batching.rs
 * @brief Fixed-shape padded batching of variable-sized graphs
 *
 * Graphs in a dataset have different node counts, but a model compiled once
 * per fold needs every batch to share one shape. The generator pads each
 * graph up to the largest node count of the *whole dataset* and records a
 * boolean mask of which node slots are real.
 *
 * ## Batching Strategy:
 * - **Padding**: features and adjacency beyond a graph's node count are zero
 * - **Masking**: `node_masks[[b, i]]` is true iff node `i` is real in graph `b`
 * - **Order**: indices are consumed in the order supplied; the last batch may
 *   be smaller than `batch_size`
 * - **Restartable**: a `BatchFlow` builds a fresh iterator on every `iter()`,
 *   so epochs re-run the same batches without any shared cursor
 */

use std::sync::Arc;

use ndarray::{s, Array2, Array3, ArrayView2, ArrayView3, Axis};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::data::Dataset;
use crate::errors::{GraphCVError, GraphCVResult};

/**
 * Batched graph tensors ready for a model.
 *
 * Shapes, with `B` the number of graphs in this batch, `N` the dataset-wide
 * maximum node count, `F` the feature width and `W` the label width:
 * - `node_features`: [B, N, F]
 * - `adjacency`: [B, N, N]
 * - `node_masks`: [B, N]
 * - `labels`: [B, W]
 */
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct PaddedBatch {
    pub node_features: Array3<f32>,
    pub adjacency: Array3<f32>,
    pub node_masks: Array2<bool>,
    pub labels: Array2<f32>,
    /// Dataset index of each graph, aligned with the batch axis
    pub graph_indices: Vec<usize>,
}

impl PaddedBatch {
    /// Number of graphs in the batch
    pub fn len(&self) -> usize {
        self.graph_indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.graph_indices.is_empty()
    }

    /// Padded node slots per graph
    pub fn max_nodes(&self) -> usize {
        self.node_masks.ncols()
    }

    /// Real node count of each graph, read back from the mask
    pub fn node_counts(&self) -> Vec<usize> {
        self.node_masks
            .outer_iter()
            .map(|row| row.iter().filter(|&&real| real).count())
            .collect()
    }

    /**
     * Mean of node features over real nodes only: [B, F].
     *
     * This is the graph readout every mask-respecting model relies on;
     * padding rows never contribute.
     */
    pub fn masked_mean_pool(&self) -> Array2<f32> {
        masked_mean(self.node_features.view(), self.node_masks.view())
    }
}

/// Per-graph mean of `[B, N, F]` node rows whose mask is true: [B, F]
pub fn masked_mean(features: ArrayView3<f32>, masks: ArrayView2<bool>) -> Array2<f32> {
    let (batch, _, width) = features.dim();
    let mut pooled = Array2::zeros((batch, width));

    for (b, mut out) in pooled.outer_iter_mut().enumerate() {
        let mut count = 0usize;
        for (i, &real) in masks.row(b).iter().enumerate() {
            if real {
                out += &features.slice(s![b, i, ..]);
                count += 1;
            }
        }
        if count > 0 {
            out /= count as f32;
        }
    }

    pooled
}

/**
 * Converts index sets of a dataset into padded batch flows.
 *
 * All validation happens in [`PaddedBatchGenerator::new`]: once a generator
 * exists, every graph is known to have at least one node, the shared feature
 * width and a square adjacency over its own nodes, and every label has been
 * encoded into a row of `label_rows`.
 */
#[derive(Debug, Clone)]
pub struct PaddedBatchGenerator<'a> {
    dataset: &'a Dataset,
    max_nodes: usize,
    feature_width: usize,
    /// Encoded label of every dataset graph: [len, label_width]
    label_rows: Arc<Array2<f32>>,
}

impl<'a> PaddedBatchGenerator<'a> {
    pub fn new(dataset: &'a Dataset) -> GraphCVResult<Self> {
        let feature_width = dataset
            .graphs()
            .first()
            .map(|g| g.feature_width())
            .ok_or_else(|| GraphCVError::InvalidInput("Dataset has no graphs".to_string()))?;

        for (index, graph) in dataset.graphs().iter().enumerate() {
            if graph.node_count() == 0 {
                return Err(GraphCVError::ShapeMismatch(format!(
                    "Graph {} has no nodes",
                    index
                )));
            }
            if graph.feature_width() != feature_width {
                return Err(GraphCVError::ShapeMismatch(format!(
                    "Graph {} has feature width {}, expected {}",
                    index,
                    graph.feature_width(),
                    feature_width
                )));
            }
            let (rows, cols) = graph.adjacency().dim();
            if rows != graph.node_count() || cols != graph.node_count() {
                return Err(GraphCVError::ShapeMismatch(format!(
                    "Graph {} has a {}x{} adjacency for {} nodes",
                    index,
                    rows,
                    cols,
                    graph.node_count()
                )));
            }
        }

        let encoding = dataset.encoding();
        if dataset.labels().len() != dataset.len() {
            return Err(GraphCVError::ShapeMismatch(format!(
                "{} graphs but {} labels",
                dataset.len(),
                dataset.labels().len()
            )));
        }
        let mut label_rows = Array2::zeros((dataset.len(), encoding.width()));
        for (mut row, label) in label_rows.outer_iter_mut().zip(dataset.labels()) {
            row.assign(&encoding.encode(label)?);
        }

        Ok(Self {
            dataset,
            max_nodes: dataset.max_nodes(),
            feature_width,
            label_rows: Arc::new(label_rows),
        })
    }

    /// Padded node dimension shared by every batch
    pub fn max_nodes(&self) -> usize {
        self.max_nodes
    }

    pub fn feature_width(&self) -> usize {
        self.feature_width
    }

    pub fn label_width(&self) -> usize {
        self.dataset.encoding().width()
    }

    pub fn dataset(&self) -> &'a Dataset {
        self.dataset
    }

    /**
     * Create a restartable batch flow over `indices`.
     *
     * Labels come from the dataset through the same indices. Every index is
     * checked here, so iterating the flow cannot fail.
     */
    pub fn flow(&self, indices: &[usize], batch_size: usize) -> GraphCVResult<BatchFlow<'a>> {
        if batch_size == 0 {
            return Err(GraphCVError::InvalidConfiguration(
                "Batch size must be greater than 0".to_string(),
            ));
        }

        let len = self.dataset.len();
        if let Some(&index) = indices.iter().find(|&&index| index >= len) {
            return Err(GraphCVError::IndexOutOfRange { index, len });
        }

        Ok(BatchFlow {
            generator: self.clone(),
            indices: indices.to_vec(),
            batch_size,
        })
    }

    /// Pad the graphs at `indices` into one batch. Indices must be valid.
    fn build_batch(&self, indices: &[usize]) -> PaddedBatch {
        let batch = indices.len();
        let n = self.max_nodes;

        let mut node_features = Array3::zeros((batch, n, self.feature_width));
        let mut adjacency = Array3::zeros((batch, n, n));
        let mut node_masks = Array2::from_elem((batch, n), false);
        let mut labels = Array2::zeros((batch, self.label_rows.ncols()));

        for (b, &index) in indices.iter().enumerate() {
            let graph = &self.dataset.graphs()[index];
            let nodes = graph.node_count();

            node_features
                .slice_mut(s![b, 0..nodes, ..])
                .assign(graph.node_features());
            adjacency
                .slice_mut(s![b, 0..nodes, 0..nodes])
                .assign(graph.adjacency());
            node_masks.slice_mut(s![b, 0..nodes]).fill(true);
            labels
                .index_axis_mut(Axis(0), b)
                .assign(&self.label_rows.row(index));
        }

        PaddedBatch {
            node_features,
            adjacency,
            node_masks,
            labels,
            graph_indices: indices.to_vec(),
        }
    }
}

/// Validated index set plus batch size; iterate it as many times as needed
#[derive(Debug, Clone)]
pub struct BatchFlow<'a> {
    generator: PaddedBatchGenerator<'a>,
    indices: Vec<usize>,
    batch_size: usize,
}

impl<'a> BatchFlow<'a> {
    /// Fresh iterator starting from the first batch
    pub fn iter(&self) -> BatchIter<'_, 'a> {
        BatchIter {
            flow: self,
            position: 0,
        }
    }

    /// Number of batches one pass yields
    pub fn len(&self) -> usize {
        batch_count(self.indices.len(), self.batch_size)
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Number of graphs one pass covers
    pub fn num_graphs(&self) -> usize {
        self.indices.len()
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }
}

impl<'f, 'a> IntoIterator for &'f BatchFlow<'a> {
    type Item = PaddedBatch;
    type IntoIter = BatchIter<'f, 'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Lazy iterator over one pass of a [`BatchFlow`]
#[derive(Debug, Clone)]
pub struct BatchIter<'f, 'a> {
    flow: &'f BatchFlow<'a>,
    position: usize,
}

impl Iterator for BatchIter<'_, '_> {
    type Item = PaddedBatch;

    fn next(&mut self) -> Option<Self::Item> {
        let indices = &self.flow.indices;
        if self.position >= indices.len() {
            return None;
        }

        let end = (self.position + self.flow.batch_size).min(indices.len());
        let batch = self.flow.generator.build_batch(&indices[self.position..end]);
        self.position = end;
        Some(batch)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.flow.indices.len().saturating_sub(self.position);
        let batches = batch_count(remaining, self.flow.batch_size);
        (batches, Some(batches))
    }
}

impl ExactSizeIterator for BatchIter<'_, '_> {}

/// `ceil(graphs / batch_size)` without overflowing for huge batch sizes
fn batch_count(graphs: usize, batch_size: usize) -> usize {
    graphs / batch_size + usize::from(graphs % batch_size != 0)
}

// === TESTS ===
