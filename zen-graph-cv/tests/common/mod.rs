//! Common testing utilities for zen-graph-cv integration tests
//!
//! Seeded graph fixtures plus a scripted model whose validation losses are
//! fixed in advance, so early-stopping paths can be driven exactly.

#![allow(dead_code)]

use ndarray::Array2;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use zen_graph_cv::gnn::{generate_random_graph, Dataset, GraphRecord, Label, PaddedBatch};
use zen_graph_cv::{BatchEvaluation, GraphCVResult, TrainableModel};

/// Initialise logging once per test binary
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Test graph generator
pub struct TestDataGenerator {
    pub seed: u64,
    pub feature_width: usize,
    pub min_nodes: usize,
    pub max_nodes: usize,
}

impl TestDataGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            feature_width: 3,
            min_nodes: 1,
            max_nodes: 8,
        }
    }

    pub fn with_nodes(mut self, min_nodes: usize, max_nodes: usize) -> Self {
        self.min_nodes = min_nodes;
        self.max_nodes = max_nodes;
        self
    }

    pub fn with_feature_width(mut self, feature_width: usize) -> Self {
        self.feature_width = feature_width;
        self
    }

    /// Random graphs of varying size
    pub fn generate_graphs(&self, count: usize) -> Vec<GraphRecord> {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        (0..count)
            .map(|_| {
                let nodes = rng.gen_range(self.min_nodes..=self.max_nodes);
                generate_random_graph(nodes, nodes, self.feature_width, &mut rng)
                    .expect("generator parameters are valid")
            })
            .collect()
    }

    /// Dataset whose class `c` holds `class_sizes[c]` graphs, classes interleaved
    pub fn generate_dataset(&self, class_sizes: &[usize]) -> Dataset {
        let total: usize = class_sizes.iter().sum();
        let graphs = self.generate_graphs(total);

        let mut labels = Vec::with_capacity(total);
        let mut remaining = class_sizes.to_vec();
        while labels.len() < total {
            for (class, left) in remaining.iter_mut().enumerate() {
                if *left > 0 {
                    *left -= 1;
                    labels.push(Label::Class(class));
                }
            }
        }

        Dataset::new(graphs, labels).expect("fixture dataset is valid")
    }

    /// The 10-graph, 6/4 two-class dataset
    pub fn six_four_dataset(&self) -> Dataset {
        self.generate_dataset(&[6, 4])
    }
}

/// Graph with uniform node count and a fixed feature value per node
pub fn constant_graph(nodes: usize, width: usize, value: f32) -> GraphRecord {
    GraphRecord::new(Array2::from_elem((nodes, width), value), Array2::zeros((nodes, nodes)))
        .expect("constant graph is valid")
}

/// Replays a fixed validation-loss script, one entry per epoch.
///
/// The model counts training epochs (the first batch of a pass advances it),
/// and reports `epoch / 10` as its metric so a restored epoch is visible.
pub struct ScriptedModel {
    pub val_losses: Vec<f32>,
    pub batches_per_epoch: usize,
    batches_seen: usize,
}

impl ScriptedModel {
    pub fn new(val_losses: Vec<f32>, batches_per_epoch: usize) -> Self {
        Self {
            val_losses,
            batches_per_epoch,
            batches_seen: 0,
        }
    }

    pub fn epochs_trained(&self) -> usize {
        self.batches_seen / self.batches_per_epoch.max(1)
    }
}

impl TrainableModel for ScriptedModel {
    type Snapshot = usize;

    fn train_on_batch(&mut self, _batch: &PaddedBatch) -> GraphCVResult<f32> {
        self.batches_seen += 1;
        Ok(0.5)
    }

    fn evaluate_batch(&self, _batch: &PaddedBatch) -> GraphCVResult<BatchEvaluation> {
        let epoch = self.epochs_trained();
        let idx = epoch.saturating_sub(1).min(self.val_losses.len().saturating_sub(1));
        Ok(BatchEvaluation {
            loss: self.val_losses.get(idx).copied().unwrap_or(1.0),
            metric: epoch as f32 / 10.0,
        })
    }

    fn snapshot(&self) -> usize {
        self.batches_seen
    }

    fn restore(&mut self, snapshot: &usize) -> GraphCVResult<()> {
        self.batches_seen = *snapshot;
        Ok(())
    }
}
