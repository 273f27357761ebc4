/**
 * @file zen-graph-cv/src/models/mean_pool.rs
 * @brief Small reference graph classifier implementing `TrainableModel`
 *
 * ## Forward pass (per graph):
 * 1. **Propagate**: `H = D⁻¹ (A + I) X` over real nodes only
 * 2. **Readout**: masked mean of `H` over real nodes
 * 3. **Classify**: `softmax(h · W + b)`
 *
 * Propagation and readout carry no parameters, so training is a softmax
 * regression on the pooled graph embeddings: plain SGD on cross-entropy.
 */

use ndarray::{s, Array1, Array2, Array3, Axis};
use ndarray_rand::RandomExt;
use rand::distributions::Uniform;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::errors::{GraphCVError, GraphCVResult};
use crate::gnn::{masked_mean, LabelEncoding, PaddedBatch};
use crate::training::{BatchEvaluation, FoldContext, TrainableModel};

const PROBABILITY_FLOOR: f32 = 1e-7;

/// Copy of the classifier parameters used for best-epoch restore
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct MeanPoolWeights {
    /// [feature_width, num_classes]
    pub weights: Array2<f32>,
    /// [num_classes]
    pub bias: Array1<f32>,
}

#[derive(Debug, Clone)]
pub struct MeanPoolClassifier {
    params: MeanPoolWeights,
    learning_rate: f32,
}

impl MeanPoolClassifier {
    /// Xavier-uniform weights and zero bias, drawn from a ChaCha8 stream on `seed`
    pub fn new(
        feature_width: usize,
        num_classes: usize,
        learning_rate: f32,
        seed: u64,
    ) -> GraphCVResult<Self> {
        if feature_width == 0 || num_classes < 2 {
            return Err(GraphCVError::InvalidConfiguration(format!(
                "Classifier needs a feature width > 0 and at least 2 classes, got {} and {}",
                feature_width, num_classes
            )));
        }
        if !learning_rate.is_finite() || learning_rate <= 0.0 {
            return Err(GraphCVError::InvalidConfiguration(format!(
                "Learning rate must be positive and finite, got {}",
                learning_rate
            )));
        }

        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let scale = (6.0f32 / (feature_width + num_classes) as f32).sqrt();
        let weights = Array2::random_using(
            (feature_width, num_classes),
            Uniform::new(-scale, scale),
            &mut rng,
        );

        Ok(Self {
            params: MeanPoolWeights {
                weights,
                bias: Array1::zeros(num_classes),
            },
            learning_rate,
        })
    }

    /**
     * Factory building one classifier per fold, seeded from the fold context.
     *
     * ```rust
     * use zen_graph_cv::models::MeanPoolClassifier;
     * use zen_graph_cv::training::{FoldContext, ModelFactory};
     *
     * let factory = MeanPoolClassifier::factory(4, 2, 0.1);
     * let model = factory.create(FoldContext { repeat: 0, fold: 0, seed: 7 }).unwrap();
     * assert_eq!(model.num_classes(), 2);
     * ```
     */
    pub fn factory(
        feature_width: usize,
        num_classes: usize,
        learning_rate: f32,
    ) -> impl Fn(FoldContext) -> GraphCVResult<Self> + Sync {
        move |context: FoldContext| Self::new(feature_width, num_classes, learning_rate, context.seed)
    }

    pub fn feature_width(&self) -> usize {
        self.params.weights.nrows()
    }

    pub fn num_classes(&self) -> usize {
        self.params.weights.ncols()
    }

    pub fn learning_rate(&self) -> f32 {
        self.learning_rate
    }

    pub fn weights(&self) -> &MeanPoolWeights {
        &self.params
    }

    /// Class probabilities for every graph in the batch: [B, num_classes]
    pub fn predict_proba(&self, batch: &PaddedBatch) -> GraphCVResult<Array2<f32>> {
        self.check_features(batch)?;
        Ok(self.probabilities(&self.embed(batch)))
    }

    fn check_features(&self, batch: &PaddedBatch) -> GraphCVResult<()> {
        let width = batch.node_features.dim().2;
        if width != self.feature_width() {
            return Err(GraphCVError::ShapeMismatch(format!(
                "Batch feature width {} does not match classifier width {}",
                width,
                self.feature_width()
            )));
        }
        Ok(())
    }

    fn check_labels(&self, batch: &PaddedBatch) -> GraphCVResult<()> {
        if batch.labels.ncols() != self.num_classes() {
            return Err(GraphCVError::ShapeMismatch(format!(
                "Batch label width {} does not match {} classes",
                batch.labels.ncols(),
                self.num_classes()
            )));
        }
        Ok(())
    }

    fn embed(&self, batch: &PaddedBatch) -> Array2<f32> {
        let propagated = propagate(batch);
        masked_mean(propagated.view(), batch.node_masks.view())
    }

    fn probabilities(&self, embeddings: &Array2<f32>) -> Array2<f32> {
        let mut logits = embeddings.dot(&self.params.weights) + &self.params.bias;

        for mut row in logits.outer_iter_mut() {
            let max = row.iter().fold(f32::NEG_INFINITY, |acc, &x| acc.max(x));
            row.mapv_inplace(|x| (x - max).exp());
            let sum = row.sum();
            row /= sum;
        }

        logits
    }
}

/// Mean over each real node's closed neighbourhood (`A + I`), per graph
pub fn propagate(batch: &PaddedBatch) -> Array3<f32> {
    let (graphs, nodes, width) = batch.node_features.dim();
    let mut out = Array3::zeros((graphs, nodes, width));

    for b in 0..graphs {
        let mask = batch.node_masks.row(b);
        let adjacency = batch.adjacency.index_axis(Axis(0), b);
        let features = batch.node_features.index_axis(Axis(0), b);

        for i in 0..nodes {
            if !mask[i] {
                continue;
            }

            let mut row = out.slice_mut(s![b, i, ..]);
            let mut total = 0.0f32;
            for j in 0..nodes {
                if !mask[j] {
                    continue;
                }
                let weight = adjacency[[i, j]] + if i == j { 1.0 } else { 0.0 };
                if weight != 0.0 {
                    row.scaled_add(weight, &features.row(j));
                    total += weight;
                }
            }

            if total.abs() > f32::EPSILON {
                row /= total;
            } else {
                row.assign(&features.row(i));
            }
        }
    }

    out
}

fn cross_entropy(probabilities: &Array2<f32>, labels: &Array2<f32>) -> f32 {
    let log_p = probabilities.mapv(|p| p.max(PROBABILITY_FLOOR).ln());
    -(labels * &log_p).sum() / probabilities.nrows().max(1) as f32
}

fn accuracy(probabilities: &Array2<f32>, labels: &Array2<f32>) -> f32 {
    let correct = probabilities
        .outer_iter()
        .zip(labels.outer_iter())
        .filter(|(p, y)| LabelEncoding::decode_class(p.view()) == LabelEncoding::decode_class(y.view()))
        .count();
    correct as f32 / probabilities.nrows().max(1) as f32
}

impl TrainableModel for MeanPoolClassifier {
    type Snapshot = MeanPoolWeights;

    fn train_on_batch(&mut self, batch: &PaddedBatch) -> GraphCVResult<f32> {
        self.check_features(batch)?;
        self.check_labels(batch)?;

        let embeddings = self.embed(batch);
        let probabilities = self.probabilities(&embeddings);
        let loss = cross_entropy(&probabilities, &batch.labels);

        // d(loss)/d(logits) for softmax + cross-entropy
        let delta = (&probabilities - &batch.labels) / batch.len().max(1) as f32;
        let grad_weights = embeddings.t().dot(&delta);
        let grad_bias = delta.sum_axis(Axis(0));

        self.params.weights.scaled_add(-self.learning_rate, &grad_weights);
        self.params.bias.scaled_add(-self.learning_rate, &grad_bias);

        Ok(loss)
    }

    fn evaluate_batch(&self, batch: &PaddedBatch) -> GraphCVResult<BatchEvaluation> {
        self.check_features(batch)?;
        self.check_labels(batch)?;

        let probabilities = self.probabilities(&self.embed(batch));
        Ok(BatchEvaluation {
            loss: cross_entropy(&probabilities, &batch.labels),
            metric: accuracy(&probabilities, &batch.labels),
        })
    }

    fn snapshot(&self) -> MeanPoolWeights {
        self.params.clone()
    }

    fn restore(&mut self, snapshot: &MeanPoolWeights) -> GraphCVResult<()> {
        if snapshot.weights.dim() != self.params.weights.dim()
            || snapshot.bias.len() != self.params.bias.len()
        {
            return Err(GraphCVError::ShapeMismatch(
                "Snapshot shape does not match the classifier".to_string(),
            ));
        }
        self.params = snapshot.clone();
        Ok(())
    }
}
