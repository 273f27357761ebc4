/**
 * @file zen-graph-cv/src/training/runner.rs
 * @brief One fold's fit/evaluate cycle against a trainable model
 *
 * ## Training Loop Architecture:
 * 1. **Fresh Model**: the factory builds a new model for the fold
 * 2. **Train Pass**: one full pass over the training batches
 * 3. **Validation Pass**: one full pass over the test batches
 * 4. **Early Stopping**: validation loss drives the stopping state machine
 * 5. **Restore**: best-epoch weights come back before the final evaluation
 * 6. **Final Test**: accuracy over the whole test flow, computed once
 *
 * Models never outlive their fold; the runner owns the model for the
 * duration of `run_fold` and drops it afterwards.
 */

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::early_stopping::{EarlyStopping, EarlyStoppingPolicy, StoppingState};
use crate::errors::{GraphCVError, GraphCVResult};
use crate::gnn::{BatchFlow, PaddedBatch};

// === MODEL CONTRACT ===

/// Loss and metric (accuracy for classifiers) of one evaluated batch
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatchEvaluation {
    pub loss: f32,
    pub metric: f32,
}

/**
 * Model contract used by the harness.
 *
 * Layer math and the optimizer live behind this trait. The harness only
 * needs per-batch training and evaluation plus a way to save and restore
 * weights for early stopping.
 */
pub trait TrainableModel {
    /// Owned copy of the model weights
    type Snapshot;

    /// One optimisation step on a batch, returning the batch training loss
    fn train_on_batch(&mut self, batch: &PaddedBatch) -> GraphCVResult<f32>;

    /// Loss and metric on a batch without updating weights
    fn evaluate_batch(&self, batch: &PaddedBatch) -> GraphCVResult<BatchEvaluation>;

    fn snapshot(&self) -> Self::Snapshot;

    fn restore(&mut self, snapshot: &Self::Snapshot) -> GraphCVResult<()>;
}

/// Identifies the fold a model is built for
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FoldContext {
    pub repeat: usize,
    pub fold: usize,
    /// Seed derived for this fold; use it to initialise model weights
    pub seed: u64,
}

/// Builds one freshly initialised model per fold
pub trait ModelFactory {
    type Model: TrainableModel;

    fn create(&self, context: FoldContext) -> GraphCVResult<Self::Model>;
}

impl<F, M> ModelFactory for F
where
    F: Fn(FoldContext) -> GraphCVResult<M>,
    M: TrainableModel,
{
    type Model = M;

    fn create(&self, context: FoldContext) -> GraphCVResult<M> {
        self(context)
    }
}

// === RESULTS ===

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct EpochRecord {
    /// 1-based epoch number
    pub epoch: usize,
    pub train_loss: f32,
    pub val_loss: f32,
    pub val_metric: f32,
    pub state: StoppingState,
}

/// Loss/metric trajectory of one fold
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingHistory {
    pub epochs: Vec<EpochRecord>,
    /// Epoch whose weights were used for the final evaluation
    pub best_epoch: Option<usize>,
    /// True when patience ran out before the epoch budget
    pub stopped_early: bool,
}

impl TrainingHistory {
    pub fn epochs_run(&self) -> usize {
        self.epochs.len()
    }

    pub fn train_losses(&self) -> Vec<f32> {
        self.epochs.iter().map(|e| e.train_loss).collect()
    }

    pub fn val_losses(&self) -> Vec<f32> {
        self.epochs.iter().map(|e| e.val_loss).collect()
    }
}

/// Per-fold outcome
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct FitResult {
    pub repeat: usize,
    pub fold: usize,
    pub history: TrainingHistory,
    pub test_loss: f32,
    pub test_accuracy: f32,
}

// === RUNNER ===

/// Drives a fold's epochs under an early-stopping policy
#[derive(Debug, Clone)]
pub struct TrainingRunner {
    policy: EarlyStoppingPolicy,
    max_epochs: usize,
}

impl TrainingRunner {
    pub fn new(policy: EarlyStoppingPolicy, max_epochs: usize) -> Self {
        Self { policy, max_epochs }
    }

    pub fn policy(&self) -> &EarlyStoppingPolicy {
        &self.policy
    }

    pub fn max_epochs(&self) -> usize {
        self.max_epochs
    }

    /**
     * Fit a fresh model on `train` and report its accuracy on `test`.
     *
     * Any non-finite training or validation loss aborts the fold with
     * `NonFiniteLoss`; an empty flow aborts it with `EmptyBatchSequence`.
     */
    pub fn run_fold<F: ModelFactory>(
        &self,
        factory: &F,
        context: FoldContext,
        train: &BatchFlow<'_>,
        test: &BatchFlow<'_>,
    ) -> GraphCVResult<FitResult> {
        if self.max_epochs == 0 {
            return Err(GraphCVError::InvalidConfiguration(
                "max_epochs must be greater than 0".to_string(),
            ));
        }
        if train.is_empty() {
            return Err(GraphCVError::EmptyBatchSequence {
                repeat: context.repeat,
                fold: context.fold,
                split: "train",
            });
        }
        if test.is_empty() {
            return Err(GraphCVError::EmptyBatchSequence {
                repeat: context.repeat,
                fold: context.fold,
                split: "test",
            });
        }

        let mut model = factory.create(context)?;
        let mut stopper = EarlyStopping::new(self.policy);
        let mut history = TrainingHistory::default();

        for epoch in 1..=self.max_epochs {
            let train_loss = Self::train_epoch(&mut model, train, context, epoch)?;
            let validation = Self::evaluate_flow(&model, test)?;
            ensure_finite(validation.loss, context, epoch)?;

            let state = stopper.observe(validation.loss, || model.snapshot());

            log::debug!(
                "repeat {} fold {} epoch {}/{}: loss={:.6}, val_loss={:.6}, val_metric={:.4}, state={:?}",
                context.repeat,
                context.fold,
                epoch,
                self.max_epochs,
                train_loss,
                validation.loss,
                validation.metric,
                state
            );

            history.epochs.push(EpochRecord {
                epoch,
                train_loss,
                val_loss: validation.loss,
                val_metric: validation.metric,
                state,
            });

            if state == StoppingState::Stopped {
                log::info!(
                    "Early stopping triggered at epoch {} (repeat {}, fold {}, best epoch {:?})",
                    epoch,
                    context.repeat,
                    context.fold,
                    stopper.best_epoch()
                );
                history.stopped_early = true;
                break;
            }
        }

        if !history.stopped_early {
            stopper.finish();
        }

        let last_epoch = history.epochs_run();
        history.best_epoch = Some(last_epoch);

        if let (Some(best_epoch), Some(best_weights)) =
            (stopper.best_epoch(), stopper.take_best_weights())
        {
            if best_epoch != last_epoch {
                model.restore(&best_weights)?;
            }
            history.best_epoch = Some(best_epoch);
        }

        let final_eval = Self::evaluate_flow(&model, test)?;

        Ok(FitResult {
            repeat: context.repeat,
            fold: context.fold,
            history,
            test_loss: final_eval.loss,
            test_accuracy: final_eval.metric,
        })
    }

    /// One pass over `train`; returns the sample-weighted mean batch loss
    fn train_epoch<M: TrainableModel>(
        model: &mut M,
        train: &BatchFlow<'_>,
        context: FoldContext,
        epoch: usize,
    ) -> GraphCVResult<f32> {
        let mut total_loss = 0.0f64;
        let mut total_samples = 0usize;

        for batch in train {
            let loss = model.train_on_batch(&batch)?;
            ensure_finite(loss, context, epoch)?;
            total_loss += loss as f64 * batch.len() as f64;
            total_samples += batch.len();
        }

        Ok((total_loss / total_samples.max(1) as f64) as f32)
    }

    /// One pass over `flow` without training; sample-weighted means
    pub fn evaluate_flow<M: TrainableModel>(
        model: &M,
        flow: &BatchFlow<'_>,
    ) -> GraphCVResult<BatchEvaluation> {
        let mut total_loss = 0.0f64;
        let mut total_metric = 0.0f64;
        let mut total_samples = 0usize;

        for batch in flow {
            let evaluation = model.evaluate_batch(&batch)?;
            let weight = batch.len() as f64;
            total_loss += evaluation.loss as f64 * weight;
            total_metric += evaluation.metric as f64 * weight;
            total_samples += batch.len();
        }

        let samples = total_samples.max(1) as f64;
        Ok(BatchEvaluation {
            loss: (total_loss / samples) as f32,
            metric: (total_metric / samples) as f32,
        })
    }
}

fn ensure_finite(loss: f32, context: FoldContext, epoch: usize) -> GraphCVResult<()> {
    if loss.is_finite() {
        Ok(())
    } else {
        Err(GraphCVError::NonFiniteLoss {
            repeat: context.repeat,
            fold: context.fold,
            epoch,
            loss,
        })
    }
}
