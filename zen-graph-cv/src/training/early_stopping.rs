/**
 * @file zen-graph-cv/src/training/early_stopping.rs
 * @brief Early stopping on validation loss as an explicit state machine
 *
 * The runner feeds one validation loss per epoch into [`EarlyStopping`]:
 *
 * ```text
 *            improves by > min_delta
 *   ┌──────────────────────────────────────┐
 *   ▼                                      │
 * IMPROVING ──no improvement──▶ WAITING ───┘
 *                                 │
 *                 wait_count reaches patience
 *                 (or max_epochs completes)
 *                                 ▼
 *                              STOPPED
 * ```
 *
 * On every improvement the state machine keeps a snapshot of the model
 * weights, so the runner can restore the best epoch before final evaluation.
 */

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Early stopping configuration
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EarlyStoppingPolicy {
    /// Number of consecutive non-improving epochs that stops training
    pub patience: usize,

    /// Minimum decrease in validation loss that counts as improvement
    pub min_delta: f32,

    /// Whether to restore best weights when training halts
    pub restore_best_weights: bool,
}

impl Default for EarlyStoppingPolicy {
    fn default() -> Self {
        Self {
            patience: 25,
            min_delta: 0.0,
            restore_best_weights: true,
        }
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoppingState {
    Improving,
    Waiting,
    Stopped,
}

/// Per-fold early stopping state; `S` is the model's weight snapshot type
#[derive(Debug)]
pub struct EarlyStopping<S> {
    policy: EarlyStoppingPolicy,
    state: StoppingState,
    best_loss: f32,
    best_epoch: Option<usize>,
    wait_count: usize,
    epochs_seen: usize,
    best_weights: Option<S>,
}

impl<S> EarlyStopping<S> {
    pub fn new(policy: EarlyStoppingPolicy) -> Self {
        Self {
            policy,
            state: StoppingState::Improving,
            best_loss: f32::INFINITY,
            best_epoch: None,
            wait_count: 0,
            epochs_seen: 0,
            best_weights: None,
        }
    }

    /**
     * Record one epoch's validation loss and return the new state.
     *
     * `snapshot` is only called when the epoch improves on the best loss and
     * best weights are being kept. Once STOPPED, further losses are ignored.
     */
    pub fn observe<F>(&mut self, val_loss: f32, snapshot: F) -> StoppingState
    where
        F: FnOnce() -> S,
    {
        if self.state == StoppingState::Stopped {
            return self.state;
        }

        self.epochs_seen += 1;
        let is_improvement = (self.best_loss - val_loss) > self.policy.min_delta;

        if is_improvement {
            self.best_loss = val_loss;
            self.best_epoch = Some(self.epochs_seen);
            self.wait_count = 0;
            if self.policy.restore_best_weights {
                self.best_weights = Some(snapshot());
            }
            self.state = StoppingState::Improving;
        } else {
            self.wait_count += 1;
            self.state = if self.wait_count >= self.policy.patience {
                StoppingState::Stopped
            } else {
                StoppingState::Waiting
            };
        }

        self.state
    }

    /// Terminal transition when the epoch budget runs out
    pub fn finish(&mut self) {
        self.state = StoppingState::Stopped;
    }

    pub fn state(&self) -> StoppingState {
        self.state
    }

    pub fn policy(&self) -> &EarlyStoppingPolicy {
        &self.policy
    }

    pub fn best_loss(&self) -> f32 {
        self.best_loss
    }

    /// 1-based epoch of the best validation loss so far
    pub fn best_epoch(&self) -> Option<usize> {
        self.best_epoch
    }

    pub fn wait_count(&self) -> usize {
        self.wait_count
    }

    pub fn epochs_seen(&self) -> usize {
        self.epochs_seen
    }

    pub fn take_best_weights(&mut self) -> Option<S> {
        self.best_weights.take()
    }
}
