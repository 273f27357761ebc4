/**
 * @file zen-graph-cv/src/validation/orchestrator.rs
 * @brief Repeated k-fold evaluation: splitter → batch flows → training runner
 *
 * One [`CrossValidator::evaluate`] call:
 *
 * 1. validates the configuration and builds the padded batch generator once
 *    over the whole dataset (shape errors surface before any fold runs)
 * 2. asks the stratified splitter for each (train, test) assignment in order
 * 3. builds fresh train/test flows for the assignment and hands them to the
 *    training runner together with a fresh model from the factory
 * 4. collects one [`FitResult`] per fold, in splitter order
 *
 * The first failing fold aborts the run. No partial result list is ever
 * returned.
 */

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

#[cfg(feature = "parallel")]
use rayon::prelude::*;
#[cfg(feature = "parallel")]
use std::sync::atomic::{AtomicBool, Ordering};

use super::splitter::{mix_seed, FoldAssignment, StratifiedKFold};
use super::summary::{summarize, CrossValidationSummary};
use crate::config::CrossValidationConfig;
use crate::errors::GraphCVResult;
use crate::gnn::{Dataset, PaddedBatchGenerator};
use crate::training::{FitResult, FoldContext, ModelFactory, TrainingRunner};

/// ChaCha stream used for training-order shuffles; stream 0 is left to models
const SHUFFLE_STREAM: u64 = 1;

/// Runs repeated stratified k-fold evaluation of a model factory
#[derive(Debug, Clone)]
pub struct CrossValidator {
    config: CrossValidationConfig,
}

impl CrossValidator {
    pub fn new(config: CrossValidationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CrossValidationConfig {
        &self.config
    }

    /// Seed handed to the model factory and the training shuffle of one fold
    pub fn fold_seed(&self, repeat: usize, fold: usize) -> u64 {
        mix_seed(mix_seed(self.config.seed, repeat as u64), fold as u64)
    }

    /**
     * Evaluate `factory` on `dataset` fold by fold.
     *
     * Returns `folds * n_repeats` results ordered by (repeat, fold).
     */
    pub fn evaluate<F: ModelFactory>(
        &self,
        dataset: &Dataset,
        factory: &F,
    ) -> GraphCVResult<Vec<FitResult>> {
        let (generator, splitter, runner) = self.prepare(dataset)?;

        let mut results = Vec::with_capacity(splitter.num_splits());
        for assignment in splitter.split() {
            results.push(self.run_assignment(&generator, &runner, factory, assignment)?);
        }

        log::info!("Cross-validation finished: {} folds evaluated", results.len());
        Ok(results)
    }

    /// [`evaluate`](Self::evaluate) followed by [`summarize`]
    pub fn evaluate_and_summarize<F: ModelFactory>(
        &self,
        dataset: &Dataset,
        factory: &F,
    ) -> GraphCVResult<(Vec<FitResult>, CrossValidationSummary)> {
        let results = self.evaluate(dataset, factory)?;
        let summary = summarize(&results)?;
        log::info!("{}", summary);
        Ok((results, summary))
    }

    /**
     * Evaluate folds as independent rayon tasks.
     *
     * Each task builds and owns its model. Results keep splitter order.
     * Once any fold fails, folds that have not started yet are skipped, and
     * the error of the earliest failing fold by splitter order is returned.
     */
    #[cfg(feature = "parallel")]
    pub fn evaluate_parallel<F>(
        &self,
        dataset: &Dataset,
        factory: &F,
    ) -> GraphCVResult<Vec<FitResult>>
    where
        F: ModelFactory + Sync,
    {
        let (generator, splitter, runner) = self.prepare(dataset)?;
        let assignments: Vec<FoldAssignment> = splitter.split().collect();

        let aborted = AtomicBool::new(false);
        let outcomes: Vec<Option<GraphCVResult<FitResult>>> = assignments
            .into_par_iter()
            .map(|assignment| {
                if aborted.load(Ordering::Acquire) {
                    return None;
                }
                let outcome = self.run_assignment(&generator, &runner, factory, assignment);
                if outcome.is_err() {
                    aborted.store(true, Ordering::Release);
                }
                Some(outcome)
            })
            .collect();

        // Folds are only skipped after a failure, so `?` returns before a short list can
        let mut results = Vec::with_capacity(outcomes.len());
        for outcome in outcomes.into_iter().flatten() {
            results.push(outcome?);
        }
        log::info!(
            "Cross-validation finished: {} folds evaluated in parallel",
            results.len()
        );
        Ok(results)
    }

    fn prepare<'d>(
        &self,
        dataset: &'d Dataset,
    ) -> GraphCVResult<(PaddedBatchGenerator<'d>, StratifiedKFold, TrainingRunner)> {
        self.config.validate()?;

        let generator = PaddedBatchGenerator::new(dataset)?;
        let splitter = StratifiedKFold::from_dataset(
            dataset,
            self.config.folds,
            self.config.n_repeats,
            self.config.seed,
        )?;
        let runner = TrainingRunner::new(self.config.early_stopping(), self.config.epochs);

        log::info!(
            "Starting {}x{}-fold cross-validation on {} graphs (max_nodes={}, batch_size={}, epochs={})",
            self.config.n_repeats,
            self.config.folds,
            dataset.len(),
            generator.max_nodes(),
            self.config.batch_size,
            self.config.epochs
        );

        Ok((generator, splitter, runner))
    }

    fn run_assignment<F: ModelFactory>(
        &self,
        generator: &PaddedBatchGenerator<'_>,
        runner: &TrainingRunner,
        factory: &F,
        assignment: FoldAssignment,
    ) -> GraphCVResult<FitResult> {
        let FoldAssignment {
            repeat,
            fold,
            mut train_indices,
            test_indices,
        } = assignment;

        let seed = self.fold_seed(repeat, fold);
        if self.config.shuffle_training {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            rng.set_stream(SHUFFLE_STREAM);
            train_indices.shuffle(&mut rng);
        }

        if test_indices.len() < self.config.batch_size {
            log::warn!(
                "repeat {} fold {}: test set has {} graphs, fewer than batch_size {}",
                repeat,
                fold,
                test_indices.len(),
                self.config.batch_size
            );
        }

        let train = generator.flow(&train_indices, self.config.batch_size)?;
        let test = generator.flow(&test_indices, self.config.batch_size)?;
        let context = FoldContext { repeat, fold, seed };

        let result = runner.run_fold(factory, context, &train, &test)?;

        log::info!(
            "repeat {} fold {}: {} epochs, test_loss={:.4}, test_accuracy={:.4}",
            repeat,
            fold,
            result.history.epochs_run(),
            result.test_loss,
            result.test_accuracy
        );

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::GraphCVError;
    use crate::gnn::{generate_synthetic_dataset, GraphRecord, Label, PaddedBatch, SyntheticDatasetConfig};
    use crate::training::{BatchEvaluation, TrainableModel};
    use ndarray::Array2;
    use std::cell::{Cell, RefCell};

    /// Always-improving model whose accuracy encodes its fold
    struct FoldTagModel {
        fold: usize,
        steps: usize,
        diverge: bool,
    }

    impl TrainableModel for FoldTagModel {
        type Snapshot = usize;

        fn train_on_batch(&mut self, _batch: &PaddedBatch) -> GraphCVResult<f32> {
            self.steps += 1;
            Ok(if self.diverge { f32::NAN } else { 1.0 / self.steps as f32 })
        }

        fn evaluate_batch(&self, _batch: &PaddedBatch) -> GraphCVResult<BatchEvaluation> {
            Ok(BatchEvaluation {
                loss: 1.0 / (1 + self.steps) as f32,
                metric: (self.fold + 1) as f32 / 10.0,
            })
        }

        fn snapshot(&self) -> usize {
            self.steps
        }

        fn restore(&mut self, snapshot: &usize) -> GraphCVResult<()> {
            self.steps = *snapshot;
            Ok(())
        }
    }

    fn tagged(ctx: FoldContext) -> GraphCVResult<FoldTagModel> {
        Ok(FoldTagModel { fold: ctx.fold, steps: 0, diverge: false })
    }

    fn dataset() -> Dataset {
        generate_synthetic_dataset(&SyntheticDatasetConfig {
            class_sizes: vec![6, 4],
            seed: 3,
            ..Default::default()
        })
        .unwrap()
    }

    fn config() -> CrossValidationConfig {
        CrossValidationConfig::builder()
            .folds(2)
            .n_repeats(2)
            .epochs(3)
            .batch_size(3)
            .build()
            .unwrap()
    }

    #[test]
    fn test_results_follow_splitter_order() {
        let results = CrossValidator::new(config()).evaluate(&dataset(), &tagged).unwrap();

        let order: Vec<_> = results.iter().map(|r| (r.repeat, r.fold)).collect();
        assert_eq!(order, vec![(0, 0), (0, 1), (1, 0), (1, 1)]);
        assert!(results.iter().all(|r| r.history.epochs_run() == 3));
        assert!((results[1].test_accuracy - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_fresh_seeded_model_per_fold() {
        let seeds = RefCell::new(Vec::new());
        let factory = |ctx: FoldContext| -> GraphCVResult<FoldTagModel> {
            seeds.borrow_mut().push(ctx.seed);
            tagged(ctx)
        };

        let validator = CrossValidator::new(config());
        validator.evaluate(&dataset(), &factory).unwrap();

        let seeds = seeds.into_inner();
        assert_eq!(seeds.len(), 4);
        assert_eq!(seeds[3], validator.fold_seed(1, 1));
        let mut unique = seeds.clone();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(unique.len(), 4);
    }

    /// Records the graph order of every training batch it sees
    struct RecordingModel<'r> {
        seen: &'r RefCell<Vec<Vec<usize>>>,
    }

    impl TrainableModel for RecordingModel<'_> {
        type Snapshot = ();

        fn train_on_batch(&mut self, batch: &PaddedBatch) -> GraphCVResult<f32> {
            self.seen.borrow_mut().push(batch.graph_indices.clone());
            Ok(0.5)
        }

        fn evaluate_batch(&self, _batch: &PaddedBatch) -> GraphCVResult<BatchEvaluation> {
            Ok(BatchEvaluation { loss: 0.5, metric: 0.5 })
        }

        fn snapshot(&self) {}

        fn restore(&mut self, _snapshot: &()) -> GraphCVResult<()> {
            Ok(())
        }
    }

    #[test]
    fn test_training_order_shuffled_deterministically() {
        let train_orders = |shuffle: bool| {
            let seen = RefCell::new(Vec::new());
            let factory = |_: FoldContext| Ok::<_, GraphCVError>(RecordingModel { seen: &seen });
            let config = CrossValidationConfig::builder()
                .folds(2)
                .n_repeats(1)
                .epochs(1)
                .batch_size(10)
                .shuffle_training(shuffle)
                .build()
                .unwrap();
            CrossValidator::new(config).evaluate(&dataset(), &factory).unwrap();
            seen.into_inner()
        };

        let plain = train_orders(false);
        assert_eq!(plain.len(), 2);
        assert!(plain.iter().all(|order| order.windows(2).all(|w| w[0] < w[1])));

        let shuffled = train_orders(true);
        assert_eq!(shuffled, train_orders(true));
        assert_ne!(shuffled, plain);
        for (a, b) in shuffled.iter().zip(&plain) {
            let mut sorted = a.clone();
            sorted.sort_unstable();
            assert_eq!(&sorted, b);
        }
    }

    #[test]
    fn test_first_failure_aborts_run() {
        let created = Cell::new(0);
        let factory = |ctx: FoldContext| -> GraphCVResult<FoldTagModel> {
            created.set(created.get() + 1);
            Ok(FoldTagModel { fold: ctx.fold, steps: 0, diverge: ctx.repeat == 0 && ctx.fold == 1 })
        };

        let err = CrossValidator::new(config()).evaluate(&dataset(), &factory).unwrap_err();
        assert!(matches!(err, GraphCVError::NonFiniteLoss { repeat: 0, fold: 1, epoch: 1, .. }));
        assert!(err.is_fold_failure());
        assert_eq!(created.get(), 2);
    }

    #[test]
    fn test_structural_errors_before_any_fold() {
        let created = Cell::new(0);
        let factory = |ctx: FoldContext| -> GraphCVResult<FoldTagModel> {
            created.set(created.get() + 1);
            tagged(ctx)
        };

        let mismatched = Dataset::new(
            vec![
                GraphRecord::new(Array2::zeros((2, 3)), Array2::zeros((2, 2))).unwrap(),
                GraphRecord::new(Array2::zeros((2, 4)), Array2::zeros((2, 2))).unwrap(),
                GraphRecord::new(Array2::zeros((1, 3)), Array2::zeros((1, 1))).unwrap(),
                GraphRecord::new(Array2::zeros((1, 3)), Array2::zeros((1, 1))).unwrap(),
            ],
            vec![Label::Class(0), Label::Class(1), Label::Class(0), Label::Class(1)],
        )
        .unwrap();
        let err = CrossValidator::new(config()).evaluate(&mismatched, &factory).unwrap_err();
        assert!(matches!(err, GraphCVError::ShapeMismatch(_)));

        let too_many_folds = CrossValidationConfig::builder().folds(7).build().unwrap();
        let err = CrossValidator::new(too_many_folds).evaluate(&dataset(), &factory).unwrap_err();
        assert!(matches!(err, GraphCVError::InsufficientClassSamples { class: 0, count: 6, folds: 7 }));

        let invalid = CrossValidationConfig { folds: 1, ..config() };
        let err = CrossValidator::new(invalid).evaluate(&dataset(), &factory).unwrap_err();
        assert!(matches!(err, GraphCVError::InvalidConfiguration(_)));

        assert_eq!(created.get(), 0);
    }

    #[test]
    fn test_evaluate_and_summarize() {
        let (results, summary) = CrossValidator::new(config())
            .evaluate_and_summarize(&dataset(), &tagged)
            .unwrap();

        assert_eq!(results.len(), 4);
        assert_eq!(summary.repeat_means.len(), 2);
        assert!((summary.mean_accuracy - 0.15).abs() < 1e-6);
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn test_parallel_matches_sequential() {
        let validator = CrossValidator::new(config());
        let sequential = validator.evaluate(&dataset(), &tagged).unwrap();
        let parallel = validator.evaluate_parallel(&dataset(), &tagged).unwrap();
        assert_eq!(sequential, parallel);
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn test_parallel_failure_skips_pending_folds() {
        use std::sync::atomic::AtomicUsize;

        let created = AtomicUsize::new(0);
        let factory = |ctx: FoldContext| -> GraphCVResult<FoldTagModel> {
            created.fetch_add(1, Ordering::SeqCst);
            Ok(FoldTagModel { fold: ctx.fold, steps: 0, diverge: ctx.repeat == 0 && ctx.fold == 0 })
        };

        // One worker runs the folds in splitter order
        let pool = rayon::ThreadPoolBuilder::new().num_threads(1).build().unwrap();
        let err = pool
            .install(|| CrossValidator::new(config()).evaluate_parallel(&dataset(), &factory))
            .unwrap_err();

        assert!(matches!(err, GraphCVError::NonFiniteLoss { repeat: 0, fold: 0, .. }));
        assert_eq!(created.load(Ordering::SeqCst), 1);
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn test_parallel_reports_earliest_failing_fold() {
        let factory = |ctx: FoldContext| -> GraphCVResult<FoldTagModel> {
            Ok(FoldTagModel { fold: ctx.fold, steps: 0, diverge: ctx.fold == 1 })
        };

        let err = CrossValidator::new(config())
            .evaluate_parallel(&dataset(), &factory)
            .unwrap_err();
        assert!(matches!(err, GraphCVError::NonFiniteLoss { fold: 1, .. }));
    }
}
