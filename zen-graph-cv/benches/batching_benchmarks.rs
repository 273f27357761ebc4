/**
 * @file benches/batching_benchmarks.rs
 * @brief Padded batching, fold splitting and fold training benchmarks
 *
 * ## Benchmark Categories:
 * - **Batch Generation**: one full pass over a flow at several batch sizes
 * - **Fold Splitting**: stratified assignment for a full repeated k-fold run
 * - **Fold Training**: one training epoch of the reference classifier
 *
 * ## Usage:
 * ```bash
 * cargo bench --bench batching_benchmarks
 * ```
 */

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::time::Duration;

use zen_graph_cv::gnn::{generate_synthetic_dataset, PaddedBatchGenerator, SyntheticDatasetConfig};
use zen_graph_cv::models::MeanPoolClassifier;
use zen_graph_cv::{StratifiedKFold, TrainableModel};

fn dataset(graphs_per_class: usize) -> zen_graph_cv::Dataset {
    generate_synthetic_dataset(&SyntheticDatasetConfig {
        class_sizes: vec![graphs_per_class; 2],
        min_nodes: 8,
        max_nodes: 40,
        feature_width: 16,
        ..Default::default()
    })
    .expect("benchmark dataset")
}

fn bench_batch_generation(c: &mut Criterion) {
    let _ = env_logger::try_init();
    let dataset = dataset(250);
    let generator = PaddedBatchGenerator::new(&dataset).expect("generator");
    let indices: Vec<usize> = (0..dataset.len()).collect();

    let mut group = c.benchmark_group("batch_generation");
    group.throughput(Throughput::Elements(indices.len() as u64));

    for batch_size in [8usize, 32, 128] {
        let flow = generator.flow(&indices, batch_size).expect("flow");
        group.bench_with_input(BenchmarkId::new("full_pass", batch_size), &flow, |b, flow| {
            b.iter(|| {
                let mut real_nodes = 0usize;
                for batch in flow {
                    real_nodes += batch.node_masks.iter().filter(|&&m| m).count();
                }
                black_box(real_nodes)
            })
        });
    }

    group.finish();
}

fn bench_fold_splitting(c: &mut Criterion) {
    let labels: Vec<usize> = (0..5000).map(|i| i % 3).collect();

    c.bench_function("stratified_10x5_fold", |b| {
        b.iter(|| {
            let splitter = StratifiedKFold::new(black_box(&labels), 10, 5, 42).expect("splitter");
            splitter.split().map(|s| s.test_indices.len()).sum::<usize>()
        })
    });
}

fn bench_training_epoch(c: &mut Criterion) {
    let dataset = dataset(100);
    let generator = PaddedBatchGenerator::new(&dataset).expect("generator");
    let indices: Vec<usize> = (0..dataset.len()).collect();
    let flow = generator.flow(&indices, 30).expect("flow");

    c.bench_function("mean_pool_training_epoch", |b| {
        let mut model = MeanPoolClassifier::new(16, 2, 0.1, 7).expect("model");
        b.iter(|| {
            for batch in &flow {
                black_box(model.train_on_batch(&batch).expect("train step"));
            }
        })
    });
}

criterion_group!(
    name = batching_benchmarks;
    config = Criterion::default()
        .warm_up_time(Duration::from_secs(2))
        .measurement_time(Duration::from_secs(8))
        .sample_size(50);
    targets = bench_batch_generation, bench_fold_splitting, bench_training_epoch
);

criterion_main!(batching_benchmarks);
