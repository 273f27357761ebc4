/**
 * @file zen-graph-cv/src/gnn/data.rs
 * @brief Graph records, labels and the in-memory dataset
 *
 * This module holds the data model the evaluation harness works on:
 *
 * - **GraphRecord**: one graph as dense node features plus a dense adjacency
 * - **Label / LabelEncoding**: typed graph labels and the explicit transform
 *   that turns them into label-tensor rows
 * - **Dataset**: ordered (GraphRecord, Label) pairs addressed only by index
 *
 * Records are immutable once built. Splitting and batching never copy graph
 * content around; they carry index sets into the dataset.
 */

use std::collections::HashSet;

use ndarray::{Array1, Array2, ArrayView1};
use ndarray_rand::RandomExt;
use rand::distributions::Uniform;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::errors::{GraphCVError, GraphCVResult};

// === TYPE ALIASES FOR CLARITY ===

/// Node feature matrix type: [node_count, feature_width]
pub type NodeFeatures = Array2<f32>;

/// Dense adjacency matrix type: [node_count, node_count]
pub type Adjacency = Array2<f32>;

/// Node indices type for edge lists
pub type NodeIndex = usize;

// === CORE DATA STRUCTURES ===

/**
 * One labeled graph's structure and node features.
 *
 * The adjacency matrix is dense and may be boolean (0/1) or weighted. Both
 * axes of the adjacency and the rows of the feature matrix always agree on
 * the node count, and the node count is at least one.
 */
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "RawGraphRecord"))]
#[derive(Debug, Clone, PartialEq)]
pub struct GraphRecord {
    node_features: NodeFeatures,
    adjacency: Adjacency,
}

impl GraphRecord {
    /**
     * Create a graph record, validating its shape invariants.
     *
     * # Examples
     *
     * ```rust
     * use ndarray::{array, Array2};
     * use zen_graph_cv::gnn::GraphRecord;
     *
     * let features = array![[1.0, 0.5], [0.2, 0.1], [0.3, 0.7]];
     * let adjacency = Array2::from_elem((3, 3), 1.0);
     * let graph = GraphRecord::new(features, adjacency).unwrap();
     *
     * assert_eq!(graph.node_count(), 3);
     * assert_eq!(graph.feature_width(), 2);
     * ```
     */
    pub fn new(node_features: NodeFeatures, adjacency: Adjacency) -> GraphCVResult<Self> {
        let node_count = node_features.nrows();

        if node_count == 0 {
            return Err(GraphCVError::ShapeMismatch(
                "Graph has no nodes; every graph needs at least one node".to_string(),
            ));
        }

        if !adjacency.is_square() {
            return Err(GraphCVError::ShapeMismatch(format!(
                "Adjacency must be square, got {}x{}",
                adjacency.nrows(),
                adjacency.ncols()
            )));
        }

        if adjacency.nrows() != node_count {
            return Err(GraphCVError::ShapeMismatch(format!(
                "Adjacency covers {} nodes but node features describe {}",
                adjacency.nrows(),
                node_count
            )));
        }

        Ok(Self {
            node_features,
            adjacency,
        })
    }

    /**
     * Build a record from an edge list.
     *
     * Each (source, target) pair sets the adjacency entry to 1.0. With
     * `symmetric` the reverse entry is set as well, which is what undirected
     * graph datasets expect.
     */
    pub fn from_edges(
        node_features: NodeFeatures,
        edges: &[(NodeIndex, NodeIndex)],
        symmetric: bool,
    ) -> GraphCVResult<Self> {
        let node_count = node_features.nrows();
        let mut adjacency = Array2::zeros((node_count, node_count));

        for &(source, target) in edges {
            if source >= node_count || target >= node_count {
                return Err(GraphCVError::InvalidInput(format!(
                    "Invalid edge ({}, {}): graph has {} nodes",
                    source, target, node_count
                )));
            }
            adjacency[[source, target]] = 1.0;
            if symmetric {
                adjacency[[target, source]] = 1.0;
            }
        }

        Self::new(node_features, adjacency)
    }

    /// Number of real nodes in the graph
    pub fn node_count(&self) -> usize {
        self.node_features.nrows()
    }

    /// Width of every node feature vector
    pub fn feature_width(&self) -> usize {
        self.node_features.ncols()
    }

    pub fn node_features(&self) -> &NodeFeatures {
        &self.node_features
    }

    pub fn adjacency(&self) -> &Adjacency {
        &self.adjacency
    }

    /// Number of non-zero adjacency entries
    pub fn edge_count(&self) -> usize {
        self.adjacency.iter().filter(|&&w| w != 0.0).count()
    }

    /// Out-degree of a node (non-zero entries in its adjacency row)
    pub fn degree(&self, node: NodeIndex) -> GraphCVResult<usize> {
        if node >= self.node_count() {
            return Err(GraphCVError::InvalidInput(format!(
                "Node index {} out of bounds (graph has {} nodes)",
                node,
                self.node_count()
            )));
        }
        Ok(self.adjacency.row(node).iter().filter(|&&w| w != 0.0).count())
    }
}

/// Unchecked wire form of [`GraphRecord`]
#[cfg(feature = "serde")]
#[derive(Deserialize)]
struct RawGraphRecord {
    node_features: NodeFeatures,
    adjacency: Adjacency,
}

#[cfg(feature = "serde")]
impl TryFrom<RawGraphRecord> for GraphRecord {
    type Error = GraphCVError;

    fn try_from(raw: RawGraphRecord) -> GraphCVResult<Self> {
        Self::new(raw.node_features, raw.adjacency)
    }
}

/// Graph-level label. A dataset holds either class ids or numeric targets.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Label {
    Class(usize),
    Target(f32),
}

/**
 * How labels become rows of the batch label tensor.
 *
 * Chosen once when the dataset is built, so every batch from that dataset
 * shares one label width.
 */
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelEncoding {
    /// One column per class, 1.0 in the column of the graph's class
    OneHot { num_classes: usize },
    /// A single column holding the numeric target
    Scalar,
}

impl LabelEncoding {
    /// Pick the encoding matching a label list. Mixed label kinds are rejected.
    pub fn infer(labels: &[Label]) -> GraphCVResult<Self> {
        let mut max_class: Option<usize> = None;
        let mut has_target = false;

        for label in labels {
            match *label {
                Label::Class(class) => {
                    max_class = Some(max_class.map_or(class, |m| m.max(class)));
                }
                Label::Target(_) => has_target = true,
            }
        }

        match (max_class, has_target) {
            (Some(_), true) => Err(GraphCVError::InvalidInput(
                "Dataset mixes class labels and numeric targets".to_string(),
            )),
            (Some(max), false) => Ok(LabelEncoding::OneHot { num_classes: max + 1 }),
            (None, true) => Ok(LabelEncoding::Scalar),
            (None, false) => Err(GraphCVError::InvalidInput(
                "Cannot infer a label encoding from an empty label list".to_string(),
            )),
        }
    }

    /// Number of columns in the label tensor
    pub fn width(&self) -> usize {
        match self {
            LabelEncoding::OneHot { num_classes } => *num_classes,
            LabelEncoding::Scalar => 1,
        }
    }

    /// Encode one label as a row of the label tensor
    pub fn encode(&self, label: &Label) -> GraphCVResult<Array1<f32>> {
        match (self, label) {
            (LabelEncoding::OneHot { num_classes }, Label::Class(class)) => {
                if class >= num_classes {
                    return Err(GraphCVError::InvalidInput(format!(
                        "Class {} outside one-hot encoding of {} classes",
                        class, num_classes
                    )));
                }
                let mut row = Array1::zeros(*num_classes);
                row[*class] = 1.0;
                Ok(row)
            }
            (LabelEncoding::Scalar, Label::Target(value)) => Ok(Array1::from_elem(1, *value)),
            (encoding, label) => Err(GraphCVError::InvalidInput(format!(
                "Label {:?} does not fit encoding {:?}",
                label, encoding
            ))),
        }
    }

    /// Inverse of one-hot encoding: index of the largest column
    pub fn decode_class(row: ArrayView1<f32>) -> Option<usize> {
        row.iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(idx, _)| idx)
    }
}

/**
 * Ordered collection of (GraphRecord, Label) pairs.
 *
 * The position of a pair is its only handle: fold assignments and batch
 * flows refer to graphs by index, never by copying them.
 */
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "RawDataset"))]
#[derive(Debug, Clone)]
pub struct Dataset {
    graphs: Vec<GraphRecord>,
    labels: Vec<Label>,
    encoding: LabelEncoding,
}

#[cfg(feature = "serde")]
#[derive(Deserialize)]
struct RawDataset {
    graphs: Vec<GraphRecord>,
    labels: Vec<Label>,
    encoding: LabelEncoding,
}

#[cfg(feature = "serde")]
impl TryFrom<RawDataset> for Dataset {
    type Error = GraphCVError;

    fn try_from(raw: RawDataset) -> GraphCVResult<Self> {
        Self::with_encoding(raw.graphs, raw.labels, raw.encoding)
    }
}

impl Dataset {
    /// Build a dataset, inferring the label encoding from the labels
    pub fn new(graphs: Vec<GraphRecord>, labels: Vec<Label>) -> GraphCVResult<Self> {
        let encoding = LabelEncoding::infer(&labels)?;
        Self::with_encoding(graphs, labels, encoding)
    }

    /// Build a dataset with an explicit label encoding
    pub fn with_encoding(
        graphs: Vec<GraphRecord>,
        labels: Vec<Label>,
        encoding: LabelEncoding,
    ) -> GraphCVResult<Self> {
        if graphs.is_empty() {
            return Err(GraphCVError::InvalidInput("Dataset has no graphs".to_string()));
        }

        if graphs.len() != labels.len() {
            return Err(GraphCVError::ShapeMismatch(format!(
                "{} graphs but {} labels; every graph needs exactly one label",
                graphs.len(),
                labels.len()
            )));
        }

        // Surface label/encoding disagreements now rather than mid-epoch
        for label in &labels {
            encoding.encode(label)?;
        }

        Ok(Self {
            graphs,
            labels,
            encoding,
        })
    }

    pub fn len(&self) -> usize {
        self.graphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.graphs.is_empty()
    }

    pub fn graphs(&self) -> &[GraphRecord] {
        &self.graphs
    }

    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    pub fn encoding(&self) -> LabelEncoding {
        self.encoding
    }

    /// Graph at `index`
    pub fn graph(&self, index: usize) -> GraphCVResult<&GraphRecord> {
        self.graphs.get(index).ok_or(GraphCVError::IndexOutOfRange {
            index,
            len: self.graphs.len(),
        })
    }

    /// Label at `index`
    pub fn label(&self, index: usize) -> GraphCVResult<&Label> {
        self.labels.get(index).ok_or(GraphCVError::IndexOutOfRange {
            index,
            len: self.labels.len(),
        })
    }

    /// Class ids in dataset order. Fails for target-valued datasets.
    pub fn class_labels(&self) -> GraphCVResult<Vec<usize>> {
        self.labels
            .iter()
            .map(|label| match label {
                Label::Class(class) => Ok(*class),
                Label::Target(_) => Err(GraphCVError::InvalidInput(
                    "Stratified splitting needs class labels, dataset holds numeric targets"
                        .to_string(),
                )),
            })
            .collect()
    }

    /// Largest node count across the whole dataset
    pub fn max_nodes(&self) -> usize {
        self.graphs.iter().map(GraphRecord::node_count).max().unwrap_or(0)
    }
}

// === UTILITY FUNCTIONS ===

/**
 * Generate a random graph for testing and benchmarking.
 *
 * Features are drawn uniformly from [-1, 1]. Edges avoid self-loops and
 * duplicates and are mirrored, so the adjacency is symmetric.
 */
pub fn generate_random_graph<R: Rng + ?Sized>(
    num_nodes: usize,
    num_edges: usize,
    feature_width: usize,
    rng: &mut R,
) -> GraphCVResult<GraphRecord> {
    let node_features = Array2::random_using(
        (num_nodes, feature_width),
        Uniform::new(-1.0f32, 1.0f32),
        rng,
    );

    let mut edges = Vec::new();
    let mut edge_set = HashSet::new();
    let max_edges = num_nodes * num_nodes.saturating_sub(1) / 2;

    while edges.len() < num_edges && edge_set.len() < max_edges {
        let source = rng.gen_range(0..num_nodes);
        let target = rng.gen_range(0..num_nodes);
        let key = (source.min(target), source.max(target));

        if source != target && edge_set.insert(key) {
            edges.push(key);
        }
    }

    GraphRecord::from_edges(node_features, &edges, true)
}

/// Parameters for [`generate_synthetic_dataset`]
#[derive(Debug, Clone)]
pub struct SyntheticDatasetConfig {
    /// Number of graphs per class; class `c` gets `class_sizes[c]` graphs
    pub class_sizes: Vec<usize>,
    pub min_nodes: usize,
    pub max_nodes: usize,
    pub feature_width: usize,
    /// Offset added to feature column `class % feature_width`
    pub class_separation: f32,
    pub seed: u64,
}

impl Default for SyntheticDatasetConfig {
    fn default() -> Self {
        Self {
            class_sizes: vec![30, 30],
            min_nodes: 4,
            max_nodes: 12,
            feature_width: 4,
            class_separation: 1.5,
            seed: 42,
        }
    }
}

/**
 * Generate a seeded, class-separable graph classification dataset.
 *
 * Graphs are interleaved by class rather than grouped, so the dataset order
 * carries no class information.
 */
pub fn generate_synthetic_dataset(config: &SyntheticDatasetConfig) -> GraphCVResult<Dataset> {
    if config.min_nodes == 0 || config.min_nodes > config.max_nodes {
        return Err(GraphCVError::InvalidConfiguration(format!(
            "Node range {}..={} is empty or allows zero-node graphs",
            config.min_nodes, config.max_nodes
        )));
    }
    if config.feature_width == 0 {
        return Err(GraphCVError::InvalidConfiguration(
            "Feature width must be greater than 0".to_string(),
        ));
    }

    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    let mut remaining = config.class_sizes.clone();
    let mut graphs = Vec::new();
    let mut labels = Vec::new();

    while remaining.iter().any(|&n| n > 0) {
        for (class, left) in remaining.iter_mut().enumerate() {
            if *left == 0 {
                continue;
            }
            *left -= 1;

            let num_nodes = rng.gen_range(config.min_nodes..=config.max_nodes);
            let graph = generate_random_graph(num_nodes, num_nodes, config.feature_width, &mut rng)?;

            let mut features = graph.node_features().clone();
            features
                .column_mut(class % config.feature_width)
                .mapv_inplace(|x| x + config.class_separation);

            graphs.push(GraphRecord::new(features, graph.adjacency().clone())?);
            labels.push(Label::Class(class));
        }
    }

    Dataset::with_encoding(
        graphs,
        labels,
        LabelEncoding::OneHot {
            num_classes: config.class_sizes.len(),
        },
    )
}

// === TESTS ===
