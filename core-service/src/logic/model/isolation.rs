//! Outlier Ensemble - isolation forest
//!
//! Score convention: lower = more outlying. A point that random splits
//! isolate quickly has a short average path and a score near -1; typical
//! points sit around -0.4.

use ndarray::ArrayView2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::logic::error::{EngineError, EngineResult};
use crate::logic::training::CancelToken;

pub const DEFAULT_TREES: usize = 100;
pub const DEFAULT_SAMPLE_SIZE: usize = 256;
pub const DEFAULT_SEED: u64 = 42;

const EULER_GAMMA: f64 = 0.577_215_664_9;

/// Average path length of an unsuccessful BST search over `n` points
pub fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

// ============================================================================
// TRAINER
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsolationForestTrainer {
    pub n_trees: usize,
    pub sample_size: usize,
    pub seed: u64,
}

impl Default for IsolationForestTrainer {
    fn default() -> Self {
        Self {
            n_trees: DEFAULT_TREES,
            sample_size: DEFAULT_SAMPLE_SIZE,
            seed: DEFAULT_SEED,
        }
    }
}

impl IsolationForestTrainer {
    pub fn fit(&self, data: ArrayView2<f64>, cancel: &CancelToken) -> EngineResult<IsolationForest> {
        let (n, d) = data.dim();
        if n < 2 {
            return Err(EngineError::InsufficientData { required: 2, actual: n });
        }

        let psi = self.sample_size.clamp(2, n);
        let height_limit = (psi as f64).log2().ceil() as usize;
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut trees = Vec::with_capacity(self.n_trees);

        for _ in 0..self.n_trees.max(1) {
            cancel.check()?;

            let rows = rand::seq::index::sample(&mut rng, n, psi).into_vec();
            let mut nodes = Vec::new();
            grow(&mut nodes, &data, rows, 0, height_limit, &mut rng);
            trees.push(IsolationTree { nodes });
        }

        log::debug!(
            "Isolation forest: {} trees, psi={}, height limit {}",
            trees.len(),
            psi,
            height_limit
        );

        Ok(IsolationForest {
            trees,
            sample_size: psi,
            dimension: d,
        })
    }
}

/// Append the subtree for `rows` to `nodes` and return its root index
fn grow(
    nodes: &mut Vec<Node>,
    data: &ArrayView2<f64>,
    rows: Vec<usize>,
    depth: usize,
    height_limit: usize,
    rng: &mut StdRng,
) -> usize {
    let index = nodes.len();
    if depth >= height_limit || rows.len() <= 1 {
        nodes.push(Node::Leaf { size: rows.len() });
        return index;
    }

    let candidates: Vec<(usize, f64, f64)> = (0..data.ncols())
        .filter_map(|feature| {
            let (lo, hi) = rows.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &r| {
                let x = data[[r, feature]];
                (lo.min(x), hi.max(x))
            });
            (hi > lo).then_some((feature, lo, hi))
        })
        .collect();

    // nothing left to split on
    if candidates.is_empty() {
        nodes.push(Node::Leaf { size: rows.len() });
        return index;
    }

    let (feature, lo, hi) = candidates[rng.gen_range(0..candidates.len())];
    let threshold = rng.gen_range(lo..hi);
    let (left_rows, right_rows): (Vec<usize>, Vec<usize>) =
        rows.into_iter().partition(|&r| data[[r, feature]] < threshold);

    nodes.push(Node::Leaf { size: 0 });
    let left = grow(nodes, data, left_rows, depth + 1, height_limit, rng);
    let right = grow(nodes, data, right_rows, depth + 1, height_limit, rng);
    nodes[index] = Node::Split {
        feature,
        threshold,
        left,
        right,
    };
    index
}

// ============================================================================
// FOREST
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    Leaf {
        size: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// One tree stored as a flat arena; node 0 is the root
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsolationTree {
    pub nodes: Vec<Node>,
}

impl IsolationTree {
    fn path_length(&self, x: &[f64]) -> f64 {
        let mut index = 0;
        let mut depth = 0.0;
        loop {
            match self.nodes.get(index) {
                Some(Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    index = if x[*feature] < *threshold { *left } else { *right };
                    depth += 1.0;
                }
                Some(Node::Leaf { size }) => return depth + average_path_length(*size),
                None => return depth,
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsolationForest {
    pub trees: Vec<IsolationTree>,
    /// Effective subsample size ψ used per tree
    pub sample_size: usize,
    pub dimension: usize,
}

impl IsolationForest {
    /// `-2^(-E[h(x)] / c(ψ))`; lower = more outlying
    pub fn score(&self, x: &[f64]) -> EngineResult<f64> {
        if x.len() != self.dimension {
            return Err(EngineError::SchemaMismatch {
                expected: format!("{} features", self.dimension),
                actual: format!("{} features", x.len()),
            });
        }
        if self.trees.is_empty() {
            return Err(EngineError::InvalidSnapshot("isolation forest has no trees".to_string()));
        }

        let mean_path =
            self.trees.iter().map(|t| t.path_length(x)).sum::<f64>() / self.trees.len() as f64;
        let c = average_path_length(self.sample_size);
        if c <= 0.0 {
            return Ok(-0.5);
        }
        Ok(-(2f64.powf(-mean_path / c)))
    }

    /// Structural checks for a deserialized forest
    pub fn validate(&self) -> EngineResult<()> {
        if self.trees.is_empty() {
            return Err(EngineError::InvalidSnapshot("isolation forest has no trees".to_string()));
        }

        for (t, tree) in self.trees.iter().enumerate() {
            if tree.nodes.is_empty() {
                return Err(EngineError::InvalidSnapshot(format!("tree {} is empty", t)));
            }
            for (i, node) in tree.nodes.iter().enumerate() {
                if let Node::Split {
                    feature, left, right, ..
                } = node
                {
                    // children always come after their parent, so no cycles
                    let dangling = *left <= i || *right <= i || *left >= tree.nodes.len() || *right >= tree.nodes.len();
                    if *feature >= self.dimension || dangling {
                        return Err(EngineError::InvalidSnapshot(format!(
                            "tree {} node {} is malformed",
                            t, i
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}
