//! Model and trainer configuration.
//!
//! Plain structs with defaults and `with_*` builders. The batch size used
//! by the forward step is this single `ModelConfig::batch` value; there is
//! no separate internal constant.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// How per-example distances are reduced into a scalar loss term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reduction {
    /// Squared error, batch mean. Disjoint-type terms reduce on
    /// `disjoint_dist - dist` so separated pairs are driven toward a
    /// target distance rather than merely "far enough".
    Mse,
    /// Binary cross-entropy with the negated distance as logit; positive
    /// axioms target 1, disjoint/negative axioms target 0.
    Bce,
}

/// Distance used by external ranking harnesses. Informational: the model
/// records it in snapshot metadata but never branches on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RankingFn {
    L1,
    L2,
}

/// Hyperparameters of the embedding model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Box dimensionality `d`; class and relation tables store `2d` per row.
    pub embedding_dim: usize,
    /// Mini-batch size per axiom pool, sampled with replacement (default: 512).
    pub batch: usize,
    /// Slack required by inclusion/disjointness constraints (default: 0).
    pub margin: f32,
    /// Target separation for disjoint pairs under the mse reduction (default: 2).
    pub disjoint_dist: f32,
    /// Weight of the bump-norm regularizer (default: 0.05).
    pub reg_factor: f32,
    /// Loss reduction (default: mse).
    pub loss: Reduction,
    /// Ranking distance advertised to evaluation harnesses.
    pub ranking_fn: RankingFn,
    /// Seed for embedding init and batch/negative sampling (default: 42).
    pub seed: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            embedding_dim: 200,
            batch: 512,
            margin: 0.0,
            disjoint_dist: 2.0,
            reg_factor: 0.05,
            loss: Reduction::Mse,
            ranking_fn: RankingFn::L2,
            seed: 42,
        }
    }
}

impl ModelConfig {
    pub fn with_embedding_dim(mut self, dim: usize) -> Self {
        self.embedding_dim = dim;
        self
    }

    pub fn with_batch(mut self, batch: usize) -> Self {
        self.batch = batch;
        self
    }

    pub fn with_margin(mut self, margin: f32) -> Self {
        self.margin = margin;
        self
    }

    pub fn with_disjoint_dist(mut self, dist: f32) -> Self {
        self.disjoint_dist = dist;
        self
    }

    pub fn with_reg_factor(mut self, reg_factor: f32) -> Self {
        self.reg_factor = reg_factor;
        self
    }

    pub fn with_loss(mut self, loss: Reduction) -> Self {
        self.loss = loss;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// Configuration of the outer training loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainerConfig {
    /// Number of epochs, one forward/optimizer step each (default: 2000).
    pub epochs: usize,
    /// AdamW learning rate (default: 1e-3).
    pub learning_rate: f64,
    /// Validate (and possibly snapshot) every this many epochs; 0
    /// disables validation entirely (default: 100).
    pub val_freq: usize,
    /// Negative-sampling rounds per resample (default: 1).
    pub num_neg: usize,
    /// Output folder for snapshots and the training summary.
    pub out_dir: PathBuf,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            epochs: 2000,
            learning_rate: 1e-3,
            val_freq: 100,
            num_neg: 1,
            out_dir: PathBuf::from("runs/boxsqel"),
        }
    }
}

impl TrainerConfig {
    pub fn with_epochs(mut self, epochs: usize) -> Self {
        self.epochs = epochs;
        self
    }

    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    pub fn with_val_freq(mut self, val_freq: usize) -> Self {
        self.val_freq = val_freq;
        self
    }

    pub fn with_num_neg(mut self, num_neg: usize) -> Self {
        self.num_neg = num_neg;
        self
    }

    pub fn with_out_dir(mut self, out_dir: impl Into<PathBuf>) -> Self {
        self.out_dir = out_dir.into();
        self
    }
}
