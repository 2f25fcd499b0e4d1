//! Embedding model implementations.
//!
//! Every geometric EL model shares the same training protocol: sample
//! per-axiom batches, turn each axiom into a differentiable penalty, sum
//! into one scalar, let the caller take the gradient step. [`ElModel`] is
//! that protocol; model variants differ only in their loss formulas.

use std::path::Path;

use candle_core::{Tensor, Var};

use crate::data::AxiomPools;
use crate::error::Result;

mod boxsqel;
pub use boxsqel::BoxSqEL;

/// Common interface of geometric EL embedding models.
pub trait ElModel {
    /// Inference-only export type consumed by evaluation harnesses.
    type Snapshot;

    /// One training step: sample a mini-batch per axiom pool and return
    /// the aggregated scalar loss. Gradients and the optimizer step are
    /// the caller's responsibility.
    fn forward(&mut self, data: &AxiomPools) -> Result<Tensor>;

    /// Export detached copies of all parameter tables. Later optimizer
    /// updates must not be visible through the snapshot.
    fn to_loaded_model(&self) -> Result<Self::Snapshot>;

    /// Persist all parameter tables under `folder`, one array file per
    /// table, with a `_best` suffix variant so the best-validation and
    /// final snapshots can coexist.
    fn save(&self, folder: &Path, best: bool) -> Result<()>;

    /// Learnable parameters, in a stable order, for the optimizer.
    fn trainable_vars(&self) -> Vec<Var>;

    /// Short model identifier used in output paths.
    fn name(&self) -> &'static str;

    /// Box dimensionality `d`.
    fn embedding_dim(&self) -> usize;

    /// Whether negatives must be resampled every epoch (true) or once
    /// before training (false).
    fn negative_sampling(&self) -> bool {
        true
    }
}
