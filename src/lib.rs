//! Geometric box embeddings for EL++ ontologies.
//!
//! Ontology axioms in the EL++ normal forms are encoded as geometric
//! constraints between axis-aligned boxes in embedding space: a class is
//! a box, subsumption is box containment, conjunction is box
//! intersection, and relational existentials are translations into a
//! relation's canonical head/tail boxes.
//!
//! # Normal forms
//!
//! | Form       | Axiom       | Geometric constraint                        |
//! |------------|-------------|---------------------------------------------|
//! | nf1        | C ⊑ D       | box(C) inside box(D)                        |
//! | nf2        | C ⊓ D ⊑ E   | box(C) ∩ box(D) inside box(E), non-empty    |
//! | nf3        | C ⊑ ∃r.D    | bumped box(C)/box(D) inside head(r)/tail(r) |
//! | nf4        | ∃r.C ⊑ D    | un-bumped head(r) inside box(D)             |
//! | disjoint   | C ⊓ D ⊑ ⊥   | box(C) and box(D) separated                 |
//!
//! Each constraint becomes a differentiable penalty; one training step
//! samples a mini-batch per axiom pool, reduces each penalty (squared
//! error or logistic), and sums everything plus a bump-norm regularizer
//! into one scalar for the optimizer.
//!
//! # Usage
//!
//! ```rust,ignore
//! use boxsqel::{AxiomPools, BoxSqEL, ElModel, ModelConfig, Trainer, TrainerConfig};
//! use candle_core::Device;
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! let device = Device::cuda_if_available(0)?;
//! let config = ModelConfig::default().with_embedding_dim(200);
//! let mut model = BoxSqEL::new(&device, num_classes, num_relations, config)?;
//!
//! // pools: nf1..nf4 (+ disjoint) index tensors from the data loader
//! let mut rng = StdRng::seed_from_u64(42);
//! let mut trainer = Trainer::new(TrainerConfig::default().with_out_dir(out));
//! let summary = trainer.train(&mut model, &mut pools, &mut rng)?;
//! ```
//!
//! # References
//!
//! - Jackermeier et al. (2024). "Dual Box Embeddings for the Description
//!   Logic EL++." WWW.
//! - Kulmanov et al. (2019). "EL Embeddings: Geometric Construction of
//!   Models for the Description Logic EL++." IJCAI.
//! - Abboud et al. (2020). "BoxE: A Box Embedding Model for Knowledge
//!   Base Completion." NeurIPS.

mod config;
mod data;
mod error;
mod evaluation;
mod geometry;
mod loaded;
mod model;
mod sampling;
mod training;

pub use config::{ModelConfig, RankingFn, Reduction, TrainerConfig};
pub use data::{keys, negative_key, AxiomPools};
pub use error::{Error, Result};
pub use evaluation::{rank_nf1, Ranking};
pub use geometry::Boxes;
pub use loaded::LoadedBoxSqEL;
pub use model::{BoxSqEL, ElModel};
pub use sampling::sample_negatives;
pub use training::{output_folder, Trainer, TrainingSummary};
