//! BoxSqEL: classes as boxes, relations as head/tail boxes plus bumps.
//!
//! Every class is an axis-aligned box and carries a bump vector; every
//! relation owns a canonical head box and tail box. An existential axiom
//! C ⊑ ∃r.D holds geometrically when box(C) translated by bump(D) fits in
//! head(r) and box(D) translated by bump(C) fits in tail(r).
//!
//! # Axiom losses
//!
//! | Axiom          | Penalty                                             |
//! |----------------|-----------------------------------------------------|
//! | C ⊑ D          | inclusion(box C, box D)                             |
//! | C ⊓ D ⊑ E      | inclusion(box C ∩ box D, box E) + emptiness penalty |
//! | C ⊓ D ⊑ ⊥      | disjointness(box C, box D)                          |
//! | C ⊑ ∃r.D       | mean of the two bump-translated inclusions          |
//! | ∃r.C ⊑ D       | inclusion(head r translated by -bump C, box D)      |
//! | negative nf3   | the two bump-translated disjointness penalties      |
//!
//! Degenerate geometry (an empty intersection) is a loss signal, never an
//! error: the emptiness penalty ‖relu(lower - upper)‖ keeps a collapsed
//! intersection from satisfying the inclusion trivially.
//!
//! Reference: Jackermeier et al., "Dual Box Embeddings for the Description
//! Logic EL++" (WWW 2024).

use std::path::Path;

use candle_core::{Device, IndexOp, Tensor, Var};
use candle_nn::loss::binary_cross_entropy_with_logit;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::{ModelConfig, Reduction};
use crate::data::{keys, AxiomPools};
use crate::error::{Error, Result};
use crate::geometry::Boxes;
use crate::loaded::LoadedBoxSqEL;
use crate::model::ElModel;

/// Trainable BoxSqEL model.
pub struct BoxSqEL {
    config: ModelConfig,
    device: Device,
    num_classes: usize,
    num_relations: usize,
    /// (num_classes, 2d): raw centers then raw half-widths.
    class_embeds: Var,
    /// (num_classes, d): per-class translation vectors.
    bumps: Var,
    /// (num_relations, 2d) each.
    relation_heads: Var,
    relation_tails: Var,
    rng: StdRng,
}

impl BoxSqEL {
    /// Create a model with uniformly initialized, row-normalized tables.
    ///
    /// All randomness (table init, batch sampling) derives from
    /// `config.seed` through one `StdRng`; two models built with the
    /// same seed behave identically on any device.
    pub fn new(
        device: &Device,
        num_classes: usize,
        num_relations: usize,
        config: ModelConfig,
    ) -> Result<Self> {
        let mut rng = StdRng::seed_from_u64(config.seed);
        let dim = config.embedding_dim;
        let class_embeds = init_table(num_classes, 2 * dim, device, &mut rng)?;
        let bumps = init_table(num_classes, dim, device, &mut rng)?;
        let relation_heads = init_table(num_relations, 2 * dim, device, &mut rng)?;
        let relation_tails = init_table(num_relations, 2 * dim, device, &mut rng)?;
        Ok(Self {
            config,
            device: device.clone(),
            num_classes,
            num_relations,
            class_embeds,
            bumps,
            relation_heads,
            relation_tails,
            rng,
        })
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    pub fn num_relations(&self) -> usize {
        self.num_relations
    }

    fn class_boxes(&self, ids: &Tensor) -> Result<Boxes> {
        let emb = self.class_embeds.index_select(&ids.contiguous()?, 0)?;
        Boxes::from_embedding(&emb, self.config.embedding_dim)
    }

    fn relation_boxes(&self, table: &Var, ids: &Tensor) -> Result<Boxes> {
        let emb = table.index_select(&ids.contiguous()?, 0)?;
        Boxes::from_embedding(&emb, self.config.embedding_dim)
    }

    fn class_bumps(&self, ids: &Tensor) -> Result<Tensor> {
        Ok(self.bumps.index_select(&ids.contiguous()?, 0)?)
    }

    /// Penalty for `boxes1` not being contained in `boxes2` with at least
    /// `margin` slack, shape (batch, 1).
    fn inclusion_loss(&self, boxes1: &Boxes, boxes2: &Boxes) -> Result<Tensor> {
        let diffs = (boxes1.centers() - boxes2.centers())?.abs()?;
        let gap = ((&diffs + boxes1.offsets())? - boxes2.offsets())?
            .affine(1.0, -(self.config.margin as f64))?;
        l2_norm_rows(&gap.relu()?)
    }

    /// Separation of `boxes1` from `boxes2`: zero while the boxes
    /// overlap on every axis, otherwise the L2 norm of the per-axis
    /// gaps plus `margin`, shape (batch, 1). The disjoint reduction
    /// drives this toward `disjoint_dist`.
    fn disjoint_loss(&self, boxes1: &Boxes, boxes2: &Boxes) -> Result<Tensor> {
        let diffs = (boxes1.centers() - boxes2.centers())?.abs()?;
        let gap = ((&diffs - boxes1.offsets())? - boxes2.offsets())?
            .affine(1.0, self.config.margin as f64)?;
        l2_norm_rows(&gap.relu()?)
    }

    /// nf1: (C, D) meaning C ⊑ D.
    fn nf1_loss(&self, batch: &Tensor) -> Result<Tensor> {
        let c = self.class_boxes(&batch.i((.., 0))?)?;
        let d = self.class_boxes(&batch.i((.., 1))?)?;
        self.inclusion_loss(&c, &d)
    }

    /// nf2: (C, D, E) meaning C ⊓ D ⊑ E.
    fn nf2_loss(&self, batch: &Tensor) -> Result<Tensor> {
        let c = self.class_boxes(&batch.i((.., 0))?)?;
        let d = self.class_boxes(&batch.i((.., 1))?)?;
        let e = self.class_boxes(&batch.i((.., 2))?)?;

        let (intersection, lower, upper) = c.intersect(&d)?;
        let inclusion = self.inclusion_loss(&intersection, &e)?;
        // An empty intersection would satisfy any inclusion trivially;
        // penalize the per-axis inversion of the bounds instead.
        let emptiness = l2_norm_rows(&(&lower - &upper)?.relu()?)?;
        Ok((&inclusion + &emptiness)?)
    }

    /// disjoint: (C, D) meaning C ⊓ D ⊑ ⊥.
    fn nf2_disjoint_loss(&self, batch: &Tensor) -> Result<Tensor> {
        let c = self.class_boxes(&batch.i((.., 0))?)?;
        let d = self.class_boxes(&batch.i((.., 1))?)?;
        self.disjoint_loss(&c, &d)
    }

    /// nf3: (C, r, D) meaning C ⊑ ∃r.D.
    fn nf3_loss(&self, batch: &Tensor) -> Result<Tensor> {
        let c_ids = batch.i((.., 0))?;
        let r_ids = batch.i((.., 1))?;
        let d_ids = batch.i((.., 2))?;

        let c = self.class_boxes(&c_ids)?;
        let d = self.class_boxes(&d_ids)?;
        let c_bumps = self.class_bumps(&c_ids)?;
        let d_bumps = self.class_bumps(&d_ids)?;
        let heads = self.relation_boxes(&self.relation_heads, &r_ids)?;
        let tails = self.relation_boxes(&self.relation_tails, &r_ids)?;

        let dist1 = self.inclusion_loss(&c.translate(&d_bumps)?, &heads)?;
        let dist2 = self.inclusion_loss(&d.translate(&c_bumps)?, &tails)?;
        Ok(((&dist1 + &dist2)? * 0.5)?)
    }

    /// nf4: (r, C, D) meaning ∃r.C ⊑ D.
    fn nf4_loss(&self, batch: &Tensor) -> Result<Tensor> {
        let r_ids = batch.i((.., 0))?;
        let c_ids = batch.i((.., 1))?;
        let d_ids = batch.i((.., 2))?;

        let d = self.class_boxes(&d_ids)?;
        let c_bumps = self.class_bumps(&c_ids)?;
        let heads = self.relation_boxes(&self.relation_heads, &r_ids)?;

        self.inclusion_loss(&heads.translate(&c_bumps.neg()?)?, &d)
    }

    /// Negative nf3 triples: same geometry as [`Self::nf3_loss`] but each
    /// direction must be pushed apart, not together. The two per-example
    /// losses are returned unsummed so the caller can reduce them
    /// independently.
    fn neg_loss(&self, batch: &Tensor) -> Result<(Tensor, Tensor)> {
        let c_ids = batch.i((.., 0))?;
        let r_ids = batch.i((.., 1))?;
        let d_ids = batch.i((.., 2))?;

        let c = self.class_boxes(&c_ids)?;
        let d = self.class_boxes(&d_ids)?;
        let c_bumps = self.class_bumps(&c_ids)?;
        let d_bumps = self.class_bumps(&d_ids)?;
        let heads = self.relation_boxes(&self.relation_heads, &r_ids)?;
        let tails = self.relation_boxes(&self.relation_tails, &r_ids)?;

        let dist1 = self.disjoint_loss(&c.translate(&d_bumps)?, &heads)?;
        let dist2 = self.disjoint_loss(&d.translate(&c_bumps)?, &tails)?;
        Ok((dist1, dist2))
    }

    /// Reduce a per-example distance for a positive axiom.
    fn reduce_positive(&self, dist: &Tensor) -> Result<Tensor> {
        match self.config.loss {
            Reduction::Mse => Ok(dist.sqr()?.mean_all()?),
            Reduction::Bce => {
                Ok(binary_cross_entropy_with_logit(&dist.neg()?, &dist.ones_like()?)?)
            }
        }
    }

    /// Reduce a per-example distance for a disjoint/negative axiom. Under
    /// mse the reduction targets `disjoint_dist` exactly; under bce the
    /// raw distance is the logit and `disjoint_dist` plays no role.
    fn reduce_disjoint(&self, dist: &Tensor) -> Result<Tensor> {
        match self.config.loss {
            Reduction::Mse => Ok(dist
                .affine(-1.0, self.config.disjoint_dist as f64)?
                .sqr()?
                .mean_all()?),
            Reduction::Bce => {
                Ok(binary_cross_entropy_with_logit(&dist.neg()?, &dist.zeros_like()?)?)
            }
        }
    }

    /// `reg_factor * mean(rowwise L2 norm of the bump table)`.
    fn regularization(&self) -> Result<Tensor> {
        let norms = self.bumps.sqr()?.sum_keepdim(1)?.sqrt()?;
        Ok((norms.mean_all()? * self.config.reg_factor as f64)?)
    }

    /// Draw `config.batch` rows from `pool` with replacement and move
    /// them to the compute device. Pools smaller than the batch size are
    /// valid; an empty pool is not.
    fn sample_rows(&mut self, pool: &Tensor, key: &str) -> Result<Tensor> {
        let n = pool.dim(0)?;
        if n == 0 {
            return Err(Error::EmptyPool(key.to_string()));
        }
        let indices: Vec<u32> = (0..self.config.batch)
            .map(|_| self.rng.random_range(0..n) as u32)
            .collect();
        let indices = Tensor::from_vec(indices, (self.config.batch,), pool.device())?;
        Ok(pool.index_select(&indices, 0)?.to_device(&self.device)?)
    }
}

impl ElModel for BoxSqEL {
    type Snapshot = LoadedBoxSqEL;

    fn forward(&mut self, data: &AxiomPools) -> Result<Tensor> {
        let nf1 = self.sample_rows(data.required(keys::NF1)?, keys::NF1)?;
        let nf2 = self.sample_rows(data.required(keys::NF2)?, keys::NF2)?;
        let nf3 = self.sample_rows(data.required(keys::NF3)?, keys::NF3)?;
        let nf4 = self.sample_rows(data.required(keys::NF4)?, keys::NF4)?;

        let loss1 = self.reduce_positive(&self.nf1_loss(&nf1)?)?;
        let loss2 = self.reduce_positive(&self.nf2_loss(&nf2)?)?;
        let loss3 = self.reduce_positive(&self.nf3_loss(&nf3)?)?;
        let loss4 = self.reduce_positive(&self.nf4_loss(&nf4)?)?;

        // An absent or empty disjoint pool contributes exactly zero.
        let disjoint_loss = match data.pool(keys::DISJOINT) {
            Some(pool) if pool.dim(0)? > 0 => {
                let batch = self.sample_rows(pool, keys::DISJOINT)?;
                Some(self.reduce_disjoint(&self.nf2_disjoint_loss(&batch)?)?)
            }
            _ => None,
        };

        let negatives = data.negatives()?;
        let neg_batch = self.sample_rows(&negatives, keys::NF3_NEG_PREFIX)?;
        let (neg1, neg2) = self.neg_loss(&neg_batch)?;
        let neg_loss = (self.reduce_disjoint(&neg1)? + self.reduce_disjoint(&neg2)?)?;

        let reg_loss = self.regularization()?;

        let mut total = ((&loss1 + &loss2)? + (&loss3 + &loss4)?)?;
        if let Some(disjoint) = disjoint_loss {
            total = (total + disjoint)?;
        }
        total = ((total + neg_loss)? + reg_loss)?;
        Ok(total)
    }

    fn to_loaded_model(&self) -> Result<LoadedBoxSqEL> {
        Ok(LoadedBoxSqEL {
            embedding_size: self.config.embedding_dim,
            class_embeds: self.class_embeds.detach().copy()?,
            bumps: self.bumps.detach().copy()?,
            relation_heads: self.relation_heads.detach().copy()?,
            relation_tails: self.relation_tails.detach().copy()?,
        })
    }

    fn save(&self, folder: &Path, best: bool) -> Result<()> {
        self.to_loaded_model()?.save(folder, best)
    }

    fn trainable_vars(&self) -> Vec<Var> {
        vec![
            self.class_embeds.clone(),
            self.bumps.clone(),
            self.relation_heads.clone(),
            self.relation_tails.clone(),
        ]
    }

    fn name(&self) -> &'static str {
        "boxsqel"
    }

    fn embedding_dim(&self) -> usize {
        self.config.embedding_dim
    }
}

/// Uniform init in [-1, 1] drawn from `rng`, then each row L2-normalized.
/// Training is free to drift off the unit sphere afterwards.
fn init_table(rows: usize, cols: usize, device: &Device, rng: &mut StdRng) -> Result<Var> {
    let values: Vec<f32> = (0..rows * cols)
        .map(|_| rng.random_range(-1f32..1f32))
        .collect();
    let table = Tensor::from_vec(values, (rows, cols), device)?;
    let norms = table.sqr()?.sum_keepdim(1)?.sqrt()?;
    Ok(Var::from_tensor(&table.broadcast_div(&norms)?)?)
}

/// Rowwise Euclidean norm, shape (batch, 1).
fn l2_norm_rows(t: &Tensor) -> Result<Tensor> {
    Ok(t.sqr()?.sum_keepdim(1)?.sqrt()?)
}
