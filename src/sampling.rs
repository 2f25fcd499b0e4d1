//! Negative sampling for the relational existential axiom (nf3).
//!
//! Each round corrupts every nf3 triple (C, r, D) twice: once by replacing
//! the object with a random class ("corrupted tail") and once by replacing
//! the subject ("corrupted head"). Both corruption kinds are concatenated
//! into one `(2n, 3)` batch stored under `nf3_neg{round}`.
//!
//! The sampler is stateless apart from the caller-supplied rng: it reads
//! only `nf3` and `class_ids` and writes only the `nf3_neg{i}` keys.

use candle_core::{IndexOp, Tensor};
use rand::Rng;

use crate::data::{keys, AxiomPools};
use crate::error::{Error, Result};

/// Rebuild `rounds` negative batches from scratch, replacing any previous
/// `nf3_neg0 .. nf3_neg{rounds-1}` pools.
pub fn sample_negatives(data: &mut AxiomPools, rounds: usize, rng: &mut impl Rng) -> Result<()> {
    let nf3 = data.required(keys::NF3)?.clone();
    let n = nf3.dim(0)?;
    if n == 0 {
        return Err(Error::EmptyPool(keys::NF3.to_string()));
    }
    if data.class_ids().is_empty() {
        return Err(Error::EmptyPool("class_ids".to_string()));
    }

    let device = nf3.device().clone();
    let c = nf3.i((.., 0))?;
    let r = nf3.i((.., 1))?;
    let d = nf3.i((.., 2))?;

    for round in 0..rounds {
        let random_objects = draw_class_ids(data.class_ids(), n, rng);
        let random_subjects = draw_class_ids(data.class_ids(), n, rng);
        let random_objects = Tensor::from_vec(random_objects, (n,), &device)?;
        let random_subjects = Tensor::from_vec(random_subjects, (n,), &device)?;

        let corrupted_tails = Tensor::stack(&[&c, &r, &random_objects], 1)?;
        let corrupted_heads = Tensor::stack(&[&random_subjects, &r, &d], 1)?;
        let batch = Tensor::cat(&[&corrupted_tails, &corrupted_heads], 0)?;
        data.set_negatives(round, batch);
    }
    Ok(())
}

fn draw_class_ids(class_ids: &[u32], n: usize, rng: &mut impl Rng) -> Vec<u32> {
    (0..n)
        .map(|_| class_ids[rng.random_range(0..class_ids.len())])
        .collect()
}
