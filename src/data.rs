//! Axiom pools: the dataset contract between the external loader and the model.
//!
//! A dataset is a mapping from normal-form name to a `u32` index tensor,
//! plus the pool of valid class ids used for corruption. The model only
//! reads pools; the negative sampler replaces the `nf3_neg{i}` keys
//! wholesale before a forward pass, never incrementally.
//!
//! Pool shapes:
//!
//! | Key        | Shape    | Meaning                     |
//! |------------|----------|-----------------------------|
//! | `nf1`      | (n, 2)   | C ⊑ D                       |
//! | `nf2`      | (n, 3)   | C ⊓ D ⊑ E                   |
//! | `nf3`      | (n, 3)   | C ⊑ ∃r.D                    |
//! | `nf4`      | (n, 3)   | ∃r.C ⊑ D                    |
//! | `disjoint` | (n, 2)   | C ⊓ D ⊑ ⊥ (may be empty)    |
//! | `nf3_neg{i}` | (2n, 3) | corrupted nf3 triples       |

use std::collections::HashMap;

use candle_core::Tensor;

use crate::error::{Error, Result};

/// Well-known pool keys.
pub mod keys {
    pub const NF1: &str = "nf1";
    pub const NF2: &str = "nf2";
    pub const NF3: &str = "nf3";
    pub const NF4: &str = "nf4";
    pub const DISJOINT: &str = "disjoint";
    pub const NF3_NEG_PREFIX: &str = "nf3_neg";
}

/// Key of the `i`-th negative round.
pub fn negative_key(round: usize) -> String {
    format!("{}{round}", keys::NF3_NEG_PREFIX)
}

/// Owned collection of axiom index pools.
#[derive(Debug, Clone)]
pub struct AxiomPools {
    pools: HashMap<String, Tensor>,
    class_ids: Vec<u32>,
}

impl AxiomPools {
    /// Create an empty pool set over the given valid class ids.
    pub fn new(class_ids: Vec<u32>) -> Self {
        Self {
            pools: HashMap::new(),
            class_ids,
        }
    }

    /// Insert or replace a pool under the given key.
    pub fn insert(&mut self, key: impl Into<String>, pool: Tensor) {
        self.pools.insert(key.into(), pool);
    }

    /// Look up a pool, if present.
    pub fn pool(&self, key: &str) -> Option<&Tensor> {
        self.pools.get(key)
    }

    /// Look up a pool that the model cannot run without.
    pub fn required(&self, key: &str) -> Result<&Tensor> {
        self.pools
            .get(key)
            .ok_or_else(|| Error::MissingPool(key.to_string()))
    }

    /// Entity ids valid as corruption targets.
    pub fn class_ids(&self) -> &[u32] {
        &self.class_ids
    }

    /// Replace the `i`-th negative round.
    pub fn set_negatives(&mut self, round: usize, pool: Tensor) {
        self.pools.insert(negative_key(round), pool);
    }

    /// Number of consecutive `nf3_neg{i}` rounds present, starting at 0.
    pub fn negative_rounds(&self) -> usize {
        let mut n = 0;
        while self.pools.contains_key(&negative_key(n)) {
            n += 1;
        }
        n
    }

    /// All negative rounds concatenated into one `(m, 3)` pool.
    pub fn negatives(&self) -> Result<Tensor> {
        let rounds = self.negative_rounds();
        if rounds == 0 {
            return Err(Error::MissingPool(negative_key(0)));
        }
        if rounds == 1 {
            return Ok(self.pools[&negative_key(0)].clone());
        }
        let parts: Vec<&Tensor> = (0..rounds).map(|i| &self.pools[&negative_key(i)]).collect();
        Ok(Tensor::cat(&parts, 0)?)
    }
}
