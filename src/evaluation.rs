//! Ranking results and a default nf1 validation ranker.
//!
//! The full evaluation harness lives outside this crate; what lives here
//! is the contract it must satisfy (a [`Ranking`] of integer ranks with
//! top-10/top-100 counts) and a minimal subsumption ranker usable as the
//! trainer's validation callback.
//!
//! Ranking protocol for an nf1 pair (C, D): score every class E as a
//! candidate superclass of C by the inclusion distance of box(C) in
//! box(E), then report the rank of the true D among all candidates
//! (strictly-better count plus one, ties resolved pessimistically in
//! favor of the candidate).

use candle_core::{Device, Tensor};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::loaded::LoadedBoxSqEL;

/// Ranks of a batch of validation queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ranking {
    ranks: Vec<usize>,
    top10: usize,
    top100: usize,
}

impl Ranking {
    /// Build a ranking from raw ranks (1-based).
    pub fn from_ranks(ranks: Vec<usize>) -> Self {
        let top10 = ranks.iter().filter(|&&r| r <= 10).count();
        let top100 = ranks.iter().filter(|&&r| r <= 100).count();
        Self { ranks, top10, top100 }
    }

    pub fn ranks(&self) -> &[usize] {
        &self.ranks
    }

    /// Number of queries with rank <= 10.
    pub fn top10(&self) -> usize {
        self.top10
    }

    /// Number of queries with rank <= 100.
    pub fn top100(&self) -> usize {
        self.top100
    }

    /// Number of evaluated queries.
    pub fn len(&self) -> usize {
        self.ranks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranks.is_empty()
    }

    pub fn mean_rank(&self) -> f64 {
        if self.ranks.is_empty() {
            return 0.0;
        }
        self.ranks.iter().sum::<usize>() as f64 / self.ranks.len() as f64
    }

    pub fn median_rank(&self) -> f64 {
        if self.ranks.is_empty() {
            return 0.0;
        }
        let mut sorted = self.ranks.clone();
        sorted.sort_unstable();
        let mid = sorted.len() / 2;
        if sorted.len() % 2 == 0 {
            (sorted[mid - 1] + sorted[mid]) as f64 / 2.0
        } else {
            sorted[mid] as f64
        }
    }

    /// Sweep surrogate score: `median - top100/n - 0.1 * top10/n`.
    /// Lower is better; used only for hyperparameter selection.
    pub fn surrogate_score(&self) -> f64 {
        if self.ranks.is_empty() {
            return 0.0;
        }
        let n = self.ranks.len() as f64;
        self.median_rank() - self.top100 as f64 / n - 0.1 * self.top10 as f64 / n
    }

    /// One-line summary for logging.
    pub fn summary(&self) -> String {
        let n = self.ranks.len().max(1) as f64;
        format!(
            "median: {:.1} | mean: {:.1} | top10: {:.3} | top100: {:.3} (n={})",
            self.median_rank(),
            self.mean_rank(),
            self.top10 as f64 / n,
            self.top100 as f64 / n,
            self.ranks.len()
        )
    }
}

/// Rank the true superclass of each nf1 validation pair among the first
/// `num_classes` classes of the snapshot.
pub fn rank_nf1(model: &LoadedBoxSqEL, pairs: &Tensor, num_classes: usize) -> Result<Ranking> {
    let dim = model.embedding_size;
    let candidates =
        crate::geometry::Boxes::from_embedding(&model.class_embeds.narrow(0, 0, num_classes)?, dim)?;

    let rows = pairs.to_device(&Device::Cpu)?.to_vec2::<u32>()?;
    let mut ranks = Vec::with_capacity(rows.len());

    for row in rows {
        let (sub, sup) = (row[0] as usize, row[1] as usize);
        let sub_box = model.class_box(sub)?;

        // Inclusion distance of box(sub) in every candidate box at once.
        let diffs = sub_box.centers().broadcast_sub(candidates.centers())?.abs()?;
        let gap = diffs
            .broadcast_add(sub_box.offsets())?
            .broadcast_sub(candidates.offsets())?;
        let dists = gap.relu()?.sqr()?.sum(1)?.sqrt()?.to_vec1::<f32>()?;

        let true_dist = dists[sup];
        let rank = 1 + dists
            .iter()
            .enumerate()
            .filter(|&(i, &d)| i != sup && d < true_dist)
            .count();
        ranks.push(rank);
    }

    Ok(Ranking::from_ranks(ranks))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ranking_counts() {
        let ranking = Ranking::from_ranks(vec![1, 4, 11, 50, 200]);
        assert_eq!(ranking.len(), 5);
        assert_eq!(ranking.top10(), 2);
        assert_eq!(ranking.top100(), 4);
        assert!((ranking.median_rank() - 11.0).abs() < 1e-9);
        assert!((ranking.mean_rank() - 53.2).abs() < 1e-9);
    }

    #[test]
    fn test_surrogate_score_formula() {
        let ranking = Ranking::from_ranks(vec![1, 3, 7, 20]);
        // median 5, top10 = 3, top100 = 4, n = 4.
        let expected = 5.0 - 4.0 / 4.0 - 0.1 * 3.0 / 4.0;
        assert!((ranking.surrogate_score() - expected).abs() < 1e-9);
    }

    #[test]
    fn test_rank_nf1_prefers_the_enclosing_box() {
        let device = Device::Cpu;
        // Three classes in 2-d: class 0 is a small box at the origin,
        // class 1 encloses it, class 2 is far away. Raw rows are
        // (center | raw half-width).
        let class_embeds = Tensor::from_vec(
            vec![
                0.0f32, 0.0, 0.5, 0.5, // class 0
                0.0, 0.0, 2.0, 2.0, // class 1: contains class 0
                9.0, 9.0, 0.5, 0.5, // class 2: distant
            ],
            (3, 4),
            &device,
        )
        .unwrap();
        let model = LoadedBoxSqEL {
            embedding_size: 2,
            class_embeds,
            bumps: Tensor::zeros((3, 2), candle_core::DType::F32, &device).unwrap(),
            relation_heads: Tensor::zeros((1, 4), candle_core::DType::F32, &device).unwrap(),
            relation_tails: Tensor::zeros((1, 4), candle_core::DType::F32, &device).unwrap(),
        };

        let pairs = Tensor::from_vec(vec![0u32, 1], (1, 2), &device).unwrap();
        let ranking = rank_nf1(&model, &pairs, 3).unwrap();

        assert_eq!(ranking.len(), 1);
        // Only the trivial self-inclusion of class 0 can tie; class 2
        // cannot beat the true superclass.
        assert!(ranking.ranks()[0] <= 2);
        assert_eq!(ranking.top10(), 1);
    }
}
