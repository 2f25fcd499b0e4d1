//! Inference-only snapshots and their on-disk format.
//!
//! A snapshot is a plain copy of the four parameter tables with no
//! gradient tracking and no training methods; it is what evaluation and
//! ranking harnesses consume. On disk each table is one `.npy` file under
//! the run folder, with an optional `_best` suffix so the best-validation
//! snapshot and the final snapshot can coexist:
//!
//! ```text
//! {folder}/class_embeds{_best}.npy
//! {folder}/bumps{_best}.npy
//! {folder}/rel_heads{_best}.npy
//! {folder}/rel_tails{_best}.npy
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use candle_core::{Device, Tensor};

use crate::error::Result;
use crate::geometry::Boxes;

/// Exported BoxSqEL parameters.
#[derive(Debug, Clone)]
pub struct LoadedBoxSqEL {
    /// Box dimensionality `d`.
    pub embedding_size: usize,
    /// (num_classes, 2d)
    pub class_embeds: Tensor,
    /// (num_classes, d)
    pub bumps: Tensor,
    /// (num_relations, 2d)
    pub relation_heads: Tensor,
    /// (num_relations, 2d)
    pub relation_tails: Tensor,
}

impl LoadedBoxSqEL {
    pub fn num_classes(&self) -> usize {
        self.class_embeds.dim(0).unwrap_or(0)
    }

    pub fn num_relations(&self) -> usize {
        self.relation_heads.dim(0).unwrap_or(0)
    }

    /// All class boxes at once.
    pub fn class_boxes(&self) -> Result<Boxes> {
        Boxes::from_embedding(&self.class_embeds, self.embedding_size)
    }

    /// The box of a single class, shape (1, d).
    pub fn class_box(&self, class_id: usize) -> Result<Boxes> {
        let emb = self.class_embeds.narrow(0, class_id, 1)?;
        Boxes::from_embedding(&emb, self.embedding_size)
    }

    /// Write one `.npy` file per table, creating `folder` if needed.
    pub fn save(&self, folder: &Path, best: bool) -> Result<()> {
        fs::create_dir_all(folder)?;
        for (name, table) in self.tables() {
            let cpu = table.to_device(&Device::Cpu)?;
            cpu.write_npy(table_path(folder, name, best))?;
        }
        Ok(())
    }

    /// Read a snapshot back from a run folder.
    pub fn load(folder: &Path, best: bool) -> Result<Self> {
        let class_embeds = Tensor::read_npy(table_path(folder, "class_embeds", best))?;
        let bumps = Tensor::read_npy(table_path(folder, "bumps", best))?;
        let relation_heads = Tensor::read_npy(table_path(folder, "rel_heads", best))?;
        let relation_tails = Tensor::read_npy(table_path(folder, "rel_tails", best))?;
        let embedding_size = class_embeds.dim(1)? / 2;
        Ok(Self {
            embedding_size,
            class_embeds,
            bumps,
            relation_heads,
            relation_tails,
        })
    }

    fn tables(&self) -> [(&'static str, &Tensor); 4] {
        [
            ("class_embeds", &self.class_embeds),
            ("bumps", &self.bumps),
            ("rel_heads", &self.relation_heads),
            ("rel_tails", &self.relation_tails),
        ]
    }
}

fn table_path(folder: &Path, name: &str, best: bool) -> PathBuf {
    let suffix = if best { "_best" } else { "" };
    folder.join(format!("{name}{suffix}.npy"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(dim: usize, classes: usize, relations: usize) -> LoadedBoxSqEL {
        let device = Device::Cpu;
        LoadedBoxSqEL {
            embedding_size: dim,
            class_embeds: Tensor::rand(-1f32, 1f32, (classes, 2 * dim), &device).unwrap(),
            bumps: Tensor::rand(-1f32, 1f32, (classes, dim), &device).unwrap(),
            relation_heads: Tensor::rand(-1f32, 1f32, (relations, 2 * dim), &device).unwrap(),
            relation_tails: Tensor::rand(-1f32, 1f32, (relations, 2 * dim), &device).unwrap(),
        }
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let snap = snapshot(4, 5, 2);
        snap.save(dir.path(), false).unwrap();

        let loaded = LoadedBoxSqEL::load(dir.path(), false).unwrap();
        assert_eq!(loaded.embedding_size, 4);
        assert_eq!(loaded.num_classes(), 5);
        assert_eq!(loaded.num_relations(), 2);
        assert_eq!(
            loaded.class_embeds.to_vec2::<f32>().unwrap(),
            snap.class_embeds.to_vec2::<f32>().unwrap()
        );
        assert_eq!(
            loaded.bumps.to_vec2::<f32>().unwrap(),
            snap.bumps.to_vec2::<f32>().unwrap()
        );
    }

    #[test]
    fn test_best_and_final_snapshots_coexist() {
        let dir = tempfile::tempdir().unwrap();
        let final_snap = snapshot(4, 3, 1);
        let best_snap = snapshot(4, 3, 1);
        final_snap.save(dir.path(), false).unwrap();
        best_snap.save(dir.path(), true).unwrap();

        assert!(dir.path().join("class_embeds.npy").exists());
        assert!(dir.path().join("class_embeds_best.npy").exists());

        let best = LoadedBoxSqEL::load(dir.path(), true).unwrap();
        assert_eq!(
            best.class_embeds.to_vec2::<f32>().unwrap(),
            best_snap.class_embeds.to_vec2::<f32>().unwrap()
        );
    }
}
