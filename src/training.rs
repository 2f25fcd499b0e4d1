//! The outer training loop.
//!
//! One epoch is: resample negatives (when the model variant requires it),
//! one forward pass over freshly sampled mini-batches, one AdamW step,
//! then the optional learning-rate schedule. Every `val_freq` epochs the
//! current snapshot is ranked by a caller-supplied validation closure and
//! a new best median rank triggers a `_best` snapshot.
//!
//! Cancellation: the trainer hands out an [`Arc<AtomicBool>`] stop flag
//! and checks it between steps. When it is set the loop exits in order
//! and the final (non-best) snapshot is still written, so an interrupted
//! run never loses its parameters. Callers wire ctrl-c (or any other
//! signal) to the flag themselves.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use candle_nn::{AdamW, Optimizer, ParamsAdamW};
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::TrainerConfig;
use crate::data::AxiomPools;
use crate::error::Result;
use crate::evaluation::Ranking;
use crate::model::ElModel;
use crate::sampling::sample_negatives;

/// Outcome of a training run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingSummary {
    /// Scalar loss per completed epoch.
    pub loss_history: Vec<f32>,
    /// Epoch of the best validation median, if validation ran.
    pub best_epoch: Option<usize>,
    /// Best validation median rank seen.
    pub best_median: Option<f64>,
    /// Epochs actually completed (less than configured when stopped).
    pub epochs_run: usize,
    /// Whether the run was stopped through the stop flag.
    pub interrupted: bool,
}

/// Conventional output folder: `data/{dataset}/{task}/{model_name}`.
pub fn output_folder(dataset: &str, task: &str, model_name: &str) -> PathBuf {
    PathBuf::from("data").join(dataset).join(task).join(model_name)
}

/// Single-threaded trainer for [`ElModel`] implementations.
pub struct Trainer {
    config: TrainerConfig,
    stop: Arc<AtomicBool>,
    schedule: Option<Box<dyn FnMut(usize) -> f64>>,
}

impl Trainer {
    pub fn new(config: TrainerConfig) -> Self {
        Self {
            config,
            stop: Arc::new(AtomicBool::new(false)),
            schedule: None,
        }
    }

    /// Shared flag that requests an orderly stop between steps.
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Learning-rate schedule, applied once per step after the optimizer
    /// step; receives the 0-based epoch and returns the next rate.
    pub fn with_lr_schedule(mut self, schedule: impl FnMut(usize) -> f64 + 'static) -> Self {
        self.schedule = Some(Box::new(schedule));
        self
    }

    /// Train without validation; only the final snapshot is written.
    pub fn train<M: ElModel>(
        &mut self,
        model: &mut M,
        data: &mut AxiomPools,
        rng: &mut StdRng,
    ) -> Result<TrainingSummary> {
        self.run(model, data, rng, None)
    }

    /// Train with periodic validation and best-median snapshotting.
    pub fn train_with_validation<M: ElModel>(
        &mut self,
        model: &mut M,
        data: &mut AxiomPools,
        rng: &mut StdRng,
        validate: &mut dyn FnMut(&M::Snapshot) -> Result<Ranking>,
    ) -> Result<TrainingSummary> {
        self.run(model, data, rng, Some(validate))
    }

    fn run<M: ElModel>(
        &mut self,
        model: &mut M,
        data: &mut AxiomPools,
        rng: &mut StdRng,
        mut validate: Option<&mut dyn FnMut(&M::Snapshot) -> Result<Ranking>>,
    ) -> Result<TrainingSummary> {
        let params = ParamsAdamW {
            lr: self.config.learning_rate,
            weight_decay: 0.0,
            ..Default::default()
        };
        let mut optimizer = AdamW::new(model.trainable_vars(), params)?;

        if !model.negative_sampling() {
            sample_negatives(data, self.config.num_neg, rng)?;
        }

        let mut loss_history = Vec::with_capacity(self.config.epochs);
        let mut best_epoch = None;
        let mut best_median = f64::INFINITY;
        let mut interrupted = false;

        for epoch in 0..self.config.epochs {
            if self.stop.load(Ordering::Relaxed) {
                info!(epoch, "stop requested, ending training");
                interrupted = true;
                break;
            }

            if model.negative_sampling() {
                sample_negatives(data, self.config.num_neg, rng)?;
            }

            let loss = model.forward(data)?;
            let loss_value = loss.to_scalar::<f32>()?;
            loss_history.push(loss_value);
            debug!(epoch, loss = loss_value, "training step");

            if self.config.val_freq > 0 && epoch % self.config.val_freq == 0 {
                if let Some(validate) = validate.as_mut() {
                    let snapshot = model.to_loaded_model()?;
                    let ranking = validate(&snapshot)?;
                    info!(epoch, loss = loss_value, ranking = %ranking.summary(), "validation");
                    if ranking.median_rank() <= best_median {
                        best_median = ranking.median_rank();
                        best_epoch = Some(epoch);
                        model.save(&self.config.out_dir, true)?;
                    }
                }
            }

            optimizer.backward_step(&loss)?;
            if let Some(schedule) = self.schedule.as_mut() {
                optimizer.set_learning_rate(schedule(epoch));
            }
        }

        // The current parameters are persisted whether the loop finished
        // or was stopped; the cancellation contract guarantees this save.
        model.save(&self.config.out_dir, false)?;

        let summary = TrainingSummary {
            epochs_run: loss_history.len(),
            loss_history,
            best_epoch,
            best_median: best_epoch.map(|_| best_median),
            interrupted,
        };
        self.write_summary(&self.config.out_dir, &summary)?;
        if let Some(best) = summary.best_epoch {
            info!(best_epoch = best, "training finished");
        } else {
            info!(epochs = summary.epochs_run, "training finished");
        }
        Ok(summary)
    }

    fn write_summary(&self, folder: &Path, summary: &TrainingSummary) -> Result<()> {
        let file = File::create(folder.join("summary.json"))?;
        serde_json::to_writer_pretty(file, summary)?;
        Ok(())
    }
}
