//! Integration tests over the public boxsqel API: training protocol,
//! snapshot persistence, and the cancellation contract.

use boxsqel::{
    keys, rank_nf1, sample_negatives, AxiomPools, BoxSqEL, ElModel, LoadedBoxSqEL, ModelConfig,
    Ranking, Reduction, Trainer, TrainerConfig,
};
use candle_core::{Device, Tensor};
use rand::rngs::StdRng;
use rand::SeedableRng;

const NUM_CLASSES: usize = 8;
const NUM_RELATIONS: usize = 3;

fn toy_pools() -> AxiomPools {
    let device = Device::Cpu;
    let mut data = AxiomPools::new((0..NUM_CLASSES as u32).collect());

    let nf1 = vec![0u32, 1, 2, 1, 3, 4, 5, 4];
    let nf2 = vec![0u32, 2, 1, 3, 5, 4, 6, 7, 1];
    let nf3 = vec![0u32, 0, 3, 2, 1, 5, 6, 2, 7];
    let nf4 = vec![0u32, 3, 1, 2, 6, 4, 1, 7, 5];
    let disjoint = vec![0u32, 6, 2, 7];

    data.insert(keys::NF1, Tensor::from_vec(nf1, (4, 2), &device).unwrap());
    data.insert(keys::NF2, Tensor::from_vec(nf2, (3, 3), &device).unwrap());
    data.insert(keys::NF3, Tensor::from_vec(nf3, (3, 3), &device).unwrap());
    data.insert(keys::NF4, Tensor::from_vec(nf4, (3, 3), &device).unwrap());
    data.insert(keys::DISJOINT, Tensor::from_vec(disjoint, (2, 2), &device).unwrap());
    data
}

fn small_model() -> BoxSqEL {
    let config = ModelConfig::default()
        .with_embedding_dim(8)
        .with_batch(16)
        .with_seed(42);
    BoxSqEL::new(&Device::Cpu, NUM_CLASSES, NUM_RELATIONS, config).unwrap()
}

#[test]
fn training_runs_and_persists_final_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let mut model = small_model();
    let mut data = toy_pools();
    let mut rng = StdRng::seed_from_u64(0);

    let config = TrainerConfig::default()
        .with_epochs(5)
        .with_val_freq(100)
        .with_out_dir(dir.path());
    let summary = Trainer::new(config).train(&mut model, &mut data, &mut rng).unwrap();

    assert_eq!(summary.epochs_run, 5);
    assert_eq!(summary.loss_history.len(), 5);
    assert!(!summary.interrupted);
    for loss in &summary.loss_history {
        assert!(loss.is_finite(), "loss diverged: {loss}");
    }

    // Final snapshot and summary are on disk; no best snapshot without
    // validation.
    assert!(dir.path().join("class_embeds.npy").exists());
    assert!(dir.path().join("rel_tails.npy").exists());
    assert!(dir.path().join("summary.json").exists());
    assert!(!dir.path().join("class_embeds_best.npy").exists());

    let loaded = LoadedBoxSqEL::load(dir.path(), false).unwrap();
    assert_eq!(loaded.embedding_size, model.embedding_dim());
    assert_eq!(loaded.num_classes(), NUM_CLASSES);
}

#[test]
fn validation_tracks_best_median_and_writes_best_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let mut model = small_model();
    let mut data = toy_pools();
    let mut rng = StdRng::seed_from_u64(0);
    let val_pairs = Tensor::from_vec(vec![0u32, 1, 2, 1], (2, 2), &Device::Cpu).unwrap();

    let config = TrainerConfig::default()
        .with_epochs(4)
        .with_val_freq(2)
        .with_out_dir(dir.path());
    let mut validate =
        |snapshot: &LoadedBoxSqEL| -> boxsqel::Result<Ranking> { rank_nf1(snapshot, &val_pairs, NUM_CLASSES) };
    let summary = Trainer::new(config)
        .train_with_validation(&mut model, &mut data, &mut rng, &mut validate)
        .unwrap();

    assert!(summary.best_epoch.is_some());
    assert!(summary.best_median.is_some());
    assert!(dir.path().join("class_embeds_best.npy").exists());
    assert!(dir.path().join("class_embeds.npy").exists());
}

#[test]
fn val_freq_zero_disables_validation() {
    let dir = tempfile::tempdir().unwrap();
    let mut model = small_model();
    let mut data = toy_pools();
    let mut rng = StdRng::seed_from_u64(0);
    let val_pairs = Tensor::from_vec(vec![0u32, 1], (1, 2), &Device::Cpu).unwrap();

    let config = TrainerConfig::default()
        .with_epochs(3)
        .with_val_freq(0)
        .with_out_dir(dir.path());
    let mut validate =
        |snapshot: &LoadedBoxSqEL| -> boxsqel::Result<Ranking> { rank_nf1(snapshot, &val_pairs, NUM_CLASSES) };
    let summary = Trainer::new(config)
        .train_with_validation(&mut model, &mut data, &mut rng, &mut validate)
        .unwrap();

    // The closure never runs: no best epoch, no best snapshot.
    assert_eq!(summary.epochs_run, 3);
    assert!(summary.best_epoch.is_none());
    assert!(!dir.path().join("class_embeds_best.npy").exists());
}

#[test]
fn stop_flag_ends_training_but_still_saves() {
    let dir = tempfile::tempdir().unwrap();
    let mut model = small_model();
    let mut data = toy_pools();
    let mut rng = StdRng::seed_from_u64(0);

    let config = TrainerConfig::default()
        .with_epochs(1000)
        .with_out_dir(dir.path());
    let mut trainer = Trainer::new(config);
    trainer.stop_flag().store(true, std::sync::atomic::Ordering::Relaxed);

    let summary = trainer.train(&mut model, &mut data, &mut rng).unwrap();
    assert!(summary.interrupted);
    assert_eq!(summary.epochs_run, 0);
    // Cancellation contract: the non-best snapshot is written anyway.
    assert!(dir.path().join("class_embeds.npy").exists());
}

#[test]
fn lr_schedule_is_applied_without_breaking_training() {
    let dir = tempfile::tempdir().unwrap();
    let mut model = small_model();
    let mut data = toy_pools();
    let mut rng = StdRng::seed_from_u64(0);

    let config = TrainerConfig::default()
        .with_epochs(3)
        .with_learning_rate(1e-2)
        .with_out_dir(dir.path());
    let summary = Trainer::new(config)
        .with_lr_schedule(|epoch| 1e-2 / (epoch + 1) as f64)
        .train(&mut model, &mut data, &mut rng)
        .unwrap();

    assert_eq!(summary.epochs_run, 3);
    assert!(summary.loss_history.iter().all(|l| l.is_finite()));
}

#[test]
fn negatives_are_resampled_each_epoch_for_boxsqel() {
    let mut data = toy_pools();
    let mut rng = StdRng::seed_from_u64(7);

    // BoxSqEL resamples per epoch; after k rounds the keys are
    // nf3_neg0..nf3_neg{k-1} and each batch holds 2N rows.
    let model = small_model();
    assert!(model.negative_sampling());

    sample_negatives(&mut data, 2, &mut rng).unwrap();
    assert_eq!(data.negative_rounds(), 2);
    let n = data.pool(keys::NF3).unwrap().dims()[0];
    for round in 0..2 {
        let key = boxsqel::negative_key(round);
        assert_eq!(data.pool(&key).unwrap().dims(), &[2 * n, 3]);
    }
    assert_eq!(data.negatives().unwrap().dims(), &[4 * n, 3]);
}

#[test]
fn bce_training_step_is_finite() {
    let config = ModelConfig::default()
        .with_embedding_dim(8)
        .with_batch(16)
        .with_loss(Reduction::Bce)
        .with_seed(3);
    let mut model = BoxSqEL::new(&Device::Cpu, NUM_CLASSES, NUM_RELATIONS, config).unwrap();
    let mut data = toy_pools();
    let mut rng = StdRng::seed_from_u64(3);
    sample_negatives(&mut data, 1, &mut rng).unwrap();

    let loss = model.forward(&data).unwrap().to_scalar::<f32>().unwrap();
    assert!(loss.is_finite());
}
