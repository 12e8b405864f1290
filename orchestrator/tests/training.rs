use std::{fs, num::NonZeroUsize, path::Path, sync::Arc};

use orchestrator::{
    OrchestratorError, TrainingController,
    configs::{Config, ModelConfig, OptimizerConfig, OracleConfig, TrainingConfig},
};
use worker::{ScenarioRange, SyntheticOracle};

const SENSORS: usize = 2;
const ORACLE_SEED: u64 = 11;

fn range(start: u64, end: u64) -> ScenarioRange {
    ScenarioRange::new(start, end).unwrap()
}

fn nz(n: usize) -> NonZeroUsize {
    NonZeroUsize::new(n).unwrap()
}

fn oracle() -> SyntheticOracle {
    SyntheticOracle::new(SENSORS, 1, 1, 0., ORACLE_SEED)
}

fn config(dir: &Path, epochs: usize, train_range: ScenarioRange, hidden: Vec<usize>) -> Config {
    let mut training = TrainingConfig::new(epochs, train_range, range(100, 109));
    training.batch_size = nz(2);
    training.validate_every = nz(1000);
    training.workers = Some(nz(2));
    training.checkpoint_dir = dir.join("models");
    training.cache_dir = dir.join("cache");

    Config {
        model: ModelConfig {
            hidden,
            seed: Some(3),
            ..Default::default()
        },
        optimizer: OptimizerConfig::Adam {
            learning_rate: 0.01,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
            weight_decay: 0.,
        },
        training,
        oracle: OracleConfig::Synthetic {
            sensors: SENSORS,
            correctors_x: 1,
            correctors_y: 1,
            noise: 0.,
            seed: ORACLE_SEED,
        },
    }
}

fn cache_entries(dir: &Path) -> Vec<String> {
    fs::read_dir(dir.join("cache"))
        .unwrap()
        .map(|entry| entry.unwrap().file_name().into_string().unwrap())
        .collect()
}

#[test]
fn training_loss_decreases_on_a_linear_problem() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config(dir.path(), 10, range(0, 3), vec![]);
    config.training.batch_size = nz(4);

    let history = TrainingController::new(config, Arc::new(oracle()))
        .unwrap()
        .run()
        .unwrap();

    let losses = &history.train_losses;
    assert_eq!(losses.len(), 10);
    assert!(losses.iter().all(|loss| loss.is_finite()));
    assert!(losses.windows(2).all(|w| w[1] <= w[0]), "losses increased: {losses:?}");
    assert!(losses[9] < losses[0], "losses did not decrease: {losses:?}");

    assert_eq!(history.dataset_size, 4);
    assert!(history.validation_scores.is_empty());
}

#[test]
fn boundaries_without_improvement_do_not_augment() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config(dir.path(), 6, range(0, 3), vec![8]);
    config.training.augment_every = nz(2);

    let history = TrainingController::new(config, Arc::new(oracle()))
        .unwrap()
        .run()
        .unwrap();

    assert_eq!(history.augmentations, 0);
    assert_eq!(history.dataset_size, 4);
    assert!(history.best_checkpoint.is_none());
    assert!(cache_entries(dir.path()).is_empty());
}

fn augmenting_config(dir: &Path) -> Config {
    let mut config = config(dir, 60, range(0, 63), vec![]);
    config.training.batch_size = nz(8);
    config.training.validate_every = nz(30);
    config.training.augment_every = nz(60);
    config.training.augmentation_range = Some(range(64, 79));
    config
}

#[test]
fn improved_model_augments_the_training_set() {
    let dir = tempfile::tempdir().unwrap();

    let history = TrainingController::new(augmenting_config(dir.path()), Arc::new(oracle()))
        .unwrap()
        .run()
        .unwrap();

    assert_eq!(history.validation_scores.len(), 2);
    assert!(history.best_score > 0.);
    assert_eq!(history.augmentations, 1);
    assert_eq!(history.dataset_size, 64 + 16);

    let best = history.best_checkpoint.unwrap();
    assert!(best.exists());

    let entries = cache_entries(dir.path());
    assert_eq!(entries.len(), 1);
    assert!(entries[0].starts_with("augmented_64_79_model_e"));
}

#[test]
fn cached_samples_are_reused() {
    let dir = tempfile::tempdir().unwrap();

    let first = TrainingController::new(augmenting_config(dir.path()), Arc::new(oracle()))
        .unwrap()
        .run()
        .unwrap();
    assert_eq!(first.dataset_size, 80);

    // Same run, but augmentation scenarios can no longer be simulated, only a cache hit can
    // grow the training set.
    let oracle = oracle().with_unavailable(64..=79);
    let second = TrainingController::new(augmenting_config(dir.path()), Arc::new(oracle))
        .unwrap()
        .run()
        .unwrap();

    assert_eq!(second.best_score, first.best_score);
    assert_eq!(second.dataset_size, 80);
    assert_eq!(cache_entries(dir.path()).len(), 1);
}

#[test]
fn empty_augmentation_keeps_training() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = augmenting_config(dir.path());
    config.training.epochs = 90;
    let oracle = oracle().with_unavailable(64..=79);

    let history = TrainingController::new(config, Arc::new(oracle))
        .unwrap()
        .run()
        .unwrap();

    assert_eq!(history.train_losses.len(), 90);
    assert_eq!(history.validation_scores.len(), 3);
    assert_eq!(history.augmentations, 1);
    assert_eq!(history.dataset_size, 64);
    assert_eq!(cache_entries(dir.path()).len(), 1);
}

#[test]
fn parallel_validation_matches_sequential() {
    let sequential_dir = tempfile::tempdir().unwrap();
    let sequential = TrainingController::new(
        augmenting_config(sequential_dir.path()),
        Arc::new(oracle()),
    )
    .unwrap()
    .run()
    .unwrap();

    let parallel_dir = tempfile::tempdir().unwrap();
    let mut config = augmenting_config(parallel_dir.path());
    config.training.parallel_validation = true;
    let parallel = TrainingController::new(config, Arc::new(oracle()))
        .unwrap()
        .run()
        .unwrap();

    assert_eq!(parallel.validation_scores.len(), 2);
    assert_eq!(parallel.validation_scores, sequential.validation_scores);
    assert_eq!(parallel.best_score, sequential.best_score);
    assert_eq!(parallel.augmentations, 1);
    assert_eq!(parallel.dataset_size, sequential.dataset_size);
}

#[test]
fn unavailable_training_range_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path(), 1, range(0, 3), vec![8]);
    let oracle = oracle().with_unavailable(0..=3);

    let res = TrainingController::new(config, Arc::new(oracle));
    assert!(matches!(
        res,
        Err(OrchestratorError::NoSuccessfulScenarios { stage: "training" })
    ));
}
