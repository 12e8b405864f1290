use std::{num::NonZeroUsize, path::PathBuf, thread};

use serde::Deserialize;
use worker::ScenarioRange;

use crate::{OrchestratorError, Result};

const DEFAULT_BATCH_SIZE: NonZeroUsize = NonZeroUsize::new(32).unwrap();
const DEFAULT_VALIDATE_EVERY: NonZeroUsize = NonZeroUsize::new(50).unwrap();
const DEFAULT_AUGMENT_EVERY: NonZeroUsize = NonZeroUsize::new(1000).unwrap();
const DEFAULT_LOG_EVERY: NonZeroUsize = NonZeroUsize::new(10).unwrap();

fn default_batch_size() -> NonZeroUsize {
    DEFAULT_BATCH_SIZE
}

fn default_validate_every() -> NonZeroUsize {
    DEFAULT_VALIDATE_EVERY
}

fn default_augment_every() -> NonZeroUsize {
    DEFAULT_AUGMENT_EVERY
}

fn default_log_every() -> NonZeroUsize {
    DEFAULT_LOG_EVERY
}

fn default_true() -> bool {
    true
}

fn default_checkpoint_dir() -> PathBuf {
    PathBuf::from("saved_models")
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("data_cache")
}

/// How the training loop runs: its schedule, the scenario ranges it draws from and where it
/// keeps its files.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrainingConfig {
    pub epochs: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: NonZeroUsize,
    /// Validate after every `validate_every` epochs.
    #[serde(default = "default_validate_every")]
    pub validate_every: NonZeroUsize,
    /// Consider augmenting after every `augment_every` epochs.
    #[serde(default = "default_augment_every")]
    pub augment_every: NonZeroUsize,
    #[serde(default = "default_log_every")]
    pub log_every: NonZeroUsize,
    /// The scenarios the initial training set is built from.
    pub train_range: ScenarioRange,
    pub validation_range: ScenarioRange,
    /// The scenarios augmentation runs over, everything before the validation range if missing.
    #[serde(default)]
    pub augmentation_range: Option<ScenarioRange>,
    /// The amount of simulation workers, one per cpu if missing.
    #[serde(default)]
    pub workers: Option<NonZeroUsize>,
    /// Validate with the worker pool instead of on the training thread.
    #[serde(default)]
    pub parallel_validation: bool,
    /// Continue training from the best checkpoint after every augmentation.
    #[serde(default = "default_true")]
    pub restore_best_on_augment: bool,
    #[serde(default = "default_checkpoint_dir")]
    pub checkpoint_dir: PathBuf,
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    #[serde(default)]
    pub shuffle: bool,
    /// The seed of the batch shuffling, random if missing.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl TrainingConfig {
    /// Creates a new `TrainingConfig` with every optional field set to its default.
    pub fn new(epochs: usize, train_range: ScenarioRange, validation_range: ScenarioRange) -> Self {
        Self {
            epochs,
            batch_size: DEFAULT_BATCH_SIZE,
            validate_every: DEFAULT_VALIDATE_EVERY,
            augment_every: DEFAULT_AUGMENT_EVERY,
            log_every: DEFAULT_LOG_EVERY,
            train_range,
            validation_range,
            augmentation_range: None,
            workers: None,
            parallel_validation: false,
            restore_best_on_augment: true,
            checkpoint_dir: default_checkpoint_dir(),
            cache_dir: default_cache_dir(),
            shuffle: false,
            seed: None,
        }
    }

    /// The range augmentation runs over.
    ///
    /// # Returns
    /// An `InvalidConfig` error if no range was given and the validation range starts at `0`,
    /// leaving nothing before it.
    pub fn augmentation_range(&self) -> Result<ScenarioRange> {
        if let Some(range) = self.augmentation_range {
            return Ok(range);
        }

        self.validation_range
            .start()
            .checked_sub(1)
            .and_then(|end| ScenarioRange::new(0, end))
            .ok_or_else(|| {
                OrchestratorError::InvalidConfig(
                    "the validation range starts at 0, an augmentation_range must be given".into(),
                )
            })
    }

    pub fn workers(&self) -> NonZeroUsize {
        self.workers
            .or_else(|| thread::available_parallelism().ok())
            .unwrap_or(NonZeroUsize::MIN)
    }

    pub fn validate(&self) -> Result<()> {
        if self.epochs == 0 {
            return Err(OrchestratorError::InvalidConfig(
                "epochs must be greater than 0".into(),
            ));
        }

        let augmentation = self.augmentation_range()?;
        if overlap(augmentation, self.validation_range) {
            return Err(OrchestratorError::InvalidConfig(format!(
                "augmentation range {augmentation} overlaps validation range {}",
                self.validation_range
            )));
        }

        if overlap(self.train_range, self.validation_range) {
            return Err(OrchestratorError::InvalidConfig(format!(
                "train range {} overlaps validation range {}",
                self.train_range, self.validation_range
            )));
        }

        Ok(())
    }
}

fn overlap(a: ScenarioRange, b: ScenarioRange) -> bool {
    a.start() <= b.end() && b.start() <= a.end()
}
