//! The top level training loop: trains on a growing dataset, validates, keeps the best
//! checkpoint and grows the dataset with samples synthesized by that checkpoint.

use std::{path::PathBuf, sync::Arc};

use log::{debug, info, warn};
use machine_learning::{
    Checkpoint, Normalizers, TrainingSample, TrainingSet,
    arch::{ModelSpec, Sequential, loss::Mse},
    initialization,
    optimization::Optimizer,
    training::ModelTrainer,
};
use rand::{SeedableRng, rngs::StdRng};
use worker::{Augment, PoolConfig, ScenarioErr, ScenarioOracle, ScenarioRange, WorkerPool};

use crate::{
    OrchestratorError, Result,
    augmentation::{AugmentDecision, AugmentationScheduler},
    cache::{CacheKey, DatasetCache, ModelTag},
    configs::Config,
    gate::BestCheckpoint,
    validation::Validator,
};

type Trainer = ModelTrainer<Sequential, Box<dyn Optimizer + Send>, Mse>;

/// What a training run went through.
#[derive(Debug, Clone, Default)]
pub struct TrainingHistory {
    /// The training loss of every epoch.
    pub train_losses: Vec<f32>,
    /// The epoch number and score of every validation pass.
    pub validation_scores: Vec<(usize, f64)>,
    /// The amount of augmentations that ran, including those that added no samples.
    pub augmentations: usize,
    /// The size of the training set when the run finished.
    pub dataset_size: usize,
    /// Where the best checkpoint was saved, if any validation pass improved on the initial score.
    pub best_checkpoint: Option<PathBuf>,
    /// The best validation score reached, 0 when no pass improved on it.
    pub best_score: f64,
}

/// Builds the initial training set from the pre and reference post states of `range`.
///
/// Unavailable scenarios are skipped.
///
/// # Returns
/// A `NoSuccessfulScenarios` error if no scenario of the range could be loaded.
pub fn initial_training_set<O>(oracle: &O, range: ScenarioRange) -> Result<TrainingSet>
where
    O: ScenarioOracle + ?Sized,
{
    let mut samples = Vec::new();

    for id in range.ids() {
        let scenario = match oracle.load(id) {
            Ok(scenario) => scenario,
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(e) => {
                warn!(scenario = id; "skipping training scenario: {e}");
                continue;
            }
        };

        let sample = TrainingSample::new(
            scenario.pre.readings,
            scenario.pre.correctors.concat(),
            scenario.post.correctors.concat(),
        )
        .map_err(|source| ScenarioErr::Model { id, source })?;

        samples.push(sample);
    }

    if samples.is_empty() {
        return Err(OrchestratorError::NoSuccessfulScenarios { stage: "training" });
    }

    info!(range = range.to_string(), samples = samples.len(); "built initial training set");
    Ok(TrainingSet::new(samples)?)
}

pub struct TrainingController<O: ?Sized> {
    config: Config,
    oracle: Arc<O>,
    spec: ModelSpec,
    trainer: Trainer,
    normalizers: Normalizers,
    training_set: TrainingSet,
    validator: Validator<O>,
    scheduler: AugmentationScheduler,
    gate: BestCheckpoint,
    cache: DatasetCache,
    pool: Arc<WorkerPool>,
    augmentation_range: ScenarioRange,
}

impl<O: ScenarioOracle + ?Sized + 'static> TrainingController<O> {
    /// Creates a new `TrainingController` whose initial training set is built from the
    /// configured training range.
    pub fn new(config: Config, oracle: Arc<O>) -> Result<Self> {
        let training_set = initial_training_set(&*oracle, config.training.train_range)?;
        Self::with_training_set(config, oracle, training_set)
    }

    /// Creates a new `TrainingController` starting from `training_set`.
    ///
    /// # Arguments
    /// * `config` - The configuration of the run.
    /// * `oracle` - Where validation and augmentation scenarios come from.
    /// * `training_set` - The initial training set, which fixes the model's input and output widths.
    pub fn with_training_set(
        config: Config,
        oracle: Arc<O>,
        training_set: TrainingSet,
    ) -> Result<Self> {
        config.validate()?;
        let training = &config.training;

        let spec = config.model.spec(training_set.shape());
        let model_seed = config.model.seed.unwrap_or_else(rand::random);
        let params = initialization::initialize(&spec, &mut StdRng::seed_from_u64(model_seed))?;
        let model = Sequential::from_spec(&spec, model_seed)?;
        debug!(seed = model_seed, params = params.len(); "initialized model");

        let mut trainer = ModelTrainer::new(
            model,
            params,
            config.optimizer.build(),
            Mse::new(),
            training.batch_size,
        )?;

        if training.shuffle {
            let seed = training.seed.unwrap_or_else(rand::random);
            debug!(seed = seed; "shuffling batches");
            trainer = trainer.with_shuffle(seed);
        }

        let pool = Arc::new(WorkerPool::new(PoolConfig::new(training.workers()))?);
        let validator = if training.parallel_validation {
            Validator::parallel(
                training.validation_range,
                Arc::clone(&oracle),
                Arc::clone(&pool),
            )
        } else {
            Validator::sequential(training.validation_range, Arc::clone(&oracle))
        };

        Ok(Self {
            spec,
            trainer,
            normalizers: Normalizers::new(),
            training_set,
            validator,
            scheduler: AugmentationScheduler::new(training.augment_every),
            gate: BestCheckpoint::new(&training.checkpoint_dir)?,
            cache: DatasetCache::new(&training.cache_dir)?,
            pool,
            augmentation_range: training.augmentation_range()?,
            oracle,
            config,
        })
    }

    /// Runs every configured epoch.
    ///
    /// # Returns
    /// The history of the run, or the first error that made training impossible to continue.
    pub fn run(mut self) -> Result<TrainingHistory> {
        let epochs = self.config.training.epochs;
        let validate_every = self.config.training.validate_every;
        let log_every = self.config.training.log_every;

        let mut history = TrainingHistory::default();
        self.normalizers.fit(self.training_set.samples())?;

        info!(
            epochs = epochs,
            samples = self.training_set.len(),
            params = self.spec.size();
            "starting training"
        );

        for epoch in 1..=epochs {
            let loss = self
                .trainer
                .train_epoch(&self.training_set, &self.normalizers)?;
            history.train_losses.push(loss);

            if epoch % validate_every == 0 {
                let score = self.validate(epoch)?;
                history.validation_scores.push((epoch, score));
            }

            match self.scheduler.decide(epoch, self.gate.best().is_some()) {
                AugmentDecision::NotBoundary => {}
                AugmentDecision::Skip => {
                    info!(epoch = epoch; "no new best checkpoint since the last augmentation, skipping it");
                }
                AugmentDecision::Augment => self.augment(epoch)?,
            }

            if epoch % log_every == 0 {
                info!(
                    epoch = epoch,
                    loss = loss,
                    samples = self.training_set.len(),
                    augmentations = self.scheduler.augmentations();
                    "epoch {epoch}/{epochs} finished"
                );
            }
        }

        history.augmentations = self.scheduler.augmentations();
        history.dataset_size = self.training_set.len();
        history.best_score = self.gate.score();
        history.best_checkpoint = self.gate.best().map(|best| best.path.clone());

        Ok(history)
    }

    /// Validates the current model and offers it to the gate.
    ///
    /// # Returns
    /// The validation score.
    fn validate(&mut self, epoch: usize) -> Result<f64> {
        let checkpoint = self.checkpoint()?;
        let report = self.validator.run(&checkpoint)?;
        let score = report.score();

        if self.gate.consider(checkpoint, epoch, score)? {
            self.scheduler.mark_improved();
        }

        Ok(score)
    }

    /// Grows the training set with the samples the best checkpoint synthesizes over the
    /// augmentation range, then refits the normalizers on the whole set.
    fn augment(&mut self, epoch: usize) -> Result<()> {
        let Some(best) = self.gate.best() else {
            return Ok(());
        };

        let range = self.augmentation_range;
        let key = CacheKey::new(range, ModelTag::from(best.checkpoint.provenance()));
        info!(epoch = epoch, range = range.to_string(); "augmenting with {}", best.path.display());

        let pool = &self.pool;
        let oracle = &self.oracle;
        let samples = self.cache.get_or_compute(&key, || {
            let bytes = best.checkpoint.to_bytes()?;
            let output = pool.run(range, bytes.into(), Arc::clone(oracle), Arc::new(Augment))?;

            info!(
                samples = output.outputs.len(),
                skipped = output.failures.len(),
                completed = output.progress.completed;
                "augmentation run finished"
            );
            Ok(output.outputs)
        })?;

        if self.config.training.restore_best_on_augment {
            self.trainer.load_params(best.checkpoint.params())?;
        }

        if samples.is_empty() {
            warn!(epoch = epoch, range = range.to_string(); "augmentation produced no samples");
        }

        let before = self.training_set.len();
        let added = self.training_set.extend(samples)?;
        self.scheduler.complete();
        self.normalizers.fit(self.training_set.samples())?;

        info!(
            epoch = epoch,
            before = before,
            added = added,
            after = self.training_set.len();
            "training set augmented"
        );

        Ok(())
    }

    /// Snapshots the current model.
    fn checkpoint(&self) -> Result<Checkpoint> {
        Ok(Checkpoint::new(
            self.spec.clone(),
            self.trainer.params().to_vec(),
            self.normalizers.clone(),
            None,
        )?)
    }
}
