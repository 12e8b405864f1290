use std::num::NonZeroUsize;

use log::debug;
use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};

use crate::{
    MlErr, Normalizers, Result, TrainingSet,
    arch::{Mode, Model, loss::LossFn},
    optimization::Optimizer,
};

/// A model trainer. Contains the relevant components needed for training a model, including the
/// model itself and its current parameters.
pub struct ModelTrainer<M, O, L>
where
    M: Model,
    O: Optimizer,
    L: LossFn,
{
    model: M,
    optimizer: O,
    loss_fn: L,
    params: Vec<f32>,
    grad: Vec<f32>,
    batch_size: NonZeroUsize,
    shuffle: Option<StdRng>,
}

impl<M, O, L> ModelTrainer<M, O, L>
where
    M: Model,
    O: Optimizer,
    L: LossFn,
{
    /// Returns a new `ModelTrainer`.
    ///
    /// # Arguments
    /// * `model` - The model that will be trained.
    /// * `params` - The model's initial parameters.
    /// * `optimizer` - The optimizer used on every batch.
    /// * `loss_fn` - The loss function used to measure the difference between a model's output and the expected one.
    /// * `batch_size` - The maximum amount of samples per batch, the last batch may be shorter.
    ///
    /// # Returns
    /// A new `ModelTrainer` or a `ShapeMismatch` error if `params` does not fit the model.
    pub fn new(
        model: M,
        params: Vec<f32>,
        optimizer: O,
        loss_fn: L,
        batch_size: NonZeroUsize,
    ) -> Result<Self> {
        if params.len() != model.size() {
            return Err(MlErr::ShapeMismatch {
                what: "trainer parameters",
                got: params.len(),
                expected: model.size(),
            });
        }

        Ok(Self {
            grad: vec![0.; params.len()],
            model,
            optimizer,
            loss_fn,
            params,
            batch_size,
            shuffle: None,
        })
    }

    /// Shuffles the batch order on every epoch using a generator seeded with `seed`.
    pub fn with_shuffle(mut self, seed: u64) -> Self {
        self.shuffle = Some(StdRng::seed_from_u64(seed));
        self
    }

    pub fn params(&self) -> &[f32] {
        &self.params
    }

    /// Replaces the current parameters, keeping the optimizer's state.
    pub fn load_params(&mut self, params: &[f32]) -> Result<()> {
        if params.len() != self.params.len() {
            return Err(MlErr::ShapeMismatch {
                what: "trainer parameters",
                got: params.len(),
                expected: self.params.len(),
            });
        }

        self.params.copy_from_slice(params);
        Ok(())
    }

    /// Performs a single epoch over `dataset`.
    ///
    /// # Arguments
    /// * `dataset` - The samples to train on, in their current order unless shuffling is enabled.
    /// * `normalizers` - The fitted normalizers applied to every batch.
    ///
    /// # Returns
    /// The epoch loss or an error if the loss diverged.
    pub fn train_epoch(&mut self, dataset: &TrainingSet, normalizers: &Normalizers) -> Result<f32> {
        let samples = dataset.samples();
        let mut order: Vec<usize> = (0..samples.len()).collect();

        if let Some(rng) = &mut self.shuffle {
            order.shuffle(rng);
        }

        let batches = order
            .chunks(self.batch_size.get())
            .map(|chunk| normalizers.batch(chunk.iter().map(|&i| &samples[i])))
            .collect::<Result<Vec<_>>>()?;

        debug!(batches = batches.len(), samples = samples.len(); "training epoch");

        self.model.set_mode(Mode::Train);
        self.model.backprop(
            &mut self.params,
            &mut self.grad,
            &self.loss_fn,
            &mut self.optimizer,
            batches.into_iter(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        TrainingSample,
        arch::{Sequential, layers::Layer, loss::Mse},
        optimization::GradientDescent,
    };

    fn dataset() -> TrainingSet {
        // target = initial corrector + x reading
        let samples = (0..8)
            .map(|i| {
                let x = i as f32 * 0.25;
                let c = 1. - i as f32 * 0.1;
                TrainingSample::new(vec![[x, -x]], vec![c], vec![c + x]).unwrap()
            })
            .collect();

        TrainingSet::new(samples).unwrap()
    }

    fn trainer(batch_size: usize) -> ModelTrainer<Sequential, GradientDescent, Mse> {
        let model = Sequential::new([Layer::dense((3, 1), None)]);
        let batch_size = NonZeroUsize::new(batch_size).unwrap();
        ModelTrainer::new(model, vec![0.; 4], GradientDescent::new(0.05), Mse, batch_size).unwrap()
    }

    #[test]
    fn loss_goes_down() {
        let dataset = dataset();
        let mut normalizers = Normalizers::new();
        normalizers.fit(dataset.samples()).unwrap();

        let mut trainer = trainer(3);
        let losses: Vec<f32> = (0..30)
            .map(|_| trainer.train_epoch(&dataset, &normalizers).unwrap())
            .collect();

        assert!(losses[29] < losses[0] * 0.5);
    }

    #[test]
    fn shuffling_is_seeded() {
        let dataset = dataset();
        let mut normalizers = Normalizers::new();
        normalizers.fit(dataset.samples()).unwrap();

        let mut a = trainer(2).with_shuffle(9);
        let mut b = trainer(2).with_shuffle(9);
        for _ in 0..3 {
            a.train_epoch(&dataset, &normalizers).unwrap();
            b.train_epoch(&dataset, &normalizers).unwrap();
        }

        assert_eq!(a.params(), b.params());
    }

    #[test]
    fn unfit_normalizers_are_fatal() {
        let res = trainer(2).train_epoch(&dataset(), &Normalizers::new());
        assert!(matches!(res, Err(MlErr::NormalizerNotFit { .. })));
    }

    #[test]
    fn load_params_checks_length() {
        let mut trainer = trainer(2);

        trainer.load_params(&[1., 2., 3., 4.]).unwrap();
        assert_eq!(trainer.params(), [1., 2., 3., 4.]);
        assert!(trainer.load_params(&[1.]).is_err());
    }
}
