use ndarray::{Array2, ArrayView2};

use crate::{arch::loss::LossFn, error::Result, optimization::Optimizer};

/// Whether the model is being trained or used for inference.
///
/// Layers with stochastic behaviour (dropout) are only active in `Train` mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Train,
    Eval,
}

pub trait Model {
    /// Returns the amount of parameters in the model.
    fn size(&self) -> usize;

    /// Switches the model between training and evaluation behaviour.
    fn set_mode(&mut self, mode: Mode);

    /// Makes a forward pass through the model.
    ///
    /// # Arguments
    /// * `params` - The model's flat parameters.
    /// * `x` - The input rows.
    ///
    /// # Returns
    /// The prediction for every input row.
    fn forward(&mut self, params: &[f32], x: ArrayView2<f32>) -> Result<Array2<f32>>;

    /// Computes the gradient of the loss function with respect to the parameters of the model over
    /// the provided batches. **`params` gets updated** for each batch according to the
    /// optimization algorithm.
    ///
    /// # Arguments
    /// * `params` - The model's parameters.
    /// * `grad` - A buffer for writing the computed gradient on each batch pass.
    /// * `loss_fn` - The loss function.
    /// * `optimizer` - The optimizer that dictates how to update the weights on each gradient calculation.
    /// * `batches` - The batches of data.
    ///
    /// # Returns
    /// The epoch loss.
    fn backprop<L, O, I>(
        &mut self,
        params: &mut [f32],
        grad: &mut [f32],
        loss_fn: &L,
        optimizer: &mut O,
        batches: I,
    ) -> Result<f32>
    where
        L: LossFn,
        O: Optimizer + ?Sized,
        I: Iterator<Item = (Array2<f32>, Array2<f32>)>;
}
