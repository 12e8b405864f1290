use ndarray::{Array2, ArrayView2};

use super::{LayerSpec, Mode, Model, ModelSpec, activations::ActFn, layers::Layer, loss::LossFn};
use crate::{MlErr, Result, optimization::Optimizer};

/// A sequential model: information flows forward when computing an output and backward when
/// computing the *deltas* of its layers.
#[derive(Clone, Debug)]
pub struct Sequential {
    layers: Vec<Layer>,
    mode: Mode,
}

impl Sequential {
    /// Creates a new `Sequential`.
    ///
    /// # Arguments
    /// * `layers` - The layers the sequential is composed of.
    ///
    /// # Returns
    /// A new `Sequential` instance.
    pub fn new<I>(layers: I) -> Self
    where
        I: IntoIterator<Item = Layer>,
    {
        Self {
            layers: layers.into_iter().collect(),
            mode: Mode::default(),
        }
    }

    /// Builds the model described by `spec`.
    ///
    /// # Arguments
    /// * `spec` - The layout of the model.
    /// * `seed` - The seed for the dropout masks.
    ///
    /// # Returns
    /// A new `Sequential` or an `InvalidLayout` error if the layers do not chain.
    pub fn from_spec(spec: &ModelSpec, seed: u64) -> Result<Self> {
        spec.validate()?;

        let layers = spec.layers().iter().enumerate().map(|(i, layer)| match *layer {
            LayerSpec::Dense { dim, act_fn } => Layer::dense(dim, act_fn.map(ActFn::from)),
            LayerSpec::Dropout { rate } => Layer::dropout(rate, seed.wrapping_add(i as u64)),
        });

        Ok(Self::new(layers))
    }

    fn backward(&mut self, params: &[f32], grad: &mut [f32], mut d: Array2<f32>) -> Result<()> {
        let mut end = params.len();

        for layer in self.layers.iter_mut().rev() {
            let start = end - layer.size();
            d = layer.backward(&params[start..end], &mut grad[start..end], d)?;
            end = start;
        }

        Ok(())
    }
}

impl Model for Sequential {
    fn size(&self) -> usize {
        self.layers.iter().map(Layer::size).sum()
    }

    fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
    }

    fn forward(&mut self, params: &[f32], x: ArrayView2<f32>) -> Result<Array2<f32>> {
        let size = self.size();
        if params.len() != size {
            return Err(MlErr::ShapeMismatch {
                what: "model parameters",
                got: params.len(),
                expected: size,
            });
        }

        let mode = self.mode;
        let mut offset = 0;
        let mut a = x.to_owned();

        for layer in self.layers.iter_mut() {
            let end = offset + layer.size();
            a = layer.forward(&params[offset..end], a.view(), mode)?;
            offset = end;
        }

        Ok(a)
    }

    // The epoch loss is approximated by averaging the loss of each batch, computed before the
    // batch's update is applied.
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
        I: Iterator<Item = (Array2<f32>, Array2<f32>)>,
    {
        if grad.len() != params.len() {
            return Err(MlErr::ShapeMismatch {
                what: "gradient buffer",
                got: grad.len(),
                expected: params.len(),
            });
        }

        let mut total_loss = 0.;
        let mut num_batches = 0;

        for (x, y) in batches {
            grad.fill(0.);

            let y_pred = self.forward(params, x.view())?;
            if y_pred.dim() != y.dim() {
                return Err(MlErr::ShapeMismatch {
                    what: "batch targets",
                    got: y.ncols(),
                    expected: y_pred.ncols(),
                });
            }

            let loss = loss_fn.loss(y_pred.view(), y.view());
            if !loss.is_finite() {
                return Err(MlErr::NumericDivergence { what: "batch loss" });
            }

            total_loss += loss;
            num_batches += 1;

            let d = loss_fn.loss_prime(y_pred.view(), y.view());
            self.backward(params, grad, d)?;
            optimizer.update_params(params, grad)?;
        }

        if num_batches == 0 {
            return Err(MlErr::EmptyDataset);
        }

        Ok(total_loss / num_batches as f32)
    }
}
