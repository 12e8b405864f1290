use ndarray::{Array2, ArrayView2};

use super::LossFn;

/// Mean squared error over every element of a batch of correction vectors.
#[derive(Debug, Default, Clone, Copy)]
pub struct Mse;

impl Mse {
    pub fn new() -> Self {
        Self
    }
}

impl LossFn for Mse {
    fn loss(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> f32 {
        let n = y_pred.len().max(1) as f32;
        y_pred
            .iter()
            .zip(y.iter())
            .map(|(p, t)| (p - t).powi(2))
            .sum::<f32>()
            / n
    }

    fn loss_prime(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> Array2<f32> {
        let scale = 2. / y_pred.len().max(1) as f32;
        (&y_pred - &y).mapv_into(|d| d * scale)
    }
}
