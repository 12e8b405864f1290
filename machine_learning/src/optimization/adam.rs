use rayon::prelude::*;

use super::{Optimizer, optimizer::check_len};
use crate::Result;

/// The Adam optimization algorithm, with L2 weight decay folded into the gradient.
#[derive(Debug, Clone)]
pub struct Adam {
    learning_rate: f32,
    beta1: f32,
    beta2: f32,
    epsilon: f32,
    weight_decay: f32,

    // Running powers of the betas, used for bias correction.
    beta1_t: f32,
    beta2_t: f32,
    m: Vec<f32>,
    v: Vec<f32>,
}

impl Adam {
    /// Creates a new `Adam` optimizer.
    ///
    /// # Arguments
    /// * `learning_rate` - The step size.
    /// * `beta1` - The decay rate of the first moment estimate.
    /// * `beta2` - The decay rate of the second moment estimate.
    /// * `epsilon` - The term added to the denominator for numerical stability.
    /// * `weight_decay` - The L2 penalty coefficient.
    ///
    /// # Returns
    /// A new `Adam` instance. The moment buffers are sized lazily on the first update.
    pub fn new(learning_rate: f32, beta1: f32, beta2: f32, epsilon: f32, weight_decay: f32) -> Self {
        Self {
            learning_rate,
            beta1,
            beta2,
            epsilon,
            weight_decay,
            beta1_t: 1.,
            beta2_t: 1.,
            m: Vec::new(),
            v: Vec::new(),
        }
    }
}

impl Optimizer for Adam {
    fn update_params(&mut self, params: &mut [f32], grad: &[f32]) -> Result<()> {
        check_len(params, grad)?;

        if self.m.len() != params.len() {
            self.m = vec![0.; params.len()];
            self.v = vec![0.; params.len()];
            self.beta1_t = 1.;
            self.beta2_t = 1.;
        }

        self.beta1_t *= self.beta1;
        self.beta2_t *= self.beta2;

        let Self {
            learning_rate: lr,
            beta1: b1,
            beta2: b2,
            epsilon: eps,
            weight_decay: wd,
            beta1_t,
            beta2_t,
            ..
        } = *self;

        params
            .par_iter_mut()
            .zip(grad.par_iter())
            .zip(self.m.par_iter_mut().zip(self.v.par_iter_mut()))
            .for_each(|((w, &g), (m, v))| {
                let g = g + wd * *w;

                *m = b1 * *m + (1. - b1) * g;
                *v = b2 * *v + (1. - b2) * g * g;

                let m_hat = *m / (1. - beta1_t);
                let v_hat = *v / (1. - beta2_t);
                *w -= lr * m_hat / (v_hat.sqrt() + eps);
            });

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_step_has_learning_rate_length() {
        let mut adam = Adam::new(0.1, 0.9, 0.999, 1e-8, 0.);
        let mut params = [1., 1.];

        adam.update_params(&mut params, &[3., -0.5]).unwrap();

        assert!((params[0] - 0.9).abs() < 1e-5);
        assert!((params[1] - 1.1).abs() < 1e-5);
    }

    #[test]
    fn minimizes_quadratic() {
        let mut adam = Adam::new(0.05, 0.9, 0.999, 1e-8, 0.);
        let mut params = [4.];

        for _ in 0..500 {
            let grad = [2. * params[0]];
            adam.update_params(&mut params, &grad).unwrap();
        }

        assert!(params[0].abs() < 0.5);
    }
}
