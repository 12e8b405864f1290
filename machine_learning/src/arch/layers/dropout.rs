use ndarray::{Array2, ArrayView2};
use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::arch::Mode;

/// Inverted dropout: zeroes inputs with probability `rate` while training and rescales the
/// survivors, so evaluation is the identity.
#[derive(Clone, Debug)]
pub struct Dropout {
    rate: f32,
    rng: StdRng,
    mask: Option<Array2<f32>>,
}

impl Dropout {
    pub fn new(rate: f32, seed: u64) -> Self {
        Self {
            rate,
            rng: StdRng::seed_from_u64(seed),
            mask: None,
        }
    }

    pub fn forward(&mut self, x: ArrayView2<f32>, mode: Mode) -> Array2<f32> {
        if mode == Mode::Eval || self.rate == 0. {
            self.mask = None;
            return x.to_owned();
        }

        let keep = 1. - self.rate;
        let rng = &mut self.rng;
        let mask = Array2::from_shape_fn(x.raw_dim(), |_| {
            if rng.random::<f32>() < keep { 1. / keep } else { 0. }
        });

        let a = &x * &mask;
        self.mask = Some(mask);
        a
    }

    pub fn backward(&mut self, d: Array2<f32>) -> Array2<f32> {
        match &self.mask {
            Some(mask) => d * mask,
            None => d,
        }
    }
}
