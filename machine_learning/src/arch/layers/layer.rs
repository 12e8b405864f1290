use ndarray::{Array2, ArrayView2};

use super::{Dense, Dropout};
use crate::{
    Result,
    arch::{Mode, activations::ActFn},
};

#[derive(Clone, Debug)]
pub enum Layer {
    Dense(Dense),
    Dropout(Dropout),
}

impl Layer {
    pub fn dense(dim: (usize, usize), act_fn: Option<ActFn>) -> Self {
        Self::Dense(Dense::new(dim, act_fn))
    }

    pub fn dropout(rate: f32, seed: u64) -> Self {
        Self::Dropout(Dropout::new(rate, seed))
    }

    pub fn size(&self) -> usize {
        match self {
            Self::Dense(l) => l.size(),
            Self::Dropout(_) => 0,
        }
    }

    pub fn forward(
        &mut self,
        params: &[f32],
        x: ArrayView2<f32>,
        mode: Mode,
    ) -> Result<Array2<f32>> {
        match self {
            Self::Dense(l) => l.forward(params, x),
            Self::Dropout(l) => Ok(l.forward(x, mode)),
        }
    }

    pub fn backward(
        &mut self,
        params: &[f32],
        grad: &mut [f32],
        d: Array2<f32>,
    ) -> Result<Array2<f32>> {
        match self {
            Self::Dense(l) => l.backward(params, grad, d),
            Self::Dropout(l) => Ok(l.backward(d)),
        }
    }
}
