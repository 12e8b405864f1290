use crate::{MlErr, Result};

pub trait Optimizer {
    /// Updates `params` in place given the gradient of the loss with respect to them.
    ///
    /// # Returns
    /// A `ShapeMismatch` error if `params` and `grad` differ in length.
    fn update_params(&mut self, params: &mut [f32], grad: &[f32]) -> Result<()>;
}

impl<T: Optimizer + ?Sized> Optimizer for Box<T> {
    fn update_params(&mut self, params: &mut [f32], grad: &[f32]) -> Result<()> {
        (**self).update_params(params, grad)
    }
}

pub(super) fn check_len(params: &[f32], grad: &[f32]) -> Result<()> {
    if params.len() != grad.len() {
        return Err(MlErr::ShapeMismatch {
            what: "optimizer gradient",
            got: grad.len(),
            expected: params.len(),
        });
    }

    Ok(())
}
