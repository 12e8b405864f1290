use ndarray::prelude::*;

use crate::{MlErr, Result, arch::activations::ActFn};

/// A fully connected layer, optionally followed by an activation function.
///
/// Its parameters are laid out in the flat parameter slice as the `(n, m)` row-major
/// weights followed by the `m` biases.
#[derive(Clone, Debug)]
pub struct Dense {
    dim: (usize, usize),
    act_fn: Option<ActFn>,
    size: usize,

    // Forward metadata
    x: Array2<f32>,
    z: Array2<f32>,
}

impl Dense {
    /// Creates a new `Dense` layer.
    ///
    /// # Arguments
    /// * `dim` - The input and output widths.
    /// * `act_fn` - The activation applied to the linear output, if any.
    ///
    /// # Returns
    /// A new `Dense` instance.
    pub fn new(dim: (usize, usize), act_fn: Option<ActFn>) -> Self {
        Self {
            dim,
            size: (dim.0 + 1) * dim.1,
            act_fn,
            x: Array2::zeros((0, dim.0)),
            z: Array2::zeros((0, dim.1)),
        }
    }

    /// Returns the size of this layer.
    ///
    /// # Returns
    /// The amount of parameters this layer has.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn forward(&mut self, params: &[f32], x: ArrayView2<f32>) -> Result<Array2<f32>> {
        if x.ncols() != self.dim.0 {
            return Err(MlErr::ShapeMismatch {
                what: "dense layer input",
                got: x.ncols(),
                expected: self.dim.0,
            });
        }

        let (w, b) = self.view_params(params)?;
        let z = x.dot(&w) + &b;

        let a = match &self.act_fn {
            Some(act_fn) => z.mapv(|z| act_fn.f(z)),
            None => z.clone(),
        };

        self.x = x.to_owned();
        self.z = z;
        Ok(a)
    }

    /// Propagates `d`, the loss derivative with respect to this layer's output, backwards.
    ///
    /// Writes this layer's gradient into `grad` and returns the derivative with respect
    /// to its input.
    pub fn backward(
        &mut self,
        params: &[f32],
        grad: &mut [f32],
        mut d: Array2<f32>,
    ) -> Result<Array2<f32>> {
        if let Some(act_fn) = &self.act_fn {
            d.zip_mut_with(&self.z, |d, &z| *d *= act_fn.df(z));
        }

        let (mut dw, mut db) = self.view_grad(grad)?;
        dw.assign(&self.x.t().dot(&d));
        db.assign(&d.sum_axis(Axis(0)));

        let (w, _) = self.view_params(params)?;
        Ok(d.dot(&w.t()))
    }

    /// Gives a view of the raw gradient slice as the delta weights and delta biases of this layer.
    fn view_grad<'a>(
        &self,
        grad: &'a mut [f32],
    ) -> Result<(ArrayViewMut2<'a, f32>, ArrayViewMut1<'a, f32>)> {
        self.check_len("dense layer gradient", grad.len())?;

        let w_size = self.size - self.dim.1;
        let (dw_raw, db_raw) = grad.split_at_mut(w_size);
        let dw = ArrayViewMut2::from_shape(self.dim, dw_raw).map_err(invalid_layout)?;
        let db = ArrayViewMut1::from_shape(self.dim.1, db_raw).map_err(invalid_layout)?;
        Ok((dw, db))
    }

    /// Gives a view of the raw parameter slice as the weights and biases of this layer.
    fn view_params<'a>(
        &self,
        params: &'a [f32],
    ) -> Result<(ArrayView2<'a, f32>, ArrayView1<'a, f32>)> {
        self.check_len("dense layer parameters", params.len())?;

        let w_size = self.size - self.dim.1;
        let (w_raw, b_raw) = params.split_at(w_size);
        let weights = ArrayView2::from_shape(self.dim, w_raw).map_err(invalid_layout)?;
        let biases = ArrayView1::from_shape(self.dim.1, b_raw).map_err(invalid_layout)?;
        Ok((weights, biases))
    }

    fn check_len(&self, what: &'static str, got: usize) -> Result<()> {
        if got != self.size {
            return Err(MlErr::ShapeMismatch {
                what,
                got,
                expected: self.size,
            });
        }

        Ok(())
    }
}

fn invalid_layout(e: ndarray::ShapeError) -> MlErr {
    MlErr::InvalidLayout(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_is_affine() {
        // w = [[1, 2], [3, 4], [5, 6]], b = [0.5, -0.5]
        let params = [1., 2., 3., 4., 5., 6., 0.5, -0.5];
        let mut dense = Dense::new((3, 2), None);

        let x = array![[1., 0., 1.], [0., 1., 0.]];
        let y = dense.forward(&params, x.view()).unwrap();

        assert_eq!(y, array![[6.5, 7.5], [3.5, 3.5]]);
    }

    #[test]
    fn backward_writes_gradient() {
        let params = [1., 2., 3., 4., 0., 0.];
        let mut dense = Dense::new((2, 2), None);
        let mut grad = [0.; 6];

        let x = array![[1., 2.]];
        dense.forward(&params, x.view()).unwrap();
        let d_in = dense
            .backward(&params, &mut grad, array![[1., 0.]])
            .unwrap();

        assert_eq!(grad, [1., 0., 2., 0., 1., 0.]);
        assert_eq!(d_in, array![[1., 3.]]);
    }

    #[test]
    fn wrong_input_width_is_rejected() {
        let params = [0.; 6];
        let mut dense = Dense::new((2, 2), None);

        let x = array![[1., 2., 3.]];
        assert!(matches!(
            dense.forward(&params, x.view()),
            Err(MlErr::ShapeMismatch { got: 3, expected: 2, .. })
        ));
    }
}
