//! Parameter initialization for freshly built models.

use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::{
    MlErr, Result,
    arch::{LayerSpec, ModelSpec},
};

/// Generates chunks of parameters.
pub trait ParamGen {
    /// Samples up to `n` parameters.
    ///
    /// # Returns
    /// `None` once the generator is exhausted, otherwise at most `n` values.
    fn sample(&mut self, n: usize) -> Option<Vec<f32>>;
}

/// A parameter generator that always generates the same value.
pub struct ConstParamGen {
    value: f32,
    remaining: usize,
}

impl ConstParamGen {
    /// Creates a new `ConstParamGen` parameter generator.
    ///
    /// # Arguments
    /// * `value` - The value to always generate.
    /// * `limit` - The maximum amount of times to generate that value.
    ///
    /// # Returns
    /// A new `ConstParamGen` instance.
    pub fn new(value: f32, limit: usize) -> Self {
        Self {
            value,
            remaining: limit,
        }
    }
}

impl ParamGen for ConstParamGen {
    fn sample(&mut self, mut n: usize) -> Option<Vec<f32>> {
        if self.remaining == 0 {
            return None;
        }

        n = n.min(self.remaining);
        self.remaining -= n;
        Some(vec![self.value; n])
    }
}

/// A parameter generator that samples a normal distribution.
pub struct RandParamGen<'r, R: Rng> {
    rng: &'r mut R,
    distribution: Normal<f32>,
    remaining: usize,
}

impl<'r, R: Rng> RandParamGen<'r, R> {
    /// Creates a new `RandParamGen` with a normal distribution.
    ///
    /// # Arguments
    /// * `rng` - A random number generator.
    /// * `limit` - The maximum amount of numbers to generate.
    /// * `mean` - The mean of the distribution.
    /// * `std_dev` - The standard deviation of the distribution.
    ///
    /// # Returns
    /// An error if `std_dev` is not finite.
    pub fn normal(rng: &'r mut R, limit: usize, mean: f32, std_dev: f32) -> Result<Self> {
        let distribution = Normal::new(mean, std_dev)
            .map_err(|e| MlErr::InvalidLayout(format!("invalid normal distribution: {e}")))?;

        Ok(Self {
            rng,
            distribution,
            remaining: limit,
        })
    }

    /// Creates a new `RandParamGen` using Kaiming normal initialization.
    ///
    /// # Arguments
    /// * `rng` - A random number generator.
    /// * `limit` - The maximum amount of numbers to generate.
    /// * `fan_in` - The number of input units in the weight tensor.
    pub fn kaiming(rng: &'r mut R, limit: usize, fan_in: usize) -> Result<Self> {
        let std_dev = (2. / fan_in as f32).sqrt();
        Self::normal(rng, limit, 0., std_dev)
    }
}

impl<R: Rng> ParamGen for RandParamGen<'_, R> {
    fn sample(&mut self, mut n: usize) -> Option<Vec<f32>> {
        if self.remaining == 0 {
            return None;
        }

        n = n.min(self.remaining);
        self.remaining -= n;

        let sample = (0..n).map(|_| self.distribution.sample(self.rng)).collect();
        Some(sample)
    }
}

/// Initializes the parameters of a model: Kaiming normal weights and zero biases.
///
/// # Arguments
/// * `spec` - The layout of the model.
/// * `rng` - The random number generator for the weights.
///
/// # Returns
/// The flat parameter vector, laid out the way the model's layers expect it.
pub fn initialize<R: Rng>(spec: &ModelSpec, rng: &mut R) -> Result<Vec<f32>> {
    spec.validate()?;
    let mut params = Vec::with_capacity(spec.size());

    for layer in spec.layers() {
        let LayerSpec::Dense { dim: (n, m), .. } = *layer else {
            continue;
        };

        let mut weights = RandParamGen::kaiming(rng, n * m, n)?;
        params.extend(weights.sample(n * m).unwrap_or_default());

        let mut biases = ConstParamGen::new(0., m);
        params.extend(biases.sample(m).unwrap_or_default());
    }

    Ok(params)
}
