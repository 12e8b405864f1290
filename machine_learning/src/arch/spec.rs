use serde::{Deserialize, Serialize};

use crate::{MlErr, Result};

/// The specification for the `ActFn` enum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActFnSpec {
    LeakyRelu { slope: f32 },
}

/// The specification for the `Layer` enum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerSpec {
    Dense {
        dim: (usize, usize),
        act_fn: Option<ActFnSpec>,
    },
    Dropout {
        rate: f32,
    },
}

impl LayerSpec {
    /// Returns the amount of trainable parameters of a layer built from this spec.
    pub fn size(&self) -> usize {
        match *self {
            LayerSpec::Dense { dim: (n, m), .. } => (n + 1) * m,
            LayerSpec::Dropout { .. } => 0,
        }
    }
}

/// The specification for the `Model` trait, the part of a checkpoint that describes its layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelSpec {
    Sequential { layers: Vec<LayerSpec> },
}

impl ModelSpec {
    /// Creates the spec of a feed-forward regression network.
    ///
    /// # Arguments
    /// * `input` - The width of the input rows.
    /// * `hidden` - The width of each hidden layer.
    /// * `output` - The width of the output rows.
    /// * `act_fn` - The activation used after each hidden layer.
    /// * `dropout` - The dropout rate after each hidden layer, `0` disables dropout.
    ///
    /// # Returns
    /// A new `ModelSpec` whose last layer is linear.
    pub fn feed_forward(
        input: usize,
        hidden: &[usize],
        output: usize,
        act_fn: ActFnSpec,
        dropout: f32,
    ) -> Self {
        let mut layers = Vec::with_capacity(hidden.len() * 2 + 1);
        let mut prev = input;

        for &width in hidden {
            layers.push(LayerSpec::Dense {
                dim: (prev, width),
                act_fn: Some(act_fn),
            });

            if dropout > 0. {
                layers.push(LayerSpec::Dropout { rate: dropout });
            }

            prev = width;
        }

        layers.push(LayerSpec::Dense {
            dim: (prev, output),
            act_fn: None,
        });

        ModelSpec::Sequential { layers }
    }

    pub fn layers(&self) -> &[LayerSpec] {
        match self {
            ModelSpec::Sequential { layers } => layers,
        }
    }

    /// Returns the amount of trainable parameters of a model built from this spec.
    pub fn size(&self) -> usize {
        self.layers().iter().map(LayerSpec::size).sum()
    }

    /// Returns the expected width of the model's input rows.
    pub fn input_size(&self) -> usize {
        self.dense_dims().next().map(|(n, _)| n).unwrap_or_default()
    }

    /// Returns the width of the model's output rows.
    pub fn output_size(&self) -> usize {
        self.dense_dims().last().map(|(_, m)| m).unwrap_or_default()
    }

    /// Checks that the layers can be chained together.
    ///
    /// # Returns
    /// An `InvalidLayout` error describing the first inconsistency found.
    pub fn validate(&self) -> Result<()> {
        let mut prev_m = None;

        for (i, layer) in self.layers().iter().enumerate() {
            match *layer {
                LayerSpec::Dense { dim: (n, m), .. } => {
                    if n == 0 || m == 0 {
                        return Err(MlErr::InvalidLayout(format!(
                            "layer {i}: dense dimensions must be non zero, got ({n}, {m})"
                        )));
                    }

                    match prev_m {
                        Some(prev_m) if prev_m != n => {
                            return Err(MlErr::InvalidLayout(format!(
                                "layer {i}: input size ({n}) does not match previous layer output size ({prev_m})"
                            )));
                        }
                        _ => {}
                    }

                    prev_m = Some(m);
                }
                LayerSpec::Dropout { rate } => {
                    if !(0. ..1.).contains(&rate) {
                        return Err(MlErr::InvalidLayout(format!(
                            "layer {i}: dropout rate must be in [0, 1), got {rate}"
                        )));
                    }
                }
            }
        }

        if prev_m.is_none() {
            return Err(MlErr::InvalidLayout(
                "model must have at least one dense layer".into(),
            ));
        }

        Ok(())
    }

    fn dense_dims(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.layers().iter().filter_map(|layer| match *layer {
            LayerSpec::Dense { dim, .. } => Some(dim),
            LayerSpec::Dropout { .. } => None,
        })
    }
}
