use machine_learning::{
    SampleShape,
    arch::{ActFnSpec, ModelSpec},
    optimization::{Adam, GradientDescent, Optimizer},
};
use serde::Deserialize;

use crate::{OrchestratorError, Result};

/// The layout of the feed-forward network.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModelConfig {
    /// The width of every hidden layer.
    pub hidden: Vec<usize>,
    pub leaky_slope: f32,
    /// The dropout rate after every hidden layer, `0` disables dropout.
    pub dropout: f32,
    /// The seed for the weight initialization, random if missing.
    pub seed: Option<u64>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            hidden: vec![1024, 512],
            leaky_slope: 0.01,
            dropout: 0.,
            seed: None,
        }
    }
}

impl ModelConfig {
    pub fn validate(&self) -> Result<()> {
        if self.hidden.contains(&0) {
            return Err(OrchestratorError::InvalidConfig(
                "hidden layer widths must be greater than 0".into(),
            ));
        }

        if !self.leaky_slope.is_finite() {
            return Err(OrchestratorError::InvalidConfig(format!(
                "leaky_slope must be finite, got {}",
                self.leaky_slope
            )));
        }

        if !(0. ..1.).contains(&self.dropout) {
            return Err(OrchestratorError::InvalidConfig(format!(
                "dropout must be in [0, 1), got {}",
                self.dropout
            )));
        }

        Ok(())
    }

    /// The layout of a network for samples of the given shape.
    pub fn spec(&self, shape: SampleShape) -> ModelSpec {
        ModelSpec::feed_forward(
            shape.input_size(),
            &self.hidden,
            shape.output_size(),
            ActFnSpec::LeakyRelu {
                slope: self.leaky_slope,
            },
            self.dropout,
        )
    }
}

fn default_learning_rate() -> f32 {
    1e-3
}

fn default_beta1() -> f32 {
    0.9
}

fn default_beta2() -> f32 {
    0.999
}

fn default_epsilon() -> f32 {
    1e-8
}

fn default_weight_decay() -> f32 {
    1e-5
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", deny_unknown_fields)]
pub enum OptimizerConfig {
    Adam {
        #[serde(default = "default_learning_rate")]
        learning_rate: f32,
        #[serde(default = "default_beta1")]
        beta1: f32,
        #[serde(default = "default_beta2")]
        beta2: f32,
        #[serde(default = "default_epsilon")]
        epsilon: f32,
        #[serde(default = "default_weight_decay")]
        weight_decay: f32,
    },
    GradientDescent {
        #[serde(default = "default_learning_rate")]
        learning_rate: f32,
    },
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self::Adam {
            learning_rate: default_learning_rate(),
            beta1: default_beta1(),
            beta2: default_beta2(),
            epsilon: default_epsilon(),
            weight_decay: default_weight_decay(),
        }
    }
}

impl OptimizerConfig {
    pub fn validate(&self) -> Result<()> {
        let invalid = |what: &str, value: f32| {
            Err(OrchestratorError::InvalidConfig(format!(
                "invalid optimizer {what}: {value}"
            )))
        };

        match *self {
            Self::Adam {
                learning_rate,
                beta1,
                beta2,
                epsilon,
                weight_decay,
            } => {
                if !(learning_rate > 0. && learning_rate.is_finite()) {
                    return invalid("learning_rate", learning_rate);
                }
                if !(0. ..1.).contains(&beta1) {
                    return invalid("beta1", beta1);
                }
                if !(0. ..1.).contains(&beta2) {
                    return invalid("beta2", beta2);
                }
                if !(epsilon > 0.) {
                    return invalid("epsilon", epsilon);
                }
                if !(weight_decay >= 0. && weight_decay.is_finite()) {
                    return invalid("weight_decay", weight_decay);
                }
            }
            Self::GradientDescent { learning_rate } => {
                if !(learning_rate > 0. && learning_rate.is_finite()) {
                    return invalid("learning_rate", learning_rate);
                }
            }
        }

        Ok(())
    }

    pub fn build(&self) -> Box<dyn Optimizer + Send> {
        match *self {
            Self::Adam {
                learning_rate,
                beta1,
                beta2,
                epsilon,
                weight_decay,
            } => Box::new(Adam::new(learning_rate, beta1, beta2, epsilon, weight_decay)),
            Self::GradientDescent { learning_rate } => Box::new(GradientDescent::new(learning_rate)),
        }
    }
}
