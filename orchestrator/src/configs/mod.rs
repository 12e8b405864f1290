mod model;
mod oracle;
mod training;

use std::{fs, path::Path};

use serde::Deserialize;

pub use model::{ModelConfig, OptimizerConfig};
pub use oracle::OracleConfig;
pub use training::TrainingConfig;

use crate::{OrchestratorError, Result};

/// The full configuration of a training run, as read from a JSON file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub optimizer: OptimizerConfig,
    pub training: TrainingConfig,
    pub oracle: OracleConfig,
}

impl Config {
    /// Reads and validates the configuration at `path`.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|e| {
            OrchestratorError::InvalidConfig(format!("could not read {}: {e}", path.display()))
        })?;

        Self::from_json(&raw)
    }

    /// Parses and validates a configuration.
    pub fn from_json(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)
            .map_err(|e| OrchestratorError::InvalidConfig(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Checks every section of the configuration.
    ///
    /// # Returns
    /// An `InvalidConfig` error describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        self.model.validate()?;
        self.optimizer.validate()?;
        self.training.validate()?;
        self.oracle.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_gets_defaults() {
        let config = Config::from_json(
            r#"{
                "training": {
                    "epochs": 100,
                    "train_range": { "start": 0, "end": 99 },
                    "validation_range": { "start": 200, "end": 249 }
                },
                "oracle": {
                    "type": "synthetic",
                    "sensors": 4,
                    "correctors_x": 2,
                    "correctors_y": 2
                }
            }"#,
        )
        .unwrap();

        assert_eq!(config.model.hidden, [1024, 512]);
        assert_eq!(config.training.batch_size.get(), 32);
        assert_eq!(config.training.validate_every.get(), 50);
        assert_eq!(config.training.augment_every.get(), 1000);
        assert!(config.training.restore_best_on_augment);
        assert!(matches!(config.optimizer, OptimizerConfig::Adam { .. }));

        let augmentation = config.training.augmentation_range().unwrap();
        assert_eq!((augmentation.start(), augmentation.end()), (0, 199));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let res = Config::from_json(
            r#"{
                "training": {
                    "epochs": 1,
                    "train_range": { "start": 0, "end": 9 },
                    "validation_range": { "start": 10, "end": 19 }
                },
                "oracle": { "type": "files", "dir": "." },
                "learning_rate": 0.1
            }"#,
        );

        assert!(matches!(res, Err(OrchestratorError::InvalidConfig(_))));
    }
}
