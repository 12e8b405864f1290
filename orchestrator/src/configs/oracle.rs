use std::path::PathBuf;

use serde::Deserialize;

use crate::{OrchestratorError, Result};

/// Where scenarios come from.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", deny_unknown_fields)]
pub enum OracleConfig {
    /// One `seed{id}.json` document per scenario under `dir`.
    Files { dir: PathBuf },
    /// Scenarios generated from their id under a random linear response.
    Synthetic {
        sensors: usize,
        correctors_x: usize,
        correctors_y: usize,
        #[serde(default)]
        noise: f32,
        #[serde(default)]
        seed: u64,
    },
}

impl OracleConfig {
    pub fn validate(&self) -> Result<()> {
        match *self {
            Self::Files { ref dir } => {
                if !dir.is_dir() {
                    return Err(OrchestratorError::InvalidConfig(format!(
                        "scenario directory {} does not exist",
                        dir.display()
                    )));
                }
            }
            Self::Synthetic {
                sensors,
                correctors_x,
                correctors_y,
                noise,
                ..
            } => {
                if sensors == 0 || correctors_x + correctors_y == 0 {
                    return Err(OrchestratorError::InvalidConfig(
                        "a synthetic oracle needs at least one sensor and one corrector".into(),
                    ));
                }

                if !(noise >= 0. && noise.is_finite()) {
                    return Err(OrchestratorError::InvalidConfig(format!(
                        "noise must be a non negative number, got {noise}"
                    )));
                }
            }
        }

        Ok(())
    }
}
