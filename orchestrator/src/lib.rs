//! Progressive self-augmentation training of an orbit correction model.
//!
//! The controller trains on a growing dataset, validates against a scenario oracle every few
//! epochs, keeps the best checkpoint and, whenever a better model was found since the previous
//! augmentation, lets that model synthesize new samples on a pool of simulation workers.

pub mod augmentation;
pub mod cache;
pub mod configs;
pub mod controller;
pub mod error;
pub mod gate;
pub mod validation;

use std::sync::Arc;

use log::info;
use worker::{FileOracle, SyntheticOracle};

pub use controller::{TrainingController, TrainingHistory};
pub use error::{OrchestratorError, Result};

use crate::configs::{Config, OracleConfig};

/// Runs a full training session with the oracle described by `config`.
///
/// # Errors
/// Returns an `OrchestratorError` if the configuration is invalid or training cannot continue.
pub fn train(config: Config) -> Result<TrainingHistory> {
    match config.oracle.clone() {
        OracleConfig::Files { dir } => {
            info!("loading scenarios from {}", dir.display());
            TrainingController::new(config, Arc::new(FileOracle::new(dir)))?.run()
        }
        OracleConfig::Synthetic {
            sensors,
            correctors_x,
            correctors_y,
            noise,
            seed,
        } => {
            info!(sensors = sensors, correctors_x = correctors_x, correctors_y = correctors_y; "using synthetic scenarios");
            let oracle = SyntheticOracle::new(sensors, correctors_x, correctors_y, noise, seed);
            TrainingController::new(config, Arc::new(oracle))?.run()
        }
    }
}
