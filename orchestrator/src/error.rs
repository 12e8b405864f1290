use std::{fmt, io};

use machine_learning::MlErr;
use worker::{PoolErr, ScenarioErr};

/// The result type used in the entire orchestrator.
pub type Result<T> = std::result::Result<T, OrchestratorError>;

/// All errors that can occur in the orchestrator.
#[derive(Debug)]
pub enum OrchestratorError {
    /// Invalid configuration, caught before training starts.
    InvalidConfig(String),
    /// The model, its normalizers or a checkpoint failed.
    Ml(MlErr),
    /// A scenario failed in a way that invalidates the whole run.
    Scenario(ScenarioErr),
    /// The worker pool could not complete a run.
    Pool(PoolErr),
    /// Every scenario of a stage was skipped, its aggregates are undefined.
    NoSuccessfulScenarios { stage: &'static str },
    /// An underlying I/O error not covered by the above variants.
    Io(io::Error),
}

impl fmt::Display for OrchestratorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
            Self::Ml(e) => write!(f, "model error: {e}"),
            Self::Scenario(e) => write!(f, "scenario error: {e}"),
            Self::Pool(e) => write!(f, "worker pool error: {e}"),
            Self::NoSuccessfulScenarios { stage } => {
                write!(f, "no scenario of the {stage} range could be processed")
            }
            Self::Io(e) => write!(f, "io error: {e}"),
        }
    }
}

impl std::error::Error for OrchestratorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Ml(e) => Some(e),
            Self::Scenario(e) => Some(e),
            Self::Pool(e) => Some(e),
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<MlErr> for OrchestratorError {
    fn from(e: MlErr) -> Self {
        Self::Ml(e)
    }
}

impl From<ScenarioErr> for OrchestratorError {
    fn from(e: ScenarioErr) -> Self {
        Self::Scenario(e)
    }
}

impl From<PoolErr> for OrchestratorError {
    fn from(e: PoolErr) -> Self {
        Self::Pool(e)
    }
}

impl From<io::Error> for OrchestratorError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}
