use std::{
    error::Error,
    fmt::{self, Display},
    io,
};

use machine_learning::MlErr;

use crate::ScenarioId;

/// The category of a per scenario failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The oracle could not produce the scenario.
    Unavailable,
    /// The scenario cannot be scored, e.g. its baseline RMS is zero.
    Degenerate,
    /// The oracle produced inconsistent data.
    Malformed,
    /// The model failed on the scenario's data.
    Model,
}

impl Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureKind::Unavailable => "unavailable",
            FailureKind::Degenerate => "degenerate",
            FailureKind::Malformed => "malformed",
            FailureKind::Model => "model",
        };

        write!(f, "{name}")
    }
}

/// A structured record of a skipped scenario.
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioFailure {
    pub id: ScenarioId,
    pub kind: FailureKind,
    pub message: String,
}

impl From<&ScenarioErr> for ScenarioFailure {
    fn from(err: &ScenarioErr) -> Self {
        Self {
            id: err.id(),
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// An error processing a single scenario.
#[derive(Debug)]
pub enum ScenarioErr {
    Unavailable { id: ScenarioId, reason: String },
    Degenerate { id: ScenarioId, reason: String },
    Malformed { id: ScenarioId, reason: String },
    Model { id: ScenarioId, source: MlErr },
}

impl ScenarioErr {
    pub fn id(&self) -> ScenarioId {
        match *self {
            ScenarioErr::Unavailable { id, .. }
            | ScenarioErr::Degenerate { id, .. }
            | ScenarioErr::Malformed { id, .. }
            | ScenarioErr::Model { id, .. } => id,
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            ScenarioErr::Unavailable { .. } => FailureKind::Unavailable,
            ScenarioErr::Degenerate { .. } => FailureKind::Degenerate,
            ScenarioErr::Malformed { .. } => FailureKind::Malformed,
            ScenarioErr::Model { .. } => FailureKind::Model,
        }
    }

    /// Whether the error signals a broken configuration or model rather than a missing scenario.
    ///
    /// Fatal errors abort the worker, the rest are recorded and skipped.
    pub fn is_fatal(&self) -> bool {
        matches!(self.kind(), FailureKind::Malformed | FailureKind::Model)
    }
}

impl Display for ScenarioErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScenarioErr::Unavailable { id, reason } => {
                write!(f, "scenario {id} is unavailable: {reason}")
            }
            ScenarioErr::Degenerate { id, reason } => {
                write!(f, "scenario {id} cannot be scored: {reason}")
            }
            ScenarioErr::Malformed { id, reason } => {
                write!(f, "scenario {id} is malformed: {reason}")
            }
            ScenarioErr::Model { id, source } => write!(f, "model failed on scenario {id}: {source}"),
        }
    }
}

impl Error for ScenarioErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ScenarioErr::Model { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// The result type of a pool run.
pub type Result<T> = std::result::Result<T, PoolErr>;

/// An error that aborts a whole pool run.
#[derive(Debug)]
pub enum PoolErr {
    Checkpoint(MlErr),
    Scenario(ScenarioErr),
    Join { worker_id: usize, reason: String },
    Io(io::Error),
}

impl Display for PoolErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolErr::Checkpoint(e) => write!(f, "worker could not load the checkpoint: {e}"),
            PoolErr::Scenario(e) => write!(f, "worker aborted: {e}"),
            PoolErr::Join { worker_id, reason } => {
                write!(f, "worker {worker_id} did not finish: {reason}")
            }
            PoolErr::Io(e) => write!(f, "io error: {e}"),
        }
    }
}

impl Error for PoolErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            PoolErr::Checkpoint(e) => Some(e),
            PoolErr::Scenario(e) => Some(e),
            PoolErr::Io(e) => Some(e),
            PoolErr::Join { .. } => None,
        }
    }
}

impl From<io::Error> for PoolErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<ScenarioErr> for PoolErr {
    fn from(value: ScenarioErr) -> Self {
        Self::Scenario(value)
    }
}
