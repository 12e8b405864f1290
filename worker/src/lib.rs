//! Evaluation of scenario ranges through a trained model, either one worker at a time or with a
//! pool of isolated workers running in parallel.

pub mod error;
pub mod pool;
pub mod progress;
pub mod scenario;
pub mod shard;
pub mod task;
pub mod worker;

pub use error::{FailureKind, PoolErr, ScenarioErr, ScenarioFailure};
pub use pool::{PoolConfig, PoolOutput, WorkerPool};
pub use progress::{Progress, ProgressSnapshot};
pub use scenario::{
    Correctors, FileOracle, LinearResponse, MachineState, Scenario, ScenarioId, ScenarioOracle,
    SyntheticOracle,
};
pub use shard::ScenarioRange;
pub use task::{Augment, Evaluate, ScenarioMetrics, ScenarioTask};
pub use worker::{SimulationWorker, WorkerReport};
