use log::{debug, warn};
use machine_learning::{MlErr, Predictor};

use crate::{Progress, ScenarioErr, ScenarioFailure, ScenarioOracle, ScenarioRange, ScenarioTask};

/// What a worker produced over its range.
#[derive(Debug)]
pub struct WorkerReport<T> {
    pub worker_id: usize,
    pub outputs: Vec<T>,
    pub failures: Vec<ScenarioFailure>,
}

/// Runs a task over a range of scenarios with its own predictor.
pub struct SimulationWorker {
    worker_id: usize,
    predictor: Predictor,
    progress: Progress,
}

impl SimulationWorker {
    /// Creates a new `SimulationWorker`.
    ///
    /// # Arguments
    /// * `worker_id` - Identifier used for observability.
    /// * `predictor` - The worker's own predictor.
    /// * `progress` - The counters to report every processed scenario to.
    pub fn new(worker_id: usize, predictor: Predictor, progress: Progress) -> Self {
        Self {
            worker_id,
            predictor,
            progress,
        }
    }

    /// Creates a new `SimulationWorker` deserializing its predictor from `checkpoint`.
    pub fn from_checkpoint(
        worker_id: usize,
        checkpoint: &[u8],
        progress: Progress,
    ) -> Result<Self, MlErr> {
        let predictor = Predictor::from_bytes(checkpoint)?;
        Ok(Self::new(worker_id, predictor, progress))
    }

    /// Runs `task` over every scenario of `range`, in increasing id order.
    ///
    /// Scenarios that fail with a recoverable error are logged, recorded and skipped.
    ///
    /// # Returns
    /// The outputs and failures of the range, or the first fatal error.
    pub fn run<O, T>(
        &mut self,
        range: ScenarioRange,
        oracle: &O,
        task: &T,
    ) -> Result<WorkerReport<T::Output>, ScenarioErr>
    where
        O: ScenarioOracle + ?Sized,
        T: ScenarioTask + ?Sized,
    {
        let worker_id = self.worker_id;
        debug!(worker_id = worker_id, start = range.start(), end = range.end(); "worker started");

        let mut outputs = Vec::new();
        let mut failures = Vec::new();

        for id in range.ids() {
            match task.run(&mut self.predictor, oracle, id) {
                Ok(output) => {
                    self.progress.increment(true);
                    outputs.push(output);
                }
                Err(e) if e.is_fatal() => {
                    self.progress.increment(false);
                    return Err(e);
                }
                Err(e) => {
                    self.progress.increment(false);
                    warn!(worker_id = worker_id, scenario = id; "skipping {} scenario: {e}", e.kind());
                    failures.push(ScenarioFailure::from(&e));
                }
            }
        }

        debug!(
            worker_id = worker_id,
            outputs = outputs.len(),
            failures = failures.len();
            "worker finished"
        );

        Ok(WorkerReport {
            worker_id,
            outputs,
            failures,
        })
    }
}
