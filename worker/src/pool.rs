use std::{collections::HashMap, num::NonZeroUsize, sync::Arc, time::Duration};

use log::debug;
use tokio::{
    runtime::{self, Runtime},
    sync::oneshot,
    task::JoinSet,
};

use crate::{
    PoolErr, Progress, ProgressSnapshot, ScenarioFailure, ScenarioOracle, ScenarioRange,
    ScenarioTask, SimulationWorker, WorkerReport, error::Result, progress,
};

/// The default time between two progress polls.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    pub workers: NonZeroUsize,
    pub poll_interval: Duration,
}

impl PoolConfig {
    pub fn new(workers: NonZeroUsize) -> Self {
        Self {
            workers,
            poll_interval: POLL_INTERVAL,
        }
    }
}

/// The merged result of every worker of a run.
#[derive(Debug)]
pub struct PoolOutput<T> {
    /// The outputs of all workers, concatenated in worker order.
    pub outputs: Vec<T>,
    pub failures: Vec<ScenarioFailure>,
    /// The final state of the progress counters.
    pub progress: ProgressSnapshot,
}

/// A fixed size pool of isolated simulation workers.
///
/// Every worker runs on its own blocking thread with a predictor deserialized from the same
/// immutable checkpoint bytes. The only state they share is the progress counters.
pub struct WorkerPool {
    config: PoolConfig,
    runtime: Runtime,
}

impl WorkerPool {
    /// Creates a new `WorkerPool`.
    ///
    /// # Returns
    /// An io error if the runtime could not be built.
    pub fn new(config: PoolConfig) -> Result<Self> {
        let runtime = runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(config.workers.get())
            .thread_name("simulation-worker")
            .enable_time()
            .build()?;

        Ok(Self { config, runtime })
    }

    pub fn config(&self) -> PoolConfig {
        self.config
    }

    /// Runs `task` over every scenario of `range`, blocking until every worker finished.
    ///
    /// # Arguments
    /// * `range` - The scenarios to process, split among the workers.
    /// * `checkpoint` - The serialized checkpoint every worker builds its predictor from.
    /// * `oracle` - The shared, read-only oracle.
    /// * `task` - What to do with each scenario.
    ///
    /// # Returns
    /// The merged output of all workers, or the first error that aborted a worker.
    pub fn run<O, T>(
        &self,
        range: ScenarioRange,
        checkpoint: Arc<[u8]>,
        oracle: Arc<O>,
        task: Arc<T>,
    ) -> Result<PoolOutput<T::Output>>
    where
        O: ScenarioOracle + ?Sized + 'static,
        T: ScenarioTask + 'static,
    {
        self.runtime
            .block_on(self.run_workers(range, checkpoint, oracle, task))
    }

    async fn run_workers<O, T>(
        &self,
        range: ScenarioRange,
        checkpoint: Arc<[u8]>,
        oracle: Arc<O>,
        task: Arc<T>,
    ) -> Result<PoolOutput<T::Output>>
    where
        O: ScenarioOracle + ?Sized + 'static,
        T: ScenarioTask + 'static,
    {
        let progress = Progress::new();
        let (done_tx, done_rx) = oneshot::channel();
        let monitor = tokio::spawn(progress::monitor(
            progress.clone(),
            range.len(),
            self.config.poll_interval,
            done_rx,
        ));

        let mut workers = JoinSet::new();
        let mut worker_ids = HashMap::new();

        let sub_ranges = range.partition(self.config.workers);
        for (worker_id, sub_range) in sub_ranges.into_iter().enumerate() {
            debug!(
                worker_id = worker_id,
                start = sub_range.start(),
                end = sub_range.end();
                "spawning worker"
            );

            let checkpoint = Arc::clone(&checkpoint);
            let oracle = Arc::clone(&oracle);
            let task = Arc::clone(&task);
            let progress = progress.clone();

            let handle = workers.spawn_blocking(move || -> Result<WorkerReport<T::Output>> {
                let mut worker =
                    SimulationWorker::from_checkpoint(worker_id, &checkpoint, progress)
                        .map_err(PoolErr::Checkpoint)?;

                Ok(worker.run(sub_range, &*oracle, &*task)?)
            });

            worker_ids.insert(handle.id(), worker_id);
        }

        let mut reports = Vec::with_capacity(worker_ids.len());
        let mut first_err = None;

        // Every worker is awaited even after a failure, there is no way to cancel them.
        while let Some(joined) = workers.join_next_with_id().await {
            let err = match joined {
                Ok((_, Ok(report))) => {
                    reports.push(report);
                    continue;
                }
                Ok((_, Err(e))) => e,
                Err(e) => PoolErr::Join {
                    worker_id: worker_ids.get(&e.id()).copied().unwrap_or_default(),
                    reason: e.to_string(),
                },
            };

            first_err.get_or_insert(err);
        }

        // The monitor only stops once the receiver sees the signal or the sender is dropped.
        let _ = done_tx.send(());
        let snapshot = match monitor.await {
            Ok(snapshot) => snapshot,
            Err(_) => progress.snapshot(),
        };

        if let Some(e) = first_err {
            return Err(e);
        }

        reports.sort_by_key(|report| report.worker_id);

        let mut outputs = Vec::new();
        let mut failures = Vec::new();
        for report in reports {
            outputs.extend(report.outputs);
            failures.extend(report.failures);
        }

        Ok(PoolOutput {
            outputs,
            failures,
            progress: snapshot,
        })
    }
}
