//! Live progress of a pool run.
//!
//! Workers only ever go through `Progress::increment`, which bumps both counters in a single
//! critical section, so `successful <= completed` holds in every snapshot.

use std::{sync::Arc, time::Duration};

use indicatif::{ProgressBar, ProgressStyle};
use parking_lot::Mutex;
use tokio::{sync::oneshot, time};

/// The counters of a pool run at a point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub completed: u64,
    pub successful: u64,
}

/// A shared pair of counters: scenarios processed and scenarios that succeeded.
#[derive(Debug, Clone, Default)]
pub struct Progress {
    counters: Arc<Mutex<ProgressSnapshot>>,
}

impl Progress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a processed scenario.
    ///
    /// # Arguments
    /// * `success` - Whether the scenario produced an output.
    pub fn increment(&self, success: bool) {
        let mut counters = self.counters.lock();
        counters.completed += 1;
        if success {
            counters.successful += 1;
        }
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        *self.counters.lock()
    }
}

/// Renders `progress` on a progress bar every `poll_interval` until `done` fires.
///
/// The bar is only a display: it is hidden when stderr is not a terminal and nothing waits on it.
///
/// # Arguments
/// * `progress` - The counters to poll.
/// * `total` - The amount of scenarios of the run.
/// * `poll_interval` - The time between two polls.
/// * `done` - Fires once every worker finished.
pub async fn monitor(
    progress: Progress,
    total: u64,
    poll_interval: Duration,
    mut done: oneshot::Receiver<()>,
) -> ProgressSnapshot {
    let bar = ProgressBar::new(total);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );

    let mut interval = time::interval(poll_interval);
    interval.set_missed_tick_behavior(time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = interval.tick() => render(&bar, progress.snapshot()),
            _ = &mut done => break,
        }
    }

    let last = progress.snapshot();
    render(&bar, last);
    bar.finish();
    last
}

fn render(bar: &ProgressBar, snapshot: ProgressSnapshot) {
    bar.set_position(snapshot.completed);
    bar.set_message(format!("{} successful", snapshot.successful));
}
