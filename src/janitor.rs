//! Periodic expiry sweep over the limiters and the reset token store.
//! Used by: main, state.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

const MIN_INTERVAL: Duration = Duration::from_secs(1);
const MAX_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Anything holding expirable in-memory state.
pub trait Sweep: Send + Sync {
    fn name(&self) -> &'static str;

    /// Removes expired entries and returns how many went.
    fn cleanup_expired(&self) -> usize;
}

pub struct Janitor;

impl Janitor {
    /// Spawns the sweep loop on the current tokio runtime. The first sweep runs
    /// one `every` after start; sweeps never overlap.
    pub fn start(every: Duration, targets: Vec<Arc<dyn Sweep>>) -> JanitorHandle {
        let every = if every < MIN_INTERVAL {
            tracing::warn!(?every, min = ?MIN_INTERVAL, "janitor interval too small, clamping");
            MIN_INTERVAL
        } else if every > MAX_INTERVAL {
            tracing::warn!(?every, max = ?MAX_INTERVAL, "janitor interval too large, clamping");
            MAX_INTERVAL
        } else {
            every
        };

        let cancel = CancellationToken::new();
        let stop = cancel.clone();
        let task = tokio::spawn(async move {
            let now = Instant::now();
            let mut ticker = interval_at(now.checked_add(every).unwrap_or(now), every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            tracing::info!(interval_secs = every.as_secs(), targets = targets.len(), "janitor started");
            loop {
                tokio::select! {
                    biased;
                    _ = stop.cancelled() => break,
                    _ = ticker.tick() => sweep_all(&targets),
                }
            }
            tracing::info!("janitor stopped");
        });

        JanitorHandle { cancel, task: Some(task) }
    }
}

fn sweep_all(targets: &[Arc<dyn Sweep>]) {
    for target in targets {
        let removed = target.cleanup_expired();
        if removed > 0 {
            tracing::debug!(target_name = target.name(), removed, "swept expired entries");
        }
    }
}

/// Stops the janitor when told to, or when dropped.
pub struct JanitorHandle {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl JanitorHandle {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, |t| t.is_finished())
    }

    /// Signals the loop and waits for it; at most one in-flight sweep delays this.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "janitor task failed");
            }
        }
    }
}

impl Drop for JanitorHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
