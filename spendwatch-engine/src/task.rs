//! Cancellable periodic tasks.
//!
//! A [`ScheduledTask`] runs a job on a fixed period until its token is
//! cancelled. Every task token is a child of a parent token, so cancelling
//! the parent (consumer teardown) stops all of its timers. The returned
//! [`StopHandle`] stops the task explicitly or when dropped.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Handle to a running [`ScheduledTask`].
#[derive(Debug)]
pub struct StopHandle {
    name: &'static str,
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl StopHandle {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Stop scheduling further runs. A run already in progress completes.
    pub fn stop(&self) {
        self.token.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Stop the task and wait for its loop to exit.
    pub async fn join(mut self) {
        self.token.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                tracing::warn!(task = self.name, error = %e, "scheduled task ended abnormally");
            }
        }
    }
}

impl Drop for StopHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

pub struct ScheduledTask;

impl ScheduledTask {
    /// Spawn `job` every `period`, first run one period from now.
    ///
    /// Missed ticks are skipped, so a job that overruns its period is not
    /// followed by a burst of catch-up runs.
    pub fn spawn<J, Fut>(
        name: &'static str,
        period: Duration,
        parent: &CancellationToken,
        mut job: J,
    ) -> StopHandle
    where
        J: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let token = parent.child_token();
        let task_token = token.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            tracing::info!(task = name, period_ms = period.as_millis() as u64, "scheduled task started");

            loop {
                tokio::select! {
                    biased;

                    _ = task_token.cancelled() => {
                        tracing::info!(task = name, "scheduled task stopped");
                        break;
                    }

                    _ = ticker.tick() => {
                        job().await;
                    }
                }
            }
        });

        StopHandle {
            name,
            token,
            handle: Some(handle),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting_job(counter: &Arc<AtomicUsize>) -> impl FnMut() -> std::future::Ready<()> + Send + 'static {
        let counter = Arc::clone(counter);
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
            std::future::ready(())
        }
    }

    #[tokio::test]
    async fn test_task_runs_until_stopped() {
        let parent = CancellationToken::new();
        let runs = Arc::new(AtomicUsize::new(0));
        let handle = ScheduledTask::spawn("test", Duration::from_millis(10), &parent, counting_job(&runs));

        tokio::time::sleep(Duration::from_millis(80)).await;
        handle.join().await;
        let after_stop = runs.load(Ordering::SeqCst);
        assert!(after_stop >= 2, "expected several runs, got {}", after_stop);

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(runs.load(Ordering::SeqCst), after_stop);
    }

    #[tokio::test]
    async fn test_first_run_waits_one_period() {
        let parent = CancellationToken::new();
        let runs = Arc::new(AtomicUsize::new(0));
        let _handle = ScheduledTask::spawn("slow", Duration::from_secs(60), &parent, counting_job(&runs));

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_parent_cancellation_stops_children() {
        let parent = CancellationToken::new();
        let runs = Arc::new(AtomicUsize::new(0));
        let a = ScheduledTask::spawn("a", Duration::from_millis(10), &parent, counting_job(&runs));
        let b = ScheduledTask::spawn("b", Duration::from_millis(10), &parent, counting_job(&runs));

        parent.cancel();
        assert!(a.is_stopped());
        assert!(b.is_stopped());
        a.join().await;
        b.join().await;

        let settled = runs.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(runs.load(Ordering::SeqCst), settled);
    }

    #[tokio::test]
    async fn test_drop_stops_task() {
        let parent = CancellationToken::new();
        let runs = Arc::new(AtomicUsize::new(0));
        let handle = ScheduledTask::spawn("dropped", Duration::from_millis(10), &parent, counting_job(&runs));
        drop(handle);

        tokio::time::sleep(Duration::from_millis(20)).await;
        let settled = runs.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(runs.load(Ordering::SeqCst), settled);
        assert!(!parent.is_cancelled());
    }
}
