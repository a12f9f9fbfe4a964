use std::sync::Arc;
use std::time::Duration;

use nicho_limit::Clock;
use nicho_limit::Limiters;
use nicho_limit::Strategy;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio::time::MissedTickBehavior;
use tokio::time::interval_at;
use tracing::debug;
use tracing::trace;

/// Background task that periodically evicts expired keys from a set of limiters.
///
/// The first sweep runs one `period` after spawning. Dropping the handle
/// aborts the task; [`CleanupTask::shutdown`] stops it cleanly.
#[derive(Debug)]
pub struct CleanupTask {
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl CleanupTask {
    /// Must be called from within a tokio runtime.
    pub fn spawn<L>(limiters: Vec<Arc<L>>, clock: Arc<dyn Clock>, period: Duration) -> Self
    where
        L: Strategy + Send + Sync + ?Sized + 'static,
    {
        let (tx, mut rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = &mut rx => break,
                    _ = ticker.tick() => {
                        let now = clock.now();
                        let evicted: usize = limiters.iter().map(|l| l.cleanup(now)).sum();
                        if evicted > 0 {
                            debug!(evicted, "Rate limit sweep finished");
                        } else {
                            trace!("Rate limit sweep found nothing to evict");
                        }
                    }
                }
            }
            debug!("Rate limit sweeper stopped");
        });

        Self {
            shutdown: Some(tx),
            handle,
        }
    }

    /// Sweeps every limiter of the site at the given cadence.
    pub fn for_limiters(limiters: &Limiters, clock: Arc<dyn Clock>, period: Duration) -> Self {
        Self::spawn(limiters.iter().cloned().collect(), clock, period)
    }

    /// Stops the task and waits for it to finish its current sweep.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        let _ = (&mut self.handle).await;
    }
}

impl Drop for CleanupTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
