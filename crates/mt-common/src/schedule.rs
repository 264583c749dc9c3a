//! Periodic background task runner.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

/// Runs `task` every `period` on a dedicated tokio task. Single-flight:
/// ticks that fire while a run is still executing are skipped, not
/// queued. A run that returns `Err` is logged and the loop continues.
pub fn spawn_periodic<F, Fut, E>(name: &'static str, period: Duration, mut task: F) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), E>> + Send,
    E: Display,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(task = name, period_secs = period.as_secs(), "periodic task started");
        loop {
            interval.tick().await;
            if let Err(err) = task().await {
                warn!(task = name, error = %err, "periodic run failed");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn runs_repeatedly_and_survives_errors() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();

        let handle = spawn_periodic("test", Duration::from_secs(60), move || {
            let counter = counter.clone();
            async move {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                if n % 2 == 0 {
                    Err("simulated failure".to_string())
                } else {
                    Ok(())
                }
            }
        });

        tokio::time::sleep(Duration::from_secs(60 * 4 + 1)).await;
        handle.abort();

        // First tick fires immediately, then one per minute.
        assert!(runs.load(Ordering::SeqCst) >= 4);
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_ticks_are_skipped() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();

        let handle = spawn_periodic("slow", Duration::from_secs(10), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                // Each run spans several periods.
                tokio::time::sleep(Duration::from_secs(35)).await;
                Ok::<(), String>(())
            }
        });

        tokio::time::sleep(Duration::from_secs(80)).await;
        handle.abort();

        // Without skip semantics this would be ~8 runs; with them the
        // second run starts only after the first finishes.
        let observed = runs.load(Ordering::SeqCst);
        assert!(observed <= 3, "got {observed} runs");
    }
}
