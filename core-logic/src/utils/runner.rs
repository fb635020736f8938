use futures::stream::{self, StreamExt};
use std::future::Future;
use std::time::Instant;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunStats {
    pub success: u64,
    pub failed: u64,
    /// Items never started because shutdown was requested first.
    pub skipped: u64,
}

impl RunStats {
    pub fn total(&self) -> u64 {
        self.success + self.failed + self.skipped
    }
}

pub struct WorkerRunner;

impl WorkerRunner {
    /// Token cancelled on Ctrl+C.
    ///
    /// Loops check it before starting the next attempt; work already in
    /// flight runs to its own timeout.
    pub fn shutdown_token() -> CancellationToken {
        let token = CancellationToken::new();
        let cloned_token = token.clone();

        tokio::spawn(async move {
            match signal::ctrl_c().await {
                Ok(()) => {
                    warn!("🛑 Received Ctrl+C. Finishing in-flight requests, starting no new ones...");
                    cloned_token.cancel();
                }
                Err(err) => {
                    error!("Unable to listen for shutdown signal: {}", err);
                }
            }
        });

        token
    }

    /// Runs `job` over every item with at most `concurrency` jobs in flight.
    ///
    /// `job` receives the item's position and returns whether it succeeded.
    /// Once `token` is cancelled, items not yet started are counted as skipped.
    pub async fn run_bounded<I, T, F, Fut>(
        items: I,
        concurrency: usize,
        token: &CancellationToken,
        job: F,
    ) -> RunStats
    where
        I: IntoIterator<Item = T>,
        F: Fn(usize, T) -> Fut,
        Fut: Future<Output = bool>,
    {
        let start_time = Instant::now();
        let job = &job;

        let results: Vec<Option<bool>> = stream::iter(items.into_iter().enumerate())
            .map(|(idx, item)| async move {
                if token.is_cancelled() {
                    return None;
                }
                Some(job(idx, item).await)
            })
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await;

        let mut stats = RunStats::default();
        for r in results {
            match r {
                Some(true) => stats.success += 1,
                Some(false) => stats.failed += 1,
                None => stats.skipped += 1,
            }
        }

        let rate = if stats.success + stats.failed > 0 {
            stats.success as f64 / (stats.success + stats.failed) as f64 * 100.0
        } else {
            0.0
        };
        info!(
            "Total Time: {:.1}s | Success: {} | Fail: {} | Skipped: {} | Success Rate: {:.2}%",
            start_time.elapsed().as_secs_f64(),
            stats.success,
            stats.failed,
            stats.skipped,
            rate
        );

        stats
    }
}
