use crate::core::error::{FxError, Result};
use crate::core::rates::{ExchangeSnapshot, RateSource};
use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

const JOB_QUEUE_DEPTH: usize = 8;

/// A base currency whose refresh failed.
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshFailure {
    pub base_currency: String,
    pub reason: String,
}

/// Outcome of one refresh batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RefreshReport {
    pub refreshed: Vec<ExchangeSnapshot>,
    pub failed: Vec<RefreshFailure>,
}

struct RefreshJob {
    snapshots: Vec<ExchangeSnapshot>,
    reply: oneshot::Sender<RefreshReport>,
}

/// Runs refresh batches on its own task. Only owned snapshot lists go in and
/// owned reports come out.
pub struct RefreshWorker {
    jobs: mpsc::Sender<RefreshJob>,
    task: JoinHandle<()>,
}

impl RefreshWorker {
    pub fn spawn(source: Arc<dyn RateSource>) -> Self {
        let (jobs, rx) = mpsc::channel(JOB_QUEUE_DEPTH);
        let task = tokio::spawn(run(source, rx));
        Self { jobs, task }
    }

    /// Re-fetches every snapshot's base currency concurrently and waits for
    /// all of them. Individual failures end up in `RefreshReport::failed`.
    pub async fn refresh_all(&self, snapshots: Vec<ExchangeSnapshot>) -> Result<RefreshReport> {
        let (reply, response) = oneshot::channel();
        self.jobs
            .send(RefreshJob { snapshots, reply })
            .await
            .map_err(|_| FxError::WorkerUnavailable)?;
        response.await.map_err(|_| FxError::WorkerUnavailable)
    }
}

impl Drop for RefreshWorker {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run(source: Arc<dyn RateSource>, mut jobs: mpsc::Receiver<RefreshJob>) {
    while let Some(job) = jobs.recv().await {
        let report = refresh_batch(source.as_ref(), &job.snapshots).await;
        if job.reply.send(report).is_err() {
            debug!("Refresh requester went away before the batch finished");
        }
    }
    debug!("Refresh worker stopped");
}

pub async fn refresh_batch(
    source: &dyn RateSource,
    snapshots: &[ExchangeSnapshot],
) -> RefreshReport {
    let fetches = snapshots.iter().map(|snapshot| {
        let base = snapshot.base_currency().to_string();
        async move {
            let result = source.fetch_all(&base).await;
            (base, result)
        }
    });

    let mut report = RefreshReport::default();
    for (base_currency, result) in join_all(fetches).await {
        match result {
            Ok(snapshot) => report.refreshed.push(snapshot),
            Err(e) => {
                warn!(base = %base_currency, error = %e, "Refresh failed, keeping cached rates");
                report.failed.push(RefreshFailure {
                    base_currency,
                    reason: e.to_string(),
                });
            }
        }
    }
    debug!(
        refreshed = report.refreshed.len(),
        failed = report.failed.len(),
        "Refresh batch finished"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::dates::DateWindow;
    use crate::core::rates::{CurrencyDirectory, TimeSeries};
    use async_trait::async_trait;
    use std::time::Duration;
    use tokio::sync::Barrier;

    /// Fails for "XXX"; otherwise waits at the barrier so that a sequential
    /// implementation would never finish.
    struct BarrierSource {
        barrier: Barrier,
    }

    #[async_trait]
    impl RateSource for BarrierSource {
        async fn fetch_all(&self, base: &str) -> Result<ExchangeSnapshot> {
            if base == "XXX" {
                return Err(FxError::NetworkFailure("HTTP error: 404".to_string()));
            }
            self.barrier.wait().await;
            ExchangeSnapshot::new(base, [("JPY", 150.0)])
        }

        async fn fetch_time_series(
            &self,
            _base: &str,
            _quote: &str,
            _window: &DateWindow,
        ) -> Result<TimeSeries> {
            unimplemented!()
        }

        async fn convert(&self, _from: &str, _to: &str, _amount: f64) -> Result<f64> {
            unimplemented!()
        }

        async fn fetch_currencies(&self) -> Result<CurrencyDirectory> {
            unimplemented!()
        }
    }

    fn stale(base: &str) -> ExchangeSnapshot {
        ExchangeSnapshot::new(base, [("JPY", 1.0)]).unwrap()
    }

    #[tokio::test]
    async fn test_refresh_all_runs_concurrently() {
        let worker = RefreshWorker::spawn(Arc::new(BarrierSource {
            barrier: Barrier::new(3),
        }));

        let report = tokio::time::timeout(
            Duration::from_secs(5),
            worker.refresh_all(vec![stale("USD"), stale("EUR"), stale("MYR")]),
        )
        .await
        .expect("fetches did not run concurrently")
        .unwrap();

        assert_eq!(report.refreshed.len(), 3);
        assert!(report.failed.is_empty());
        assert!(report.refreshed.iter().all(|s| s.rate("JPY") == Some(150.0)));
    }

    #[tokio::test]
    async fn test_refresh_all_tolerates_partial_failure() {
        let worker = RefreshWorker::spawn(Arc::new(BarrierSource {
            barrier: Barrier::new(2),
        }));

        let report = worker
            .refresh_all(vec![stale("USD"), stale("XXX"), stale("EUR")])
            .await
            .unwrap();

        let mut bases: Vec<_> = report
            .refreshed
            .iter()
            .map(|s| s.base_currency().to_string())
            .collect();
        bases.sort();
        assert_eq!(bases, vec!["EUR", "USD"]);
        assert_eq!(
            report.failed,
            vec![RefreshFailure {
                base_currency: "XXX".to_string(),
                reason: "Network failure: HTTP error: 404".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn test_refresh_all_empty_batch() {
        let worker = RefreshWorker::spawn(Arc::new(BarrierSource {
            barrier: Barrier::new(1),
        }));

        let report = worker.refresh_all(Vec::new()).await.unwrap();
        assert_eq!(report, RefreshReport::default());
    }

    #[tokio::test]
    async fn test_worker_handles_successive_batches() {
        let worker = RefreshWorker::spawn(Arc::new(BarrierSource {
            barrier: Barrier::new(1),
        }));

        for _ in 0..3 {
            let report = worker.refresh_all(vec![stale("GBP")]).await.unwrap();
            assert_eq!(report.refreshed.len(), 1);
        }
    }
}
