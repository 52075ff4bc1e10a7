//! Purge loop: list a page of indicators, delete them all concurrently, repeat.
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::api::ThreatIntelClient;
use crate::domain::Filter;
use crate::error::{PurgeError, Result};
use crate::http::HttpClient;

pub mod types;

pub use types::{CycleReport, DeleteOutcome, PurgeSummary, StopReason};

/// Configuration for the purge loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurgeConfig {
    /// How long to sleep between cycles
    pub cycle_delay_ms: u64,

    /// Maximum number of deletes in flight at once. `None` fans out one task per
    /// listed indicator with no cap; the page size then bounds concurrency.
    pub max_concurrency: Option<usize>,

    /// Interval for logging the number of deletes in flight (milliseconds)
    /// Set to None to disable periodic status logging
    pub status_log_interval_ms: Option<u64>,
}

impl Default for PurgeConfig {
    fn default() -> Self {
        Self {
            cycle_delay_ms: 1000,
            max_concurrency: None,
            status_log_interval_ms: Some(2000),
        }
    }
}

/// Repeatedly lists and deletes indicators until none are left or shutdown fires.
///
/// Shutdown is observed at the top of every cycle, during the inter-cycle delay,
/// and by each delete task just before it issues its request. A request already
/// sent is always allowed to finish.
pub struct Purger<H: HttpClient> {
    client: Arc<ThreatIntelClient<H>>,
    filter: Filter,
    token: Arc<str>,
    config: PurgeConfig,
    semaphore: Option<Arc<Semaphore>>,
    requests_in_flight: Arc<AtomicUsize>,
    shutdown_token: CancellationToken,
}

impl<H> Purger<H>
where
    H: HttpClient + 'static,
{
    pub fn new(
        client: ThreatIntelClient<H>,
        filter: Filter,
        token: impl Into<Arc<str>>,
        config: PurgeConfig,
        shutdown_token: CancellationToken,
    ) -> Self {
        let semaphore = config
            .max_concurrency
            .map(|limit| Arc::new(Semaphore::new(limit.max(1))));
        Self {
            client: Arc::new(client),
            filter,
            token: token.into(),
            config,
            semaphore,
            requests_in_flight: Arc::new(AtomicUsize::new(0)),
            shutdown_token,
        }
    }

    /// Run the purge loop.
    ///
    /// Returns once a listing comes back empty or the shutdown token has fired
    /// and the current cycle has finished. A failed listing is returned as an
    /// error immediately; failed deletes are only reported.
    #[tracing::instrument(skip(self), fields(workspace = %self.client.endpoints().workspace().name))]
    pub async fn run(self: Arc<Self>) -> Result<PurgeSummary> {
        tracing::info!(
            sources = ?self.filter.sources(),
            min_confidence = self.filter.min_confidence(),
            max_confidence = self.filter.max_confidence(),
            page_size = self.filter.page_size(),
            "Purge starting"
        );

        let status_handle = self.config.status_log_interval_ms.map(|interval_ms| {
            let requests_in_flight = self.requests_in_flight.clone();
            let shutdown_token = self.shutdown_token.clone();
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(Duration::from_millis(interval_ms));
                loop {
                    tokio::select! {
                        _ = interval.tick() => {
                            tracing::debug!(
                                requests_in_flight = requests_in_flight.load(Ordering::Relaxed),
                                "Purge status"
                            );
                        }
                        _ = shutdown_token.cancelled() => break,
                    }
                }
            })
        });
        let _status_guard = scopeguard::guard(status_handle, |handle| {
            if let Some(handle) = handle {
                handle.abort();
            }
        });

        let mut summary = PurgeSummary::new();

        let stop_reason = loop {
            if self.shutdown_token.is_cancelled() {
                tracing::info!("Shutdown signal received, stopping purge");
                break StopReason::Cancelled;
            }

            let report = self.run_cycle().await?;

            if report.is_empty() {
                tracing::info!("No more indicators to delete.");
                break StopReason::Exhausted;
            }

            for failure in &report.failures {
                tracing::warn!(error = %failure, status = ?failure.status(), "Delete failed");
            }

            summary.absorb(&report);
            tracing::info!(
                cycle = summary.cycles,
                listed = report.listed,
                failed = report.failures.len(),
                skipped = report.skipped,
                "Deleted {} indicators.",
                summary.reported_deleted
            );

            tokio::select! {
                _ = tokio::time::sleep(Duration::from_millis(self.config.cycle_delay_ms)) => {},
                _ = self.shutdown_token.cancelled() => {}
            }
        };

        summary.stop_reason = stop_reason;
        Ok(summary)
    }

    /// Run a single cycle: one listing, then one delete task per listed indicator.
    ///
    /// Waits for every task before returning, whether or not shutdown fired.
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let ids = self.client.list_indicators(&self.filter, &self.token).await?;

        let mut report = CycleReport {
            listed: ids.len(),
            ..Default::default()
        };
        if ids.is_empty() {
            return Ok(report);
        }

        tracing::debug!(count = ids.len(), "Dispatching deletes");

        // Each task reports at most one failure, so this never blocks a sender.
        let (failure_tx, mut failure_rx) = mpsc::channel::<PurgeError>(ids.len());
        let mut join_set: JoinSet<DeleteOutcome> = JoinSet::new();

        for id in ids {
            let client = self.client.clone();
            let token = self.token.clone();
            let semaphore = self.semaphore.clone();
            let shutdown_token = self.shutdown_token.clone();
            let requests_in_flight = self.requests_in_flight.clone();
            let failure_tx = failure_tx.clone();

            join_set.spawn(async move {
                let _permit = match semaphore {
                    // The semaphore is never closed, so acquisition cannot fail.
                    Some(semaphore) => semaphore.acquire_owned().await.ok(),
                    None => None,
                };

                if shutdown_token.is_cancelled() {
                    tracing::debug!(indicator = %id, "Shutdown requested, skipping delete");
                    return DeleteOutcome::Skipped;
                }

                requests_in_flight.fetch_add(1, Ordering::Relaxed);
                let _guard = scopeguard::guard((), |_| {
                    requests_in_flight.fetch_sub(1, Ordering::Relaxed);
                });

                match client.delete_indicator(&id, &token).await {
                    Ok(()) => DeleteOutcome::Deleted,
                    Err(e) => {
                        if let Err(send_error) = failure_tx.send(e).await {
                            tracing::error!(error = %send_error.0, "Failed to report delete failure");
                        }
                        DeleteOutcome::Failed
                    }
                }
            });
        }
        drop(failure_tx);

        while let Some(result) = join_set.join_next().await {
            match result {
                Ok(outcome) => report.record(outcome),
                Err(join_error) => {
                    tracing::error!(error = %join_error, "Delete task panicked");
                    report.failures.push(PurgeError::Other(anyhow::anyhow!(
                        "delete task panicked: {}",
                        join_error
                    )));
                }
            }
        }

        while let Ok(failure) = failure_rx.try_recv() {
            report.failures.push(failure);
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Endpoints, IndicatorId, Workspace};
    use crate::http::{HttpResponse, MockHttpClient};

    fn endpoints() -> Endpoints {
        Endpoints::new(Workspace::new("sub", "rg", "ws").unwrap())
    }

    fn purger(
        mock: &MockHttpClient,
        config: PurgeConfig,
        shutdown: CancellationToken,
    ) -> Purger<MockHttpClient> {
        Purger::new(
            ThreatIntelClient::new(mock.clone(), endpoints()),
            Filter::builder().build().unwrap(),
            "token",
            config,
            shutdown,
        )
    }

    fn fast_config() -> PurgeConfig {
        PurgeConfig {
            cycle_delay_ms: 1,
            max_concurrency: None,
            status_log_interval_ms: None,
        }
    }

    fn listing(ids: &[&str]) -> HttpResponse {
        let value: Vec<_> = ids.iter().map(|id| serde_json::json!({ "name": id })).collect();
        HttpResponse::ok(serde_json::json!({ "value": value }).to_string())
    }

    #[tokio::test]
    async fn test_cycle_fans_out_one_delete_per_id() {
        let mock = MockHttpClient::new();
        let endpoints = endpoints();
        mock.add_response(
            &format!("POST {}", endpoints.query_indicators_path()),
            Ok(listing(&["a", "b", "c", "d"])),
        );
        for id in ["a", "b", "c", "d"] {
            mock.add_response(
                &format!("DELETE {}", endpoints.indicator_path(&IndicatorId::from(id))),
                Ok(HttpResponse::ok("")),
            );
        }

        let report = purger(&mock, fast_config(), CancellationToken::new())
            .run_cycle()
            .await
            .unwrap();

        assert_eq!(report.listed, 4);
        assert_eq!(report.deleted, 4);
        assert!(report.failures.is_empty());

        let mut paths: Vec<_> = mock
            .calls_with_method("DELETE")
            .into_iter()
            .map(|call| call.path)
            .collect();
        paths.sort();
        paths.dedup();
        assert_eq!(paths.len(), 4);
    }

    #[tokio::test]
    async fn test_cycle_with_empty_listing_issues_no_deletes() {
        let mock = MockHttpClient::new();
        mock.add_response(
            &format!("POST {}", endpoints().query_indicators_path()),
            Ok(listing(&[])),
        );

        let report = purger(&mock, fast_config(), CancellationToken::new())
            .run_cycle()
            .await
            .unwrap();

        assert!(report.is_empty());
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn test_cycle_after_shutdown_skips_every_delete() {
        let mock = MockHttpClient::new();
        mock.add_response(
            &format!("POST {}", endpoints().query_indicators_path()),
            Ok(listing(&["a", "b"])),
        );
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        let report = purger(&mock, fast_config(), shutdown).run_cycle().await.unwrap();

        assert_eq!(report.listed, 2);
        assert_eq!(report.skipped, 2);
        assert_eq!(report.deleted, 0);
        assert!(mock.calls_with_method("DELETE").is_empty());
    }

    #[tokio::test]
    async fn test_bounded_concurrency_limits_in_flight() {
        let mock = MockHttpClient::new();
        let endpoints = endpoints();
        mock.add_response(
            &format!("POST {}", endpoints.query_indicators_path()),
            Ok(listing(&["a", "b", "c"])),
        );
        let mut triggers = Vec::new();
        for id in ["a", "b", "c"] {
            triggers.push(mock.add_response_with_trigger(
                &format!("DELETE {}", endpoints.indicator_path(&IndicatorId::from(id))),
                Ok(HttpResponse::ok("")),
            ));
        }

        let config = PurgeConfig {
            max_concurrency: Some(1),
            ..fast_config()
        };
        let purger = Arc::new(purger(&mock, config, CancellationToken::new()));
        let handle = tokio::spawn({
            let purger = purger.clone();
            async move { purger.run_cycle().await }
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(mock.in_flight_count(), 1);
        assert!(!handle.is_finished());

        drop(triggers);

        let report = handle.await.unwrap().unwrap();
        assert_eq!(report.deleted, 3);
        assert_eq!(mock.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn test_unbounded_fan_out_runs_every_delete_at_once() {
        let mock = MockHttpClient::new();
        let endpoints = endpoints();
        let ids: Vec<String> = (0..10).map(|i| format!("id{i}")).collect();
        let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        mock.add_response(
            &format!("POST {}", endpoints.query_indicators_path()),
            Ok(listing(&id_refs)),
        );
        let mut triggers = Vec::new();
        for id in &ids {
            triggers.push(mock.add_response_with_trigger(
                &format!("DELETE {}", endpoints.indicator_path(&IndicatorId::from(id.as_str()))),
                Ok(HttpResponse::ok("")),
            ));
        }

        let purger = Arc::new(purger(&mock, fast_config(), CancellationToken::new()));
        let handle = tokio::spawn({
            let purger = purger.clone();
            async move { purger.run_cycle().await }
        });

        let start = tokio::time::Instant::now();
        while mock.in_flight_count() < ids.len() {
            assert!(
                start.elapsed() < Duration::from_secs(5),
                "only {} deletes in flight",
                mock.in_flight_count()
            );
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(mock.in_flight_count(), 10);
        assert!(!handle.is_finished());

        drop(triggers);

        let report = handle.await.unwrap().unwrap();
        assert_eq!(report.deleted, 10);
        assert_eq!(mock.in_flight_count(), 0);
    }
}
