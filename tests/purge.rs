use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use ti_purge::http::{HttpResponse, MockHttpClient};
use ti_purge::{
    Endpoints, Filter, IndicatorId, PurgeConfig, PurgeError, Purger, StopReason,
    ThreatIntelClient, Workspace,
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::fmt::MakeWriter;

/// Collects formatted log lines so tests can check the operator-facing output.
#[derive(Clone, Default)]
struct LogCapture(Arc<parking_lot::Mutex<Vec<u8>>>);

impl LogCapture {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }
}

impl std::io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = LogCapture;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

fn endpoints() -> Endpoints {
    Endpoints::new(Workspace::new("00000000-sub", "rg-security", "sentinel-prod").unwrap())
}

fn list_key() -> String {
    format!("POST {}", endpoints().query_indicators_path())
}

fn delete_key(id: &str) -> String {
    format!("DELETE {}", endpoints().indicator_path(&IndicatorId::from(id)))
}

fn listing(ids: &[&str]) -> HttpResponse {
    let value: Vec<_> = ids
        .iter()
        .map(|id| serde_json::json!({ "name": id, "kind": "indicator" }))
        .collect();
    HttpResponse::ok(serde_json::json!({ "value": value }).to_string())
}

fn mandiant_filter() -> Filter {
    Filter::builder()
        .sources(["Mandiant"])
        .confidence(0, 50)
        .page_size(10)
        .build()
        .unwrap()
}

fn test_config() -> PurgeConfig {
    PurgeConfig {
        cycle_delay_ms: 5,
        max_concurrency: None,
        status_log_interval_ms: None,
    }
}

fn purger(
    http_client: &MockHttpClient,
    config: PurgeConfig,
    shutdown_token: CancellationToken,
) -> Arc<Purger<MockHttpClient>> {
    Arc::new(Purger::new(
        ThreatIntelClient::new(http_client.clone(), endpoints()),
        mandiant_filter(),
        "test-token",
        config,
        shutdown_token,
    ))
}

#[test_log::test(tokio::test)]
async fn test_all_deletes_succeed_then_exhausted() {
    let http_client = MockHttpClient::new();
    http_client.add_response(&list_key(), Ok(listing(&["id1", "id2", "id3"])));
    http_client.add_response(&list_key(), Ok(listing(&[])));
    for id in ["id1", "id2", "id3"] {
        http_client.add_response(&delete_key(id), Ok(HttpResponse::ok("")));
    }

    let summary = purger(&http_client, test_config(), CancellationToken::new())
        .run()
        .await
        .unwrap();

    assert_eq!(summary.stop_reason, StopReason::Exhausted);
    assert_eq!(summary.cycles, 1);
    assert_eq!(summary.reported_deleted, 3);
    assert_eq!(summary.confirmed, 3);
    assert_eq!(summary.failed, 0);

    let deleted: HashSet<_> = http_client
        .calls_with_method("DELETE")
        .into_iter()
        .map(|call| call.path)
        .collect();
    let expected: HashSet<_> = ["id1", "id2", "id3"]
        .iter()
        .map(|id| endpoints().indicator_path(&IndicatorId::from(*id)))
        .collect();
    assert_eq!(deleted, expected);
    assert_eq!(http_client.calls_with_method("DELETE").len(), 3);
    assert_eq!(http_client.calls_with_method("POST").len(), 2);
}

#[test_log::test(tokio::test)]
async fn test_failed_delete_is_reported_and_over_counted() {
    let http_client = MockHttpClient::new();
    http_client.add_response(&list_key(), Ok(listing(&["id1", "id2"])));
    http_client.add_response(&list_key(), Ok(listing(&[])));
    http_client.add_response(&delete_key("id1"), Ok(HttpResponse::ok("")));
    http_client.add_response(&delete_key("id2"), Ok(HttpResponse::with_status(404)));

    let summary = purger(&http_client, test_config(), CancellationToken::new())
        .run()
        .await
        .unwrap();

    // The running total counts the whole listing, failures included.
    assert_eq!(summary.reported_deleted, 2);
    assert_eq!(summary.confirmed, 1);
    assert_eq!(summary.failed, 1);
    // The loop went on to list again after the partial failure.
    assert_eq!(http_client.calls_with_method("POST").len(), 2);
    assert_eq!(summary.stop_reason, StopReason::Exhausted);
}

#[test_log::test(tokio::test)]
async fn test_cycle_report_names_failed_indicator() {
    let http_client = MockHttpClient::new();
    http_client.add_response(&list_key(), Ok(listing(&["id1", "id2"])));
    http_client.add_response(&delete_key("id1"), Ok(HttpResponse::ok("")));
    http_client.add_response(&delete_key("id2"), Ok(HttpResponse::with_status(404)));

    let report = purger(&http_client, test_config(), CancellationToken::new())
        .run_cycle()
        .await
        .unwrap();

    assert_eq!(report.listed, 2);
    assert_eq!(report.deleted, 1);
    assert_eq!(report.failures.len(), 1);
    match &report.failures[0] {
        PurgeError::DeleteFailed { id, .. } => assert_eq!(id, &IndicatorId::from("id2")),
        other => panic!("unexpected failure: {other:?}"),
    }
    assert_eq!(report.failures[0].status(), Some(404));
}

#[test_log::test(tokio::test)]
async fn test_listing_401_is_fatal() {
    let http_client = MockHttpClient::new();
    http_client.add_response(&list_key(), Ok(HttpResponse::with_status(401)));

    let err = purger(&http_client, test_config(), CancellationToken::new())
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, PurgeError::UnexpectedStatus(401)));
    assert!(http_client.calls_with_method("DELETE").is_empty());
    assert_eq!(http_client.call_count(), 1);
}

#[test_log::test(tokio::test)]
async fn test_listing_failure_after_successful_cycle_is_fatal() {
    let http_client = MockHttpClient::new();
    http_client.add_response(&list_key(), Ok(listing(&["id1"])));
    http_client.add_response(&list_key(), Ok(HttpResponse::with_status(503)));
    http_client.add_response(&delete_key("id1"), Ok(HttpResponse::ok("")));

    let err = purger(&http_client, test_config(), CancellationToken::new())
        .run()
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(503));
    assert_eq!(http_client.calls_with_method("DELETE").len(), 1);
}

#[test_log::test(tokio::test)]
async fn test_empty_first_listing_stops_without_deletes() {
    let http_client = MockHttpClient::new();
    http_client.add_response(&list_key(), Ok(listing(&[])));

    let summary = purger(&http_client, test_config(), CancellationToken::new())
        .run()
        .await
        .unwrap();

    assert_eq!(summary.stop_reason, StopReason::Exhausted);
    assert_eq!(summary.cycles, 0);
    assert_eq!(summary.reported_deleted, 0);
    assert_eq!(http_client.call_count(), 1);
}

#[test_log::test(tokio::test)]
async fn test_cancelled_before_start_does_nothing() {
    let http_client = MockHttpClient::new();
    http_client.add_response(&list_key(), Ok(listing(&["id1"])));

    let shutdown_token = CancellationToken::new();
    shutdown_token.cancel();

    let purger = purger(&http_client, test_config(), shutdown_token);
    let first = purger.clone().run().await.unwrap();
    let second = purger.run().await.unwrap();

    for summary in [first, second] {
        assert_eq!(summary.stop_reason, StopReason::Cancelled);
        assert_eq!(summary.cycles, 0);
    }
    assert_eq!(http_client.call_count(), 0);
}

#[test_log::test(tokio::test)]
async fn test_cancel_mid_cycle_skips_unstarted_deletes() {
    let http_client = MockHttpClient::new();
    http_client.add_response(&list_key(), Ok(listing(&["id1", "id2"])));
    let triggers = vec![
        http_client.add_response_with_trigger(&delete_key("id1"), Ok(HttpResponse::ok(""))),
        http_client.add_response_with_trigger(&delete_key("id2"), Ok(HttpResponse::ok(""))),
    ];

    let config = PurgeConfig {
        max_concurrency: Some(1),
        ..test_config()
    };
    let shutdown_token = CancellationToken::new();
    let handle = tokio::spawn(purger(&http_client, config, shutdown_token.clone()).run());

    // Wait until exactly one delete is blocked on its trigger.
    let start = tokio::time::Instant::now();
    while http_client.in_flight_count() == 0 {
        assert!(start.elapsed() < Duration::from_secs(5), "delete never started");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    shutdown_token.cancel();
    tokio::time::sleep(Duration::from_millis(20)).await;
    // The cycle waits for the in-flight request before stopping.
    assert!(!handle.is_finished());

    drop(triggers);

    let summary = handle.await.unwrap().unwrap();
    assert_eq!(summary.stop_reason, StopReason::Cancelled);
    assert_eq!(summary.confirmed, 1);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.reported_deleted, 2);
    assert_eq!(http_client.calls_with_method("DELETE").len(), 1);
    assert_eq!(http_client.calls_with_method("POST").len(), 1);
}

#[test_log::test(tokio::test)]
async fn test_cancel_during_delay_stops_before_next_listing() {
    let http_client = MockHttpClient::new();
    http_client.add_response(&list_key(), Ok(listing(&["id1"])));
    http_client.add_response(&delete_key("id1"), Ok(HttpResponse::ok("")));

    let config = PurgeConfig {
        cycle_delay_ms: 60_000,
        ..test_config()
    };
    let shutdown_token = CancellationToken::new();
    let handle = tokio::spawn(purger(&http_client, config, shutdown_token.clone()).run());

    let start = tokio::time::Instant::now();
    while http_client.calls_with_method("DELETE").is_empty() {
        assert!(start.elapsed() < Duration::from_secs(5), "delete never issued");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    shutdown_token.cancel();

    let summary = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("purge did not stop during the delay")
        .unwrap()
        .unwrap();

    assert_eq!(summary.stop_reason, StopReason::Cancelled);
    assert_eq!(summary.cycles, 1);
    assert_eq!(http_client.calls_with_method("POST").len(), 1);
}

#[test_log::test(tokio::test)]
async fn test_runs_cycles_until_exhausted() {
    let http_client = MockHttpClient::new();
    http_client.add_response(&list_key(), Ok(listing(&["a", "b"])));
    http_client.add_response(&list_key(), Ok(listing(&["c"])));
    http_client.add_response(&list_key(), Ok(listing(&[])));
    for id in ["a", "b", "c"] {
        http_client.add_response(&delete_key(id), Ok(HttpResponse::ok("")));
    }

    let summary = purger(&http_client, test_config(), CancellationToken::new())
        .run()
        .await
        .unwrap();

    assert_eq!(summary.cycles, 2);
    assert_eq!(summary.reported_deleted, 3);
    assert_eq!(summary.confirmed, 3);
}

#[test_log::test(tokio::test)]
async fn test_listing_request_carries_filter_and_token() {
    let http_client = MockHttpClient::new();
    http_client.add_response(&list_key(), Ok(listing(&[])));

    purger(&http_client, test_config(), CancellationToken::new())
        .run()
        .await
        .unwrap();

    let call = &http_client.calls_with_method("POST")[0];
    assert_eq!(call.bearer_token, "test-token");
    let sent: Filter = serde_json::from_str(&call.body).unwrap();
    assert_eq!(sent, mandiant_filter());
    let raw: serde_json::Value = serde_json::from_str(&call.body).unwrap();
    assert_eq!(raw["sources"], serde_json::json!(["Mandiant"]));
    assert_eq!(raw["pageSize"], 10);
}

// A current-thread runtime keeps every delete task on the thread holding the
// scoped subscriber.
#[tokio::test]
async fn test_console_output_reports_totals_failures_and_exhaustion() {
    let capture = LogCapture::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(capture.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::INFO)
        .finish();
    let _default = tracing::subscriber::set_default(subscriber);

    let http_client = MockHttpClient::new();
    http_client.add_response(&list_key(), Ok(listing(&["id1", "id2"])));
    http_client.add_response(&list_key(), Ok(listing(&[])));
    http_client.add_response(&delete_key("id1"), Ok(HttpResponse::ok("")));
    http_client.add_response(&delete_key("id2"), Ok(HttpResponse::with_status(404)));

    let summary = purger(&http_client, test_config(), CancellationToken::new())
        .run()
        .await
        .unwrap();
    assert_eq!(summary.confirmed, 1);

    let output = capture.contents();
    assert!(output.contains("indicator=id1"), "{output}");
    assert!(!output.contains("indicator=id2"), "{output}");
    assert!(
        output.contains("failed to delete indicator with ID id2: Unexpected status code: 404"),
        "{output}"
    );
    // The running total counts the failed delete too.
    assert!(output.contains("Deleted 2 indicators."), "{output}");
    assert!(output.contains("No more indicators to delete."), "{output}");
}
