use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde_json::json;
use tokio::sync::Notify;

use super::*;
use crate::net::api::ErrorCode;
use crate::state::trace::View;

// =============================================================
// Fake API
// =============================================================

#[derive(Default)]
struct FakeApi {
    /// Detail fetches for these ids block until the gate is opened.
    gates: Mutex<HashMap<String, Arc<Notify>>>,
    detail_calls: AtomicUsize,
    catalog_calls: AtomicUsize,
}

impl FakeApi {
    fn gate(&self, trace_id: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.gates.lock().unwrap().insert(trace_id.to_owned(), Arc::clone(&gate));
        gate
    }
}

fn detail(id: &str) -> TraceDetail {
    TraceDetail::from_json(json!({
        "id": id,
        "duration_ms": 100,
        "span_tree": [{ "id": format!("{id}-root"), "kind": "agent", "children": [{ "id": format!("{id}-llm"), "kind": "llm" }] }]
    }))
    .unwrap()
}

#[async_trait::async_trait]
impl TraceApi for FakeApi {
    async fn list_traces(&self, filters: &ListFilters) -> Result<Vec<TraceSummary>, FetchError> {
        self.catalog_calls.fetch_add(1, Ordering::SeqCst);
        if filters.status.as_deref() == Some("boom") {
            panic!("catalog backend crashed");
        }
        let traces = (0..filters.limit.min(3))
            .map(|i| serde_json::from_value(json!({ "id": format!("t-{i}"), "name": "run" })).unwrap())
            .collect();
        Ok(traces)
    }

    async fn get_trace(&self, trace_id: &str) -> Result<TraceDetail, FetchError> {
        self.detail_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.gates.lock().unwrap().get(trace_id).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        match trace_id {
            "missing" => Err(FetchError::NotFound(format!("trace {trace_id}"))),
            "flaky" => Err(FetchError::Transient("status 503".to_owned())),
            "boom" => panic!("detail backend crashed"),
            _ => Ok(detail(trace_id)),
        }
    }

    async fn get_tracing_stats(&self, window_days: u32) -> Result<TracingStats, FetchError> {
        Ok(TracingStats {
            total_traces: u64::from(window_days),
            ..TracingStats::default()
        })
    }
}

fn session() -> (TraceSession<FakeApi>, Arc<FakeApi>) {
    let api = Arc::new(FakeApi::default());
    (TraceSession::start(Arc::clone(&api), &PendingTraceSelection::new()), api)
}

// =============================================================
// Detail loading
// =============================================================

#[tokio::test]
async fn select_and_settle_loads_trace() {
    let (mut session, api) = session();
    assert!(session.select_trace("a"));
    session.settle().await;

    assert_eq!(session.controller().loaded().unwrap().trace_id(), "a");
    assert_eq!(api.detail_calls.load(Ordering::SeqCst), 1);
    assert!(!session.in_flight());
}

#[tokio::test]
async fn later_selection_wins_over_slow_earlier_one() {
    let (mut session, api) = session();
    let gate_x = api.gate("x");

    assert!(session.select_trace("x"));
    tokio::task::yield_now().await;
    assert!(session.select_trace("y"));
    gate_x.notify_one();
    session.settle().await;

    assert_eq!(session.controller().loaded().unwrap().trace_id(), "y");
}

#[tokio::test]
async fn queued_stale_detail_is_discarded() {
    let (mut session, _api) = session();
    assert!(session.select_trace("x"));
    let stale = session.controller().pending_detail().cloned().unwrap();
    assert!(session.select_trace("y"));

    session
        .tx
        .send(Completion::Detail(stale, Ok(detail("x"))))
        .unwrap();
    assert_eq!(session.next_completion().await, Some(false));
    session.settle().await;
    assert_eq!(session.controller().loaded().unwrap().trace_id(), "y");
}

#[tokio::test]
async fn reselecting_loaded_trace_does_not_refetch() {
    let (mut session, api) = session();
    session.select_trace("a");
    session.settle().await;

    assert!(!session.select_trace("a"));
    assert_eq!(api.detail_calls.load(Ordering::SeqCst), 1);
    assert_eq!(session.next_completion().await, None);
}

#[tokio::test]
async fn back_abandons_in_flight_detail() {
    let (mut session, api) = session();
    let gate = api.gate("slow");
    session.select_trace("slow");
    session.back();
    gate.notify_one();

    assert!(!session.in_flight());
    assert_eq!(session.next_completion().await, None);
    assert_eq!(session.controller().view(), View::Catalog);
}

#[tokio::test]
async fn failed_detail_can_be_retried() {
    let (mut session, api) = session();
    session.select_trace("flaky");
    session.settle().await;

    let failed = session.controller().detail_error().unwrap();
    assert!(failed.error.retryable());
    assert_eq!(session.controller().view(), View::Catalog);

    assert!(session.retry_detail());
    session.settle().await;
    assert_eq!(api.detail_calls.load(Ordering::SeqCst), 2);
    assert!(session.controller().detail_error().is_some());
}

#[tokio::test]
async fn missing_trace_records_not_found() {
    let (mut session, _api) = session();
    session.select_trace("missing");
    session.settle().await;
    assert!(session.controller().detail_error().unwrap().error.is_not_found());
}

#[tokio::test]
async fn panicking_detail_fetch_settles_as_transient() {
    let (mut session, _api) = session();
    assert!(session.select_trace("boom"));
    session.settle().await;

    assert!(!session.in_flight());
    let failed = session.controller().detail_error().unwrap();
    assert_eq!(failed.trace_id, "boom");
    assert!(matches!(failed.error, FetchError::Transient(_)));
    assert!(failed.error.retryable());
}

#[tokio::test]
async fn panicking_detail_fetch_does_not_block_next_selection() {
    let (mut session, _api) = session();
    session.select_trace("boom");
    session.settle().await;

    assert!(session.select_trace("b"));
    session.settle().await;
    assert_eq!(session.controller().loaded().unwrap().trace_id(), "b");
}

#[tokio::test]
async fn start_opens_preselected_trace() {
    let api = Arc::new(FakeApi::default());
    let token = PendingTraceSelection::new();
    token.deposit("pre");

    let mut session = TraceSession::start(Arc::clone(&api), &token);
    assert!(session.in_flight());
    session.settle().await;
    assert_eq!(session.controller().loaded().unwrap().trace_id(), "pre");
}

// =============================================================
// Catalog and stats
// =============================================================

#[tokio::test]
async fn refresh_catalog_populates_list() {
    let (mut session, api) = session();
    session.refresh_catalog(ListFilters::with_limit(2));
    session.settle().await;

    assert_eq!(session.controller().catalog().len(), 2);
    assert_eq!(api.catalog_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn panicking_catalog_fetch_settles_as_transient() {
    let (mut session, _api) = session();
    session.refresh_catalog(ListFilters {
        limit: 5,
        status: Some("boom".to_owned()),
    });
    session.settle().await;

    assert!(!session.controller().is_catalog_loading());
    assert!(matches!(session.controller().catalog_error(), Some(FetchError::Transient(_))));
}

#[tokio::test]
async fn drain_applies_only_ready_completions() {
    let (mut session, _api) = session();
    assert_eq!(session.drain(), 0);

    session.refresh_catalog(ListFilters::default());
    while session.controller().is_catalog_loading() {
        tokio::task::yield_now().await;
        session.drain();
    }
    assert_eq!(session.controller().catalog().len(), 3);
}

#[tokio::test]
async fn stats_passes_window_through() {
    let (session, _api) = session();
    assert_eq!(session.stats(30).await.unwrap().total_traces, 30);
}
