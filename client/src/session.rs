//! Async driver around [`TraceController`].
//!
//! DESIGN
//! ======
//! Each fetch runs on its own tokio task and reports back over an unbounded
//! channel. Issuing a new detail fetch aborts the previous task, and any reply
//! that was already queued is rejected by the controller's request check, so
//! only the latest selection can land. A task that dies without reporting
//! (panic) is noticed through its join handle and resolves its request as a
//! transient failure, so `settle` always returns.
//!
//! ERROR HANDLING
//! ==============
//! Fetch failures are never returned from here; they are recorded on the
//! controller (`detail_error`, `catalog_error`) for the view to render.

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;

use std::sync::Arc;

use spans::{TraceDetail, TraceSummary, TracingStats};
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};

use crate::net::api::{FetchError, ListFilters, TraceApi};
use crate::state::navigation::PendingTraceSelection;
use crate::state::trace::{CatalogRequest, DetailRequest, TraceController};

/// A finished fetch, tagged with the request that issued it.
#[derive(Debug)]
pub(crate) enum Completion {
    Catalog(CatalogRequest, Result<Vec<TraceSummary>, FetchError>),
    Detail(DetailRequest, Result<TraceDetail, FetchError>),
}

/// A spawned fetch task and the request it answers.
struct InFlight<R> {
    request: R,
    task: JoinHandle<()>,
}

pub struct TraceSession<A: TraceApi + 'static> {
    controller: TraceController,
    api: Arc<A>,
    tx: mpsc::UnboundedSender<Completion>,
    rx: mpsc::UnboundedReceiver<Completion>,
    detail_task: Option<InFlight<DetailRequest>>,
    catalog_task: Option<InFlight<CatalogRequest>>,
}

impl<A: TraceApi + 'static> TraceSession<A> {
    /// Create a session, opening the pre-selected trace if one is pending.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(api: Arc<A>, token: &PendingTraceSelection) -> Self {
        let (controller, request) = TraceController::start(token);
        let (tx, rx) = mpsc::unbounded_channel();
        let mut session = Self {
            controller,
            api,
            tx,
            rx,
            detail_task: None,
            catalog_task: None,
        };
        if let Some(request) = request {
            session.spawn_detail(request);
        }
        session
    }

    #[must_use]
    pub fn controller(&self) -> &TraceController {
        &self.controller
    }

    /// Direct access for synchronous UI actions (span selection, collapse,
    /// filter text). Fetch-issuing actions go through the session methods.
    pub fn controller_mut(&mut self) -> &mut TraceController {
        &mut self.controller
    }

    /// Fetch the catalog, superseding any catalog fetch in flight.
    pub fn refresh_catalog(&mut self, filters: ListFilters) {
        let request = self.controller.begin_catalog_load(filters);
        if let Some(fetch) = self.catalog_task.take() {
            fetch.task.abort();
        }

        let api = Arc::clone(&self.api);
        let tx = self.tx.clone();
        let sent = request.clone();
        let task = tokio::spawn(async move {
            let result = api.list_traces(&sent.filters).await;
            let _ = tx.send(Completion::Catalog(sent, result));
        });
        self.catalog_task = Some(InFlight { request, task });
    }

    /// Open a trace. Returns `true` when a fetch was issued.
    pub fn select_trace(&mut self, trace_id: impl Into<String>) -> bool {
        match self.controller.select_trace(trace_id) {
            Some(request) => {
                self.spawn_detail(request);
                true
            }
            None => false,
        }
    }

    /// Re-issue the last failed detail fetch. Returns `true` when one was issued.
    pub fn retry_detail(&mut self) -> bool {
        match self.controller.retry_detail() {
            Some(request) => {
                self.spawn_detail(request);
                true
            }
            None => false,
        }
    }

    /// Return to the catalog, abandoning any in-flight detail fetch.
    pub fn back(&mut self) {
        if let Some(fetch) = self.detail_task.take() {
            fetch.task.abort();
        }
        self.controller.back();
    }

    /// Whether the controller is still waiting on any fetch.
    #[must_use]
    pub fn in_flight(&self) -> bool {
        self.controller.is_detail_loading() || self.controller.is_catalog_loading()
    }

    /// Wait for the next completion and apply it.
    ///
    /// Returns `None` without waiting when nothing is in flight, otherwise
    /// whether the completion was current (`false` for a discarded stale one).
    pub async fn next_completion(&mut self) -> Option<bool> {
        loop {
            if !self.in_flight() {
                return None;
            }
            // Queued replies first: a task that exited cleanly has already sent.
            tokio::select! {
                biased;
                completion = self.rx.recv() => return completion.map(|completion| self.apply(completion)),
                exit = task_exit(&mut self.detail_task) => {
                    let Some(fetch) = self.detail_task.take() else { continue };
                    if let Err(e) = exit {
                        tracing::error!(trace_id = %fetch.request.trace_id, error = %e, "detail fetch task died");
                        return Some(self.apply(Completion::Detail(fetch.request, Err(task_failure(&e)))));
                    }
                }
                exit = task_exit(&mut self.catalog_task) => {
                    let Some(fetch) = self.catalog_task.take() else { continue };
                    if let Err(e) = exit {
                        tracing::error!(error = %e, "catalog fetch task died");
                        return Some(self.apply(Completion::Catalog(fetch.request, Err(task_failure(&e)))));
                    }
                }
            }
        }
    }

    /// Apply completions until nothing is in flight.
    pub async fn settle(&mut self) {
        while self.next_completion().await.is_some() {}
    }

    /// Apply every completion already queued without waiting. Returns how many
    /// were current.
    pub fn drain(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(completion) = self.rx.try_recv() {
            if self.apply(completion) {
                applied += 1;
            }
        }
        applied
    }

    /// Headline statistics; read-only and independent of navigation state.
    ///
    /// # Errors
    ///
    /// Propagates the API's [`FetchError`].
    pub async fn stats(&self, window_days: u32) -> Result<TracingStats, FetchError> {
        self.api.get_tracing_stats(window_days).await
    }

    fn spawn_detail(&mut self, request: DetailRequest) {
        if let Some(fetch) = self.detail_task.take() {
            fetch.task.abort();
        }

        let api = Arc::clone(&self.api);
        let tx = self.tx.clone();
        let sent = request.clone();
        let task = tokio::spawn(async move {
            let result = api.get_trace(&sent.trace_id).await;
            let _ = tx.send(Completion::Detail(sent, result));
        });
        self.detail_task = Some(InFlight { request, task });
    }

    fn apply(&mut self, completion: Completion) -> bool {
        match completion {
            Completion::Catalog(request, result) => self.controller.resolve_catalog(&request, result),
            Completion::Detail(request, result) => self.controller.resolve_detail(&request, result),
        }
    }
}

impl<A: TraceApi + 'static> Drop for TraceSession<A> {
    fn drop(&mut self) {
        if let Some(fetch) = self.detail_task.take() {
            fetch.task.abort();
        }
        if let Some(fetch) = self.catalog_task.take() {
            fetch.task.abort();
        }
    }
}

/// Resolves when the tracked task exits; never resolves when nothing is tracked.
async fn task_exit<R>(slot: &mut Option<InFlight<R>>) -> Result<(), JoinError> {
    match slot {
        Some(fetch) => (&mut fetch.task).await,
        None => std::future::pending().await,
    }
}

fn task_failure(error: &JoinError) -> FetchError {
    FetchError::Transient(format!("fetch task failed: {error}"))
}
