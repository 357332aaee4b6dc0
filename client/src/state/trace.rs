//! Trace navigation state: catalog, loaded trace detail and span selection.
//!
//! DESIGN
//! ======
//! The controller is a synchronous state machine. Fetches are issued as
//! request tokens (`DetailRequest`, `CatalogRequest`) carrying the requested
//! id and a sequence number; results come back through `resolve_*`, which
//! drops anything that no longer matches the pending request. A late reply for
//! an abandoned selection therefore never overwrites the current view.
//!
//! Span selection and expand/collapse are UI state keyed by span id; the
//! loaded records themselves are never mutated.

#[cfg(test)]
#[path = "trace_test.rs"]
mod trace_test;

use std::collections::HashSet;

use spans::{TraceDetail, TraceSummary};
use traces::{CatalogFilter, LoadedTrace, SpanNode, WaterfallRow, build_span_tree, flatten_visible, layout_waterfall};

use super::navigation::PendingTraceSelection;
use crate::net::api::{FetchError, ListFilters};

/// Which view is active.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum View {
    /// Trace summary list, optionally filtered.
    Catalog,
    /// One trace open (loading or loaded), no span selected.
    TraceDetail,
    /// A span's detail panel open over the trace detail.
    SpanInspect,
}

/// An issued trace-detail fetch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DetailRequest {
    pub trace_id: String,
    pub seq: u64,
}

/// An issued catalog fetch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CatalogRequest {
    pub filters: ListFilters,
    pub seq: u64,
}

/// The last detail fetch that failed, kept for the inline error and retry.
#[derive(Clone, Debug, PartialEq)]
pub struct FailedDetail {
    pub trace_id: String,
    pub error: FetchError,
}

#[derive(Clone, Debug, Default)]
enum DetailState {
    #[default]
    Idle,
    Loading(DetailRequest),
    Loaded(Box<LoadedTrace>),
}

/// Selection/navigation controller for the trace views.
#[derive(Clone, Debug, Default)]
pub struct TraceController {
    catalog: Vec<TraceSummary>,
    catalog_error: Option<FetchError>,
    pending_catalog: Option<CatalogRequest>,
    filter: CatalogFilter,
    detail: DetailState,
    detail_error: Option<FailedDetail>,
    selected_span_id: Option<String>,
    collapsed: HashSet<String>,
    seq: u64,
}

impl TraceController {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a controller, consuming the cross-view token if one is pending.
    ///
    /// Returns the detail request to issue when a trace was pre-selected.
    pub fn start(token: &PendingTraceSelection) -> (Self, Option<DetailRequest>) {
        let mut controller = Self::new();
        let request = token.take().and_then(|trace_id| {
            tracing::debug!(trace_id = %trace_id, "opening pre-selected trace");
            controller.select_trace(trace_id)
        });
        (controller, request)
    }

    #[must_use]
    pub fn view(&self) -> View {
        match (&self.detail, &self.selected_span_id) {
            (DetailState::Idle, _) => View::Catalog,
            (DetailState::Loaded(_), Some(_)) => View::SpanInspect,
            _ => View::TraceDetail,
        }
    }

    // =========================================================================
    // CATALOG
    // =========================================================================

    /// Start a catalog fetch, superseding any catalog fetch in flight.
    pub fn begin_catalog_load(&mut self, filters: ListFilters) -> CatalogRequest {
        let request = CatalogRequest {
            filters,
            seq: self.next_seq(),
        };
        self.pending_catalog = Some(request.clone());
        request
    }

    /// Apply a catalog fetch result. Returns `false` when the result was stale.
    ///
    /// A failure keeps the previously loaded list.
    pub fn resolve_catalog(&mut self, request: &CatalogRequest, result: Result<Vec<TraceSummary>, FetchError>) -> bool {
        if self.pending_catalog.as_ref() != Some(request) {
            tracing::debug!(seq = request.seq, "discarding stale catalog response");
            return false;
        }
        self.pending_catalog = None;

        match result {
            Ok(traces) => {
                tracing::debug!(count = traces.len(), "catalog loaded");
                self.catalog = traces;
                self.catalog_error = None;
            }
            Err(error) => {
                tracing::warn!(error = %error, "catalog fetch failed");
                self.catalog_error = Some(error);
            }
        }
        true
    }

    #[must_use]
    pub fn is_catalog_loading(&self) -> bool {
        self.pending_catalog.is_some()
    }

    #[must_use]
    pub fn catalog(&self) -> &[TraceSummary] {
        &self.catalog
    }

    #[must_use]
    pub fn catalog_error(&self) -> Option<&FetchError> {
        self.catalog_error.as_ref()
    }

    #[must_use]
    pub fn filter(&self) -> &CatalogFilter {
        &self.filter
    }

    pub fn set_query(&mut self, query: impl Into<String>) {
        self.filter.set_query(query);
    }

    pub fn set_status_filter(&mut self, status: impl Into<String>) {
        self.filter.set_status(status);
    }

    /// Catalog entries passing the current filter, in fetched order.
    #[must_use]
    pub fn visible_traces(&self) -> Vec<&TraceSummary> {
        self.filter.apply(&self.catalog)
    }

    // =========================================================================
    // TRACE DETAIL
    // =========================================================================

    /// Open a trace. Returns the fetch to issue, or `None` when that trace is
    /// already loaded or already being fetched.
    pub fn select_trace(&mut self, trace_id: impl Into<String>) -> Option<DetailRequest> {
        let trace_id = trace_id.into();
        match &self.detail {
            DetailState::Loaded(loaded) if loaded.trace_id() == trace_id => return None,
            DetailState::Loading(pending) if pending.trace_id == trace_id => return None,
            _ => {}
        }

        let request = DetailRequest {
            trace_id,
            seq: self.next_seq(),
        };
        tracing::debug!(trace_id = %request.trace_id, seq = request.seq, "trace detail requested");
        self.detail = DetailState::Loading(request.clone());
        self.detail_error = None;
        self.selected_span_id = None;
        self.collapsed.clear();
        Some(request)
    }

    /// Apply a detail fetch result. Returns `false` when the result was stale.
    ///
    /// A failure returns to the catalog with the error recorded; the catalog
    /// list is untouched.
    pub fn resolve_detail(&mut self, request: &DetailRequest, result: Result<TraceDetail, FetchError>) -> bool {
        match &self.detail {
            DetailState::Loading(pending) if pending == request => {}
            _ => {
                tracing::debug!(trace_id = %request.trace_id, seq = request.seq, "discarding stale trace detail");
                return false;
            }
        }

        match result {
            Ok(mut detail) => {
                if detail.summary.id.is_empty() {
                    detail.summary.id.clone_from(&request.trace_id);
                }
                let loaded = build_span_tree(detail);
                tracing::info!(trace_id = %request.trace_id, spans = loaded.tree.len(), "trace detail loaded");
                self.detail = DetailState::Loaded(Box::new(loaded));
            }
            Err(error) => {
                tracing::warn!(trace_id = %request.trace_id, error = %error, "trace detail fetch failed");
                self.detail = DetailState::Idle;
                self.detail_error = Some(FailedDetail {
                    trace_id: request.trace_id.clone(),
                    error,
                });
            }
        }
        true
    }

    /// Re-issue the last failed detail fetch.
    pub fn retry_detail(&mut self) -> Option<DetailRequest> {
        let failed = self.detail_error.as_ref()?.trace_id.clone();
        self.select_trace(failed)
    }

    /// Leave the trace detail: discards the loaded trace, selection and any
    /// in-flight fetch.
    pub fn back(&mut self) {
        if let DetailState::Loading(pending) = &self.detail {
            tracing::debug!(trace_id = %pending.trace_id, "abandoning in-flight trace detail");
        }
        self.detail = DetailState::Idle;
        self.detail_error = None;
        self.selected_span_id = None;
        self.collapsed.clear();
    }

    #[must_use]
    pub fn loaded(&self) -> Option<&LoadedTrace> {
        match &self.detail {
            DetailState::Loaded(loaded) => Some(loaded),
            _ => None,
        }
    }

    #[must_use]
    pub fn pending_detail(&self) -> Option<&DetailRequest> {
        match &self.detail {
            DetailState::Loading(request) => Some(request),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_detail_loading(&self) -> bool {
        self.pending_detail().is_some()
    }

    #[must_use]
    pub fn detail_error(&self) -> Option<&FailedDetail> {
        self.detail_error.as_ref()
    }

    // =========================================================================
    // SPAN SELECTION
    // =========================================================================

    /// Open the inspection panel for a span of the loaded trace.
    ///
    /// Selecting the already-selected span is a no-op. Returns `false` when no
    /// trace is loaded or the id is not in it.
    pub fn select_span(&mut self, span_id: &str) -> bool {
        let Some(loaded) = self.loaded() else {
            return false;
        };
        if loaded.tree.find(span_id).is_none() {
            return false;
        }
        if self.selected_span_id.as_deref() != Some(span_id) {
            self.selected_span_id = Some(span_id.to_owned());
        }
        true
    }

    /// Close the inspection panel; the loaded trace stays.
    pub fn close_span(&mut self) {
        self.selected_span_id = None;
    }

    #[must_use]
    pub fn selected_span_id(&self) -> Option<&str> {
        self.selected_span_id.as_deref()
    }

    #[must_use]
    pub fn selected_span(&self) -> Option<&SpanNode> {
        let id = self.selected_span_id.as_deref()?;
        self.loaded()?.tree.find(id)
    }

    /// Root-to-selection path for the inspection header.
    #[must_use]
    pub fn breadcrumb(&self) -> Vec<&SpanNode> {
        let Some(loaded) = self.loaded() else {
            return Vec::new();
        };
        let Some(idx) = self.selected_span_id.as_deref().and_then(|id| loaded.tree.index_of(id)) else {
            return Vec::new();
        };
        loaded.tree.ancestors(idx).into_iter().map(|step| &loaded.tree[step]).collect()
    }

    // =========================================================================
    // WATERFALL
    // =========================================================================

    /// Flip a span between expanded and collapsed. Returns the new collapsed state.
    pub fn toggle_collapsed(&mut self, span_id: &str) -> bool {
        if self.collapsed.remove(span_id) {
            false
        } else {
            self.collapsed.insert(span_id.to_owned());
            true
        }
    }

    #[must_use]
    pub fn is_collapsed(&self, span_id: &str) -> bool {
        self.collapsed.contains(span_id)
    }

    /// Waterfall rows for the loaded trace, honouring collapse and selection.
    #[must_use]
    pub fn rows(&self) -> Vec<WaterfallRow> {
        let Some(loaded) = self.loaded() else {
            return Vec::new();
        };
        let selected = self.selected_span_id.as_deref();
        if self.collapsed.is_empty() {
            layout_waterfall(&loaded.tree, loaded.window, &loaded.flat, selected)
        } else {
            let visible = flatten_visible(&loaded.tree, &self.collapsed);
            layout_waterfall(&loaded.tree, loaded.window, &visible, selected)
        }
    }

    fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }
}
