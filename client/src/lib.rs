//! # client
//!
//! Trace viewer client: fetches trace records from the tracing API and keeps
//! the catalog, trace detail and span-inspection state consistent while
//! requests race each other.
//!
//! `net` talks to the API, `state` holds the synchronous controller, and
//! `session` drives the controller from async fetch tasks.

pub mod net;
pub mod session;
pub mod state;

pub use net::api::{ErrorCode, FetchError, ListFilters, TraceApi};
pub use net::config::{ApiConfig, ConfigError};
pub use net::http::HttpTraceApi;
pub use session::TraceSession;
pub use state::navigation::PendingTraceSelection;
pub use state::trace::{CatalogRequest, DetailRequest, FailedDetail, TraceController, View};
