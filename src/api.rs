//! HTTP boundary.
//!
//! Routes:
//! - `GET /api/{zip}`: the aggregated report as JSON, with a shared-cache
//!   freshness hint on success and `{ title, message }` with status 500 on a
//!   store fault.
//! - `GET /explore/{zip}`: the same report rendered as plain text through
//!   the Report View. Query parameters `q`, `sort`, `show` and `provider`
//!   set the view state.
//!
//! The store is synchronous, so each lookup runs on the blocking pool. Every
//! failure, including a panicked lookup, is turned into a response here.

use std::sync::Arc;

use axum::extract::rejection::PathRejection;
use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use percent_encoding::percent_decode_str;
use serde::Deserialize;

use crate::aggregate::{self, ZipReport};
use crate::client::ClientFetchError;
use crate::config::CacheConfig;
use crate::logging::{self, Component};
use crate::model::{DataSourceError, ErrorBody};
use crate::render;
use crate::store::WaterQualityStore;
use crate::view::{self, ReportView};
use crate::zip::PostalCode;

/// Shared handles injected into every request.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn WaterQualityStore>,
    pub cache: CacheConfig,
}

impl AppState {
    pub fn new(store: Arc<dyn WaterQualityStore>, cache: CacheConfig) -> Self {
        AppState { store, cache }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/{zip}", get(report_json))
        .route("/explore/{zip}", get(report_text))
        .with_state(state)
}

/// The raw `{zip}` segment. Segments that do not decode to UTF-8 are
/// decoded lossily from the request path instead of being rejected.
fn zip_segment(path: Result<Path<String>, PathRejection>, uri: &Uri) -> String {
    match path {
        Ok(Path(zip)) => zip,
        Err(_) => {
            let raw = uri.path().rsplit('/').next().unwrap_or("");
            percent_decode_str(raw).decode_utf8_lossy().into_owned()
        }
    }
}

/// Runs the lookup on the blocking pool.
async fn lookup(state: &AppState, zip: String) -> Result<ZipReport, DataSourceError> {
    let store = Arc::clone(&state.store);
    tokio::task::spawn_blocking(move || aggregate::build_report(store.as_ref(), &zip))
        .await
        .unwrap_or_else(|e| {
            logging::error(Component::Api, None, &format!("lookup task failed: {}", e));
            Err(DataSourceError::Query(format!("lookup task failed: {}", e)))
        })
}

/// Store faults are already logged by the aggregation step.
fn error_response(zip: &str, err: &DataSourceError) -> Response {
    logging::debug(Component::Api, Some(zip), "responding 500");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorBody::new(err.message())),
    )
        .into_response()
}

// ---------------------------------------------------------------------------
// GET /api/{zip}
// ---------------------------------------------------------------------------

async fn report_json(
    State(state): State<AppState>,
    uri: Uri,
    path: Result<Path<String>, PathRejection>,
) -> Response {
    let zip = zip_segment(path, &uri);
    let key = PostalCode::normalize(&zip);
    match lookup(&state, zip).await {
        Ok(report) => (
            StatusCode::OK,
            [(header::CACHE_CONTROL, state.cache.header_value())],
            Json(report.into_response()),
        )
            .into_response(),
        Err(e) => error_response(key.as_str(), &e),
    }
}

// ---------------------------------------------------------------------------
// GET /explore/{zip}
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct ExploreParams {
    pub q: Option<String>,
    pub sort: Option<String>,
    pub show: Option<String>,
    /// 1-based provider index, as displayed.
    pub provider: Option<usize>,
}

async fn report_text(
    State(state): State<AppState>,
    uri: Uri,
    path: Result<Path<String>, PathRejection>,
    Query(params): Query<ExploreParams>,
) -> Response {
    let zip = zip_segment(path, &uri);
    let key = PostalCode::normalize(&zip);
    let mut report_view = ReportView::new();
    let ticket = report_view.begin_load(key.as_str());

    let status = match lookup(&state, zip).await {
        Ok(report) => {
            report_view.finish_load(ticket, Ok(report.into_response()));
            StatusCode::OK
        }
        Err(e) => {
            logging::debug(Component::Api, Some(key.as_str()), "rendering failure notice");
            report_view.finish_load(
                ticket,
                Err(ClientFetchError::Status {
                    code: 500,
                    message: e.message().to_string(),
                }),
            );
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    apply_params(&mut report_view, &params);
    let body = render::render(&mut report_view);
    (
        status,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        body,
    )
        .into_response()
}

/// Applies query-string view state. Unknown values are ignored.
pub fn apply_params(report_view: &mut ReportView, params: &ExploreParams) {
    if let Some(q) = &params.q {
        report_view.set_query(q);
    }
    if let Some(sort) = params.sort.as_deref().and_then(view::SortKey::parse) {
        report_view.set_sort(sort);
    }
    if let Some(show) = params.show.as_deref().and_then(view::parse_partition) {
        report_view.show(show);
    }
    if let Some(provider) = params.provider {
        report_view.select_provider(provider.saturating_sub(1));
    }
}
