//! API route handlers.
//!
//! Each handler is validate -> repository/aggregator -> envelope. Business
//! failures surface as typed [`ApiError`]s; nothing here writes partially.

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::Utc;
use serde_json::json;
use tracing::{debug, info};

use steeple_core::export::{self, ExportEncoding, ExportOutput};
use steeple_core::metrics::{MetricsReport, ReportView, TrendPoint};
use steeple_core::timerange::TimeRange;
use steeple_core::validate::{
    self, RawListQuery, RawMetricsQuery, RawProxyInput, ValidationError,
};
use steeple_storage::{NewProxy, StreamingProxy};

use crate::error::{ApiError, Result};
use crate::models::{BandwidthQuery, DeleteConfirmation, Envelope, ExportRequest, PageMeta};
use crate::state::AppState;

/// Caller identity from the opaque auth layer.
///
/// Auth itself is an external collaborator; this subsystem only records who
/// acted.
fn actor(headers: &HeaderMap) -> String {
    headers
        .get("x-actor-id")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or("system")
        .to_string()
}

// ===== Proxy lifecycle =====

/// GET /proxies - filtered, paginated listing.
pub async fn list_proxies(
    State(state): State<AppState>,
    Query(raw): Query<RawListQuery>,
) -> Result<Json<Envelope<Vec<StreamingProxy>>>> {
    let filter = validate::validate_filters(raw)?;
    let page = state.db.list_proxies(&filter)?;

    debug!(
        total = page.total,
        page = page.page,
        "Listed proxies"
    );

    let meta = PageMeta::from(&page);
    Ok(Json(Envelope::paginated(page.items, meta)))
}

/// POST /proxies - create a proxy.
pub async fn create_proxy(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(raw): Json<RawProxyInput>,
) -> Result<(StatusCode, Json<Envelope<StreamingProxy>>)> {
    let create = validate::validate_create(raw)?;
    let new = NewProxy::from_create(create, actor(&headers));
    let proxy = state.db.create_proxy(new)?;

    info!(proxy_id = %proxy.id, branch = %proxy.church_branch_id, "Proxy created");

    Ok((StatusCode::CREATED, Json(Envelope::ok(proxy))))
}

/// GET /proxies/{id} - fetch one proxy.
pub async fn get_proxy(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Envelope<StreamingProxy>>> {
    let proxy = state
        .db
        .get_proxy(&id)?
        .ok_or_else(|| ApiError::NotFound(format!("proxy {id}")))?;

    Ok(Json(Envelope::ok(proxy)))
}

/// PUT /proxies/{id} - merge a partial update.
pub async fn update_proxy(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(raw): Json<RawProxyInput>,
) -> Result<Json<Envelope<StreamingProxy>>> {
    let patch = validate::validate_update(raw)?;
    let proxy = state.db.update_proxy(&id, &patch, &actor(&headers))?;

    info!(proxy_id = %proxy.id, "Proxy updated");

    Ok(Json(Envelope::ok(proxy)))
}

/// DELETE /proxies/{id} - soft delete.
///
/// Refused with `invalid_state` while streams are active; the record stays
/// queryable afterwards either way.
pub async fn delete_proxy(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Envelope<DeleteConfirmation>>> {
    let deleted = state.db.delete_proxy(&id, &actor(&headers))?;

    info!(proxy_id = %deleted.id, "Proxy soft-deleted");

    Ok(Json(Envelope::ok(DeleteConfirmation {
        id: deleted.id,
        status: deleted.status,
        message: "proxy deactivated; record retained".to_string(),
    })))
}

/// GET /proxies/{id}/bandwidth - per-bucket bandwidth series for one proxy.
pub async fn proxy_bandwidth(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<BandwidthQuery>,
) -> Result<Json<Envelope<Vec<TrendPoint>>>> {
    let range = validate::validate_bandwidth_range(query.range.as_deref())?;

    state
        .db
        .get_proxy(&id)?
        .ok_or_else(|| ApiError::NotFound(format!("proxy {id}")))?;

    let series = state
        .aggregator
        .bandwidth_series(state.db.as_ref(), &id, range, Utc::now())?;

    Ok(Json(Envelope::ok(series)))
}

// ===== Analytics =====

/// GET /analytics/detailed - full performance + usage + cost report.
pub async fn detailed_analytics(
    State(state): State<AppState>,
    Query(raw): Query<RawMetricsQuery>,
) -> Result<Json<Envelope<MetricsReport>>> {
    run_report(&state, raw, TimeRange::LastDay, ReportView::Detailed)
}

/// GET /analytics/usage - usage-scoped report (default range 7d).
pub async fn usage_analytics(
    State(state): State<AppState>,
    Query(raw): Query<RawMetricsQuery>,
) -> Result<Json<Envelope<MetricsReport>>> {
    run_report(&state, raw, TimeRange::LastWeek, ReportView::Usage)
}

/// GET /analytics/costs - cost report with breakdown and recommendations.
pub async fn cost_analytics(
    State(state): State<AppState>,
    Query(raw): Query<RawMetricsQuery>,
) -> Result<Json<Envelope<MetricsReport>>> {
    run_report(&state, raw, TimeRange::LastDay, ReportView::Cost)
}

fn run_report(
    state: &AppState,
    raw: RawMetricsQuery,
    default_range: TimeRange,
    view: ReportView,
) -> Result<Json<Envelope<MetricsReport>>> {
    let query = validate::validate_metrics_query(raw, default_range)?;
    let report = state
        .aggregator
        .aggregate(state.db.as_ref(), &query, view, Utc::now())?;

    Ok(Json(Envelope::ok(report)))
}

/// POST /analytics/export - format a report payload.
pub async fn export_analytics(
    Json(req): Json<ExportRequest>,
) -> Result<Json<Envelope<serde_json::Value>>> {
    let kind = req
        .kind
        .ok_or_else(|| ApiError::Validation(ValidationError::single("type", "is required")))?;
    let encoding = ExportEncoding::parse(&kind)
        .ok_or_else(|| ApiError::UnsupportedFormat(kind.clone()))?;
    let data = req
        .data
        .ok_or_else(|| ApiError::Validation(ValidationError::single("data", "is required")))?;

    let payload = match export::format(&data, encoding)? {
        ExportOutput::Structured(document) => json!({
            "format": "structured",
            "document": document,
        }),
        ExportOutput::Tabular(content) => json!({
            "format": "tabular",
            "contentType": "text/csv",
            "content": content,
        }),
        // Document generation is deferred; hand back the retrieval reference.
        ExportOutput::Document(reference) => json!({
            "format": "document",
            "reference": reference,
        }),
    };

    info!(format = encoding.as_str(), "Report exported");

    Ok(Json(Envelope::ok(payload)))
}
