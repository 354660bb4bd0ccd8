use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use harvester_core::{AuditFilter, AuditRecord, DriverResult, DriverStatus};

use super::handlers::ErrorResponse;
use crate::state::AppState;

/// Maximum allowed limit for run queries
const MAX_LIMIT: i64 = 1000;

/// Default limit for run queries
const DEFAULT_LIMIT: i64 = 100;

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, error: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
}

/// Query parameters for the run history endpoint
#[derive(Debug, Deserialize)]
pub struct RunQueryParams {
    /// Filter by final status (`SUCCESS`, `FAILED_OVERALL`, `CRITICAL_FAILURE`)
    pub status: Option<String>,
    /// Filter runs recorded after this timestamp (ISO 8601)
    pub from: Option<DateTime<Utc>>,
    /// Filter runs recorded before this timestamp (ISO 8601)
    pub to: Option<DateTime<Utc>>,
    /// Maximum number of runs to return (default 100, max 1000)
    pub limit: Option<i64>,
    /// Pagination offset (default 0)
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct RunQueryResponse {
    pub runs: Vec<AuditRecord>,
    /// Total number of matching runs
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Trigger one driver run and return its result.
///
/// The body is always the structured result; only a critical failure maps to 500.
pub async fn trigger_run(State(state): State<Arc<AppState>>) -> (StatusCode, Json<DriverResult>) {
    info!("Driver run triggered via API");
    let result = state.driver().run().await;

    let code = match result.status {
        DriverStatus::Success | DriverStatus::FailedOverall => StatusCode::OK,
        DriverStatus::CriticalFailure => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (code, Json(result))
}

/// List audited runs, newest first
pub async fn list_runs(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RunQueryParams>,
) -> Result<Json<RunQueryResponse>, ApiError> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = params.offset.unwrap_or(0).max(0);

    let mut base_filter = AuditFilter::new();

    if let Some(ref status) = params.status {
        let status = status
            .parse::<DriverStatus>()
            .map_err(|e| api_error(StatusCode::BAD_REQUEST, e))?;
        base_filter = base_filter.with_status(status);
    }

    if params.from.is_some() || params.to.is_some() {
        base_filter = base_filter.with_time_range(params.from, params.to);
    }

    let query_filter = base_filter.clone().with_limit(limit).with_offset(offset);

    let runs = state.audit_store().query(&query_filter).map_err(|e| {
        api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to query runs: {}", e),
        )
    })?;

    // Total without limit/offset
    let total = state.audit_store().count(&base_filter).map_err(|e| {
        api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to count runs: {}", e),
        )
    })?;

    Ok(Json(RunQueryResponse {
        runs,
        total,
        limit,
        offset,
    }))
}

/// Fetch one audited run by id
pub async fn get_run(
    State(state): State<Arc<AppState>>,
    Path(run_id): Path<String>,
) -> Result<Json<AuditRecord>, ApiError> {
    let run_id = Uuid::parse_str(&run_id)
        .map_err(|_| api_error(StatusCode::BAD_REQUEST, format!("Invalid run id: {}", run_id)))?;

    match state.audit_store().get(run_id) {
        Ok(Some(record)) => Ok(Json(record)),
        Ok(None) => Err(api_error(
            StatusCode::NOT_FOUND,
            format!("Run not found: {}", run_id),
        )),
        Err(e) => Err(api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to get run: {}", e),
        )),
    }
}
