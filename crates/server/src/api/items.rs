use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use harvester_core::TrackedItem;

use super::handlers::ErrorResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ItemQueryParams {
    /// Include deactivated items (default false)
    #[serde(default)]
    pub include_inactive: bool,
}

#[derive(Debug, Serialize)]
pub struct ItemListResponse {
    pub items: Vec<TrackedItem>,
    pub total: usize,
}

/// List catalog items with the tracking fields of their last committed run
pub async fn list_items(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ItemQueryParams>,
) -> Result<Json<ItemListResponse>, (StatusCode, Json<ErrorResponse>)> {
    let items = state.warehouse().tracked_items().map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: format!("Failed to list items: {}", e),
            }),
        )
    })?;

    let items: Vec<TrackedItem> = items
        .into_iter()
        .filter(|item| params.include_inactive || item.is_active)
        .collect();

    Ok(Json(ItemListResponse {
        total: items.len(),
        items,
    }))
}
