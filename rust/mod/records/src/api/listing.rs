use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};
use serde::Serialize;

use pcbtrace_core::{PageParams, Pagination, ServiceError};

use super::{AppState, blocking};
use crate::model::{ManufacturingRecord, TableStats};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/all", get(list_all))
        .route("/stats", get(stats))
}

#[derive(Debug, Serialize)]
pub struct PageResponse {
    pub success: bool,
    pub data: Vec<ManufacturingRecord>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub success: bool,
    pub stats: TableStats,
}

async fn list_all(
    State(svc): State<AppState>,
    Query(params): Query<PageParams>,
) -> Result<Json<PageResponse>, ServiceError> {
    let page = blocking(&svc, move |s| s.list_page(&params)).await?;
    Ok(Json(PageResponse {
        success: true,
        data: page.items,
        pagination: page.pagination,
    }))
}

async fn stats(State(svc): State<AppState>) -> Result<Json<StatsResponse>, ServiceError> {
    let stats = blocking(&svc, |s| s.stats()).await?;
    Ok(Json(StatsResponse { success: true, stats }))
}
