//! Batch statistics handler

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::services::StatsService;
use crate::AppState;

pub async fn get_batch_stats(
    State(state): State<AppState>,
    Path(batch_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let stats = StatsService::new(state.db.clone()).batch_stats(batch_id).await?;
    Ok(Json(stats))
}
