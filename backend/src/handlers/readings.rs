//! Fermentation reading HTTP handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::{require_writer, CurrentUser};
use crate::models::{NewReading, ReadingSource};
use crate::services::ReadingService;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ReadingsQuery {
    pub limit: Option<i64>,
}

/// Record a manual reading; open to every role
pub async fn record_reading(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
    Path(batch_id): Path<Uuid>,
    Json(input): Json<NewReading>,
) -> AppResult<impl IntoResponse> {
    let input = NewReading {
        source: ReadingSource::Manual,
        ..input
    };
    let reading = ReadingService::new(state.db.clone())
        .append_reading(batch_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(reading)))
}

/// Readings newest first
pub async fn list_readings(
    State(state): State<AppState>,
    Path(batch_id): Path<Uuid>,
    Query(query): Query<ReadingsQuery>,
) -> AppResult<impl IntoResponse> {
    let readings = ReadingService::new(state.db.clone())
        .list_readings(batch_id, query.limit)
        .await?;
    Ok(Json(readings))
}

pub async fn delete_reading(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((batch_id, reading_id)): Path<(Uuid, Uuid)>,
) -> AppResult<impl IntoResponse> {
    require_writer(&user)?;
    ReadingService::new(state.db.clone())
        .delete_reading(batch_id, reading_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
