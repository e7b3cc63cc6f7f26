//! Fermentation batch HTTP handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::{require_writer, CurrentUser};
use crate::models::{BatchChanges, NewBatch, StatusChange, Transition};
use crate::services::BatchService;
use crate::AppState;

pub async fn list_batches(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let batches = BatchService::new(state.db.clone()).list_batches().await?;
    Ok(Json(batches))
}

/// Batches in `active` status with their latest reading
pub async fn list_active_batches(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let batches = BatchService::new(state.db.clone()).list_active().await?;
    Ok(Json(batches))
}

pub async fn get_batch(
    State(state): State<AppState>,
    Path(batch_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let batch = BatchService::new(state.db.clone())
        .get_with_latest(batch_id)
        .await?;
    Ok(Json(batch))
}

/// Start a batch in an available tank
pub async fn create_batch(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<NewBatch>,
) -> AppResult<impl IntoResponse> {
    require_writer(&user)?;
    let batch = BatchService::new(state.db.clone())
        .create_batch(user.user_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(batch)))
}

pub async fn update_batch(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(batch_id): Path<Uuid>,
    Json(changes): Json<BatchChanges>,
) -> AppResult<impl IntoResponse> {
    require_writer(&user)?;
    let batch = BatchService::new(state.db.clone())
        .update_batch(batch_id, changes)
        .await?;
    Ok(Json(batch))
}

/// Pause, resume, complete or cancel a batch
pub async fn change_batch_status(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(batch_id): Path<Uuid>,
    Json(change): Json<StatusChange>,
) -> AppResult<impl IntoResponse> {
    require_writer(&user)?;
    let transition = Transition::parse(
        &change.status,
        change.end_date,
        change.release_tank_to.as_deref(),
    )?;
    let batch = BatchService::new(state.db.clone())
        .transition(batch_id, transition)
        .await?;
    Ok(Json(batch))
}

/// Delete a completed or cancelled batch and its readings
pub async fn delete_batch(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(batch_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    require_writer(&user)?;
    BatchService::new(state.db.clone()).delete_batch(batch_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
