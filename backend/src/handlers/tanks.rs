//! Tank HTTP handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::{require_admin, require_writer, CurrentUser};
use crate::models::{NewTank, TankChanges};
use crate::services::{BatchService, TankService};
use crate::AppState;

/// List all tanks
pub async fn list_tanks(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let tanks = TankService::new(state.db.clone()).list_tanks().await?;
    Ok(Json(tanks))
}

/// List tanks ready for a new batch
pub async fn list_available_tanks(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let tanks = TankService::new(state.db.clone()).list_available().await?;
    Ok(Json(tanks))
}

pub async fn get_tank(
    State(state): State<AppState>,
    Path(tank_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let tank = TankService::new(state.db.clone()).get_tank(tank_id).await?;
    Ok(Json(tank))
}

/// Register a new tank
pub async fn create_tank(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<NewTank>,
) -> AppResult<impl IntoResponse> {
    require_writer(&user)?;
    let tank = TankService::new(state.db.clone()).create_tank(input).await?;
    Ok((StatusCode::CREATED, Json(tank)))
}

pub async fn update_tank(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(tank_id): Path<Uuid>,
    Json(changes): Json<TankChanges>,
) -> AppResult<impl IntoResponse> {
    require_writer(&user)?;
    let tank = TankService::new(state.db.clone())
        .update_tank(tank_id, changes)
        .await?;
    Ok(Json(tank))
}

/// Delete a tank (admin only)
pub async fn delete_tank(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(tank_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    require_admin(&user)?;
    TankService::new(state.db.clone()).delete_tank(tank_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Batch history of a tank
pub async fn list_tank_batches(
    State(state): State<AppState>,
    Path(tank_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let batches = BatchService::new(state.db.clone())
        .list_by_tank(tank_id)
        .await?;
    Ok(Json(batches))
}
