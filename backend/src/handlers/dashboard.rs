//! Dashboard handler

use axum::{extract::State, response::IntoResponse, Json};

use crate::error::AppResult;
use crate::external::{HarvestClient, VineyardClient};
use crate::middleware::CurrentUser;
use crate::services::DashboardService;
use crate::AppState;

/// Winery overview; upstream calls carry the caller's token
pub async fn get_dashboard(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<impl IntoResponse> {
    let services = &state.config.services;
    let dashboard = DashboardService::new(
        state.db.clone(),
        VineyardClient::new(state.http.clone(), services.vineyard_url.clone()),
        HarvestClient::new(state.http.clone(), services.harvest_url.clone()),
    )
    .summary(&user.token)
    .await?;
    Ok(Json(dashboard))
}
