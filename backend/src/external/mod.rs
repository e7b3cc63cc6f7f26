//! Clients for the upstream vineyard and harvest services

pub mod harvest;
pub mod vineyard;

pub use harvest::{HarvestClient, HarvestSummary};
pub use vineyard::{VineyardClient, VineyardSummary};

use reqwest::Client;
use serde::de::DeserializeOwned;

use crate::error::{AppError, AppResult};

/// GET `url` with the caller's bearer token and decode the JSON body
async fn get_json<T: DeserializeOwned>(
    client: &Client,
    service: &str,
    url: &str,
    bearer_token: &str,
) -> AppResult<T> {
    let response = client
        .get(url)
        .bearer_auth(bearer_token)
        .send()
        .await
        .map_err(|e| AppError::ExternalService(format!("{} request failed: {}", service, e)))?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(AppError::ExternalService(format!(
            "{} error: {} - {}",
            service, status, body
        )));
    }

    response
        .json()
        .await
        .map_err(|e| AppError::ExternalService(format!("Failed to parse {} response: {}", service, e)))
}
