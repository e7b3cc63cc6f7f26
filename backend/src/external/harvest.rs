//! Harvest service client

use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppResult;

/// Harvest fields the dashboard needs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarvestSummary {
    pub id: Uuid,
    pub vineyard_id: Uuid,
    pub harvest_date: String,
    pub status: String,
    #[serde(default)]
    pub total_weight_kg: Option<Decimal>,
}

#[derive(Clone)]
pub struct HarvestClient {
    client: Client,
    base_url: String,
}

impl HarvestClient {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Harvests visible to the caller
    pub async fn list_harvests(&self, bearer_token: &str) -> AppResult<Vec<HarvestSummary>> {
        let url = format!("{}/api/v1/harvests", self.base_url);
        super::get_json(&self.client, "Harvest service", &url, bearer_token).await
    }
}
