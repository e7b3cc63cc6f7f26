//! Vineyard service client

use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppResult;

/// Vineyard fields the dashboard needs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VineyardSummary {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub location: Option<String>,
    /// Hectares
    pub total_area: Decimal,
}

#[derive(Clone)]
pub struct VineyardClient {
    client: Client,
    base_url: String,
}

impl VineyardClient {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Vineyards visible to the caller
    pub async fn list_vineyards(&self, bearer_token: &str) -> AppResult<Vec<VineyardSummary>> {
        let url = format!("{}/api/v1/vineyards", self.base_url);
        super::get_json(&self.client, "Vineyard service", &url, bearer_token).await
    }
}
