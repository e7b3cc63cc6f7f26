//! Dashboard composition across the winery services

use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;

use crate::error::AppResult;
use crate::external::{HarvestClient, HarvestSummary, VineyardClient, VineyardSummary};
use crate::models::BatchWithLatestReading;
use crate::services::BatchService;

const RECENT_VINEYARDS: usize = 3;
const RECENT_HARVESTS: usize = 5;
const RECENT_BATCHES: usize = 5;

#[derive(Debug, Serialize)]
pub struct DashboardCounts {
    pub vineyards: usize,
    pub total_area: Decimal,
    pub harvests: usize,
    pub active_batches: usize,
}

#[derive(Debug, Serialize)]
pub struct Dashboard {
    pub stats: DashboardCounts,
    pub recent_vineyards: Vec<VineyardSummary>,
    pub recent_harvests: Vec<HarvestSummary>,
    pub active_batches: Vec<BatchWithLatestReading>,
}

#[derive(Clone)]
pub struct DashboardService {
    db: PgPool,
    vineyards: VineyardClient,
    harvests: HarvestClient,
}

impl DashboardService {
    pub fn new(db: PgPool, vineyards: VineyardClient, harvests: HarvestClient) -> Self {
        Self {
            db,
            vineyards,
            harvests,
        }
    }

    /// Fetch all three sources in parallel; any failure fails the dashboard
    pub async fn summary(&self, bearer_token: &str) -> AppResult<Dashboard> {
        let batches = BatchService::new(self.db.clone());
        let (vineyards, harvests, active) = tokio::try_join!(
            self.vineyards.list_vineyards(bearer_token),
            self.harvests.list_harvests(bearer_token),
            batches.list_active(),
        )?;

        Ok(compose(vineyards, harvests, active))
    }
}

fn compose(
    vineyards: Vec<VineyardSummary>,
    harvests: Vec<HarvestSummary>,
    active: Vec<BatchWithLatestReading>,
) -> Dashboard {
    let stats = DashboardCounts {
        vineyards: vineyards.len(),
        total_area: vineyards.iter().map(|v| v.total_area).sum(),
        harvests: harvests.len(),
        active_batches: active.len(),
    };

    Dashboard {
        stats,
        recent_vineyards: vineyards.into_iter().take(RECENT_VINEYARDS).collect(),
        recent_harvests: harvests.into_iter().take(RECENT_HARVESTS).collect(),
        active_batches: active.into_iter().take(RECENT_BATCHES).collect(),
    }
}
