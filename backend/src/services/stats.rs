//! Batch statistics service

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{compute_batch_stats, BatchStats};
use crate::services::{BatchService, ReadingService};

#[derive(Clone)]
pub struct StatsService {
    db: PgPool,
}

impl StatsService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Aggregate a batch's readings on demand
    pub async fn batch_stats(&self, batch_id: Uuid) -> AppResult<BatchStats> {
        let batch = BatchService::new(self.db.clone()).get_batch(batch_id).await?;
        let readings = ReadingService::new(self.db.clone()).history(batch_id).await?;
        Ok(compute_batch_stats(&batch, &readings, Utc::now()))
    }
}
