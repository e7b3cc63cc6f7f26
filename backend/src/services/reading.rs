//! Fermentation reading service

use chrono::Utc;
use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

use shared::validation::validate_reading;

use crate::error::{AppError, AppResult};
use crate::models::{convert_rows, BatchStatus, FermentationReading, NewReading, ReadingRow};

pub(crate) const READING_COLUMNS: &str = "id, batch_id, temperature, brix, ph, density, \
     alcohol_percent, volatile_acidity, free_so2, total_so2, color, clarity, aroma_notes, \
     source, notes, recorded_at, created_at";

/// Largest page a single list request may ask for
pub const MAX_READINGS_PAGE: i64 = 1000;

/// Reading service for append-only batch histories
#[derive(Clone)]
pub struct ReadingService {
    db: PgPool,
}

impl ReadingService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Append a reading to a running batch
    ///
    /// The batch row is share-locked so a concurrent completion cannot
    /// slip in between the status check and the insert.
    pub async fn append_reading(&self, batch_id: Uuid, input: NewReading) -> AppResult<FermentationReading> {
        validate_reading(&input)?;

        let mut tx = self.db.begin().await?;
        let status: Option<String> = sqlx::query_scalar(
            "SELECT status FROM fermentation_batches WHERE id = $1 FOR SHARE",
        )
        .bind(batch_id)
        .fetch_optional(&mut *tx)
        .await?;
        let status: BatchStatus = status
            .ok_or_else(|| AppError::NotFound("Fermentation batch".to_string()))?
            .parse()?;

        if status.is_terminal() {
            return Err(AppError::IllegalState(format!(
                "Batch is {}; readings are closed",
                status
            )));
        }

        let now = Utc::now();
        let recorded_at = input.recorded_at.unwrap_or(now);
        let reading = input.into_reading(Uuid::new_v4(), batch_id, recorded_at, now);

        let row = sqlx::query_as::<_, ReadingRow>(&format!(
            r#"
            INSERT INTO fermentation_readings (
                id, batch_id, temperature, brix, ph, density, alcohol_percent,
                volatile_acidity, free_so2, total_so2, color, clarity, aroma_notes,
                source, notes, recorded_at, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            RETURNING {READING_COLUMNS}
            "#
        ))
        .bind(reading.id)
        .bind(reading.batch_id)
        .bind(reading.temperature)
        .bind(reading.brix)
        .bind(reading.ph)
        .bind(reading.density)
        .bind(reading.alcohol_percent)
        .bind(reading.volatile_acidity)
        .bind(reading.free_so2)
        .bind(reading.total_so2)
        .bind(&reading.color)
        .bind(&reading.clarity)
        .bind(&reading.aroma_notes)
        .bind(reading.source.as_str())
        .bind(&reading.notes)
        .bind(reading.recorded_at)
        .bind(reading.created_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        let reading = FermentationReading::try_from(row)?;
        tracing::debug!(
            batch_id = %batch_id,
            reading_id = %reading.id,
            source = reading.source.as_str(),
            "Reading recorded"
        );
        Ok(reading)
    }

    /// Readings newest first, ties broken by insertion order
    ///
    /// An unknown or deleted batch simply has no readings.
    pub async fn list_readings(&self, batch_id: Uuid, limit: Option<i64>) -> AppResult<Vec<FermentationReading>> {
        let limit = limit.map(|l| l.clamp(0, MAX_READINGS_PAGE));

        let rows = sqlx::query_as::<_, ReadingRow>(&format!(
            "SELECT {READING_COLUMNS} FROM fermentation_readings WHERE batch_id = $1 \
             ORDER BY recorded_at DESC, seq DESC LIMIT $2"
        ))
        .bind(batch_id)
        .bind(limit)
        .fetch_all(&self.db)
        .await?;
        convert_rows(rows)
    }

    /// Full history in insertion order, for statistics
    pub async fn history(&self, batch_id: Uuid) -> AppResult<Vec<FermentationReading>> {
        let rows = sqlx::query_as::<_, ReadingRow>(&format!(
            "SELECT {READING_COLUMNS} FROM fermentation_readings WHERE batch_id = $1 ORDER BY seq"
        ))
        .bind(batch_id)
        .fetch_all(&self.db)
        .await?;
        convert_rows(rows)
    }

    /// Latest reading of each given batch
    pub async fn latest_for(&self, batch_ids: &[Uuid]) -> AppResult<HashMap<Uuid, FermentationReading>> {
        if batch_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query_as::<_, ReadingRow>(&format!(
            "SELECT DISTINCT ON (batch_id) {READING_COLUMNS} FROM fermentation_readings \
             WHERE batch_id = ANY($1) ORDER BY batch_id, recorded_at DESC, seq DESC"
        ))
        .bind(batch_ids)
        .fetch_all(&self.db)
        .await?;

        let readings: Vec<FermentationReading> = convert_rows(rows)?;
        Ok(readings.into_iter().map(|r| (r.batch_id, r)).collect())
    }

    /// Remove a reading entered in error
    pub async fn delete_reading(&self, batch_id: Uuid, reading_id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM fermentation_readings WHERE id = $1 AND batch_id = $2")
            .bind(reading_id)
            .bind(batch_id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Reading".to_string()));
        }
        tracing::info!(batch_id = %batch_id, reading_id = %reading_id, "Reading deleted");
        Ok(())
    }
}
