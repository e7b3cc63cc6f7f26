//! Fermentation batch service
//!
//! Keeps tank occupancy and batch status in step inside PostgreSQL
//! transactions: a batch is only inserted after its tank row was flipped
//! from `available` to `in_use`, and a tank is only released by the
//! transaction that ends its batch.

use chrono::Utc;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use shared::validation::{validate_new_batch, validate_volume_fits};

use crate::error::{AppError, AppResult};
use crate::models::{
    convert_rows, BatchChanges, BatchRow, BatchStatus, BatchWithLatestReading,
    FermentationBatch, NewBatch, TankStatus, Transition,
};
use crate::services::reading::ReadingService;

pub(crate) const BATCH_COLUMNS: &str = "id, tank_id, harvest_id, name, grape_variety, \
     volume_liters, status, target_temperature, yeast_strain, initial_brix, initial_ph, \
     start_date, end_date, expected_end_date, notes, created_by, created_at, updated_at";

/// Batch service for the fermentation lifecycle
#[derive(Clone)]
pub struct BatchService {
    db: PgPool,
}

impl BatchService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Start a batch and claim its tank in one transaction
    pub async fn create_batch(&self, created_by: Uuid, input: NewBatch) -> AppResult<FermentationBatch> {
        validate_new_batch(&input)?;

        let batch_id = Uuid::new_v4();
        let mut tx = self.db.begin().await?;

        // Check-and-set on the tank row; concurrent creators serialize here
        let capacity: Option<rust_decimal::Decimal> = sqlx::query_scalar(
            r#"
            UPDATE tanks
            SET status = 'in_use', current_batch_id = $2, updated_at = NOW()
            WHERE id = $1 AND status = 'available'
            RETURNING capacity_liters
            "#,
        )
        .bind(input.tank_id)
        .bind(batch_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(capacity) = capacity else {
            let status: Option<String> =
                sqlx::query_scalar("SELECT status FROM tanks WHERE id = $1")
                    .bind(input.tank_id)
                    .fetch_optional(&mut *tx)
                    .await?;
            return Err(match status {
                None => AppError::NotFound("Tank".to_string()),
                Some(status) => {
                    AppError::Conflict(format!("Tank is not available (status: {})", status))
                }
            });
        };

        // Dropping the transaction rolls back the reservation
        validate_volume_fits(input.volume_liters, capacity)?;

        let now = Utc::now();
        let row = sqlx::query_as::<_, BatchRow>(&format!(
            r#"
            INSERT INTO fermentation_batches (
                id, tank_id, harvest_id, name, grape_variety, volume_liters, status,
                target_temperature, yeast_strain, initial_brix, initial_ph,
                start_date, expected_end_date, notes, created_by, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, 'active', $7, $8, $9, $10, $11, $12, $13, $14, $11, $11)
            RETURNING {BATCH_COLUMNS}
            "#
        ))
        .bind(batch_id)
        .bind(input.tank_id)
        .bind(input.harvest_id)
        .bind(&input.name)
        .bind(&input.grape_variety)
        .bind(input.volume_liters)
        .bind(input.target_temperature)
        .bind(&input.yeast_strain)
        .bind(input.initial_brix)
        .bind(input.initial_ph)
        .bind(now)
        .bind(input.expected_end_date)
        .bind(&input.notes)
        .bind(created_by)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_unique_violation)?;

        tx.commit().await?;

        let batch = FermentationBatch::try_from(row)?;
        tracing::info!(
            batch_id = %batch.id,
            tank_id = %batch.tank_id,
            volume_liters = %batch.volume_liters,
            "Fermentation batch started"
        );
        Ok(batch)
    }

    /// Every batch, newest first
    pub async fn list_batches(&self) -> AppResult<Vec<FermentationBatch>> {
        let rows = sqlx::query_as::<_, BatchRow>(&format!(
            "SELECT {BATCH_COLUMNS} FROM fermentation_batches ORDER BY created_at DESC, id"
        ))
        .fetch_all(&self.db)
        .await?;
        convert_rows(rows)
    }

    /// Batch history of one tank, newest first
    pub async fn list_by_tank(&self, tank_id: Uuid) -> AppResult<Vec<FermentationBatch>> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM tanks WHERE id = $1)")
            .bind(tank_id)
            .fetch_one(&self.db)
            .await?;
        if !exists {
            return Err(AppError::NotFound("Tank".to_string()));
        }

        let rows = sqlx::query_as::<_, BatchRow>(&format!(
            "SELECT {BATCH_COLUMNS} FROM fermentation_batches WHERE tank_id = $1 \
             ORDER BY created_at DESC, id"
        ))
        .bind(tank_id)
        .fetch_all(&self.db)
        .await?;
        convert_rows(rows)
    }

    /// Active batches with their latest reading, most recently started first
    pub async fn list_active(&self) -> AppResult<Vec<BatchWithLatestReading>> {
        let rows = sqlx::query_as::<_, BatchRow>(&format!(
            "SELECT {BATCH_COLUMNS} FROM fermentation_batches \
             WHERE status = 'active' ORDER BY start_date DESC NULLS LAST, id"
        ))
        .fetch_all(&self.db)
        .await?;
        let batches: Vec<FermentationBatch> = convert_rows(rows)?;

        let ids: Vec<Uuid> = batches.iter().map(|b| b.id).collect();
        let mut latest = ReadingService::new(self.db.clone()).latest_for(&ids).await?;

        Ok(batches
            .into_iter()
            .map(|batch| {
                let latest_reading = latest.remove(&batch.id);
                BatchWithLatestReading {
                    batch,
                    latest_reading,
                }
            })
            .collect())
    }

    pub async fn get_batch(&self, batch_id: Uuid) -> AppResult<FermentationBatch> {
        let row = sqlx::query_as::<_, BatchRow>(&format!(
            "SELECT {BATCH_COLUMNS} FROM fermentation_batches WHERE id = $1"
        ))
        .bind(batch_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Fermentation batch".to_string()))?;
        FermentationBatch::try_from(row)
    }

    pub async fn get_with_latest(&self, batch_id: Uuid) -> AppResult<BatchWithLatestReading> {
        let batch = self.get_batch(batch_id).await?;
        let latest_reading = ReadingService::new(self.db.clone())
            .latest_for(&[batch_id])
            .await?
            .remove(&batch_id);
        Ok(BatchWithLatestReading {
            batch,
            latest_reading,
        })
    }

    /// Move a batch through its state machine
    pub async fn transition(&self, batch_id: Uuid, transition: Transition) -> AppResult<FermentationBatch> {
        let mut tx = self.db.begin().await?;
        let mut batch = lock_batch(&mut tx, batch_id).await?;

        let release = batch.apply_transition(transition, Utc::now())?;
        finish(&mut tx, &batch, release).await?;

        tx.commit().await?;
        tracing::info!(batch_id = %batch.id, status = %batch.status, "Batch status changed");
        Ok(batch)
    }

    /// Edit descriptive fields, optionally changing status in the same step
    pub async fn update_batch(&self, batch_id: Uuid, changes: BatchChanges) -> AppResult<FermentationBatch> {
        let mut tx = self.db.begin().await?;
        let mut batch = lock_batch(&mut tx, batch_id).await?;

        let release = batch.apply_update(changes, Utc::now())?;
        finish(&mut tx, &batch, release).await?;

        tx.commit().await?;
        Ok(batch)
    }

    /// Delete a finished batch; its readings go with it
    pub async fn delete_batch(&self, batch_id: Uuid) -> AppResult<()> {
        let mut tx = self.db.begin().await?;
        let batch = lock_batch(&mut tx, batch_id).await?;

        if !batch.is_terminal() {
            return Err(AppError::IllegalState(
                "Only completed or cancelled batches can be deleted".to_string(),
            ));
        }

        sqlx::query("DELETE FROM fermentation_batches WHERE id = $1")
            .bind(batch_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        tracing::info!(batch_id = %batch_id, "Batch deleted");
        Ok(())
    }
}

async fn lock_batch(tx: &mut Transaction<'_, Postgres>, batch_id: Uuid) -> AppResult<FermentationBatch> {
    let row = sqlx::query_as::<_, BatchRow>(&format!(
        "SELECT {BATCH_COLUMNS} FROM fermentation_batches WHERE id = $1 FOR UPDATE"
    ))
    .bind(batch_id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or_else(|| AppError::NotFound("Fermentation batch".to_string()))?;
    FermentationBatch::try_from(row)
}

/// Release the tank if the batch just ended, then persist the batch
async fn finish(
    tx: &mut Transaction<'_, Postgres>,
    batch: &FermentationBatch,
    release: Option<TankStatus>,
) -> AppResult<()> {
    if let Some(to) = release {
        release_tank(tx, batch, to).await?;
    }
    store_batch(tx, batch).await
}

async fn release_tank(
    tx: &mut Transaction<'_, Postgres>,
    batch: &FermentationBatch,
    to: TankStatus,
) -> AppResult<()> {
    let released = sqlx::query(
        r#"
        UPDATE tanks
        SET status = $3, current_batch_id = NULL, updated_at = NOW()
        WHERE id = $1 AND current_batch_id = $2 AND status = 'in_use'
        "#,
    )
    .bind(batch.tank_id)
    .bind(batch.id)
    .bind(to.as_str())
    .execute(&mut **tx)
    .await?;

    if released.rows_affected() == 0 {
        return Err(AppError::IllegalState(
            "Tank is not held by this batch".to_string(),
        ));
    }

    tracing::info!(tank_id = %batch.tank_id, status = %to, "Tank released");
    Ok(())
}

async fn store_batch(tx: &mut Transaction<'_, Postgres>, batch: &FermentationBatch) -> AppResult<()> {
    sqlx::query(
        r#"
        UPDATE fermentation_batches
        SET name = $2, status = $3, target_temperature = $4, yeast_strain = $5,
            end_date = $6, expected_end_date = $7, notes = $8, updated_at = $9
        WHERE id = $1
        "#,
    )
    .bind(batch.id)
    .bind(&batch.name)
    .bind(batch.status.as_str())
    .bind(batch.target_temperature)
    .bind(&batch.yeast_strain)
    .bind(batch.end_date)
    .bind(batch.expected_end_date)
    .bind(&batch.notes)
    .bind(batch.updated_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// The partial unique index backs up the tank check-and-set
fn map_unique_violation(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::Conflict("Tank already hosts a running batch".to_string())
        }
        _ => AppError::DatabaseError(err),
    }
}
