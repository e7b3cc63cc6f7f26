//! Tank inventory service

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use shared::validation::validate_new_tank;

use crate::error::{AppError, AppResult};
use crate::models::{convert_rows, NewTank, Tank, TankChanges, TankMaterial, TankRow, TankStatus};

pub(crate) const TANK_COLUMNS: &str = "id, name, capacity_liters, material, status, location, \
     notes, current_batch_id, created_at, updated_at";

/// Tank service for registering and maintaining tanks
#[derive(Clone)]
pub struct TankService {
    db: PgPool,
}

impl TankService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Register a new tank in `available` status
    pub async fn create_tank(&self, input: NewTank) -> AppResult<Tank> {
        validate_new_tank(&input)?;
        let material: TankMaterial = input.material.parse()?;

        let row = sqlx::query_as::<_, TankRow>(&format!(
            r#"
            INSERT INTO tanks (id, name, capacity_liters, material, status, location, notes)
            VALUES ($1, $2, $3, $4, 'available', $5, $6)
            RETURNING {TANK_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&input.name)
        .bind(input.capacity_liters)
        .bind(material.as_str())
        .bind(&input.location)
        .bind(&input.notes)
        .fetch_one(&self.db)
        .await?;

        let tank = Tank::try_from(row)?;
        tracing::info!(tank_id = %tank.id, name = %tank.name, "Tank registered");
        Ok(tank)
    }

    /// All tanks ordered by name
    pub async fn list_tanks(&self) -> AppResult<Vec<Tank>> {
        let rows = sqlx::query_as::<_, TankRow>(&format!(
            "SELECT {TANK_COLUMNS} FROM tanks ORDER BY name, id"
        ))
        .fetch_all(&self.db)
        .await?;
        convert_rows(rows)
    }

    /// Tanks ready to receive a batch
    pub async fn list_available(&self) -> AppResult<Vec<Tank>> {
        let rows = sqlx::query_as::<_, TankRow>(&format!(
            "SELECT {TANK_COLUMNS} FROM tanks WHERE status = 'available' ORDER BY name, id"
        ))
        .fetch_all(&self.db)
        .await?;
        convert_rows(rows)
    }

    pub async fn get_tank(&self, tank_id: Uuid) -> AppResult<Tank> {
        let row = sqlx::query_as::<_, TankRow>(&format!(
            "SELECT {TANK_COLUMNS} FROM tanks WHERE id = $1"
        ))
        .bind(tank_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Tank".to_string()))?;
        Tank::try_from(row)
    }

    /// Update descriptive fields or move between non-occupied statuses
    pub async fn update_tank(&self, tank_id: Uuid, changes: TankChanges) -> AppResult<Tank> {
        let mut tx = self.db.begin().await?;

        let row = sqlx::query_as::<_, TankRow>(&format!(
            "SELECT {TANK_COLUMNS} FROM tanks WHERE id = $1 FOR UPDATE"
        ))
        .bind(tank_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Tank".to_string()))?;

        let mut tank = Tank::try_from(row)?;
        tank.apply_changes(changes, Utc::now())?;

        sqlx::query(
            r#"
            UPDATE tanks
            SET name = $2, capacity_liters = $3, material = $4, status = $5,
                location = $6, notes = $7, updated_at = $8
            WHERE id = $1
            "#,
        )
        .bind(tank.id)
        .bind(&tank.name)
        .bind(tank.capacity_liters)
        .bind(tank.material.as_str())
        .bind(tank.status.as_str())
        .bind(&tank.location)
        .bind(&tank.notes)
        .bind(tank.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(tank)
    }

    /// Delete a tank with no running batch and no batch history
    pub async fn delete_tank(&self, tank_id: Uuid) -> AppResult<()> {
        let mut tx = self.db.begin().await?;

        let status: Option<String> =
            sqlx::query_scalar("SELECT status FROM tanks WHERE id = $1 FOR UPDATE")
                .bind(tank_id)
                .fetch_optional(&mut *tx)
                .await?;
        let status = status.ok_or_else(|| AppError::NotFound("Tank".to_string()))?;

        if status == TankStatus::InUse.as_str() {
            return Err(AppError::Conflict(
                "Tank hosts an active fermentation batch".to_string(),
            ));
        }

        let history: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM fermentation_batches WHERE tank_id = $1")
                .bind(tank_id)
                .fetch_one(&mut *tx)
                .await?;
        if history > 0 {
            return Err(AppError::Conflict(
                "Tank has fermentation history and cannot be deleted".to_string(),
            ));
        }

        sqlx::query("DELETE FROM tanks WHERE id = $1")
            .bind(tank_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        tracing::info!(tank_id = %tank_id, "Tank deleted");
        Ok(())
    }
}
