//! Database models for the fermentation server
//!
//! Re-exports models from the shared crate and adds the row types that
//! map PostgreSQL columns onto them

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

pub use shared::models::*;

use crate::error::AppError;

fn corrupt(column: &str, value: &str) -> AppError {
    AppError::Internal(format!("Unexpected {} value in database: {}", column, value))
}

#[derive(Debug, sqlx::FromRow)]
pub struct TankRow {
    pub id: Uuid,
    pub name: String,
    pub capacity_liters: Decimal,
    pub material: String,
    pub status: String,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub current_batch_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<TankRow> for Tank {
    type Error = AppError;

    fn try_from(row: TankRow) -> Result<Self, Self::Error> {
        Ok(Tank {
            material: row
                .material
                .parse()
                .map_err(|_| corrupt("tank material", &row.material))?,
            status: row
                .status
                .parse()
                .map_err(|_| corrupt("tank status", &row.status))?,
            id: row.id,
            name: row.name,
            capacity_liters: row.capacity_liters,
            location: row.location,
            notes: row.notes,
            current_batch_id: row.current_batch_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct BatchRow {
    pub id: Uuid,
    pub tank_id: Uuid,
    pub harvest_id: Option<Uuid>,
    pub name: String,
    pub grape_variety: String,
    pub volume_liters: Decimal,
    pub status: String,
    pub target_temperature: Option<Decimal>,
    pub yeast_strain: Option<String>,
    pub initial_brix: Option<Decimal>,
    pub initial_ph: Option<Decimal>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub expected_end_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<BatchRow> for FermentationBatch {
    type Error = AppError;

    fn try_from(row: BatchRow) -> Result<Self, Self::Error> {
        Ok(FermentationBatch {
            status: row
                .status
                .parse()
                .map_err(|_| corrupt("batch status", &row.status))?,
            id: row.id,
            tank_id: row.tank_id,
            harvest_id: row.harvest_id,
            name: row.name,
            grape_variety: row.grape_variety,
            volume_liters: row.volume_liters,
            target_temperature: row.target_temperature,
            yeast_strain: row.yeast_strain,
            initial_brix: row.initial_brix,
            initial_ph: row.initial_ph,
            start_date: row.start_date,
            end_date: row.end_date,
            expected_end_date: row.expected_end_date,
            notes: row.notes,
            created_by: row.created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct ReadingRow {
    pub id: Uuid,
    pub batch_id: Uuid,
    pub temperature: Option<Decimal>,
    pub brix: Option<Decimal>,
    pub ph: Option<Decimal>,
    pub density: Option<Decimal>,
    pub alcohol_percent: Option<Decimal>,
    pub volatile_acidity: Option<Decimal>,
    pub free_so2: Option<Decimal>,
    pub total_so2: Option<Decimal>,
    pub color: Option<String>,
    pub clarity: Option<String>,
    pub aroma_notes: Option<String>,
    pub source: String,
    pub notes: Option<String>,
    pub recorded_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<ReadingRow> for FermentationReading {
    type Error = AppError;

    fn try_from(row: ReadingRow) -> Result<Self, Self::Error> {
        Ok(FermentationReading {
            source: row
                .source
                .parse()
                .map_err(|_| corrupt("reading source", &row.source))?,
            id: row.id,
            batch_id: row.batch_id,
            temperature: row.temperature,
            brix: row.brix,
            ph: row.ph,
            density: row.density,
            alcohol_percent: row.alcohol_percent,
            volatile_acidity: row.volatile_acidity,
            free_so2: row.free_so2,
            total_so2: row.total_so2,
            color: row.color,
            clarity: row.clarity,
            aroma_notes: row.aroma_notes,
            notes: row.notes,
            recorded_at: row.recorded_at,
            created_at: row.created_at,
        })
    }
}

/// Convert a list of rows, failing on the first corrupt one
pub fn convert_rows<R, T>(rows: Vec<R>) -> Result<Vec<T>, AppError>
where
    T: TryFrom<R, Error = AppError>,
{
    rows.into_iter().map(T::try_from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tank_row_with_unknown_status_is_internal_error() {
        let now = Utc::now();
        let row = TankRow {
            id: Uuid::new_v4(),
            name: "T1".into(),
            capacity_liters: Decimal::from(1000),
            material: "oak".into(),
            status: "flooded".into(),
            location: None,
            notes: None,
            current_batch_id: None,
            created_at: now,
            updated_at: now,
        };
        assert!(matches!(Tank::try_from(row), Err(AppError::Internal(_))));
    }
}
