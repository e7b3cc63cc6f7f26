//! Fermentation reading models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::error::DomainError;

/// One timestamped observation of a batch
///
/// Every measurement is optional; manual readings usually carry a few
/// chemistry values, sensor readings only temperature.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FermentationReading {
    pub id: Uuid,
    pub batch_id: Uuid,
    /// Temperature in °C
    pub temperature: Option<Decimal>,
    pub brix: Option<Decimal>,
    pub ph: Option<Decimal>,
    /// Specific gravity in g/mL
    pub density: Option<Decimal>,
    pub alcohol_percent: Option<Decimal>,
    pub volatile_acidity: Option<Decimal>,
    /// mg/L
    pub free_so2: Option<Decimal>,
    /// mg/L
    pub total_so2: Option<Decimal>,
    pub color: Option<String>,
    pub clarity: Option<String>,
    pub aroma_notes: Option<String>,
    pub source: ReadingSource,
    pub notes: Option<String>,
    pub recorded_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Where a reading came from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReadingSource {
    #[default]
    Manual,
    Iot,
}

impl ReadingSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReadingSource::Manual => "manual",
            ReadingSource::Iot => "iot",
        }
    }
}

impl FromStr for ReadingSource {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual" => Ok(ReadingSource::Manual),
            "iot" => Ok(ReadingSource::Iot),
            other => Err(DomainError::validation(
                "source",
                format!("Unknown reading source: {}", other),
            )),
        }
    }
}

/// Input for appending a reading to a batch
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewReading {
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
    pub notes: Option<String>,
    /// Set by the receiving endpoint, never taken from the request body
    #[serde(skip)]
    pub source: ReadingSource,
    pub recorded_at: Option<DateTime<Utc>>,
}

impl NewReading {
    /// Sensor reading carrying only a temperature
    pub fn iot_temperature(temperature: Decimal, recorded_at: Option<DateTime<Utc>>) -> Self {
        Self {
            temperature: Some(temperature),
            source: ReadingSource::Iot,
            recorded_at,
            ..Default::default()
        }
    }

    /// Materialize the reading with its assigned identity and timestamp
    pub fn into_reading(
        self,
        id: Uuid,
        batch_id: Uuid,
        recorded_at: DateTime<Utc>,
        created_at: DateTime<Utc>,
    ) -> FermentationReading {
        FermentationReading {
            id,
            batch_id,
            temperature: self.temperature,
            brix: self.brix,
            ph: self.ph,
            density: self.density,
            alcohol_percent: self.alcohol_percent,
            volatile_acidity: self.volatile_acidity,
            free_so2: self.free_so2,
            total_so2: self.total_so2,
            color: self.color,
            clarity: self.clarity,
            aroma_notes: self.aroma_notes,
            source: self.source,
            notes: self.notes,
            recorded_at,
            created_at,
        }
    }
}

/// Payload posted by tank sensors
#[derive(Debug, Clone, Deserialize)]
pub struct IotReading {
    pub batch_id: Uuid,
    pub temperature: Decimal,
    pub recorded_at: Option<DateTime<Utc>>,
}
