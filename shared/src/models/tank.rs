//! Fermentation tank models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

use crate::error::{DomainError, DomainResult};
use crate::validation::validate_tank_changes;

/// A fermentation tank
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tank {
    pub id: Uuid,
    pub name: String,
    pub capacity_liters: Decimal,
    pub material: TankMaterial,
    pub status: TankStatus,
    pub location: Option<String>,
    pub notes: Option<String>,
    /// Batch currently occupying the tank, set only while `in_use`
    pub current_batch_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Tank {
    pub fn is_available(&self) -> bool {
        self.status == TankStatus::Available
    }

    /// Apply descriptive changes and manual status moves
    ///
    /// Status may move freely among `available`, `cleaning` and
    /// `maintenance`; `in_use` is only entered and left by starting and
    /// ending a batch. Nothing is modified when an error is returned.
    pub fn apply_changes(&mut self, changes: TankChanges, now: DateTime<Utc>) -> DomainResult<()> {
        validate_tank_changes(&changes)?;
        let material = changes
            .material
            .as_deref()
            .map(str::parse::<TankMaterial>)
            .transpose()?;
        let status = changes
            .status
            .as_deref()
            .map(str::parse::<TankStatus>)
            .transpose()?;

        if let Some(next) = status {
            if next == TankStatus::InUse {
                return Err(DomainError::illegal_state(
                    "Tanks become in_use only by starting a batch",
                ));
            }
            if self.status == TankStatus::InUse {
                return Err(DomainError::illegal_state(
                    "Tank is in use; finish or cancel its batch first",
                ));
            }
        }
        if changes.capacity_liters.is_some() && self.status == TankStatus::InUse {
            return Err(DomainError::illegal_state(
                "Capacity cannot change while the tank holds a batch",
            ));
        }

        if let Some(name) = changes.name {
            self.name = name;
        }
        if let Some(capacity) = changes.capacity_liters {
            self.capacity_liters = capacity;
        }
        if let Some(material) = material {
            self.material = material;
        }
        if let Some(status) = status {
            self.status = status;
        }
        if changes.location.is_some() {
            self.location = changes.location;
        }
        if changes.notes.is_some() {
            self.notes = changes.notes;
        }
        self.updated_at = now;
        Ok(())
    }
}

/// Tank construction material
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TankMaterial {
    StainlessSteel,
    Oak,
    Concrete,
    Fiberglass,
}

impl TankMaterial {
    pub fn as_str(&self) -> &'static str {
        match self {
            TankMaterial::StainlessSteel => "stainless_steel",
            TankMaterial::Oak => "oak",
            TankMaterial::Concrete => "concrete",
            TankMaterial::Fiberglass => "fiberglass",
        }
    }
}

impl FromStr for TankMaterial {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stainless_steel" => Ok(TankMaterial::StainlessSteel),
            "oak" => Ok(TankMaterial::Oak),
            "concrete" => Ok(TankMaterial::Concrete),
            "fiberglass" => Ok(TankMaterial::Fiberglass),
            other => Err(DomainError::validation(
                "material",
                format!("Unknown tank material: {}", other),
            )),
        }
    }
}

impl std::fmt::Display for TankMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TankMaterial::StainlessSteel => write!(f, "Stainless Steel"),
            TankMaterial::Oak => write!(f, "Oak"),
            TankMaterial::Concrete => write!(f, "Concrete"),
            TankMaterial::Fiberglass => write!(f, "Fiberglass"),
        }
    }
}

/// Operational status of a tank
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TankStatus {
    Available,
    InUse,
    Cleaning,
    Maintenance,
}

impl TankStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TankStatus::Available => "available",
            TankStatus::InUse => "in_use",
            TankStatus::Cleaning => "cleaning",
            TankStatus::Maintenance => "maintenance",
        }
    }

    /// Statuses a tank can be released into when its batch ends
    pub fn is_release_target(&self) -> bool {
        !matches!(self, TankStatus::InUse)
    }
}

impl FromStr for TankStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(TankStatus::Available),
            "in_use" => Ok(TankStatus::InUse),
            "cleaning" => Ok(TankStatus::Cleaning),
            "maintenance" => Ok(TankStatus::Maintenance),
            other => Err(DomainError::validation(
                "status",
                format!("Unknown tank status: {}", other),
            )),
        }
    }
}

impl std::fmt::Display for TankStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input for registering a tank
///
/// Enumerated fields arrive as strings so unknown values surface as
/// validation errors rather than deserialization failures.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewTank {
    #[validate(length(min = 2, message = "Name must be at least 2 characters"))]
    pub name: String,
    pub capacity_liters: Decimal,
    pub material: String,
    pub location: Option<String>,
    pub notes: Option<String>,
}

/// Partial update of a tank
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct TankChanges {
    #[validate(length(min = 2, message = "Name must be at least 2 characters"))]
    pub name: Option<String>,
    pub capacity_liters: Option<Decimal>,
    pub material: Option<String>,
    pub status: Option<String>,
    pub location: Option<String>,
    pub notes: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_material_round_trip_names() {
        for material in [
            TankMaterial::StainlessSteel,
            TankMaterial::Oak,
            TankMaterial::Concrete,
            TankMaterial::Fiberglass,
        ] {
            assert_eq!(material.as_str().parse::<TankMaterial>().unwrap(), material);
        }
    }

    #[test]
    fn test_unknown_material_is_validation_error() {
        let err = "plastic".parse::<TankMaterial>().unwrap_err();
        assert!(matches!(err, DomainError::Validation { ref field, .. } if field == "material"));
    }

    #[test]
    fn test_status_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&TankStatus::InUse).unwrap(),
            "\"in_use\""
        );
        assert!(!TankStatus::InUse.is_release_target());
        assert!(TankStatus::Cleaning.is_release_target());
    }
}
