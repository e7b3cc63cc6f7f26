//! Validation rules for tanks, batches and readings
//!
//! Measurement ranges follow common winery lab practice.

use rust_decimal::Decimal;
use validator::Validate;

use crate::error::{DomainError, DomainResult};
use crate::models::{BatchChanges, NewBatch, NewReading, NewTank, TankChanges};

// ============================================================================
// Measurement Ranges
// ============================================================================

/// Inclusive range for one measurement field
///
/// `scale` is the number of fractional digits the column stores; finer
/// values are rejected instead of being rounded on insert.
#[derive(Debug, Clone, Copy)]
pub struct MeasurementRange {
    pub field: &'static str,
    pub min: Decimal,
    pub max: Decimal,
    pub scale: u32,
    pub unit: &'static str,
}

impl MeasurementRange {
    const fn new(
        field: &'static str,
        min: Decimal,
        max: Decimal,
        scale: u32,
        unit: &'static str,
    ) -> Self {
        Self {
            field,
            min,
            max,
            scale,
            unit,
        }
    }

    /// Same bounds reported under another field name
    pub const fn named(self, field: &'static str) -> Self {
        Self { field, ..self }
    }

    pub fn check(&self, value: Option<Decimal>) -> DomainResult<()> {
        let Some(v) = value else {
            return Ok(());
        };
        if v < self.min || v > self.max {
            return Err(DomainError::validation(
                self.field,
                format!(
                    "{} must be between {} and {}{}",
                    self.field, self.min, self.max, self.unit
                ),
            ));
        }
        check_scale(self.field, v, self.scale)
    }
}

/// Reject values with more fractional digits than the column keeps
fn check_scale(field: &'static str, value: Decimal, scale: u32) -> DomainResult<()> {
    if value.normalize().scale() > scale {
        return Err(DomainError::validation(
            field,
            format!("{} allows at most {} decimal places", field, scale),
        ));
    }
    Ok(())
}

/// Whole-number decimal usable in const context
const fn whole(n: u32) -> Decimal {
    Decimal::from_parts(n, 0, 0, false, 0)
}

/// Decimal with one fractional digit usable in const context
const fn tenths(n: u32) -> Decimal {
    Decimal::from_parts(n, 0, 0, false, 1)
}

pub const TEMPERATURE_RANGE: MeasurementRange = MeasurementRange::new(
    "temperature",
    Decimal::from_parts(5, 0, 0, true, 0),
    whole(45),
    2,
    "°C",
);
pub const TARGET_TEMPERATURE_RANGE: MeasurementRange =
    MeasurementRange::new("target_temperature", whole(5), whole(35), 2, "°C");
pub const BRIX_RANGE: MeasurementRange =
    MeasurementRange::new("brix", Decimal::ZERO, whole(50), 2, " °Bx");
pub const PH_RANGE: MeasurementRange =
    MeasurementRange::new("ph", Decimal::ZERO, whole(14), 2, "");
pub const DENSITY_RANGE: MeasurementRange =
    MeasurementRange::new("density", tenths(8), tenths(12), 4, " g/mL");
pub const ALCOHOL_RANGE: MeasurementRange =
    MeasurementRange::new("alcohol_percent", Decimal::ZERO, whole(22), 2, "%");
pub const VOLATILE_ACIDITY_RANGE: MeasurementRange =
    MeasurementRange::new("volatile_acidity", Decimal::ZERO, whole(3), 2, " g/L");
pub const FREE_SO2_RANGE: MeasurementRange =
    MeasurementRange::new("free_so2", Decimal::ZERO, whole(100), 2, " mg/L");
pub const TOTAL_SO2_RANGE: MeasurementRange =
    MeasurementRange::new("total_so2", Decimal::ZERO, whole(350), 2, " mg/L");

/// Largest tank capacity or batch volume a `NUMERIC(12,2)` column holds
pub const MAX_LITERS: Decimal = Decimal::from_parts(0xD4A5_0FFF, 0xE8, 0, false, 2);

/// Fractional digits kept for liters
pub const LITERS_SCALE: u32 = 2;

/// Shared bounds for capacity and volume amounts
fn check_liters(field: &'static str, label: &str, liters: Decimal) -> DomainResult<()> {
    if liters <= Decimal::ZERO {
        return Err(DomainError::validation(
            field,
            format!("{} must be greater than 0 liters", label),
        ));
    }
    if liters > MAX_LITERS {
        return Err(DomainError::validation(
            field,
            format!("{} must not exceed {} liters", label, MAX_LITERS),
        ));
    }
    check_scale(field, liters, LITERS_SCALE)
}

// ============================================================================
// Tank Validations
// ============================================================================

/// Validate tank capacity is positive and storable
pub fn validate_capacity(capacity_liters: Decimal) -> DomainResult<()> {
    check_liters("capacity_liters", "Capacity", capacity_liters)
}

/// Validate a tank registration
pub fn validate_new_tank(input: &NewTank) -> DomainResult<()> {
    input.validate()?;
    validate_capacity(input.capacity_liters)?;
    input.material.parse::<crate::models::TankMaterial>()?;
    Ok(())
}

/// Validate a tank update
pub fn validate_tank_changes(changes: &TankChanges) -> DomainResult<()> {
    changes.validate()?;
    if let Some(capacity) = changes.capacity_liters {
        validate_capacity(capacity)?;
    }
    if let Some(material) = &changes.material {
        material.parse::<crate::models::TankMaterial>()?;
    }
    if let Some(status) = &changes.status {
        status.parse::<crate::models::TankStatus>()?;
    }
    Ok(())
}

// ============================================================================
// Batch Validations
// ============================================================================

/// Validate batch volume is positive and storable
pub fn validate_volume(volume_liters: Decimal) -> DomainResult<()> {
    check_liters("volume_liters", "Volume", volume_liters)
}

/// Validate a batch fits into the tank it is assigned to
pub fn validate_volume_fits(volume_liters: Decimal, capacity_liters: Decimal) -> DomainResult<()> {
    if volume_liters > capacity_liters {
        return Err(DomainError::validation(
            "volume_liters",
            format!(
                "Volume ({} L) exceeds tank capacity ({} L)",
                volume_liters, capacity_liters
            ),
        ));
    }
    Ok(())
}

/// Validate a batch creation request (tank-independent checks)
pub fn validate_new_batch(input: &NewBatch) -> DomainResult<()> {
    input.validate()?;
    validate_volume(input.volume_liters)?;
    TARGET_TEMPERATURE_RANGE.check(input.target_temperature)?;
    BRIX_RANGE.named("initial_brix").check(input.initial_brix)?;
    PH_RANGE.named("initial_ph").check(input.initial_ph)?;
    Ok(())
}

/// Validate a batch update
pub fn validate_batch_changes(changes: &BatchChanges) -> DomainResult<()> {
    changes.validate()?;
    TARGET_TEMPERATURE_RANGE.check(changes.target_temperature)?;
    Ok(())
}

// ============================================================================
// Reading Validations
// ============================================================================

/// Validate every populated measurement of a reading
pub fn validate_reading(input: &NewReading) -> DomainResult<()> {
    TEMPERATURE_RANGE.check(input.temperature)?;
    BRIX_RANGE.check(input.brix)?;
    PH_RANGE.check(input.ph)?;
    DENSITY_RANGE.check(input.density)?;
    ALCOHOL_RANGE.check(input.alcohol_percent)?;
    VOLATILE_ACIDITY_RANGE.check(input.volatile_acidity)?;
    FREE_SO2_RANGE.check(input.free_so2)?;
    TOTAL_SO2_RANGE.check(input.total_so2)?;
    Ok(())
}
