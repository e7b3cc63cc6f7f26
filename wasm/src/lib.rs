//! WebAssembly module for the Winery Console
//!
//! Provides client-side computation for:
//! - Batch statistics over loaded readings
//! - Lifecycle transition checks
//! - Offline reading and volume validation

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::str::FromStr;
use wasm_bindgen::prelude::*;

// Re-export shared types for use in JavaScript
pub use shared::models::*;
pub use shared::validation::*;

use shared::models::stats::duration_days;
use shared::DomainError;

/// Initialize the WASM module
#[wasm_bindgen(start)]
pub fn init() {
    web_sys::console::log_1(&JsValue::from_str("winery console wasm ready"));
}

fn to_js(message: String) -> JsValue {
    JsValue::from_str(&message)
}

fn parse_time(field: &str, value: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| format!("Invalid {}: {}", field, e))
}

/// Current time from the browser clock
fn browser_now() -> DateTime<Utc> {
    let millis = js_sys::Date::now() as i64;
    Utc.timestamp_millis_opt(millis).single().unwrap_or_else(Utc::now)
}

// ============================================================================
// Statistics
// ============================================================================

/// Statistics for a batch from readings listed newest first
pub fn stats_json(batch_json: &str, readings_json: &str, now: DateTime<Utc>) -> Result<String, String> {
    let batch: FermentationBatch =
        serde_json::from_str(batch_json).map_err(|e| format!("Invalid batch JSON: {}", e))?;
    let mut readings: Vec<FermentationReading> =
        serde_json::from_str(readings_json).map_err(|e| format!("Invalid readings JSON: {}", e))?;

    // The API lists newest first; aggregation wants insertion order
    readings.reverse();
    let stats = compute_batch_stats(&batch, &readings, now);
    serde_json::to_string(&stats).map_err(|e| e.to_string())
}

/// Compute batch statistics as JSON, using the browser clock for running batches
#[wasm_bindgen]
pub fn compute_stats(batch_json: &str, readings_json: &str) -> Result<String, JsValue> {
    stats_json(batch_json, readings_json, browser_now()).map_err(to_js)
}

/// Compute batch statistics as JSON at an explicit RFC 3339 instant
#[wasm_bindgen]
pub fn compute_stats_at(batch_json: &str, readings_json: &str, now: &str) -> Result<String, JsValue> {
    let now = parse_time("now", now).map_err(to_js)?;
    stats_json(batch_json, readings_json, now).map_err(to_js)
}

/// Whole days a batch has been fermenting
#[wasm_bindgen]
pub fn batch_duration_days(start_date: &str, end_date: Option<String>, now: &str) -> Option<u32> {
    let start = parse_time("start_date", start_date).ok()?;
    let end = match end_date {
        Some(end) => Some(parse_time("end_date", &end).ok()?),
        None => None,
    };
    let now = parse_time("now", now).ok()?;
    duration_days(Some(start), end, now).and_then(|d| u32::try_from(d).ok())
}

// ============================================================================
// Lifecycle
// ============================================================================

/// Whether a batch may move from `from` to `to`
#[wasm_bindgen]
pub fn can_transition(from: &str, to: &str) -> bool {
    match (BatchStatus::from_str(from), BatchStatus::from_str(to)) {
        (Ok(from), Ok(to)) => from.can_transition_to(to),
        _ => false,
    }
}

/// Statuses reachable from `from`, for populating the status menu
pub fn next_statuses(from: &str) -> Vec<&'static str> {
    let Ok(from) = BatchStatus::from_str(from) else {
        return Vec::new();
    };
    BatchStatus::ALL
        .iter()
        .filter(|next| from.can_transition_to(**next))
        .map(|next| next.as_str())
        .collect()
}

/// JSON array of statuses reachable from `from`
#[wasm_bindgen]
pub fn allowed_transitions(from: &str) -> String {
    serde_json::to_string(&next_statuses(from)).unwrap_or_else(|_| "[]".to_string())
}

// ============================================================================
// Validation
// ============================================================================

/// Outcome of validating a form before it is submitted
#[derive(Debug, Serialize, PartialEq)]
pub struct FormCheck {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl FormCheck {
    fn ok() -> Self {
        Self {
            valid: true,
            field: None,
            message: None,
        }
    }

    fn failed(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            valid: false,
            field: Some(field.into()),
            message: Some(message.into()),
        }
    }
}

impl From<DomainError> for FormCheck {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation { field, message } => FormCheck::failed(field, message),
            other => FormCheck::failed("input", other.to_string()),
        }
    }
}

/// Check a reading form against the measurement ranges
pub fn check_reading(reading_json: &str) -> FormCheck {
    let reading: NewReading = match serde_json::from_str(reading_json) {
        Ok(reading) => reading,
        Err(e) => return FormCheck::failed("input", format!("Invalid reading JSON: {}", e)),
    };
    match validate_reading(&reading) {
        Ok(()) => FormCheck::ok(),
        Err(err) => err.into(),
    }
}

/// Validate a reading form, returning a JSON `FormCheck`
#[wasm_bindgen]
pub fn validate_reading_form(reading_json: &str) -> String {
    let check = check_reading(reading_json);
    serde_json::to_string(&check).unwrap_or_else(|_| r#"{"valid":false}"#.to_string())
}

/// Whether `volume_liters` fits into a tank of `capacity_liters`
#[wasm_bindgen]
pub fn volume_fits(volume_liters: &str, capacity_liters: &str) -> bool {
    match (Decimal::from_str(volume_liters), Decimal::from_str(capacity_liters)) {
        (Ok(volume), Ok(capacity)) => {
            validate_volume(volume).is_ok() && validate_volume_fits(volume, capacity).is_ok()
        }
        _ => false,
    }
}
