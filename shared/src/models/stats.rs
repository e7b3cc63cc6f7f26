//! Derived statistics over a batch's reading history

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{FermentationBatch, FermentationReading};

/// Statistics computed on demand from a batch's readings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchStats {
    pub batch_id: Uuid,
    pub total_readings: u64,
    pub avg_temperature: Option<Decimal>,
    pub min_temperature: Option<Decimal>,
    pub max_temperature: Option<Decimal>,
    pub latest_brix: Option<Decimal>,
    pub latest_ph: Option<Decimal>,
    pub latest_alcohol: Option<Decimal>,
    /// Whole days from start to end (or `now` while running)
    pub duration_days: Option<i64>,
}

/// Most recent value seen so far for one sparse field
#[derive(Default)]
struct Latest {
    value: Option<(DateTime<Utc>, Decimal)>,
}

impl Latest {
    /// Later `recorded_at` wins; on a tie the later-scanned reading wins
    fn offer(&mut self, recorded_at: DateTime<Utc>, value: Option<Decimal>) {
        let Some(value) = value else { return };
        match self.value {
            Some((seen_at, _)) if seen_at > recorded_at => {}
            _ => self.value = Some((recorded_at, value)),
        }
    }

    fn get(&self) -> Option<Decimal> {
        self.value.map(|(_, v)| v)
    }
}

/// Compute batch statistics in a single pass
///
/// `readings` must be yielded in insertion order (or any order in which
/// insertion order is preserved among equal `recorded_at` values); ties on
/// `recorded_at` resolve to the later reading.
pub fn compute_batch_stats<'a, I>(
    batch: &FermentationBatch,
    readings: I,
    now: DateTime<Utc>,
) -> BatchStats
where
    I: IntoIterator<Item = &'a FermentationReading>,
{
    let mut total: u64 = 0;
    let mut temp_count: u64 = 0;
    let mut temp_sum = Decimal::ZERO;
    let mut temp_min: Option<Decimal> = None;
    let mut temp_max: Option<Decimal> = None;
    let mut brix = Latest::default();
    let mut ph = Latest::default();
    let mut alcohol = Latest::default();

    for reading in readings {
        total += 1;

        if let Some(t) = reading.temperature {
            temp_count += 1;
            temp_sum += t;
            temp_min = Some(temp_min.map_or(t, |m| m.min(t)));
            temp_max = Some(temp_max.map_or(t, |m| m.max(t)));
        }

        brix.offer(reading.recorded_at, reading.brix);
        ph.offer(reading.recorded_at, reading.ph);
        alcohol.offer(reading.recorded_at, reading.alcohol_percent);
    }

    let avg_temperature = if temp_count > 0 {
        Some(temp_sum / Decimal::from(temp_count))
    } else {
        None
    };

    BatchStats {
        batch_id: batch.id,
        total_readings: total,
        avg_temperature,
        min_temperature: temp_min,
        max_temperature: temp_max,
        latest_brix: brix.get(),
        latest_ph: ph.get(),
        latest_alcohol: alcohol.get(),
        duration_days: duration_days(batch.start_date, batch.end_date, now),
    }
}

/// Whole days between start and end (or `now`), never negative
pub fn duration_days(
    start_date: Option<DateTime<Utc>>,
    end_date: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Option<i64> {
    let start = start_date?;
    let end = end_date.unwrap_or(now);
    Some((end - start).num_days().max(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BatchStatus, ReadingSource};
    use chrono::{Duration, TimeZone};

    fn day(n: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 9, 1, 6, 0, 0).unwrap() + Duration::days(n)
    }

    fn batch(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> FermentationBatch {
        FermentationBatch {
            id: Uuid::new_v4(),
            tank_id: Uuid::new_v4(),
            harvest_id: None,
            name: "Tank 3 Merlot".into(),
            grape_variety: "Merlot".into(),
            volume_liters: Decimal::from(500),
            status: BatchStatus::Active,
            target_temperature: None,
            yeast_strain: None,
            initial_brix: None,
            initial_ph: None,
            start_date: start,
            end_date: end,
            expected_end_date: None,
            notes: None,
            created_by: Uuid::new_v4(),
            created_at: day(0),
            updated_at: day(0),
        }
    }

    fn reading(at: DateTime<Utc>, temp: Option<i64>, brix: Option<i64>) -> FermentationReading {
        FermentationReading {
            id: Uuid::new_v4(),
            batch_id: Uuid::nil(),
            temperature: temp.map(Decimal::from),
            brix: brix.map(Decimal::from),
            ph: None,
            density: None,
            alcohol_percent: None,
            volatile_acidity: None,
            free_so2: None,
            total_so2: None,
            color: None,
            clarity: None,
            aroma_notes: None,
            source: ReadingSource::Manual,
            notes: None,
            recorded_at: at,
            created_at: at,
        }
    }

    #[test]
    fn test_temperature_aggregates_and_sparse_latest() {
        let b = batch(Some(day(0)), None);
        let readings = vec![
            reading(day(1), Some(18), None),
            reading(day(3), Some(20), Some(12)),
            reading(day(5), Some(22), None),
        ];

        let stats = compute_batch_stats(&b, &readings, day(6));

        assert_eq!(stats.total_readings, 3);
        assert_eq!(stats.avg_temperature, Some(Decimal::from(20)));
        assert_eq!(stats.min_temperature, Some(Decimal::from(18)));
        assert_eq!(stats.max_temperature, Some(Decimal::from(22)));
        assert_eq!(stats.latest_brix, Some(Decimal::from(12)));
        assert_eq!(stats.latest_ph, None);
        assert_eq!(stats.duration_days, Some(6));
    }

    #[test]
    fn test_no_temperature_means_absent_not_zero() {
        let b = batch(Some(day(0)), None);
        let readings = vec![reading(day(1), None, Some(20))];

        let stats = compute_batch_stats(&b, &readings, day(2));

        assert_eq!(stats.total_readings, 1);
        assert_eq!(stats.avg_temperature, None);
        assert_eq!(stats.min_temperature, None);
        assert_eq!(stats.max_temperature, None);
    }

    #[test]
    fn test_latest_uses_timestamp_not_scan_position() {
        let b = batch(Some(day(0)), None);
        // Backfilled reading appended after a newer one
        let readings = vec![
            reading(day(4), None, Some(8)),
            reading(day(2), None, Some(15)),
        ];

        let stats = compute_batch_stats(&b, &readings, day(5));
        assert_eq!(stats.latest_brix, Some(Decimal::from(8)));
    }

    #[test]
    fn test_timestamp_tie_goes_to_later_insertion() {
        let b = batch(Some(day(0)), None);
        let readings = vec![
            reading(day(2), None, Some(15)),
            reading(day(2), None, Some(14)),
        ];

        let stats = compute_batch_stats(&b, &readings, day(5));
        assert_eq!(stats.latest_brix, Some(Decimal::from(14)));
    }

    #[test]
    fn test_duration_uses_end_date_and_truncates() {
        let end = day(9) + Duration::hours(23);
        assert_eq!(duration_days(Some(day(0)), Some(end), day(30)), Some(9));
        assert_eq!(duration_days(None, Some(end), day(30)), None);
        assert_eq!(duration_days(Some(day(3)), None, day(1)), Some(0));
    }

    #[test]
    fn test_empty_history() {
        let b = batch(None, None);
        let stats = compute_batch_stats(&b, std::iter::empty(), day(1));
        assert_eq!(stats.total_readings, 0);
        assert_eq!(stats.latest_brix, None);
        assert_eq!(stats.duration_days, None);
    }
}
