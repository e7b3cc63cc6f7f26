//! Append-only reading history per batch

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::{DomainError, DomainResult};
use crate::models::{FermentationBatch, FermentationReading, NewReading};
use crate::validation::validate_reading;

struct Entry {
    seq: u64,
    reading: Arc<FermentationReading>,
}

impl Entry {
    fn key(&self) -> (DateTime<Utc>, u64) {
        (self.reading.recorded_at, self.seq)
    }
}

/// Readings of one batch, ascending by `(recorded_at, seq)`
#[derive(Default)]
struct Series {
    next_seq: u64,
    entries: Vec<Entry>,
}

impl Series {
    fn insert(&mut self, reading: FermentationReading) -> Arc<FermentationReading> {
        let seq = self.next_seq;
        self.next_seq += 1;
        let key = (reading.recorded_at, seq);
        let reading = Arc::new(reading);
        let at = self.entries.partition_point(|e| e.key() <= key);
        self.entries.insert(
            at,
            Entry {
                seq,
                reading: Arc::clone(&reading),
            },
        );
        reading
    }
}

/// Stores readings; appends to different batches never contend
pub struct ReadingStore {
    series: RwLock<HashMap<Uuid, Arc<Mutex<Series>>>>,
    clock: Option<Arc<dyn Clock>>,
}

impl ReadingStore {
    /// `clock` stamps readings that arrive without `recorded_at`;
    /// with no clock such readings are rejected.
    pub fn new(clock: Option<Arc<dyn Clock>>) -> Self {
        Self {
            series: RwLock::new(HashMap::new()),
            clock,
        }
    }

    fn series_for(&self, batch_id: Uuid) -> Arc<Mutex<Series>> {
        if let Some(series) = self.series.read().get(&batch_id) {
            return Arc::clone(series);
        }
        Arc::clone(self.series.write().entry(batch_id).or_default())
    }

    fn existing(&self, batch_id: Uuid) -> Option<Arc<Mutex<Series>>> {
        self.series.read().get(&batch_id).cloned()
    }

    /// Append a reading to a non-terminal batch
    ///
    /// The caller must hold the batch so its status cannot change mid-append.
    pub fn append(
        &self,
        batch: &FermentationBatch,
        input: NewReading,
    ) -> DomainResult<FermentationReading> {
        if batch.is_terminal() {
            return Err(DomainError::illegal_state(format!(
                "Batch is {}; readings are closed",
                batch.status
            )));
        }
        validate_reading(&input)?;

        let now = self.clock.as_ref().map(|c| c.now());
        let recorded_at = input.recorded_at.or(now).ok_or_else(|| {
            DomainError::validation("recorded_at", "recorded_at is required")
        })?;
        let created_at = now.unwrap_or(recorded_at);

        let reading = input.into_reading(Uuid::new_v4(), batch.id, recorded_at, created_at);
        let stored = self.series_for(batch.id).lock().insert(reading);
        Ok(stored.as_ref().clone())
    }

    /// Readings newest first, optionally capped at `limit`
    pub fn list_by_batch(&self, batch_id: Uuid, limit: Option<usize>) -> Vec<FermentationReading> {
        let Some(series) = self.existing(batch_id) else {
            return Vec::new();
        };
        let series = series.lock();
        series
            .entries
            .iter()
            .rev()
            .take(limit.unwrap_or(usize::MAX))
            .map(|e| e.reading.as_ref().clone())
            .collect()
    }

    /// Most recent reading by `recorded_at`, later insertion winning ties
    pub fn latest(&self, batch_id: Uuid) -> Option<FermentationReading> {
        let series = self.existing(batch_id)?;
        let series = series.lock();
        series.entries.last().map(|e| e.reading.as_ref().clone())
    }

    /// Readings in insertion order, for single-pass aggregation
    pub fn snapshot(&self, batch_id: Uuid) -> Vec<Arc<FermentationReading>> {
        let Some(series) = self.existing(batch_id) else {
            return Vec::new();
        };
        let series = series.lock();
        let mut entries: Vec<(u64, Arc<FermentationReading>)> = series
            .entries
            .iter()
            .map(|e| (e.seq, Arc::clone(&e.reading)))
            .collect();
        entries.sort_by_key(|(seq, _)| *seq);
        entries.into_iter().map(|(_, r)| r).collect()
    }

    pub fn count(&self, batch_id: Uuid) -> usize {
        match self.existing(batch_id) {
            Some(series) => {
                let len = series.lock().entries.len();
                len
            }
            None => 0,
        }
    }

    /// Remove a single reading entered in error
    pub fn delete(&self, batch_id: Uuid, reading_id: Uuid) -> DomainResult<FermentationReading> {
        let series = self
            .existing(batch_id)
            .ok_or_else(|| DomainError::not_found("Reading"))?;
        let mut series = series.lock();
        let at = series
            .entries
            .iter()
            .position(|e| e.reading.id == reading_id)
            .ok_or_else(|| DomainError::not_found("Reading"))?;
        let entry = series.entries.remove(at);
        Ok(entry.reading.as_ref().clone())
    }

    /// Drop the whole history of a batch, returning how many readings went
    pub fn remove_batch(&self, batch_id: Uuid) -> usize {
        let removed = self.series.write().remove(&batch_id);
        match removed {
            Some(series) => {
                let len = series.lock().entries.len();
                len
            }
            None => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::models::BatchStatus;
    use chrono::{Duration, TimeZone};
    use rust_decimal::Decimal;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 9, 10, 8, 0, 0).unwrap()
    }

    fn batch(status: BatchStatus) -> FermentationBatch {
        FermentationBatch {
            id: Uuid::new_v4(),
            tank_id: Uuid::new_v4(),
            harvest_id: None,
            name: "Syrah lot 2".into(),
            grape_variety: "Syrah".into(),
            volume_liters: Decimal::from(800),
            status,
            target_temperature: None,
            yeast_strain: None,
            initial_brix: None,
            initial_ph: None,
            start_date: Some(t0()),
            end_date: None,
            expected_end_date: None,
            notes: None,
            created_by: Uuid::new_v4(),
            created_at: t0(),
            updated_at: t0(),
        }
    }

    fn brix_at(brix: i64, at: Option<DateTime<Utc>>) -> NewReading {
        NewReading {
            brix: Some(Decimal::from(brix)),
            recorded_at: at,
            ..Default::default()
        }
    }

    #[test]
    fn test_list_is_newest_first_with_backfill() {
        let store = ReadingStore::new(None);
        let b = batch(BatchStatus::Active);

        store.append(&b, brix_at(20, Some(t0() + Duration::hours(1)))).unwrap();
        store.append(&b, brix_at(15, Some(t0() + Duration::hours(3)))).unwrap();
        store.append(&b, brix_at(18, Some(t0() + Duration::hours(2)))).unwrap();

        let brix: Vec<Decimal> = store
            .list_by_batch(b.id, None)
            .into_iter()
            .filter_map(|r| r.brix)
            .collect();
        assert_eq!(brix, vec![Decimal::from(15), Decimal::from(18), Decimal::from(20)]);

        assert_eq!(store.list_by_batch(b.id, Some(1)).len(), 1);
        assert_eq!(store.latest(b.id).unwrap().brix, Some(Decimal::from(15)));

        let insertion: Vec<Decimal> = store.snapshot(b.id).iter().filter_map(|r| r.brix).collect();
        assert_eq!(insertion, vec![Decimal::from(20), Decimal::from(15), Decimal::from(18)]);
    }

    #[test]
    fn test_equal_timestamps_later_insert_is_latest() {
        let store = ReadingStore::new(None);
        let b = batch(BatchStatus::Active);
        store.append(&b, brix_at(10, Some(t0()))).unwrap();
        let second = store.append(&b, brix_at(9, Some(t0()))).unwrap();

        assert_eq!(store.latest(b.id).unwrap().id, second.id);
        assert_eq!(store.list_by_batch(b.id, None)[0].id, second.id);
    }

    #[test]
    fn test_terminal_batch_rejects_readings() {
        let store = ReadingStore::new(None);
        for status in [BatchStatus::Completed, BatchStatus::Cancelled] {
            let b = batch(status);
            let err = store.append(&b, brix_at(5, Some(t0()))).unwrap_err();
            assert!(matches!(err, DomainError::IllegalState(_)));
            assert_eq!(store.count(b.id), 0);
        }
    }

    #[test]
    fn test_paused_batch_accepts_readings() {
        let store = ReadingStore::new(None);
        let b = batch(BatchStatus::Paused);
        assert!(store.append(&b, brix_at(5, Some(t0()))).is_ok());
    }

    #[test]
    fn test_recorded_at_defaults_to_clock() {
        let clock = Arc::new(ManualClock::new(t0()));
        let store = ReadingStore::new(Some(clock.clone() as Arc<dyn Clock>));
        let b = batch(BatchStatus::Active);

        let reading = store.append(&b, brix_at(20, None)).unwrap();
        assert_eq!(reading.recorded_at, t0());

        let without_clock = ReadingStore::new(None);
        let err = without_clock.append(&b, brix_at(20, None)).unwrap_err();
        assert!(matches!(err, DomainError::Validation { ref field, .. } if field == "recorded_at"));
    }

    #[test]
    fn test_out_of_range_reading_not_stored() {
        let store = ReadingStore::new(None);
        let b = batch(BatchStatus::Active);
        let input = NewReading {
            ph: Some(Decimal::from(15)),
            recorded_at: Some(t0()),
            ..Default::default()
        };
        assert!(store.append(&b, input).is_err());
        assert_eq!(store.count(b.id), 0);
    }

    #[test]
    fn test_delete_and_remove_batch() {
        let store = ReadingStore::new(None);
        let b = batch(BatchStatus::Active);
        let first = store.append(&b, brix_at(20, Some(t0()))).unwrap();
        store.append(&b, brix_at(19, Some(t0() + Duration::hours(1)))).unwrap();

        store.delete(b.id, first.id).unwrap();
        assert!(matches!(
            store.delete(b.id, first.id),
            Err(DomainError::NotFound(_))
        ));
        assert_eq!(store.count(b.id), 1);

        assert_eq!(store.remove_batch(b.id), 1);
        assert!(store.list_by_batch(b.id, None).is_empty());
    }
}
