//! Batch lifecycle: creation, status transitions and tank hand-off

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::{DomainError, DomainResult};
use crate::models::{
    BatchChanges, BatchStatus, BatchWithLatestReading, FermentationBatch, FermentationReading,
    NewBatch, NewReading, Tank, TankStatus, Transition,
};
use crate::validation::validate_new_batch;

use super::readings::ReadingStore;
use super::tanks::TankRegistry;

type BatchCell = Arc<RwLock<FermentationBatch>>;

/// Owns batches and coordinates them with tanks and readings
///
/// Lock order: batch map, then a batch, then the tank registry.
pub struct BatchLifecycle {
    batches: RwLock<HashMap<Uuid, BatchCell>>,
    tanks: Arc<TankRegistry>,
    readings: Arc<ReadingStore>,
    clock: Arc<dyn Clock>,
}

impl BatchLifecycle {
    pub fn new(tanks: Arc<TankRegistry>, readings: Arc<ReadingStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            batches: RwLock::new(HashMap::new()),
            tanks,
            readings,
            clock,
        }
    }

    fn cell(&self, batch_id: Uuid) -> DomainResult<BatchCell> {
        self.batches
            .read()
            .get(&batch_id)
            .cloned()
            .ok_or_else(|| DomainError::not_found("Fermentation batch"))
    }

    /// Start a batch, claiming its tank in the same step
    pub fn create(&self, created_by: Uuid, input: NewBatch) -> DomainResult<FermentationBatch> {
        validate_new_batch(&input)?;

        let now = self.clock.now();
        let batch = FermentationBatch {
            id: Uuid::new_v4(),
            tank_id: input.tank_id,
            harvest_id: input.harvest_id,
            name: input.name,
            grape_variety: input.grape_variety,
            volume_liters: input.volume_liters,
            status: BatchStatus::Active,
            target_temperature: input.target_temperature,
            yeast_strain: input.yeast_strain,
            initial_brix: input.initial_brix,
            initial_ph: input.initial_ph,
            start_date: Some(now),
            end_date: None,
            expected_end_date: input.expected_end_date,
            notes: input.notes,
            created_by,
            created_at: now,
            updated_at: now,
        };

        let mut batches = self.batches.write();
        self.tanks
            .reserve(batch.tank_id, batch.id, batch.volume_liters)?;
        batches.insert(batch.id, Arc::new(RwLock::new(batch.clone())));

        Ok(batch)
    }

    pub fn get(&self, batch_id: Uuid) -> DomainResult<FermentationBatch> {
        let cell = self.cell(batch_id)?;
        let batch = cell.read().clone();
        Ok(batch)
    }

    pub fn get_with_latest(&self, batch_id: Uuid) -> DomainResult<BatchWithLatestReading> {
        let batch = self.get(batch_id)?;
        let latest_reading = self.readings.latest(batch_id);
        Ok(BatchWithLatestReading {
            batch,
            latest_reading,
        })
    }

    fn collect<F>(&self, keep: F) -> Vec<FermentationBatch>
    where
        F: Fn(&FermentationBatch) -> bool,
    {
        let cells: Vec<BatchCell> = self.batches.read().values().cloned().collect();
        cells
            .iter()
            .map(|cell| cell.read().clone())
            .filter(|b| keep(b))
            .collect()
    }

    /// Every batch, newest first
    pub fn list_all(&self) -> Vec<FermentationBatch> {
        let mut batches = self.collect(|_| true);
        batches.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        batches
    }

    /// Batch history of one tank, newest first
    pub fn list_by_tank(&self, tank_id: Uuid) -> Vec<FermentationBatch> {
        let mut batches = self.collect(|b| b.tank_id == tank_id);
        batches.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        batches
    }

    /// Batches in `active` status with their latest reading,
    /// most recently started first
    pub fn list_active(&self) -> Vec<BatchWithLatestReading> {
        let mut batches = self.collect(|b| b.status == BatchStatus::Active);
        batches.sort_by(|a, b| b.start_date.cmp(&a.start_date).then_with(|| a.id.cmp(&b.id)));
        batches
            .into_iter()
            .map(|batch| {
                let latest_reading = self.readings.latest(batch.id);
                BatchWithLatestReading {
                    batch,
                    latest_reading,
                }
            })
            .collect()
    }

    /// Move a batch through its state machine
    ///
    /// Ending a batch stamps `end_date` (unless one is given) and releases
    /// the tank to `release_tank_to`.
    pub fn transition(&self, batch_id: Uuid, transition: Transition) -> DomainResult<FermentationBatch> {
        let cell = self.cell(batch_id)?;
        let mut batch = cell.write();
        let mut next = batch.clone();
        let release = next.apply_transition(transition, self.clock.now())?;
        self.commit(&mut batch, next, release)
    }

    /// Edit descriptive fields, optionally changing status in the same step
    pub fn update(&self, batch_id: Uuid, changes: BatchChanges) -> DomainResult<FermentationBatch> {
        let cell = self.cell(batch_id)?;
        let mut batch = cell.write();
        let mut next = batch.clone();
        let release = next.apply_update(changes, self.clock.now())?;
        self.commit(&mut batch, next, release)
    }

    /// Release the tank if the change ended the batch, then store it
    fn commit(
        &self,
        batch: &mut FermentationBatch,
        next: FermentationBatch,
        release: Option<TankStatus>,
    ) -> DomainResult<FermentationBatch> {
        if let Some(to) = release {
            self.tanks.release(next.tank_id, next.id, to)?;
        }
        *batch = next;
        Ok(batch.clone())
    }

    /// Delete a finished batch together with its readings
    pub fn delete(&self, batch_id: Uuid) -> DomainResult<FermentationBatch> {
        let mut batches = self.batches.write();
        let cell = batches
            .get(&batch_id)
            .cloned()
            .ok_or_else(|| DomainError::not_found("Fermentation batch"))?;

        let batch = cell.read().clone();
        if !batch.is_terminal() {
            return Err(DomainError::illegal_state(
                "Only completed or cancelled batches can be deleted",
            ));
        }

        batches.remove(&batch_id);
        drop(batches);
        self.readings.remove_batch(batch_id);
        Ok(batch)
    }

    /// Append a reading while holding the batch so it cannot end mid-write
    pub fn append_reading(&self, batch_id: Uuid, input: NewReading) -> DomainResult<FermentationReading> {
        let cell = self.cell(batch_id)?;
        let batch = cell.read();
        self.readings.append(&batch, input)
    }

    /// Readings newest first; a deleted or unknown batch has none
    pub fn list_readings(&self, batch_id: Uuid, limit: Option<usize>) -> Vec<FermentationReading> {
        self.readings.list_by_batch(batch_id, limit)
    }

    pub fn delete_reading(&self, batch_id: Uuid, reading_id: Uuid) -> DomainResult<FermentationReading> {
        self.cell(batch_id)?;
        self.readings.delete(batch_id, reading_id)
    }

    /// Remove a tank that hosts nothing and has no batch history
    pub fn retire_tank(&self, tank_id: Uuid) -> DomainResult<Tank> {
        let batches = self.batches.read();
        let referenced = batches.values().any(|cell| cell.read().tank_id == tank_id);
        if referenced {
            self.tanks.get(tank_id)?;
            return Err(DomainError::conflict(
                "Tank has fermentation history and cannot be deleted",
            ));
        }
        self.tanks.remove(tank_id)
    }

    pub(crate) fn batch_snapshot(&self) -> (HashMap<Uuid, FermentationBatch>, HashMap<Uuid, Tank>) {
        let batches = self.batches.read();
        let guards: Vec<_> = batches.values().map(|cell| cell.read()).collect();
        let tanks = self.tanks.snapshot();
        let snapshot = guards.iter().map(|b| (b.id, (**b).clone())).collect();
        (snapshot, tanks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::models::NewTank;
    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal::Decimal;

    struct Fixture {
        clock: Arc<ManualClock>,
        tanks: Arc<TankRegistry>,
        lifecycle: BatchLifecycle,
    }

    fn fixture() -> Fixture {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 9, 1, 7, 0, 0).unwrap(),
        ));
        let dyn_clock: Arc<dyn Clock> = clock.clone();
        let tanks = Arc::new(TankRegistry::new(dyn_clock.clone()));
        let readings = Arc::new(ReadingStore::new(Some(dyn_clock.clone())));
        let lifecycle = BatchLifecycle::new(tanks.clone(), readings, dyn_clock);
        Fixture {
            clock,
            tanks,
            lifecycle,
        }
    }

    fn tank(f: &Fixture, capacity: i64) -> Tank {
        f.tanks
            .register(NewTank {
                name: "Tank 1".into(),
                capacity_liters: Decimal::from(capacity),
                material: "oak".into(),
                location: None,
                notes: None,
            })
            .unwrap()
    }

    fn new_batch(tank_id: Uuid, volume: i64) -> NewBatch {
        NewBatch {
            tank_id,
            harvest_id: None,
            name: "Pinot 2024".into(),
            grape_variety: "Pinot Noir".into(),
            volume_liters: Decimal::from(volume),
            target_temperature: Some(Decimal::from(22)),
            yeast_strain: Some("RC212".into()),
            initial_brix: None,
            initial_ph: None,
            expected_end_date: None,
            notes: None,
        }
    }

    #[test]
    fn test_create_reserves_tank() {
        let f = fixture();
        let t = tank(&f, 1000);
        let batch = f.lifecycle.create(Uuid::new_v4(), new_batch(t.id, 800)).unwrap();

        assert_eq!(batch.status, BatchStatus::Active);
        assert!(batch.start_date.is_some());
        let t = f.tanks.get(t.id).unwrap();
        assert_eq!(t.status, TankStatus::InUse);
        assert_eq!(t.current_batch_id, Some(batch.id));
    }

    #[test]
    fn test_create_failures_leave_no_batch() {
        let f = fixture();
        let t = tank(&f, 1000);

        let err = f.lifecycle.create(Uuid::new_v4(), new_batch(t.id, 1200)).unwrap_err();
        assert!(matches!(err, DomainError::Validation { .. }));

        let err = f
            .lifecycle
            .create(Uuid::new_v4(), new_batch(Uuid::new_v4(), 10))
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));

        assert!(f.lifecycle.list_all().is_empty());
        assert!(f.tanks.get(t.id).unwrap().is_available());
    }

    #[test]
    fn test_second_batch_on_busy_tank_conflicts() {
        let f = fixture();
        let t = tank(&f, 1000);
        f.lifecycle.create(Uuid::new_v4(), new_batch(t.id, 100)).unwrap();
        let err = f.lifecycle.create(Uuid::new_v4(), new_batch(t.id, 100)).unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
        assert_eq!(f.lifecycle.list_all().len(), 1);
    }

    #[test]
    fn test_complete_releases_tank_and_stamps_end_date() {
        let f = fixture();
        let t = tank(&f, 1000);
        let batch = f.lifecycle.create(Uuid::new_v4(), new_batch(t.id, 100)).unwrap();

        f.clock.advance(Duration::days(12));
        let done = f
            .lifecycle
            .transition(batch.id, Transition::to(BatchStatus::Completed))
            .unwrap();

        assert_eq!(done.status, BatchStatus::Completed);
        assert_eq!(done.end_date, Some(f.clock.now()));
        assert!(f.tanks.get(t.id).unwrap().is_available());
    }

    #[test]
    fn test_cancel_can_send_tank_to_cleaning() {
        let f = fixture();
        let t = tank(&f, 1000);
        let batch = f.lifecycle.create(Uuid::new_v4(), new_batch(t.id, 100)).unwrap();

        let transition = Transition::parse("cancelled", None, Some("cleaning")).unwrap();
        f.lifecycle.transition(batch.id, transition).unwrap();
        assert_eq!(f.tanks.get(t.id).unwrap().status, TankStatus::Cleaning);
    }

    #[test]
    fn test_pause_keeps_tank() {
        let f = fixture();
        let t = tank(&f, 1000);
        let batch = f.lifecycle.create(Uuid::new_v4(), new_batch(t.id, 100)).unwrap();

        f.lifecycle
            .transition(batch.id, Transition::to(BatchStatus::Paused))
            .unwrap();
        assert_eq!(f.tanks.get(t.id).unwrap().status, TankStatus::InUse);

        let resumed = f
            .lifecycle
            .transition(batch.id, Transition::to(BatchStatus::Active))
            .unwrap();
        assert_eq!(resumed.status, BatchStatus::Active);
        assert!(resumed.end_date.is_none());
    }

    #[test]
    fn test_terminal_batch_is_frozen() {
        let f = fixture();
        let t = tank(&f, 1000);
        let batch = f.lifecycle.create(Uuid::new_v4(), new_batch(t.id, 100)).unwrap();
        f.lifecycle
            .transition(batch.id, Transition::to(BatchStatus::Cancelled))
            .unwrap();

        let err = f
            .lifecycle
            .transition(batch.id, Transition::to(BatchStatus::Active))
            .unwrap_err();
        assert!(matches!(err, DomainError::IllegalState(_)));

        let err = f
            .lifecycle
            .append_reading(batch.id, NewReading::default())
            .unwrap_err();
        assert!(matches!(err, DomainError::IllegalState(_)));
    }

    #[test]
    fn test_update_with_status_completes_batch() {
        let f = fixture();
        let t = tank(&f, 1000);
        let batch = f.lifecycle.create(Uuid::new_v4(), new_batch(t.id, 100)).unwrap();
        let end = f.clock.now() + Duration::days(3);

        let changes = BatchChanges {
            notes: Some("Pressed".into()),
            status: Some("completed".into()),
            end_date: Some(end),
            ..Default::default()
        };
        let updated = f.lifecycle.update(batch.id, changes).unwrap();
        assert_eq!(updated.status, BatchStatus::Completed);
        assert_eq!(updated.end_date, Some(end));
        assert_eq!(updated.notes.as_deref(), Some("Pressed"));
        assert!(f.tanks.get(t.id).unwrap().is_available());
    }

    #[test]
    fn test_update_rejects_unknown_status() {
        let f = fixture();
        let t = tank(&f, 1000);
        let batch = f.lifecycle.create(Uuid::new_v4(), new_batch(t.id, 100)).unwrap();
        let changes = BatchChanges {
            status: Some("bottled".into()),
            ..Default::default()
        };
        assert!(matches!(
            f.lifecycle.update(batch.id, changes),
            Err(DomainError::Validation { .. })
        ));
    }

    #[test]
    fn test_update_release_target_without_ending_is_rejected() {
        let f = fixture();
        let t = tank(&f, 1000);
        let batch = f.lifecycle.create(Uuid::new_v4(), new_batch(t.id, 100)).unwrap();
        let changes = BatchChanges {
            notes: Some("Drain to cleaning".into()),
            release_tank_to: Some("cleaning".into()),
            ..Default::default()
        };
        assert!(matches!(
            f.lifecycle.update(batch.id, changes),
            Err(DomainError::Validation { ref field, .. }) if field == "release_tank_to"
        ));

        let stored = f.lifecycle.get(batch.id).unwrap();
        assert_eq!(stored.status, BatchStatus::Active);
        assert_eq!(stored.notes, None);
        assert_eq!(f.tanks.get(t.id).unwrap().status, TankStatus::InUse);
    }

    #[test]
    fn test_delete_requires_terminal_and_cascades() {
        let f = fixture();
        let t = tank(&f, 1000);
        let batch = f.lifecycle.create(Uuid::new_v4(), new_batch(t.id, 100)).unwrap();
        f.lifecycle
            .append_reading(
                batch.id,
                NewReading {
                    temperature: Some(Decimal::from(20)),
                    ..Default::default()
                },
            )
            .unwrap();

        assert!(matches!(
            f.lifecycle.delete(batch.id),
            Err(DomainError::IllegalState(_))
        ));

        f.lifecycle
            .transition(batch.id, Transition::to(BatchStatus::Completed))
            .unwrap();
        f.lifecycle.delete(batch.id).unwrap();

        assert!(matches!(f.lifecycle.get(batch.id), Err(DomainError::NotFound(_))));
        assert_eq!(f.lifecycle.readings.count(batch.id), 0);
        assert!(f.lifecycle.list_readings(batch.id, None).is_empty());
    }

    #[test]
    fn test_list_active_carries_latest_reading() {
        let f = fixture();
        let t = tank(&f, 1000);
        let batch = f.lifecycle.create(Uuid::new_v4(), new_batch(t.id, 100)).unwrap();
        let now = f.clock.now();
        for (hours, brix) in [(1, 22), (2, 19)] {
            f.lifecycle
                .append_reading(
                    batch.id,
                    NewReading {
                        brix: Some(Decimal::from(brix)),
                        recorded_at: Some(now + Duration::hours(hours)),
                        ..Default::default()
                    },
                )
                .unwrap();
        }

        let active = f.lifecycle.list_active();
        assert_eq!(active.len(), 1);
        let latest = active[0].latest_reading.as_ref().unwrap();
        assert_eq!(latest.brix, Some(Decimal::from(19)));

        f.lifecycle
            .transition(batch.id, Transition::to(BatchStatus::Paused))
            .unwrap();
        assert!(f.lifecycle.list_active().is_empty());
    }

    #[test]
    fn test_retire_tank_with_history_conflicts() {
        let f = fixture();
        let t = tank(&f, 1000);
        let batch = f.lifecycle.create(Uuid::new_v4(), new_batch(t.id, 100)).unwrap();
        f.lifecycle
            .transition(batch.id, Transition::to(BatchStatus::Completed))
            .unwrap();

        assert!(matches!(
            f.lifecycle.retire_tank(t.id),
            Err(DomainError::Conflict(_))
        ));

        let spare = tank(&f, 500);
        f.lifecycle.retire_tank(spare.id).unwrap();
        assert!(matches!(f.tanks.get(spare.id), Err(DomainError::NotFound(_))));
    }
}
