//! Thread-safe in-memory fermentation core
//!
//! [`FermentationCore`] wires the tank registry, batch lifecycle, reading
//! store and statistics together and keeps tank occupancy consistent with
//! batch status under concurrent callers.

mod lifecycle;
mod readings;
mod stats;
mod tanks;

pub use crate::models::Transition;
pub use lifecycle::BatchLifecycle;
pub use readings::ReadingStore;
pub use stats::StatsAggregator;
pub use tanks::TankRegistry;

use std::sync::Arc;
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};
use crate::error::DomainResult;
use crate::models::{
    BatchChanges, BatchStats, BatchStatus, BatchWithLatestReading, FermentationBatch,
    FermentationReading, NewBatch, NewReading, NewTank, Tank, TankChanges, TankStatus,
};

pub struct FermentationCore {
    tanks: Arc<TankRegistry>,
    lifecycle: BatchLifecycle,
    stats: StatsAggregator,
}

impl Default for FermentationCore {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl FermentationCore {
    /// Core whose readings default `recorded_at` to `clock`
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::build(clock.clone(), Some(clock))
    }

    /// Core that requires every reading to carry `recorded_at`
    pub fn with_explicit_timestamps(clock: Arc<dyn Clock>) -> Self {
        Self::build(clock, None)
    }

    fn build(clock: Arc<dyn Clock>, reading_clock: Option<Arc<dyn Clock>>) -> Self {
        let tanks = Arc::new(TankRegistry::new(clock.clone()));
        let readings = Arc::new(ReadingStore::new(reading_clock));
        let lifecycle = BatchLifecycle::new(tanks.clone(), readings.clone(), clock.clone());
        let stats = StatsAggregator::new(readings, clock);
        Self {
            tanks,
            lifecycle,
            stats,
        }
    }

    // Tanks

    pub fn register_tank(&self, input: NewTank) -> DomainResult<Tank> {
        self.tanks.register(input)
    }

    pub fn list_tanks(&self) -> Vec<Tank> {
        self.tanks.list_all()
    }

    pub fn list_available_tanks(&self) -> Vec<Tank> {
        self.tanks.list_available()
    }

    pub fn get_tank(&self, tank_id: Uuid) -> DomainResult<Tank> {
        self.tanks.get(tank_id)
    }

    pub fn update_tank(&self, tank_id: Uuid, changes: TankChanges) -> DomainResult<Tank> {
        self.tanks.update(tank_id, changes)
    }

    pub fn delete_tank(&self, tank_id: Uuid) -> DomainResult<Tank> {
        self.lifecycle.retire_tank(tank_id)
    }

    // Batches

    pub fn create_batch(&self, created_by: Uuid, input: NewBatch) -> DomainResult<FermentationBatch> {
        self.lifecycle.create(created_by, input)
    }

    pub fn get_batch(&self, batch_id: Uuid) -> DomainResult<BatchWithLatestReading> {
        self.lifecycle.get_with_latest(batch_id)
    }

    pub fn list_batches(&self) -> Vec<FermentationBatch> {
        self.lifecycle.list_all()
    }

    pub fn list_batches_by_tank(&self, tank_id: Uuid) -> DomainResult<Vec<FermentationBatch>> {
        self.tanks.get(tank_id)?;
        Ok(self.lifecycle.list_by_tank(tank_id))
    }

    pub fn list_active_batches(&self) -> Vec<BatchWithLatestReading> {
        self.lifecycle.list_active()
    }

    pub fn transition_batch(&self, batch_id: Uuid, transition: Transition) -> DomainResult<FermentationBatch> {
        self.lifecycle.transition(batch_id, transition)
    }

    /// Shorthand for a transition that releases the tank to `available`
    pub fn set_batch_status(&self, batch_id: Uuid, status: BatchStatus) -> DomainResult<FermentationBatch> {
        self.lifecycle.transition(batch_id, Transition::to(status))
    }

    pub fn update_batch(&self, batch_id: Uuid, changes: BatchChanges) -> DomainResult<FermentationBatch> {
        self.lifecycle.update(batch_id, changes)
    }

    pub fn delete_batch(&self, batch_id: Uuid) -> DomainResult<FermentationBatch> {
        self.lifecycle.delete(batch_id)
    }

    // Readings

    pub fn append_reading(&self, batch_id: Uuid, input: NewReading) -> DomainResult<FermentationReading> {
        self.lifecycle.append_reading(batch_id, input)
    }

    /// Readings newest first; empty for a batch that does not exist
    pub fn list_readings(&self, batch_id: Uuid, limit: Option<usize>) -> Vec<FermentationReading> {
        self.lifecycle.list_readings(batch_id, limit)
    }

    pub fn delete_reading(&self, batch_id: Uuid, reading_id: Uuid) -> DomainResult<FermentationReading> {
        self.lifecycle.delete_reading(batch_id, reading_id)
    }

    // Stats

    pub fn batch_stats(&self, batch_id: Uuid) -> DomainResult<BatchStats> {
        let batch = self.lifecycle.get(batch_id)?;
        Ok(self.stats.compute(&batch))
    }

    /// Verify tank occupancy agrees with batch status
    ///
    /// Returns a description of the first violation found.
    pub fn check_invariants(&self) -> Result<(), String> {
        let (batches, tanks) = self.lifecycle.batch_snapshot();

        for tank in tanks.values() {
            match (tank.status, tank.current_batch_id) {
                (TankStatus::InUse, Some(batch_id)) => {
                    let batch = batches
                        .get(&batch_id)
                        .ok_or_else(|| format!("tank {} points at missing batch {}", tank.id, batch_id))?;
                    if batch.is_terminal() {
                        return Err(format!(
                            "tank {} held by {} batch {}",
                            tank.id, batch.status, batch_id
                        ));
                    }
                    if batch.tank_id != tank.id {
                        return Err(format!("batch {} is not assigned to tank {}", batch_id, tank.id));
                    }
                }
                (TankStatus::InUse, None) => {
                    return Err(format!("tank {} is in_use without a batch", tank.id));
                }
                (_, Some(batch_id)) => {
                    return Err(format!(
                        "tank {} is {} but still references batch {}",
                        tank.id, tank.status, batch_id
                    ));
                }
                (_, None) => {}
            }
        }

        for batch in batches.values().filter(|b| !b.is_terminal()) {
            let holder = tanks.get(&batch.tank_id).and_then(|t| t.current_batch_id);
            if holder != Some(batch.id) {
                return Err(format!(
                    "{} batch {} does not hold tank {}",
                    batch.status, batch.id, batch.tank_id
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::error::DomainError;
    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal::Decimal;
    use std::thread;

    fn core() -> (Arc<ManualClock>, FermentationCore) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 9, 1, 6, 0, 0).unwrap(),
        ));
        let core = FermentationCore::new(clock.clone());
        (clock, core)
    }

    fn tank_input(name: &str) -> NewTank {
        NewTank {
            name: name.into(),
            capacity_liters: Decimal::from(1000),
            material: "concrete".into(),
            location: None,
            notes: None,
        }
    }

    fn batch_input(tank_id: Uuid) -> NewBatch {
        NewBatch {
            tank_id,
            harvest_id: None,
            name: "Chardonnay block 4".into(),
            grape_variety: "Chardonnay".into(),
            volume_liters: Decimal::from(900),
            target_temperature: Some(Decimal::from(16)),
            yeast_strain: None,
            initial_brix: Some(Decimal::from(23)),
            initial_ph: None,
            expected_end_date: None,
            notes: None,
        }
    }

    fn temperature(value: i64) -> NewReading {
        NewReading {
            temperature: Some(Decimal::from(value)),
            ..Default::default()
        }
    }

    #[test]
    fn test_batch_stats_end_to_end() {
        let (clock, core) = core();
        let tank = core.register_tank(tank_input("T1")).unwrap();
        let batch = core.create_batch(Uuid::new_v4(), batch_input(tank.id)).unwrap();

        for (temp, brix) in [(18, None), (20, Some(12)), (22, None)] {
            clock.advance(Duration::days(1));
            let mut reading = temperature(temp);
            reading.brix = brix.map(Decimal::from);
            core.append_reading(batch.id, reading).unwrap();
        }
        clock.advance(Duration::hours(5));

        let stats = core.batch_stats(batch.id).unwrap();
        assert_eq!(stats.total_readings, 3);
        assert_eq!(stats.avg_temperature, Some(Decimal::from(20)));
        assert_eq!(stats.latest_brix, Some(Decimal::from(12)));
        assert_eq!(stats.duration_days, Some(3));
        assert!(core.check_invariants().is_ok());
    }

    #[test]
    fn test_stats_for_unknown_batch() {
        let (_, core) = core();
        assert!(matches!(
            core.batch_stats(Uuid::new_v4()),
            Err(DomainError::NotFound(_))
        ));
    }

    #[test]
    fn test_explicit_timestamps_required() {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let core = FermentationCore::with_explicit_timestamps(clock);
        let tank = core.register_tank(tank_input("T1")).unwrap();
        let batch = core.create_batch(Uuid::new_v4(), batch_input(tank.id)).unwrap();

        let err = core.append_reading(batch.id, temperature(20)).unwrap_err();
        assert!(matches!(err, DomainError::Validation { .. }));
    }

    #[test]
    fn test_concurrent_creates_on_one_tank() {
        let (_, core) = core();
        let core = Arc::new(core);
        let tank = core.register_tank(tank_input("T1")).unwrap();

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let core = Arc::clone(&core);
                thread::spawn(move || core.create_batch(Uuid::new_v4(), batch_input(tank.id)))
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        let created = results.iter().filter(|r| r.is_ok()).count();
        let conflicts = results
            .iter()
            .filter(|r| matches!(r, Err(DomainError::Conflict(_))))
            .count();
        assert_eq!(created, 1);
        assert_eq!(conflicts, 15);
        assert!(core.check_invariants().is_ok());
    }

    #[test]
    fn test_concurrent_complete_and_append() {
        let (_, core) = core();
        let core = Arc::new(core);
        let tank = core.register_tank(tank_input("T1")).unwrap();
        let batch = core.create_batch(Uuid::new_v4(), batch_input(tank.id)).unwrap();

        let writers: Vec<_> = (0..8)
            .map(|i| {
                let core = Arc::clone(&core);
                thread::spawn(move || core.append_reading(batch.id, temperature(15 + i)))
            })
            .collect();
        let closer = {
            let core = Arc::clone(&core);
            thread::spawn(move || core.set_batch_status(batch.id, BatchStatus::Completed))
        };

        let accepted = writers
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|r| r.is_ok())
            .count();
        closer.join().unwrap().unwrap();

        assert_eq!(core.list_readings(batch.id, None).len(), accepted);
        assert!(core.append_reading(batch.id, temperature(20)).is_err());
        assert!(core.get_tank(tank.id).unwrap().is_available());
        assert!(core.check_invariants().is_ok());
    }

    #[test]
    fn test_tank_reusable_after_completion() {
        let (_, core) = core();
        let tank = core.register_tank(tank_input("T1")).unwrap();
        let first = core.create_batch(Uuid::new_v4(), batch_input(tank.id)).unwrap();
        core.set_batch_status(first.id, BatchStatus::Completed).unwrap();

        let second = core.create_batch(Uuid::new_v4(), batch_input(tank.id)).unwrap();
        assert_eq!(core.get_tank(tank.id).unwrap().current_batch_id, Some(second.id));
        assert_eq!(core.list_batches_by_tank(tank.id).unwrap().len(), 2);
        assert!(core.check_invariants().is_ok());
    }
}
