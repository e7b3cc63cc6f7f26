//! Tank inventory and availability

use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::{DomainError, DomainResult};
use crate::models::{NewTank, Tank, TankChanges, TankMaterial, TankStatus};
use crate::validation::{validate_new_tank, validate_volume_fits};

/// Registry of tanks; every status change happens under one write lock
pub struct TankRegistry {
    tanks: RwLock<HashMap<Uuid, Tank>>,
    clock: Arc<dyn Clock>,
}

impl TankRegistry {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            tanks: RwLock::new(HashMap::new()),
            clock,
        }
    }

    /// Register a new tank in `available` status
    pub fn register(&self, input: NewTank) -> DomainResult<Tank> {
        validate_new_tank(&input)?;
        let material: TankMaterial = input.material.parse()?;
        let now = self.clock.now();

        let tank = Tank {
            id: Uuid::new_v4(),
            name: input.name,
            capacity_liters: input.capacity_liters,
            material,
            status: TankStatus::Available,
            location: input.location,
            notes: input.notes,
            current_batch_id: None,
            created_at: now,
            updated_at: now,
        };

        self.tanks.write().insert(tank.id, tank.clone());
        Ok(tank)
    }

    pub fn get(&self, tank_id: Uuid) -> DomainResult<Tank> {
        self.tanks
            .read()
            .get(&tank_id)
            .cloned()
            .ok_or_else(|| DomainError::not_found("Tank"))
    }

    /// All tanks ordered by name
    pub fn list_all(&self) -> Vec<Tank> {
        let mut tanks: Vec<Tank> = self.tanks.read().values().cloned().collect();
        sort_by_name(&mut tanks);
        tanks
    }

    /// Tanks ready to receive a batch, ordered by name
    pub fn list_available(&self) -> Vec<Tank> {
        let mut tanks: Vec<Tank> = self
            .tanks
            .read()
            .values()
            .filter(|t| t.is_available())
            .cloned()
            .collect();
        sort_by_name(&mut tanks);
        tanks
    }

    /// Apply descriptive changes and manual status moves
    pub fn update(&self, tank_id: Uuid, changes: TankChanges) -> DomainResult<Tank> {
        let mut tanks = self.tanks.write();
        let tank = tanks
            .get_mut(&tank_id)
            .ok_or_else(|| DomainError::not_found("Tank"))?;
        tank.apply_changes(changes, self.clock.now())?;
        Ok(tank.clone())
    }

    /// Remove a tank that is not hosting a batch
    pub fn remove(&self, tank_id: Uuid) -> DomainResult<Tank> {
        let mut tanks = self.tanks.write();
        let tank = tanks
            .get(&tank_id)
            .ok_or_else(|| DomainError::not_found("Tank"))?;

        if tank.status == TankStatus::InUse {
            return Err(DomainError::conflict(format!(
                "Tank '{}' hosts an active fermentation batch",
                tank.name
            )));
        }

        tanks
            .remove(&tank_id)
            .ok_or_else(|| DomainError::not_found("Tank"))
    }

    /// Atomically move a tank from `available` to `in_use` for `batch_id`
    pub fn reserve(&self, tank_id: Uuid, batch_id: Uuid, volume_liters: Decimal) -> DomainResult<Tank> {
        let mut tanks = self.tanks.write();
        let tank = tanks
            .get_mut(&tank_id)
            .ok_or_else(|| DomainError::not_found("Tank"))?;

        if tank.status != TankStatus::Available {
            return Err(DomainError::conflict(format!(
                "Tank '{}' is not available (status: {})",
                tank.name, tank.status
            )));
        }
        validate_volume_fits(volume_liters, tank.capacity_liters)?;

        tank.status = TankStatus::InUse;
        tank.current_batch_id = Some(batch_id);
        tank.updated_at = self.clock.now();
        Ok(tank.clone())
    }

    /// Hand a tank back after its batch ended
    ///
    /// `to` is normally `available`; callers pass `cleaning` or
    /// `maintenance` when the tank needs work first.
    pub fn release(&self, tank_id: Uuid, batch_id: Uuid, to: TankStatus) -> DomainResult<Tank> {
        if !to.is_release_target() {
            return Err(DomainError::validation(
                "release_tank_to",
                "A released tank cannot stay in_use",
            ));
        }

        let mut tanks = self.tanks.write();
        let tank = tanks
            .get_mut(&tank_id)
            .ok_or_else(|| DomainError::not_found("Tank"))?;

        if tank.status != TankStatus::InUse {
            return Err(DomainError::illegal_state(format!(
                "Tank '{}' is not in use (status: {})",
                tank.name, tank.status
            )));
        }
        if tank.current_batch_id != Some(batch_id) {
            return Err(DomainError::illegal_state(format!(
                "Tank '{}' is held by another batch",
                tank.name
            )));
        }

        tank.status = to;
        tank.current_batch_id = None;
        tank.updated_at = self.clock.now();
        Ok(tank.clone())
    }

    pub(crate) fn snapshot(&self) -> HashMap<Uuid, Tank> {
        self.tanks.read().clone()
    }
}

fn sort_by_name(tanks: &mut [Tank]) {
    tanks.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
}
