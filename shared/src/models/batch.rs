//! Fermentation batch models and lifecycle rules

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

use crate::error::{DomainError, DomainResult};
use crate::models::{FermentationReading, TankStatus};
use crate::validation::validate_batch_changes;

/// A single fermentation run occupying one tank
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FermentationBatch {
    pub id: Uuid,
    pub tank_id: Uuid,
    /// Reference into the harvest service
    pub harvest_id: Option<Uuid>,
    pub name: String,
    pub grape_variety: String,
    pub volume_liters: Decimal,
    pub status: BatchStatus,
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

impl FermentationBatch {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Move the batch through its state machine
    ///
    /// Ending a batch stamps `end_date` (unless one is already set) and
    /// returns the status its tank must be released to. Releasing the tank
    /// is up to the caller, which must discard this batch if that fails.
    pub fn apply_transition(
        &mut self,
        transition: Transition,
        now: DateTime<Utc>,
    ) -> DomainResult<Option<TankStatus>> {
        let next = self.status.transition_to(transition.to)?;

        let release = if next.is_terminal() {
            if self.end_date.is_none() {
                self.end_date = Some(transition.end_date.unwrap_or(now));
            }
            Some(transition.release_tank_to)
        } else {
            None
        };

        self.status = next;
        self.updated_at = now;
        Ok(release)
    }

    /// Apply an update request
    ///
    /// A `status` different from the current one goes through
    /// [`apply_transition`](Self::apply_transition). Without a status change
    /// `end_date` may only correct a finished batch, and `release_tank_to`
    /// is rejected. Returns the tank release the caller must perform.
    pub fn apply_update(
        &mut self,
        changes: BatchChanges,
        now: DateTime<Utc>,
    ) -> DomainResult<Option<TankStatus>> {
        validate_batch_changes(&changes)?;
        let transition = match changes.status.as_deref() {
            Some(status) => Some(Transition::parse(
                status,
                changes.end_date,
                changes.release_tank_to.as_deref(),
            )?),
            None => {
                if let Some(target) = changes.release_tank_to.as_deref() {
                    parse_release_target(target)?;
                }
                None
            }
        };

        let release = match transition {
            Some(transition) if transition.to != self.status => {
                self.apply_transition(transition, now)?
            }
            _ => {
                if changes.release_tank_to.is_some() {
                    return Err(release_without_end());
                }
                if let Some(end_date) = changes.end_date {
                    if !self.is_terminal() {
                        return Err(DomainError::illegal_state(
                            "end_date can only be set on a finished batch",
                        ));
                    }
                    self.end_date = Some(end_date);
                }
                None
            }
        };

        self.apply_edits(changes, now);
        Ok(release)
    }

    /// Apply the descriptive part of an update
    fn apply_edits(&mut self, changes: BatchChanges, now: DateTime<Utc>) {
        if let Some(name) = changes.name {
            self.name = name;
        }
        if changes.target_temperature.is_some() {
            self.target_temperature = changes.target_temperature;
        }
        if changes.yeast_strain.is_some() {
            self.yeast_strain = changes.yeast_strain;
        }
        if changes.expected_end_date.is_some() {
            self.expected_end_date = changes.expected_end_date;
        }
        if changes.notes.is_some() {
            self.notes = changes.notes;
        }
        self.updated_at = now;
    }
}

/// Parsed target of a status change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub to: BatchStatus,
    pub end_date: Option<DateTime<Utc>>,
    pub release_tank_to: TankStatus,
}

impl Transition {
    pub fn to(to: BatchStatus) -> Self {
        Self {
            to,
            end_date: None,
            release_tank_to: TankStatus::Available,
        }
    }

    /// Parse the wire form; an omitted release target means `available`
    pub fn parse(
        status: &str,
        end_date: Option<DateTime<Utc>>,
        release_tank_to: Option<&str>,
    ) -> DomainResult<Self> {
        let to: BatchStatus = status.parse()?;
        let release_tank_to = match release_tank_to {
            Some(s) => {
                let target = parse_release_target(s)?;
                if !to.is_terminal() {
                    return Err(release_without_end());
                }
                target
            }
            None => TankStatus::Available,
        };
        Ok(Self {
            to,
            end_date,
            release_tank_to,
        })
    }
}

fn parse_release_target(s: &str) -> DomainResult<TankStatus> {
    let status: TankStatus = s.parse().map_err(|_| {
        DomainError::validation("release_tank_to", format!("Unknown tank status: {}", s))
    })?;
    if !status.is_release_target() {
        return Err(DomainError::validation(
            "release_tank_to",
            "A released tank must become available, cleaning or maintenance",
        ));
    }
    Ok(status)
}

fn release_without_end() -> DomainError {
    DomainError::validation(
        "release_tank_to",
        "release_tank_to only applies when a batch is completed or cancelled",
    )
}

/// Batch lifecycle status
///
/// `active` and `paused` hold the tank; `completed` and `cancelled` are
/// terminal and release it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Active,
    Paused,
    Completed,
    Cancelled,
}

impl BatchStatus {
    pub const ALL: [BatchStatus; 4] = [
        BatchStatus::Active,
        BatchStatus::Paused,
        BatchStatus::Completed,
        BatchStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Active => "active",
            BatchStatus::Paused => "paused",
            BatchStatus::Completed => "completed",
            BatchStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, BatchStatus::Completed | BatchStatus::Cancelled)
    }

    pub fn can_transition_to(&self, next: BatchStatus) -> bool {
        matches!(
            (*self, next),
            (BatchStatus::Active, BatchStatus::Paused)
                | (BatchStatus::Paused, BatchStatus::Active)
                | (BatchStatus::Active | BatchStatus::Paused, BatchStatus::Completed)
                | (BatchStatus::Active | BatchStatus::Paused, BatchStatus::Cancelled)
        )
    }

    /// Validate a transition, returning the new status
    pub fn transition_to(&self, next: BatchStatus) -> DomainResult<BatchStatus> {
        if self.can_transition_to(next) {
            Ok(next)
        } else if self.is_terminal() {
            Err(DomainError::illegal_state(format!(
                "Batch is {} and accepts no further status changes",
                self.as_str()
            )))
        } else {
            Err(DomainError::illegal_state(format!(
                "Cannot transition batch from {} to {}",
                self.as_str(),
                next.as_str()
            )))
        }
    }
}

impl FromStr for BatchStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(BatchStatus::Active),
            "paused" => Ok(BatchStatus::Paused),
            "completed" => Ok(BatchStatus::Completed),
            "cancelled" => Ok(BatchStatus::Cancelled),
            other => Err(DomainError::validation(
                "status",
                format!("Unknown batch status: {}", other),
            )),
        }
    }
}

impl std::fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input for creating a batch
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewBatch {
    pub tank_id: Uuid,
    pub harvest_id: Option<Uuid>,
    #[validate(length(min = 2, message = "Name must be at least 2 characters"))]
    pub name: String,
    #[validate(length(min = 2, message = "Grape variety is required"))]
    pub grape_variety: String,
    pub volume_liters: Decimal,
    pub target_temperature: Option<Decimal>,
    pub yeast_strain: Option<String>,
    pub initial_brix: Option<Decimal>,
    pub initial_ph: Option<Decimal>,
    pub expected_end_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

/// Editable batch fields plus an optional status change
///
/// Volume and tank are fixed at creation.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct BatchChanges {
    #[validate(length(min = 2, message = "Name must be at least 2 characters"))]
    pub name: Option<String>,
    pub target_temperature: Option<Decimal>,
    pub yeast_strain: Option<String>,
    pub expected_end_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub status: Option<String>,
    pub end_date: Option<DateTime<Utc>>,
    /// Where the tank goes when this change ends the batch
    pub release_tank_to: Option<String>,
}

/// Request to move a batch to another lifecycle status
#[derive(Debug, Clone, Deserialize)]
pub struct StatusChange {
    pub status: String,
    pub end_date: Option<DateTime<Utc>>,
    pub release_tank_to: Option<String>,
}

/// Batch annotated with its most recent reading for display
#[derive(Debug, Clone, Serialize)]
pub struct BatchWithLatestReading {
    #[serde(flatten)]
    pub batch: FermentationBatch,
    pub latest_reading: Option<FermentationReading>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 9, 20, 9, 0, 0).unwrap()
    }

    fn batch(status: BatchStatus) -> FermentationBatch {
        FermentationBatch {
            id: Uuid::new_v4(),
            tank_id: Uuid::new_v4(),
            harvest_id: None,
            name: "Zinfandel T4".into(),
            grape_variety: "Zinfandel".into(),
            volume_liters: Decimal::from(900),
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

    #[test]
    fn test_completion_stamps_end_date_and_names_release() {
        let mut b = batch(BatchStatus::Active);
        let now = t0() + Duration::days(10);

        let transition = Transition::parse("completed", None, Some("cleaning")).unwrap();
        let release = b.apply_transition(transition, now).unwrap();

        assert_eq!(release, Some(TankStatus::Cleaning));
        assert_eq!(b.status, BatchStatus::Completed);
        assert_eq!(b.end_date, Some(now));
    }

    #[test]
    fn test_pause_releases_nothing() {
        let mut b = batch(BatchStatus::Active);
        let release = b
            .apply_transition(Transition::to(BatchStatus::Paused), t0())
            .unwrap();
        assert_eq!(release, None);
        assert_eq!(b.end_date, None);
    }

    #[test]
    fn test_rejected_transition_leaves_batch_untouched() {
        let mut b = batch(BatchStatus::Cancelled);
        let before = b.clone();
        assert!(b
            .apply_transition(Transition::to(BatchStatus::Active), t0())
            .is_err());
        assert_eq!(b, before);
    }

    #[test]
    fn test_update_same_status_only_edits() {
        let mut b = batch(BatchStatus::Active);
        let changes = BatchChanges {
            notes: Some("Punch down twice daily".into()),
            status: Some("active".into()),
            ..Default::default()
        };
        let release = b.apply_update(changes, t0()).unwrap();
        assert_eq!(release, None);
        assert_eq!(b.status, BatchStatus::Active);
        assert_eq!(b.notes.as_deref(), Some("Punch down twice daily"));
    }

    #[test]
    fn test_update_end_date_needs_finished_batch() {
        let mut running = batch(BatchStatus::Paused);
        let changes = BatchChanges {
            end_date: Some(t0()),
            ..Default::default()
        };
        assert!(matches!(
            running.apply_update(changes.clone(), t0()),
            Err(DomainError::IllegalState(_))
        ));

        let mut done = batch(BatchStatus::Completed);
        assert_eq!(done.apply_update(changes, t0()).unwrap(), None);
        assert_eq!(done.end_date, Some(t0()));
    }

    #[test]
    fn test_release_target_requires_ending_the_batch() {
        let release_only = BatchChanges {
            release_tank_to: Some("maintenance".into()),
            ..Default::default()
        };
        let err = batch(BatchStatus::Active)
            .apply_update(release_only, t0())
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation { ref field, .. } if field == "release_tank_to"));

        let garbage = BatchChanges {
            release_tank_to: Some("scrapyard".into()),
            ..Default::default()
        };
        assert!(batch(BatchStatus::Active).apply_update(garbage, t0()).is_err());

        let with_pause = BatchChanges {
            status: Some("paused".into()),
            release_tank_to: Some("cleaning".into()),
            ..Default::default()
        };
        assert!(matches!(
            batch(BatchStatus::Active).apply_update(with_pause, t0()),
            Err(DomainError::Validation { .. })
        ));

        let already_done = BatchChanges {
            status: Some("completed".into()),
            release_tank_to: Some("cleaning".into()),
            ..Default::default()
        };
        assert!(matches!(
            batch(BatchStatus::Completed).apply_update(already_done, t0()),
            Err(DomainError::Validation { .. })
        ));
    }

    #[test]
    fn test_update_with_terminal_status_returns_release() {
        let mut b = batch(BatchStatus::Paused);
        let changes = BatchChanges {
            status: Some("cancelled".into()),
            release_tank_to: Some("maintenance".into()),
            ..Default::default()
        };
        assert_eq!(
            b.apply_update(changes, t0()).unwrap(),
            Some(TankStatus::Maintenance)
        );
        assert_eq!(b.status, BatchStatus::Cancelled);
    }

    #[test]
    fn test_allowed_transitions() {
        use BatchStatus::*;
        assert!(Active.can_transition_to(Paused));
        assert!(Paused.can_transition_to(Active));
        assert!(Active.can_transition_to(Completed));
        assert!(Paused.can_transition_to(Completed));
        assert!(Active.can_transition_to(Cancelled));
        assert!(Paused.can_transition_to(Cancelled));
    }

    #[test]
    fn test_rejected_transitions() {
        use BatchStatus::*;
        for from in [Completed, Cancelled] {
            for to in BatchStatus::ALL {
                assert!(matches!(
                    from.transition_to(to),
                    Err(DomainError::IllegalState(_))
                ));
            }
        }
        assert!(!Active.can_transition_to(Active));
        assert!(!Paused.can_transition_to(Paused));
    }

    #[test]
    fn test_unknown_status() {
        assert!(matches!(
            "fermenting".parse::<BatchStatus>(),
            Err(DomainError::Validation { .. })
        ));
        assert_eq!("paused".parse::<BatchStatus>().unwrap(), BatchStatus::Paused);
    }
}
