//! Rental assignments.
//!
//! A [`RentalAssignment`] records one stretch of a unit being out with an
//! assignee, from `assign` to `return`, including its pause/resume history.
//! The state machine is `Available → Assigned → {Running ⇄ Paused} →
//! Returned`; at most one open assignment (`ended_at = None`) exists per
//! equipment unit, and the engine serializes all transitions for a unit.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    EngineError, Money,
    billing::RateUnit,
    pauses::PauseInterval,
};

/// Who the equipment is out with, and therefore who gets billed on return.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "assignee", rename_all = "snake_case")]
pub enum Assignee {
    /// Assigned to one of our own projects; the rental expense lands on the
    /// project's expense account.
    Project {
        project_id: Uuid,
        expense_account_id: Uuid,
    },
    /// Rented out to a contractor; billed on the contractor's account.
    Contractor { account_id: Uuid },
}

impl Assignee {
    pub fn billing_account_id(&self) -> Uuid {
        match *self {
            Self::Project {
                expense_account_id, ..
            } => expense_account_id,
            Self::Contractor { account_id } => account_id,
        }
    }

    pub(crate) fn kind_str(&self) -> &'static str {
        match self {
            Self::Project { .. } => "project",
            Self::Contractor { .. } => "contractor",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RentalAssignment {
    pub id: Uuid,
    pub equipment_id: Uuid,
    pub assignee: Assignee,
    pub rate: Money,
    pub rate_unit: RateUnit,
    pub started_at: DateTime<Utc>,
    /// Ordered, non-overlapping; only the last may be open.
    pub pauses: Vec<PauseInterval>,
    pub ended_at: Option<DateTime<Utc>>,
    pub total_charge: Option<Money>,
}

impl RentalAssignment {
    pub fn new(
        equipment_id: Uuid,
        assignee: Assignee,
        rate: Money,
        rate_unit: RateUnit,
        started_at: DateTime<Utc>,
    ) -> Result<Self, EngineError> {
        if rate.is_negative() {
            return Err(EngineError::Validation(
                "rental rate must not be negative".to_string(),
            ));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            equipment_id,
            assignee,
            rate,
            rate_unit,
            started_at,
            pauses: Vec::new(),
            ended_at: None,
            total_charge: None,
        })
    }

    pub fn is_open(&self) -> bool {
        self.ended_at.is_none()
    }

    pub fn is_paused(&self) -> bool {
        self.pauses.last().is_some_and(PauseInterval::is_open)
    }

    /// Latest instant already covered by the assignment's history. New
    /// transitions must not predate it, or intervals would overlap.
    fn last_boundary(&self) -> DateTime<Utc> {
        self.pauses
            .last()
            .map(|p| p.resumed_at.unwrap_or(p.paused_at))
            .unwrap_or(self.started_at)
    }

    /// Opens a new pause interval at `now` and returns it.
    pub fn pause(&mut self, now: DateTime<Utc>) -> Result<PauseInterval, EngineError> {
        if !self.is_open() {
            return Err(EngineError::InvalidState(
                "assignment already returned".to_string(),
            ));
        }
        if self.is_paused() {
            return Err(EngineError::InvalidState("rent already paused".to_string()));
        }
        if now < self.last_boundary() {
            return Err(EngineError::Validation(
                "pause time predates assignment history".to_string(),
            ));
        }
        let interval = PauseInterval::new(self.id, now);
        self.pauses.push(interval);
        Ok(interval)
    }

    /// Closes the open pause interval at `now` and returns it.
    pub fn resume(&mut self, now: DateTime<Utc>) -> Result<PauseInterval, EngineError> {
        if !self.is_open() {
            return Err(EngineError::InvalidState(
                "assignment already returned".to_string(),
            ));
        }
        let Some(open) = self.pauses.last_mut().filter(|p| p.is_open()) else {
            return Err(EngineError::InvalidState("rent is not paused".to_string()));
        };
        if now < open.paused_at {
            return Err(EngineError::Validation(
                "resume time predates the pause".to_string(),
            ));
        }
        open.resumed_at = Some(now);
        Ok(*open)
    }

    /// Billable seconds as of `now`: wall-clock time since `started_at`
    /// minus all paused time. An open pause counts as paused up to `now`.
    pub fn billable_seconds(&self, now: DateTime<Utc>) -> i64 {
        let end = self.ended_at.unwrap_or(now);
        let total = (end - self.started_at).num_seconds();
        let paused: i64 = self.pauses.iter().map(|p| p.paused_seconds(end)).sum();
        total - paused
    }

    /// Marks the assignment returned. The engine resolves any open pause
    /// before calling this.
    pub(crate) fn close(&mut self, ended_at: DateTime<Utc>, total_charge: Money) {
        self.ended_at = Some(ended_at);
        self.total_charge = Some(total_charge);
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "rental_assignments")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub equipment_id: String,
    pub assignee_kind: String,
    pub assignee_id: String,
    pub expense_account_id: Option<String>,
    pub rate_minor: i64,
    pub rate_unit: String,
    pub started_at: DateTimeUtc,
    pub ended_at: Option<DateTimeUtc>,
    pub total_charge_minor: Option<i64>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::pauses::Entity")]
    PauseIntervals,
    #[sea_orm(
        belongs_to = "super::equipment::Entity",
        from = "Column::EquipmentId",
        to = "super::equipment::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Equipment,
}

impl Related<super::pauses::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PauseIntervals.def()
    }
}

impl Related<super::equipment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Equipment.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&RentalAssignment> for ActiveModel {
    fn from(assignment: &RentalAssignment) -> Self {
        let (assignee_id, expense_account_id) = match assignment.assignee {
            Assignee::Project {
                project_id,
                expense_account_id,
            } => (project_id.to_string(), Some(expense_account_id.to_string())),
            Assignee::Contractor { account_id } => (account_id.to_string(), None),
        };
        Self {
            id: ActiveValue::Set(assignment.id.to_string()),
            equipment_id: ActiveValue::Set(assignment.equipment_id.to_string()),
            assignee_kind: ActiveValue::Set(assignment.assignee.kind_str().to_string()),
            assignee_id: ActiveValue::Set(assignee_id),
            expense_account_id: ActiveValue::Set(expense_account_id),
            rate_minor: ActiveValue::Set(assignment.rate.minor()),
            rate_unit: ActiveValue::Set(assignment.rate_unit.as_str().to_string()),
            started_at: ActiveValue::Set(assignment.started_at),
            ended_at: ActiveValue::Set(assignment.ended_at),
            total_charge_minor: ActiveValue::Set(assignment.total_charge.map(Money::minor)),
        }
    }
}

impl TryFrom<Model> for RentalAssignment {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        let parse_id = |raw: &str, what: &str| {
            Uuid::parse_str(raw).map_err(|_| EngineError::NotFound(what.to_string()))
        };
        let assignee = match model.assignee_kind.as_str() {
            "project" => Assignee::Project {
                project_id: parse_id(&model.assignee_id, "project")?,
                expense_account_id: parse_id(
                    model.expense_account_id.as_deref().unwrap_or_default(),
                    "expense account",
                )?,
            },
            "contractor" => Assignee::Contractor {
                account_id: parse_id(&model.assignee_id, "contractor account")?,
            },
            other => {
                return Err(EngineError::Validation(format!(
                    "invalid assignee kind: {other}"
                )));
            }
        };
        Ok(Self {
            id: parse_id(&model.id, "rental assignment")?,
            equipment_id: parse_id(&model.equipment_id, "equipment")?,
            assignee,
            rate: Money::new(model.rate_minor),
            rate_unit: RateUnit::try_from(model.rate_unit.as_str())?,
            started_at: model.started_at,
            pauses: Vec::new(),
            ended_at: model.ended_at,
            total_charge: model.total_charge_minor.map(Money::new),
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::*;

    fn assignment() -> RentalAssignment {
        RentalAssignment::new(
            Uuid::new_v4(),
            Assignee::Contractor {
                account_id: Uuid::new_v4(),
            },
            Money::new(500_00),
            RateUnit::PerDay,
            Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn pause_resume_keeps_intervals_ordered() {
        let mut assignment = assignment();
        let t0 = assignment.started_at;

        assignment.pause(t0 + Duration::hours(2)).unwrap();
        assignment.resume(t0 + Duration::hours(3)).unwrap();
        assignment.pause(t0 + Duration::hours(5)).unwrap();

        assert_eq!(assignment.pauses.len(), 2);
        assert!(assignment.pauses[0].resumed_at.is_some());
        assert!(assignment.pauses[1].is_open());
        assert!(assignment.pauses[0].resumed_at.unwrap() <= assignment.pauses[1].paused_at);
    }

    #[test]
    fn double_pause_is_rejected() {
        let mut assignment = assignment();
        let t0 = assignment.started_at;

        assignment.pause(t0 + Duration::hours(1)).unwrap();
        let err = assignment.pause(t0 + Duration::hours(2)).unwrap_err();

        assert!(matches!(err, EngineError::InvalidState(_)));
        assert_eq!(assignment.pauses.len(), 1);
    }

    #[test]
    fn resume_without_pause_is_rejected() {
        let mut assignment = assignment();
        let err = assignment
            .resume(assignment.started_at + Duration::hours(1))
            .unwrap_err();

        assert!(matches!(err, EngineError::InvalidState(_)));
    }

    #[test]
    fn backdated_pause_is_rejected() {
        let mut assignment = assignment();
        let t0 = assignment.started_at;

        assignment.pause(t0 + Duration::hours(4)).unwrap();
        assignment.resume(t0 + Duration::hours(6)).unwrap();
        let err = assignment.pause(t0 + Duration::hours(5)).unwrap_err();

        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[test]
    fn billable_excludes_paused_time() {
        // Assigned at T0, paused 26h..30h, measured at T0+50h: 46h active.
        let mut assignment = assignment();
        let t0 = assignment.started_at;

        assignment.pause(t0 + Duration::hours(26)).unwrap();
        assignment.resume(t0 + Duration::hours(30)).unwrap();

        let billable = assignment.billable_seconds(t0 + Duration::hours(50));
        assert_eq!(billable, 46 * 3_600);
    }

    #[test]
    fn open_pause_counts_up_to_now() {
        let mut assignment = assignment();
        let t0 = assignment.started_at;

        assignment.pause(t0 + Duration::hours(10)).unwrap();

        let billable = assignment.billable_seconds(t0 + Duration::hours(15));
        assert_eq!(billable, 10 * 3_600);
    }
}
