//! Pause intervals of a rental assignment.
//!
//! A [`PauseInterval`] is one stretch of non-billable time. Intervals are
//! chronologically ordered and never overlap; at most the last one is open
//! (`resumed_at = None`).

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::EngineError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PauseInterval {
    pub id: Uuid,
    pub assignment_id: Uuid,
    pub paused_at: DateTime<Utc>,
    pub resumed_at: Option<DateTime<Utc>>,
}

impl PauseInterval {
    pub fn new(assignment_id: Uuid, paused_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            assignment_id,
            paused_at,
            resumed_at: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.resumed_at.is_none()
    }

    /// Paused seconds up to `now` for an open interval, or the full interval
    /// length once resumed.
    pub fn paused_seconds(&self, now: DateTime<Utc>) -> i64 {
        let end = self.resumed_at.unwrap_or(now);
        (end - self.paused_at).num_seconds()
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "pause_intervals")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub assignment_id: String,
    pub paused_at: DateTimeUtc,
    pub resumed_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::rental::Entity",
        from = "Column::AssignmentId",
        to = "super::rental::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    RentalAssignments,
}

impl Related<super::rental::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::RentalAssignments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&PauseInterval> for ActiveModel {
    fn from(interval: &PauseInterval) -> Self {
        Self {
            id: ActiveValue::Set(interval.id.to_string()),
            assignment_id: ActiveValue::Set(interval.assignment_id.to_string()),
            paused_at: ActiveValue::Set(interval.paused_at),
            resumed_at: ActiveValue::Set(interval.resumed_at),
        }
    }
}

impl TryFrom<Model> for PauseInterval {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Uuid::parse_str(&model.id)
                .map_err(|_| EngineError::NotFound("pause interval".to_string()))?,
            assignment_id: Uuid::parse_str(&model.assignment_id)
                .map_err(|_| EngineError::NotFound("rental assignment".to_string()))?,
            paused_at: model.paused_at,
            resumed_at: model.resumed_at,
        })
    }
}
