//! Equipment inventory.
//!
//! Machines, lab equipment, tools and consumables. Only non-consumables
//! participate in the rental state machine; consumables are quantity-only
//! stock.

use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    EngineError, Money,
    billing::RateUnit,
    rental::RentalAssignment,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EquipmentCategory {
    HeavyMachine,
    LabEquipment,
    Consumable,
    ToolEquipment,
}

impl EquipmentCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::HeavyMachine => "heavy-machine",
            Self::LabEquipment => "lab-equipment",
            Self::Consumable => "consumable",
            Self::ToolEquipment => "tool-equipment",
        }
    }
}

impl TryFrom<&str> for EquipmentCategory {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "heavy-machine" => Ok(Self::HeavyMachine),
            "lab-equipment" => Ok(Self::LabEquipment),
            "consumable" => Ok(Self::Consumable),
            "tool-equipment" => Ok(Self::ToolEquipment),
            other => Err(EngineError::Validation(format!(
                "invalid equipment category: {other}"
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ownership {
    Owned,
    RentedFromVendor,
}

impl Ownership {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Owned => "owned",
            Self::RentedFromVendor => "rented_from_vendor",
        }
    }
}

impl TryFrom<&str> for Ownership {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "owned" => Ok(Self::Owned),
            "rented_from_vendor" => Ok(Self::RentedFromVendor),
            other => Err(EngineError::Validation(format!(
                "invalid ownership type: {other}"
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EquipmentStatus {
    Available,
    Assigned,
    Maintenance,
}

impl EquipmentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Assigned => "assigned",
            Self::Maintenance => "maintenance",
        }
    }
}

impl TryFrom<&str> for EquipmentStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "available" => Ok(Self::Available),
            "assigned" => Ok(Self::Assigned),
            "maintenance" => Ok(Self::Maintenance),
            other => Err(EngineError::Validation(format!(
                "invalid equipment status: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Equipment {
    pub id: Uuid,
    pub name: String,
    pub category: EquipmentCategory,
    pub ownership: Ownership,
    pub status: EquipmentStatus,
    /// Default rate offered when assigning; the actual rate is fixed per
    /// assignment.
    pub default_rate: Option<Money>,
    pub default_rate_unit: Option<RateUnit>,
    /// Stock count; only meaningful for consumables (1 otherwise).
    pub quantity: i64,
    /// The single open assignment, if the unit is out.
    pub open_assignment: Option<RentalAssignment>,
}

impl Equipment {
    pub fn new(
        name: String,
        category: EquipmentCategory,
        ownership: Ownership,
        default_rate: Option<Money>,
        default_rate_unit: Option<RateUnit>,
        quantity: i64,
    ) -> Result<Self, EngineError> {
        if quantity < 0 {
            return Err(EngineError::Validation(
                "quantity must not be negative".to_string(),
            ));
        }
        if default_rate.is_some_and(Money::is_negative) {
            return Err(EngineError::Validation(
                "rate must not be negative".to_string(),
            ));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            name,
            category,
            ownership,
            status: EquipmentStatus::Available,
            default_rate,
            default_rate_unit,
            quantity,
            open_assignment: None,
        })
    }

    pub fn is_consumable(&self) -> bool {
        self.category == EquipmentCategory::Consumable
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "equipment")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub name: String,
    pub category: String,
    pub ownership: String,
    pub status: String,
    pub default_rate_minor: Option<i64>,
    pub default_rate_unit: Option<String>,
    pub quantity: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::rental::Entity")]
    RentalAssignments,
}

impl Related<super::rental::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::RentalAssignments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Equipment> for ActiveModel {
    fn from(equipment: &Equipment) -> Self {
        Self {
            id: ActiveValue::Set(equipment.id.to_string()),
            name: ActiveValue::Set(equipment.name.clone()),
            category: ActiveValue::Set(equipment.category.as_str().to_string()),
            ownership: ActiveValue::Set(equipment.ownership.as_str().to_string()),
            status: ActiveValue::Set(equipment.status.as_str().to_string()),
            default_rate_minor: ActiveValue::Set(equipment.default_rate.map(Money::minor)),
            default_rate_unit: ActiveValue::Set(
                equipment.default_rate_unit.map(|u| u.as_str().to_string()),
            ),
            quantity: ActiveValue::Set(equipment.quantity),
        }
    }
}

impl TryFrom<Model> for Equipment {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Uuid::parse_str(&model.id)
                .map_err(|_| EngineError::NotFound("equipment".to_string()))?,
            name: model.name,
            category: EquipmentCategory::try_from(model.category.as_str())?,
            ownership: Ownership::try_from(model.ownership.as_str())?,
            status: EquipmentStatus::try_from(model.status.as_str())?,
            default_rate: model.default_rate_minor.map(Money::new),
            default_rate_unit: match model.default_rate_unit.as_deref() {
                Some(raw) => Some(RateUnit::try_from(raw)?),
                None => None,
            },
            quantity: model.quantity,
            open_assignment: None,
        })
    }
}
