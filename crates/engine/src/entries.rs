//! Ledger entries.
//!
//! A [`LedgerEntry`] is a single signed balance change against one account.
//! Entries are **append-only**: nothing updates or deletes them through the
//! engine. A correction is a new entry with the opposite direction and a
//! description noting the reversal. This is the audit trail the rest of the
//! system reconciles against.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Currency, EngineError, Money};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Credit,
    Debit,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Credit => "credit",
            Self::Debit => "debit",
        }
    }

    /// Signs an amount: credits are positive, debits negative.
    pub fn signed(self, amount: Money) -> Money {
        match self {
            Self::Credit => amount,
            Self::Debit => -amount,
        }
    }
}

impl TryFrom<&str> for Direction {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "credit" => Ok(Self::Credit),
            "debit" => Ok(Self::Debit),
            other => Err(EngineError::Validation(format!(
                "invalid entry direction: {other}"
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryCategory {
    Wage,
    Advance,
    Deduction,
    WalletAllocation,
    BankTransfer,
    Deposit,
    RentalExpense,
    Other,
}

impl EntryCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Wage => "wage",
            Self::Advance => "advance",
            Self::Deduction => "deduction",
            Self::WalletAllocation => "wallet_allocation",
            Self::BankTransfer => "bank_transfer",
            Self::Deposit => "deposit",
            Self::RentalExpense => "rental_expense",
            Self::Other => "other",
        }
    }
}

impl TryFrom<&str> for EntryCategory {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "wage" => Ok(Self::Wage),
            "advance" => Ok(Self::Advance),
            "deduction" => Ok(Self::Deduction),
            "wallet_allocation" => Ok(Self::WalletAllocation),
            "bank_transfer" => Ok(Self::BankTransfer),
            "deposit" => Ok(Self::Deposit),
            "rental_expense" => Ok(Self::RentalExpense),
            "other" => Ok(Self::Other),
            other => Err(EngineError::Validation(format!(
                "invalid entry category: {other}"
            ))),
        }
    }
}

/// Kind of a payment against a payable account (labourer, contractor,
/// vendor). Wage payments are capped by the pending amount for some account
/// kinds; advances and deductions never are.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentKind {
    Wage,
    Advance,
    Deduction,
}

impl PaymentKind {
    pub fn category(self) -> EntryCategory {
        match self {
            Self::Wage => EntryCategory::Wage,
            Self::Advance => EntryCategory::Advance,
            Self::Deduction => EntryCategory::Deduction,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Wage => "wage",
            Self::Advance => "advance",
            Self::Deduction => "deduction",
        }
    }
}

/// How the money physically moved, as recorded on payment forms.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMode {
    Cash,
    Bank,
    Upi,
    Cheque,
}

impl PaymentMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cash => "cash",
            Self::Bank => "bank",
            Self::Upi => "upi",
            Self::Cheque => "cheque",
        }
    }
}

impl TryFrom<&str> for PaymentMode {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "cash" => Ok(Self::Cash),
            "bank" => Ok(Self::Bank),
            "upi" => Ok(Self::Upi),
            "cheque" => Ok(Self::Cheque),
            other => Err(EngineError::Validation(format!(
                "invalid payment mode: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub account_id: Uuid,
    pub direction: Direction,
    /// Always positive; the sign lives in `direction`.
    pub amount: Money,
    pub currency: Currency,
    pub category: EntryCategory,
    pub occurred_at: DateTime<Utc>,
    pub description: String,
    /// The other account of a paired transfer/allocation leg.
    pub counterpart_account_id: Option<Uuid>,
    /// The rental assignment that generated this entry, if any.
    pub source_assignment_id: Option<Uuid>,
    pub mode: Option<PaymentMode>,
    /// Actor id from the identity feed; stored verbatim for audit.
    pub recorded_by: String,
}

impl LedgerEntry {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        account_id: Uuid,
        direction: Direction,
        amount: Money,
        category: EntryCategory,
        occurred_at: DateTime<Utc>,
        description: String,
        recorded_by: String,
    ) -> Result<Self, EngineError> {
        if !amount.is_positive() {
            return Err(EngineError::Validation(
                "entry amount must be > 0".to_string(),
            ));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            account_id,
            direction,
            amount,
            currency: Currency::Inr,
            category,
            occurred_at,
            description,
            counterpart_account_id: None,
            source_assignment_id: None,
            mode: None,
            recorded_by,
        })
    }

    pub fn with_counterpart(mut self, account_id: Uuid) -> Self {
        self.counterpart_account_id = Some(account_id);
        self
    }

    pub fn with_source_assignment(mut self, assignment_id: Uuid) -> Self {
        self.source_assignment_id = Some(assignment_id);
        self
    }

    pub fn with_mode(mut self, mode: PaymentMode) -> Self {
        self.mode = Some(mode);
        self
    }

    /// The entry's contribution to `sum(credits) - sum(debits)`.
    pub fn signed(&self) -> Money {
        self.direction.signed(self.amount)
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "ledger_entries")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub account_id: String,
    pub direction: String,
    pub amount_minor: i64,
    pub currency: String,
    pub category: String,
    pub occurred_at: DateTimeUtc,
    pub description: String,
    pub counterpart_account_id: Option<String>,
    pub source_assignment_id: Option<String>,
    pub mode: Option<String>,
    pub recorded_by: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::accounts::Entity",
        from = "Column::AccountId",
        to = "super::accounts::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Accounts,
}

impl Related<super::accounts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Accounts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&LedgerEntry> for ActiveModel {
    fn from(entry: &LedgerEntry) -> Self {
        Self {
            id: ActiveValue::Set(entry.id.to_string()),
            account_id: ActiveValue::Set(entry.account_id.to_string()),
            direction: ActiveValue::Set(entry.direction.as_str().to_string()),
            amount_minor: ActiveValue::Set(entry.amount.minor()),
            currency: ActiveValue::Set(entry.currency.code().to_string()),
            category: ActiveValue::Set(entry.category.as_str().to_string()),
            occurred_at: ActiveValue::Set(entry.occurred_at),
            description: ActiveValue::Set(entry.description.clone()),
            counterpart_account_id: ActiveValue::Set(
                entry.counterpart_account_id.map(|id| id.to_string()),
            ),
            source_assignment_id: ActiveValue::Set(
                entry.source_assignment_id.map(|id| id.to_string()),
            ),
            mode: ActiveValue::Set(entry.mode.map(|m| m.as_str().to_string())),
            recorded_by: ActiveValue::Set(entry.recorded_by.clone()),
        }
    }
}

impl TryFrom<Model> for LedgerEntry {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Uuid::parse_str(&model.id)
                .map_err(|_| EngineError::NotFound("ledger entry".to_string()))?,
            account_id: Uuid::parse_str(&model.account_id)
                .map_err(|_| EngineError::NotFound("account".to_string()))?,
            direction: Direction::try_from(model.direction.as_str())?,
            amount: Money::new(model.amount_minor),
            currency: Currency::try_from(model.currency.as_str()).unwrap_or_default(),
            category: EntryCategory::try_from(model.category.as_str())?,
            occurred_at: model.occurred_at,
            description: model.description,
            counterpart_account_id: model
                .counterpart_account_id
                .and_then(|s| Uuid::parse_str(&s).ok()),
            source_assignment_id: model
                .source_assignment_id
                .and_then(|s| Uuid::parse_str(&s).ok()),
            mode: match model.mode.as_deref() {
                Some(raw) => Some(PaymentMode::try_from(raw)?),
                None => None,
            },
            recorded_by: model.recorded_by,
        })
    }
}
