//! Ledger accounts.
//!
//! An [`Account`] is anything money is tracked against: a labourer's pending
//! payout, a contractor or vendor payable, a creditor, a bank account or a
//! site wallet. The balance is **derived** from ledger entries: the cached
//! `ledger_net_minor` is a projection kept in step with appends and can be
//! recomputed from the `ledger_entries` table at any time.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    Currency, EngineError, Money,
    entries::Direction,
};

/// Tagged account kind with kind-specific attributes.
///
/// The source system duck-typed these records; here every consumer matches
/// exhaustively so a new kind cannot be silently half-supported.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AccountKind {
    Labourer { daily_wage: Money },
    Contractor,
    Vendor,
    Creditor,
    BankAccount { ifsc: String, branch: String },
    Wallet,
}

impl AccountKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Labourer { .. } => "labourer",
            Self::Contractor => "contractor",
            Self::Vendor => "vendor",
            Self::Creditor => "creditor",
            Self::BankAccount { .. } => "bank_account",
            Self::Wallet => "wallet",
        }
    }

    /// Payable accounts accrue an externally-supplied "earned" figure and are
    /// paid down via wage/advance/deduction entries.
    pub fn is_payable(&self) -> bool {
        matches!(
            self,
            Self::Labourer { .. } | Self::Contractor | Self::Vendor
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub name: String,
    pub kind: AccountKind,
    pub currency: Currency,
    /// Attendance-derived earnings for payable accounts, in minor units.
    /// Opaque input pushed by the external attendance feed; always 0 for
    /// other kinds.
    pub earned_minor: i64,
    /// Cached `sum(credits) - sum(debits)` over this account's entries.
    pub ledger_net_minor: i64,
    pub created_at: DateTime<Utc>,
}

impl Account {
    pub fn new(name: String, kind: AccountKind, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            kind,
            currency: Currency::Inr,
            earned_minor: 0,
            ledger_net_minor: 0,
            created_at,
        }
    }

    /// Folds one entry into the cached net. The caller is responsible for
    /// having durably appended the entry first.
    pub fn apply_entry(&mut self, direction: Direction, amount: Money) {
        self.ledger_net_minor += direction.signed(amount).minor();
    }

    /// Cached net after applying a hypothetical entry, without mutating.
    pub fn preview_entry(&self, direction: Direction, amount: Money) -> i64 {
        self.ledger_net_minor + direction.signed(amount).minor()
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "accounts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub name: String,
    pub kind: String,
    pub currency: String,
    pub daily_wage_minor: Option<i64>,
    pub ifsc: Option<String>,
    pub branch: Option<String>,
    pub earned_minor: i64,
    pub ledger_net_minor: i64,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::entries::Entity")]
    LedgerEntries,
}

impl Related<super::entries::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::LedgerEntries.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Account> for ActiveModel {
    fn from(account: &Account) -> Self {
        let (daily_wage_minor, ifsc, branch) = match &account.kind {
            AccountKind::Labourer { daily_wage } => (Some(daily_wage.minor()), None, None),
            AccountKind::BankAccount { ifsc, branch } => {
                (None, Some(ifsc.clone()), Some(branch.clone()))
            }
            _ => (None, None, None),
        };
        Self {
            id: ActiveValue::Set(account.id.to_string()),
            name: ActiveValue::Set(account.name.clone()),
            kind: ActiveValue::Set(account.kind.as_str().to_string()),
            currency: ActiveValue::Set(account.currency.code().to_string()),
            daily_wage_minor: ActiveValue::Set(daily_wage_minor),
            ifsc: ActiveValue::Set(ifsc),
            branch: ActiveValue::Set(branch),
            earned_minor: ActiveValue::Set(account.earned_minor),
            ledger_net_minor: ActiveValue::Set(account.ledger_net_minor),
            created_at: ActiveValue::Set(account.created_at),
        }
    }
}

impl TryFrom<Model> for Account {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        let kind = match model.kind.as_str() {
            "labourer" => AccountKind::Labourer {
                daily_wage: Money::new(model.daily_wage_minor.unwrap_or(0)),
            },
            "contractor" => AccountKind::Contractor,
            "vendor" => AccountKind::Vendor,
            "creditor" => AccountKind::Creditor,
            "bank_account" => AccountKind::BankAccount {
                ifsc: model.ifsc.unwrap_or_default(),
                branch: model.branch.unwrap_or_default(),
            },
            "wallet" => AccountKind::Wallet,
            other => {
                return Err(EngineError::Validation(format!(
                    "invalid account kind: {other}"
                )));
            }
        };
        Ok(Self {
            id: Uuid::parse_str(&model.id)
                .map_err(|_| EngineError::NotFound("account".to_string()))?,
            name: model.name,
            kind,
            currency: Currency::try_from(model.currency.as_str()).unwrap_or_default(),
            earned_minor: model.earned_minor,
            ledger_net_minor: model.ledger_net_minor,
            created_at: model.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn wallet() -> Account {
        Account::new(
            "Site Wallet".to_string(),
            AccountKind::Wallet,
            Utc.timestamp_opt(0, 0).unwrap(),
        )
    }

    #[test]
    fn apply_entry_updates_cached_net() {
        let mut account = wallet();
        account.apply_entry(Direction::Credit, Money::new(5_000));
        account.apply_entry(Direction::Debit, Money::new(1_200));

        assert_eq!(account.ledger_net_minor, 3_800);
    }

    #[test]
    fn preview_does_not_mutate() {
        let account = wallet();
        let previewed = account.preview_entry(Direction::Debit, Money::new(700));

        assert_eq!(previewed, -700);
        assert_eq!(account.ledger_net_minor, 0);
    }

    #[test]
    fn model_round_trip_keeps_kind_attributes() {
        let account = Account::new(
            "Ramesh".to_string(),
            AccountKind::Labourer {
                daily_wage: Money::new(50_000),
            },
            Utc.timestamp_opt(0, 0).unwrap(),
        );
        let model = Model {
            id: account.id.to_string(),
            name: account.name.clone(),
            kind: account.kind.as_str().to_string(),
            currency: "INR".to_string(),
            daily_wage_minor: Some(50_000),
            ifsc: None,
            branch: None,
            earned_minor: 0,
            ledger_net_minor: 0,
            created_at: account.created_at,
        };

        let restored = Account::try_from(model).unwrap();
        assert_eq!(restored, account);
    }
}
