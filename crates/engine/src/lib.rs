//! Site operations billing and ledger engine.
//!
//! The engine owns two things:
//!
//! - a **multi-ledger**: accounts (labourers, contractors, vendors,
//!   creditors, bank accounts, wallets) whose balances are projections over
//!   an append-only stream of [`LedgerEntry`]s;
//! - the **rental state machine**: per-equipment assignments with
//!   pause/resume history, billed on return through [`compute_charge`].
//!
//! All mutating operations take `&mut self`, which serializes state
//! transitions per process, and every multi-row write happens inside one
//! database transaction. In-memory aggregates are only updated after the
//! commit, so a failed operation leaves no partial effect. Callers supply
//! `occurred_at`/`now` explicitly; the engine never reads the wall clock.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use uuid::Uuid;

pub use accounts::{Account, AccountKind};
pub use billing::{Charge, RateUnit, compute_charge};
pub use currency::Currency;
pub use entries::{Direction, EntryCategory, LedgerEntry, PaymentKind, PaymentMode};
pub use equipment::{Equipment, EquipmentCategory, EquipmentStatus, Ownership};
pub use error::EngineError;
pub use money::Money;
pub use pauses::PauseInterval;
pub use rental::{Assignee, RentalAssignment};
use sea_orm::{ActiveValue, QueryFilter, QueryOrder, TransactionTrait, prelude::*};

mod accounts;
mod balances;
mod billing;
mod currency;
mod entries;
mod equipment;
mod error;
mod money;
mod pauses;
mod rental;

type ResultEngine<T> = Result<T, EngineError>;

/// Result of returning a rented equipment unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReturnOutcome {
    pub assignment_id: Uuid,
    /// The rental_expense entry posted against the billing account. `None`
    /// when the charge came to zero (zero rate or clamped duration): a
    /// zero-amount entry would violate the ledger contract, so nothing is
    /// posted.
    pub entry_id: Option<Uuid>,
    pub charge: Charge,
}

#[derive(Debug)]
pub struct Engine {
    accounts: HashMap<Uuid, Account>,
    equipment: HashMap<Uuid, Equipment>,
    database: DatabaseConnection,
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    /// Return an [`Account`].
    pub fn account(&self, account_id: Uuid) -> ResultEngine<&Account> {
        self.accounts
            .get(&account_id)
            .ok_or_else(|| EngineError::NotFound(account_id.to_string()))
    }

    fn account_mut(&mut self, account_id: Uuid) -> ResultEngine<&mut Account> {
        self.accounts
            .get_mut(&account_id)
            .ok_or_else(|| EngineError::NotFound(account_id.to_string()))
    }

    pub fn accounts(&self) -> impl Iterator<Item = &Account> {
        self.accounts.values()
    }

    /// Return an [`Equipment`] unit.
    pub fn equipment(&self, equipment_id: Uuid) -> ResultEngine<&Equipment> {
        self.equipment
            .get(&equipment_id)
            .ok_or_else(|| EngineError::NotFound(equipment_id.to_string()))
    }

    fn equipment_mut(&mut self, equipment_id: Uuid) -> ResultEngine<&mut Equipment> {
        self.equipment
            .get_mut(&equipment_id)
            .ok_or_else(|| EngineError::NotFound(equipment_id.to_string()))
    }

    pub fn all_equipment(&self) -> impl Iterator<Item = &Equipment> {
        self.equipment.values()
    }

    /// Looks an account up by its display name.
    pub fn find_account_by_name(&self, name: &str) -> ResultEngine<&Account> {
        self.accounts
            .values()
            .find(|account| account.name == name)
            .ok_or_else(|| EngineError::NotFound(name.to_string()))
    }

    /// Registers a new account.
    pub async fn new_account(
        &mut self,
        name: &str,
        kind: AccountKind,
        created_at: DateTime<Utc>,
    ) -> ResultEngine<Uuid> {
        let account = Account::new(name.to_string(), kind, created_at);
        let account_id = account.id;
        accounts::ActiveModel::from(&account)
            .insert(&self.database)
            .await?;
        self.accounts.insert(account_id, account);
        Ok(account_id)
    }

    /// Registers a new equipment unit (or consumable stock line).
    pub async fn new_equipment(
        &mut self,
        name: &str,
        category: EquipmentCategory,
        ownership: Ownership,
        default_rate: Option<Money>,
        default_rate_unit: Option<RateUnit>,
        quantity: i64,
    ) -> ResultEngine<Uuid> {
        let unit = Equipment::new(
            name.to_string(),
            category,
            ownership,
            default_rate,
            default_rate_unit,
            quantity,
        )?;
        let equipment_id = unit.id;
        equipment::ActiveModel::from(&unit)
            .insert(&self.database)
            .await?;
        self.equipment.insert(equipment_id, unit);
        Ok(equipment_id)
    }

    /// Pushes the attendance-derived earned figure for a payable account.
    ///
    /// The engine treats this as an opaque input: it never derives earnings
    /// itself, it only projects pending = earned + credits - debits.
    pub async fn update_earned(&mut self, account_id: Uuid, earned: Money) -> ResultEngine<()> {
        if earned.is_negative() {
            return Err(EngineError::Validation(
                "earned must not be negative".to_string(),
            ));
        }
        {
            let account = self.account(account_id)?;
            if !account.kind.is_payable() {
                return Err(EngineError::Validation(
                    "earned only applies to labourer/contractor/vendor accounts".to_string(),
                ));
            }
        }

        let account_model = accounts::ActiveModel {
            id: ActiveValue::Set(account_id.to_string()),
            earned_minor: ActiveValue::Set(earned.minor()),
            ..Default::default()
        };
        account_model.update(&self.database).await?;

        self.account_mut(account_id)?.earned_minor = earned.minor();
        Ok(())
    }

    /// Current balance, projected from the cached ledger net.
    ///
    /// For wallets and bank accounts this is credits - debits; for payables
    /// it is the pending amount; for creditors a negative value means money
    /// is still owed.
    pub fn balance(&self, account_id: Uuid) -> ResultEngine<Money> {
        let account = self.account(account_id)?;
        Ok(balances::projected(
            &account.kind,
            account.earned_minor,
            account.ledger_net_minor,
        ))
    }

    /// Same projection as [`balance`](Self::balance), but folded from
    /// scratch over the `ledger_entries` table. Must always agree with the
    /// incremental value.
    pub async fn recompute_balance(&self, account_id: Uuid) -> ResultEngine<Money> {
        let account = self.account(account_id)?;

        let entry_models = entries::Entity::find()
            .filter(entries::Column::AccountId.eq(account_id.to_string()))
            .all(&self.database)
            .await?;

        let mut net_minor = 0i64;
        for model in entry_models {
            let entry = LedgerEntry::try_from(model)?;
            net_minor += entry.signed().minor();
        }

        Ok(balances::projected(
            &account.kind,
            account.earned_minor,
            net_minor,
        ))
    }

    /// Lists an account's entries, oldest first, optionally restricted to a
    /// date range (inclusive bounds).
    pub async fn entries_for(
        &self,
        account_id: Uuid,
        range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    ) -> ResultEngine<Vec<LedgerEntry>> {
        self.account(account_id)?;

        let mut query = entries::Entity::find()
            .filter(entries::Column::AccountId.eq(account_id.to_string()))
            .order_by_asc(entries::Column::OccurredAt);

        if let Some((from, to)) = range {
            if from > to {
                return Err(EngineError::Validation(
                    "date range start is after its end".to_string(),
                ));
            }
            query = query
                .filter(entries::Column::OccurredAt.gte(from))
                .filter(entries::Column::OccurredAt.lte(to));
        }

        let models = query.all(&self.database).await?;
        let mut out = Vec::with_capacity(models.len());
        for model in models {
            out.push(LedgerEntry::try_from(model)?);
        }
        Ok(out)
    }

    /// Appends one entry and its cached-net update atomically.
    async fn append_single(&mut self, entry: LedgerEntry) -> ResultEngine<Uuid> {
        let new_net = {
            let account = self.account(entry.account_id)?;
            account.preview_entry(entry.direction, entry.amount)
        };

        let db_tx = self.database.begin().await?;
        entries::ActiveModel::from(&entry).insert(&db_tx).await?;
        let account_model = accounts::ActiveModel {
            id: ActiveValue::Set(entry.account_id.to_string()),
            ledger_net_minor: ActiveValue::Set(new_net),
            ..Default::default()
        };
        account_model.update(&db_tx).await?;
        db_tx.commit().await?;

        let entry_id = entry.id;
        let account = self.account_mut(entry.account_id)?;
        account.apply_entry(entry.direction, entry.amount);
        Ok(entry_id)
    }

    /// Appends a debit/credit pair atomically. The two legs must net to
    /// zero across the two accounts; no reader can observe one leg without
    /// the other.
    async fn append_paired(
        &mut self,
        debit: LedgerEntry,
        credit: LedgerEntry,
    ) -> ResultEngine<(Uuid, Uuid)> {
        debug_assert_eq!(debit.amount, credit.amount);

        let debit_net = {
            let account = self.account(debit.account_id)?;
            account.preview_entry(debit.direction, debit.amount)
        };
        let credit_net = {
            let account = self.account(credit.account_id)?;
            account.preview_entry(credit.direction, credit.amount)
        };

        let db_tx = self.database.begin().await?;
        entries::ActiveModel::from(&debit).insert(&db_tx).await?;
        entries::ActiveModel::from(&credit).insert(&db_tx).await?;
        for (account_id, new_net) in [
            (debit.account_id, debit_net),
            (credit.account_id, credit_net),
        ] {
            let account_model = accounts::ActiveModel {
                id: ActiveValue::Set(account_id.to_string()),
                ledger_net_minor: ActiveValue::Set(new_net),
                ..Default::default()
            };
            account_model.update(&db_tx).await?;
        }
        db_tx.commit().await?;

        let ids = (debit.id, credit.id);
        self.account_mut(debit.account_id)?
            .apply_entry(debit.direction, debit.amount);
        self.account_mut(credit.account_id)?
            .apply_entry(credit.direction, credit.amount);
        Ok(ids)
    }

    /// Records a wage, advance or deduction payment against a payable
    /// account.
    ///
    /// Wage payments against labourer and vendor accounts are capped by the
    /// pending amount ([`EngineError::OverLimit`]); contractor wage payments
    /// and all advances/deductions are uncapped.
    #[allow(clippy::too_many_arguments)]
    pub async fn record_payment(
        &mut self,
        account_id: Uuid,
        kind: PaymentKind,
        amount: Money,
        mode: PaymentMode,
        remarks: &str,
        recorded_by: &str,
        occurred_at: DateTime<Utc>,
    ) -> ResultEngine<Uuid> {
        {
            let account = self.account(account_id)?;
            if !account.kind.is_payable() {
                return Err(EngineError::Validation(
                    "payments only apply to labourer/contractor/vendor accounts".to_string(),
                ));
            }
            if !amount.is_positive() {
                return Err(EngineError::Validation(
                    "payment amount must be > 0".to_string(),
                ));
            }

            let capped = matches!(
                account.kind,
                AccountKind::Labourer { .. } | AccountKind::Vendor
            );
            if kind == PaymentKind::Wage && capped {
                let pending =
                    balances::projected(&account.kind, account.earned_minor, account.ledger_net_minor);
                if amount > pending {
                    return Err(EngineError::OverLimit {
                        pending_minor: pending.minor(),
                        requested_minor: amount.minor(),
                    });
                }
            }
        }

        let entry = LedgerEntry::new(
            account_id,
            Direction::Debit,
            amount,
            kind.category(),
            occurred_at,
            remarks.to_string(),
            recorded_by.to_string(),
        )?
        .with_mode(mode);

        let entry_id = self.append_single(entry).await?;
        tracing::info!(
            %account_id,
            kind = kind.as_str(),
            amount = %amount,
            "payment recorded"
        );
        Ok(entry_id)
    }

    /// Posts a borrowing (credit) or repayment (debit) against a creditor
    /// account. The balance projection reads debits - credits, so an unpaid
    /// loan shows as a negative amount still owed.
    #[allow(clippy::too_many_arguments)]
    pub async fn record_creditor_entry(
        &mut self,
        account_id: Uuid,
        direction: Direction,
        amount: Money,
        mode: PaymentMode,
        description: &str,
        recorded_by: &str,
        occurred_at: DateTime<Utc>,
    ) -> ResultEngine<Uuid> {
        if self.account(account_id)?.kind != AccountKind::Creditor {
            return Err(EngineError::Validation(
                "creditor entries only apply to creditor accounts".to_string(),
            ));
        }

        let entry = LedgerEntry::new(
            account_id,
            direction,
            amount,
            EntryCategory::Other,
            occurred_at,
            description.to_string(),
            recorded_by.to_string(),
        )?
        .with_mode(mode);

        let entry_id = self.append_single(entry).await?;
        tracing::info!(
            %account_id,
            direction = direction.as_str(),
            amount = %amount,
            "creditor entry recorded"
        );
        Ok(entry_id)
    }

    /// Moves money from a bank account into a wallet (a site manager's
    /// spendable balance). Debits the bank, credits the wallet.
    #[allow(clippy::too_many_arguments)]
    pub async fn allocate(
        &mut self,
        from_bank_id: Uuid,
        to_wallet_id: Uuid,
        amount: Money,
        description: &str,
        recorded_by: &str,
        occurred_at: DateTime<Utc>,
    ) -> ResultEngine<(Uuid, Uuid)> {
        if !amount.is_positive() {
            return Err(EngineError::Validation(
                "allocation amount must be > 0".to_string(),
            ));
        }
        if !matches!(self.account(from_bank_id)?.kind, AccountKind::BankAccount { .. }) {
            return Err(EngineError::Validation(
                "allocation source must be a bank account".to_string(),
            ));
        }
        if !matches!(self.account(to_wallet_id)?.kind, AccountKind::Wallet) {
            return Err(EngineError::Validation(
                "allocation destination must be a wallet".to_string(),
            ));
        }

        let debit = LedgerEntry::new(
            from_bank_id,
            Direction::Debit,
            amount,
            EntryCategory::WalletAllocation,
            occurred_at,
            description.to_string(),
            recorded_by.to_string(),
        )?
        .with_counterpart(to_wallet_id);
        let credit = LedgerEntry::new(
            to_wallet_id,
            Direction::Credit,
            amount,
            EntryCategory::WalletAllocation,
            occurred_at,
            description.to_string(),
            recorded_by.to_string(),
        )?
        .with_counterpart(from_bank_id);

        let ids = self.append_paired(debit, credit).await?;
        tracing::info!(%from_bank_id, %to_wallet_id, amount = %amount, "wallet allocation");
        Ok(ids)
    }

    /// Moves money between two bank accounts.
    #[allow(clippy::too_many_arguments)]
    pub async fn transfer(
        &mut self,
        from_bank_id: Uuid,
        to_bank_id: Uuid,
        amount: Money,
        description: &str,
        recorded_by: &str,
        occurred_at: DateTime<Utc>,
    ) -> ResultEngine<(Uuid, Uuid)> {
        if from_bank_id == to_bank_id {
            return Err(EngineError::Validation(
                "source and destination banks must differ".to_string(),
            ));
        }
        if !amount.is_positive() {
            return Err(EngineError::Validation(
                "transfer amount must be > 0".to_string(),
            ));
        }
        for bank_id in [from_bank_id, to_bank_id] {
            if !matches!(self.account(bank_id)?.kind, AccountKind::BankAccount { .. }) {
                return Err(EngineError::Validation(
                    "transfers run between bank accounts".to_string(),
                ));
            }
        }

        let debit = LedgerEntry::new(
            from_bank_id,
            Direction::Debit,
            amount,
            EntryCategory::BankTransfer,
            occurred_at,
            description.to_string(),
            recorded_by.to_string(),
        )?
        .with_counterpart(to_bank_id);
        let credit = LedgerEntry::new(
            to_bank_id,
            Direction::Credit,
            amount,
            EntryCategory::BankTransfer,
            occurred_at,
            description.to_string(),
            recorded_by.to_string(),
        )?
        .with_counterpart(from_bank_id);

        let ids = self.append_paired(debit, credit).await?;
        tracing::info!(%from_bank_id, %to_bank_id, amount = %amount, "bank transfer");
        Ok(ids)
    }

    /// Records external cash injected into a bank account (single-sided
    /// credit).
    #[allow(clippy::too_many_arguments)]
    pub async fn deposit(
        &mut self,
        bank_id: Uuid,
        amount: Money,
        mode: PaymentMode,
        description: &str,
        recorded_by: &str,
        occurred_at: DateTime<Utc>,
    ) -> ResultEngine<Uuid> {
        if !matches!(self.account(bank_id)?.kind, AccountKind::BankAccount { .. }) {
            return Err(EngineError::Validation(
                "deposits go to a bank account".to_string(),
            ));
        }

        let entry = LedgerEntry::new(
            bank_id,
            Direction::Credit,
            amount,
            EntryCategory::Deposit,
            occurred_at,
            description.to_string(),
            recorded_by.to_string(),
        )?
        .with_mode(mode);

        let entry_id = self.append_single(entry).await?;
        tracing::info!(%bank_id, amount = %amount, "deposit recorded");
        Ok(entry_id)
    }

    /// Toggles maintenance on an available unit.
    pub async fn set_maintenance(&mut self, equipment_id: Uuid, on: bool) -> ResultEngine<()> {
        let new_status = {
            let unit = self.equipment(equipment_id)?;
            if unit.status == EquipmentStatus::Assigned {
                return Err(EngineError::Conflict(
                    "equipment is assigned".to_string(),
                ));
            }
            if on {
                EquipmentStatus::Maintenance
            } else {
                EquipmentStatus::Available
            }
        };

        let equipment_model = equipment::ActiveModel {
            id: ActiveValue::Set(equipment_id.to_string()),
            status: ActiveValue::Set(new_status.as_str().to_string()),
            ..Default::default()
        };
        equipment_model.update(&self.database).await?;

        self.equipment_mut(equipment_id)?.status = new_status;
        Ok(())
    }

    /// Adjusts consumable stock by `delta` (positive = stock in, negative =
    /// stock out). Returns the new quantity.
    pub async fn adjust_consumable_quantity(
        &mut self,
        equipment_id: Uuid,
        delta: i64,
    ) -> ResultEngine<i64> {
        let new_quantity = {
            let unit = self.equipment(equipment_id)?;
            if !unit.is_consumable() {
                return Err(EngineError::Validation(
                    "quantity adjustments only apply to consumables".to_string(),
                ));
            }
            let new_quantity = unit.quantity + delta;
            if new_quantity < 0 {
                return Err(EngineError::Validation(
                    "insufficient stock".to_string(),
                ));
            }
            new_quantity
        };

        let equipment_model = equipment::ActiveModel {
            id: ActiveValue::Set(equipment_id.to_string()),
            quantity: ActiveValue::Set(new_quantity),
            ..Default::default()
        };
        equipment_model.update(&self.database).await?;

        self.equipment_mut(equipment_id)?.quantity = new_quantity;
        Ok(new_quantity)
    }

    /// Assigns an available unit to a project or contractor, opening a
    /// rental assignment at `now`.
    pub async fn assign_equipment(
        &mut self,
        equipment_id: Uuid,
        assignee: Assignee,
        rate: Money,
        rate_unit: RateUnit,
        now: DateTime<Utc>,
    ) -> ResultEngine<Uuid> {
        {
            let unit = self.equipment(equipment_id)?;
            if unit.is_consumable() {
                return Err(EngineError::Validation(
                    "consumables cannot be assigned".to_string(),
                ));
            }
            if unit.status != EquipmentStatus::Available {
                return Err(EngineError::Conflict(format!(
                    "equipment is {}",
                    unit.status.as_str()
                )));
            }
        }
        // The billing account must exist now, not at return time.
        self.account(assignee.billing_account_id())?;

        let assignment = RentalAssignment::new(equipment_id, assignee, rate, rate_unit, now)?;
        let assignment_id = assignment.id;

        let db_tx = self.database.begin().await?;
        rental::ActiveModel::from(&assignment).insert(&db_tx).await?;
        let equipment_model = equipment::ActiveModel {
            id: ActiveValue::Set(equipment_id.to_string()),
            status: ActiveValue::Set(EquipmentStatus::Assigned.as_str().to_string()),
            ..Default::default()
        };
        equipment_model.update(&db_tx).await?;
        db_tx.commit().await?;

        let unit = self.equipment_mut(equipment_id)?;
        unit.status = EquipmentStatus::Assigned;
        unit.open_assignment = Some(assignment);
        tracing::info!(%equipment_id, %assignment_id, rate = %rate, "equipment assigned");
        Ok(assignment_id)
    }

    /// Pauses rent accrual on an assigned unit.
    pub async fn pause_rental(
        &mut self,
        equipment_id: Uuid,
        now: DateTime<Utc>,
    ) -> ResultEngine<Uuid> {
        let mut assignment = self
            .equipment(equipment_id)?
            .open_assignment
            .clone()
            .ok_or_else(|| EngineError::InvalidState("equipment is not assigned".to_string()))?;

        let interval = assignment.pause(now)?;
        pauses::ActiveModel::from(&interval)
            .insert(&self.database)
            .await?;

        self.equipment_mut(equipment_id)?.open_assignment = Some(assignment);
        tracing::info!(%equipment_id, "rent paused");
        Ok(interval.id)
    }

    /// Resumes rent accrual on a paused unit.
    pub async fn resume_rental(
        &mut self,
        equipment_id: Uuid,
        now: DateTime<Utc>,
    ) -> ResultEngine<Uuid> {
        let mut assignment = self
            .equipment(equipment_id)?
            .open_assignment
            .clone()
            .ok_or_else(|| EngineError::InvalidState("equipment is not assigned".to_string()))?;

        let interval = assignment.resume(now)?;
        let pause_model = pauses::ActiveModel {
            id: ActiveValue::Set(interval.id.to_string()),
            resumed_at: ActiveValue::Set(interval.resumed_at),
            ..Default::default()
        };
        pause_model.update(&self.database).await?;

        self.equipment_mut(equipment_id)?.open_assignment = Some(assignment);
        tracing::info!(%equipment_id, "rent resumed");
        Ok(interval.id)
    }

    /// Returns a rented unit: computes the charge for the billable duration,
    /// posts the rental expense against the assignee's billing account, and
    /// closes the assignment and frees the unit, all in one transaction.
    ///
    /// A unit returned while paused is implicitly resumed at `now` first, so
    /// no open interval dangles into the closed assignment.
    pub async fn return_equipment(
        &mut self,
        equipment_id: Uuid,
        recorded_by: &str,
        now: DateTime<Utc>,
    ) -> ResultEngine<ReturnOutcome> {
        let (mut assignment, equipment_name) = {
            let unit = self.equipment(equipment_id)?;
            let assignment = unit.open_assignment.clone().ok_or_else(|| {
                EngineError::InvalidState("equipment is not assigned".to_string())
            })?;
            (assignment, unit.name.clone())
        };

        // A backwards clock must not block a return: if the open pause
        // started after `now`, close it at its own start (zero length) and
        // let the charge clamp flag the anomaly.
        let implicit_resume = match assignment.pauses.last().copied().filter(PauseInterval::is_open)
        {
            Some(open) => Some(assignment.resume(now.max(open.paused_at))?),
            None => None,
        };

        let billable_seconds = assignment.billable_seconds(now);
        let charge = compute_charge(billable_seconds, assignment.rate, assignment.rate_unit)?;
        let billing_account_id = assignment.assignee.billing_account_id();
        self.account(billing_account_id)?;

        let entry = if charge.total.is_positive() {
            Some(
                LedgerEntry::new(
                    billing_account_id,
                    Direction::Debit,
                    charge.total,
                    EntryCategory::RentalExpense,
                    now,
                    format!("Rental for {equipment_name}"),
                    recorded_by.to_string(),
                )?
                .with_source_assignment(assignment.id),
            )
        } else {
            None
        };
        let new_net = entry.as_ref().map(|e| {
            self.accounts
                .get(&billing_account_id)
                .map(|account| account.preview_entry(e.direction, e.amount))
                .unwrap_or_default()
        });

        assignment.close(now, charge.total);

        let db_tx = self.database.begin().await?;
        if let Some(interval) = implicit_resume {
            let pause_model = pauses::ActiveModel {
                id: ActiveValue::Set(interval.id.to_string()),
                resumed_at: ActiveValue::Set(interval.resumed_at),
                ..Default::default()
            };
            pause_model.update(&db_tx).await?;
        }
        let assignment_model = rental::ActiveModel {
            id: ActiveValue::Set(assignment.id.to_string()),
            ended_at: ActiveValue::Set(assignment.ended_at),
            total_charge_minor: ActiveValue::Set(assignment.total_charge.map(Money::minor)),
            ..Default::default()
        };
        assignment_model.update(&db_tx).await?;
        let equipment_model = equipment::ActiveModel {
            id: ActiveValue::Set(equipment_id.to_string()),
            status: ActiveValue::Set(EquipmentStatus::Available.as_str().to_string()),
            ..Default::default()
        };
        equipment_model.update(&db_tx).await?;
        if let (Some(entry), Some(new_net)) = (&entry, new_net) {
            entries::ActiveModel::from(entry).insert(&db_tx).await?;
            let account_model = accounts::ActiveModel {
                id: ActiveValue::Set(billing_account_id.to_string()),
                ledger_net_minor: ActiveValue::Set(new_net),
                ..Default::default()
            };
            account_model.update(&db_tx).await?;
        }
        db_tx.commit().await?;

        let assignment_id = assignment.id;
        let entry_id = entry.as_ref().map(|e| e.id);
        if let Some(entry) = &entry {
            self.account_mut(billing_account_id)?
                .apply_entry(entry.direction, entry.amount);
        }
        let unit = self.equipment_mut(equipment_id)?;
        unit.status = EquipmentStatus::Available;
        unit.open_assignment = None;

        tracing::info!(
            %equipment_id,
            %assignment_id,
            total = %charge.total,
            billed_units = charge.billed_units,
            "equipment returned"
        );
        Ok(ReturnOutcome {
            assignment_id,
            entry_id,
            charge,
        })
    }

    /// Full assignment history of a unit, oldest first, with pause
    /// intervals attached. This is the "working history" view.
    pub async fn assignment_history(
        &self,
        equipment_id: Uuid,
    ) -> ResultEngine<Vec<RentalAssignment>> {
        self.equipment(equipment_id)?;

        let assignment_models = rental::Entity::find()
            .filter(rental::Column::EquipmentId.eq(equipment_id.to_string()))
            .order_by_asc(rental::Column::StartedAt)
            .all(&self.database)
            .await?;

        let mut out = Vec::with_capacity(assignment_models.len());
        for model in assignment_models {
            let mut assignment = RentalAssignment::try_from(model)?;
            let pause_models = pauses::Entity::find()
                .filter(pauses::Column::AssignmentId.eq(assignment.id.to_string()))
                .order_by_asc(pauses::Column::PausedAt)
                .all(&self.database)
                .await?;
            for pause_model in pause_models {
                assignment.pauses.push(PauseInterval::try_from(pause_model)?);
            }
            out.push(assignment);
        }
        Ok(out)
    }
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    database: DatabaseConnection,
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    /// Construct `Engine`, loading accounts, equipment and open assignments
    /// from the database.
    pub async fn build(self) -> ResultEngine<Engine> {
        let mut accounts = HashMap::new();
        for model in accounts::Entity::find().all(&self.database).await? {
            let account = Account::try_from(model)?;
            accounts.insert(account.id, account);
        }

        let mut equipment: HashMap<Uuid, Equipment> = HashMap::new();
        for model in equipment::Entity::find().all(&self.database).await? {
            let unit = Equipment::try_from(model)?;
            equipment.insert(unit.id, unit);
        }

        let open_models = rental::Entity::find()
            .filter(rental::Column::EndedAt.is_null())
            .all(&self.database)
            .await?;
        for model in open_models {
            let mut assignment = RentalAssignment::try_from(model)?;
            let pause_models = pauses::Entity::find()
                .filter(pauses::Column::AssignmentId.eq(assignment.id.to_string()))
                .order_by_asc(pauses::Column::PausedAt)
                .all(&self.database)
                .await?;
            for pause_model in pause_models {
                assignment.pauses.push(PauseInterval::try_from(pause_model)?);
            }
            if let Some(unit) = equipment.get_mut(&assignment.equipment_id) {
                unit.open_assignment = Some(assignment);
            }
        }

        Ok(Engine {
            accounts,
            equipment,
            database: self.database,
        })
    }
}
