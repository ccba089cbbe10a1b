//! Balance projection.
//!
//! Balances are never ground truth: they are folds over ledger entries,
//! combined with the externally-supplied "earned" figure for payable
//! accounts. The same projection runs over the cached `ledger_net_minor`
//! (incremental path) and over a fresh fold of the `ledger_entries` table
//! (recompute path); the two must always agree.
//!
//! Sign conventions, fixed per account kind (the source application drifted
//! between two readings of "credit"; this module is the single place the
//! convention lives):
//!
//! - `Wallet` / `BankAccount`: balance = credits − debits (credit = money in).
//! - `Labourer` / `Contractor` / `Vendor`: pending = earned + credits − debits
//!   (wage, advance and deduction payments are debits against the pending).
//! - `Creditor`: balance = debits − credits. Credit records money borrowed
//!   from the creditor, debit records repayment, so a negative balance reads
//!   "amount still owed".

use crate::{Money, accounts::AccountKind};

/// Projects the user-facing balance for an account kind from its earned
/// figure and its ledger net (`credits − debits`).
pub fn projected(kind: &AccountKind, earned_minor: i64, ledger_net_minor: i64) -> Money {
    match kind {
        AccountKind::Wallet | AccountKind::BankAccount { .. } => Money::new(ledger_net_minor),
        AccountKind::Labourer { .. } | AccountKind::Contractor | AccountKind::Vendor => {
            Money::new(earned_minor + ledger_net_minor)
        }
        AccountKind::Creditor => Money::new(-ledger_net_minor),
    }
}
