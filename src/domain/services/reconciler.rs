//! Balance & Settlement Reconciler
//!
//! Derives the displayed account balance and profit/loss statistics from
//! one snapshot of a user's transactions, orders and loan request. Pure
//! read-aggregation: nothing here mutates a record, and callers are
//! expected to hand in rows fetched within a single read transaction so
//! the statement reflects one consistent point in time.

use serde::{Deserialize, Serialize};

use crate::domain::entities::loan::LoanStatus;
use crate::domain::entities::order::TradeStatus;
use crate::domain::entities::transaction::{balance_eligible, TransactionKind};
use crate::persistence::models::{LoanRecord, OrderRecord, TransactionRecord};

/// Derived account statistics for one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountStatement {
    /// Sum of verified, completed deposits.
    pub total_deposits: f64,
    /// Sum of completed withdrawals.
    pub total_withdrawals: f64,
    /// Deposits minus withdrawals, before any loan.
    pub base_account_balance: f64,
    /// Amount of the currently approved loan, 0 if none.
    pub approved_loan_amount: f64,
    /// Displayed balance: base balance plus approved loan. May be negative.
    pub account_balance: f64,
    /// Realized profit/loss over closed positions.
    pub closed_positions_profit_loss: f64,
    /// Unrealized profit/loss over open positions (0 when unpopulated).
    pub open_positions_profit_loss: f64,
    /// Realized plus unrealized.
    pub total_profit_loss: f64,
}

/// Compute the account statement from a consistent snapshot.
///
/// Records that fail their eligibility predicate contribute nothing:
/// pending or unverified deposits, pending or failed withdrawals, and
/// null profit/loss fields all coalesce to zero. Insertion order of the
/// input slices is irrelevant.
pub fn reconcile(
    transactions: &[TransactionRecord],
    orders: &[OrderRecord],
    loan: Option<&LoanRecord>,
) -> AccountStatement {
    let mut total_deposits = 0.0;
    let mut total_withdrawals = 0.0;

    for tx in transactions {
        if !balance_eligible(&tx.kind, &tx.status, tx.verified) {
            continue;
        }
        match TransactionKind::parse(&tx.kind) {
            Some(TransactionKind::Deposit) => total_deposits += tx.amount,
            Some(TransactionKind::Withdraw) => total_withdrawals += tx.amount,
            None => {}
        }
    }

    let mut closed_pl = 0.0;
    let mut open_pl = 0.0;
    for order in orders {
        match TradeStatus::parse(&order.status) {
            Some(TradeStatus::Closed) => closed_pl += order.profit_loss.unwrap_or(0.0),
            Some(TradeStatus::Open) => open_pl += order.profit_loss.unwrap_or(0.0),
            // Pending sells are still open economically, but their
            // profit/loss is not final until settlement
            _ => {}
        }
    }

    // Derived live from current status: a later rejection removes the
    // loan's contribution on the next computation
    let approved_loan_amount = loan
        .filter(|l| LoanStatus::parse(&l.status) == Some(LoanStatus::Approved))
        .map(|l| l.amount)
        .unwrap_or(0.0);

    let base_account_balance = total_deposits - total_withdrawals;

    AccountStatement {
        total_deposits,
        total_withdrawals,
        base_account_balance,
        approved_loan_amount,
        account_balance: base_account_balance + approved_loan_amount,
        closed_positions_profit_loss: closed_pl,
        open_positions_profit_loss: open_pl,
        total_profit_loss: closed_pl + open_pl,
    }
}
