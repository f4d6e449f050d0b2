//! # Register Reconciliation
//!
//! Arithmetic behind closing a register session (cierre de caja).
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  opening float ─────────┐                                               │
//! │                         ├──► expected cash ──┐                          │
//! │  Σ cash payments ───────┘                    ├──► difference            │
//! │  counted cash ───────────────────────────────┘   (counted − expected)   │
//! │                                                                         │
//! │  card / transfer payments are reported but never counted in the drawer │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::types::{Payment, PaymentMethod, RegisterSession, Sale};

/// Payment sums of a session, per method.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PaymentTotals {
    pub cash: Money,
    pub card: Money,
    pub transfer: Money,
}

impl PaymentTotals {
    pub fn add(&mut self, method: PaymentMethod, amount: Money) {
        match method {
            PaymentMethod::Cash => self.cash += amount,
            PaymentMethod::Card => self.card += amount,
            PaymentMethod::Transfer => self.transfer += amount,
        }
    }

    pub fn get(&self, method: PaymentMethod) -> Money {
        match method {
            PaymentMethod::Cash => self.cash,
            PaymentMethod::Card => self.card,
            PaymentMethod::Transfer => self.transfer,
        }
    }

    pub fn total(&self) -> Money {
        self.cash + self.card + self.transfer
    }

    pub fn from_payments<'a>(payments: impl IntoIterator<Item = &'a Payment>) -> Self {
        let mut totals = PaymentTotals::default();
        for p in payments {
            totals.add(p.method, p.amount());
        }
        totals
    }
}

/// Result of reconciling a register session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Reconciliation {
    pub opening: Money,
    pub totals: PaymentTotals,
    pub expected_cash: Money,
    pub counted_cash: Money,
    /// Counted minus expected. Negative means the drawer is short.
    pub difference: Money,
}

impl Reconciliation {
    pub fn compute(opening: Money, totals: &PaymentTotals, counted: Money) -> Self {
        let expected_cash = opening + totals.cash;
        Reconciliation {
            opening,
            totals: *totals,
            expected_cash,
            counted_cash: counted,
            difference: counted - expected_cash,
        }
    }

    pub fn is_balanced(&self) -> bool {
        self.difference.is_zero()
    }

    pub fn is_short(&self) -> bool {
        self.difference.is_negative()
    }

    pub fn is_over(&self) -> bool {
        self.difference.is_positive()
    }
}

/// What the closing screen shows for a session.
///
/// For an open session `totals` are the live running totals and
/// `reconciliation` is `None`.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RegisterReport {
    pub session: RegisterSession,
    pub totals: PaymentTotals,
    pub reconciliation: Option<Reconciliation>,
    /// Sales that took money through this session.
    pub sales: Vec<Sale>,
}

impl RegisterReport {
    /// Rebuilds the reconciliation from a closed session's stored columns.
    pub fn stored_reconciliation(session: &RegisterSession) -> Option<Reconciliation> {
        let counted = session.counted_cash_cents?;
        let totals = PaymentTotals {
            cash: Money::from_cents(session.cash_total_cents),
            card: Money::from_cents(session.card_total_cents),
            transfer: Money::from_cents(session.transfer_total_cents),
        };
        Some(Reconciliation::compute(
            Money::from_cents(session.opening_cents),
            &totals,
            Money::from_cents(counted),
        ))
    }
}
