//! # Layaway (preventa)
//!
//! A layaway reserves goods against a partial deposit. Further deposits
//! (abonos) are taken until the balance reaches zero, at which point the
//! sale is completed.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LayawayBalance {
    pub total: Money,
    pub paid: Money,
}

impl LayawayBalance {
    pub fn new(total: Money, paid: Money) -> Self {
        LayawayBalance { total, paid }
    }

    pub fn remaining(&self) -> Money {
        (self.total - self.paid).clamp_non_negative()
    }

    pub fn is_settled(&self) -> bool {
        self.remaining().is_zero()
    }

    /// Records a deposit. Returns the new balance.
    ///
    /// The amount must be positive and must not exceed what is still owed.
    pub fn apply_payment(&self, amount: Money) -> CoreResult<LayawayBalance> {
        if !amount.is_positive() {
            return Err(CoreError::InvalidPaymentAmount {
                reason: "deposit must be positive".to_string(),
            });
        }
        if self.is_settled() {
            return Err(CoreError::InvalidPaymentAmount {
                reason: "layaway is already paid".to_string(),
            });
        }
        if amount > self.remaining() {
            return Err(CoreError::InvalidPaymentAmount {
                reason: format!(
                    "deposit {} exceeds remaining balance {}",
                    amount,
                    self.remaining()
                ),
            });
        }
        Ok(LayawayBalance {
            total: self.total,
            paid: self.paid + amount,
        })
    }
}

/// Checks the first deposit of a new layaway: `0 < deposit <= total`.
pub fn validate_initial_deposit(total: Money, deposit: Money) -> CoreResult<()> {
    if !deposit.is_positive() {
        return Err(CoreError::InvalidPaymentAmount {
            reason: "layaway requires a positive deposit".to_string(),
        });
    }
    if deposit > total {
        return Err(CoreError::InvalidPaymentAmount {
            reason: format!("deposit {} exceeds sale total {}", deposit, total),
        });
    }
    Ok(())
}
