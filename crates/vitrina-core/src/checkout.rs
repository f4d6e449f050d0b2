//! # Checkout Rules
//!
//! How the money handed over at checkout turns into a recorded payment.
//!
//! ```text
//!   physical / online ── amount ≥ total ──► payment = total, change = amount − total
//!                        (card and transfer must match the total exactly)
//!
//!   layaway ──────────── 0 < deposit ≤ total ──► payment = deposit
//!                        deposit = total ──► completed at once
//! ```

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::layaway::validate_initial_deposit;
use crate::money::Money;
use crate::types::{PaymentMethod, SaleStatus, SaleType};

/// Outcome of the checkout payment rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CheckoutPayment {
    /// Amount stored as the sale's first payment.
    pub recorded: Money,
    /// Cash handed back to the customer.
    pub change: Money,
    pub status: SaleStatus,
}

/// Applies the payment rules of a sale type to the tendered amount.
pub fn checkout_payment(
    sale_type: SaleType,
    method: PaymentMethod,
    total: Money,
    tendered: Money,
) -> CoreResult<CheckoutPayment> {
    match sale_type {
        SaleType::Physical | SaleType::Online => {
            if tendered < total {
                return Err(CoreError::InvalidPaymentAmount {
                    reason: format!("{} does not cover the total {}", tendered, total),
                });
            }
            if method != PaymentMethod::Cash && tendered != total {
                return Err(CoreError::InvalidPaymentAmount {
                    reason: format!("{} payments must match the total {}", method, total),
                });
            }
            Ok(CheckoutPayment {
                recorded: total,
                change: tendered - total,
                status: SaleStatus::Completed,
            })
        }
        SaleType::Layaway => {
            validate_initial_deposit(total, tendered)?;
            let status = if tendered == total {
                SaleStatus::Completed
            } else {
                SaleStatus::Layaway
            };
            Ok(CheckoutPayment {
                recorded: tendered,
                change: Money::zero(),
                status,
            })
        }
    }
}

/// Formats a receipt number: `YYYYMMDD-NNNN`, the sequence restarting
/// every day at each store.
pub fn format_receipt_number(date: NaiveDate, sequence: u32) -> String {
    format!("{}-{:04}", date.format("%Y%m%d"), sequence)
}

/// Sequence part of a receipt number, if it has one.
pub fn receipt_sequence(receipt_number: &str) -> Option<u32> {
    receipt_number
        .rsplit_once('-')
        .and_then(|(_, seq)| seq.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(cents: i64) -> Money {
        Money::from_cents(cents)
    }

    #[test]
    fn test_cash_gives_change() {
        let p = checkout_payment(SaleType::Physical, PaymentMethod::Cash, m(1500), m(2000)).unwrap();
        assert_eq!(p.recorded, m(1500));
        assert_eq!(p.change, m(500));
        assert_eq!(p.status, SaleStatus::Completed);
    }

    #[test]
    fn test_card_must_match() {
        assert!(checkout_payment(SaleType::Physical, PaymentMethod::Card, m(1500), m(1500)).is_ok());
        assert!(matches!(
            checkout_payment(SaleType::Online, PaymentMethod::Card, m(1500), m(2000)),
            Err(CoreError::InvalidPaymentAmount { .. })
        ));
    }

    #[test]
    fn test_underpayment_rejected() {
        assert!(checkout_payment(SaleType::Physical, PaymentMethod::Cash, m(1500), m(1000)).is_err());
        assert!(checkout_payment(SaleType::Online, PaymentMethod::Transfer, m(1500), m(0)).is_err());
    }

    #[test]
    fn test_layaway_deposit() {
        let p = checkout_payment(SaleType::Layaway, PaymentMethod::Cash, m(3000), m(1000)).unwrap();
        assert_eq!(p.recorded, m(1000));
        assert_eq!(p.status, SaleStatus::Layaway);

        let full = checkout_payment(SaleType::Layaway, PaymentMethod::Card, m(3000), m(3000)).unwrap();
        assert_eq!(full.status, SaleStatus::Completed);

        assert!(checkout_payment(SaleType::Layaway, PaymentMethod::Cash, m(3000), m(0)).is_err());
        assert!(checkout_payment(SaleType::Layaway, PaymentMethod::Cash, m(3000), m(3001)).is_err());
    }

    #[test]
    fn test_receipt_numbers() {
        let date = NaiveDate::from_ymd_opt(2024, 5, 2).unwrap();
        assert_eq!(format_receipt_number(date, 7), "20240502-0007");
        assert_eq!(format_receipt_number(date, 12345), "20240502-12345");
        assert_eq!(receipt_sequence("20240502-0007"), Some(7));
        assert_eq!(receipt_sequence("garbage"), None);
    }
}
