//! # Stock Rules
//!
//! Per-store stock changes happen in three flows, each recording a movement:
//!
//! ```text
//!   sale ─────────────► Sale (−)            void / cancel ──► SaleReversal (+)
//!   invoice received ─► InvoiceReceipt (+)
//!   transfer created ─► TransferOut (−) at origin
//!        ├─ validated ─► TransferIn (+)  at destination
//!        └─ cancelled ─► TransferReturn (+) at origin
//!   manual count ─────► Adjustment (±)
//! ```

use std::collections::BTreeMap;

use crate::error::{CoreError, CoreResult};
use crate::types::{LineRequest, StockMovementKind};
use crate::validation::validate_quantity;

impl StockMovementKind {
    /// Signed delta for a positive `quantity` of this kind.
    ///
    /// Adjustments carry their own sign and are returned unchanged.
    pub fn signed(&self, quantity: i64) -> i64 {
        match self {
            StockMovementKind::Sale | StockMovementKind::TransferOut => -quantity,
            StockMovementKind::SaleReversal
            | StockMovementKind::InvoiceReceipt
            | StockMovementKind::TransferIn
            | StockMovementKind::TransferReturn => quantity,
            StockMovementKind::Adjustment => quantity,
        }
    }
}

/// Collapses duplicate product lines by summing quantities, keeping the
/// order in which products first appear.
pub fn merge_lines(lines: &[LineRequest]) -> Vec<LineRequest> {
    let mut order: Vec<String> = Vec::new();
    let mut totals: BTreeMap<String, i64> = BTreeMap::new();

    for line in lines {
        let entry = totals.entry(line.product_id.clone()).or_insert_with(|| {
            order.push(line.product_id.clone());
            0
        });
        *entry += line.quantity;
    }

    order
        .into_iter()
        .map(|product_id| {
            let quantity = totals.get(&product_id).copied().unwrap_or(0);
            LineRequest {
                product_id,
                quantity,
            }
        })
        .collect()
}

/// Merges and validates document lines (transfers, invoices).
pub fn normalize_lines(lines: &[LineRequest], max_lines: usize) -> CoreResult<Vec<LineRequest>> {
    let merged = merge_lines(lines);
    if merged.len() > max_lines {
        return Err(crate::ValidationError::OutOfRange {
            field: "lines".to_string(),
            min: 1,
            max: max_lines as i64,
        }
        .into());
    }
    for line in &merged {
        validate_quantity(line.quantity)?;
    }
    Ok(merged)
}

/// Fails with `InsufficientStock` when `requested` exceeds `available`.
pub fn ensure_available(code: &str, available: i64, requested: i64) -> CoreResult<()> {
    if requested > available {
        return Err(CoreError::InsufficientStock {
            code: code.to_string(),
            available,
            requested,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(p: &str, q: i64) -> LineRequest {
        LineRequest {
            product_id: p.to_string(),
            quantity: q,
        }
    }

    #[test]
    fn test_signed_directions() {
        assert_eq!(StockMovementKind::Sale.signed(3), -3);
        assert_eq!(StockMovementKind::TransferOut.signed(3), -3);
        assert_eq!(StockMovementKind::TransferIn.signed(3), 3);
        assert_eq!(StockMovementKind::Adjustment.signed(-2), -2);
    }

    #[test]
    fn test_reversals_are_neutral() {
        let pairs = [
            (StockMovementKind::Sale, StockMovementKind::SaleReversal),
            (StockMovementKind::TransferOut, StockMovementKind::TransferReturn),
            (StockMovementKind::TransferOut, StockMovementKind::TransferIn),
        ];
        for (out, back) in pairs {
            assert_eq!(out.signed(4) + back.signed(4), 0, "{out} / {back}");
        }
    }

    #[test]
    fn test_ensure_available() {
        assert!(ensure_available("A", 5, 5).is_ok());
        assert!(matches!(
            ensure_available("A", 5, 6),
            Err(CoreError::InsufficientStock { available: 5, requested: 6, .. })
        ));
    }

    #[test]
    fn test_merge_lines() {
        let merged = merge_lines(&[line("b", 1), line("a", 2), line("b", 3)]);
        assert_eq!(merged, vec![line("b", 4), line("a", 2)]);
    }

    #[test]
    fn test_normalize_lines_validates_merged_quantity() {
        assert!(normalize_lines(&[line("a", 1)], 10).is_ok());
        assert!(normalize_lines(&[line("a", 0)], 10).is_err());
        assert!(normalize_lines(&[line("a", 600), line("a", 600)], 10).is_err());
        assert!(normalize_lines(&[line("a", 1), line("b", 1)], 1).is_err());
    }
}
