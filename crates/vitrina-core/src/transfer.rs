//! # Transfer Rules (traslados)
//!
//! ```text
//!            create (origin −qty)
//!   ─────────────────────────────► Pending
//!                                    │
//!        validate (destination +qty) │ cancel (origin +qty)
//!                 ┌──────────────────┴──────────────────┐
//!                 ▼                                     ▼
//!             Validated                             Cancelled
//! ```

use crate::error::{CoreError, CoreResult};
use crate::stock::normalize_lines;
use crate::types::{LineRequest, TransferStatus};
use crate::MAX_DOCUMENT_LINES;

impl TransferStatus {
    /// Only pending transfers can be validated.
    pub fn ensure_can_validate(&self, transfer_id: &str) -> CoreResult<()> {
        self.ensure_pending(transfer_id, "validate")
    }

    /// Only pending transfers can be cancelled.
    pub fn ensure_can_cancel(&self, transfer_id: &str) -> CoreResult<()> {
        self.ensure_pending(transfer_id, "cancel")
    }

    fn ensure_pending(&self, transfer_id: &str, action: &str) -> CoreResult<()> {
        if *self == TransferStatus::Pending {
            Ok(())
        } else {
            Err(CoreError::invalid_status("Transfer", transfer_id, self, action))
        }
    }
}

/// Checks a transfer request and returns its merged lines.
pub fn validate_transfer_request(
    origin_store_id: &str,
    destination_store_id: &str,
    lines: &[LineRequest],
) -> CoreResult<Vec<LineRequest>> {
    if origin_store_id == destination_store_id {
        return Err(CoreError::InvalidTransfer {
            reason: "origin and destination must be different stores".to_string(),
        });
    }
    if lines.is_empty() {
        return Err(CoreError::InvalidTransfer {
            reason: "a transfer needs at least one product line".to_string(),
        });
    }
    normalize_lines(lines, MAX_DOCUMENT_LINES)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(q: i64) -> LineRequest {
        LineRequest {
            product_id: "p1".into(),
            quantity: q,
        }
    }

    #[test]
    fn test_only_pending_moves() {
        assert!(TransferStatus::Pending.ensure_can_validate("t").is_ok());
        assert!(TransferStatus::Pending.ensure_can_cancel("t").is_ok());

        let err = TransferStatus::Validated.ensure_can_cancel("t").unwrap_err();
        assert_eq!(err.to_string(), "Transfer t is validated, cannot cancel");
        assert!(TransferStatus::Cancelled.ensure_can_validate("t").is_err());
    }

    #[test]
    fn test_request_rules() {
        assert!(validate_transfer_request("a", "b", &[line(2)]).is_ok());
        assert!(matches!(
            validate_transfer_request("a", "a", &[line(2)]),
            Err(CoreError::InvalidTransfer { .. })
        ));
        assert!(validate_transfer_request("a", "b", &[]).is_err());
        assert!(validate_transfer_request("a", "b", &[line(0)]).is_err());
    }

    #[test]
    fn test_request_merges_lines() {
        let lines = validate_transfer_request("a", "b", &[line(2), line(3)]).unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].quantity, 5);
    }
}
