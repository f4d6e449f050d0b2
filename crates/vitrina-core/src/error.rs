//! # Error Types
//!
//! Domain-specific error types for vitrina-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  vitrina-core errors (this file)                                       │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  vitrina-db errors (separate crate)                                    │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  vitrina-server errors                                                 │
//! │  └── ApiError         - What the client sees (JSON + HTTP status)      │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → ApiError → Client       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use crate::permissions::Permission;

// =============================================================================
// Core Error
// =============================================================================

/// Business rule violations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// An entity referenced by the operation does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Not enough stock at a store to complete a sale or transfer.
    ///
    /// ## User Workflow
    /// ```text
    /// Checkout (qty: 5)
    ///      │
    ///      ▼
    /// Check stock at store: available=3
    ///      │
    ///      ▼
    /// InsufficientStock { code: "TSHIRT-M", available: 3, requested: 5 }
    /// ```
    #[error("Insufficient stock for {code}: available {available}, requested {requested}")]
    InsufficientStock {
        code: String,
        available: i64,
        requested: i64,
    },

    /// The document is not in a status that allows the operation.
    #[error("{entity} {id} is {status}, cannot {action}")]
    InvalidStatus {
        entity: String,
        id: String,
        status: String,
        action: String,
    },

    /// In-store operations need an open register session at the store.
    #[error("No open register at store {store_id}")]
    RegisterNotOpen { store_id: String },

    /// Only one register session may be open per store.
    #[error("Store {store_id} already has an open register session ({session_id})")]
    RegisterAlreadyOpen { store_id: String, session_id: String },

    /// The user lacks a permission.
    #[error("Permission denied: {0} is required")]
    PermissionDenied(Permission),

    /// The user tried to act on a store other than their own.
    #[error("Access to store {store_id} is not allowed")]
    StoreAccessDenied { store_id: String },

    /// The store is disabled.
    #[error("Store {0} is disabled")]
    StoreDisabled(String),

    /// Cart has exceeded maximum allowed lines.
    #[error("Cart cannot have more than {max} items")]
    CartTooLarge { max: usize },

    /// Line quantity exceeds maximum allowed.
    #[error("Quantity {requested} exceeds maximum allowed ({max})")]
    QuantityTooLarge { requested: i64, max: i64 },

    /// Product is not in the cart.
    #[error("Product {0} is not in the cart")]
    NotInCart(String),

    /// Checkout was attempted with an empty cart.
    #[error("Cart is empty")]
    EmptyCart,

    /// Payment amount does not fit the sale.
    #[error("Invalid payment amount: {reason}")]
    InvalidPaymentAmount { reason: String },

    /// A completed sale can no longer be voided.
    #[error("Sale {sale_id} cannot be voided: {reason}")]
    VoidNotAllowed { sale_id: String, reason: String },

    /// A role cannot be deleted while users hold it.
    #[error("Role {role_id} is assigned to {users} user(s)")]
    RoleInUse { role_id: String, users: i64 },

    /// Transfer request breaks a transfer rule.
    #[error("Invalid transfer: {reason}")]
    InvalidTransfer { reason: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Creates a NotFound error for an entity type and id.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates an InvalidStatus error.
    pub fn invalid_status(
        entity: impl Into<String>,
        id: impl Into<String>,
        status: impl std::fmt::Display,
        action: impl Into<String>,
    ) -> Self {
        CoreError::InvalidStatus {
            entity: entity.into(),
            id: id.into(),
            status: status.to_string(),
            action: action.into(),
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These occur when user input doesn't meet requirements, before any
/// business rule runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too short.
    #[error("{field} must be at least {min} characters")]
    TooShort { field: String, min: usize },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Invalid format (e.g., invalid UUID, invalid characters).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
