//! # Domain Types
//!
//! Entities shared by the database layer and the HTTP API.
//!
//! ## Entity Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   Store ◄──── User ────► Role (permission set)                          │
//! │     │                                                                   │
//! │     ├──── StockLevel ◄──── Product                                      │
//! │     │         ▲                                                         │
//! │     │         └── StockMovement (sale, invoice, transfer, adjustment)   │
//! │     │                                                                   │
//! │     ├──── RegisterSession ◄──── Payment ────► Sale ────► SaleItem      │
//! │     │                                                                   │
//! │     ├──── Invoice ────► InvoiceItem                                     │
//! │     │                                                                   │
//! │     └──── Transfer (origin → destination) ────► TransferItem           │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Snapshot Pattern
//! Sale, invoice and transfer lines copy the product code and description
//! at the time the document is written, so history survives product edits.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::money::Money;
use crate::permissions::{Permission, PermissionSet};

/// Implements `as_str` and `Display` for a unit-variant status enum.
macro_rules! wire_names {
    ($ty:ty { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl $ty {
            /// The stored / wire name.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $name,)+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

// =============================================================================
// Store
// =============================================================================

/// A physical shop of the business.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Store {
    pub id: String,
    pub name: String,
    pub address: Option<String>,
    /// Disabled stores cannot sell, receive stock or take part in transfers.
    pub is_enabled: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Roles & Users
// =============================================================================

/// A named permission map.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Role {
    pub id: String,
    pub name: String,
    pub permissions: Vec<Permission>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Role {
    pub fn permission_set(&self) -> PermissionSet {
        self.permissions.iter().copied().collect()
    }
}

/// A person who can log in.
///
/// The password hash never leaves the database layer, so it is not part of
/// this type.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct User {
    pub id: String,
    pub username: String,
    pub display_name: String,
    pub role_id: String,
    /// Store the user works at. Administrators may have none.
    pub store_id: Option<String>,
    /// Flags granted on top of the role's permissions.
    pub extra_permissions: Vec<Permission>,
    pub is_enabled: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Role permissions plus the user's own flags.
    pub fn effective_permissions(&self, role: &Role) -> PermissionSet {
        let extra: PermissionSet = self.extra_permissions.iter().copied().collect();
        role.permission_set().union(&extra)
    }
}

// =============================================================================
// Products & Stock
// =============================================================================

/// A sellable article. Stock lives per store in [`StockLevel`].
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    pub id: String,
    /// Business code printed on the label.
    pub code: String,
    pub description: String,
    pub size: Option<String>,
    pub color: Option<String>,
    pub price_cents: i64,
    /// Purchase cost, used for inventory valuation.
    pub cost_cents: Option<i64>,
    /// Soft-delete flag.
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }
}

/// Quantity of one product at one store.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct StockLevel {
    pub product_id: String,
    pub store_id: String,
    pub store_name: String,
    pub quantity: i64,
}

/// A product with its per-store stock mapping.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProductWithStock {
    pub product: Product,
    pub stock: Vec<StockLevel>,
}

impl ProductWithStock {
    /// Stock at one store (zero when the store has no row).
    pub fn quantity_at(&self, store_id: &str) -> i64 {
        self.stock
            .iter()
            .find(|s| s.store_id == store_id)
            .map(|s| s.quantity)
            .unwrap_or(0)
    }

    pub fn total_quantity(&self) -> i64 {
        self.stock.iter().map(|s| s.quantity).sum()
    }
}

/// Why stock changed. See [`crate::stock`] for the sign of each kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum StockMovementKind {
    Sale,
    SaleReversal,
    InvoiceReceipt,
    TransferOut,
    TransferIn,
    TransferReturn,
    Adjustment,
}

wire_names!(StockMovementKind {
    Sale => "sale",
    SaleReversal => "sale_reversal",
    InvoiceReceipt => "invoice_receipt",
    TransferOut => "transfer_out",
    TransferIn => "transfer_in",
    TransferReturn => "transfer_return",
    Adjustment => "adjustment",
});

/// One entry of the stock ledger.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct StockMovement {
    pub id: String,
    pub product_id: String,
    pub store_id: String,
    pub kind: StockMovementKind,
    /// Signed change applied to the store's quantity.
    pub quantity_delta: i64,
    /// Sale, invoice or transfer that caused the movement.
    pub reference_id: Option<String>,
    pub user_id: Option<String>,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Invoices (incoming stock)
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    /// Recorded, stock not yet applied.
    Pending,
    /// Stock added to the store.
    Received,
    Cancelled,
}

wire_names!(InvoiceStatus {
    Pending => "pending",
    Received => "received",
    Cancelled => "cancelled",
});

/// A supplier invoice for goods delivered to a store.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Invoice {
    pub id: String,
    pub number: String,
    pub supplier: String,
    #[ts(as = "String")]
    pub invoice_date: NaiveDate,
    pub store_id: String,
    pub status: InvoiceStatus,
    pub total_cents: i64,
    pub notes: Option<String>,
    pub created_by: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub received_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct InvoiceItem {
    pub id: String,
    pub invoice_id: String,
    pub product_id: String,
    pub code_snapshot: String,
    pub description_snapshot: String,
    pub quantity: i64,
    pub unit_cost_cents: i64,
    pub line_total_cents: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct InvoiceDetail {
    pub invoice: Invoice,
    pub items: Vec<InvoiceItem>,
}

// =============================================================================
// Sales & Payments
// =============================================================================

/// Where and how a sale happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum SaleType {
    /// At the counter, paid in full, through the register.
    Physical,
    /// Remote order, paid in full, no register involved.
    Online,
    /// Preventa: goods reserved against a partial deposit.
    Layaway,
}

wire_names!(SaleType {
    Physical => "physical",
    Online => "online",
    Layaway => "layaway",
});

impl SaleType {
    /// Whether taking money for this sale type goes through a register.
    pub fn requires_register(&self) -> bool {
        matches!(self, SaleType::Physical | SaleType::Layaway)
    }

    /// Permission needed to ring up this sale type.
    pub fn required_permission(&self) -> Permission {
        match self {
            SaleType::Physical => Permission::Sell,
            SaleType::Online => Permission::SellOnline,
            SaleType::Layaway => Permission::SellLayaway,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    /// Fully paid.
    Completed,
    /// Layaway with an outstanding balance.
    Layaway,
    /// Completed sale reversed; stock returned.
    Voided,
    /// Layaway abandoned; stock returned.
    Cancelled,
}

wire_names!(SaleStatus {
    Completed => "completed",
    Layaway => "layaway",
    Voided => "voided",
    Cancelled => "cancelled",
});

impl SaleStatus {
    /// Voided and cancelled sales do not count towards totals.
    pub fn counts_towards_totals(&self) -> bool {
        matches!(self, SaleStatus::Completed | SaleStatus::Layaway)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    Transfer,
}

wire_names!(PaymentMethod {
    Cash => "cash",
    Card => "card",
    Transfer => "transfer",
});

/// A sale header. Lines are [`SaleItem`], money received is [`Payment`].
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Sale {
    pub id: String,
    /// Human-readable number, unique per store: `YYYYMMDD-NNNN`.
    pub receipt_number: String,
    pub store_id: String,
    /// Employee who rang up the sale.
    pub user_id: String,
    pub customer_name: Option<String>,
    pub sale_type: SaleType,
    pub status: SaleStatus,
    /// Method of the first payment.
    pub payment_method: PaymentMethod,
    pub total_cents: i64,
    pub paid_cents: i64,
    /// Register session that took the first payment (in-store sales).
    pub register_session_id: Option<String>,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Sale {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    /// Amount still owed (only non-zero for layaways).
    pub fn balance(&self) -> Money {
        Money::from_cents(self.total_cents - self.paid_cents).clamp_non_negative()
    }
}

/// A sale line, frozen at checkout.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SaleItem {
    pub id: String,
    pub sale_id: String,
    pub product_id: String,
    pub code_snapshot: String,
    pub description_snapshot: String,
    pub unit_price_cents: i64,
    pub quantity: i64,
    pub line_total_cents: i64,
}

/// Money received for a sale.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Payment {
    pub id: String,
    pub sale_id: String,
    /// Register session the money went into; `None` for online sales.
    pub register_session_id: Option<String>,
    pub method: PaymentMethod,
    pub amount_cents: i64,
    pub user_id: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Payment {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleDetail {
    pub sale: Sale,
    pub items: Vec<SaleItem>,
    pub payments: Vec<Payment>,
}

// =============================================================================
// Register Sessions
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum RegisterStatus {
    Open,
    Closed,
}

wire_names!(RegisterStatus {
    Open => "open",
    Closed => "closed",
});

/// One apertura/cierre cycle of a store's register.
///
/// Totals, expected cash and difference are written when the session is
/// closed; while open they are zero / `None`.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct RegisterSession {
    pub id: String,
    pub store_id: String,
    pub status: RegisterStatus,
    pub opened_by: String,
    #[ts(as = "String")]
    pub opened_at: DateTime<Utc>,
    pub opening_cents: i64,
    pub closed_by: Option<String>,
    #[ts(as = "Option<String>")]
    pub closed_at: Option<DateTime<Utc>>,
    pub counted_cash_cents: Option<i64>,
    pub cash_total_cents: i64,
    pub card_total_cents: i64,
    pub transfer_total_cents: i64,
    pub sales_count: i64,
    pub sales_total_cents: i64,
    pub expected_cash_cents: Option<i64>,
    pub difference_cents: Option<i64>,
    pub notes: Option<String>,
}

impl RegisterSession {
    pub fn is_open(&self) -> bool {
        self.status == RegisterStatus::Open
    }
}

// =============================================================================
// Transfers
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    /// Stock left the origin, not yet accepted at the destination.
    Pending,
    /// Destination received the goods.
    Validated,
    /// Abandoned; stock returned to the origin.
    Cancelled,
}

wire_names!(TransferStatus {
    Pending => "pending",
    Validated => "validated",
    Cancelled => "cancelled",
});

/// A traslado between two stores.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Transfer {
    pub id: String,
    pub origin_store_id: String,
    pub destination_store_id: String,
    pub status: TransferStatus,
    pub requested_by: String,
    #[ts(as = "String")]
    pub requested_at: DateTime<Utc>,
    pub validated_by: Option<String>,
    #[ts(as = "Option<String>")]
    pub validated_at: Option<DateTime<Utc>>,
    pub cancelled_by: Option<String>,
    #[ts(as = "Option<String>")]
    pub cancelled_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct TransferItem {
    pub id: String,
    pub transfer_id: String,
    pub product_id: String,
    pub code_snapshot: String,
    pub description_snapshot: String,
    pub quantity: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TransferDetail {
    pub transfer: Transfer,
    pub items: Vec<TransferItem>,
}

// =============================================================================
// Document Lines
// =============================================================================

/// A requested `(product, quantity)` pair on a transfer or invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LineRequest {
    pub product_id: String,
    pub quantity: i64,
}

/// A supplier invoice line as submitted: lines keep their own unit cost, so
/// they are not merged by product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct InvoiceLineRequest {
    pub product_id: String,
    pub quantity: i64,
    pub unit_cost_cents: i64,
}

// =============================================================================
// Unit Tests
// =============================================================================
