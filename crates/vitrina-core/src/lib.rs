//! # vitrina-core: Pure Business Logic for Vitrina POS
//!
//! This crate holds every business rule of the point-of-sale backend as
//! pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Vitrina POS Architecture                         │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    Web client (any)                             │   │
//! │  │    Sales ──► Register ──► Inventory ──► Transfers ──► Reports  │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ JSON over HTTP                         │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    vitrina-server (axum)                        │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ vitrina-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   money • cart • register • stock • layaway • transfer         │   │
//! │  │   permissions • report • validation • password                 │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    vitrina-db (Database Layer)                  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain entities (Store, User, Product, Sale, Transfer, ...)
//! - [`money`] - Money type with integer arithmetic
//! - [`error`] - Domain error types
//! - [`validation`] - Field validation
//! - [`permissions`] - Permission sets, role templates, menu visibility
//! - [`cart`] - The running cart
//! - [`checkout`] - Checkout payment rules and receipt numbers
//! - [`stock`] - Stock movement rules
//! - [`register`] - Cash-register reconciliation
//! - [`layaway`] - Layaway (preventa) balance math
//! - [`transfer`] - Inter-store transfer rules
//! - [`report`] - Sales report aggregation
//! - [`password`] - Password hashing
//!
//! ## Example Usage
//!
//! ```rust
//! use vitrina_core::money::Money;
//! use vitrina_core::register::{PaymentTotals, Reconciliation};
//! use vitrina_core::PaymentMethod;
//!
//! let mut totals = PaymentTotals::default();
//! totals.add(PaymentMethod::Cash, Money::from_cents(12_000));
//! totals.add(PaymentMethod::Card, Money::from_cents(8_000));
//!
//! let opening = Money::from_cents(5_000);
//! let counted = Money::from_cents(16_500);
//! let rec = Reconciliation::compute(opening, &totals, counted);
//!
//! assert_eq!(rec.expected_cash.cents(), 17_000);
//! assert_eq!(rec.difference.cents(), -500);
//! ```

pub mod cart;
pub mod checkout;
pub mod error;
pub mod layaway;
pub mod money;
pub mod password;
pub mod permissions;
pub mod register;
pub mod report;
pub mod stock;
pub mod transfer;
pub mod types;
pub mod validation;

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use permissions::{Permission, PermissionSet, Section};
pub use types::*;

/// Maximum distinct lines allowed in a single cart.
pub const MAX_CART_ITEMS: usize = 100;

/// Maximum quantity of a single product on one line.
///
/// Guards against typing 1000 instead of 10 at the counter.
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Maximum product lines in a transfer or an incoming invoice.
pub const MAX_DOCUMENT_LINES: usize = 500;

/// Largest price, cost or payment accepted, in cents ($100,000,000.00).
///
/// With [`MAX_ITEM_QUANTITY`] and the line limits this keeps every
/// document total far inside `i64`.
pub const MAX_AMOUNT_CENTS: i64 = 10_000_000_000;

/// Generates a new entity identifier (UUID v4).
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
