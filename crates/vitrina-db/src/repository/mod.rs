//! # Repository Module
//!
//! One repository per aggregate. Each holds a pool handle and is created
//! on demand through [`crate::Database`].
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Handler                                                                │
//! │     │  db.transfers().validate(id, user)                                │
//! │     ▼                                                                   │
//! │  TransferRepository ──► BEGIN                                           │
//! │                         ├── status check (vitrina-core)                 │
//! │                         ├── stock::move_stock (+ movement row) × lines  │
//! │                         └── UPDATE transfers                            │
//! │                         COMMIT (or ROLLBACK on any error)               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`StoreRepository`] - Stores and their enabled flag
//! - [`RoleRepository`] - Roles and permission sets
//! - [`UserRepository`] - Users and credentials
//! - [`ProductRepository`] - Products, per-store stock, adjustments
//! - [`InvoiceRepository`] - Incoming stock
//! - [`SaleRepository`] - Checkout, layaway payments, voids
//! - [`RegisterRepository`] - Register open / close
//! - [`TransferRepository`] - Inter-store transfers
//! - [`ReportRepository`] - Sales and inventory reports

pub mod invoice;
pub mod product;
pub mod register;
pub mod report;
pub mod role;
pub mod sale;
pub mod stock;
pub mod store;
pub mod transfer;
pub mod user;

pub use invoice::{InvoiceRepository, NewInvoice};
pub use product::{NewProduct, ProductRepository, ProductUpdate};
pub use register::RegisterRepository;
pub use report::{day_range, ReportRepository};
pub use role::RoleRepository;
pub use sale::{CheckoutReceipt, CheckoutRequest, SaleFilter, SaleRepository};
pub use store::StoreRepository;
pub use transfer::{TransferDirection, TransferFilter, TransferRepository};
pub use user::{NewUser, UserRepository, UserUpdate};
