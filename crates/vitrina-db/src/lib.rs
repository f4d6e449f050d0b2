//! # vitrina-db: Database Layer for Vitrina POS
//!
//! SQLite storage for every store, product, sale and register session,
//! through sqlx with runtime-checked queries.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Vitrina POS Data Flow                            │
//! │                                                                         │
//! │  HTTP handler (POST /api/sales)                                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    vitrina-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌────────────────┐   ┌──────────────┐   │   │
//! │  │   │   Database    │    │  Repositories  │   │  Migrations  │   │   │
//! │  │   │   (pool.rs)   │◄───│ stores, users  │   │  (embedded)  │   │   │
//! │  │   │   SqlitePool  │    │ products, sales│   │ 001_initial  │   │   │
//! │  │   │               │    │ registers, ... │   │              │   │   │
//! │  │   └───────────────┘    └────────────────┘   └──────────────┘   │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite file (VITRINA_DATABASE_PATH)                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - One repository per aggregate
//! - [`bootstrap`] - Built-in roles and the first administrator
//!
//! ## Usage
//!
//! ```rust,ignore
//! use vitrina_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("vitrina.db")).await?;
//! let session = db.registers().open(&store_id, &user_id, 5_000, None).await?;
//! let products = db.products().search("camiseta", 20).await?;
//! ```

pub mod bootstrap;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

pub use bootstrap::{bootstrap, AdminSeed, Bootstrap};
pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use repository::{
    day_range, CheckoutReceipt, CheckoutRequest, InvoiceRepository, NewInvoice, NewProduct, NewUser,
    ProductRepository, ProductUpdate, RegisterRepository, ReportRepository, RoleRepository,
    SaleFilter, SaleRepository, StoreRepository, TransferDirection, TransferFilter,
    TransferRepository, UserRepository, UserUpdate,
};

/// Fixtures shared by the repository tests.
#[cfg(test)]
pub(crate) mod test_support {
    use crate::repository::{NewProduct, NewUser};
    use crate::Database;

    /// Creates an administrator-role user, optionally assigned to a store.
    /// Returns its id.
    pub async fn user_at(db: &Database, store_id: Option<&str>) -> String {
        let roles = db.roles().ensure_builtin().await.unwrap();
        let n = db.users().count().await.unwrap();
        db.users()
            .create(NewUser {
                username: format!("user{}", n + 1),
                password_hash: "not-a-real-hash".to_string(),
                display_name: "Test User".to_string(),
                role_id: roles[0].id.clone(),
                store_id: store_id.map(str::to_string),
                extra_permissions: Vec::new(),
            })
            .await
            .unwrap()
            .id
    }

    /// Creates a 1500-cent product with stock at the given stores.
    /// Returns its id.
    pub async fn product(db: &Database, code: &str, stock: &[(&str, i64)]) -> String {
        let stock: Vec<(String, i64)> = stock.iter().map(|(s, q)| (s.to_string(), *q)).collect();
        db.products()
            .create(
                NewProduct {
                    code: code.to_string(),
                    description: format!("Camiseta {}", code),
                    size: None,
                    color: None,
                    price_cents: 1500,
                    cost_cents: Some(700),
                },
                &stock,
                None,
            )
            .await
            .unwrap()
            .product
            .id
    }
}
