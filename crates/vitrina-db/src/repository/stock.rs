//! # Stock Ledger
//!
//! Every stock change goes through [`move_stock`], inside the caller's
//! transaction, so the per-store quantity and its movement row are written
//! together.
//!
//! ```text
//!   delta < 0:  UPDATE stock_levels SET quantity = quantity + delta
//!               WHERE ... AND quantity >= -delta      (0 rows → InsufficientStock)
//!   delta > 0:  INSERT ... ON CONFLICT DO UPDATE SET quantity = quantity + delta
//!   always:     INSERT INTO stock_movements
//! ```
//!
//! Transactions that change stock or documents start with
//! [`begin_write`]. A deferred transaction that reads first cannot upgrade
//! to a writer once another connection has committed, and SQLite answers
//! `SQLITE_BUSY` at once instead of waiting on the busy timeout.

use chrono::Utc;
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use tracing::debug;

use crate::error::{DbError, DbResult};
use vitrina_core::stock::ensure_available;
use vitrina_core::{new_id, CoreError, Product, StockMovementKind, Store};

/// Opens a transaction holding the write lock from its first statement.
pub(crate) async fn begin_write(pool: &SqlitePool) -> DbResult<Transaction<'static, Sqlite>> {
    Ok(pool.begin_with("BEGIN IMMEDIATE").await?)
}

/// One stock change to apply.
#[derive(Debug, Clone)]
pub struct StockChange<'a> {
    pub product_id: &'a str,
    pub store_id: &'a str,
    pub kind: StockMovementKind,
    /// Positive quantity; the direction comes from `kind`, except for
    /// adjustments which carry their own sign.
    pub quantity: i64,
    pub reference_id: Option<&'a str>,
    pub user_id: Option<&'a str>,
    pub notes: Option<&'a str>,
}

/// Applies a stock change and records the movement. Returns the new quantity.
pub(crate) async fn move_stock(conn: &mut SqliteConnection, change: &StockChange<'_>) -> DbResult<i64> {
    let delta = change.kind.signed(change.quantity);
    let now = Utc::now();

    debug!(
        product_id = %change.product_id,
        store_id = %change.store_id,
        kind = %change.kind,
        delta,
        "Moving stock"
    );

    if delta < 0 {
        let result = sqlx::query(
            r#"
            UPDATE stock_levels
            SET quantity = quantity + ?1, updated_at = ?2
            WHERE product_id = ?3 AND store_id = ?4 AND quantity >= ?5
            "#,
        )
        .bind(delta)
        .bind(now)
        .bind(change.product_id)
        .bind(change.store_id)
        .bind(-delta)
        .execute(&mut *conn)
        .await?;

        // Zero rows means the row is missing or short; the write lock
        // keeps the count stable between the update and this read.
        if result.rows_affected() == 0 {
            let available = quantity_at(conn, change.product_id, change.store_id).await?;
            let product = fetch_product(conn, change.product_id).await?;
            ensure_available(&product.code, available, -delta)?;
        }
    } else if delta > 0 {
        sqlx::query(
            r#"
            INSERT INTO stock_levels (product_id, store_id, quantity, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT (product_id, store_id)
            DO UPDATE SET quantity = quantity + excluded.quantity, updated_at = excluded.updated_at
            "#,
        )
        .bind(change.product_id)
        .bind(change.store_id)
        .bind(delta)
        .bind(now)
        .execute(&mut *conn)
        .await?;
    }

    sqlx::query(
        r#"
        INSERT INTO stock_movements (
            id, product_id, store_id, kind, quantity_delta,
            reference_id, user_id, notes, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
    )
    .bind(new_id())
    .bind(change.product_id)
    .bind(change.store_id)
    .bind(change.kind)
    .bind(delta)
    .bind(change.reference_id)
    .bind(change.user_id)
    .bind(change.notes)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    quantity_at(conn, change.product_id, change.store_id).await
}

/// Current quantity of a product at a store (zero without a row).
pub(crate) async fn quantity_at(
    conn: &mut SqliteConnection,
    product_id: &str,
    store_id: &str,
) -> DbResult<i64> {
    let quantity: Option<i64> = sqlx::query_scalar(
        "SELECT quantity FROM stock_levels WHERE product_id = ?1 AND store_id = ?2",
    )
    .bind(product_id)
    .bind(store_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(quantity.unwrap_or(0))
}

/// Loads a product inside a transaction.
pub(crate) async fn fetch_product(conn: &mut SqliteConnection, product_id: &str) -> DbResult<Product> {
    sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = ?1")
        .bind(product_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("Product", product_id))
}

/// Loads a store and fails when it is disabled.
pub(crate) async fn enabled_store(conn: &mut SqliteConnection, store_id: &str) -> DbResult<Store> {
    let store = sqlx::query_as::<_, Store>("SELECT * FROM stores WHERE id = ?1")
        .bind(store_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("Store", store_id))?;

    if !store.is_enabled {
        return Err(CoreError::StoreDisabled(store.name).into());
    }
    Ok(store)
}
