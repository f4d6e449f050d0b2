//! # Product Repository
//!
//! Products, their per-store stock and the stock movement history.
//!
//! ## Stock Mapping
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  products                      stock_levels                             │
//! │  ┌──────────┬─────────┐       ┌──────────┬──────────┬──────────┐       │
//! │  │ id       │ code    │       │ product  │ store    │ quantity │       │
//! │  ├──────────┼─────────┤       ├──────────┼──────────┼──────────┤       │
//! │  │ p1       │ TEE-M   │ ────► │ p1       │ Centro   │ 4        │       │
//! │  │          │         │ ────► │ p1       │ Norte    │ 6        │       │
//! │  └──────────┴─────────┘       └──────────┴──────────┴──────────┘       │
//! │                                                                         │
//! │  A missing (product, store) row means zero.                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info};

use super::stock::{begin_write, move_stock, StockChange};
use crate::error::{DbError, DbResult};
use vitrina_core::report::InventoryLine;
use vitrina_core::validation::{
    validate_description, validate_price_cents, validate_product_code, validate_search_query,
};
use vitrina_core::{
    new_id, Product, ProductWithStock, StockLevel, StockMovement, StockMovementKind,
    ValidationError,
};

/// Input for [`ProductRepository::create`].
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub code: String,
    pub description: String,
    pub size: Option<String>,
    pub color: Option<String>,
    pub price_cents: i64,
    pub cost_cents: Option<i64>,
}

/// Partial update; `None` keeps the current value.
#[derive(Debug, Clone, Default)]
pub struct ProductUpdate {
    pub description: Option<String>,
    pub size: Option<Option<String>>,
    pub color: Option<Option<String>>,
    pub price_cents: Option<i64>,
    pub cost_cents: Option<Option<i64>>,
    pub is_active: Option<bool>,
}

fn clean(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

const INVENTORY_SELECT: &str = r#"
    SELECT
        p.id AS product_id, p.code, p.description, p.size, p.color,
        s.id AS store_id, s.name AS store_name,
        sl.quantity, p.price_cents, p.cost_cents
    FROM stock_levels sl
    JOIN products p ON p.id = sl.product_id
    JOIN stores s ON s.id = sl.store_id
"#;

#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Creates a product, optionally with initial stock at some stores.
    ///
    /// Initial stock is recorded as `adjustment` movements in the same
    /// transaction as the product row.
    pub async fn create(
        &self,
        new: NewProduct,
        initial_stock: &[(String, i64)],
        user_id: Option<&str>,
    ) -> DbResult<ProductWithStock> {
        validate_product_code(&new.code)?;
        validate_description(&new.description)?;
        validate_price_cents(new.price_cents)?;
        if let Some(cost) = new.cost_cents {
            validate_price_cents(cost)?;
        }
        for (_, quantity) in initial_stock {
            if *quantity < 0 {
                return Err(ValidationError::MustNotBeNegative {
                    field: "initial stock".to_string(),
                }
                .into());
            }
        }

        let now = Utc::now();
        let product = Product {
            id: new_id(),
            code: new.code.trim().to_string(),
            description: new.description.trim().to_string(),
            size: clean(new.size),
            color: clean(new.color),
            price_cents: new.price_cents,
            cost_cents: new.cost_cents,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        debug!(id = %product.id, code = %product.code, "Creating product");

        let mut tx = begin_write(&self.pool).await?;

        sqlx::query(
            r#"
            INSERT INTO products (
                id, code, description, size, color,
                price_cents, cost_cents, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&product.id)
        .bind(&product.code)
        .bind(&product.description)
        .bind(&product.size)
        .bind(&product.color)
        .bind(product.price_cents)
        .bind(product.cost_cents)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| DbError::from(e).with_duplicate_value("code", &product.code))?;

        for (store_id, quantity) in initial_stock.iter().filter(|(_, q)| *q > 0) {
            move_stock(
                &mut tx,
                &StockChange {
                    product_id: &product.id,
                    store_id,
                    kind: StockMovementKind::Adjustment,
                    quantity: *quantity,
                    reference_id: None,
                    user_id,
                    notes: Some("initial stock"),
                },
            )
            .await?;
        }

        tx.commit().await?;

        info!(id = %product.id, code = %product.code, "Product created");
        self.get_with_stock(&product.id).await
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(product)
    }

    pub async fn require(&self, id: &str) -> DbResult<Product> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", id))
    }

    pub async fn get_by_code(&self, code: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE code = ?1")
            .bind(code.trim())
            .fetch_optional(&self.pool)
            .await?;
        Ok(product)
    }

    /// A product with its stock at every store that has a row.
    pub async fn get_with_stock(&self, id: &str) -> DbResult<ProductWithStock> {
        let product = self.require(id).await?;
        let stock = self.stock_levels(id).await?;
        Ok(ProductWithStock { product, stock })
    }

    pub async fn stock_levels(&self, product_id: &str) -> DbResult<Vec<StockLevel>> {
        let levels = sqlx::query_as::<_, StockLevel>(
            r#"
            SELECT sl.product_id, sl.store_id, s.name AS store_name, sl.quantity
            FROM stock_levels sl
            JOIN stores s ON s.id = sl.store_id
            WHERE sl.product_id = ?1
            ORDER BY s.name
            "#,
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(levels)
    }

    /// Searches active products by code or description.
    ///
    /// An empty query lists products by code.
    pub async fn search(&self, query: &str, limit: u32) -> DbResult<Vec<Product>> {
        let query = validate_search_query(query)?;
        let pattern = format!("%{}%", query);

        debug!(query = %query, limit, "Searching products");

        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT * FROM products
            WHERE is_active = 1
              AND (code LIKE ?1 OR description LIKE ?1)
            ORDER BY
                CASE WHEN code = ?2 THEN 0 WHEN code LIKE ?3 THEN 1 ELSE 2 END,
                code
            LIMIT ?4
            "#,
        )
        .bind(&pattern)
        .bind(&query)
        .bind(format!("{}%", query))
        .bind(limit.clamp(1, 500))
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    pub async fn update(&self, id: &str, update: ProductUpdate) -> DbResult<Product> {
        let mut product = self.require(id).await?;

        if let Some(description) = update.description {
            validate_description(&description)?;
            product.description = description.trim().to_string();
        }
        if let Some(size) = update.size {
            product.size = clean(size);
        }
        if let Some(color) = update.color {
            product.color = clean(color);
        }
        if let Some(price) = update.price_cents {
            validate_price_cents(price)?;
            product.price_cents = price;
        }
        if let Some(cost) = update.cost_cents {
            if let Some(c) = cost {
                validate_price_cents(c)?;
            }
            product.cost_cents = cost;
        }
        if let Some(active) = update.is_active {
            product.is_active = active;
        }
        product.updated_at = Utc::now();

        sqlx::query(
            r#"
            UPDATE products SET
                description = ?2, size = ?3, color = ?4,
                price_cents = ?5, cost_cents = ?6, is_active = ?7, updated_at = ?8
            WHERE id = ?1
            "#,
        )
        .bind(&product.id)
        .bind(&product.description)
        .bind(&product.size)
        .bind(&product.color)
        .bind(product.price_cents)
        .bind(product.cost_cents)
        .bind(product.is_active)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        info!(id = %product.id, "Product updated");
        Ok(product)
    }

    /// Soft-deletes a product. Its stock rows and history are kept.
    pub async fn deactivate(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("UPDATE products SET is_active = 0, updated_at = ?2 WHERE id = ?1")
            .bind(id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }
        info!(id = %id, "Product deactivated");
        Ok(())
    }

    /// Stock of every active product at a store (or at all stores).
    pub async fn inventory(&self, store_id: Option<&str>) -> DbResult<Vec<InventoryLine>> {
        let sql = format!(
            "{} WHERE p.is_active = 1 AND (?1 IS NULL OR sl.store_id = ?1) ORDER BY s.name, p.code",
            INVENTORY_SELECT
        );
        let lines = sqlx::query_as::<_, InventoryLine>(&sql)
            .bind(store_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(lines)
    }

    /// Active products at or below `threshold` units.
    pub async fn low_stock(&self, store_id: Option<&str>, threshold: i64) -> DbResult<Vec<InventoryLine>> {
        let sql = format!(
            "{} WHERE p.is_active = 1 AND (?1 IS NULL OR sl.store_id = ?1) AND sl.quantity <= ?2 \
             ORDER BY sl.quantity, p.code",
            INVENTORY_SELECT
        );
        let lines = sqlx::query_as::<_, InventoryLine>(&sql)
            .bind(store_id)
            .bind(threshold)
            .fetch_all(&self.pool)
            .await?;
        Ok(lines)
    }

    /// Manually corrects stock at a store by a signed delta.
    ///
    /// Returns the new quantity. The result may not drop below zero.
    pub async fn adjust_stock(
        &self,
        product_id: &str,
        store_id: &str,
        delta: i64,
        user_id: &str,
        notes: Option<&str>,
    ) -> DbResult<i64> {
        if delta == 0 {
            return Err(ValidationError::InvalidFormat {
                field: "delta".to_string(),
                reason: "must not be zero".to_string(),
            }
            .into());
        }

        let mut tx = begin_write(&self.pool).await?;
        super::stock::fetch_product(&mut tx, product_id).await?;
        super::stock::enabled_store(&mut tx, store_id).await?;

        let quantity = move_stock(
            &mut tx,
            &StockChange {
                product_id,
                store_id,
                kind: StockMovementKind::Adjustment,
                quantity: delta,
                reference_id: None,
                user_id: Some(user_id),
                notes,
            },
        )
        .await?;
        tx.commit().await?;

        info!(product_id = %product_id, store_id = %store_id, delta, quantity, "Stock adjusted");
        Ok(quantity)
    }

    /// Movement history of a product, newest first.
    pub async fn movements(
        &self,
        product_id: &str,
        store_id: Option<&str>,
        limit: u32,
    ) -> DbResult<Vec<StockMovement>> {
        let movements = sqlx::query_as::<_, StockMovement>(
            r#"
            SELECT * FROM stock_movements
            WHERE product_id = ?1 AND (?2 IS NULL OR store_id = ?2)
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?3
            "#,
        )
        .bind(product_id)
        .bind(store_id)
        .bind(limit.clamp(1, 500))
        .fetch_all(&self.pool)
        .await?;
        Ok(movements)
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE is_active = 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use vitrina_core::CoreError;

    fn tee(code: &str) -> NewProduct {
        NewProduct {
            code: code.to_string(),
            description: "Camiseta básica".to_string(),
            size: Some("M".to_string()),
            color: Some("negro".to_string()),
            price_cents: 1500,
            cost_cents: Some(700),
        }
    }

    #[tokio::test]
    async fn test_create_with_initial_stock() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let centro = db.stores().create("Centro", None).await.unwrap();
        let norte = db.stores().create("Norte", None).await.unwrap();

        let p = db
            .products()
            .create(tee("TEE-M"), &[(centro.id.clone(), 4), (norte.id.clone(), 6)], None)
            .await
            .unwrap();

        assert_eq!(p.quantity_at(&centro.id), 4);
        assert_eq!(p.total_quantity(), 10);

        let history = db.products().movements(&p.product.id, None, 10).await.unwrap();
        assert_eq!(history.len(), 2);
        assert!(history.iter().all(|m| m.kind == StockMovementKind::Adjustment));
    }

    #[tokio::test]
    async fn test_duplicate_code() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.products().create(tee("TEE-M"), &[], None).await.unwrap();
        let err = db.products().create(tee("TEE-M"), &[], None).await.unwrap_err();
        assert_eq!(err.to_string(), "Duplicate code: 'TEE-M' already exists");
    }

    #[tokio::test]
    async fn test_search_and_deactivate() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let a = db.products().create(tee("TEE-M"), &[], None).await.unwrap();
        db.products().create(tee("TEE-L"), &[], None).await.unwrap();

        assert_eq!(db.products().search("tee", 10).await.unwrap().len(), 2);
        assert_eq!(db.products().search("básica", 10).await.unwrap().len(), 2);
        assert_eq!(db.products().search("TEE-M", 10).await.unwrap()[0].code, "TEE-M");

        db.products().deactivate(&a.product.id).await.unwrap();
        assert_eq!(db.products().search("tee", 10).await.unwrap().len(), 1);
        assert!(db.products().get_by_code("TEE-M").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_adjust_stock_cannot_go_negative() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let store = db.stores().create("Centro", None).await.unwrap();
        let p = db
            .products()
            .create(tee("TEE-M"), &[(store.id.clone(), 2)], None)
            .await
            .unwrap();

        let seed_user = crate::test_support::user_at(&db, None).await;
        let qty = db
            .products()
            .adjust_stock(&p.product.id, &store.id, 3, &seed_user, Some("recount"))
            .await
            .unwrap();
        assert_eq!(qty, 5);

        let err = db
            .products()
            .adjust_stock(&p.product.id, &store.id, -6, &seed_user, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Core(CoreError::InsufficientStock { available: 5, requested: 6, .. })
        ));

        let low = db.products().low_stock(Some(&store.id), 5).await.unwrap();
        assert_eq!(low.len(), 1);
        assert_eq!(low[0].quantity, 5);
    }

    #[tokio::test]
    async fn test_update_price() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let p = db.products().create(tee("TEE-M"), &[], None).await.unwrap();

        let updated = db
            .products()
            .update(
                &p.product.id,
                ProductUpdate {
                    price_cents: Some(1800),
                    cost_cents: Some(None),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.price_cents, 1800);
        assert!(updated.cost_cents.is_none());
        assert!(db
            .products()
            .update(&p.product.id, ProductUpdate { price_cents: Some(-1), ..Default::default() })
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_price_upper_bound() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let max = vitrina_core::MAX_AMOUNT_CENTS;

        let too_dear = NewProduct {
            price_cents: max + 1,
            ..tee("TEE-M")
        };
        let err = db.products().create(too_dear, &[], None).await.unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::Validation(_))));

        let p = db
            .products()
            .create(NewProduct { price_cents: max, ..tee("TEE-M") }, &[], None)
            .await
            .unwrap();
        assert_eq!(p.product.price_cents, max);

        let err = db
            .products()
            .update(
                &p.product.id,
                ProductUpdate {
                    cost_cents: Some(Some(i64::MAX)),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::Validation(_))));
    }
}
