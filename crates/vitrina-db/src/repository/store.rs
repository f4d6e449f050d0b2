//! # Store Repository
//!
//! The shops of the business. Stores are never deleted; disabling one stops
//! sales, invoice intake and transfers there while keeping its history.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use vitrina_core::validation::validate_name;
use vitrina_core::{new_id, Store};

#[derive(Debug, Clone)]
pub struct StoreRepository {
    pool: SqlitePool,
}

impl StoreRepository {
    pub fn new(pool: SqlitePool) -> Self {
        StoreRepository { pool }
    }

    /// Creates an enabled store.
    pub async fn create(&self, name: &str, address: Option<&str>) -> DbResult<Store> {
        validate_name("name", name, 100)?;
        let now = Utc::now();
        let store = Store {
            id: new_id(),
            name: name.trim().to_string(),
            address: address.map(|a| a.trim().to_string()).filter(|a| !a.is_empty()),
            is_enabled: true,
            created_at: now,
            updated_at: now,
        };

        debug!(id = %store.id, name = %store.name, "Creating store");

        sqlx::query(
            r#"
            INSERT INTO stores (id, name, address, is_enabled, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&store.id)
        .bind(&store.name)
        .bind(&store.address)
        .bind(store.is_enabled)
        .bind(store.created_at)
        .bind(store.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| DbError::from(e).with_duplicate_value("name", &store.name))?;

        info!(id = %store.id, name = %store.name, "Store created");
        Ok(store)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Store>> {
        let store = sqlx::query_as::<_, Store>("SELECT * FROM stores WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(store)
    }

    /// Like [`get_by_id`](Self::get_by_id) but a missing store is an error.
    pub async fn require(&self, id: &str) -> DbResult<Store> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Store", id))
    }

    pub async fn list(&self, only_enabled: bool) -> DbResult<Vec<Store>> {
        let stores = sqlx::query_as::<_, Store>(
            "SELECT * FROM stores WHERE (?1 = 0 OR is_enabled = 1) ORDER BY name",
        )
        .bind(only_enabled)
        .fetch_all(&self.pool)
        .await?;
        Ok(stores)
    }

    /// Renames a store and/or changes its address. `None` keeps a field.
    pub async fn update(
        &self,
        id: &str,
        name: Option<&str>,
        address: Option<Option<&str>>,
    ) -> DbResult<Store> {
        let mut store = self.require(id).await?;

        if let Some(name) = name {
            validate_name("name", name, 100)?;
            store.name = name.trim().to_string();
        }
        if let Some(address) = address {
            store.address = address.map(|a| a.trim().to_string()).filter(|a| !a.is_empty());
        }
        store.updated_at = Utc::now();

        sqlx::query("UPDATE stores SET name = ?2, address = ?3, updated_at = ?4 WHERE id = ?1")
            .bind(&store.id)
            .bind(&store.name)
            .bind(&store.address)
            .bind(store.updated_at)
            .execute(&self.pool)
            .await
            .map_err(|e| DbError::from(e).with_duplicate_value("name", &store.name))?;

        Ok(store)
    }

    pub async fn set_enabled(&self, id: &str, enabled: bool) -> DbResult<Store> {
        let result = sqlx::query("UPDATE stores SET is_enabled = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(enabled)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Store", id));
        }

        info!(id = %id, enabled, "Store status changed");
        self.require(id).await
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM stores")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
