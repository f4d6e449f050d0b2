//! # Transfer Repository (traslados)
//!
//! Stock leaves the origin when the transfer is created and arrives at the
//! destination when it is validated. A cancelled transfer puts it back at
//! the origin.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use super::stock::{begin_write, enabled_store, fetch_product, move_stock, StockChange};
use crate::error::{DbError, DbResult};
use vitrina_core::transfer::validate_transfer_request;
use vitrina_core::{
    new_id, LineRequest, StockMovementKind, Transfer, TransferDetail, TransferItem, TransferStatus,
};

/// Which side of a transfer a store is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferDirection {
    Incoming,
    Outgoing,
    #[default]
    Any,
}

#[derive(Debug, Clone, Default)]
pub struct TransferFilter {
    pub store_id: Option<String>,
    pub direction: TransferDirection,
    pub status: Option<TransferStatus>,
    pub limit: u32,
}

#[derive(Debug, Clone)]
pub struct TransferRepository {
    pool: SqlitePool,
}

impl TransferRepository {
    pub fn new(pool: SqlitePool) -> Self {
        TransferRepository { pool }
    }

    /// Creates a pending transfer and takes the stock out of the origin.
    pub async fn create(
        &self,
        origin_store_id: &str,
        destination_store_id: &str,
        lines: &[LineRequest],
        user_id: &str,
        notes: Option<&str>,
    ) -> DbResult<TransferDetail> {
        let lines = validate_transfer_request(origin_store_id, destination_store_id, lines)?;

        debug!(
            origin = %origin_store_id,
            destination = %destination_store_id,
            lines = lines.len(),
            "Creating transfer"
        );

        let mut tx = begin_write(&self.pool).await?;
        enabled_store(&mut tx, origin_store_id).await?;
        enabled_store(&mut tx, destination_store_id).await?;

        let transfer = Transfer {
            id: new_id(),
            origin_store_id: origin_store_id.to_string(),
            destination_store_id: destination_store_id.to_string(),
            status: TransferStatus::Pending,
            requested_by: user_id.to_string(),
            requested_at: Utc::now(),
            validated_by: None,
            validated_at: None,
            cancelled_by: None,
            cancelled_at: None,
            notes: notes.map(str::to_string),
        };

        sqlx::query(
            r#"
            INSERT INTO transfers (
                id, origin_store_id, destination_store_id, status,
                requested_by, requested_at, notes
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&transfer.id)
        .bind(&transfer.origin_store_id)
        .bind(&transfer.destination_store_id)
        .bind(transfer.status)
        .bind(&transfer.requested_by)
        .bind(transfer.requested_at)
        .bind(&transfer.notes)
        .execute(&mut *tx)
        .await?;

        let mut items = Vec::with_capacity(lines.len());
        for line in &lines {
            let product = fetch_product(&mut tx, &line.product_id).await?;
            let item = TransferItem {
                id: new_id(),
                transfer_id: transfer.id.clone(),
                product_id: product.id,
                code_snapshot: product.code,
                description_snapshot: product.description,
                quantity: line.quantity,
            };

            sqlx::query(
                r#"
                INSERT INTO transfer_items (
                    id, transfer_id, product_id, code_snapshot, description_snapshot, quantity
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )
            .bind(&item.id)
            .bind(&item.transfer_id)
            .bind(&item.product_id)
            .bind(&item.code_snapshot)
            .bind(&item.description_snapshot)
            .bind(item.quantity)
            .execute(&mut *tx)
            .await?;

            move_stock(
                &mut tx,
                &StockChange {
                    product_id: &item.product_id,
                    store_id: origin_store_id,
                    kind: StockMovementKind::TransferOut,
                    quantity: item.quantity,
                    reference_id: Some(&transfer.id),
                    user_id: Some(user_id),
                    notes: None,
                },
            )
            .await?;

            items.push(item);
        }

        tx.commit().await?;

        info!(id = %transfer.id, origin = %origin_store_id, destination = %destination_store_id, "Transfer created");
        Ok(TransferDetail { transfer, items })
    }

    /// Accepts a pending transfer at its destination.
    pub async fn validate(&self, id: &str, user_id: &str) -> DbResult<TransferDetail> {
        let mut tx = begin_write(&self.pool).await?;
        let transfer = fetch_transfer(&mut tx, id).await?;
        transfer.status.ensure_can_validate(id)?;
        enabled_store(&mut tx, &transfer.destination_store_id).await?;

        let items = fetch_items(&mut tx, id).await?;
        for item in &items {
            move_stock(
                &mut tx,
                &StockChange {
                    product_id: &item.product_id,
                    store_id: &transfer.destination_store_id,
                    kind: StockMovementKind::TransferIn,
                    quantity: item.quantity,
                    reference_id: Some(id),
                    user_id: Some(user_id),
                    notes: None,
                },
            )
            .await?;
        }

        sqlx::query("UPDATE transfers SET status = ?2, validated_by = ?3, validated_at = ?4 WHERE id = ?1")
            .bind(id)
            .bind(TransferStatus::Validated)
            .bind(user_id)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;

        let transfer = fetch_transfer(&mut tx, id).await?;
        tx.commit().await?;

        info!(id = %id, destination = %transfer.destination_store_id, "Transfer validated");
        Ok(TransferDetail { transfer, items })
    }

    /// Cancels a pending transfer and returns its stock to the origin.
    pub async fn cancel(&self, id: &str, user_id: &str) -> DbResult<TransferDetail> {
        let mut tx = begin_write(&self.pool).await?;
        let transfer = fetch_transfer(&mut tx, id).await?;
        transfer.status.ensure_can_cancel(id)?;

        let items = fetch_items(&mut tx, id).await?;
        for item in &items {
            move_stock(
                &mut tx,
                &StockChange {
                    product_id: &item.product_id,
                    store_id: &transfer.origin_store_id,
                    kind: StockMovementKind::TransferReturn,
                    quantity: item.quantity,
                    reference_id: Some(id),
                    user_id: Some(user_id),
                    notes: None,
                },
            )
            .await?;
        }

        sqlx::query("UPDATE transfers SET status = ?2, cancelled_by = ?3, cancelled_at = ?4 WHERE id = ?1")
            .bind(id)
            .bind(TransferStatus::Cancelled)
            .bind(user_id)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;

        let transfer = fetch_transfer(&mut tx, id).await?;
        tx.commit().await?;

        info!(id = %id, origin = %transfer.origin_store_id, "Transfer cancelled");
        Ok(TransferDetail { transfer, items })
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Transfer>> {
        let transfer = sqlx::query_as::<_, Transfer>("SELECT * FROM transfers WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(transfer)
    }

    pub async fn require(&self, id: &str) -> DbResult<Transfer> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Transfer", id))
    }

    pub async fn get_detail(&self, id: &str) -> DbResult<TransferDetail> {
        let mut conn = self.pool.acquire().await?;
        let transfer = fetch_transfer(&mut conn, id).await?;
        let items = fetch_items(&mut conn, id).await?;
        Ok(TransferDetail { transfer, items })
    }

    /// Transfers, newest first.
    pub async fn list(&self, filter: &TransferFilter) -> DbResult<Vec<Transfer>> {
        let store_clause = match filter.direction {
            TransferDirection::Incoming => "destination_store_id = ?1",
            TransferDirection::Outgoing => "origin_store_id = ?1",
            TransferDirection::Any => "(origin_store_id = ?1 OR destination_store_id = ?1)",
        };
        let sql = format!(
            r#"
            SELECT * FROM transfers
            WHERE (?1 IS NULL OR {})
              AND (?2 IS NULL OR status = ?2)
            ORDER BY requested_at DESC
            LIMIT ?3
            "#,
            store_clause
        );
        let limit = if filter.limit == 0 { 100 } else { filter.limit.clamp(1, 500) };

        let transfers = sqlx::query_as::<_, Transfer>(&sql)
            .bind(&filter.store_id)
            .bind(filter.status)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(transfers)
    }
}

async fn fetch_transfer(conn: &mut SqliteConnection, id: &str) -> DbResult<Transfer> {
    sqlx::query_as::<_, Transfer>("SELECT * FROM transfers WHERE id = ?1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("Transfer", id))
}

async fn fetch_items(conn: &mut SqliteConnection, transfer_id: &str) -> DbResult<Vec<TransferItem>> {
    let items = sqlx::query_as::<_, TransferItem>(
        "SELECT * FROM transfer_items WHERE transfer_id = ?1 ORDER BY rowid",
    )
    .bind(transfer_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{product, user_at};
    use crate::{Database, DbConfig};
    use vitrina_core::CoreError;

    struct Stores {
        db: Database,
        centro: String,
        norte: String,
        user: String,
        tee: String,
    }

    async fn stores() -> Stores {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let centro = db.stores().create("Centro", None).await.unwrap().id;
        let norte = db.stores().create("Norte", None).await.unwrap().id;
        let user = user_at(&db, None).await;
        let tee = product(&db, "TEE-M", &[(centro.as_str(), 5)]).await;
        Stores { db, centro, norte, user, tee }
    }

    fn lines(product_id: &str, quantity: i64) -> Vec<LineRequest> {
        vec![LineRequest {
            product_id: product_id.to_string(),
            quantity,
        }]
    }

    async fn qty(s: &Stores, store: &str) -> i64 {
        s.db.products().get_with_stock(&s.tee).await.unwrap().quantity_at(store)
    }

    #[tokio::test]
    async fn test_create_then_validate() {
        let s = stores().await;
        let t = s
            .db
            .transfers()
            .create(&s.centro, &s.norte, &lines(&s.tee, 3), &s.user, Some("restock"))
            .await
            .unwrap();
        assert_eq!(t.transfer.status, TransferStatus::Pending);
        assert_eq!(qty(&s, &s.centro).await, 2);
        assert_eq!(qty(&s, &s.norte).await, 0);

        let v = s.db.transfers().validate(&t.transfer.id, &s.user).await.unwrap();
        assert_eq!(v.transfer.status, TransferStatus::Validated);
        assert!(v.transfer.validated_at.is_some());
        assert_eq!(qty(&s, &s.norte).await, 3);

        let err = s.db.transfers().cancel(&t.transfer.id, &s.user).await.unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::InvalidStatus { .. })));
    }

    #[tokio::test]
    async fn test_cancel_returns_stock() {
        let s = stores().await;
        let t = s
            .db
            .transfers()
            .create(&s.centro, &s.norte, &lines(&s.tee, 5), &s.user, None)
            .await
            .unwrap();
        assert_eq!(qty(&s, &s.centro).await, 0);

        s.db.transfers().cancel(&t.transfer.id, &s.user).await.unwrap();
        assert_eq!(qty(&s, &s.centro).await, 5);
        assert!(s.db.transfers().validate(&t.transfer.id, &s.user).await.is_err());

        let history = s.db.products().movements(&s.tee, Some(&s.centro), 10).await.unwrap();
        assert_eq!(history[0].kind, StockMovementKind::TransferReturn);
    }

    #[tokio::test]
    async fn test_insufficient_stock_and_same_store() {
        let s = stores().await;
        let err = s
            .db
            .transfers()
            .create(&s.centro, &s.norte, &lines(&s.tee, 6), &s.user, None)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::InsufficientStock { .. })));
        assert_eq!(qty(&s, &s.centro).await, 5);

        let err = s
            .db
            .transfers()
            .create(&s.centro, &s.centro, &lines(&s.tee, 1), &s.user, None)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::InvalidTransfer { .. })));
    }

    #[tokio::test]
    async fn test_list_by_direction() {
        let s = stores().await;
        s.db
            .transfers()
            .create(&s.centro, &s.norte, &lines(&s.tee, 1), &s.user, None)
            .await
            .unwrap();

        let incoming = s
            .db
            .transfers()
            .list(&TransferFilter {
                store_id: Some(s.norte.clone()),
                direction: TransferDirection::Incoming,
                status: Some(TransferStatus::Pending),
                limit: 0,
            })
            .await
            .unwrap();
        assert_eq!(incoming.len(), 1);

        let outgoing = s
            .db
            .transfers()
            .list(&TransferFilter {
                store_id: Some(s.norte.clone()),
                direction: TransferDirection::Outgoing,
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(outgoing.is_empty());
    }
}
