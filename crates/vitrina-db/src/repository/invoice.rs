//! # Invoice Repository
//!
//! Supplier invoices (incoming stock). An invoice is created pending and
//! only touches stock when it is received.
//!
//! ```text
//!   create ──► Pending ──receive──► Received   (+qty per line, invoice_receipt)
//!                 │
//!                 └──cancel───► Cancelled      (no stock change)
//! ```

use chrono::{NaiveDate, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use super::stock::{begin_write, enabled_store, fetch_product, move_stock, StockChange};
use crate::error::{DbError, DbResult};
use vitrina_core::validation::{
    document_total, line_total_cents, validate_name, validate_price_cents, validate_quantity,
};
use vitrina_core::{
    new_id, CoreError, Invoice, InvoiceDetail, InvoiceItem, InvoiceLineRequest, InvoiceStatus,
    StockMovementKind, ValidationError, MAX_DOCUMENT_LINES,
};

/// Input for [`InvoiceRepository::create`].
#[derive(Debug, Clone)]
pub struct NewInvoice {
    pub number: String,
    pub supplier: String,
    pub invoice_date: NaiveDate,
    pub store_id: String,
    pub lines: Vec<InvoiceLineRequest>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone)]
pub struct InvoiceRepository {
    pool: SqlitePool,
}

impl InvoiceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        InvoiceRepository { pool }
    }

    /// Records a pending invoice with its lines. The total is the sum of
    /// `quantity × unit cost` over the lines.
    pub async fn create(&self, new: NewInvoice, created_by: &str) -> DbResult<InvoiceDetail> {
        validate_name("invoice number", &new.number, 60)?;
        validate_name("supplier", &new.supplier, 120)?;
        if new.lines.is_empty() {
            return Err(ValidationError::Required {
                field: "invoice lines".to_string(),
            }
            .into());
        }
        if new.lines.len() > MAX_DOCUMENT_LINES {
            return Err(ValidationError::OutOfRange {
                field: "invoice lines".to_string(),
                min: 1,
                max: MAX_DOCUMENT_LINES as i64,
            }
            .into());
        }
        for line in &new.lines {
            validate_quantity(line.quantity)?;
            validate_price_cents(line.unit_cost_cents)?;
        }

        let now = Utc::now();
        let invoice_id = new_id();
        let number = new.number.trim().to_string();

        debug!(number = %number, store_id = %new.store_id, lines = new.lines.len(), "Creating invoice");

        let mut tx = begin_write(&self.pool).await?;
        enabled_store(&mut tx, &new.store_id).await?;

        let mut items = Vec::with_capacity(new.lines.len());
        for line in &new.lines {
            let product = fetch_product(&mut tx, &line.product_id).await?;
            items.push(InvoiceItem {
                id: new_id(),
                invoice_id: invoice_id.clone(),
                product_id: product.id,
                code_snapshot: product.code,
                description_snapshot: product.description,
                quantity: line.quantity,
                unit_cost_cents: line.unit_cost_cents,
                line_total_cents: line_total_cents(line.unit_cost_cents, line.quantity)?,
            });
        }

        let invoice = Invoice {
            id: invoice_id,
            number,
            supplier: new.supplier.trim().to_string(),
            invoice_date: new.invoice_date,
            store_id: new.store_id,
            status: InvoiceStatus::Pending,
            total_cents: document_total(items.iter().map(|i| i.line_total_cents))?.cents(),
            notes: new.notes,
            created_by: created_by.to_string(),
            created_at: now,
            received_at: None,
        };

        sqlx::query(
            r#"
            INSERT INTO invoices (
                id, number, supplier, invoice_date, store_id, status,
                total_cents, notes, created_by, created_at, received_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, NULL)
            "#,
        )
        .bind(&invoice.id)
        .bind(&invoice.number)
        .bind(&invoice.supplier)
        .bind(invoice.invoice_date)
        .bind(&invoice.store_id)
        .bind(invoice.status)
        .bind(invoice.total_cents)
        .bind(&invoice.notes)
        .bind(&invoice.created_by)
        .bind(invoice.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| DbError::from(e).with_duplicate_value("invoice number", &invoice.number))?;

        for item in &items {
            sqlx::query(
                r#"
                INSERT INTO invoice_items (
                    id, invoice_id, product_id, code_snapshot, description_snapshot,
                    quantity, unit_cost_cents, line_total_cents
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
            )
            .bind(&item.id)
            .bind(&item.invoice_id)
            .bind(&item.product_id)
            .bind(&item.code_snapshot)
            .bind(&item.description_snapshot)
            .bind(item.quantity)
            .bind(item.unit_cost_cents)
            .bind(item.line_total_cents)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        info!(id = %invoice.id, number = %invoice.number, total = invoice.total_cents, "Invoice created");
        Ok(InvoiceDetail { invoice, items })
    }

    /// Receives a pending invoice: every line is added to the store's stock.
    pub async fn receive(&self, id: &str, user_id: &str) -> DbResult<InvoiceDetail> {
        let mut tx = begin_write(&self.pool).await?;
        let invoice = fetch_invoice(&mut tx, id).await?;
        if invoice.status != InvoiceStatus::Pending {
            return Err(CoreError::invalid_status("Invoice", id, invoice.status, "receive").into());
        }
        enabled_store(&mut tx, &invoice.store_id).await?;

        let items = fetch_items(&mut tx, id).await?;
        for item in &items {
            move_stock(
                &mut tx,
                &StockChange {
                    product_id: &item.product_id,
                    store_id: &invoice.store_id,
                    kind: StockMovementKind::InvoiceReceipt,
                    quantity: item.quantity,
                    reference_id: Some(id),
                    user_id: Some(user_id),
                    notes: None,
                },
            )
            .await?;
        }

        sqlx::query("UPDATE invoices SET status = ?2, received_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(InvoiceStatus::Received)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;

        let invoice = fetch_invoice(&mut tx, id).await?;
        tx.commit().await?;

        info!(id = %id, lines = items.len(), "Invoice received");
        Ok(InvoiceDetail { invoice, items })
    }

    /// Cancels a pending invoice.
    pub async fn cancel(&self, id: &str) -> DbResult<Invoice> {
        let result = sqlx::query("UPDATE invoices SET status = ?2 WHERE id = ?1 AND status = ?3")
            .bind(id)
            .bind(InvoiceStatus::Cancelled)
            .bind(InvoiceStatus::Pending)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            let invoice = self.require(id).await?;
            return Err(CoreError::invalid_status("Invoice", id, invoice.status, "cancel").into());
        }

        info!(id = %id, "Invoice cancelled");
        self.require(id).await
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Invoice>> {
        let invoice = sqlx::query_as::<_, Invoice>("SELECT * FROM invoices WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(invoice)
    }

    pub async fn require(&self, id: &str) -> DbResult<Invoice> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Invoice", id))
    }

    pub async fn get_detail(&self, id: &str) -> DbResult<InvoiceDetail> {
        let invoice = self.require(id).await?;
        let items = sqlx::query_as::<_, InvoiceItem>(
            "SELECT * FROM invoice_items WHERE invoice_id = ?1 ORDER BY rowid",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;
        Ok(InvoiceDetail { invoice, items })
    }

    /// Invoices, newest first, optionally filtered by store and status.
    pub async fn list(
        &self,
        store_id: Option<&str>,
        status: Option<InvoiceStatus>,
        limit: u32,
    ) -> DbResult<Vec<Invoice>> {
        let invoices = sqlx::query_as::<_, Invoice>(
            r#"
            SELECT * FROM invoices
            WHERE (?1 IS NULL OR store_id = ?1)
              AND (?2 IS NULL OR status = ?2)
            ORDER BY created_at DESC
            LIMIT ?3
            "#,
        )
        .bind(store_id)
        .bind(status)
        .bind(limit.clamp(1, 500))
        .fetch_all(&self.pool)
        .await?;
        Ok(invoices)
    }
}

async fn fetch_invoice(conn: &mut SqliteConnection, id: &str) -> DbResult<Invoice> {
    sqlx::query_as::<_, Invoice>("SELECT * FROM invoices WHERE id = ?1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("Invoice", id))
}

async fn fetch_items(conn: &mut SqliteConnection, invoice_id: &str) -> DbResult<Vec<InvoiceItem>> {
    let items = sqlx::query_as::<_, InvoiceItem>(
        "SELECT * FROM invoice_items WHERE invoice_id = ?1 ORDER BY rowid",
    )
    .bind(invoice_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{product, user_at};
    use crate::{Database, DbConfig};

    fn invoice(store_id: &str, lines: Vec<InvoiceLineRequest>) -> NewInvoice {
        NewInvoice {
            number: "F-001".to_string(),
            supplier: "Textiles del Norte".to_string(),
            invoice_date: NaiveDate::from_ymd_opt(2024, 5, 2).unwrap(),
            store_id: store_id.to_string(),
            lines,
            notes: None,
        }
    }

    fn line(product_id: &str, quantity: i64, cost: i64) -> InvoiceLineRequest {
        InvoiceLineRequest {
            product_id: product_id.to_string(),
            quantity,
            unit_cost_cents: cost,
        }
    }

    #[tokio::test]
    async fn test_create_and_receive() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let store = db.stores().create("Centro", None).await.unwrap();
        let user = user_at(&db, Some(&store.id)).await;
        let p = product(&db, "TEE-M", &[]).await;

        let created = db
            .invoices()
            .create(invoice(&store.id, vec![line(&p, 10, 700), line(&p, 2, 650)]), &user)
            .await
            .unwrap();
        assert_eq!(created.invoice.status, InvoiceStatus::Pending);
        assert_eq!(created.invoice.total_cents, 8300);
        assert_eq!(created.items.len(), 2);

        // Pending invoices do not touch stock
        let stock = db.products().get_with_stock(&p).await.unwrap();
        assert_eq!(stock.quantity_at(&store.id), 0);

        let received = db.invoices().receive(&created.invoice.id, &user).await.unwrap();
        assert_eq!(received.invoice.status, InvoiceStatus::Received);
        assert!(received.invoice.received_at.is_some());

        let stock = db.products().get_with_stock(&p).await.unwrap();
        assert_eq!(stock.quantity_at(&store.id), 12);

        let again = db.invoices().receive(&created.invoice.id, &user).await.unwrap_err();
        assert!(matches!(again, DbError::Core(CoreError::InvalidStatus { .. })));
    }

    #[tokio::test]
    async fn test_unit_cost_bounded() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let store = db.stores().create("Centro", None).await.unwrap();
        let user = user_at(&db, None).await;
        let p = product(&db, "TEE-M", &[]).await;

        // Would overflow i64 if multiplied
        let err = db
            .invoices()
            .create(invoice(&store.id, vec![line(&p, 2, i64::MAX / 2 + 1)]), &user)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Core(CoreError::Validation(ValidationError::OutOfRange { .. }))
        ));
        assert!(db.invoices().list(None, None, 50).await.unwrap().is_empty());

        let err = db
            .invoices()
            .create(invoice(&store.id, vec![line(&p, 1, vitrina_core::MAX_AMOUNT_CENTS + 1)]), &user)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::Validation(_))));

        // The largest cost on the largest quantity is accepted
        let max = db
            .invoices()
            .create(
                invoice(
                    &store.id,
                    vec![line(&p, vitrina_core::MAX_ITEM_QUANTITY, vitrina_core::MAX_AMOUNT_CENTS)],
                ),
                &user,
            )
            .await
            .unwrap();
        assert_eq!(
            max.invoice.total_cents,
            vitrina_core::MAX_AMOUNT_CENTS * vitrina_core::MAX_ITEM_QUANTITY
        );
    }

    #[tokio::test]
    async fn test_duplicate_number_per_store() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let centro = db.stores().create("Centro", None).await.unwrap();
        let norte = db.stores().create("Norte", None).await.unwrap();
        let user = user_at(&db, None).await;
        let p = product(&db, "TEE-M", &[]).await;

        db.invoices().create(invoice(&centro.id, vec![line(&p, 1, 100)]), &user).await.unwrap();
        let err = db
            .invoices()
            .create(invoice(&centro.id, vec![line(&p, 1, 100)]), &user)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));

        // Same number at another store is fine
        db.invoices().create(invoice(&norte.id, vec![line(&p, 1, 100)]), &user).await.unwrap();
        assert_eq!(db.invoices().list(None, None, 50).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_cancel_only_pending() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let store = db.stores().create("Centro", None).await.unwrap();
        let user = user_at(&db, None).await;
        let p = product(&db, "TEE-M", &[]).await;

        let inv = db.invoices().create(invoice(&store.id, vec![line(&p, 3, 100)]), &user).await.unwrap();
        let cancelled = db.invoices().cancel(&inv.invoice.id).await.unwrap();
        assert_eq!(cancelled.status, InvoiceStatus::Cancelled);

        assert!(db.invoices().receive(&inv.invoice.id, &user).await.is_err());
        assert!(db.invoices().cancel(&inv.invoice.id).await.is_err());

        let pending = db
            .invoices()
            .list(Some(&store.id), Some(InvoiceStatus::Pending), 50)
            .await
            .unwrap();
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn test_disabled_store_cannot_receive() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let store = db.stores().create("Centro", None).await.unwrap();
        let user = user_at(&db, None).await;
        let p = product(&db, "TEE-M", &[]).await;

        let inv = db.invoices().create(invoice(&store.id, vec![line(&p, 3, 100)]), &user).await.unwrap();
        db.stores().set_enabled(&store.id, false).await.unwrap();

        let err = db.invoices().receive(&inv.invoice.id, &user).await.unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::StoreDisabled(_))));
    }
}
