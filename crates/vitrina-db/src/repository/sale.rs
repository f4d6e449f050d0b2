//! # Sale Repository
//!
//! Checkout, layaway deposits, voids and cancellations.
//!
//! ## Sale Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  checkout(physical | online) ──► Completed ──void──► Voided             │
//! │                                                     (stock returned)    │
//! │                                                                         │
//! │  checkout(layaway, deposit) ──► Layaway ──add_payment──► Layaway        │
//! │                                    │          (balance reaches zero)    │
//! │                                    │                 └──► Completed     │
//! │                                    └──cancel_layaway──► Cancelled       │
//! │                                                        (stock returned) │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every step runs in one transaction: header, lines, stock movements and
//! payment are written together or not at all.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use super::register::require_open_session;
use super::stock::{begin_write, enabled_store, fetch_product, move_stock, StockChange};
use crate::error::{DbError, DbResult};
use vitrina_core::checkout::{checkout_payment, format_receipt_number, receipt_sequence};
use vitrina_core::layaway::LayawayBalance;
use vitrina_core::stock::merge_lines;
use vitrina_core::validation::{
    document_total, line_total_cents, validate_amount_cents, validate_quantity,
};
use vitrina_core::{
    new_id, CoreError, LineRequest, Money, Payment, PaymentMethod, Sale, SaleDetail, SaleItem,
    SaleStatus, SaleType, StockMovementKind, MAX_CART_ITEMS,
};

/// Everything checkout needs. Lines usually come from the seller's cart.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub store_id: String,
    pub user_id: String,
    pub sale_type: SaleType,
    pub customer_name: Option<String>,
    pub payment_method: PaymentMethod,
    /// Cash tendered for in-full sales, the deposit for layaways.
    pub amount_cents: i64,
    pub lines: Vec<LineRequest>,
    pub notes: Option<String>,
}

/// A finished checkout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutReceipt {
    #[serde(flatten)]
    pub detail: SaleDetail,
    pub change_cents: i64,
}

/// Filters for [`SaleRepository::list`].
#[derive(Debug, Clone, Default)]
pub struct SaleFilter {
    pub store_id: Option<String>,
    pub sale_type: Option<SaleType>,
    pub status: Option<SaleStatus>,
    pub from: Option<DateTime<Utc>>,
    /// Exclusive upper bound.
    pub to: Option<DateTime<Utc>>,
    pub limit: u32,
}

#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Turns lines into a sale.
    ///
    /// ## Steps (one transaction)
    /// 1. Store enabled; open register for physical and layaway sales
    /// 2. Price every line at the current product price
    /// 3. Apply the payment rules of the sale type
    /// 4. Insert header and lines, take stock (`sale` movements)
    /// 5. Record the payment
    pub async fn checkout(&self, req: CheckoutRequest) -> DbResult<CheckoutReceipt> {
        let lines = merge_lines(&req.lines);
        if lines.is_empty() {
            return Err(CoreError::EmptyCart.into());
        }
        if lines.len() > MAX_CART_ITEMS {
            return Err(CoreError::CartTooLarge { max: MAX_CART_ITEMS }.into());
        }
        for line in &lines {
            validate_quantity(line.quantity)?;
        }
        // Zero is left to the payment rules (free items, missing deposit)
        if req.amount_cents != 0 {
            validate_amount_cents(req.amount_cents)?;
        }

        debug!(
            store_id = %req.store_id,
            sale_type = %req.sale_type,
            lines = lines.len(),
            "Checkout"
        );

        let now = Utc::now();
        let sale_id = new_id();

        let mut tx = begin_write(&self.pool).await?;
        enabled_store(&mut tx, &req.store_id).await?;

        let session_id = if req.sale_type.requires_register() {
            Some(require_open_session(&mut tx, &req.store_id).await?.id)
        } else {
            None
        };

        let mut items = Vec::with_capacity(lines.len());
        for line in &lines {
            let product = fetch_product(&mut tx, &line.product_id).await?;
            if !product.is_active {
                return Err(CoreError::invalid_status("Product", &product.code, "inactive", "sell").into());
            }
            items.push(SaleItem {
                id: new_id(),
                sale_id: sale_id.clone(),
                product_id: product.id,
                code_snapshot: product.code,
                description_snapshot: product.description,
                unit_price_cents: product.price_cents,
                quantity: line.quantity,
                line_total_cents: line_total_cents(product.price_cents, line.quantity)?,
            });
        }

        let total = document_total(items.iter().map(|i| i.line_total_cents))?;
        let payment = checkout_payment(
            req.sale_type,
            req.payment_method,
            total,
            Money::from_cents(req.amount_cents),
        )?;

        let sale = Sale {
            id: sale_id,
            receipt_number: next_receipt_number(&mut tx, &req.store_id, now).await?,
            store_id: req.store_id.clone(),
            user_id: req.user_id.clone(),
            customer_name: req
                .customer_name
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty()),
            sale_type: req.sale_type,
            status: payment.status,
            payment_method: req.payment_method,
            total_cents: total.cents(),
            paid_cents: payment.recorded.cents(),
            register_session_id: session_id.clone(),
            notes: req.notes,
            created_at: now,
            updated_at: now,
            completed_at: (payment.status == SaleStatus::Completed).then_some(now),
        };

        insert_sale(&mut tx, &sale).await?;

        for item in &items {
            insert_item(&mut tx, item).await?;
            move_stock(
                &mut tx,
                &StockChange {
                    product_id: &item.product_id,
                    store_id: &sale.store_id,
                    kind: StockMovementKind::Sale,
                    quantity: item.quantity,
                    reference_id: Some(&sale.id),
                    user_id: Some(&sale.user_id),
                    notes: None,
                },
            )
            .await?;
        }

        let mut payments = Vec::new();
        if payment.recorded.is_positive() {
            let p = Payment {
                id: new_id(),
                sale_id: sale.id.clone(),
                register_session_id: session_id,
                method: req.payment_method,
                amount_cents: payment.recorded.cents(),
                user_id: req.user_id,
                created_at: now,
            };
            insert_payment(&mut tx, &p).await?;
            payments.push(p);
        }

        tx.commit().await?;

        info!(
            id = %sale.id,
            receipt = %sale.receipt_number,
            sale_type = %sale.sale_type,
            total = sale.total_cents,
            "Sale completed"
        );

        Ok(CheckoutReceipt {
            detail: SaleDetail {
                sale,
                items,
                payments,
            },
            change_cents: payment.change.cents(),
        })
    }

    /// Takes a further deposit (abono) on a layaway. Needs an open register
    /// at the sale's store; a settled layaway becomes completed.
    pub async fn add_payment(
        &self,
        sale_id: &str,
        method: PaymentMethod,
        amount_cents: i64,
        user_id: &str,
    ) -> DbResult<SaleDetail> {
        validate_amount_cents(amount_cents)?;

        let mut tx = begin_write(&self.pool).await?;
        let sale = fetch_sale(&mut tx, sale_id).await?;
        if sale.status != SaleStatus::Layaway {
            return Err(CoreError::invalid_status("Sale", sale_id, sale.status, "add payment").into());
        }
        enabled_store(&mut tx, &sale.store_id).await?;
        let session = require_open_session(&mut tx, &sale.store_id).await?;

        let balance = LayawayBalance::new(sale.total(), Money::from_cents(sale.paid_cents))
            .apply_payment(Money::from_cents(amount_cents))?;

        let now = Utc::now();
        insert_payment(
            &mut tx,
            &Payment {
                id: new_id(),
                sale_id: sale.id.clone(),
                register_session_id: Some(session.id),
                method,
                amount_cents,
                user_id: user_id.to_string(),
                created_at: now,
            },
        )
        .await?;

        let settled = balance.is_settled();
        sqlx::query(
            r#"
            UPDATE sales SET
                paid_cents = ?2,
                status = ?3,
                completed_at = CASE WHEN ?4 THEN ?5 ELSE completed_at END,
                updated_at = ?5
            WHERE id = ?1
            "#,
        )
        .bind(sale_id)
        .bind(balance.paid.cents())
        .bind(if settled { SaleStatus::Completed } else { SaleStatus::Layaway })
        .bind(settled)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let detail = fetch_detail(&mut tx, sale_id).await?;
        tx.commit().await?;

        info!(
            id = %sale_id,
            amount = amount_cents,
            remaining = balance.remaining().cents(),
            "Layaway payment recorded"
        );
        Ok(detail)
    }

    /// Voids a completed physical or online sale and returns its stock.
    ///
    /// A physical sale can only be voided while the register session that
    /// took its money is still open.
    pub async fn void(&self, sale_id: &str, user_id: &str, reason: Option<&str>) -> DbResult<SaleDetail> {
        let mut tx = begin_write(&self.pool).await?;
        let sale = fetch_sale(&mut tx, sale_id).await?;

        if sale.status != SaleStatus::Completed {
            return Err(CoreError::invalid_status("Sale", sale_id, sale.status, "void").into());
        }
        if sale.sale_type == SaleType::Layaway {
            return Err(CoreError::VoidNotAllowed {
                sale_id: sale_id.to_string(),
                reason: "layaway sales cannot be voided".to_string(),
            }
            .into());
        }
        if let Some(session_id) = &sale.register_session_id {
            let open: Option<String> = sqlx::query_scalar(
                "SELECT id FROM register_sessions WHERE id = ?1 AND status = 'open'",
            )
            .bind(session_id)
            .fetch_optional(&mut *tx)
            .await?;
            if open.is_none() {
                warn!(id = %sale_id, session_id = %session_id, "Void refused, register closed");
                return Err(CoreError::VoidNotAllowed {
                    sale_id: sale_id.to_string(),
                    reason: "its register session is closed".to_string(),
                }
                .into());
            }
        }

        restore_stock(&mut tx, &sale, user_id, reason).await?;
        set_status(&mut tx, sale_id, SaleStatus::Voided).await?;
        let detail = fetch_detail(&mut tx, sale_id).await?;
        tx.commit().await?;

        info!(id = %sale_id, receipt = %sale.receipt_number, reason = ?reason, "Sale voided");
        Ok(detail)
    }

    /// Abandons a pending layaway and returns its stock. Deposits already
    /// taken stay recorded.
    pub async fn cancel_layaway(&self, sale_id: &str, user_id: &str, reason: Option<&str>) -> DbResult<SaleDetail> {
        let mut tx = begin_write(&self.pool).await?;
        let sale = fetch_sale(&mut tx, sale_id).await?;
        if sale.status != SaleStatus::Layaway {
            return Err(CoreError::invalid_status("Sale", sale_id, sale.status, "cancel").into());
        }

        restore_stock(&mut tx, &sale, user_id, reason).await?;
        set_status(&mut tx, sale_id, SaleStatus::Cancelled).await?;
        let detail = fetch_detail(&mut tx, sale_id).await?;
        tx.commit().await?;

        info!(id = %sale_id, paid = sale.paid_cents, "Layaway cancelled");
        Ok(detail)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Sale>> {
        let sale = sqlx::query_as::<_, Sale>("SELECT * FROM sales WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(sale)
    }

    pub async fn require(&self, id: &str) -> DbResult<Sale> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Sale", id))
    }

    pub async fn get_detail(&self, id: &str) -> DbResult<SaleDetail> {
        let mut conn = self.pool.acquire().await?;
        fetch_detail(&mut conn, id).await
    }

    /// Sales, newest first.
    pub async fn list(&self, filter: &SaleFilter) -> DbResult<Vec<Sale>> {
        let limit = if filter.limit == 0 { 100 } else { filter.limit.clamp(1, 500) };
        let sales = sqlx::query_as::<_, Sale>(
            r#"
            SELECT * FROM sales
            WHERE (?1 IS NULL OR store_id = ?1)
              AND (?2 IS NULL OR sale_type = ?2)
              AND (?3 IS NULL OR status = ?3)
              AND (?4 IS NULL OR created_at >= ?4)
              AND (?5 IS NULL OR created_at < ?5)
            ORDER BY created_at DESC
            LIMIT ?6
            "#,
        )
        .bind(&filter.store_id)
        .bind(filter.sale_type)
        .bind(filter.status)
        .bind(filter.from)
        .bind(filter.to)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(sales)
    }
}

// =============================================================================
// Transaction helpers
// =============================================================================

/// Next `YYYYMMDD-NNNN` number for a store on the day of `now`.
async fn next_receipt_number(
    conn: &mut SqliteConnection,
    store_id: &str,
    now: DateTime<Utc>,
) -> DbResult<String> {
    let date = now.date_naive();
    let prefix = date.format("%Y%m%d").to_string();

    let last: Option<String> = sqlx::query_scalar(
        r#"
        SELECT receipt_number FROM sales
        WHERE store_id = ?1 AND receipt_number LIKE ?2
        ORDER BY length(receipt_number) DESC, receipt_number DESC
        LIMIT 1
        "#,
    )
    .bind(store_id)
    .bind(format!("{}-%", prefix))
    .fetch_optional(&mut *conn)
    .await?;

    let next = last.as_deref().and_then(receipt_sequence).unwrap_or(0) + 1;
    Ok(format_receipt_number(date, next))
}

async fn insert_sale(conn: &mut SqliteConnection, sale: &Sale) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO sales (
            id, receipt_number, store_id, user_id, customer_name,
            sale_type, status, payment_method, total_cents, paid_cents,
            register_session_id, notes, created_at, updated_at, completed_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
        "#,
    )
    .bind(&sale.id)
    .bind(&sale.receipt_number)
    .bind(&sale.store_id)
    .bind(&sale.user_id)
    .bind(&sale.customer_name)
    .bind(sale.sale_type)
    .bind(sale.status)
    .bind(sale.payment_method)
    .bind(sale.total_cents)
    .bind(sale.paid_cents)
    .bind(&sale.register_session_id)
    .bind(&sale.notes)
    .bind(sale.created_at)
    .bind(sale.updated_at)
    .bind(sale.completed_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn insert_item(conn: &mut SqliteConnection, item: &SaleItem) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO sale_items (
            id, sale_id, product_id, code_snapshot, description_snapshot,
            unit_price_cents, quantity, line_total_cents
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(&item.id)
    .bind(&item.sale_id)
    .bind(&item.product_id)
    .bind(&item.code_snapshot)
    .bind(&item.description_snapshot)
    .bind(item.unit_price_cents)
    .bind(item.quantity)
    .bind(item.line_total_cents)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn insert_payment(conn: &mut SqliteConnection, payment: &Payment) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO payments (
            id, sale_id, register_session_id, method, amount_cents, user_id, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )
    .bind(&payment.id)
    .bind(&payment.sale_id)
    .bind(&payment.register_session_id)
    .bind(payment.method)
    .bind(payment.amount_cents)
    .bind(&payment.user_id)
    .bind(payment.created_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn set_status(conn: &mut SqliteConnection, sale_id: &str, status: SaleStatus) -> DbResult<()> {
    sqlx::query("UPDATE sales SET status = ?2, updated_at = ?3 WHERE id = ?1")
        .bind(sale_id)
        .bind(status)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Puts every line of a sale back on the store's shelf.
async fn restore_stock(
    conn: &mut SqliteConnection,
    sale: &Sale,
    user_id: &str,
    reason: Option<&str>,
) -> DbResult<()> {
    let items = fetch_items(conn, &sale.id).await?;
    for item in &items {
        move_stock(
            conn,
            &StockChange {
                product_id: &item.product_id,
                store_id: &sale.store_id,
                kind: StockMovementKind::SaleReversal,
                quantity: item.quantity,
                reference_id: Some(&sale.id),
                user_id: Some(user_id),
                notes: reason,
            },
        )
        .await?;
    }
    Ok(())
}

async fn fetch_sale(conn: &mut SqliteConnection, id: &str) -> DbResult<Sale> {
    sqlx::query_as::<_, Sale>("SELECT * FROM sales WHERE id = ?1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("Sale", id))
}

async fn fetch_items(conn: &mut SqliteConnection, sale_id: &str) -> DbResult<Vec<SaleItem>> {
    let items = sqlx::query_as::<_, SaleItem>("SELECT * FROM sale_items WHERE sale_id = ?1 ORDER BY rowid")
        .bind(sale_id)
        .fetch_all(&mut *conn)
        .await?;
    Ok(items)
}

async fn fetch_detail(conn: &mut SqliteConnection, sale_id: &str) -> DbResult<SaleDetail> {
    let sale = fetch_sale(conn, sale_id).await?;
    let items = fetch_items(conn, sale_id).await?;
    let payments = sqlx::query_as::<_, Payment>(
        "SELECT * FROM payments WHERE sale_id = ?1 ORDER BY created_at, rowid",
    )
    .bind(sale_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(SaleDetail { sale, items, payments })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{product, user_at};
    use crate::{Database, DbConfig};

    struct Shop {
        db: Database,
        store: String,
        user: String,
        tee: String,
    }

    /// A store with an open register and 10 units of a 1500-cent product.
    async fn shop() -> Shop {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let store = db.stores().create("Centro", None).await.unwrap().id;
        let user = user_at(&db, Some(&store)).await;
        let tee = product(&db, "TEE-M", &[(store.as_str(), 10)]).await;
        db.registers().open(&store, &user, 1000, None).await.unwrap();
        Shop { db, store, user, tee }
    }

    fn request(shop: &Shop, sale_type: SaleType, method: PaymentMethod, amount: i64, qty: i64) -> CheckoutRequest {
        CheckoutRequest {
            store_id: shop.store.clone(),
            user_id: shop.user.clone(),
            sale_type,
            customer_name: Some("Ana".to_string()),
            payment_method: method,
            amount_cents: amount,
            lines: vec![LineRequest {
                product_id: shop.tee.clone(),
                quantity: qty,
            }],
            notes: None,
        }
    }

    async fn stock(shop: &Shop) -> i64 {
        shop.db
            .products()
            .get_with_stock(&shop.tee)
            .await
            .unwrap()
            .quantity_at(&shop.store)
    }

    #[tokio::test]
    async fn test_physical_checkout_with_change() {
        let shop = shop().await;
        let receipt = shop
            .db
            .sales()
            .checkout(request(&shop, SaleType::Physical, PaymentMethod::Cash, 5000, 3))
            .await
            .unwrap();

        let sale = &receipt.detail.sale;
        assert_eq!(sale.total_cents, 4500);
        assert_eq!(sale.paid_cents, 4500);
        assert_eq!(sale.status, SaleStatus::Completed);
        assert!(sale.register_session_id.is_some());
        assert!(sale.receipt_number.ends_with("-0001"));
        assert_eq!(receipt.change_cents, 500);
        assert_eq!(receipt.detail.payments[0].amount_cents, 4500);
        assert_eq!(stock(&shop).await, 7);

        let second = shop
            .db
            .sales()
            .checkout(request(&shop, SaleType::Physical, PaymentMethod::Card, 1500, 1))
            .await
            .unwrap();
        assert!(second.detail.sale.receipt_number.ends_with("-0002"));
    }

    #[tokio::test]
    async fn test_checkout_rolls_back_on_insufficient_stock() {
        let shop = shop().await;
        let err = shop
            .db
            .sales()
            .checkout(request(&shop, SaleType::Physical, PaymentMethod::Cash, 99_999, 11))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Core(CoreError::InsufficientStock { available: 10, requested: 11, .. })
        ));
        assert_eq!(stock(&shop).await, 10);
        assert!(shop.db.sales().list(&SaleFilter::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_register_required_except_online() {
        let shop = shop().await;
        shop.db.registers().close(&shop.store, &shop.user, 1000, None).await.unwrap();

        let err = shop
            .db
            .sales()
            .checkout(request(&shop, SaleType::Physical, PaymentMethod::Cash, 1500, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::RegisterNotOpen { .. })));

        let online = shop
            .db
            .sales()
            .checkout(request(&shop, SaleType::Online, PaymentMethod::Transfer, 1500, 1))
            .await
            .unwrap();
        assert!(online.detail.sale.register_session_id.is_none());
        assert!(online.detail.payments[0].register_session_id.is_none());
    }

    #[tokio::test]
    async fn test_underpayment_rejected() {
        let shop = shop().await;
        let err = shop
            .db
            .sales()
            .checkout(request(&shop, SaleType::Physical, PaymentMethod::Cash, 1000, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::InvalidPaymentAmount { .. })));
        assert_eq!(stock(&shop).await, 10);
    }

    #[tokio::test]
    async fn test_layaway_until_settled() {
        let shop = shop().await;
        let receipt = shop
            .db
            .sales()
            .checkout(request(&shop, SaleType::Layaway, PaymentMethod::Cash, 1000, 2))
            .await
            .unwrap();
        let id = receipt.detail.sale.id.clone();
        assert_eq!(receipt.detail.sale.status, SaleStatus::Layaway);
        assert_eq!(receipt.detail.sale.balance().cents(), 2000);
        assert_eq!(stock(&shop).await, 8);

        let over = shop.db.sales().add_payment(&id, PaymentMethod::Cash, 2500, &shop.user).await;
        assert!(over.is_err());

        let partial = shop.db.sales().add_payment(&id, PaymentMethod::Card, 1500, &shop.user).await.unwrap();
        assert_eq!(partial.sale.status, SaleStatus::Layaway);
        assert_eq!(partial.payments.len(), 2);

        let done = shop.db.sales().add_payment(&id, PaymentMethod::Cash, 500, &shop.user).await.unwrap();
        assert_eq!(done.sale.status, SaleStatus::Completed);
        assert!(done.sale.completed_at.is_some());
        assert_eq!(done.sale.paid_cents, 3000);

        let more = shop.db.sales().add_payment(&id, PaymentMethod::Cash, 1, &shop.user).await.unwrap_err();
        assert!(matches!(more, DbError::Core(CoreError::InvalidStatus { .. })));
    }

    #[tokio::test]
    async fn test_cancel_layaway_returns_stock() {
        let shop = shop().await;
        let receipt = shop
            .db
            .sales()
            .checkout(request(&shop, SaleType::Layaway, PaymentMethod::Cash, 500, 4))
            .await
            .unwrap();
        assert_eq!(stock(&shop).await, 6);

        let cancelled = shop
            .db
            .sales()
            .cancel_layaway(&receipt.detail.sale.id, &shop.user, Some("customer left"))
            .await
            .unwrap();
        assert_eq!(cancelled.sale.status, SaleStatus::Cancelled);
        assert_eq!(cancelled.payments.len(), 1);
        assert_eq!(stock(&shop).await, 10);

        assert!(shop.db.sales().cancel_layaway(&receipt.detail.sale.id, &shop.user, None).await.is_err());
    }

    #[tokio::test]
    async fn test_void_while_register_open() {
        let shop = shop().await;
        let receipt = shop
            .db
            .sales()
            .checkout(request(&shop, SaleType::Physical, PaymentMethod::Cash, 3000, 2))
            .await
            .unwrap();
        let id = receipt.detail.sale.id.clone();

        let voided = shop.db.sales().void(&id, &shop.user, Some("wrong size")).await.unwrap();
        assert_eq!(voided.sale.status, SaleStatus::Voided);
        assert_eq!(stock(&shop).await, 10);

        // Voided payments are left out of the drawer
        let report = shop.db.registers().close(&shop.store, &shop.user, 1000, None).await.unwrap();
        assert!(report.reconciliation.unwrap().is_balanced());
        assert_eq!(report.session.sales_count, 0);
        assert_eq!(report.sales.len(), 1);

        assert!(shop.db.sales().void(&id, &shop.user, None).await.is_err());
    }

    #[tokio::test]
    async fn test_void_refused_after_close() {
        let shop = shop().await;
        let receipt = shop
            .db
            .sales()
            .checkout(request(&shop, SaleType::Physical, PaymentMethod::Cash, 1500, 1))
            .await
            .unwrap();
        shop.db.registers().close(&shop.store, &shop.user, 2500, None).await.unwrap();

        let err = shop.db.sales().void(&receipt.detail.sale.id, &shop.user, None).await.unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::VoidNotAllowed { .. })));
        assert_eq!(stock(&shop).await, 9);
    }

    #[tokio::test]
    async fn test_close_reconciles_sales() {
        let shop = shop().await;
        let sales = shop.db.sales();
        sales
            .checkout(request(&shop, SaleType::Physical, PaymentMethod::Cash, 2000, 1))
            .await
            .unwrap();
        sales
            .checkout(request(&shop, SaleType::Physical, PaymentMethod::Card, 3000, 2))
            .await
            .unwrap();
        sales
            .checkout(request(&shop, SaleType::Layaway, PaymentMethod::Cash, 700, 1))
            .await
            .unwrap();

        // opening 1000 + cash 1500 + deposit 700 = 3200 expected
        let report = shop.db.registers().close(&shop.store, &shop.user, 3150, None).await.unwrap();
        let rec = report.reconciliation.unwrap();
        assert_eq!(rec.totals.cash.cents(), 2200);
        assert_eq!(rec.totals.card.cents(), 3000);
        assert_eq!(rec.expected_cash.cents(), 3200);
        assert_eq!(rec.difference.cents(), -50);
        assert_eq!(report.session.sales_count, 3);
        assert_eq!(report.session.sales_total_cents, 6000);
        assert_eq!(report.sales.len(), 3);
    }

    #[tokio::test]
    async fn test_amounts_bounded() {
        let shop = shop().await;
        let sales = shop.db.sales();

        let huge = request(&shop, SaleType::Physical, PaymentMethod::Cash, i64::MAX, 1);
        let err = sales.checkout(huge).await.unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::Validation(_))));

        let negative = request(&shop, SaleType::Physical, PaymentMethod::Cash, -1500, 1);
        assert!(sales.checkout(negative).await.is_err());
        assert_eq!(stock(&shop).await, 10);

        let receipt = sales
            .checkout(request(&shop, SaleType::Layaway, PaymentMethod::Cash, 500, 1))
            .await
            .unwrap();
        let id = receipt.detail.sale.id;
        for amount in [0, -100, vitrina_core::MAX_AMOUNT_CENTS + 1] {
            let err = sales.add_payment(&id, PaymentMethod::Cash, amount, &shop.user).await.unwrap_err();
            assert!(matches!(err, DbError::Core(CoreError::Validation(_))), "{amount}");
        }
        assert_eq!(sales.get_detail(&id).await.unwrap().payments.len(), 1);
    }

    #[tokio::test]
    async fn test_layaway_payment_counts_in_later_session() {
        let shop = shop().await;
        let receipt = shop
            .db
            .sales()
            .checkout(request(&shop, SaleType::Layaway, PaymentMethod::Cash, 500, 2))
            .await
            .unwrap();
        let id = receipt.detail.sale.id;

        let first = shop.db.registers().close(&shop.store, &shop.user, 1500, None).await.unwrap();
        assert!(first.reconciliation.unwrap().is_balanced());

        let second_session = shop.db.registers().open(&shop.store, &shop.user, 0, None).await.unwrap();
        let paid = shop
            .db
            .sales()
            .add_payment(&id, PaymentMethod::Cash, 1000, &shop.user)
            .await
            .unwrap();
        assert_eq!(paid.payments[1].register_session_id.as_deref(), Some(second_session.id.as_str()));

        let second = shop.db.registers().close(&shop.store, &shop.user, 1000, None).await.unwrap();
        let rec = second.reconciliation.unwrap();
        assert_eq!(rec.totals.cash.cents(), 1000);
        assert_eq!(rec.expected_cash.cents(), 1000);
        assert!(rec.is_balanced());
        assert_eq!(second.sales.len(), 1);
        assert_eq!(second.sales[0].id, id);
    }

    #[tokio::test]
    async fn test_cancelled_layaway_deposit_stays_in_drawer() {
        let shop = shop().await;
        let receipt = shop
            .db
            .sales()
            .checkout(request(&shop, SaleType::Layaway, PaymentMethod::Cash, 500, 1))
            .await
            .unwrap();
        shop.db
            .sales()
            .cancel_layaway(&receipt.detail.sale.id, &shop.user, Some("customer left"))
            .await
            .unwrap();

        // opening 1000 + the 500 deposit, which is not refunded
        let report = shop.db.registers().close(&shop.store, &shop.user, 1500, None).await.unwrap();
        let rec = report.reconciliation.unwrap();
        assert_eq!(rec.totals.cash.cents(), 500);
        assert!(rec.is_balanced());
        assert_eq!(report.sales.len(), 1);
        assert_eq!(report.sales[0].status, SaleStatus::Cancelled);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_checkouts_on_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let config = DbConfig::new(dir.path().join("vitrina.db")).max_connections(5);
        let db = Database::new(config).await.unwrap();
        let store = db.stores().create("Centro", None).await.unwrap().id;
        let user = user_at(&db, Some(&store)).await;
        let tee = product(&db, "TEE-M", &[(store.as_str(), 1000)]).await;
        db.registers().open(&store, &user, 0, None).await.unwrap();

        let handles: Vec<_> = (0..20)
            .map(|_| {
                let db = db.clone();
                let req = CheckoutRequest {
                    store_id: store.clone(),
                    user_id: user.clone(),
                    sale_type: SaleType::Physical,
                    customer_name: None,
                    payment_method: PaymentMethod::Card,
                    amount_cents: 1500,
                    lines: vec![LineRequest {
                        product_id: tee.clone(),
                        quantity: 1,
                    }],
                    notes: None,
                };
                tokio::spawn(async move { db.sales().checkout(req).await })
            })
            .collect();

        let mut receipts = std::collections::HashSet::new();
        for handle in handles {
            let receipt = handle.await.unwrap().unwrap();
            receipts.insert(receipt.detail.sale.receipt_number);
        }
        assert_eq!(receipts.len(), 20);

        let left = db.products().get_with_stock(&tee).await.unwrap().quantity_at(&store);
        assert_eq!(left, 980);

        db.close().await;
    }

    #[tokio::test]
    async fn test_list_filters() {
        let shop = shop().await;
        shop.db
            .sales()
            .checkout(request(&shop, SaleType::Physical, PaymentMethod::Cash, 1500, 1))
            .await
            .unwrap();
        shop.db
            .sales()
            .checkout(request(&shop, SaleType::Online, PaymentMethod::Card, 1500, 1))
            .await
            .unwrap();

        let online = shop
            .db
            .sales()
            .list(&SaleFilter {
                sale_type: Some(SaleType::Online),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(online.len(), 1);

        let all = shop
            .db
            .sales()
            .list(&SaleFilter {
                store_id: Some(shop.store.clone()),
                from: Some(Utc::now() - chrono::Duration::hours(1)),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(all.len(), 2);
    }
}
