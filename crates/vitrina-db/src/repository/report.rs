//! # Report Repository
//!
//! Loads the rows behind the sales and inventory reports; the arithmetic
//! lives in `vitrina_core::report`.

use std::collections::HashMap;

use chrono::{DateTime, Days, NaiveDate, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use super::product::ProductRepository;
use crate::error::DbResult;
use vitrina_core::report::{InventoryReport, PaymentRecord, SaleRecord, SalesSummary, SoldLine};
use vitrina_core::{Payment, Sale, SaleItem, ValidationError};

#[derive(Debug, Clone)]
pub struct ReportRepository {
    pool: SqlitePool,
}

/// `[from, to]` as a half-open UTC range `[from 00:00, to + 1 day 00:00)`.
pub fn day_range(from: NaiveDate, to: NaiveDate) -> Result<(DateTime<Utc>, DateTime<Utc>), ValidationError> {
    if from > to {
        return Err(ValidationError::InvalidFormat {
            field: "date range".to_string(),
            reason: format!("{} is after {}", from, to),
        });
    }
    let end = to.checked_add_days(Days::new(1)).ok_or_else(|| ValidationError::InvalidFormat {
        field: "to".to_string(),
        reason: "date out of range".to_string(),
    })?;
    Ok((
        from.and_time(chrono::NaiveTime::MIN).and_utc(),
        end.and_time(chrono::NaiveTime::MIN).and_utc(),
    ))
}

impl ReportRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ReportRepository { pool }
    }

    /// Sales summary for the days `from..=to`, at one store or all of them.
    pub async fn sales_summary(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        store_id: Option<&str>,
    ) -> DbResult<SalesSummary> {
        let (start, end) = day_range(from, to)?;
        debug!(%from, %to, store_id = ?store_id, "Building sales report");

        let sales = sqlx::query_as::<_, Sale>(
            r#"
            SELECT * FROM sales
            WHERE created_at >= ?1 AND created_at < ?2
              AND (?3 IS NULL OR store_id = ?3)
            ORDER BY created_at
            "#,
        )
        .bind(start)
        .bind(end)
        .bind(store_id)
        .fetch_all(&self.pool)
        .await?;

        let items = sqlx::query_as::<_, SaleItem>(
            r#"
            SELECT i.* FROM sale_items i
            JOIN sales s ON s.id = i.sale_id
            WHERE s.created_at >= ?1 AND s.created_at < ?2
              AND (?3 IS NULL OR s.store_id = ?3)
            "#,
        )
        .bind(start)
        .bind(end)
        .bind(store_id)
        .fetch_all(&self.pool)
        .await?;

        let payments = sqlx::query_as::<_, Payment>(
            r#"
            SELECT p.* FROM payments p
            JOIN sales s ON s.id = p.sale_id
            WHERE s.created_at >= ?1 AND s.created_at < ?2
              AND (?3 IS NULL OR s.store_id = ?3)
            "#,
        )
        .bind(start)
        .bind(end)
        .bind(store_id)
        .fetch_all(&self.pool)
        .await?;

        let mut lines: HashMap<String, Vec<SoldLine>> = HashMap::new();
        for item in items {
            lines.entry(item.sale_id).or_default().push(SoldLine {
                product_id: item.product_id,
                code: item.code_snapshot,
                description: item.description_snapshot,
                quantity: item.quantity,
                line_total_cents: item.line_total_cents,
            });
        }

        let records: Vec<SaleRecord> = sales
            .into_iter()
            .map(|sale| SaleRecord {
                lines: lines.remove(&sale.id).unwrap_or_default(),
                sale_id: sale.id,
                sale_type: sale.sale_type,
                status: sale.status,
                total_cents: sale.total_cents,
                paid_cents: sale.paid_cents,
                created_at: sale.created_at,
            })
            .collect();

        let payments: Vec<PaymentRecord> = payments
            .into_iter()
            .map(|p| PaymentRecord {
                sale_id: p.sale_id,
                method: p.method,
                amount_cents: p.amount_cents,
            })
            .collect();

        Ok(SalesSummary::from_records(&records, &payments))
    }

    /// Stock valuation at one store or all of them.
    pub async fn inventory(&self, store_id: Option<&str>) -> DbResult<InventoryReport> {
        let lines = ProductRepository::new(self.pool.clone())
            .inventory(store_id)
            .await?;
        Ok(InventoryReport::from_lines(lines))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::sale::CheckoutRequest;
    use crate::test_support::{product, user_at};
    use crate::{Database, DbConfig, DbError};
    use vitrina_core::{LineRequest, PaymentMethod, SaleType};

    #[test]
    fn test_day_range() {
        let d = |day| NaiveDate::from_ymd_opt(2024, 5, day).unwrap();
        let (start, end) = day_range(d(1), d(3)).unwrap();
        assert_eq!(start.to_rfc3339(), "2024-05-01T00:00:00+00:00");
        assert_eq!(end.to_rfc3339(), "2024-05-04T00:00:00+00:00");
        assert!(day_range(d(3), d(1)).is_err());
    }

    #[tokio::test]
    async fn test_sales_summary_today() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let store = db.stores().create("Centro", None).await.unwrap().id;
        let user = user_at(&db, Some(&store)).await;
        let tee = product(&db, "TEE-M", &[(store.as_str(), 10)]).await;
        db.registers().open(&store, &user, 0, None).await.unwrap();

        let sell = |sale_type, amount, quantity| CheckoutRequest {
            store_id: store.clone(),
            user_id: user.clone(),
            sale_type,
            customer_name: None,
            payment_method: PaymentMethod::Cash,
            amount_cents: amount,
            lines: vec![LineRequest {
                product_id: tee.clone(),
                quantity,
            }],
            notes: None,
        };

        db.sales().checkout(sell(SaleType::Physical, 3000, 2)).await.unwrap();
        db.sales().checkout(sell(SaleType::Layaway, 500, 1)).await.unwrap();
        let voided = db.sales().checkout(sell(SaleType::Physical, 1500, 1)).await.unwrap();
        db.sales().void(&voided.detail.sale.id, &user, None).await.unwrap();

        let today = Utc::now().date_naive();
        let summary = db.reports().sales_summary(today, today, Some(&store)).await.unwrap();
        assert_eq!(summary.sale_count, 2);
        assert_eq!(summary.gross_cents, 4500);
        assert_eq!(summary.collected_cents, 3500);
        assert_eq!(summary.outstanding_layaway_cents, 1000);
        assert_eq!(summary.voided_count, 1);
        assert_eq!(summary.top_products[0].quantity, 3);

        let yesterday = today.pred_opt().unwrap();
        let empty = db.reports().sales_summary(yesterday, yesterday, None).await.unwrap();
        assert_eq!(empty, SalesSummary::default());

        let err = db.reports().sales_summary(today, yesterday, None).await.unwrap_err();
        assert!(matches!(err, DbError::Core(_)));
    }

    #[tokio::test]
    async fn test_inventory_report() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let centro = db.stores().create("Centro", None).await.unwrap().id;
        let norte = db.stores().create("Norte", None).await.unwrap().id;
        product(&db, "TEE-M", &[(centro.as_str(), 3), (norte.as_str(), 2)]).await;

        let all = db.reports().inventory(None).await.unwrap();
        assert_eq!(all.total_units, 5);
        assert_eq!(all.retail_value_cents, 5 * 1500);

        let centro_only = db.reports().inventory(Some(&centro)).await.unwrap();
        assert_eq!(centro_only.lines.len(), 1);
        assert_eq!(centro_only.total_units, 3);
    }
}
