//! # Sales Report
//!
//! Aggregates sales and payments of a date range into the summary the
//! reports page shows. Export to files is left to the client.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::types::{PaymentMethod, SaleStatus, SaleType};

/// Maximum products listed in [`SalesSummary::top_products`].
pub const TOP_PRODUCTS: usize = 10;

/// A sold line, as far as the report is concerned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoldLine {
    pub product_id: String,
    pub code: String,
    pub description: String,
    pub quantity: i64,
    pub line_total_cents: i64,
}

/// A sale as fed into the report.
#[derive(Debug, Clone)]
pub struct SaleRecord {
    pub sale_id: String,
    pub sale_type: SaleType,
    pub status: SaleStatus,
    pub total_cents: i64,
    pub paid_cents: i64,
    pub created_at: DateTime<Utc>,
    pub lines: Vec<SoldLine>,
}

/// A payment as fed into the report.
#[derive(Debug, Clone)]
pub struct PaymentRecord {
    pub sale_id: String,
    pub method: PaymentMethod,
    pub amount_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct MethodTotal {
    pub method: PaymentMethod,
    pub total_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleTypeTotal {
    pub sale_type: SaleType,
    pub count: i64,
    pub total_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DayTotal {
    #[ts(as = "String")]
    pub date: NaiveDate,
    pub count: i64,
    pub total_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProductTotal {
    pub product_id: String,
    pub code: String,
    pub description: String,
    pub quantity: i64,
    pub total_cents: i64,
}

/// Summary of a range of sales.
///
/// Voided and cancelled sales are only counted; their amounts and the
/// payments taken for them stay out of every total.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SalesSummary {
    pub sale_count: i64,
    pub gross_cents: i64,
    pub collected_cents: i64,
    pub outstanding_layaway_cents: i64,
    pub voided_count: i64,
    pub cancelled_count: i64,
    pub by_payment_method: Vec<MethodTotal>,
    pub by_sale_type: Vec<SaleTypeTotal>,
    pub by_day: Vec<DayTotal>,
    pub top_products: Vec<ProductTotal>,
}

impl SalesSummary {
    pub fn from_records(sales: &[SaleRecord], payments: &[PaymentRecord]) -> Self {
        let mut summary = SalesSummary::default();
        let mut counted: HashSet<&str> = HashSet::new();
        let mut by_type: BTreeMap<SaleType, (i64, i64)> = BTreeMap::new();
        let mut by_day: BTreeMap<NaiveDate, (i64, i64)> = BTreeMap::new();
        let mut by_product: BTreeMap<&str, ProductTotal> = BTreeMap::new();

        for sale in sales {
            match sale.status {
                SaleStatus::Voided => {
                    summary.voided_count += 1;
                    continue;
                }
                SaleStatus::Cancelled => {
                    summary.cancelled_count += 1;
                    continue;
                }
                SaleStatus::Completed | SaleStatus::Layaway => {}
            }

            counted.insert(sale.sale_id.as_str());
            summary.sale_count += 1;
            summary.gross_cents += sale.total_cents;
            if sale.status == SaleStatus::Layaway {
                summary.outstanding_layaway_cents += (sale.total_cents - sale.paid_cents).max(0);
            }

            let t = by_type.entry(sale.sale_type).or_default();
            t.0 += 1;
            t.1 += sale.total_cents;

            let d = by_day.entry(sale.created_at.date_naive()).or_default();
            d.0 += 1;
            d.1 += sale.total_cents;

            for line in &sale.lines {
                let p = by_product
                    .entry(line.product_id.as_str())
                    .or_insert_with(|| ProductTotal {
                        product_id: line.product_id.clone(),
                        code: line.code.clone(),
                        description: line.description.clone(),
                        quantity: 0,
                        total_cents: 0,
                    });
                p.quantity += line.quantity;
                p.total_cents += line.line_total_cents;
            }
        }

        let mut by_method: BTreeMap<PaymentMethod, Money> = BTreeMap::new();
        for payment in payments
            .iter()
            .filter(|p| counted.contains(p.sale_id.as_str()))
        {
            *by_method.entry(payment.method).or_default() += Money::from_cents(payment.amount_cents);
        }
        summary.collected_cents = by_method.values().copied().sum::<Money>().cents();

        summary.by_payment_method = by_method
            .into_iter()
            .map(|(method, total)| MethodTotal {
                method,
                total_cents: total.cents(),
            })
            .collect();
        summary.by_sale_type = by_type
            .into_iter()
            .map(|(sale_type, (count, total_cents))| SaleTypeTotal {
                sale_type,
                count,
                total_cents,
            })
            .collect();
        summary.by_day = by_day
            .into_iter()
            .map(|(date, (count, total_cents))| DayTotal {
                date,
                count,
                total_cents,
            })
            .collect();

        let mut products: Vec<ProductTotal> = by_product.into_values().collect();
        products.sort_by(|a, b| {
            b.quantity
                .cmp(&a.quantity)
                .then_with(|| b.total_cents.cmp(&a.total_cents))
                .then_with(|| a.code.cmp(&b.code))
        });
        products.truncate(TOP_PRODUCTS);
        summary.top_products = products;

        summary
    }
}

// =============================================================================
// Inventory
// =============================================================================

/// Stock of one product at one store, with its prices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct InventoryLine {
    pub product_id: String,
    pub code: String,
    pub description: String,
    pub size: Option<String>,
    pub color: Option<String>,
    pub store_id: String,
    pub store_name: String,
    pub quantity: i64,
    pub price_cents: i64,
    pub cost_cents: Option<i64>,
}

/// Stock valuation over a set of inventory lines.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct InventoryReport {
    pub lines: Vec<InventoryLine>,
    pub total_units: i64,
    /// Quantity × price.
    pub retail_value_cents: i64,
    /// Quantity × cost, for lines with a known cost.
    pub cost_value_cents: i64,
    /// Lines whose product has no cost recorded.
    pub lines_without_cost: i64,
}

impl InventoryReport {
    pub fn from_lines(lines: Vec<InventoryLine>) -> Self {
        let mut report = InventoryReport::default();
        for line in &lines {
            report.total_units += line.quantity;
            report.retail_value_cents += line.quantity * line.price_cents;
            match line.cost_cents {
                Some(cost) => report.cost_value_cents += line.quantity * cost,
                None => report.lines_without_cost += 1,
            }
        }
        report.lines = lines;
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sale(id: &str, sale_type: SaleType, status: SaleStatus, total: i64, paid: i64, day: u32) -> SaleRecord {
        SaleRecord {
            sale_id: id.to_string(),
            sale_type,
            status,
            total_cents: total,
            paid_cents: paid,
            created_at: Utc.with_ymd_and_hms(2024, 5, day, 12, 0, 0).unwrap(),
            lines: vec![SoldLine {
                product_id: format!("p-{}", id),
                code: format!("C-{}", id),
                description: "Item".to_string(),
                quantity: total / 100,
                line_total_cents: total,
            }],
        }
    }

    fn pay(sale_id: &str, method: PaymentMethod, amount: i64) -> PaymentRecord {
        PaymentRecord {
            sale_id: sale_id.to_string(),
            method,
            amount_cents: amount,
        }
    }

    #[test]
    fn test_summary_excludes_voided_and_cancelled() {
        let sales = vec![
            sale("a", SaleType::Physical, SaleStatus::Completed, 1000, 1000, 1),
            sale("b", SaleType::Online, SaleStatus::Completed, 500, 500, 1),
            sale("c", SaleType::Layaway, SaleStatus::Layaway, 2000, 600, 2),
            sale("d", SaleType::Physical, SaleStatus::Voided, 700, 700, 2),
            sale("e", SaleType::Layaway, SaleStatus::Cancelled, 900, 100, 2),
        ];
        let payments = vec![
            pay("a", PaymentMethod::Cash, 1000),
            pay("b", PaymentMethod::Transfer, 500),
            pay("c", PaymentMethod::Card, 600),
            pay("d", PaymentMethod::Cash, 700),
            pay("e", PaymentMethod::Cash, 100),
        ];

        let s = SalesSummary::from_records(&sales, &payments);
        assert_eq!(s.sale_count, 3);
        assert_eq!(s.gross_cents, 3500);
        assert_eq!(s.collected_cents, 2100);
        assert_eq!(s.outstanding_layaway_cents, 1400);
        assert_eq!(s.voided_count, 1);
        assert_eq!(s.cancelled_count, 1);

        let cash = s
            .by_payment_method
            .iter()
            .find(|m| m.method == PaymentMethod::Cash)
            .unwrap();
        assert_eq!(cash.total_cents, 1000);

        assert_eq!(s.by_day.len(), 2);
        assert_eq!(s.by_day[1].total_cents, 2000);
        assert_eq!(s.by_sale_type.len(), 3);
        assert_eq!(s.top_products[0].product_id, "p-c");
    }

    #[test]
    fn test_inventory_valuation() {
        let line = |qty: i64, price: i64, cost: Option<i64>| InventoryLine {
            product_id: "p".into(),
            code: "C".into(),
            description: "D".into(),
            size: None,
            color: None,
            store_id: "s".into(),
            store_name: "Centro".into(),
            quantity: qty,
            price_cents: price,
            cost_cents: cost,
        };
        let report = InventoryReport::from_lines(vec![line(3, 1000, Some(600)), line(2, 500, None)]);
        assert_eq!(report.total_units, 5);
        assert_eq!(report.retail_value_cents, 4000);
        assert_eq!(report.cost_value_cents, 1800);
        assert_eq!(report.lines_without_cost, 1);
    }

    #[test]
    fn test_empty_range() {
        let s = SalesSummary::from_records(&[], &[]);
        assert_eq!(s, SalesSummary::default());
    }
}
