use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use vitrina_core::report::{InventoryReport, SalesSummary};
use vitrina_core::Permission;

use crate::error::ApiResult;
use crate::extract::{ApiQuery, Session};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/reports/sales", get(sales_report))
        .route("/api/reports/inventory", get(inventory_report))
}

/// Both dates are inclusive and default to today (UTC).
#[derive(Debug, Default, Deserialize)]
pub struct SalesReportQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub store_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct InventoryReportQuery {
    pub store_id: Option<String>,
}

async fn sales_report(
    State(state): State<AppState>,
    session: Session,
    ApiQuery(query): ApiQuery<SalesReportQuery>,
) -> ApiResult<Json<SalesSummary>> {
    session.require(Permission::ViewReports)?;
    let scope = session.store_scope(query.store_id.as_deref())?;

    let today = Utc::now().date_naive();
    let to = query.to.unwrap_or(today);
    let from = query.from.unwrap_or(to);

    let summary = state
        .db
        .reports()
        .sales_summary(from, to, scope.as_deref())
        .await?;
    Ok(Json(summary))
}

async fn inventory_report(
    State(state): State<AppState>,
    session: Session,
    ApiQuery(query): ApiQuery<InventoryReportQuery>,
) -> ApiResult<Json<InventoryReport>> {
    session.require(Permission::ViewReports)?;
    let scope = session.store_scope(query.store_id.as_deref())?;
    Ok(Json(state.db.reports().inventory(scope.as_deref()).await?))
}
