//! Checkout and the sale lifecycle.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::info;
use vitrina_core::{
    CoreError, Permission, PaymentMethod, Sale, SaleDetail, SaleStatus, SaleType,
};
use vitrina_db::{day_range, CheckoutReceipt, CheckoutRequest, SaleFilter};

use crate::error::ApiResult;
use crate::extract::{ApiJson, ApiQuery, Session};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/sales", get(list_sales).post(checkout))
        .route("/api/sales/{id}", get(get_sale))
        .route("/api/sales/{id}/payments", post(add_payment))
        .route("/api/sales/{id}/void", post(void_sale))
        .route("/api/sales/{id}/cancel", post(cancel_layaway))
}

/// Who may look at sales at all.
const SALES_READERS: [Permission; 5] = [
    Permission::Sell,
    Permission::SellOnline,
    Permission::SellLayaway,
    Permission::VoidSales,
    Permission::ViewReports,
];

#[derive(Debug, Deserialize)]
pub struct CheckoutBody {
    pub sale_type: SaleType,
    /// Defaults to the user's store.
    pub store_id: Option<String>,
    pub customer_name: Option<String>,
    pub payment_method: PaymentMethod,
    /// Cash tendered for in-full sales, the deposit for layaways.
    pub amount_cents: i64,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PaymentBody {
    pub payment_method: PaymentMethod,
    pub amount_cents: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReasonBody {
    pub reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListSalesQuery {
    pub store_id: Option<String>,
    pub sale_type: Option<SaleType>,
    pub status: Option<SaleStatus>,
    /// Inclusive day range.
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub limit: Option<u32>,
}

/// Turns the caller's cart into a sale. The cart is kept when checkout
/// fails and cleared when it succeeds.
async fn checkout(
    State(state): State<AppState>,
    session: Session,
    ApiJson(body): ApiJson<CheckoutBody>,
) -> ApiResult<(StatusCode, Json<CheckoutReceipt>)> {
    session.require(body.sale_type.required_permission())?;
    let store_id = session.target_store(body.store_id.as_deref())?;

    let lines = state.carts.with_cart(session.user_id(), |cart| cart.lines());
    if lines.is_empty() {
        return Err(CoreError::EmptyCart.into());
    }

    let receipt = state
        .db
        .sales()
        .checkout(CheckoutRequest {
            store_id,
            user_id: session.user_id().to_string(),
            sale_type: body.sale_type,
            customer_name: body.customer_name,
            payment_method: body.payment_method,
            amount_cents: body.amount_cents,
            lines,
            notes: body.notes,
        })
        .await?;

    state.carts.clear(session.user_id());
    info!(
        user = %session.user.username,
        receipt = %receipt.detail.sale.receipt_number,
        "Checkout complete"
    );
    Ok((StatusCode::CREATED, Json(receipt)))
}

async fn list_sales(
    State(state): State<AppState>,
    session: Session,
    ApiQuery(query): ApiQuery<ListSalesQuery>,
) -> ApiResult<Json<Vec<Sale>>> {
    session.require_any(&SALES_READERS)?;
    let store_id = session.store_scope(query.store_id.as_deref())?;

    let (from, to) = match (query.from, query.to) {
        (Some(from), Some(to)) => {
            let (start, end) = day_range(from, to)?;
            (Some(start), Some(end))
        }
        (Some(from), None) => (Some(day_range(from, from)?.0), None),
        (None, Some(to)) => (None, Some(day_range(to, to)?.1)),
        (None, None) => (None, None),
    };

    let filter = SaleFilter {
        store_id,
        sale_type: query.sale_type,
        status: query.status,
        from,
        to,
        limit: query.limit.unwrap_or(0),
    };
    Ok(Json(state.db.sales().list(&filter).await?))
}

async fn get_sale(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
) -> ApiResult<Json<SaleDetail>> {
    session.require_any(&SALES_READERS)?;
    let detail = state.db.sales().get_detail(&id).await?;
    session.ensure_store(&detail.sale.store_id)?;
    Ok(Json(detail))
}

/// A further deposit (abono) on a layaway.
async fn add_payment(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<PaymentBody>,
) -> ApiResult<Json<SaleDetail>> {
    session.require(Permission::SellLayaway)?;
    let sale = state.db.sales().require(&id).await?;
    session.ensure_store(&sale.store_id)?;

    let detail = state
        .db
        .sales()
        .add_payment(&id, body.payment_method, body.amount_cents, session.user_id())
        .await?;
    Ok(Json(detail))
}

async fn void_sale(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
    body: Option<ApiJson<ReasonBody>>,
) -> ApiResult<Json<SaleDetail>> {
    session.require(Permission::VoidSales)?;
    let sale = state.db.sales().require(&id).await?;
    session.ensure_store(&sale.store_id)?;

    let reason = body.and_then(|ApiJson(b)| b.reason);
    let detail = state
        .db
        .sales()
        .void(&id, session.user_id(), reason.as_deref())
        .await?;
    Ok(Json(detail))
}

async fn cancel_layaway(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
    body: Option<ApiJson<ReasonBody>>,
) -> ApiResult<Json<SaleDetail>> {
    session.require(Permission::VoidSales)?;
    let sale = state.db.sales().require(&id).await?;
    session.ensure_store(&sale.store_id)?;

    let reason = body.and_then(|ApiJson(b)| b.reason);
    let detail = state
        .db
        .sales()
        .cancel_layaway(&id, session.user_id(), reason.as_deref())
        .await?;
    Ok(Json(detail))
}
