//! Supplier invoices (stock intake).

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::Deserialize;
use vitrina_core::{Invoice, InvoiceDetail, InvoiceLineRequest, InvoiceStatus, Permission};
use vitrina_db::NewInvoice;

use crate::error::ApiResult;
use crate::extract::{ApiJson, ApiQuery, Session};
use crate::routes::DEFAULT_LIMIT;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/invoices", get(list_invoices).post(create_invoice))
        .route("/api/invoices/{id}", get(get_invoice))
        .route("/api/invoices/{id}/receive", post(receive_invoice))
        .route("/api/invoices/{id}/cancel", post(cancel_invoice))
}

#[derive(Debug, Default, Deserialize)]
pub struct ListInvoicesQuery {
    pub store_id: Option<String>,
    pub status: Option<InvoiceStatus>,
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct CreateInvoiceRequest {
    pub number: String,
    pub supplier: String,
    pub invoice_date: NaiveDate,
    /// Defaults to the user's store.
    pub store_id: Option<String>,
    pub lines: Vec<InvoiceLineRequest>,
    pub notes: Option<String>,
}

async fn list_invoices(
    State(state): State<AppState>,
    session: Session,
    ApiQuery(query): ApiQuery<ListInvoicesQuery>,
) -> ApiResult<Json<Vec<Invoice>>> {
    session.require(Permission::ReceiveInvoices)?;
    let scope = session.store_scope(query.store_id.as_deref())?;
    let invoices = state
        .db
        .invoices()
        .list(scope.as_deref(), query.status, query.limit.unwrap_or(DEFAULT_LIMIT))
        .await?;
    Ok(Json(invoices))
}

async fn create_invoice(
    State(state): State<AppState>,
    session: Session,
    ApiJson(req): ApiJson<CreateInvoiceRequest>,
) -> ApiResult<(StatusCode, Json<InvoiceDetail>)> {
    session.require(Permission::ReceiveInvoices)?;
    let store_id = session.target_store(req.store_id.as_deref())?;

    let detail = state
        .db
        .invoices()
        .create(
            NewInvoice {
                number: req.number,
                supplier: req.supplier,
                invoice_date: req.invoice_date,
                store_id,
                lines: req.lines,
                notes: req.notes,
            },
            session.user_id(),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

async fn get_invoice(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
) -> ApiResult<Json<InvoiceDetail>> {
    session.require(Permission::ReceiveInvoices)?;
    let detail = state.db.invoices().get_detail(&id).await?;
    session.ensure_store(&detail.invoice.store_id)?;
    Ok(Json(detail))
}

async fn receive_invoice(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
) -> ApiResult<Json<InvoiceDetail>> {
    session.require(Permission::ReceiveInvoices)?;
    let invoice = state.db.invoices().require(&id).await?;
    session.ensure_store(&invoice.store_id)?;
    Ok(Json(state.db.invoices().receive(&id, session.user_id()).await?))
}

async fn cancel_invoice(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
) -> ApiResult<Json<Invoice>> {
    session.require(Permission::ReceiveInvoices)?;
    let invoice = state.db.invoices().require(&id).await?;
    session.ensure_store(&invoice.store_id)?;
    Ok(Json(state.db.invoices().cancel(&id).await?))
}
