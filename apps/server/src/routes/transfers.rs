//! Inter-store transfers (traslados).
//!
//! The origin store creates and may cancel; the destination store
//! validates. `all_stores` acts for either side.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use vitrina_core::permissions::can_access_store;
use vitrina_core::{LineRequest, Permission, Transfer, TransferDetail, TransferStatus};
use vitrina_db::{TransferDirection, TransferFilter};

use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, ApiQuery, Session};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/transfers", get(list_transfers).post(create_transfer))
        .route("/api/transfers/{id}", get(get_transfer))
        .route("/api/transfers/{id}/validate", post(validate_transfer))
        .route("/api/transfers/{id}/cancel", post(cancel_transfer))
}

const TRANSFER_USERS: [Permission; 2] = [Permission::CreateTransfers, Permission::ValidateTransfers];

#[derive(Debug, Deserialize)]
pub struct CreateTransferRequest {
    /// Defaults to the user's store.
    pub origin_store_id: Option<String>,
    pub destination_store_id: String,
    pub lines: Vec<LineRequest>,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListTransfersQuery {
    pub store_id: Option<String>,
    #[serde(default)]
    pub direction: TransferDirection,
    pub status: Option<TransferStatus>,
    pub limit: Option<u32>,
}

fn ensure_party(session: &Session, transfer: &Transfer) -> ApiResult<()> {
    let assigned = session.user.store_id.as_deref();
    let involved = [&transfer.origin_store_id, &transfer.destination_store_id]
        .iter()
        .any(|store| can_access_store(&session.permissions, assigned, store.as_str()));
    if involved {
        Ok(())
    } else {
        Err(ApiError::not_found("Transfer", &transfer.id))
    }
}

async fn create_transfer(
    State(state): State<AppState>,
    session: Session,
    ApiJson(req): ApiJson<CreateTransferRequest>,
) -> ApiResult<(StatusCode, Json<TransferDetail>)> {
    session.require(Permission::CreateTransfers)?;
    let origin = session.target_store(req.origin_store_id.as_deref())?;

    let detail = state
        .db
        .transfers()
        .create(
            &origin,
            &req.destination_store_id,
            &req.lines,
            session.user_id(),
            req.notes.as_deref(),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

async fn list_transfers(
    State(state): State<AppState>,
    session: Session,
    ApiQuery(query): ApiQuery<ListTransfersQuery>,
) -> ApiResult<Json<Vec<Transfer>>> {
    session.require_any(&TRANSFER_USERS)?;
    let store_id = session.store_scope(query.store_id.as_deref())?;
    let filter = TransferFilter {
        store_id,
        direction: query.direction,
        status: query.status,
        limit: query.limit.unwrap_or(0),
    };
    Ok(Json(state.db.transfers().list(&filter).await?))
}

async fn get_transfer(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
) -> ApiResult<Json<TransferDetail>> {
    session.require_any(&TRANSFER_USERS)?;
    let detail = state.db.transfers().get_detail(&id).await?;
    ensure_party(&session, &detail.transfer)?;
    Ok(Json(detail))
}

async fn validate_transfer(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
) -> ApiResult<Json<TransferDetail>> {
    session.require(Permission::ValidateTransfers)?;
    let transfer = state.db.transfers().require(&id).await?;
    session.ensure_store(&transfer.destination_store_id)?;

    Ok(Json(state.db.transfers().validate(&id, session.user_id()).await?))
}

async fn cancel_transfer(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
) -> ApiResult<Json<TransferDetail>> {
    session.require(Permission::CreateTransfers)?;
    let transfer = state.db.transfers().require(&id).await?;
    session.ensure_store(&transfer.origin_store_id)?;

    Ok(Json(state.db.transfers().cancel(&id, session.user_id()).await?))
}
