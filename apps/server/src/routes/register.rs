//! Register sessions (apertura / cierre de caja).

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use vitrina_core::register::RegisterReport;
use vitrina_core::{Permission, RegisterSession};

use crate::error::ApiResult;
use crate::extract::{ApiJson, ApiQuery, Session};
use crate::routes::DEFAULT_LIMIT;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/register/open", post(open_register))
        .route("/api/register/current", get(current_register))
        .route("/api/register/close", post(close_register))
        .route("/api/register/sessions", get(list_sessions))
        .route("/api/register/sessions/{id}", get(session_report))
}

#[derive(Debug, Deserialize)]
pub struct OpenRequest {
    pub store_id: Option<String>,
    pub opening_cents: i64,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CloseRequest {
    pub store_id: Option<String>,
    pub counted_cash_cents: i64,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StoreQuery {
    pub store_id: Option<String>,
    pub limit: Option<u32>,
}

async fn open_register(
    State(state): State<AppState>,
    session: Session,
    ApiJson(req): ApiJson<OpenRequest>,
) -> ApiResult<(StatusCode, Json<RegisterSession>)> {
    session.require(Permission::OpenRegister)?;
    let store_id = session.target_store(req.store_id.as_deref())?;

    let register = state
        .db
        .registers()
        .open(&store_id, session.user_id(), req.opening_cents, req.notes.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(register)))
}

/// The open session of a store with its running totals, or `null`.
async fn current_register(
    State(state): State<AppState>,
    session: Session,
    ApiQuery(query): ApiQuery<StoreQuery>,
) -> ApiResult<Json<Option<RegisterReport>>> {
    let store_id = session.target_store(query.store_id.as_deref())?;
    let report = match state.db.registers().current(&store_id).await? {
        Some(open) => Some(state.db.registers().report(&open.id).await?),
        None => None,
    };
    Ok(Json(report))
}

async fn close_register(
    State(state): State<AppState>,
    session: Session,
    ApiJson(req): ApiJson<CloseRequest>,
) -> ApiResult<Json<RegisterReport>> {
    session.require(Permission::CloseRegister)?;
    let store_id = session.target_store(req.store_id.as_deref())?;

    let report = state
        .db
        .registers()
        .close(&store_id, session.user_id(), req.counted_cash_cents, req.notes.as_deref())
        .await?;
    Ok(Json(report))
}

async fn list_sessions(
    State(state): State<AppState>,
    session: Session,
    ApiQuery(query): ApiQuery<StoreQuery>,
) -> ApiResult<Json<Vec<RegisterSession>>> {
    session.require_any(&[Permission::CloseRegister, Permission::ViewReports])?;
    let scope = session.store_scope(query.store_id.as_deref())?;
    let sessions = state
        .db
        .registers()
        .list(scope.as_deref(), query.limit.unwrap_or(DEFAULT_LIMIT))
        .await?;
    Ok(Json(sessions))
}

async fn session_report(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
) -> ApiResult<Json<RegisterReport>> {
    session.require_any(&[Permission::CloseRegister, Permission::ViewReports])?;
    let report = state.db.registers().report(&id).await?;
    session.ensure_store(&report.session.store_id)?;
    Ok(Json(report))
}
