//! Role administration.
//!
//! Roles can only be created, edited or deleted by a caller who holds every
//! permission involved.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use vitrina_core::{Permission, Role};

use crate::error::ApiResult;
use crate::extract::{ApiJson, Session};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/permissions", get(list_permissions))
        .route("/api/roles", get(list_roles).post(create_role))
        .route(
            "/api/roles/{id}",
            get(get_role).put(update_role).delete(delete_role),
        )
}

#[derive(Debug, Deserialize)]
pub struct CreateRoleRequest {
    pub name: String,
    #[serde(default)]
    pub permissions: Vec<Permission>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRoleRequest {
    pub name: Option<String>,
    pub permissions: Option<Vec<Permission>>,
}

/// Every grantable permission, for the role editor.
async fn list_permissions(session: Session) -> ApiResult<Json<Vec<Permission>>> {
    session.require_any(&[Permission::ManageRoles, Permission::ManageUsers])?;
    Ok(Json(Permission::ALL.to_vec()))
}

/// Readable by user managers too, who need it to assign roles.
async fn list_roles(State(state): State<AppState>, session: Session) -> ApiResult<Json<Vec<Role>>> {
    session.require_any(&[Permission::ManageRoles, Permission::ManageUsers])?;
    Ok(Json(state.db.roles().list().await?))
}

async fn create_role(
    State(state): State<AppState>,
    session: Session,
    ApiJson(req): ApiJson<CreateRoleRequest>,
) -> ApiResult<(StatusCode, Json<Role>)> {
    session.require(Permission::ManageRoles)?;
    session.ensure_grantable(&req.permissions)?;
    let role = state.db.roles().create(&req.name, &req.permissions).await?;
    Ok((StatusCode::CREATED, Json(role)))
}

async fn get_role(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
) -> ApiResult<Json<Role>> {
    session.require_any(&[Permission::ManageRoles, Permission::ManageUsers])?;
    Ok(Json(state.db.roles().require(&id).await?))
}

async fn update_role(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<UpdateRoleRequest>,
) -> ApiResult<Json<Role>> {
    session.require(Permission::ManageRoles)?;
    let current = state.db.roles().require(&id).await?;
    session.ensure_grantable(&current.permissions)?;
    if let Some(permissions) = req.permissions.as_deref() {
        session.ensure_grantable(permissions)?;
    }
    let role = state
        .db
        .roles()
        .update(&id, req.name.as_deref(), req.permissions.as_deref())
        .await?;
    Ok(Json(role))
}

async fn delete_role(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    session.require(Permission::ManageRoles)?;
    let current = state.db.roles().require(&id).await?;
    session.ensure_grantable(&current.permissions)?;
    state.db.roles().delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
