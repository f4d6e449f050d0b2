//! User administration.
//!
//! A user manager can only hand out permissions they hold themselves, only
//! manages users whose permissions they also hold, and without `all_stores`
//! only manages the users of their own store.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, put};
use axum::{Json, Router};
use serde::Deserialize;
use vitrina_core::{Permission, User};
use vitrina_db::{NewUser, UserUpdate};

use crate::auth::{hash_password_blocking, verify_password_blocking};
use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, ApiQuery, Session};
use crate::routes::stores::double_option;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/users", get(list_users).post(create_user))
        .route("/api/users/{id}", get(get_user).put(update_user))
        .route("/api/users/{id}/password", put(change_password))
        .route("/api/users/{id}/enabled", put(set_enabled))
}

#[derive(Debug, Default, Deserialize)]
pub struct ListUsersQuery {
    pub store_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub password: String,
    pub display_name: String,
    pub role_id: String,
    pub store_id: Option<String>,
    #[serde(default)]
    pub extra_permissions: Vec<Permission>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub display_name: Option<String>,
    pub role_id: Option<String>,
    #[serde(default, with = "double_option")]
    pub store_id: Option<Option<String>>,
    pub extra_permissions: Option<Vec<Permission>>,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    /// Needed when users change their own password without `manage_users`.
    pub current_password: Option<String>,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct EnabledRequest {
    pub enabled: bool,
}

async fn ensure_role_grantable(state: &AppState, session: &Session, role_id: &str) -> ApiResult<()> {
    let role = state.db.roles().require(role_id).await?;
    session.ensure_grantable(&role.permissions)
}

/// Loads a user the caller may see: any user with `all_stores`, otherwise
/// the users of the caller's store.
async fn visible_user(state: &AppState, session: &Session, id: &str) -> ApiResult<User> {
    let user = state.db.users().require(id).await?;
    if !session.permissions.contains(Permission::AllStores) && user.store_id != session.user.store_id {
        return Err(ApiError::not_found("User", id));
    }
    Ok(user)
}

/// Loads a user the caller may manage. Besides being visible, the target
/// may not hold a permission the caller lacks.
async fn managed_user(state: &AppState, session: &Session, id: &str) -> ApiResult<User> {
    let user = visible_user(state, session, id).await?;
    let role = state.db.roles().require(&user.role_id).await?;
    session.ensure_grantable(&user.effective_permissions(&role).to_vec())?;
    Ok(user)
}

async fn list_users(
    State(state): State<AppState>,
    session: Session,
    ApiQuery(query): ApiQuery<ListUsersQuery>,
) -> ApiResult<Json<Vec<User>>> {
    session.require(Permission::ManageUsers)?;
    let scope = session.store_scope(query.store_id.as_deref())?;
    Ok(Json(state.db.users().list(scope.as_deref()).await?))
}

async fn create_user(
    State(state): State<AppState>,
    session: Session,
    ApiJson(req): ApiJson<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<User>)> {
    session.require(Permission::ManageUsers)?;
    match req.store_id.as_deref() {
        Some(store_id) => {
            session.ensure_store(store_id)?;
            state.db.stores().require(store_id).await?;
        }
        None => session.require(Permission::AllStores)?,
    }
    session.ensure_grantable(&req.extra_permissions)?;
    ensure_role_grantable(&state, &session, &req.role_id).await?;

    let password_hash = hash_password_blocking(req.password).await?;
    let user = state
        .db
        .users()
        .create(NewUser {
            username: req.username,
            password_hash,
            display_name: req.display_name,
            role_id: req.role_id,
            store_id: req.store_id,
            extra_permissions: req.extra_permissions,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(user)))
}

async fn get_user(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
) -> ApiResult<Json<User>> {
    if id != session.user_id() {
        session.require(Permission::ManageUsers)?;
    }
    Ok(Json(visible_user(&state, &session, &id).await?))
}

async fn update_user(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<UpdateUserRequest>,
) -> ApiResult<Json<User>> {
    session.require(Permission::ManageUsers)?;
    managed_user(&state, &session, &id).await?;

    if let Some(role_id) = req.role_id.as_deref() {
        ensure_role_grantable(&state, &session, role_id).await?;
    }
    if let Some(extra) = req.extra_permissions.as_deref() {
        session.ensure_grantable(extra)?;
    }
    match &req.store_id {
        Some(Some(store_id)) => {
            session.ensure_store(store_id)?;
            state.db.stores().require(store_id).await?;
        }
        Some(None) => session.require(Permission::AllStores)?,
        None => {}
    }

    let user = state
        .db
        .users()
        .update(
            &id,
            UserUpdate {
                display_name: req.display_name,
                role_id: req.role_id,
                store_id: req.store_id,
                extra_permissions: req.extra_permissions,
            },
        )
        .await?;
    Ok(Json(user))
}

async fn change_password(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<ChangePasswordRequest>,
) -> ApiResult<StatusCode> {
    if session.permissions.contains(Permission::ManageUsers) {
        managed_user(&state, &session, &id).await?;
    } else if id == session.user_id() {
        let current = req
            .current_password
            .as_deref()
            .ok_or_else(|| ApiError::validation("current_password is required"))?;
        let (_, hash) = state
            .db
            .users()
            .find_credentials(&session.user.username)
            .await?
            .ok_or_else(|| ApiError::not_found("User", &id))?;
        if !verify_password_blocking(current.to_string(), hash).await? {
            return Err(ApiError::invalid_credentials());
        }
    } else {
        session.require(Permission::ManageUsers)?;
    }

    let hash = hash_password_blocking(req.new_password).await?;
    state.db.users().set_password_hash(&id, &hash).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn set_enabled(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<EnabledRequest>,
) -> ApiResult<Json<User>> {
    session.require(Permission::ManageUsers)?;
    if id == session.user_id() && !req.enabled {
        return Err(ApiError::validation("You cannot disable your own user"));
    }
    managed_user(&state, &session, &id).await?;
    Ok(Json(state.db.users().set_enabled(&id, req.enabled).await?))
}
