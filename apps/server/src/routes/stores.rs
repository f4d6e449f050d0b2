use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, put};
use axum::{Json, Router};
use serde::Deserialize;
use vitrina_core::{Permission, Store};

use crate::error::ApiResult;
use crate::extract::{ApiJson, ApiQuery, Session};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/stores", get(list_stores).post(create_store))
        .route("/api/stores/{id}", get(get_store).put(update_store))
        .route("/api/stores/{id}/enabled", put(set_enabled))
}

#[derive(Debug, Default, Deserialize)]
pub struct ListStoresQuery {
    #[serde(default)]
    pub only_enabled: bool,
}

#[derive(Debug, Deserialize)]
pub struct CreateStoreRequest {
    pub name: String,
    pub address: Option<String>,
}

/// `address: null` clears it; a missing key keeps it.
#[derive(Debug, Deserialize)]
pub struct UpdateStoreRequest {
    pub name: Option<String>,
    #[serde(default, with = "double_option")]
    pub address: Option<Option<String>>,
}

#[derive(Debug, Deserialize)]
pub struct EnabledRequest {
    pub enabled: bool,
}

/// Every logged-in user may read the store list (transfer destinations).
async fn list_stores(
    State(state): State<AppState>,
    _session: Session,
    ApiQuery(query): ApiQuery<ListStoresQuery>,
) -> ApiResult<Json<Vec<Store>>> {
    Ok(Json(state.db.stores().list(query.only_enabled).await?))
}

async fn create_store(
    State(state): State<AppState>,
    session: Session,
    ApiJson(req): ApiJson<CreateStoreRequest>,
) -> ApiResult<(StatusCode, Json<Store>)> {
    session.require(Permission::ManageStores)?;
    let store = state
        .db
        .stores()
        .create(&req.name, req.address.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(store)))
}

async fn get_store(
    State(state): State<AppState>,
    _session: Session,
    Path(id): Path<String>,
) -> ApiResult<Json<Store>> {
    Ok(Json(state.db.stores().require(&id).await?))
}

async fn update_store(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<UpdateStoreRequest>,
) -> ApiResult<Json<Store>> {
    session.require(Permission::ManageStores)?;
    let address = req.address.as_ref().map(|a| a.as_deref());
    let store = state
        .db
        .stores()
        .update(&id, req.name.as_deref(), address)
        .await?;
    Ok(Json(store))
}

async fn set_enabled(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<EnabledRequest>,
) -> ApiResult<Json<Store>> {
    session.require(Permission::ManageStores)?;
    Ok(Json(state.db.stores().set_enabled(&id, req.enabled).await?))
}

/// Tells a missing key (`None`) from an explicit `null` (`Some(None)`).
pub(crate) mod double_option {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
    where
        T: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        Option::<T>::deserialize(deserializer).map(Some)
    }
}
