//! Product catalogue and per-store stock.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use vitrina_core::report::InventoryLine;
use vitrina_core::{Permission, Product, ProductWithStock, StockMovement};
use vitrina_db::{NewProduct, ProductUpdate};

use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, ApiQuery, Session};
use crate::routes::stores::double_option;
use crate::routes::DEFAULT_LIMIT;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/products", get(search_products).post(create_product))
        .route("/api/products/by-code/{code}", get(get_by_code))
        .route(
            "/api/products/{id}",
            get(get_product).put(update_product).delete(deactivate_product),
        )
        .route("/api/products/{id}/adjust", post(adjust_stock))
        .route("/api/products/{id}/movements", get(list_movements))
        .route("/api/inventory", get(inventory))
        .route("/api/inventory/low-stock", get(low_stock))
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct InitialStock {
    pub store_id: String,
    pub quantity: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub code: String,
    pub description: String,
    pub size: Option<String>,
    pub color: Option<String>,
    pub price_cents: i64,
    pub cost_cents: Option<i64>,
    #[serde(default)]
    pub initial_stock: Vec<InitialStock>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProductRequest {
    pub description: Option<String>,
    #[serde(default, with = "double_option")]
    pub size: Option<Option<String>>,
    #[serde(default, with = "double_option")]
    pub color: Option<Option<String>>,
    pub price_cents: Option<i64>,
    #[serde(default, with = "double_option")]
    pub cost_cents: Option<Option<i64>>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct AdjustStockRequest {
    pub store_id: Option<String>,
    /// Signed change: positive adds, negative removes.
    pub delta: i64,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AdjustStockResponse {
    pub product_id: String,
    pub store_id: String,
    pub quantity: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct StoreQuery {
    pub store_id: Option<String>,
    pub limit: Option<u32>,
    pub threshold: Option<i64>,
}

async fn search_products(
    State(state): State<AppState>,
    _session: Session,
    ApiQuery(query): ApiQuery<SearchQuery>,
) -> ApiResult<Json<Vec<Product>>> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT);
    Ok(Json(state.db.products().search(&query.q, limit).await?))
}

async fn create_product(
    State(state): State<AppState>,
    session: Session,
    ApiJson(req): ApiJson<CreateProductRequest>,
) -> ApiResult<(StatusCode, Json<ProductWithStock>)> {
    session.require(Permission::ManageProducts)?;
    for stock in &req.initial_stock {
        session.ensure_store(&stock.store_id)?;
    }
    let initial: Vec<(String, i64)> = req
        .initial_stock
        .into_iter()
        .map(|s| (s.store_id, s.quantity))
        .collect();

    let product = state
        .db
        .products()
        .create(
            NewProduct {
                code: req.code,
                description: req.description,
                size: req.size,
                color: req.color,
                price_cents: req.price_cents,
                cost_cents: req.cost_cents,
            },
            &initial,
            Some(session.user_id()),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(product)))
}

async fn get_product(
    State(state): State<AppState>,
    _session: Session,
    Path(id): Path<String>,
) -> ApiResult<Json<ProductWithStock>> {
    Ok(Json(state.db.products().get_with_stock(&id).await?))
}

async fn get_by_code(
    State(state): State<AppState>,
    _session: Session,
    Path(code): Path<String>,
) -> ApiResult<Json<ProductWithStock>> {
    let product = state
        .db
        .products()
        .get_by_code(&code)
        .await?
        .ok_or_else(|| ApiError::not_found("Product", &code))?;
    Ok(Json(state.db.products().get_with_stock(&product.id).await?))
}

async fn update_product(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<UpdateProductRequest>,
) -> ApiResult<Json<Product>> {
    session.require(Permission::ManageProducts)?;
    let product = state
        .db
        .products()
        .update(
            &id,
            ProductUpdate {
                description: req.description,
                size: req.size,
                color: req.color,
                price_cents: req.price_cents,
                cost_cents: req.cost_cents,
                is_active: req.is_active,
            },
        )
        .await?;
    Ok(Json(product))
}

/// Products are never deleted; sales keep pointing at them.
async fn deactivate_product(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    session.require(Permission::ManageProducts)?;
    state.db.products().deactivate(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn adjust_stock(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<AdjustStockRequest>,
) -> ApiResult<Json<AdjustStockResponse>> {
    session.require(Permission::AdjustStock)?;
    let store_id = session.target_store(req.store_id.as_deref())?;

    let quantity = state
        .db
        .products()
        .adjust_stock(&id, &store_id, req.delta, session.user_id(), req.notes.as_deref())
        .await?;
    Ok(Json(AdjustStockResponse {
        product_id: id,
        store_id,
        quantity,
    }))
}

async fn list_movements(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
    ApiQuery(query): ApiQuery<StoreQuery>,
) -> ApiResult<Json<Vec<StockMovement>>> {
    session.require_any(&[Permission::ManageProducts, Permission::AdjustStock])?;
    let scope = session.store_scope(query.store_id.as_deref())?;
    let movements = state
        .db
        .products()
        .movements(&id, scope.as_deref(), query.limit.unwrap_or(DEFAULT_LIMIT))
        .await?;
    Ok(Json(movements))
}

/// Stock per store. Without `all_stores` only the user's store is listed.
async fn inventory(
    State(state): State<AppState>,
    session: Session,
    ApiQuery(query): ApiQuery<StoreQuery>,
) -> ApiResult<Json<Vec<InventoryLine>>> {
    let scope = session.store_scope(query.store_id.as_deref())?;
    Ok(Json(state.db.products().inventory(scope.as_deref()).await?))
}

async fn low_stock(
    State(state): State<AppState>,
    session: Session,
    ApiQuery(query): ApiQuery<StoreQuery>,
) -> ApiResult<Json<Vec<InventoryLine>>> {
    let scope = session.store_scope(query.store_id.as_deref())?;
    let threshold = query.threshold.unwrap_or(state.config.low_stock_threshold);
    if threshold < 0 {
        return Err(ApiError::validation("threshold must not be negative"));
    }
    Ok(Json(
        state
            .db
            .products()
            .low_stock(scope.as_deref(), threshold)
            .await?,
    ))
}
