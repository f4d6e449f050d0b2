//! The logged-in user's cart.
//!
//! ```text
//! POST /api/cart/items ──► add (by id or code)
//! PUT  /api/cart/items/{product_id} ──► set quantity (0 removes)
//! DELETE /api/cart/items/{product_id}
//! DELETE /api/cart
//!            │
//!            ▼
//! POST /api/sales ──► checkout turns the cart into a sale
//! ```
//!
//! Stock is not reserved while items sit in a cart; checkout checks it.

use axum::extract::{Path, State};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::debug;
use vitrina_core::cart::{Cart, CartItem, CartTotals};
use vitrina_core::{CoreError, Permission, Product};

use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, Session};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/cart", get(get_cart).delete(clear_cart))
        .route("/api/cart/items", post(add_item))
        .route(
            "/api/cart/items/{product_id}",
            put(update_quantity).delete(remove_item),
        )
}

const SELLING: [Permission; 3] = [Permission::Sell, Permission::SellOnline, Permission::SellLayaway];

#[derive(Debug, Serialize)]
pub struct CartResponse {
    pub items: Vec<CartItem>,
    pub totals: CartTotals,
}

impl From<&Cart> for CartResponse {
    fn from(cart: &Cart) -> Self {
        CartResponse {
            items: cart.items.clone(),
            totals: CartTotals::from(cart),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub product_id: Option<String>,
    pub code: Option<String>,
    pub quantity: i64,
}

#[derive(Debug, Deserialize)]
pub struct UpdateQuantityRequest {
    pub quantity: i64,
}

async fn find_product(state: &AppState, req: &AddItemRequest) -> ApiResult<Product> {
    let product = match (req.product_id.as_deref(), req.code.as_deref()) {
        (Some(id), _) => state.db.products().require(id).await?,
        (None, Some(code)) => state
            .db
            .products()
            .get_by_code(code)
            .await?
            .ok_or_else(|| ApiError::not_found("Product", code))?,
        (None, None) => return Err(ApiError::validation("product_id or code is required")),
    };
    if !product.is_active {
        return Err(CoreError::invalid_status("Product", &product.id, "inactive", "sell").into());
    }
    Ok(product)
}

async fn get_cart(State(state): State<AppState>, session: Session) -> ApiResult<Json<CartResponse>> {
    session.require_any(&SELLING)?;
    Ok(Json(state.carts.with_cart(session.user_id(), |cart| CartResponse::from(cart))))
}

async fn add_item(
    State(state): State<AppState>,
    session: Session,
    ApiJson(req): ApiJson<AddItemRequest>,
) -> ApiResult<Json<CartResponse>> {
    session.require_any(&SELLING)?;
    let product = find_product(&state, &req).await?;
    debug!(user = %session.user.username, code = %product.code, quantity = req.quantity, "Adding to cart");

    let response = state.carts.with_cart_mut(session.user_id(), |cart| {
        cart.add_item(&product, req.quantity)?;
        Ok::<_, CoreError>(CartResponse::from(&*cart))
    })?;
    Ok(Json(response))
}

async fn update_quantity(
    State(state): State<AppState>,
    session: Session,
    Path(product_id): Path<String>,
    ApiJson(req): ApiJson<UpdateQuantityRequest>,
) -> ApiResult<Json<CartResponse>> {
    session.require_any(&SELLING)?;
    let response = state.carts.with_cart_mut(session.user_id(), |cart| {
        cart.update_quantity(&product_id, req.quantity)?;
        Ok::<_, CoreError>(CartResponse::from(&*cart))
    })?;
    Ok(Json(response))
}

async fn remove_item(
    State(state): State<AppState>,
    session: Session,
    Path(product_id): Path<String>,
) -> ApiResult<Json<CartResponse>> {
    session.require_any(&SELLING)?;
    let response = state.carts.with_cart_mut(session.user_id(), |cart| {
        cart.remove_item(&product_id)?;
        Ok::<_, CoreError>(CartResponse::from(&*cart))
    })?;
    Ok(Json(response))
}

async fn clear_cart(State(state): State<AppState>, session: Session) -> ApiResult<Json<CartResponse>> {
    session.require_any(&SELLING)?;
    state.carts.clear(session.user_id());
    Ok(Json(CartResponse::from(&Cart::new())))
}
