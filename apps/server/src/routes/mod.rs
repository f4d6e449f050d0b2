//! HTTP routes, one module per area.
//!
//! | Prefix               | Module        |
//! |----------------------|---------------|
//! | `/api/health`        | here          |
//! | `/api/auth`, session | [`session`]   |
//! | `/api/stores`        | [`stores`]    |
//! | `/api/roles`         | [`roles`]     |
//! | `/api/users`         | [`users`]     |
//! | `/api/products`      | [`products`]  |
//! | `/api/inventory`     | [`products`]  |
//! | `/api/invoices`      | [`invoices`]  |
//! | `/api/cart`          | [`cart`]      |
//! | `/api/sales`         | [`sales`]     |
//! | `/api/register`      | [`register`]  |
//! | `/api/transfers`     | [`transfers`] |
//! | `/api/reports`       | [`reports`]   |

pub mod cart;
pub mod invoices;
pub mod products;
pub mod register;
pub mod reports;
pub mod roles;
pub mod sales;
pub mod session;
pub mod stores;
pub mod transfers;
pub mod users;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/health", get(health))
        .merge(session::routes())
        .merge(stores::routes())
        .merge(roles::routes())
        .merge(users::routes())
        .merge(products::routes())
        .merge(invoices::routes())
        .merge(cart::routes())
        .merge(sales::routes())
        .merge(register::routes())
        .merge(transfers::routes())
        .merge(reports::routes())
}

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub database: bool,
    pub version: &'static str,
}

async fn health(State(state): State<AppState>) -> Json<Health> {
    let database = state.db.health_check().await;
    Json(Health {
        status: if database { "ok" } else { "degraded" },
        database,
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Default page size of listings.
pub(crate) const DEFAULT_LIMIT: u32 = 100;
