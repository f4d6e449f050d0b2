//! # Vitrina Server
//!
//! JSON API of the Vitrina point of sale.
//!
//! ## Request Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  HTTP request                                                           │
//! │     │                                                                   │
//! │     ▼                                                                   │
//! │  TraceLayer ──► CorsLayer ──► Router                                    │
//! │                                  │                                      │
//! │                                  ▼                                      │
//! │                        Session extractor (bearer token)                 │
//! │                                  │                                      │
//! │                                  ▼                                      │
//! │                        handler: permission + store scope                │
//! │                                  │                                      │
//! │                                  ▼                                      │
//! │                        vitrina-db repository                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod extract;
pub mod routes;
pub mod state;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use config::{ConfigError, ServerConfig};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use state::AppState;

/// Builds the full application router.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    routes::router()
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
