//! # Application State
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  AppState (cloned into every handler)                                   │
//! │                                                                         │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐  ┌─────────────┐ │
//! │  │  Database    │  │  JwtManager  │  │ ServerConfig │  │  CartStore  │ │
//! │  │  (SQLite     │  │  Arc         │  │  Arc         │  │  user id →  │ │
//! │  │   pool)      │  │              │  │              │  │  Cart       │ │
//! │  └──────────────┘  └──────────────┘  └──────────────┘  └─────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Carts live in memory, one per user. They are a scratch pad; the sale is
//! the durable record, so a restart losing open carts is acceptable.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use vitrina_core::cart::Cart;
use vitrina_db::Database;

use crate::auth::JwtManager;
use crate::config::ServerConfig;

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub jwt: Arc<JwtManager>,
    pub config: Arc<ServerConfig>,
    pub carts: CartStore,
}

impl AppState {
    pub fn new(db: Database, config: ServerConfig) -> Self {
        let jwt = JwtManager::new(&config.jwt_secret, config.token_lifetime_secs);
        AppState {
            db,
            jwt: Arc::new(jwt),
            config: Arc::new(config),
            carts: CartStore::default(),
        }
    }
}

/// Per-user carts.
///
/// ## Thread Safety
/// One mutex over the map. Every closure runs without awaiting, so the lock
/// is never held across an `.await`.
#[derive(Clone, Default)]
pub struct CartStore {
    carts: Arc<Mutex<HashMap<String, Cart>>>,
}

impl CartStore {
    /// Executes a function with read access to a user's cart.
    pub fn with_cart<F, R>(&self, user_id: &str, f: F) -> R
    where
        F: FnOnce(&Cart) -> R,
    {
        let carts = self.carts.lock().unwrap_or_else(|e| e.into_inner());
        match carts.get(user_id) {
            Some(cart) => f(cart),
            None => f(&Cart::new()),
        }
    }

    /// Executes a function with write access to a user's cart, creating it
    /// when missing.
    pub fn with_cart_mut<F, R>(&self, user_id: &str, f: F) -> R
    where
        F: FnOnce(&mut Cart) -> R,
    {
        let mut carts = self.carts.lock().unwrap_or_else(|e| e.into_inner());
        f(carts.entry(user_id.to_string()).or_default())
    }

    /// Drops a user's cart.
    pub fn clear(&self, user_id: &str) {
        let mut carts = self.carts.lock().unwrap_or_else(|e| e.into_inner());
        carts.remove(user_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use vitrina_core::Product;

    fn product(id: &str) -> Product {
        Product {
            id: id.to_string(),
            code: format!("C-{}", id),
            description: "Camiseta".to_string(),
            size: Some("M".to_string()),
            color: None,
            price_cents: 1500,
            cost_cents: None,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_carts_are_per_user() {
        let store = CartStore::default();
        store
            .with_cart_mut("ana", |cart| cart.add_item(&product("p1"), 2))
            .unwrap();

        assert_eq!(store.with_cart("ana", |c| c.total_quantity()), 2);
        assert!(store.with_cart("luis", |c| c.is_empty()));

        store.clear("ana");
        assert!(store.with_cart("ana", |c| c.is_empty()));
    }
}
