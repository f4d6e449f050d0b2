//! # Cart
//!
//! The running cart a seller fills before checkout.
//!
//! ## Cart Operations Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Endpoint                          Cart change                          │
//! │  ────────                          ───────────                          │
//! │  POST   /api/cart/items ─────────► add_item()        merge by product   │
//! │  PUT    /api/cart/items/{id} ────► update_quantity() 0 removes          │
//! │  DELETE /api/cart/items/{id} ────► remove_item()                        │
//! │  DELETE /api/cart ───────────────► clear()                              │
//! │  POST   /api/sales ──────────────► lines() → sale, then clear()         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{LineRequest, Product};
use crate::validation::validate_quantity;
use crate::{MAX_CART_ITEMS, MAX_ITEM_QUANTITY};

/// A cart line. Code, description and price are frozen when the product is
/// first added; later product edits do not change the cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CartItem {
    pub product_id: String,
    pub code: String,
    pub description: String,
    pub unit_price_cents: i64,
    pub quantity: i64,
    #[ts(as = "String")]
    pub added_at: DateTime<Utc>,
}

impl CartItem {
    pub fn from_product(product: &Product, quantity: i64) -> Self {
        CartItem {
            product_id: product.id.clone(),
            code: product.code.clone(),
            description: product.description.clone(),
            unit_price_cents: product.price_cents,
            quantity,
            added_at: Utc::now(),
        }
    }

    pub fn line_total(&self) -> Money {
        Money::from_cents(self.unit_price_cents).multiply_quantity(self.quantity)
    }
}

/// The running cart.
///
/// ## Invariants
/// - Lines are unique by `product_id`
/// - Every quantity is within `1..=MAX_ITEM_QUANTITY`
/// - At most `MAX_CART_ITEMS` lines
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Cart {
    pub items: Vec<CartItem>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Default for Cart {
    fn default() -> Self {
        Self::new()
    }
}

impl Cart {
    pub fn new() -> Self {
        Cart {
            items: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Adds a product, or increases its quantity if it is already present.
    pub fn add_item(&mut self, product: &Product, quantity: i64) -> CoreResult<()> {
        validate_quantity(quantity)?;

        if let Some(item) = self.items.iter_mut().find(|i| i.product_id == product.id) {
            let new_qty = item.quantity + quantity;
            if new_qty > MAX_ITEM_QUANTITY {
                return Err(CoreError::QuantityTooLarge {
                    requested: new_qty,
                    max: MAX_ITEM_QUANTITY,
                });
            }
            item.quantity = new_qty;
            return Ok(());
        }

        if self.items.len() >= MAX_CART_ITEMS {
            return Err(CoreError::CartTooLarge { max: MAX_CART_ITEMS });
        }

        self.items.push(CartItem::from_product(product, quantity));
        Ok(())
    }

    /// Sets a line's quantity. Zero removes the line.
    pub fn update_quantity(&mut self, product_id: &str, quantity: i64) -> CoreResult<()> {
        if quantity == 0 {
            return self.remove_item(product_id);
        }

        validate_quantity(quantity)?;

        match self.items.iter_mut().find(|i| i.product_id == product_id) {
            Some(item) => {
                item.quantity = quantity;
                Ok(())
            }
            None => Err(CoreError::NotInCart(product_id.to_string())),
        }
    }

    pub fn remove_item(&mut self, product_id: &str) -> CoreResult<()> {
        let initial_len = self.items.len();
        self.items.retain(|i| i.product_id != product_id);

        if self.items.len() == initial_len {
            Err(CoreError::NotInCart(product_id.to_string()))
        } else {
            Ok(())
        }
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.created_at = Utc::now();
    }

    /// Number of distinct lines.
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub fn total_quantity(&self) -> i64 {
        self.items.iter().map(|i| i.quantity).sum()
    }

    pub fn total(&self) -> Money {
        self.items.iter().map(|i| i.line_total()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The `(product, quantity)` pairs to check against stock.
    pub fn lines(&self) -> Vec<LineRequest> {
        self.items
            .iter()
            .map(|i| LineRequest {
                product_id: i.product_id.clone(),
                quantity: i.quantity,
            })
            .collect()
    }
}

/// Cart summary for API responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CartTotals {
    pub item_count: usize,
    pub total_quantity: i64,
    pub total_cents: i64,
}

impl From<&Cart> for CartTotals {
    fn from(cart: &Cart) -> Self {
        CartTotals {
            item_count: cart.item_count(),
            total_quantity: cart.total_quantity(),
            total_cents: cart.total().cents(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(id: &str, price_cents: i64) -> Product {
        Product {
            id: id.to_string(),
            code: format!("CODE-{}", id),
            description: format!("Product {}", id),
            size: None,
            color: None,
            price_cents,
            cost_cents: None,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_add_item() {
        let mut cart = Cart::new();
        cart.add_item(&product("1", 999), 2).unwrap();

        assert_eq!(cart.item_count(), 1);
        assert_eq!(cart.total_quantity(), 2);
        assert_eq!(cart.total().cents(), 1998);
    }

    #[test]
    fn test_same_product_merges() {
        let mut cart = Cart::new();
        let p = product("1", 999);
        cart.add_item(&p, 2).unwrap();
        cart.add_item(&p, 3).unwrap();

        assert_eq!(cart.item_count(), 1);
        assert_eq!(cart.total_quantity(), 5);
    }

    #[test]
    fn test_price_is_frozen() {
        let mut cart = Cart::new();
        let mut p = product("1", 1000);
        cart.add_item(&p, 1).unwrap();

        p.price_cents = 5000;
        cart.add_item(&p, 1).unwrap();
        assert_eq!(cart.total().cents(), 2000);
    }

    #[test]
    fn test_quantity_limits() {
        let mut cart = Cart::new();
        let p = product("1", 100);
        assert!(cart.add_item(&p, 0).is_err());
        cart.add_item(&p, MAX_ITEM_QUANTITY).unwrap();
        assert!(matches!(
            cart.add_item(&p, 1),
            Err(CoreError::QuantityTooLarge { .. })
        ));
    }

    #[test]
    fn test_max_lines() {
        let mut cart = Cart::new();
        for i in 0..MAX_CART_ITEMS {
            cart.add_item(&product(&i.to_string(), 100), 1).unwrap();
        }
        assert!(matches!(
            cart.add_item(&product("extra", 100), 1),
            Err(CoreError::CartTooLarge { .. })
        ));
    }

    #[test]
    fn test_update_and_remove() {
        let mut cart = Cart::new();
        cart.add_item(&product("1", 100), 1).unwrap();
        cart.add_item(&product("2", 200), 1).unwrap();

        cart.update_quantity("1", 4).unwrap();
        assert_eq!(cart.total().cents(), 600);

        cart.update_quantity("1", 0).unwrap();
        assert_eq!(cart.item_count(), 1);

        assert!(matches!(cart.remove_item("1"), Err(CoreError::NotInCart(_))));
        cart.remove_item("2").unwrap();
        assert!(cart.is_empty());
    }

    #[test]
    fn test_totals_and_lines() {
        let mut cart = Cart::new();
        cart.add_item(&product("1", 250), 2).unwrap();

        let totals = CartTotals::from(&cart);
        assert_eq!(totals.total_cents, 500);
        assert_eq!(cart.lines()[0].quantity, 2);

        cart.clear();
        assert!(cart.is_empty());
    }
}
