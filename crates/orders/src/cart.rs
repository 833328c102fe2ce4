//! Shopping cart: one per user, created lazily, cleared on checkout.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use merx_core::{CartId, DomainError, DomainResult, Money, ProductId, UserId};

/// A cart line. `unit_price` is the price resolved at add-time — a display
/// convenience only; checkout re-resolves every line and never trusts it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: Money,
}

/// A user's cart. Insertion order of items is irrelevant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    pub id: CartId,
    pub user_id: UserId,
    items: Vec<CartItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Cart {
    pub fn new(user_id: UserId, now: DateTime<Utc>) -> Self {
        Self {
            id: CartId::new(),
            user_id,
            items: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Add a product, merging quantities onto an existing line and refreshing
    /// its cached price snapshot.
    pub fn add_item(
        &mut self,
        product_id: ProductId,
        quantity: u32,
        unit_price: Money,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        if quantity == 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }

        match self.items.iter_mut().find(|i| i.product_id == product_id) {
            Some(line) => {
                line.quantity += quantity;
                line.unit_price = unit_price;
            }
            None => self.items.push(CartItem { product_id, quantity, unit_price }),
        }
        self.updated_at = now;
        Ok(())
    }

    pub fn remove_item(&mut self, product_id: ProductId, now: DateTime<Utc>) -> DomainResult<()> {
        let before = self.items.len();
        self.items.retain(|i| i.product_id != product_id);
        if self.items.len() == before {
            return Err(DomainError::not_found(format!("cart line for product {product_id}")));
        }
        self.updated_at = now;
        Ok(())
    }

    pub fn clear(&mut self, now: DateTime<Utc>) {
        self.items.clear();
        self.updated_at = now;
    }

    /// Carts are time-boxed: untouched past `max_age`, they count as expired.
    pub fn is_stale(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        now - self.updated_at > max_age
    }
}
