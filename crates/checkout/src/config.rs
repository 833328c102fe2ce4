use chrono::Duration;

use merx_core::{Money, WarehouseId};

/// Static knobs for the checkout service. Built once at startup and handed
/// to [`crate::CheckoutService::new`].
#[derive(Debug, Clone)]
pub struct CheckoutConfig {
    /// Order number prefix, e.g. `SO` for `SO-20260824-00001`.
    pub order_prefix: String,
    /// The single warehouse orders reserve against.
    pub warehouse_id: WarehouseId,
    /// Flat shipping cost applied to every order.
    pub shipping_cost: Money,
    /// Carts untouched longer than this are considered abandoned.
    pub cart_max_age: Duration,
}

impl CheckoutConfig {
    pub fn new(warehouse_id: WarehouseId) -> Self {
        Self {
            order_prefix: "SO".to_string(),
            warehouse_id,
            shipping_cost: Money::zero(),
            cart_max_age: Duration::days(7),
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.order_prefix = prefix.into();
        self
    }

    pub fn with_shipping_cost(mut self, cost: Money) -> Self {
        self.shipping_cost = cost;
        self
    }

    pub fn with_cart_max_age(mut self, max_age: Duration) -> Self {
        self.cart_max_age = max_age;
        self
    }
}
