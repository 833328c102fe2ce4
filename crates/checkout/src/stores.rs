//! Order persistence and the per-user cart store.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Duration, Utc};

use merx_core::{DomainError, DomainResult, OrderId, UserId};
use merx_orders::{Cart, Order};

/// Durable order storage. `insert` is the uniqueness gate: it rejects a
/// duplicate order id, order number, or idempotency key with `Conflict`.
pub trait OrderStore: Send + Sync {
    fn insert(&self, order: Order) -> DomainResult<()>;

    fn get(&self, id: OrderId) -> DomainResult<Order>;

    fn by_idempotency_key(&self, key: &str) -> DomainResult<Option<Order>>;

    fn by_number(&self, number: &str) -> DomainResult<Option<Order>>;

    /// Replace an existing order row. `NotFound` if it was never inserted.
    fn update(&self, order: Order) -> DomainResult<()>;

    fn for_user(&self, user_id: UserId) -> DomainResult<Vec<Order>>;
}

#[derive(Debug, Default)]
pub struct InMemoryOrderStore {
    orders: RwLock<HashMap<OrderId, Order>>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OrderStore for InMemoryOrderStore {
    fn insert(&self, order: Order) -> DomainResult<()> {
        let mut orders = self.orders.write().map_err(poisoned)?;
        if orders.contains_key(&order.id) {
            return Err(DomainError::conflict(format!("order {} already exists", order.id)));
        }
        if orders.values().any(|o| o.order_number == order.order_number) {
            return Err(DomainError::conflict(format!(
                "order number {} already taken",
                order.order_number
            )));
        }
        if let Some(key) = &order.idempotency_key {
            if orders
                .values()
                .any(|o| o.idempotency_key.as_deref() == Some(key.as_str()))
            {
                return Err(DomainError::conflict(format!(
                    "idempotency key {key} already used"
                )));
            }
        }
        orders.insert(order.id, order);
        Ok(())
    }

    fn get(&self, id: OrderId) -> DomainResult<Order> {
        self.orders
            .read()
            .map_err(poisoned)?
            .get(&id)
            .cloned()
            .ok_or_else(|| DomainError::not_found(format!("order {id}")))
    }

    fn by_idempotency_key(&self, key: &str) -> DomainResult<Option<Order>> {
        Ok(self
            .orders
            .read()
            .map_err(poisoned)?
            .values()
            .find(|o| o.idempotency_key.as_deref() == Some(key))
            .cloned())
    }

    fn by_number(&self, number: &str) -> DomainResult<Option<Order>> {
        Ok(self
            .orders
            .read()
            .map_err(poisoned)?
            .values()
            .find(|o| o.order_number == number)
            .cloned())
    }

    fn update(&self, order: Order) -> DomainResult<()> {
        let mut orders = self.orders.write().map_err(poisoned)?;
        match orders.get_mut(&order.id) {
            Some(slot) => {
                *slot = order;
                Ok(())
            }
            None => Err(DomainError::not_found(format!("order {}", order.id))),
        }
    }

    fn for_user(&self, user_id: UserId) -> DomainResult<Vec<Order>> {
        let mut orders: Vec<Order> = self
            .orders
            .read()
            .map_err(poisoned)?
            .values()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(orders)
    }
}

/// One cart per user, created lazily on first add.
#[derive(Debug, Default)]
pub struct CartStore {
    carts: RwLock<HashMap<UserId, Cart>>,
}

impl CartStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, user_id: UserId) -> DomainResult<Option<Cart>> {
        Ok(self.carts.read().map_err(poisoned)?.get(&user_id).cloned())
    }

    pub fn upsert(&self, cart: Cart) -> DomainResult<()> {
        self.carts.write().map_err(poisoned)?.insert(cart.user_id, cart);
        Ok(())
    }

    pub fn remove(&self, user_id: UserId) -> DomainResult<()> {
        self.carts.write().map_err(poisoned)?.remove(&user_id);
        Ok(())
    }

    /// Drop every cart untouched past `max_age`; returns how many went.
    pub fn purge_stale(&self, now: DateTime<Utc>, max_age: Duration) -> DomainResult<usize> {
        let mut carts = self.carts.write().map_err(poisoned)?;
        let before = carts.len();
        carts.retain(|_, cart| !cart.is_stale(now, max_age));
        Ok(before - carts.len())
    }
}

fn poisoned(_: impl Sized) -> DomainError {
    DomainError::invariant("store lock poisoned")
}

#[cfg(test)]
mod tests {
    use super::*;
    use merx_core::Money;
    use merx_core::ProductId;
    use merx_orders::{FlowMode, OrderLine};

    fn order(number: &str, key: Option<&str>) -> Order {
        Order::create(
            number.to_string(),
            UserId::new(),
            None,
            FlowMode::Direct,
            vec![OrderLine::new(
                ProductId::new(),
                "SKU",
                1,
                Money::from_cents(100),
                Money::from_cents(100),
                Money::zero(),
            )],
            Money::zero(),
            key.map(str::to_string),
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn duplicate_idempotency_key_is_a_conflict() {
        let store = InMemoryOrderStore::new();
        store.insert(order("SO-1", Some("k1"))).unwrap();
        let err = store.insert(order("SO-2", Some("k1"))).unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn duplicate_order_number_is_a_conflict() {
        let store = InMemoryOrderStore::new();
        store.insert(order("SO-1", None)).unwrap();
        let err = store.insert(order("SO-1", None)).unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn lookup_by_key_and_number() {
        let store = InMemoryOrderStore::new();
        let o = order("SO-9", Some("key-9"));
        store.insert(o.clone()).unwrap();

        assert_eq!(store.by_idempotency_key("key-9").unwrap().unwrap().id, o.id);
        assert_eq!(store.by_number("SO-9").unwrap().unwrap().id, o.id);
        assert!(store.by_idempotency_key("other").unwrap().is_none());
    }

    #[test]
    fn purge_drops_only_stale_carts() {
        let store = CartStore::new();
        let now = Utc::now();
        let fresh = Cart::new(UserId::new(), now);
        let stale = Cart::new(UserId::new(), now - Duration::days(30));
        let fresh_user = fresh.user_id;
        store.upsert(fresh).unwrap();
        store.upsert(stale).unwrap();

        let purged = store.purge_stale(now, Duration::days(7)).unwrap();
        assert_eq!(purged, 1);
        assert!(store.get(fresh_user).unwrap().is_some());
    }
}
