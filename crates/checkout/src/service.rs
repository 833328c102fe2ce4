//! The checkout service: cart management, checkout, and status updates.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::{info, warn};

use merx_catalog::PriceRuleStore;
use merx_core::{CustomerId, DomainError, DomainResult, OrderId, ProductId, UserId};
use merx_inventory::StockLedger;
use merx_orders::{
    Cart, FlowMode, Order, OrderLine, OrderNumberSequence, OrderStatus, ReservationState,
};
use merx_outbox::{Outbox, OutboxRow};
use merx_pricing::{PriceRequest, resolve_bulk, resolve_price};

use crate::config::CheckoutConfig;
use crate::stores::{CartStore, OrderStore};

/// Everything a checkout call needs besides the cart itself.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub user_id: UserId,
    /// `None` means guest pricing: quantity breaks and base price only.
    pub customer_id: Option<CustomerId>,
    pub flow_mode: FlowMode,
    /// Client-supplied. Replaying a key returns the order it created.
    pub idempotency_key: Option<String>,
}

/// Orchestrates checkout end to end. The sole writer of orders: every
/// mutation of order state runs under `commit_lock`, so reservation,
/// order row and outbox row always move together.
pub struct CheckoutService<S, O, B> {
    rules: Arc<S>,
    orders: Arc<O>,
    outbox: Arc<B>,
    ledger: StockLedger,
    carts: CartStore,
    numbers: OrderNumberSequence,
    config: CheckoutConfig,
    commit_lock: Mutex<()>,
}

impl<S, O, B> CheckoutService<S, O, B>
where
    S: PriceRuleStore,
    O: OrderStore,
    B: Outbox,
{
    pub fn new(
        rules: Arc<S>,
        orders: Arc<O>,
        outbox: Arc<B>,
        ledger: StockLedger,
        config: CheckoutConfig,
    ) -> Self {
        let numbers = OrderNumberSequence::new(config.order_prefix.clone());
        Self {
            rules,
            orders,
            outbox,
            ledger,
            carts: CartStore::new(),
            numbers,
            config,
            commit_lock: Mutex::new(()),
        }
    }

    pub fn ledger(&self) -> &StockLedger {
        &self.ledger
    }

    pub fn carts(&self) -> &CartStore {
        &self.carts
    }

    /// Add a product to the user's cart, creating the cart lazily. The
    /// stored price is a display snapshot; checkout re-resolves every line.
    pub fn add_to_cart(
        &self,
        user_id: UserId,
        customer_id: Option<CustomerId>,
        product_id: ProductId,
        quantity: u32,
        now: DateTime<Utc>,
    ) -> DomainResult<Cart> {
        let priced = resolve_price(self.rules.as_ref(), product_id, quantity, customer_id, now)?;
        let mut cart = self
            .carts
            .get(user_id)?
            .unwrap_or_else(|| Cart::new(user_id, now));
        cart.add_item(product_id, quantity, priced.unit_price, now)?;
        self.carts.upsert(cart.clone())?;
        Ok(cart)
    }

    pub fn remove_from_cart(
        &self,
        user_id: UserId,
        product_id: ProductId,
        now: DateTime<Utc>,
    ) -> DomainResult<Cart> {
        let mut cart = self
            .carts
            .get(user_id)?
            .ok_or_else(|| DomainError::not_found(format!("cart for user {user_id}")))?;
        cart.remove_item(product_id, now)?;
        self.carts.upsert(cart.clone())?;
        Ok(cart)
    }

    /// Drop abandoned carts. Intended for a periodic sweep.
    pub fn purge_stale_carts(&self, now: DateTime<Utc>) -> DomainResult<usize> {
        let purged = self.carts.purge_stale(now, self.config.cart_max_age)?;
        if purged > 0 {
            info!(purged, "purged stale carts");
        }
        Ok(purged)
    }

    /// Convert the user's cart into an order.
    ///
    /// Price resolution is a pure read and runs before the commit lock is
    /// taken; the lock covers the write sequence (idempotency re-check,
    /// reservation, order row, outbox row, cart clear) so those land as one
    /// unit of work. Any failure leaves every store exactly as it was.
    /// Replaying an idempotency key returns the already-created order
    /// without touching anything.
    pub fn checkout(&self, request: CheckoutRequest, now: DateTime<Utc>) -> DomainResult<Order> {
        if let Some(existing) = self.replayed(request.idempotency_key.as_deref())? {
            return Ok(existing);
        }

        let cart = self
            .carts
            .get(request.user_id)?
            .filter(|c| !c.is_empty())
            .ok_or(DomainError::EmptyCart)?;
        if cart.is_stale(now, self.config.cart_max_age) {
            return Err(DomainError::validation("cart has expired"));
        }

        let requests: Vec<PriceRequest> = cart
            .items()
            .iter()
            .map(|i| PriceRequest {
                product_id: i.product_id,
                quantity: i.quantity,
            })
            .collect();
        let priced = resolve_bulk(self.rules.as_ref(), &requests, request.customer_id, now)?;

        let lines: Vec<OrderLine> = priced
            .iter()
            .map(|p| {
                OrderLine::new(
                    p.product_id,
                    p.sku.clone(),
                    p.quantity,
                    p.breakdown.base_price,
                    p.unit_price,
                    p.vat_amount,
                )
            })
            .collect();

        // Writes start here. Under the lock, a concurrent submit with the
        // same key may already have won the race, and the cart must still be
        // the snapshot that was priced: a checkout that consumed it reads as
        // empty, an edit mid-flight invalidates the resolved prices.
        let _guard = self.lock_commits()?;
        if let Some(existing) = self.replayed(request.idempotency_key.as_deref())? {
            return Ok(existing);
        }
        let current = self
            .carts
            .get(request.user_id)?
            .ok_or(DomainError::EmptyCart)?;
        if current.updated_at != cart.updated_at {
            return Err(DomainError::conflict("cart changed during checkout"));
        }

        let order = Order::create(
            self.numbers.next(now)?,
            request.user_id,
            request.customer_id,
            request.flow_mode,
            lines,
            self.config.shipping_cost,
            request.idempotency_key,
            now,
        )?;

        let correlation = *order.id.as_uuid();
        let quantities = order.line_quantities();
        self.ledger
            .reserve_all(&quantities, self.config.warehouse_id, correlation)?;

        if let Err(err) = self.orders.insert(order.clone()) {
            warn!(order_number = %order.order_number, %err, "order insert failed, releasing stock");
            self.ledger
                .release_all(&quantities, self.config.warehouse_id, correlation)?;
            return Err(err);
        }

        let event_type = match order.flow_mode {
            FlowMode::Direct => "order.created",
            FlowMode::QuoteApproval => "quote.requested",
        };
        self.outbox.append(OutboxRow::new(
            order.id,
            event_type,
            json!({
                "order_id": order.id,
                "order_number": order.order_number,
                "user_id": order.user_id,
                "status": order.status,
                "grand_total_cents": order.totals.grand_total.cents(),
            }),
            now,
        ))?;

        self.carts.remove(request.user_id)?;
        info!(
            order_number = %order.order_number,
            status = %order.status,
            grand_total = %order.totals.grand_total,
            "checkout complete"
        );
        Ok(order)
    }

    /// Move an order to a new status.
    ///
    /// A no-change update is a no-op; a forbidden transition fails without
    /// side effects. Cancellation, quote rejection, return and refund release
    /// any hold still standing; shipping commits it. Both directions are
    /// idempotent via [`ReservationState`].
    pub fn update_status(
        &self,
        order_id: OrderId,
        new_status: OrderStatus,
        actor: Option<UserId>,
        now: DateTime<Utc>,
    ) -> DomainResult<Order> {
        let _guard = self.lock_commits()?;

        let mut order = self.orders.get(order_id)?;
        if order.status == new_status {
            return Ok(order);
        }
        OrderStatus::validate_transition(order.status, new_status)?;

        let correlation = *order.id.as_uuid();
        let quantities = order.line_quantities();
        match new_status {
            OrderStatus::Cancelled
            | OrderStatus::QuoteRejected
            | OrderStatus::Returned
            | OrderStatus::Refunded => {
                if order.reservation == ReservationState::Reserved {
                    self.ledger.release_all(
                        &quantities,
                        self.config.warehouse_id,
                        correlation,
                    )?;
                    order.reservation = ReservationState::Released;
                }
            }
            OrderStatus::Shipped => {
                if order.reservation == ReservationState::Reserved {
                    self.ledger.commit_all(
                        &quantities,
                        self.config.warehouse_id,
                        correlation,
                    )?;
                    order.reservation = ReservationState::Committed;
                }
            }
            _ => {}
        }

        let old_status = order.status;
        order.status = new_status;
        order.updated_at = now;
        self.orders.update(order.clone())?;

        self.outbox.append(OutboxRow::new(
            order.id,
            "order.status_changed",
            json!({
                "order_id": order.id,
                "order_number": order.order_number,
                "from": old_status,
                "to": new_status,
                "actor": actor,
            }),
            now,
        ))?;

        info!(order_number = %order.order_number, from = %old_status, to = %new_status, "status changed");
        Ok(order)
    }

    pub fn get_order(&self, order_id: OrderId) -> DomainResult<Order> {
        self.orders.get(order_id)
    }

    pub fn find_by_number(&self, number: &str) -> DomainResult<Order> {
        self.orders
            .by_number(number)?
            .ok_or_else(|| DomainError::not_found(format!("order {number}")))
    }

    pub fn orders_for_user(&self, user_id: UserId) -> DomainResult<Vec<Order>> {
        self.orders.for_user(user_id)
    }

    /// Rebuild a cart from a past order's lines at current prices.
    pub fn reorder(
        &self,
        order_id: OrderId,
        customer_id: Option<CustomerId>,
        now: DateTime<Utc>,
    ) -> DomainResult<Cart> {
        let order = self.orders.get(order_id)?;
        let mut cart = self
            .carts
            .get(order.user_id)?
            .unwrap_or_else(|| Cart::new(order.user_id, now));
        for line in &order.lines {
            let priced =
                resolve_price(self.rules.as_ref(), line.product_id, line.quantity, customer_id, now)?;
            cart.add_item(line.product_id, line.quantity, priced.unit_price, now)?;
        }
        self.carts.upsert(cart.clone())?;
        Ok(cart)
    }

    fn replayed(&self, key: Option<&str>) -> DomainResult<Option<Order>> {
        let Some(key) = key else {
            return Ok(None);
        };
        let existing = self.orders.by_idempotency_key(key)?;
        if let Some(order) = &existing {
            info!(order_number = %order.order_number, key, "idempotent replay");
        }
        Ok(existing)
    }

    fn lock_commits(&self) -> DomainResult<MutexGuard<'_, ()>> {
        self.commit_lock
            .lock()
            .map_err(|_| DomainError::invariant("checkout commit lock poisoned"))
    }
}
