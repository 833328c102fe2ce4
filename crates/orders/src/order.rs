//! Orders: immutable line snapshots and cent-exact totals.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use merx_core::{CustomerId, DomainError, DomainResult, Money, OrderId, ProductId, UserId};

use crate::status::{FlowMode, OrderStatus};

/// One order line: a snapshot of SKU, quantity and the price *resolved at
/// checkout time*. Never recomputed later — the price integrity contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub sku: String,
    pub quantity: u32,
    /// Undiscounted catalog price at checkout time; the spread against
    /// `unit_price` is the discount granted by the pricing rules.
    pub list_price: Money,
    pub unit_price: Money,
    /// VAT per unit, already rounded.
    pub vat_amount: Money,
    pub line_total: Money,
}

impl OrderLine {
    pub fn new(
        product_id: ProductId,
        sku: impl Into<String>,
        quantity: u32,
        list_price: Money,
        unit_price: Money,
        vat_amount: Money,
    ) -> Self {
        Self {
            product_id,
            sku: sku.into(),
            quantity,
            list_price,
            unit_price,
            vat_amount,
            line_total: unit_price.times(quantity),
        }
    }
}

/// Where the order's inventory hold currently stands. Makes release and
/// commit idempotent: a repeated cancellation finds `Released` and does
/// nothing; a repeated shipment finds `Committed` and does nothing.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationState {
    Reserved,
    Committed,
    Released,
}

/// Order totals, each component summed from already-rounded per-line values
/// and rounded independently, so `grand_total = subtotal - discount_total +
/// shipping_cost + vat_total` holds to the cent.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
    pub subtotal: Money,
    pub discount_total: Money,
    pub shipping_cost: Money,
    pub vat_total: Money,
    pub grand_total: Money,
}

impl OrderTotals {
    fn from_lines(lines: &[OrderLine], shipping_cost: Money) -> Self {
        let mut subtotal = Money::zero();
        let mut discount_total = Money::zero();
        let mut vat_total = Money::zero();
        for line in lines {
            subtotal += line.list_price.times(line.quantity);
            discount_total += line.list_price.times(line.quantity) - line.line_total;
            vat_total += line.vat_amount.times(line.quantity);
        }
        Self {
            subtotal,
            discount_total,
            shipping_cost,
            vat_total,
            grand_total: subtotal - discount_total + shipping_cost + vat_total,
        }
    }
}

/// A durable order, created exactly once per successful checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    /// Globally unique, `PREFIX-YYYYMMDD-NNNNN`.
    pub order_number: String,
    pub user_id: UserId,
    pub customer_id: Option<CustomerId>,
    pub flow_mode: FlowMode,
    pub status: OrderStatus,
    pub lines: Vec<OrderLine>,
    pub totals: OrderTotals,
    /// Unique when present; the sole defense against duplicate submission.
    pub idempotency_key: Option<String>,
    pub reservation: ReservationState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    #[allow(clippy::too_many_arguments)]
    pub fn create(
        order_number: String,
        user_id: UserId,
        customer_id: Option<CustomerId>,
        flow_mode: FlowMode,
        lines: Vec<OrderLine>,
        shipping_cost: Money,
        idempotency_key: Option<String>,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if lines.is_empty() {
            return Err(DomainError::EmptyCart);
        }

        let totals = OrderTotals::from_lines(&lines, shipping_cost);
        Ok(Self {
            id: OrderId::new(),
            order_number,
            user_id,
            customer_id,
            flow_mode,
            status: flow_mode.initial_status(),
            lines,
            totals,
            idempotency_key,
            reservation: ReservationState::Reserved,
            created_at: now,
            updated_at: now,
        })
    }

    /// `(product, quantity)` pairs for ledger calls.
    pub fn line_quantities(&self) -> Vec<(ProductId, u32)> {
        self.lines
            .iter()
            .map(|l| (l.product_id, l.quantity))
            .collect()
    }
}
