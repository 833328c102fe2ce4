//! Price resolution engine.
//!
//! Resolution order (first match wins; each exclusive layer runs only when
//! the previous produced nothing):
//!
//! 1. customer override (active, window contains `now`)
//! 2. group price list (approved + currently valid, contains the product)
//! 3. flat group discount (`discount > 0`)
//! 4. quantity break — evaluated *unconditionally* whenever `quantity > 1`
//!    and tiers exist, overriding only if strictly cheaper
//! 5. base price fallback
//!
//! Guest lookups (`customer_id = None`) skip layers 1-3 entirely.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use merx_catalog::{CustomerGroup, PriceRuleStore};
use merx_core::{CustomerId, DomainError, DomainResult, Money, ProductId};

/// Which rule layer produced the final unit price.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppliedRule {
    CustomerOverride,
    PriceList,
    GroupDiscount,
    QuantityBreak,
    BasePrice,
}

impl AppliedRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppliedRule::CustomerOverride => "customer_override",
            AppliedRule::PriceList => "price_list",
            AppliedRule::GroupDiscount => "group_discount",
            AppliedRule::QuantityBreak => "quantity_break",
            AppliedRule::BasePrice => "base_price",
        }
    }
}

/// Candidate value of every evaluated layer, kept for audit/debugging.
///
/// A `None` means the layer was never reached (earlier layer matched) or had
/// nothing to offer; it is never a silently discarded candidate.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PriceBreakdown {
    pub base_price: Money,
    pub customer_override: Option<Money>,
    pub price_list: Option<Money>,
    pub group_discount: Option<Money>,
    pub quantity_break: Option<Money>,
}

/// One line to price.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceRequest {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// Resolved price for one line.
///
/// `unit_price` and `vat_amount` are per unit, already rounded to the cent;
/// line-level figures multiply the rounded per-unit values (aggregates are
/// never re-derived from re-rounded sums).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceResult {
    pub product_id: ProductId,
    pub sku: String,
    pub quantity: u32,
    pub unit_price: Money,
    pub vat_amount: Money,
    pub total_with_vat: Money,
    pub applied_rule: AppliedRule,
    pub breakdown: PriceBreakdown,
}

impl PriceResult {
    /// `unit_price * quantity`.
    pub fn line_total(&self) -> Money {
        self.unit_price.times(self.quantity)
    }

    /// Per-line VAT: the rounded per-unit VAT times quantity.
    pub fn line_vat(&self) -> Money {
        self.vat_amount.times(self.quantity)
    }

    /// What the line would cost at the undiscounted base price.
    pub fn line_list_total(&self) -> Money {
        self.breakdown.base_price.times(self.quantity)
    }

    /// Rule savings granted on this line relative to the base price.
    pub fn line_discount(&self) -> Money {
        self.line_list_total() - self.line_total()
    }
}

/// Totals for a multi-line cart: the pointwise sum of per-line results.
///
/// `subtotal` is the gross (base-price) total; `grand_total =
/// subtotal - discount_total + vat_total`, each component summed from
/// already-rounded per-line values. Shipping is the orchestrator's concern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartTotal {
    pub lines: Vec<PriceResult>,
    pub subtotal: Money,
    pub discount_total: Money,
    pub vat_total: Money,
    pub grand_total: Money,
}

/// Resolve the unit price for one product/quantity/customer triple.
///
/// Pure given a consistent store read; `now` is injected so validity-window
/// checks are deterministic under test.
pub fn resolve_price<S: PriceRuleStore + ?Sized>(
    store: &S,
    product_id: ProductId,
    quantity: u32,
    customer_id: Option<CustomerId>,
    now: DateTime<Utc>,
) -> DomainResult<PriceResult> {
    if quantity == 0 {
        return Err(DomainError::validation("quantity must be at least 1"));
    }

    let product = store.product(product_id)?;
    let mut breakdown = PriceBreakdown {
        base_price: product.base_price,
        ..PriceBreakdown::default()
    };
    let mut winner = (product.base_price, AppliedRule::BasePrice);

    if let Some(customer_id) = customer_id {
        let customer = store
            .customer(customer_id)?
            .ok_or_else(|| DomainError::not_found(format!("customer {customer_id}")))?;

        let active_override = store
            .override_for(customer_id, product_id)?
            .filter(|o| o.applies_at(now));

        if let Some(ovr) = active_override {
            let price = ovr.resolve(product.base_price);
            breakdown.customer_override = Some(price);
            winner = (price, AppliedRule::CustomerOverride);
        } else if let Some(group) = load_group(store, &customer)? {
            if let Some(list_price) = list_price_for(store, &group, product_id, now)? {
                breakdown.price_list = Some(list_price);
                winner = (list_price, AppliedRule::PriceList);
            } else if !group.discount.is_zero() {
                let discounted = product.base_price.apply_discount(group.discount);
                breakdown.group_discount = Some(discounted);
                winner = (discounted, AppliedRule::GroupDiscount);
            }
        }
    }

    // The quantity break is not an exclusive layer: it is always evaluated
    // last and only wins by strict comparison against whatever rule fired.
    if quantity > 1 {
        if let Some(tier) = product.break_for(quantity) {
            breakdown.quantity_break = Some(tier.price);
            if tier.price < winner.0 {
                winner = (tier.price, AppliedRule::QuantityBreak);
            }
        }
    }

    let (unit_price, applied_rule) = winner;
    let vat_amount = unit_price.tax(product.vat_rate);

    debug!(
        product = %product_id,
        quantity,
        rule = applied_rule.as_str(),
        unit_price = %unit_price,
        "resolved price"
    );

    Ok(PriceResult {
        product_id,
        sku: product.sku,
        quantity,
        unit_price,
        vat_amount,
        total_with_vat: unit_price + vat_amount,
        applied_rule,
        breakdown,
    })
}

/// Resolve many lines at once; any line failure aborts the whole batch.
pub fn resolve_bulk<S: PriceRuleStore + ?Sized>(
    store: &S,
    requests: &[PriceRequest],
    customer_id: Option<CustomerId>,
    now: DateTime<Utc>,
) -> DomainResult<Vec<PriceResult>> {
    requests
        .iter()
        .map(|r| resolve_price(store, r.product_id, r.quantity, customer_id, now))
        .collect()
}

/// Resolve a cart's lines and fold them into totals.
pub fn resolve_cart_total<S: PriceRuleStore + ?Sized>(
    store: &S,
    requests: &[PriceRequest],
    customer_id: Option<CustomerId>,
    now: DateTime<Utc>,
) -> DomainResult<CartTotal> {
    let lines = resolve_bulk(store, requests, customer_id, now)?;

    let mut subtotal = Money::zero();
    let mut discount_total = Money::zero();
    let mut vat_total = Money::zero();
    for line in &lines {
        subtotal += line.line_list_total();
        discount_total += line.line_discount();
        vat_total += line.line_vat();
    }

    Ok(CartTotal {
        grand_total: subtotal - discount_total + vat_total,
        lines,
        subtotal,
        discount_total,
        vat_total,
    })
}

fn load_group<S: PriceRuleStore + ?Sized>(
    store: &S,
    customer: &merx_catalog::Customer,
) -> DomainResult<Option<CustomerGroup>> {
    match customer.group_id {
        Some(group_id) => store.group(group_id),
        None => Ok(None),
    }
}

fn list_price_for<S: PriceRuleStore + ?Sized>(
    store: &S,
    group: &CustomerGroup,
    product_id: ProductId,
    now: DateTime<Utc>,
) -> DomainResult<Option<Money>> {
    let Some(list_id) = group.price_list_id else {
        return Ok(None);
    };
    let Some(list) = store.price_list(list_id)? else {
        return Ok(None);
    };
    if !list.is_usable_at(now) {
        return Ok(None);
    }
    Ok(list.price_for(product_id))
}
