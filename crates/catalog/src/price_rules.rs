//! Customer-specific price rules: per-customer overrides and group price lists.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use merx_core::{CustomerId, DomainError, DomainResult, Money, PriceListId, ProductId, Rate};

/// What an override does to the price: pin it, or discount the base price.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverrideKind {
    Absolute(Money),
    DiscountPercent(Rate),
}

/// A per-customer, per-product price override.
///
/// `(customer_id, product_id)` is the unique key. The validity window is
/// half-open `[valid_from, valid_to)`; `None` means open-ended on that side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerPriceOverride {
    pub customer_id: CustomerId,
    pub product_id: ProductId,
    pub kind: OverrideKind,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_to: Option<DateTime<Utc>>,
    pub is_active: bool,
}

impl CustomerPriceOverride {
    /// Build an override from the raw admin-facing shape, where `price` and
    /// `discount_percent` arrive as independent optional columns.
    ///
    /// Exactly one of the two must be set; anything else is rejected here, at
    /// write time, so the read path never has to arbitrate a conflicting row.
    pub fn from_parts(
        customer_id: CustomerId,
        product_id: ProductId,
        price: Option<Money>,
        discount_percent: Option<Rate>,
        valid_from: Option<DateTime<Utc>>,
        valid_to: Option<DateTime<Utc>>,
        is_active: bool,
    ) -> DomainResult<Self> {
        let kind = match (price, discount_percent) {
            (Some(_), Some(_)) => {
                return Err(DomainError::price_rule_conflict(
                    "override cannot carry both an absolute price and a discount percent",
                ));
            }
            (None, None) => {
                return Err(DomainError::price_rule_conflict(
                    "override must carry either an absolute price or a discount percent",
                ));
            }
            (Some(p), None) => {
                if p.is_negative() {
                    return Err(DomainError::validation("override price cannot be negative"));
                }
                OverrideKind::Absolute(p)
            }
            (None, Some(r)) => {
                if r.bps() > 10_000 {
                    return Err(DomainError::validation("override discount cannot exceed 100%"));
                }
                OverrideKind::DiscountPercent(r)
            }
        };

        if let (Some(from), Some(to)) = (valid_from, valid_to) {
            if from >= to {
                return Err(DomainError::validation("valid_from must precede valid_to"));
            }
        }

        Ok(Self {
            customer_id,
            product_id,
            kind,
            valid_from,
            valid_to,
            is_active,
        })
    }

    /// Whether this override applies at `now` (active, window contains now).
    pub fn applies_at(&self, now: DateTime<Utc>) -> bool {
        if !self.is_active {
            return false;
        }
        if let Some(from) = self.valid_from {
            if now < from {
                return false;
            }
        }
        if let Some(to) = self.valid_to {
            if now >= to {
                return false;
            }
        }
        true
    }

    /// The unit price this override yields against the given base price.
    pub fn resolve(&self, base_price: Money) -> Money {
        match self.kind {
            OverrideKind::Absolute(price) => price,
            OverrideKind::DiscountPercent(rate) => base_price.apply_discount(rate),
        }
    }
}

/// Approval lifecycle of a price list.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceListStatus {
    Draft,
    PendingApproval,
    Approved,
    Rejected,
}

/// A named, prioritized set of per-product prices, assignable to one group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceList {
    pub id: PriceListId,
    pub name: String,
    pub priority: u32,
    pub status: PriceListStatus,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_to: Option<DateTime<Utc>>,
    pub items: HashMap<ProductId, Money>,
}

impl PriceList {
    /// Only approved lists inside their validity window participate in pricing.
    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        if self.status != PriceListStatus::Approved {
            return false;
        }
        if let Some(from) = self.valid_from {
            if now < from {
                return false;
            }
        }
        if let Some(to) = self.valid_to {
            if now >= to {
                return false;
            }
        }
        true
    }

    pub fn price_for(&self, product_id: ProductId) -> Option<Money> {
        self.items.get(&product_id).copied()
    }
}
