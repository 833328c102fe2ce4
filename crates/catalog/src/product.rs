//! Product read model: base price, VAT rate, quantity-break tiers.

use serde::{Deserialize, Serialize};

use merx_core::{DomainError, DomainResult, Money, ProductId, Rate};

/// A price tier that activates once ordered quantity reaches `min_qty`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuantityBreak {
    pub min_qty: u32,
    pub price: Money,
}

/// Catalog product as the pricing engine sees it.
///
/// Immutable during a pricing computation; only catalog management (external
/// to this core) replaces it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub sku: String,
    pub name: String,
    pub base_price: Money,
    pub vat_rate: Rate,
    /// Kept sorted by `min_qty` ascending; no two entries share a `min_qty`.
    quantity_breaks: Vec<QuantityBreak>,
}

impl Product {
    pub fn new(
        id: ProductId,
        sku: impl Into<String>,
        name: impl Into<String>,
        base_price: Money,
        vat_rate: Rate,
        mut quantity_breaks: Vec<QuantityBreak>,
    ) -> DomainResult<Self> {
        let sku = sku.into();
        if sku.trim().is_empty() {
            return Err(DomainError::validation("sku cannot be empty"));
        }
        if base_price.is_negative() {
            return Err(DomainError::validation("base_price cannot be negative"));
        }

        quantity_breaks.sort_by_key(|b| b.min_qty);
        for pair in quantity_breaks.windows(2) {
            if pair[0].min_qty == pair[1].min_qty {
                return Err(DomainError::validation(format!(
                    "duplicate quantity break for min_qty {}",
                    pair[0].min_qty
                )));
            }
        }
        for b in &quantity_breaks {
            if b.min_qty == 0 {
                return Err(DomainError::validation("quantity break min_qty must be >= 1"));
            }
            if b.price.is_negative() {
                return Err(DomainError::validation("quantity break price cannot be negative"));
            }
        }

        Ok(Self {
            id,
            sku,
            name: name.into(),
            base_price,
            vat_rate,
            quantity_breaks,
        })
    }

    pub fn quantity_breaks(&self) -> &[QuantityBreak] {
        &self.quantity_breaks
    }

    /// The deepest tier the ordered quantity qualifies for: highest `min_qty`
    /// with `min_qty <= quantity`.
    pub fn break_for(&self, quantity: u32) -> Option<QuantityBreak> {
        self.quantity_breaks
            .iter()
            .rev()
            .find(|b| b.min_qty <= quantity)
            .copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaks() -> Vec<QuantityBreak> {
        vec![
            QuantityBreak { min_qty: 50, price: Money::from_cents(8_000) },
            QuantityBreak { min_qty: 10, price: Money::from_cents(9_000) },
        ]
    }

    fn test_product() -> Product {
        Product::new(
            ProductId::new(),
            "SKU-1",
            "Widget",
            Money::from_cents(10_000),
            Rate::from_percent(20),
            breaks(),
        )
        .unwrap()
    }

    #[test]
    fn break_for_picks_highest_qualifying_tier() {
        let product = test_product();
        assert_eq!(product.break_for(9), None);
        assert_eq!(product.break_for(10).unwrap().price.cents(), 9_000);
        assert_eq!(product.break_for(49).unwrap().price.cents(), 9_000);
        assert_eq!(product.break_for(50).unwrap().price.cents(), 8_000);
        assert_eq!(product.break_for(500).unwrap().price.cents(), 8_000);
    }

    #[test]
    fn duplicate_min_qty_is_rejected() {
        let err = Product::new(
            ProductId::new(),
            "SKU-2",
            "Widget",
            Money::from_cents(100),
            Rate::from_percent(0),
            vec![
                QuantityBreak { min_qty: 10, price: Money::from_cents(90) },
                QuantityBreak { min_qty: 10, price: Money::from_cents(80) },
            ],
        )
        .unwrap_err();
        match err {
            DomainError::Validation(msg) => assert!(msg.contains("duplicate quantity break")),
            _ => panic!("Expected Validation error"),
        }
    }

    #[test]
    fn empty_sku_is_rejected() {
        let err = Product::new(
            ProductId::new(),
            "  ",
            "Widget",
            Money::from_cents(100),
            Rate::from_percent(0),
            vec![],
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }
}
