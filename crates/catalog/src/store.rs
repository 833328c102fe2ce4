//! Read access to the price rule layers, behind a trait so the pricing
//! engine can run against any backend (in-memory here; a SQL read model
//! plugs in at the same seam).

use std::collections::HashMap;
use std::sync::RwLock;

use merx_core::{CustomerGroupId, CustomerId, DomainError, DomainResult, PriceListId, ProductId};

use crate::customer::{Customer, CustomerGroup};
use crate::price_rules::{CustomerPriceOverride, PriceList};
use crate::product::Product;

/// Consistent read view over products, overrides, groups and price lists.
///
/// Pricing is a pure function of this view; implementations must never be
/// mutated by a pricing call.
pub trait PriceRuleStore: Send + Sync {
    fn product(&self, id: ProductId) -> DomainResult<Product>;

    fn override_for(
        &self,
        customer_id: CustomerId,
        product_id: ProductId,
    ) -> DomainResult<Option<CustomerPriceOverride>>;

    fn customer(&self, id: CustomerId) -> DomainResult<Option<Customer>>;

    fn group(&self, id: CustomerGroupId) -> DomainResult<Option<CustomerGroup>>;

    fn price_list(&self, id: PriceListId) -> DomainResult<Option<PriceList>>;
}

/// In-memory price rule store.
///
/// Intended for tests/dev and as the reference implementation. Writes exist
/// only for seeding; the checkout core never calls them.
#[derive(Debug, Default)]
pub struct InMemoryPriceRuleStore {
    products: RwLock<HashMap<ProductId, Product>>,
    overrides: RwLock<HashMap<(CustomerId, ProductId), CustomerPriceOverride>>,
    customers: RwLock<HashMap<CustomerId, Customer>>,
    groups: RwLock<HashMap<CustomerGroupId, CustomerGroup>>,
    price_lists: RwLock<HashMap<PriceListId, PriceList>>,
}

fn poisoned(_: impl Sized) -> DomainError {
    DomainError::invariant("price rule store lock poisoned")
}

impl InMemoryPriceRuleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_product(&self, product: Product) -> DomainResult<()> {
        self.products
            .write()
            .map_err(poisoned)?
            .insert(product.id, product);
        Ok(())
    }

    pub fn put_override(&self, ovr: CustomerPriceOverride) -> DomainResult<()> {
        self.overrides
            .write()
            .map_err(poisoned)?
            .insert((ovr.customer_id, ovr.product_id), ovr);
        Ok(())
    }

    pub fn put_customer(&self, customer: Customer) -> DomainResult<()> {
        self.customers
            .write()
            .map_err(poisoned)?
            .insert(customer.id, customer);
        Ok(())
    }

    pub fn put_group(&self, group: CustomerGroup) -> DomainResult<()> {
        self.groups.write().map_err(poisoned)?.insert(group.id, group);
        Ok(())
    }

    pub fn put_price_list(&self, list: PriceList) -> DomainResult<()> {
        self.price_lists
            .write()
            .map_err(poisoned)?
            .insert(list.id, list);
        Ok(())
    }
}

impl PriceRuleStore for InMemoryPriceRuleStore {
    fn product(&self, id: ProductId) -> DomainResult<Product> {
        self.products
            .read()
            .map_err(poisoned)?
            .get(&id)
            .cloned()
            .ok_or_else(|| DomainError::not_found(format!("product {id}")))
    }

    fn override_for(
        &self,
        customer_id: CustomerId,
        product_id: ProductId,
    ) -> DomainResult<Option<CustomerPriceOverride>> {
        Ok(self
            .overrides
            .read()
            .map_err(poisoned)?
            .get(&(customer_id, product_id))
            .cloned())
    }

    fn customer(&self, id: CustomerId) -> DomainResult<Option<Customer>> {
        Ok(self.customers.read().map_err(poisoned)?.get(&id).cloned())
    }

    fn group(&self, id: CustomerGroupId) -> DomainResult<Option<CustomerGroup>> {
        Ok(self.groups.read().map_err(poisoned)?.get(&id).cloned())
    }

    fn price_list(&self, id: PriceListId) -> DomainResult<Option<PriceList>> {
        Ok(self.price_lists.read().map_err(poisoned)?.get(&id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use merx_core::{Money, Rate};

    #[test]
    fn unknown_product_is_not_found() {
        let store = InMemoryPriceRuleStore::new();
        let err = store.product(ProductId::new()).unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
    }

    #[test]
    fn put_then_get_product() {
        let store = InMemoryPriceRuleStore::new();
        let product = Product::new(
            ProductId::new(),
            "SKU-9",
            "Gadget",
            Money::from_cents(1_500),
            Rate::from_percent(20),
            vec![],
        )
        .unwrap();
        store.put_product(product.clone()).unwrap();
        assert_eq!(store.product(product.id).unwrap(), product);
    }
}
