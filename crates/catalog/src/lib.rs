//! `merx-catalog` — read model for the pricing rule layers.
//!
//! Products, customers, customer groups, per-customer overrides and approved
//! price lists. The pricing engine only ever *reads* this crate's types; all
//! mutation happens through catalog management, which validates rule rows at
//! write time.

pub mod customer;
pub mod price_rules;
pub mod product;
pub mod store;

pub use customer::{Customer, CustomerGroup};
pub use price_rules::{CustomerPriceOverride, OverrideKind, PriceList, PriceListStatus};
pub use product::{Product, QuantityBreak};
pub use store::{InMemoryPriceRuleStore, PriceRuleStore};
