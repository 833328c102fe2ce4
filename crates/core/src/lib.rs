//! `merx-core` — domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! strongly-typed identifiers, monetary values in integer minor units, rates
//! in basis points, and the error taxonomy shared by every other crate.

pub mod error;
pub mod id;
pub mod money;

pub use error::{DomainError, DomainResult};
pub use id::{
    CartId, CustomerGroupId, CustomerId, OrderId, PriceListId, ProductId, UserId, WarehouseId,
};
pub use money::{Money, Rate};
