//! `merx-pricing` — layered price resolution.
//!
//! A pure function over a consistent read of the price rule store: customer
//! override, then group price list, then flat group discount, with the
//! quantity break always evaluated last and winning only when strictly
//! cheaper. No catalog data is ever mutated here.

pub mod engine;

pub use engine::{
    resolve_bulk, resolve_cart_total, resolve_price, AppliedRule, CartTotal, PriceBreakdown,
    PriceRequest, PriceResult,
};
