//! `merx-checkout` — the checkout orchestrator.
//!
//! Composes the pricing engine, inventory ledger, order store and event
//! outbox behind one service. The service is the only writer of orders;
//! carts, reservations, the order row and the outbox row move together in
//! one unit of work guarded by a single commit lock.

pub mod config;
pub mod service;
pub mod stores;

pub use config::CheckoutConfig;
pub use service::{CheckoutRequest, CheckoutService};
pub use stores::{CartStore, InMemoryOrderStore, OrderStore};
