//! `merx-orders` — carts, orders, and the order-status state machine.
//!
//! Pure domain types: no store access here. The checkout orchestrator
//! (`merx-checkout`) composes these with the pricing engine, the inventory
//! ledger and the outbox.

pub mod cart;
pub mod number;
pub mod order;
pub mod status;

pub use cart::{Cart, CartItem};
pub use number::OrderNumberSequence;
pub use order::{Order, OrderLine, OrderTotals, ReservationState};
pub use status::{FlowMode, OrderStatus};
