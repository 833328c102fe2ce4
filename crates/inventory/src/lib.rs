//! `merx-inventory` — the reservation ledger.
//!
//! Holds on-hand and reserved quantity per `(product, warehouse)` and exposes
//! atomic reserve/release/commit operations. The invariant
//! `0 <= reserved <= quantity` holds after every call; a call that would
//! break it fails with `InsufficientStock` and changes nothing. Every
//! mutation appends one `StockMovement` audit row in the same critical
//! section as the ledger change.

pub mod ledger;
pub mod movement;

pub use ledger::{InventoryRecord, StockLedger};
pub use movement::{MovementType, StockMovement};
