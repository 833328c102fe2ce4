//! Append-only audit of ledger changes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use merx_core::{ProductId, WarehouseId};

/// Category of a stock movement.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementType {
    In,
    Out,
    Adjustment,
    Transfer,
    Return,
}

/// One audit row per ledger mutation. Never updated, never deleted.
///
/// Reservation-only changes leave `quantity_delta` at zero; the
/// previous/new reserved columns capture what moved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovement {
    pub id: Uuid,
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
    pub movement_type: MovementType,
    pub quantity_delta: i64,
    pub previous_quantity: i64,
    pub new_quantity: i64,
    pub previous_reserved: i64,
    pub new_reserved: i64,
    /// Ties the movement back to the operation that caused it (order id for
    /// checkout/status changes).
    pub correlation_id: Uuid,
    pub occurred_at: DateTime<Utc>,
}
