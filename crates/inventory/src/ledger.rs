//! The reservation ledger.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use merx_core::{DomainError, DomainResult, ProductId, WarehouseId};

use crate::movement::{MovementType, StockMovement};

/// On-hand and reserved quantity for one `(product, warehouse)` pair.
///
/// `available = quantity - reserved`. Mutated exclusively through
/// [`StockLedger`]; never via direct field writes elsewhere.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct InventoryRecord {
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
    pub quantity: i64,
    pub reserved: i64,
}

impl InventoryRecord {
    fn empty(product_id: ProductId, warehouse_id: WarehouseId) -> Self {
        Self { product_id, warehouse_id, quantity: 0, reserved: 0 }
    }

    pub fn available(&self) -> i64 {
        self.quantity - self.reserved
    }
}

/// One ledger operation, quantities already signed where applicable.
#[derive(Debug, Copy, Clone)]
enum LedgerOp {
    Receive(i64),
    Adjust(i64),
    Reserve(i64),
    Release(i64),
    Commit(i64),
}

impl LedgerOp {
    fn movement_type(&self) -> MovementType {
        match self {
            LedgerOp::Receive(_) => MovementType::In,
            LedgerOp::Commit(_) => MovementType::Out,
            LedgerOp::Adjust(_) | LedgerOp::Reserve(_) | LedgerOp::Release(_) => {
                MovementType::Adjustment
            }
        }
    }
}

/// In-memory reservation ledger.
///
/// A single lock over the record map makes every mutation linearizable with
/// respect to any concurrent mutation of the same product (coarser than a
/// per-row lock, but bounded: no optimistic retry loop anywhere). Batch
/// operations validate every line against a staged copy before any of them
/// is applied, so a failing line leaves the ledger untouched.
#[derive(Debug, Default)]
pub struct StockLedger {
    inner: RwLock<LedgerInner>,
}

#[derive(Debug, Default)]
struct LedgerInner {
    records: HashMap<(ProductId, WarehouseId), InventoryRecord>,
    movements: Vec<StockMovement>,
}

fn poisoned(_: impl Sized) -> DomainError {
    DomainError::invariant("stock ledger lock poisoned")
}

fn positive(qty: u32) -> DomainResult<i64> {
    if qty == 0 {
        return Err(DomainError::validation("quantity must be positive"));
    }
    Ok(qty as i64)
}

impl StockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stock intake (purchase receipt, initial load). Writes a `type=in` movement.
    pub fn receive(
        &self,
        product_id: ProductId,
        warehouse_id: WarehouseId,
        qty: u32,
        correlation_id: Uuid,
    ) -> DomainResult<InventoryRecord> {
        let qty = positive(qty)?;
        self.apply_batch(&[(product_id, LedgerOp::Receive(qty))], warehouse_id, correlation_id)
    }

    /// Manual correction by a signed delta. Writes a `type=adjustment` movement.
    pub fn adjust(
        &self,
        product_id: ProductId,
        warehouse_id: WarehouseId,
        delta: i64,
        correlation_id: Uuid,
    ) -> DomainResult<InventoryRecord> {
        if delta == 0 {
            return Err(DomainError::validation("delta cannot be zero"));
        }
        self.apply_batch(&[(product_id, LedgerOp::Adjust(delta))], warehouse_id, correlation_id)
    }

    /// Soft-hold `qty` units. Fails with `InsufficientStock` when fewer than
    /// `qty` units are available; two concurrent reservations for the last
    /// unit cannot both succeed.
    pub fn reserve(
        &self,
        product_id: ProductId,
        warehouse_id: WarehouseId,
        qty: u32,
        correlation_id: Uuid,
    ) -> DomainResult<InventoryRecord> {
        let qty = positive(qty)?;
        self.apply_batch(&[(product_id, LedgerOp::Reserve(qty))], warehouse_id, correlation_id)
    }

    /// Give a reservation back (cancellation, return before shipment).
    pub fn release(
        &self,
        product_id: ProductId,
        warehouse_id: WarehouseId,
        qty: u32,
        correlation_id: Uuid,
    ) -> DomainResult<InventoryRecord> {
        let qty = positive(qty)?;
        self.apply_batch(&[(product_id, LedgerOp::Release(qty))], warehouse_id, correlation_id)
    }

    /// Convert a reservation into a real decrement (shipment). Writes a
    /// `type=out` movement.
    pub fn commit(
        &self,
        product_id: ProductId,
        warehouse_id: WarehouseId,
        qty: u32,
        correlation_id: Uuid,
    ) -> DomainResult<InventoryRecord> {
        let qty = positive(qty)?;
        self.apply_batch(&[(product_id, LedgerOp::Commit(qty))], warehouse_id, correlation_id)
    }

    /// Reserve every line or none of them.
    pub fn reserve_all(
        &self,
        lines: &[(ProductId, u32)],
        warehouse_id: WarehouseId,
        correlation_id: Uuid,
    ) -> DomainResult<()> {
        let ops = Self::batch_ops(lines, LedgerOp::Reserve)?;
        self.apply_batch(&ops, warehouse_id, correlation_id)?;
        Ok(())
    }

    /// Release every line or none of them.
    pub fn release_all(
        &self,
        lines: &[(ProductId, u32)],
        warehouse_id: WarehouseId,
        correlation_id: Uuid,
    ) -> DomainResult<()> {
        let ops = Self::batch_ops(lines, LedgerOp::Release)?;
        self.apply_batch(&ops, warehouse_id, correlation_id)?;
        Ok(())
    }

    /// Commit every line or none of them.
    pub fn commit_all(
        &self,
        lines: &[(ProductId, u32)],
        warehouse_id: WarehouseId,
        correlation_id: Uuid,
    ) -> DomainResult<()> {
        let ops = Self::batch_ops(lines, LedgerOp::Commit)?;
        self.apply_batch(&ops, warehouse_id, correlation_id)?;
        Ok(())
    }

    pub fn record(
        &self,
        product_id: ProductId,
        warehouse_id: WarehouseId,
    ) -> DomainResult<Option<InventoryRecord>> {
        Ok(self
            .inner
            .read()
            .map_err(poisoned)?
            .records
            .get(&(product_id, warehouse_id))
            .copied())
    }

    pub fn available(
        &self,
        product_id: ProductId,
        warehouse_id: WarehouseId,
    ) -> DomainResult<i64> {
        Ok(self
            .record(product_id, warehouse_id)?
            .map(|r| r.available())
            .unwrap_or(0))
    }

    pub fn movements(&self) -> DomainResult<Vec<StockMovement>> {
        Ok(self.inner.read().map_err(poisoned)?.movements.clone())
    }

    pub fn movements_for(&self, correlation_id: Uuid) -> DomainResult<Vec<StockMovement>> {
        Ok(self
            .inner
            .read()
            .map_err(poisoned)?
            .movements
            .iter()
            .filter(|m| m.correlation_id == correlation_id)
            .cloned()
            .collect())
    }

    fn batch_ops(
        lines: &[(ProductId, u32)],
        make: fn(i64) -> LedgerOp,
    ) -> DomainResult<Vec<(ProductId, LedgerOp)>> {
        lines
            .iter()
            .map(|(product_id, qty)| Ok((*product_id, make(positive(*qty)?))))
            .collect()
    }

    /// Apply a batch atomically: validate every op against a staged copy of
    /// the affected records, then write records and movements together.
    fn apply_batch(
        &self,
        ops: &[(ProductId, LedgerOp)],
        warehouse_id: WarehouseId,
        correlation_id: Uuid,
    ) -> DomainResult<InventoryRecord> {
        let mut inner = self.inner.write().map_err(poisoned)?;

        let mut staged: HashMap<(ProductId, WarehouseId), InventoryRecord> = HashMap::new();
        let mut movements = Vec::with_capacity(ops.len());
        let mut last = None;

        for (product_id, op) in ops {
            let key = (*product_id, warehouse_id);
            let current = *staged.get(&key).unwrap_or(
                inner
                    .records
                    .get(&key)
                    .unwrap_or(&InventoryRecord::empty(*product_id, warehouse_id)),
            );

            let next = Self::checked_apply(current, *op)?;
            movements.push(StockMovement {
                id: Uuid::now_v7(),
                product_id: *product_id,
                warehouse_id,
                movement_type: op.movement_type(),
                quantity_delta: next.quantity - current.quantity,
                previous_quantity: current.quantity,
                new_quantity: next.quantity,
                previous_reserved: current.reserved,
                new_reserved: next.reserved,
                correlation_id,
                occurred_at: Utc::now(),
            });
            staged.insert(key, next);
            last = Some(next);
        }

        // Every line validated; make the whole batch durable at once.
        for (key, record) in staged {
            inner.records.insert(key, record);
        }
        inner.movements.extend(movements);

        let record = last.ok_or_else(|| DomainError::validation("empty ledger batch"))?;
        debug!(
            product = %record.product_id,
            quantity = record.quantity,
            reserved = record.reserved,
            "ledger updated"
        );
        Ok(record)
    }

    /// Post-condition on every op: `0 <= reserved <= quantity`.
    fn checked_apply(current: InventoryRecord, op: LedgerOp) -> DomainResult<InventoryRecord> {
        let (quantity, reserved, requested, available) = match op {
            LedgerOp::Receive(n) => (current.quantity + n, current.reserved, n, i64::MAX),
            LedgerOp::Adjust(d) => (current.quantity + d, current.reserved, d.abs(), current.available()),
            LedgerOp::Reserve(n) => (current.quantity, current.reserved + n, n, current.available()),
            LedgerOp::Release(n) => (current.quantity, current.reserved - n, n, current.reserved),
            LedgerOp::Commit(n) => (current.quantity - n, current.reserved - n, n, current.reserved),
        };

        if reserved < 0 || quantity < 0 || reserved > quantity {
            return Err(DomainError::InsufficientStock {
                product_id: current.product_id,
                requested,
                available,
            });
        }

        Ok(InventoryRecord { quantity, reserved, ..current })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Arc;

    fn ids() -> (ProductId, WarehouseId, Uuid) {
        (ProductId::new(), WarehouseId::new(), Uuid::now_v7())
    }

    #[test]
    fn reserve_release_commit_round_trip() {
        let (product, warehouse, corr) = ids();
        let ledger = StockLedger::new();
        ledger.receive(product, warehouse, 10, corr).unwrap();

        let after_reserve = ledger.reserve(product, warehouse, 4, corr).unwrap();
        assert_eq!(after_reserve.quantity, 10);
        assert_eq!(after_reserve.reserved, 4);
        assert_eq!(after_reserve.available(), 6);

        let after_release = ledger.release(product, warehouse, 1, corr).unwrap();
        assert_eq!(after_release.reserved, 3);

        let after_commit = ledger.commit(product, warehouse, 3, corr).unwrap();
        assert_eq!(after_commit.quantity, 7);
        assert_eq!(after_commit.reserved, 0);
    }

    #[test]
    fn oversell_is_rejected_and_state_unchanged() {
        let (product, warehouse, corr) = ids();
        let ledger = StockLedger::new();
        ledger.receive(product, warehouse, 5, corr).unwrap();
        ledger.reserve(product, warehouse, 3, corr).unwrap();

        let err = ledger.reserve(product, warehouse, 3, corr).unwrap_err();
        match err {
            DomainError::InsufficientStock { requested, available, .. } => {
                assert_eq!(requested, 3);
                assert_eq!(available, 2);
            }
            _ => panic!("Expected InsufficientStock"),
        }

        let record = ledger.record(product, warehouse).unwrap().unwrap();
        assert_eq!(record.quantity, 5);
        assert_eq!(record.reserved, 3);
    }

    #[test]
    fn release_more_than_reserved_is_rejected() {
        let (product, warehouse, corr) = ids();
        let ledger = StockLedger::new();
        ledger.receive(product, warehouse, 5, corr).unwrap();
        ledger.reserve(product, warehouse, 2, corr).unwrap();

        let err = ledger.release(product, warehouse, 3, corr).unwrap_err();
        assert!(matches!(err, DomainError::InsufficientStock { .. }));
    }

    #[test]
    fn reserve_on_unknown_product_is_insufficient() {
        let (product, warehouse, corr) = ids();
        let ledger = StockLedger::new();
        let err = ledger.reserve(product, warehouse, 1, corr).unwrap_err();
        match err {
            DomainError::InsufficientStock { available, .. } => assert_eq!(available, 0),
            _ => panic!("Expected InsufficientStock"),
        }
    }

    #[test]
    fn failed_batch_leaves_every_line_untouched() {
        let warehouse = WarehouseId::new();
        let corr = Uuid::now_v7();
        let ledger = StockLedger::new();
        let stocked = ProductId::new();
        let scarce = ProductId::new();
        ledger.receive(stocked, warehouse, 100, corr).unwrap();
        ledger.receive(scarce, warehouse, 1, corr).unwrap();

        let err = ledger
            .reserve_all(&[(stocked, 5), (scarce, 2)], warehouse, corr)
            .unwrap_err();
        assert!(matches!(err, DomainError::InsufficientStock { .. }));

        // The first line must not have been partially applied.
        assert_eq!(ledger.record(stocked, warehouse).unwrap().unwrap().reserved, 0);
        assert_eq!(ledger.record(scarce, warehouse).unwrap().unwrap().reserved, 0);
    }

    #[test]
    fn batch_accumulates_repeated_products() {
        let warehouse = WarehouseId::new();
        let corr = Uuid::now_v7();
        let ledger = StockLedger::new();
        let product = ProductId::new();
        ledger.receive(product, warehouse, 5, corr).unwrap();

        // 3 + 3 exceeds the 5 available even though each line alone fits.
        let err = ledger
            .reserve_all(&[(product, 3), (product, 3)], warehouse, corr)
            .unwrap_err();
        assert!(matches!(err, DomainError::InsufficientStock { .. }));
        assert_eq!(ledger.record(product, warehouse).unwrap().unwrap().reserved, 0);
    }

    #[test]
    fn every_mutation_writes_one_movement() {
        let (product, warehouse, _) = ids();
        let corr = Uuid::now_v7();
        let ledger = StockLedger::new();

        ledger.receive(product, warehouse, 10, corr).unwrap();
        ledger.reserve(product, warehouse, 4, corr).unwrap();
        ledger.commit(product, warehouse, 4, corr).unwrap();

        let movements = ledger.movements_for(corr).unwrap();
        assert_eq!(movements.len(), 3);
        assert_eq!(movements[0].movement_type, MovementType::In);
        assert_eq!(movements[1].movement_type, MovementType::Adjustment);
        assert_eq!(movements[1].quantity_delta, 0);
        assert_eq!(movements[1].new_reserved, 4);
        assert_eq!(movements[2].movement_type, MovementType::Out);
        assert_eq!(movements[2].quantity_delta, -4);
    }

    #[test]
    fn concurrent_reservations_for_last_unit_admit_exactly_one() {
        let warehouse = WarehouseId::new();
        let product = ProductId::new();
        let ledger = Arc::new(StockLedger::new());
        ledger.receive(product, warehouse, 1, Uuid::now_v7()).unwrap();

        let threads = 16;
        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let ledger = Arc::clone(&ledger);
                std::thread::spawn(move || {
                    ledger.reserve(product, warehouse, 1, Uuid::now_v7()).is_ok()
                })
            })
            .collect();

        let successes = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|&ok| ok)
            .count();
        assert_eq!(successes, 1);

        let record = ledger.record(product, warehouse).unwrap().unwrap();
        assert_eq!(record.reserved, 1);
        assert_eq!(record.available(), 0);
    }

    /// A random op against the ledger; invalid ops are expected to fail
    /// without changing state.
    #[derive(Debug, Clone)]
    enum Op {
        Receive(u32),
        Reserve(u32),
        Release(u32),
        Commit(u32),
        Adjust(i64),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (1u32..50).prop_map(Op::Receive),
            (1u32..50).prop_map(Op::Reserve),
            (1u32..50).prop_map(Op::Release),
            (1u32..50).prop_map(Op::Commit),
            (-50i64..50).prop_map(Op::Adjust),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: after any sequence of ledger calls, successful or not,
        /// `0 <= reserved <= quantity` holds.
        #[test]
        fn invariant_holds_after_any_op_sequence(ops in prop::collection::vec(op_strategy(), 1..40)) {
            let (product, warehouse, corr) = ids();
            let ledger = StockLedger::new();

            for op in ops {
                let _ = match op {
                    Op::Receive(n) => ledger.receive(product, warehouse, n, corr),
                    Op::Reserve(n) => ledger.reserve(product, warehouse, n, corr),
                    Op::Release(n) => ledger.release(product, warehouse, n, corr),
                    Op::Commit(n) => ledger.commit(product, warehouse, n, corr),
                    Op::Adjust(d) if d != 0 => ledger.adjust(product, warehouse, d, corr),
                    Op::Adjust(_) => continue,
                };

                if let Some(record) = ledger.record(product, warehouse).unwrap() {
                    prop_assert!(record.reserved >= 0);
                    prop_assert!(record.quantity >= 0);
                    prop_assert!(record.reserved <= record.quantity);
                }
            }
        }
    }
}
