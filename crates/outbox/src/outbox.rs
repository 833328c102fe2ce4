use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use merx_core::{DomainError, DomainResult, OrderId};

/// One undelivered (or delivered) event, written in the same unit of work as
/// the state change it announces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboxRow {
    pub id: Uuid,
    pub order_id: OrderId,
    /// Dot-separated, e.g. `order.created`, `order.status_changed`.
    pub event_type: String,
    pub payload: serde_json::Value,
    pub processed: bool,
    pub retry_count: u32,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl OutboxRow {
    pub fn new(
        order_id: OrderId,
        event_type: impl Into<String>,
        payload: serde_json::Value,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            order_id,
            event_type: event_type.into(),
            payload,
            processed: false,
            retry_count: 0,
            created_at: now,
            processed_at: None,
        }
    }
}

/// Append-only from the domain side; `pending`/`mark_processed`/
/// `record_failure` belong to the delivery relay.
pub trait Outbox: Send + Sync {
    fn append(&self, row: OutboxRow) -> DomainResult<()>;

    /// Up to `limit` unprocessed rows in insertion order.
    fn pending(&self, limit: usize) -> DomainResult<Vec<OutboxRow>>;

    fn mark_processed(&self, id: Uuid, now: DateTime<Utc>) -> DomainResult<()>;

    /// A delivery attempt failed; the row stays pending with its retry count
    /// bumped.
    fn record_failure(&self, id: Uuid) -> DomainResult<()>;
}

/// In-memory outbox. Rows are kept forever; insertion order is the only
/// ordering guarantee.
#[derive(Debug, Default)]
pub struct InMemoryOutbox {
    rows: RwLock<Vec<OutboxRow>>,
}

impl InMemoryOutbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every row ever appended, processed or not. Test and audit surface.
    pub fn all(&self) -> DomainResult<Vec<OutboxRow>> {
        Ok(self.rows.read().map_err(poisoned)?.clone())
    }

    fn with_row<T>(
        &self,
        id: Uuid,
        f: impl FnOnce(&mut OutboxRow) -> T,
    ) -> DomainResult<T> {
        let mut rows = self.rows.write().map_err(poisoned)?;
        match rows.iter_mut().find(|r| r.id == id) {
            Some(row) => Ok(f(row)),
            None => Err(DomainError::not_found(format!("outbox row {id}"))),
        }
    }
}

impl Outbox for InMemoryOutbox {
    fn append(&self, row: OutboxRow) -> DomainResult<()> {
        tracing::debug!(event_type = %row.event_type, order_id = %row.order_id, "outbox append");
        self.rows.write().map_err(poisoned)?.push(row);
        Ok(())
    }

    fn pending(&self, limit: usize) -> DomainResult<Vec<OutboxRow>> {
        Ok(self
            .rows
            .read()
            .map_err(poisoned)?
            .iter()
            .filter(|r| !r.processed)
            .take(limit)
            .cloned()
            .collect())
    }

    fn mark_processed(&self, id: Uuid, now: DateTime<Utc>) -> DomainResult<()> {
        self.with_row(id, |row| {
            row.processed = true;
            row.processed_at = Some(now);
        })
    }

    fn record_failure(&self, id: Uuid) -> DomainResult<()> {
        self.with_row(id, |row| row.retry_count += 1)
    }
}

fn poisoned(_: impl Sized) -> DomainError {
    DomainError::invariant("outbox lock poisoned")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(event_type: &str) -> OutboxRow {
        OutboxRow::new(OrderId::new(), event_type, json!({"n": 1}), Utc::now())
    }

    #[test]
    fn pending_returns_unprocessed_rows_in_insertion_order() {
        let outbox = InMemoryOutbox::new();
        let first = row("order.created");
        let second = row("order.status_changed");
        outbox.append(first.clone()).unwrap();
        outbox.append(second.clone()).unwrap();

        outbox.mark_processed(first.id, Utc::now()).unwrap();

        let pending = outbox.pending(10).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, second.id);
        assert_eq!(outbox.all().unwrap().len(), 2);
        assert!(outbox.pending(0).unwrap().is_empty());
    }

    #[test]
    fn mark_processed_stamps_the_row() {
        let outbox = InMemoryOutbox::new();
        let r = row("order.created");
        outbox.append(r.clone()).unwrap();

        let when = Utc::now();
        outbox.mark_processed(r.id, when).unwrap();

        let all = outbox.all().unwrap();
        assert!(all[0].processed);
        assert_eq!(all[0].processed_at, Some(when));
    }

    #[test]
    fn failure_bumps_retry_count_and_keeps_row_pending() {
        let outbox = InMemoryOutbox::new();
        let r = row("order.created");
        outbox.append(r.clone()).unwrap();

        outbox.record_failure(r.id).unwrap();
        outbox.record_failure(r.id).unwrap();

        let pending = outbox.pending(10).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].retry_count, 2);
    }

    #[test]
    fn unknown_row_is_not_found() {
        let outbox = InMemoryOutbox::new();
        let err = outbox.mark_processed(Uuid::now_v7(), Utc::now()).unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
    }
}
