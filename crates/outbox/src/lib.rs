//! `merx-outbox` — transactional event outbox.
//!
//! Domain code only ever *appends* rows, inside the same unit of work as the
//! state change the row describes. Delivery to external consumers is a
//! separate concern: a relay polls [`Outbox::pending`] and acknowledges with
//! [`Outbox::mark_processed`] or [`Outbox::record_failure`].

pub mod outbox;

pub use outbox::{InMemoryOutbox, Outbox, OutboxRow};
