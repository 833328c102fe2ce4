//! Human-readable order numbers: `PREFIX-YYYYMMDD-NNNNN`.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, NaiveDate, Utc};

use merx_core::{DomainError, DomainResult};

/// Hands out order numbers with a per-day counter, starting at 1 each
/// calendar day (UTC). Safe to share across threads.
#[derive(Debug)]
pub struct OrderNumberSequence {
    prefix: String,
    counters: Mutex<HashMap<NaiveDate, u32>>,
}

impl OrderNumberSequence {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counters: Mutex::new(HashMap::new()),
        }
    }

    pub fn next(&self, now: DateTime<Utc>) -> DomainResult<String> {
        let day = now.date_naive();
        let mut counters = self
            .counters
            .lock()
            .map_err(|_| DomainError::invariant("order number sequence lock poisoned"))?;
        let counter = counters.entry(day).or_insert(0);
        *counter += 1;
        Ok(format!(
            "{}-{}-{:05}",
            self.prefix,
            day.format("%Y%m%d"),
            counter
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn numbers_increment_within_a_day() {
        let seq = OrderNumberSequence::new("SO");
        let now = Utc.with_ymd_and_hms(2026, 8, 24, 12, 0, 0).unwrap();
        assert_eq!(seq.next(now).unwrap(), "SO-20260824-00001");
        assert_eq!(seq.next(now).unwrap(), "SO-20260824-00002");
    }

    #[test]
    fn counter_resets_on_a_new_day() {
        let seq = OrderNumberSequence::new("SO");
        let monday = Utc.with_ymd_and_hms(2026, 8, 24, 23, 59, 0).unwrap();
        let tuesday = Utc.with_ymd_and_hms(2026, 8, 25, 0, 1, 0).unwrap();
        seq.next(monday).unwrap();
        assert_eq!(seq.next(tuesday).unwrap(), "SO-20260825-00001");
    }

    #[test]
    fn concurrent_callers_never_collide() {
        let seq = Arc::new(OrderNumberSequence::new("SO"));
        let now = Utc::now();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let seq = Arc::clone(&seq);
                std::thread::spawn(move || {
                    (0..50).map(|_| seq.next(now).unwrap()).collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for number in handle.join().unwrap() {
                assert!(seen.insert(number), "duplicate order number");
            }
        }
        assert_eq!(seen.len(), 400);
    }
}
