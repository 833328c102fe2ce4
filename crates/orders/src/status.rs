//! Order lifecycle: flow modes and the forward-only status machine.

use core::fmt;
use serde::{Deserialize, Serialize};

use merx_core::{DomainError, DomainResult};

/// Whether an order goes straight to fulfillment or through quote approval.
/// Fixed at creation, never changed afterwards.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowMode {
    #[default]
    Direct,
    QuoteApproval,
}

impl FlowMode {
    /// The status an order is born with.
    pub fn initial_status(&self) -> OrderStatus {
        match self {
            FlowMode::Direct => OrderStatus::Pending,
            FlowMode::QuoteApproval => OrderStatus::QuoteRequested,
        }
    }
}

/// Order status. Transitions only move forward or to a terminal state;
/// see [`OrderStatus::can_transition`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    QuoteRequested,
    QuoteSent,
    QuoteApproved,
    QuoteRejected,
    Pending,
    Confirmed,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
    Returned,
    Refunded,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::QuoteRequested => "quote_requested",
            OrderStatus::QuoteSent => "quote_sent",
            OrderStatus::QuoteApproved => "quote_approved",
            OrderStatus::QuoteRejected => "quote_rejected",
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Returned => "returned",
            OrderStatus::Refunded => "refunded",
        }
    }

    /// Terminal states have no outgoing transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Delivered
                | OrderStatus::Cancelled
                | OrderStatus::Refunded
                | OrderStatus::QuoteRejected
        )
    }

    /// The transition table. Forward or terminal only: nothing ever returns
    /// to an earlier non-terminal state.
    pub fn can_transition(from: OrderStatus, to: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (from, to),
            // Quote flow; an approved quote enters fulfillment as confirmed.
            (QuoteRequested, QuoteSent)
                | (QuoteRequested, Cancelled)
                | (QuoteSent, QuoteApproved)
                | (QuoteSent, QuoteRejected)
                | (QuoteSent, Cancelled)
                | (QuoteApproved, Confirmed)
                | (QuoteApproved, Cancelled)
                // Direct flow.
                | (Pending, Confirmed)
                | (Pending, Cancelled)
                | (Confirmed, Processing)
                | (Confirmed, Cancelled)
                | (Processing, Shipped)
                | (Processing, Cancelled)
                | (Shipped, Delivered)
                | (Shipped, Returned)
                | (Returned, Refunded)
        )
    }

    /// Reject a status update the table forbids. A no-change update is not a
    /// transition; callers detect it separately and treat it as a no-op.
    pub fn validate_transition(from: OrderStatus, to: OrderStatus) -> DomainResult<()> {
        if Self::can_transition(from, to) {
            Ok(())
        } else {
            Err(DomainError::invalid_transition(from, to))
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use OrderStatus::*;

    const ALL: [OrderStatus; 12] = [
        QuoteRequested,
        QuoteSent,
        QuoteApproved,
        QuoteRejected,
        Pending,
        Confirmed,
        Processing,
        Shipped,
        Delivered,
        Cancelled,
        Returned,
        Refunded,
    ];

    #[test]
    fn direct_flow_happy_path() {
        let path = [Pending, Confirmed, Processing, Shipped, Delivered];
        for pair in path.windows(2) {
            assert!(OrderStatus::can_transition(pair[0], pair[1]), "{:?}", pair);
        }
    }

    #[test]
    fn quote_flow_happy_path() {
        assert!(OrderStatus::can_transition(QuoteRequested, QuoteSent));
        assert!(OrderStatus::can_transition(QuoteSent, QuoteApproved));
        assert!(OrderStatus::can_transition(QuoteSent, QuoteRejected));
        assert!(OrderStatus::can_transition(QuoteApproved, Confirmed));
    }

    #[test]
    fn terminal_states_have_no_outgoing_transitions() {
        for from in ALL.iter().filter(|s| s.is_terminal()) {
            for to in ALL {
                assert!(
                    !OrderStatus::can_transition(*from, to),
                    "{from:?} -> {to:?} should be rejected"
                );
            }
        }
    }

    #[test]
    fn backward_transitions_are_rejected() {
        let err = OrderStatus::validate_transition(Delivered, Processing).unwrap_err();
        match err {
            DomainError::InvalidTransition { from, to } => {
                assert_eq!(from, "delivered");
                assert_eq!(to, "processing");
            }
            _ => panic!("Expected InvalidTransition"),
        }
        assert!(!OrderStatus::can_transition(Shipped, Confirmed));
        assert!(!OrderStatus::can_transition(Confirmed, Pending));
    }

    #[test]
    fn flow_mode_picks_the_initial_status() {
        assert_eq!(FlowMode::Direct.initial_status(), Pending);
        assert_eq!(FlowMode::QuoteApproval.initial_status(), QuoteRequested);
    }
}
