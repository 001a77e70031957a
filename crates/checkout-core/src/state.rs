//! # Payment State
//!
//! ```text
//!   (none) ──► Pending ──► Paid ──► Refunded
//!     │           │  └───► Failed
//!     │           └──────► Refunded
//!     └──► Paid (synchronous providers)
//! ```
//!
//! A cart without a state is open; a failed attempt leaves it open so the
//! customer can retry.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentState {
    Pending,
    Paid,
    Failed,
    Refunded,
}

impl PaymentState {
    /// States reachable from this one through an explicit transition
    pub fn available_transitions(&self) -> &'static [PaymentState] {
        match self {
            PaymentState::Pending => &[
                PaymentState::Failed,
                PaymentState::Refunded,
                PaymentState::Paid,
            ],
            PaymentState::Paid => &[PaymentState::Refunded],
            PaymentState::Failed | PaymentState::Refunded => &[],
        }
    }

    pub fn can_transition_to(&self, next: PaymentState) -> bool {
        self.available_transitions().contains(&next)
    }

    pub fn is_terminal(&self) -> bool {
        self.available_transitions().is_empty()
    }

    pub fn label(&self) -> &'static str {
        match self {
            PaymentState::Pending => "Pending",
            PaymentState::Paid => "Paid",
            PaymentState::Failed => "Failed",
            PaymentState::Refunded => "Refunded",
        }
    }

    /// Badge color for back-office listings
    pub fn color(&self) -> &'static str {
        match self {
            PaymentState::Pending => "#3498db",
            PaymentState::Paid => "#2ecc71",
            PaymentState::Failed => "#e74c3c",
            PaymentState::Refunded => "#f39c12",
        }
    }
}

impl std::fmt::Display for PaymentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_transitions() {
        let pending = PaymentState::Pending;
        assert!(pending.can_transition_to(PaymentState::Paid));
        assert!(pending.can_transition_to(PaymentState::Failed));
        assert!(pending.can_transition_to(PaymentState::Refunded));
        assert!(!pending.is_terminal());
    }

    #[test]
    fn test_paid_only_refunds() {
        assert!(PaymentState::Paid.can_transition_to(PaymentState::Refunded));
        assert!(!PaymentState::Paid.can_transition_to(PaymentState::Pending));
        assert!(PaymentState::Refunded.is_terminal());
    }
}
