use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Lifecycle of a salary payment request.
///
/// Transitions are strictly forward: `PendingConfirmation -> Recorded ->
/// ApprovedPaid`, with `Failed` as the terminal branch when the gateway
/// declines the charge. A request is never moved backwards and never deleted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PaymentRequestStatus {
    PendingConfirmation,
    Recorded,
    ApprovedPaid,
    Failed,
}

impl PaymentRequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentRequestStatus::PendingConfirmation => "pending_confirmation",
            PaymentRequestStatus::Recorded => "recorded",
            PaymentRequestStatus::ApprovedPaid => "approved_paid",
            PaymentRequestStatus::Failed => "failed",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "pending_confirmation" => Some(PaymentRequestStatus::PendingConfirmation),
            "recorded" => Some(PaymentRequestStatus::Recorded),
            "approved_paid" => Some(PaymentRequestStatus::ApprovedPaid),
            "failed" => Some(PaymentRequestStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PaymentRequestStatus::ApprovedPaid | PaymentRequestStatus::Failed
        )
    }

    pub fn can_transition_to(&self, next: PaymentRequestStatus) -> bool {
        matches!(
            (self, next),
            (
                PaymentRequestStatus::PendingConfirmation,
                PaymentRequestStatus::Recorded
            ) | (
                PaymentRequestStatus::PendingConfirmation,
                PaymentRequestStatus::Failed
            ) | (
                PaymentRequestStatus::Recorded,
                PaymentRequestStatus::ApprovedPaid
            )
        )
    }
}

impl Display for PaymentRequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::PaymentRequestStatus::*;

    #[test]
    fn forward_transitions_are_admitted() {
        assert!(PendingConfirmation.can_transition_to(Recorded));
        assert!(PendingConfirmation.can_transition_to(Failed));
        assert!(Recorded.can_transition_to(ApprovedPaid));
    }

    #[test]
    fn regressions_and_repeats_are_rejected() {
        assert!(!Recorded.can_transition_to(PendingConfirmation));
        assert!(!Recorded.can_transition_to(Failed));
        assert!(!ApprovedPaid.can_transition_to(Recorded));
        assert!(!ApprovedPaid.can_transition_to(ApprovedPaid));
        assert!(!Failed.can_transition_to(Recorded));
    }

    #[test]
    fn terminal_states() {
        assert!(ApprovedPaid.is_terminal());
        assert!(Failed.is_terminal());
        assert!(!PendingConfirmation.is_terminal());
        assert!(!Recorded.is_terminal());
    }

    #[test]
    fn string_round_trip() {
        for status in [PendingConfirmation, Recorded, ApprovedPaid, Failed] {
            assert_eq!(
                super::PaymentRequestStatus::from_str(status.as_str()),
                Some(status)
            );
        }
        assert_eq!(super::PaymentRequestStatus::from_str("paid"), None);
    }
}
