use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::errors::AppError;

/// Shared review lifecycle for invoices, milestones, funding requests, and
/// KYC documents. `FULLY_DELIVERED` exists only for invoices and is reachable
/// only from `APPROVED`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewStatus {
    Pending,
    Approved,
    Rejected,
    FullyDelivered,
}

impl ReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewStatus::Pending => "PENDING",
            ReviewStatus::Approved => "APPROVED",
            ReviewStatus::Rejected => "REJECTED",
            ReviewStatus::FullyDelivered => "FULLY_DELIVERED",
        }
    }

    pub fn parse(s: &str) -> Result<Self, AppError> {
        match s {
            "PENDING" => Ok(ReviewStatus::Pending),
            "APPROVED" => Ok(ReviewStatus::Approved),
            "REJECTED" => Ok(ReviewStatus::Rejected),
            "FULLY_DELIVERED" => Ok(ReviewStatus::FullyDelivered),
            other => Err(AppError::internal(format!("unknown review status: {other}"))),
        }
    }

    /// Ordinary review targets. Completion is a separate, invoice-only path.
    pub fn is_review_target(&self) -> bool {
        matches!(self, ReviewStatus::Approved | ReviewStatus::Rejected)
    }

    pub fn can_transition_to(&self, target: ReviewStatus) -> bool {
        match (self, target) {
            (ReviewStatus::Pending, ReviewStatus::Approved) => true,
            (ReviewStatus::Pending, ReviewStatus::Rejected) => true,
            (ReviewStatus::Approved, ReviewStatus::FullyDelivered) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of every updateXStatus call.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ReviewRequest {
    pub status: ReviewStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_reaches_both_review_outcomes() {
        assert!(ReviewStatus::Pending.can_transition_to(ReviewStatus::Approved));
        assert!(ReviewStatus::Pending.can_transition_to(ReviewStatus::Rejected));
    }

    #[test]
    fn review_outcomes_are_terminal() {
        assert!(!ReviewStatus::Approved.can_transition_to(ReviewStatus::Rejected));
        assert!(!ReviewStatus::Rejected.can_transition_to(ReviewStatus::Approved));
        assert!(!ReviewStatus::Rejected.can_transition_to(ReviewStatus::FullyDelivered));
    }

    #[test]
    fn fully_delivered_only_from_approved() {
        assert!(ReviewStatus::Approved.can_transition_to(ReviewStatus::FullyDelivered));
        assert!(!ReviewStatus::Pending.can_transition_to(ReviewStatus::FullyDelivered));
        assert!(!ReviewStatus::FullyDelivered.can_transition_to(ReviewStatus::Approved));
    }

    #[test]
    fn round_trips_through_strings() {
        for status in [
            ReviewStatus::Pending,
            ReviewStatus::Approved,
            ReviewStatus::Rejected,
            ReviewStatus::FullyDelivered,
        ] {
            assert_eq!(ReviewStatus::parse(status.as_str()).unwrap(), status);
        }
        assert!(ReviewStatus::parse("DELIVERED").is_err());
    }
}
