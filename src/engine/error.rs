use thiserror::Error;

use crate::cache::CacheError;
use crate::model::BookingStatus;
use crate::payment::PaymentError;
use crate::records::RecordStoreError;
use crate::tables::RowError;

/// Why a policy-gated transition was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyViolation {
    #[error("booking belongs to a different requester")]
    NotOwner,
    #[error("booking is already confirmed; contact support to change it")]
    AlreadyConfirmed,
    #[error("booking is already cancelled")]
    AlreadyCancelled,
    #[error("booking in status {0} cannot be changed")]
    NotCancellable(BookingStatus),
    #[error("booking in status {0} is not awaiting payment")]
    NotPayable(BookingStatus),
    #[error("check-in is {days_until_check_in} day(s) away; cancellation closes {cutoff_days} days before check-in")]
    CutoffPassed {
        days_until_check_in: i64,
        cutoff_days: i64,
    },
}

impl PolicyViolation {
    pub fn code(&self) -> &'static str {
        match self {
            PolicyViolation::NotOwner => "not_owner",
            PolicyViolation::AlreadyConfirmed => "already_confirmed",
            PolicyViolation::AlreadyCancelled => "already_cancelled",
            PolicyViolation::NotCancellable(_) => "not_cancellable",
            PolicyViolation::NotPayable(_) => "not_payable",
            PolicyViolation::CutoffPassed { .. } => "cutoff_passed",
        }
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid request: {0}")]
    Validation(String),
    #[error("room not found: {0}")]
    RoomNotFound(String),
    #[error("booking not found: {0}")]
    BookingNotFound(String),
    #[error("room {room_id} has no units left for {range}; try different dates")]
    CapacityConflict { room_id: String, range: String },
    #[error(transparent)]
    Policy(#[from] PolicyViolation),
    #[error("reference data is not loaded yet")]
    CacheUnavailable,
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error(transparent)]
    Store(#[from] RecordStoreError),
    #[error(transparent)]
    Row(#[from] RowError),
    #[error(transparent)]
    Payment(#[from] PaymentError),
}

impl EngineError {
    pub fn validation(msg: impl Into<String>) -> Self {
        EngineError::Validation(msg.into())
    }

    /// Short machine-readable code for API clients.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::Validation(_) => "validation_error",
            EngineError::RoomNotFound(_) | EngineError::BookingNotFound(_) => "not_found",
            EngineError::CapacityConflict { .. } => "capacity_conflict",
            EngineError::Policy(p) => p.code(),
            EngineError::CacheUnavailable => "cache_unavailable",
            _ if self.is_auth_failure() => "auth_failure",
            _ => "upstream_failure",
        }
    }

    /// Failures of collaborators rather than of the request itself. Their
    /// details stay in the logs.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            EngineError::Cache(_) | EngineError::Store(_) | EngineError::Row(_) | EngineError::Payment(_)
        )
    }

    pub fn is_auth_failure(&self) -> bool {
        matches!(self, EngineError::Store(RecordStoreError::Auth(_)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthError;

    #[test]
    fn codes_follow_taxonomy() {
        assert_eq!(EngineError::validation("x").code(), "validation_error");
        assert_eq!(EngineError::RoomNotFound("R".into()).code(), "not_found");
        assert_eq!(
            EngineError::CapacityConflict { room_id: "R".into(), range: "r".into() }.code(),
            "capacity_conflict"
        );
        assert_eq!(EngineError::from(PolicyViolation::AlreadyConfirmed).code(), "already_confirmed");
        assert_eq!(
            EngineError::from(RecordStoreError::Malformed("m".into())).code(),
            "upstream_failure"
        );
    }

    #[test]
    fn credential_failures_are_classified() {
        let e = EngineError::from(RecordStoreError::Auth(AuthError::Rejected {
            status: reqwest::StatusCode::UNAUTHORIZED,
            message: "invalid_grant".into(),
        }));
        assert!(e.is_auth_failure());
        assert!(e.is_internal());
        assert_eq!(e.code(), "auth_failure");
    }

    #[test]
    fn business_errors_are_not_internal() {
        assert!(!EngineError::validation("x").is_internal());
        assert!(!EngineError::from(PolicyViolation::NotOwner).is_internal());
        assert!(!EngineError::CacheUnavailable.is_internal());
    }
}
