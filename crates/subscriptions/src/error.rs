//! Error types for the subscription core
//!
//! Two layers:
//! - [`StoreError`] is what the persistence layer reports (row missing,
//!   constraint hit, timeout, raw database failure).
//! - [`SubscriptionError`] is the taxonomy callers of the lifecycle service see.
//!   Store errors are always translated into it before leaving the crate.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Outcome status reported to callers, one per taxonomy entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Ok,
    Subscribed,
    NotSubscribed,
    InvalidUser,
    InvalidPlan,
    AlreadySubscribed,
    InsufficientBalance,
    InvalidArgument,
    InternalError,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::Subscribed => "SUBSCRIBED",
            Status::NotSubscribed => "NOT_SUBSCRIBED",
            Status::InvalidUser => "INVALID_USER",
            Status::InvalidPlan => "INVALID_PLAN",
            Status::AlreadySubscribed => "ALREADY_SUBSCRIBED",
            Status::InsufficientBalance => "INSUFFICIENT_BALANCE",
            Status::InvalidArgument => "INVALID_ARGUMENT",
            Status::InternalError => "INTERNAL_ERROR",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single violated input field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Failures reported by a [`crate::store::SubscriptionStore`] or
/// [`crate::plans::PlanCatalog`] implementation
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Subscription not found")]
    SubscriptionNotFound,
    #[error("Plan not found")]
    PlanNotFound,
    #[error("A subscription already exists for this user")]
    AlreadyExists,
    #[error("Insufficient balance ({remaining} remaining)")]
    InsufficientBalance { remaining: i64 },
    #[error("Balance would overflow")]
    BalanceOverflow,
    #[error("Constraint violated: {0}")]
    Constraint(String),
    #[error("Store call timed out after {0:?}")]
    Timeout(Duration),
    #[error("Database error: {0}")]
    Database(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let Some(db) = err.as_database_error() {
            if db.is_unique_violation() {
                return StoreError::AlreadyExists;
            }
            if db.is_foreign_key_violation() {
                return StoreError::PlanNotFound;
            }
            if db.is_check_violation() {
                return StoreError::Constraint(
                    db.constraint().unwrap_or("check constraint").to_string(),
                );
            }
            // numeric_value_out_of_range
            if db.code().as_deref() == Some("22003") {
                return StoreError::BalanceOverflow;
            }
        }
        match err {
            sqlx::Error::PoolTimedOut => StoreError::Timeout(Duration::ZERO),
            other => StoreError::Database(other.to_string()),
        }
    }
}

/// Errors surfaced by the subscription lifecycle service
#[derive(Debug, thiserror::Error)]
pub enum SubscriptionError {
    #[error("Invalid user")]
    InvalidUser,
    #[error("Invalid plan: {0}")]
    InvalidPlan(String),
    #[error("User already subscribed")]
    AlreadySubscribed,
    #[error("User is not subscribed")]
    NotSubscribed,
    #[error("Insufficient balance: {remaining} remaining")]
    InsufficientBalance { remaining: i64 },
    #[error("Invalid argument: {}", format_fields(.0))]
    Validation(Vec<FieldError>),
    #[error("Internal error: {0}")]
    Internal(String),
}

fn format_fields(fields: &[FieldError]) -> String {
    fields
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl SubscriptionError {
    /// The caller-facing status for this failure
    pub fn status(&self) -> Status {
        match self {
            SubscriptionError::InvalidUser => Status::InvalidUser,
            SubscriptionError::InvalidPlan(_) => Status::InvalidPlan,
            SubscriptionError::AlreadySubscribed => Status::AlreadySubscribed,
            SubscriptionError::NotSubscribed => Status::NotSubscribed,
            SubscriptionError::InsufficientBalance { .. } => Status::InsufficientBalance,
            SubscriptionError::Validation(_) => Status::InvalidArgument,
            SubscriptionError::Internal(_) => Status::InternalError,
        }
    }
}

impl From<StoreError> for SubscriptionError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::SubscriptionNotFound => SubscriptionError::NotSubscribed,
            StoreError::PlanNotFound => {
                SubscriptionError::InvalidPlan("plan does not exist".to_string())
            }
            StoreError::AlreadyExists => SubscriptionError::AlreadySubscribed,
            StoreError::InsufficientBalance { remaining } => {
                SubscriptionError::InsufficientBalance { remaining }
            }
            other => SubscriptionError::Internal(other.to_string()),
        }
    }
}

pub type SubscriptionResult<T> = Result<T, SubscriptionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serializes_screaming_snake_case() {
        let json = serde_json::to_string(&Status::AlreadySubscribed).unwrap();
        assert_eq!(json, "\"ALREADY_SUBSCRIBED\"");
        assert_eq!(Status::NotSubscribed.to_string(), "NOT_SUBSCRIBED");
    }

    #[test]
    fn test_store_errors_map_to_taxonomy() {
        let cases = [
            (StoreError::SubscriptionNotFound, Status::NotSubscribed),
            (StoreError::PlanNotFound, Status::InvalidPlan),
            (StoreError::AlreadyExists, Status::AlreadySubscribed),
            (
                StoreError::InsufficientBalance { remaining: 3 },
                Status::InsufficientBalance,
            ),
            (StoreError::BalanceOverflow, Status::InternalError),
            // A check violation means a guard was bypassed, not a short balance
            (
                StoreError::Constraint("subscriptions_remaining_limit_check".into()),
                Status::InternalError,
            ),
            (
                StoreError::Timeout(Duration::from_secs(3)),
                Status::InternalError,
            ),
            (
                StoreError::Database("connection reset".into()),
                Status::InternalError,
            ),
        ];

        for (store_err, expected) in cases {
            let err = SubscriptionError::from(store_err);
            assert_eq!(err.status(), expected, "{err}");
        }
    }

    #[test]
    fn test_validation_message_lists_every_field() {
        let err = SubscriptionError::Validation(vec![
            FieldError {
                field: "plan_id".into(),
                message: "must be positive".into(),
            },
            FieldError {
                field: "amount".into(),
                message: "must be positive".into(),
            },
        ]);
        let msg = err.to_string();
        assert!(msg.contains("plan_id: must be positive"));
        assert!(msg.contains("amount: must be positive"));
    }

    #[test]
    fn test_pool_timeout_is_reported_as_timeout() {
        let err = StoreError::from(sqlx::Error::PoolTimedOut);
        assert!(matches!(err, StoreError::Timeout(_)));
    }
}
