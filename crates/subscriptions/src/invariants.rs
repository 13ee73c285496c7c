//! Subscription invariant checks
//!
//! Read-only SQL checks that confirm the subscription tables are in a valid
//! state. Meant to be run on a schedule or after manual data repair.
//!
//! | check                     | holds when                                   |
//! |---------------------------|----------------------------------------------|
//! | `single_row_per_user`     | no user has more than one subscription row   |
//! | `non_negative_balance`    | every `remaining_limit` is `>= 0`            |
//! | `expiry_after_creation`   | every `expires_at` is later than `created_at`|
//! | `plan_reference_exists`   | every `plan_id` points at an existing plan   |

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use subsvc_shared::{PlanId, SubscriptionId, UserId};
use time::OffsetDateTime;

use crate::error::StoreError;

/// Result of running a single invariant check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvariantViolation {
    /// Which invariant was violated
    pub invariant: String,
    /// Users affected
    pub user_ids: Vec<UserId>,
    pub description: String,
    /// Additional context for debugging
    pub context: serde_json::Value,
    pub severity: ViolationSeverity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViolationSeverity {
    /// Ledger is wrong, users may rent beyond what they paid for
    Critical,
    /// Data inconsistency that needs attention
    High,
    Medium,
    Low,
}

impl std::fmt::Display for ViolationSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ViolationSeverity::Critical => write!(f, "CRITICAL"),
            ViolationSeverity::High => write!(f, "HIGH"),
            ViolationSeverity::Medium => write!(f, "MEDIUM"),
            ViolationSeverity::Low => write!(f, "LOW"),
        }
    }
}

/// Summary of all invariant checks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvariantCheckSummary {
    #[serde(with = "time::serde::rfc3339")]
    pub checked_at: OffsetDateTime,
    pub checks_run: usize,
    pub checks_passed: usize,
    pub checks_failed: usize,
    pub violations: Vec<InvariantViolation>,
    pub healthy: bool,
}

impl InvariantCheckSummary {
    pub fn from_violations(
        checked_at: OffsetDateTime,
        checks_run: usize,
        violations: Vec<InvariantViolation>,
    ) -> Self {
        let checks_failed = violations
            .iter()
            .map(|v| v.invariant.as_str())
            .collect::<HashSet<_>>()
            .len();

        Self {
            checked_at,
            checks_run,
            checks_passed: checks_run.saturating_sub(checks_failed),
            checks_failed,
            healthy: violations.is_empty(),
            violations,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct DuplicateUserRow {
    user_id: UserId,
    row_count: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct NegativeBalanceRow {
    id: SubscriptionId,
    user_id: UserId,
    remaining_limit: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct BadExpiryRow {
    id: SubscriptionId,
    user_id: UserId,
    expires_at: OffsetDateTime,
    created_at: OffsetDateTime,
}

#[derive(Debug, sqlx::FromRow)]
struct OrphanedPlanRow {
    id: SubscriptionId,
    user_id: UserId,
    plan_id: PlanId,
}

const CHECKS: [&str; 4] = [
    "single_row_per_user",
    "non_negative_balance",
    "expiry_after_creation",
    "plan_reference_exists",
];

pub struct InvariantChecker {
    pool: PgPool,
}

impl InvariantChecker {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn run_all_checks(&self) -> Result<InvariantCheckSummary, StoreError> {
        let now = OffsetDateTime::now_utc();
        let mut violations = Vec::new();

        for name in CHECKS {
            violations.extend(self.run_check(name).await?);
        }

        Ok(InvariantCheckSummary::from_violations(
            now,
            CHECKS.len(),
            violations,
        ))
    }

    /// Run a single invariant check by name. Unknown names yield no violations.
    pub async fn run_check(&self, name: &str) -> Result<Vec<InvariantViolation>, StoreError> {
        match name {
            "single_row_per_user" => self.check_single_row_per_user().await,
            "non_negative_balance" => self.check_non_negative_balance().await,
            "expiry_after_creation" => self.check_expiry_after_creation().await,
            "plan_reference_exists" => self.check_plan_reference_exists().await,
            _ => Ok(vec![]),
        }
    }

    pub fn available_checks() -> Vec<&'static str> {
        CHECKS.to_vec()
    }

    async fn check_single_row_per_user(&self) -> Result<Vec<InvariantViolation>, StoreError> {
        let rows: Vec<DuplicateUserRow> = sqlx::query_as(
            r#"
            SELECT user_id, COUNT(*) AS row_count
            FROM subscriptions
            GROUP BY user_id
            HAVING COUNT(*) > 1
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| InvariantViolation {
                invariant: "single_row_per_user".to_string(),
                user_ids: vec![row.user_id],
                description: format!(
                    "User has {} subscription rows (expected 1)",
                    row.row_count
                ),
                context: serde_json::json!({ "row_count": row.row_count }),
                severity: ViolationSeverity::Critical,
            })
            .collect())
    }

    async fn check_non_negative_balance(&self) -> Result<Vec<InvariantViolation>, StoreError> {
        let rows: Vec<NegativeBalanceRow> = sqlx::query_as(
            r#"
            SELECT id, user_id, remaining_limit
            FROM subscriptions
            WHERE remaining_limit < 0
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| InvariantViolation {
                invariant: "non_negative_balance".to_string(),
                user_ids: vec![row.user_id],
                description: format!("Subscription has negative balance {}", row.remaining_limit),
                context: serde_json::json!({
                    "subscription_id": row.id,
                    "remaining_limit": row.remaining_limit,
                }),
                severity: ViolationSeverity::Critical,
            })
            .collect())
    }

    async fn check_expiry_after_creation(&self) -> Result<Vec<InvariantViolation>, StoreError> {
        let rows: Vec<BadExpiryRow> = sqlx::query_as(
            r#"
            SELECT id, user_id, expires_at, created_at
            FROM subscriptions
            WHERE expires_at <= created_at
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| InvariantViolation {
                invariant: "expiry_after_creation".to_string(),
                user_ids: vec![row.user_id],
                description: format!(
                    "Subscription expires at {} but was created at {}",
                    row.expires_at, row.created_at
                ),
                context: serde_json::json!({ "subscription_id": row.id }),
                severity: ViolationSeverity::High,
            })
            .collect())
    }

    async fn check_plan_reference_exists(&self) -> Result<Vec<InvariantViolation>, StoreError> {
        let rows: Vec<OrphanedPlanRow> = sqlx::query_as(
            r#"
            SELECT s.id, s.user_id, s.plan_id
            FROM subscriptions s
            LEFT JOIN subscription_plans p ON p.id = s.plan_id
            WHERE p.id IS NULL
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| InvariantViolation {
                invariant: "plan_reference_exists".to_string(),
                user_ids: vec![row.user_id],
                description: format!("Subscription references missing plan {}", row.plan_id),
                context: serde_json::json!({
                    "subscription_id": row.id,
                    "plan_id": row.plan_id,
                }),
                severity: ViolationSeverity::High,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn violation(invariant: &str, user_id: UserId) -> InvariantViolation {
        InvariantViolation {
            invariant: invariant.to_string(),
            user_ids: vec![user_id],
            description: String::new(),
            context: serde_json::Value::Null,
            severity: ViolationSeverity::High,
        }
    }

    #[test]
    fn test_violation_severity_display() {
        assert_eq!(ViolationSeverity::Critical.to_string(), "CRITICAL");
        assert_eq!(ViolationSeverity::High.to_string(), "HIGH");
        assert_eq!(ViolationSeverity::Medium.to_string(), "MEDIUM");
        assert_eq!(ViolationSeverity::Low.to_string(), "LOW");
    }

    #[test]
    fn test_available_checks() {
        let checks = InvariantChecker::available_checks();
        assert_eq!(checks.len(), 4);
        assert!(checks.contains(&"single_row_per_user"));
        assert!(checks.contains(&"non_negative_balance"));
    }

    #[test]
    fn test_summary_counts_failed_checks_not_rows() {
        let summary = InvariantCheckSummary::from_violations(
            OffsetDateTime::UNIX_EPOCH,
            4,
            vec![
                violation("non_negative_balance", 1),
                violation("non_negative_balance", 2),
                violation("plan_reference_exists", 3),
            ],
        );

        assert_eq!(summary.checks_failed, 2);
        assert_eq!(summary.checks_passed, 2);
        assert!(!summary.healthy);
    }

    #[test]
    fn test_empty_summary_is_healthy() {
        let summary = InvariantCheckSummary::from_violations(OffsetDateTime::UNIX_EPOCH, 4, vec![]);
        assert!(summary.healthy);
        assert_eq!(summary.checks_passed, 4);
    }
}
