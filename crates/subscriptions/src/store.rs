//! Subscription persistence contract
//!
//! Implementations own every read and write of subscription rows and must
//! uphold, at the storage layer:
//! - one row per user (a second insert reports [`StoreError::AlreadyExists`])
//! - a balance that never drops below zero (a debit larger than the balance
//!   fails with [`StoreError::InsufficientBalance`] and changes nothing)
//! - plan references that point at existing plans
//!
//! Balance changes are single atomic operations so concurrent debits for the
//! same user can never interleave into a negative balance.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use subsvc_shared::{PlanId, SubscriptionId, UserId};
use time::OffsetDateTime;

use crate::error::StoreError;

/// Whether a user currently holds a subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscriptionStatus {
    Subscribed,
    NotSubscribed,
}

impl SubscriptionStatus {
    pub fn is_subscribed(&self) -> bool {
        matches!(self, SubscriptionStatus::Subscribed)
    }
}

/// A persisted subscription row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub user_id: UserId,
    pub plan_id: PlanId,
    pub remaining_limit: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Subscription joined with its plan name.
///
/// The `Default` value is the zero tuple returned for users without a
/// subscription.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct SubscriptionDetails {
    pub plan_id: PlanId,
    pub plan_name: String,
    pub remaining_limit: i64,
    #[serde(with = "time::serde::rfc3339::option")]
    pub expires_at: Option<OffsetDateTime>,
}

#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    async fn find_subscription(&self, user_id: UserId)
        -> Result<Option<Subscription>, StoreError>;

    async fn subscription_status(
        &self,
        user_id: UserId,
    ) -> Result<SubscriptionStatus, StoreError> {
        Ok(match self.find_subscription(user_id).await? {
            Some(_) => SubscriptionStatus::Subscribed,
            None => SubscriptionStatus::NotSubscribed,
        })
    }

    async fn subscription_details(
        &self,
        user_id: UserId,
    ) -> Result<Option<SubscriptionDetails>, StoreError>;

    /// Insert a subscription for `user_id` on `plan_id`, written at `at`.
    ///
    /// The balance starts at the plan's rental limit and the expiry is `at`
    /// plus the plan's duration.
    async fn create_subscription(
        &self,
        user_id: UserId,
        plan_id: PlanId,
        at: OffsetDateTime,
    ) -> Result<Subscription, StoreError>;

    /// Move an existing subscription to `new_plan_id`, resetting the balance
    /// to the new plan's rental limit and the expiry to `at` plus its duration
    async fn change_plan(
        &self,
        user_id: UserId,
        new_plan_id: PlanId,
        at: OffsetDateTime,
    ) -> Result<Subscription, StoreError>;

    /// Remove the user's subscription. Returns `false` if there was none.
    async fn delete_subscription(&self, user_id: UserId) -> Result<bool, StoreError>;

    /// Remove one specific subscription row. Returns `false` if the user no
    /// longer holds that row, even if they hold a newer one.
    async fn delete_subscription_by_id(
        &self,
        user_id: UserId,
        subscription_id: SubscriptionId,
    ) -> Result<bool, StoreError>;

    /// Subtract `amount` if the balance covers it; returns the new balance
    async fn debit_balance(&self, user_id: UserId, amount: i64) -> Result<i64, StoreError>;

    /// Add `amount` to the balance; returns the new balance
    async fn credit_balance(&self, user_id: UserId, amount: i64) -> Result<i64, StoreError>;
}
