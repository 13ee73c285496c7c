//! Identifier aliases matching the column types of the persisted schema

/// `subscriptions.user_id` (BIGINT)
pub type UserId = i64;

/// `subscription_plans.id` (INT)
pub type PlanId = i32;

/// `subscriptions.id` (BIGSERIAL)
pub type SubscriptionId = i64;
