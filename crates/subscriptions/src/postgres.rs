//! PostgreSQL-backed subscription store and plan catalog

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;
use subsvc_shared::{PlanId, SubscriptionId, UserId};
use time::OffsetDateTime;

use crate::error::StoreError;
use crate::plans::{Plan, PlanCatalog};
use crate::store::{Subscription, SubscriptionDetails, SubscriptionStatus, SubscriptionStore};

/// Default upper bound on a single store call
pub const DEFAULT_STATEMENT_TIMEOUT: Duration = Duration::from_secs(3);

const SUBSCRIPTION_COLUMNS: &str =
    "id, user_id, plan_id, remaining_limit, expires_at, created_at, updated_at";

const PLAN_COLUMNS: &str = "id, name, description, rental_limit, price, duration_months";

pub struct PgSubscriptionStore {
    pool: PgPool,
    statement_timeout: Duration,
}

impl PgSubscriptionStore {
    pub fn new(pool: PgPool) -> Self {
        Self::with_timeout(pool, DEFAULT_STATEMENT_TIMEOUT)
    }

    pub fn with_timeout(pool: PgPool, statement_timeout: Duration) -> Self {
        Self {
            pool,
            statement_timeout,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run `fut` under the statement timeout. Dropping a timed-out future
    /// rolls back any open transaction and returns its connection to the pool.
    async fn bounded<T, E, F>(&self, op: &'static str, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, E>>,
        E: Into<StoreError>,
    {
        match tokio::time::timeout(self.statement_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                let err = e.into();
                if matches!(err, StoreError::Database(_) | StoreError::Timeout(_)) {
                    tracing::error!(op, error = %err, "Subscription store call failed");
                }
                Err(err)
            }
            Err(_) => {
                tracing::error!(
                    op,
                    timeout_ms = self.statement_timeout.as_millis() as u64,
                    "Subscription store call timed out"
                );
                Err(StoreError::Timeout(self.statement_timeout))
            }
        }
    }
}

#[async_trait]
impl PlanCatalog for PgSubscriptionStore {
    async fn list_plans(&self) -> Result<Vec<Plan>, StoreError> {
        let sql = format!("SELECT {PLAN_COLUMNS} FROM subscription_plans ORDER BY id");
        self.bounded(
            "list_plans",
            sqlx::query_as::<_, Plan>(&sql).fetch_all(&self.pool),
        )
        .await
    }

    async fn get_plan(&self, plan_id: PlanId) -> Result<Option<Plan>, StoreError> {
        let sql = format!("SELECT {PLAN_COLUMNS} FROM subscription_plans WHERE id = $1");
        self.bounded(
            "get_plan",
            sqlx::query_as::<_, Plan>(&sql)
                .bind(plan_id)
                .fetch_optional(&self.pool),
        )
        .await
    }
}

#[async_trait]
impl SubscriptionStore for PgSubscriptionStore {
    async fn find_subscription(
        &self,
        user_id: UserId,
    ) -> Result<Option<Subscription>, StoreError> {
        let sql = format!("SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE user_id = $1");
        self.bounded(
            "find_subscription",
            sqlx::query_as::<_, Subscription>(&sql)
                .bind(user_id)
                .fetch_optional(&self.pool),
        )
        .await
    }

    async fn subscription_status(
        &self,
        user_id: UserId,
    ) -> Result<SubscriptionStatus, StoreError> {
        let exists: bool = self
            .bounded(
                "subscription_status",
                sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM subscriptions WHERE user_id = $1)")
                    .bind(user_id)
                    .fetch_one(&self.pool),
            )
            .await?;

        Ok(if exists {
            SubscriptionStatus::Subscribed
        } else {
            SubscriptionStatus::NotSubscribed
        })
    }

    async fn subscription_details(
        &self,
        user_id: UserId,
    ) -> Result<Option<SubscriptionDetails>, StoreError> {
        self.bounded(
            "subscription_details",
            sqlx::query_as::<_, SubscriptionDetails>(
                r#"
                SELECT s.plan_id, p.name AS plan_name, s.remaining_limit, s.expires_at
                FROM subscriptions s
                JOIN subscription_plans p ON p.id = s.plan_id
                WHERE s.user_id = $1
                "#,
            )
            .bind(user_id)
            .fetch_optional(&self.pool),
        )
        .await
    }

    async fn create_subscription(
        &self,
        user_id: UserId,
        plan_id: PlanId,
        at: OffsetDateTime,
    ) -> Result<Subscription, StoreError> {
        let plan_sql =
            format!("SELECT {PLAN_COLUMNS} FROM subscription_plans WHERE id = $1 FOR SHARE");
        let insert_sql = format!(
            r#"
            INSERT INTO subscriptions (user_id, plan_id, remaining_limit, expires_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $5)
            ON CONFLICT (user_id) DO NOTHING
            RETURNING {SUBSCRIPTION_COLUMNS}
            "#
        );

        self.bounded("create_subscription", async {
            let mut tx = self.pool.begin().await?;

            let plan: Plan = sqlx::query_as(&plan_sql)
                .bind(plan_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or(StoreError::PlanNotFound)?;

            let expires_at = plan.expires_at(at).ok_or_else(|| {
                StoreError::Constraint(format!("expiry out of range for plan {}", plan.id))
            })?;

            let inserted: Option<Subscription> = sqlx::query_as(&insert_sql)
                .bind(user_id)
                .bind(plan.id)
                .bind(i64::from(plan.rental_limit))
                .bind(expires_at)
                .bind(at)
                .fetch_optional(&mut *tx)
                .await?;

            let subscription = inserted.ok_or(StoreError::AlreadyExists)?;
            tx.commit().await?;
            Ok::<_, StoreError>(subscription)
        })
        .await
    }

    async fn change_plan(
        &self,
        user_id: UserId,
        new_plan_id: PlanId,
        at: OffsetDateTime,
    ) -> Result<Subscription, StoreError> {
        let plan_sql =
            format!("SELECT {PLAN_COLUMNS} FROM subscription_plans WHERE id = $1 FOR SHARE");
        let update_sql = format!(
            r#"
            UPDATE subscriptions
            SET plan_id = $2,
                remaining_limit = $3,
                expires_at = $4,
                updated_at = $5
            WHERE user_id = $1
            RETURNING {SUBSCRIPTION_COLUMNS}
            "#
        );

        self.bounded("change_plan", async {
            let mut tx = self.pool.begin().await?;

            let plan: Plan = sqlx::query_as(&plan_sql)
                .bind(new_plan_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or(StoreError::PlanNotFound)?;

            let expires_at = plan.expires_at(at).ok_or_else(|| {
                StoreError::Constraint(format!("expiry out of range for plan {}", plan.id))
            })?;

            let updated: Option<Subscription> = sqlx::query_as(&update_sql)
                .bind(user_id)
                .bind(plan.id)
                .bind(i64::from(plan.rental_limit))
                .bind(expires_at)
                .bind(at)
                .fetch_optional(&mut *tx)
                .await?;

            let subscription = updated.ok_or(StoreError::SubscriptionNotFound)?;
            tx.commit().await?;
            Ok::<_, StoreError>(subscription)
        })
        .await
    }

    async fn delete_subscription(&self, user_id: UserId) -> Result<bool, StoreError> {
        let result = self
            .bounded(
                "delete_subscription",
                sqlx::query("DELETE FROM subscriptions WHERE user_id = $1")
                    .bind(user_id)
                    .execute(&self.pool),
            )
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_subscription_by_id(
        &self,
        user_id: UserId,
        subscription_id: SubscriptionId,
    ) -> Result<bool, StoreError> {
        let result = self
            .bounded(
                "delete_subscription_by_id",
                sqlx::query("DELETE FROM subscriptions WHERE id = $1 AND user_id = $2")
                    .bind(subscription_id)
                    .bind(user_id)
                    .execute(&self.pool),
            )
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn debit_balance(&self, user_id: UserId, amount: i64) -> Result<i64, StoreError> {
        let debited: Option<i64> = self
            .bounded(
                "debit_balance",
                sqlx::query_scalar(
                    r#"
                    UPDATE subscriptions
                    SET remaining_limit = remaining_limit - $2,
                        updated_at = NOW()
                    WHERE user_id = $1 AND remaining_limit >= $2
                    RETURNING remaining_limit
                    "#,
                )
                .bind(user_id)
                .bind(amount)
                .fetch_optional(&self.pool),
            )
            .await?;

        if debited.is_some() {
            return classify_debit(debited, None);
        }

        // Re-read after the failed update so the reported balance reflects
        // any write that committed in between, including a delete
        let current: Option<i64> = self
            .bounded(
                "debit_balance_current",
                sqlx::query_scalar("SELECT remaining_limit FROM subscriptions WHERE user_id = $1")
                    .bind(user_id)
                    .fetch_optional(&self.pool),
            )
            .await?;

        classify_debit(None, current)
    }

    async fn credit_balance(&self, user_id: UserId, amount: i64) -> Result<i64, StoreError> {
        let remaining: Option<i64> = self
            .bounded(
                "credit_balance",
                sqlx::query_scalar(
                    r#"
                    UPDATE subscriptions
                    SET remaining_limit = remaining_limit + $2,
                        updated_at = NOW()
                    WHERE user_id = $1
                    RETURNING remaining_limit
                    "#,
                )
                .bind(user_id)
                .bind(amount)
                .fetch_optional(&self.pool),
            )
            .await?;

        remaining.ok_or(StoreError::SubscriptionNotFound)
    }
}

/// Outcome of a conditional debit given the updated balance (if the update
/// applied) and the balance read afterwards (if the row still exists)
fn classify_debit(debited: Option<i64>, current: Option<i64>) -> Result<i64, StoreError> {
    match (debited, current) {
        (Some(remaining), _) => Ok(remaining),
        (None, Some(remaining)) => Err(StoreError::InsufficientBalance { remaining }),
        (None, None) => Err(StoreError::SubscriptionNotFound),
    }
}
