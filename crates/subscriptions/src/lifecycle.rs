//! Subscription lifecycle service
//!
//! The only component that knows the per-user state machine:
//!
//! ```text
//!   NOT_SUBSCRIBED --subscribe--> SUBSCRIBED --unsubscribe--> NOT_SUBSCRIBED
//!                                  |    ^
//!                                  +----+  change plan / debit / credit
//! ```
//!
//! Every operation starts by resolving the caller's user id through the
//! injected [`CallerIdentity`]; a caller without a usable id is always
//! [`SubscriptionError::InvalidUser`]. Store failures are translated into the
//! [`SubscriptionError`] taxonomy before they leave this module.

use std::sync::Arc;

use subsvc_shared::{PlanId, SubscriptionId, UserId};
use time::OffsetDateTime;

use crate::error::{SubscriptionError, SubscriptionResult};
use crate::plan_cache::PlanCache;
use crate::plans::Plan;
use crate::provisioner::BucketProvisioner;
use crate::store::{Subscription, SubscriptionDetails, SubscriptionStatus, SubscriptionStore};
use crate::validation::{validate_plan_id, Validator};

/// Identity of the caller, resolved by the transport before the core runs
pub trait CallerIdentity: Send + Sync {
    fn user_id(&self) -> Option<UserId>;

    /// Raw authorization header, forwarded to downstream services
    fn authorization(&self) -> Option<&str> {
        None
    }
}

/// Plain caller identity
#[derive(Debug, Clone, Default)]
pub struct Caller {
    pub user_id: Option<UserId>,
    pub authorization: Option<String>,
}

impl Caller {
    pub fn user(user_id: UserId) -> Self {
        Self {
            user_id: Some(user_id),
            authorization: None,
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn with_authorization(mut self, authorization: impl Into<String>) -> Self {
        self.authorization = Some(authorization.into());
        self
    }
}

impl CallerIdentity for Caller {
    fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    fn authorization(&self) -> Option<&str> {
        self.authorization.as_deref()
    }
}

pub struct SubscriptionLifecycle {
    pub(crate) store: Arc<dyn SubscriptionStore>,
    plans: PlanCache,
    provisioner: Arc<dyn BucketProvisioner>,
}

impl SubscriptionLifecycle {
    pub fn new(
        store: Arc<dyn SubscriptionStore>,
        plans: PlanCache,
        provisioner: Arc<dyn BucketProvisioner>,
    ) -> Self {
        Self {
            store,
            plans,
            provisioner,
        }
    }

    pub fn plan_cache(&self) -> &PlanCache {
        &self.plans
    }

    /// Subscribe the caller to `plan_id`.
    ///
    /// After the row is committed the caller's bucket is provisioned. If that
    /// fails the row is deleted again and the call reports an internal error,
    /// so a failed subscribe never leaves a subscription without storage.
    pub async fn subscribe(
        &self,
        caller: &dyn CallerIdentity,
        plan_id: PlanId,
    ) -> SubscriptionResult<Subscription> {
        let user_id = resolve_user(caller)?;
        let mut v = Validator::new();
        validate_plan_id(&mut v, "plan_id", plan_id);
        v.finish()?;

        tracing::info!(user_id, plan_id, "Attempting to subscribe user");

        if self.store.subscription_status(user_id).await?.is_subscribed() {
            tracing::info!(user_id, "User already subscribed");
            return Err(SubscriptionError::AlreadySubscribed);
        }

        let subscription = self
            .store
            .create_subscription(user_id, plan_id, OffsetDateTime::now_utc())
            .await
            .map_err(|e| plan_error(e.into(), plan_id))?;

        if let Err(e) = self
            .provisioner
            .create_bucket(user_id, caller.authorization())
            .await
        {
            tracing::error!(
                user_id,
                subscription_id = subscription.id,
                error = %e,
                "Bucket provisioning failed, rolling back subscription"
            );
            self.compensate_subscribe(user_id, subscription.id).await;
            return Err(SubscriptionError::Internal(
                "could not provision storage for new subscription".to_string(),
            ));
        }

        tracing::info!(
            user_id,
            plan_id,
            subscription_id = subscription.id,
            remaining_limit = subscription.remaining_limit,
            "User subscribed"
        );
        Ok(subscription)
    }

    /// Delete the row created by a failed subscribe. Only that row is removed:
    /// a newer subscription the same user took out meanwhile stays.
    async fn compensate_subscribe(&self, user_id: UserId, subscription_id: SubscriptionId) {
        match self
            .store
            .delete_subscription_by_id(user_id, subscription_id)
            .await
        {
            Ok(true) => tracing::info!(user_id, subscription_id, "Subscription rolled back"),
            Ok(false) => tracing::warn!(
                user_id,
                subscription_id,
                "Subscription already gone or replaced during rollback"
            ),
            Err(e) => tracing::error!(
                user_id,
                subscription_id,
                error = %e,
                "Failed to roll back subscription after provisioning failure; row left committed"
            ),
        }
    }

    /// Move the caller's subscription to `new_plan_id`.
    ///
    /// The balance is reset to the new plan's rental limit and the expiry is
    /// recomputed from now using the new plan's duration.
    pub async fn change_subs_plan(
        &self,
        caller: &dyn CallerIdentity,
        new_plan_id: PlanId,
    ) -> SubscriptionResult<Subscription> {
        let user_id = resolve_user(caller)?;
        let mut v = Validator::new();
        validate_plan_id(&mut v, "new_plan_id", new_plan_id);
        v.finish()?;

        tracing::info!(user_id, new_plan_id, "Attempting to change subscription plan");

        let current = self
            .store
            .find_subscription(user_id)
            .await?
            .ok_or(SubscriptionError::NotSubscribed)?;

        if current.plan_id == new_plan_id {
            return Err(SubscriptionError::InvalidPlan(format!(
                "already subscribed to plan {new_plan_id}"
            )));
        }

        let updated = self
            .store
            .change_plan(user_id, new_plan_id, OffsetDateTime::now_utc())
            .await
            .map_err(|e| plan_error(e.into(), new_plan_id))?;

        tracing::info!(
            user_id,
            from_plan = current.plan_id,
            to_plan = updated.plan_id,
            remaining_limit = updated.remaining_limit,
            "Subscription plan changed"
        );
        Ok(updated)
    }

    /// Remove the caller's subscription. Calling it again reports
    /// [`SubscriptionError::NotSubscribed`].
    pub async fn unsubscribe(&self, caller: &dyn CallerIdentity) -> SubscriptionResult<()> {
        let user_id = resolve_user(caller)?;
        tracing::info!(user_id, "Attempting to unsubscribe user");

        if !self.store.subscription_status(user_id).await?.is_subscribed() {
            return Err(SubscriptionError::NotSubscribed);
        }

        // A concurrent unsubscribe may have removed the row in between
        if !self.store.delete_subscription(user_id).await? {
            return Err(SubscriptionError::NotSubscribed);
        }

        tracing::info!(user_id, "User unsubscribed");
        Ok(())
    }

    pub async fn check_subscription(
        &self,
        caller: &dyn CallerIdentity,
    ) -> SubscriptionResult<SubscriptionStatus> {
        let user_id = resolve_user(caller)?;
        let status = self.store.subscription_status(user_id).await?;

        tracing::debug!(user_id, status = ?status, "Checked subscription");
        Ok(status)
    }

    /// Plan, balance and expiry of the caller's subscription; the zero value
    /// when the caller has none
    pub async fn get_sub_details(
        &self,
        caller: &dyn CallerIdentity,
    ) -> SubscriptionResult<SubscriptionDetails> {
        let user_id = resolve_user(caller)?;
        tracing::info!(user_id, "Fetching subscription details");

        Ok(self
            .store
            .subscription_details(user_id)
            .await?
            .unwrap_or_default())
    }

    pub async fn list_plans(&self) -> SubscriptionResult<Arc<Vec<Plan>>> {
        self.plans.list_plans().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to fetch plans");
            SubscriptionError::Internal("failed to fetch plans".to_string())
        })
    }
}

pub(crate) fn resolve_user(caller: &dyn CallerIdentity) -> SubscriptionResult<UserId> {
    match caller.user_id() {
        Some(id) if id > 0 => Ok(id),
        _ => {
            tracing::warn!("Lifecycle call without a resolvable user id");
            Err(SubscriptionError::InvalidUser)
        }
    }
}

fn plan_error(err: SubscriptionError, plan_id: PlanId) -> SubscriptionError {
    match err {
        SubscriptionError::InvalidPlan(_) => {
            SubscriptionError::InvalidPlan(format!("plan {plan_id} does not exist"))
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_user_rejects_missing_and_non_positive_ids() {
        assert!(matches!(
            resolve_user(&Caller::anonymous()),
            Err(SubscriptionError::InvalidUser)
        ));
        assert!(matches!(
            resolve_user(&Caller::user(0)),
            Err(SubscriptionError::InvalidUser)
        ));
        assert!(matches!(
            resolve_user(&Caller::user(-4)),
            Err(SubscriptionError::InvalidUser)
        ));
        assert_eq!(resolve_user(&Caller::user(42)).unwrap(), 42);
    }

    #[test]
    fn test_caller_forwards_authorization() {
        let caller = Caller::user(1).with_authorization("Bearer abc");
        assert_eq!(caller.authorization(), Some("Bearer abc"));
        assert_eq!(Caller::user(1).authorization(), None);
    }

    #[test]
    fn test_plan_error_names_the_plan() {
        let err = plan_error(
            SubscriptionError::InvalidPlan("plan does not exist".into()),
            9,
        );
        assert_eq!(err.to_string(), "Invalid plan: plan 9 does not exist");

        let untouched = plan_error(SubscriptionError::AlreadySubscribed, 9);
        assert!(matches!(untouched, SubscriptionError::AlreadySubscribed));
    }
}
