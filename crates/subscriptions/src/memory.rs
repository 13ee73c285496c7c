//! In-memory subscription store and plan catalog
//!
//! Same semantics as the Postgres store, held in a single mutex-guarded map.
//! Used by tests and for running the service without a database.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use subsvc_shared::{PlanId, SubscriptionId, UserId};
use time::OffsetDateTime;

use crate::error::StoreError;
use crate::plans::{Plan, PlanCatalog};
use crate::store::{Subscription, SubscriptionDetails, SubscriptionStore};

#[derive(Default)]
struct State {
    plans: Vec<Plan>,
    subscriptions: HashMap<UserId, Subscription>,
    next_id: SubscriptionId,
}

#[derive(Default)]
pub struct InMemorySubscriptionStore {
    state: Mutex<State>,
}

impl InMemorySubscriptionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_plans(plans: Vec<Plan>) -> Self {
        let store = Self::default();
        store.set_plans(plans);
        store
    }

    /// Replace the catalog contents
    pub fn set_plans(&self, mut plans: Vec<Plan>) {
        plans.sort_by_key(|p| p.id);
        match self.lock() {
            Ok(mut state) => state.plans = plans,
            Err(e) => tracing::error!(error = %e, "Failed to replace plan catalog"),
        }
    }

    pub fn subscription_count(&self) -> usize {
        self.state
            .lock()
            .map(|s| s.subscriptions.len())
            .unwrap_or_default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Database("in-memory store lock poisoned".to_string()))
    }
}

impl State {
    fn plan(&self, plan_id: PlanId) -> Option<&Plan> {
        self.plans.iter().find(|p| p.id == plan_id)
    }
}

#[async_trait]
impl PlanCatalog for InMemorySubscriptionStore {
    async fn list_plans(&self) -> Result<Vec<Plan>, StoreError> {
        Ok(self.lock()?.plans.clone())
    }

    async fn get_plan(&self, plan_id: PlanId) -> Result<Option<Plan>, StoreError> {
        Ok(self.lock()?.plan(plan_id).cloned())
    }
}

#[async_trait]
impl SubscriptionStore for InMemorySubscriptionStore {
    async fn find_subscription(
        &self,
        user_id: UserId,
    ) -> Result<Option<Subscription>, StoreError> {
        Ok(self.lock()?.subscriptions.get(&user_id).cloned())
    }

    async fn subscription_details(
        &self,
        user_id: UserId,
    ) -> Result<Option<SubscriptionDetails>, StoreError> {
        let state = self.lock()?;
        let Some(sub) = state.subscriptions.get(&user_id) else {
            return Ok(None);
        };
        let plan = state.plan(sub.plan_id).ok_or(StoreError::PlanNotFound)?;

        Ok(Some(SubscriptionDetails {
            plan_id: sub.plan_id,
            plan_name: plan.name.clone(),
            remaining_limit: sub.remaining_limit,
            expires_at: Some(sub.expires_at),
        }))
    }

    async fn create_subscription(
        &self,
        user_id: UserId,
        plan_id: PlanId,
        at: OffsetDateTime,
    ) -> Result<Subscription, StoreError> {
        let mut state = self.lock()?;

        let plan = state.plan(plan_id).ok_or(StoreError::PlanNotFound)?;
        let expires_at = plan.expires_at(at).ok_or_else(|| {
            StoreError::Constraint(format!("expiry out of range for plan {}", plan.id))
        })?;
        let remaining_limit = i64::from(plan.rental_limit);

        if state.subscriptions.contains_key(&user_id) {
            return Err(StoreError::AlreadyExists);
        }

        state.next_id += 1;
        let subscription = Subscription {
            id: state.next_id,
            user_id,
            plan_id,
            remaining_limit,
            expires_at,
            created_at: at,
            updated_at: at,
        };
        state.subscriptions.insert(user_id, subscription.clone());
        Ok(subscription)
    }

    async fn change_plan(
        &self,
        user_id: UserId,
        new_plan_id: PlanId,
        at: OffsetDateTime,
    ) -> Result<Subscription, StoreError> {
        let mut state = self.lock()?;

        let plan = state.plan(new_plan_id).ok_or(StoreError::PlanNotFound)?;
        let expires_at = plan.expires_at(at).ok_or_else(|| {
            StoreError::Constraint(format!("expiry out of range for plan {}", plan.id))
        })?;
        let remaining_limit = i64::from(plan.rental_limit);

        let sub = state
            .subscriptions
            .get_mut(&user_id)
            .ok_or(StoreError::SubscriptionNotFound)?;
        sub.plan_id = new_plan_id;
        sub.remaining_limit = remaining_limit;
        sub.expires_at = expires_at;
        sub.updated_at = at;
        Ok(sub.clone())
    }

    async fn delete_subscription(&self, user_id: UserId) -> Result<bool, StoreError> {
        Ok(self.lock()?.subscriptions.remove(&user_id).is_some())
    }

    async fn delete_subscription_by_id(
        &self,
        user_id: UserId,
        subscription_id: SubscriptionId,
    ) -> Result<bool, StoreError> {
        let mut state = self.lock()?;
        match state.subscriptions.get(&user_id) {
            Some(sub) if sub.id == subscription_id => {
                state.subscriptions.remove(&user_id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn debit_balance(&self, user_id: UserId, amount: i64) -> Result<i64, StoreError> {
        let mut state = self.lock()?;
        let sub = state
            .subscriptions
            .get_mut(&user_id)
            .ok_or(StoreError::SubscriptionNotFound)?;

        if sub.remaining_limit < amount {
            return Err(StoreError::InsufficientBalance {
                remaining: sub.remaining_limit,
            });
        }
        sub.remaining_limit -= amount;
        sub.updated_at = OffsetDateTime::now_utc();
        Ok(sub.remaining_limit)
    }

    async fn credit_balance(&self, user_id: UserId, amount: i64) -> Result<i64, StoreError> {
        let mut state = self.lock()?;
        let sub = state
            .subscriptions
            .get_mut(&user_id)
            .ok_or(StoreError::SubscriptionNotFound)?;

        sub.remaining_limit = sub
            .remaining_limit
            .checked_add(amount)
            .ok_or(StoreError::BalanceOverflow)?;
        sub.updated_at = OffsetDateTime::now_utc();
        Ok(sub.remaining_limit)
    }
}
