//! Time-bounded cache in front of the plan catalog
//!
//! The catalog is read on every plan listing but changes only through
//! administration, so the whole list is kept in a single shared slot. The
//! staleness check, the catalog fetch and the slot replacement all happen
//! under one lock: two callers can never both observe a stale slot and
//! interleave their refreshes.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::error::StoreError;
use crate::plans::{Plan, PlanCatalog};

/// Default plan cache lifetime
pub const DEFAULT_PLAN_CACHE_TTL: Duration = Duration::from_secs(60 * 60);

#[derive(Default)]
struct CacheSlot {
    plans: Option<Arc<Vec<Plan>>>,
    fetched_at: Option<Instant>,
}

pub struct PlanCache {
    catalog: Arc<dyn PlanCatalog>,
    ttl: Duration,
    slot: Mutex<CacheSlot>,
}

impl PlanCache {
    pub fn new(catalog: Arc<dyn PlanCatalog>, ttl: Duration) -> Self {
        Self {
            catalog,
            ttl,
            slot: Mutex::new(CacheSlot::default()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Underlying catalog, for single-plan lookups that bypass the cache
    pub fn catalog(&self) -> &Arc<dyn PlanCatalog> {
        &self.catalog
    }

    /// Return the plan list, refreshing from the catalog once the cached copy
    /// is older than the TTL.
    ///
    /// A refresh only replaces the slot when the catalog returns a non-empty
    /// list. If the refresh fails or comes back empty while an older list is
    /// held, the older list is served.
    pub async fn list_plans(&self) -> Result<Arc<Vec<Plan>>, StoreError> {
        let mut slot = self.slot.lock().await;

        if let (Some(plans), Some(fetched_at)) = (&slot.plans, slot.fetched_at) {
            if fetched_at.elapsed() <= self.ttl {
                return Ok(Arc::clone(plans));
            }
        }

        match self.catalog.list_plans().await {
            Ok(plans) if !plans.is_empty() => {
                let plans = Arc::new(plans);
                slot.plans = Some(Arc::clone(&plans));
                slot.fetched_at = Some(Instant::now());
                tracing::debug!(count = plans.len(), "Plan cache refreshed");
                Ok(plans)
            }
            Ok(_) => match &slot.plans {
                Some(stale) => {
                    tracing::warn!("Plan catalog returned no plans, serving previous list");
                    Ok(Arc::clone(stale))
                }
                None => Ok(Arc::new(Vec::new())),
            },
            Err(e) => match &slot.plans {
                Some(stale) => {
                    tracing::warn!(error = %e, "Plan catalog refresh failed, serving stale list");
                    Ok(Arc::clone(stale))
                }
                None => {
                    tracing::error!(error = %e, "Plan catalog fetch failed with nothing cached");
                    Err(e)
                }
            },
        }
    }

    /// Drop the cached list so the next call goes to the catalog
    pub async fn invalidate(&self) {
        let mut slot = self.slot.lock().await;
        slot.plans = None;
        slot.fetched_at = None;
    }
}
