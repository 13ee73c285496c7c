//! Subscription plan catalog

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use subsvc_shared::PlanId;
use time::OffsetDateTime;

use crate::dates::add_months;
use crate::error::StoreError;

/// Immutable catalog entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Plan {
    pub id: PlanId,
    pub name: String,
    pub description: String,
    /// Starting balance granted on subscribe
    pub rental_limit: i32,
    pub price: i32,
    pub duration_months: i32,
}

impl Plan {
    /// Expiry for a subscription to this plan written at `from`
    pub fn expires_at(&self, from: OffsetDateTime) -> Option<OffsetDateTime> {
        if self.duration_months < 1 {
            return None;
        }
        add_months(from, self.duration_months)
    }
}

/// Read-only access to the plan catalog
#[async_trait]
pub trait PlanCatalog: Send + Sync {
    /// All plans, ordered by id
    async fn list_plans(&self) -> Result<Vec<Plan>, StoreError>;

    async fn get_plan(&self, plan_id: PlanId) -> Result<Option<Plan>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn plan(duration_months: i32) -> Plan {
        Plan {
            id: 1,
            name: "Basic".into(),
            description: "Two toys a month".into(),
            rental_limit: 100,
            price: 990,
            duration_months,
        }
    }

    #[test]
    fn test_expires_at_uses_duration() {
        let from = datetime!(2024-01-31 12:00:00 UTC);
        assert_eq!(
            plan(1).expires_at(from),
            Some(datetime!(2024-02-29 12:00:00 UTC))
        );
        assert_eq!(
            plan(6).expires_at(from),
            Some(datetime!(2024-07-31 12:00:00 UTC))
        );
    }

    #[test]
    fn test_non_positive_duration_has_no_expiry() {
        let from = datetime!(2024-01-01 00:00:00 UTC);
        assert_eq!(plan(0).expires_at(from), None);
    }

    #[test]
    fn test_plan_serialization() {
        let json = serde_json::to_string(&plan(1)).unwrap();
        assert!(json.contains("\"rental_limit\":100"));
        assert!(json.contains("\"duration_months\":1"));
    }
}
