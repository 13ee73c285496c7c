// Test code patterns (expected in test files):
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Subscription lifecycle and balance ledger
//!
//! Tracks which users hold a subscription to which plan, how much rental
//! balance they have left and when the subscription expires.
//!
//! ## Features
//!
//! - **Plan Catalog**: read-only plan definitions behind a TTL cache
//! - **Lifecycle**: subscribe, change plan, unsubscribe, status and details
//! - **Balance Ledger**: atomic debit and credit of the remaining rental limit
//! - **Provisioning**: storage bucket creation on subscribe, rolled back on failure
//! - **Stores**: PostgreSQL for production, in-memory for tests and local runs
//! - **Invariants**: read-only consistency checks over the subscription tables

pub mod dates;
pub mod error;
pub mod invariants;
pub mod ledger;
pub mod lifecycle;
pub mod memory;
pub mod plan_cache;
pub mod plans;
pub mod postgres;
pub mod provisioner;
pub mod store;
pub mod validation;


// Error
pub use error::{FieldError, Status, StoreError, SubscriptionError, SubscriptionResult};

// Plans
pub use plan_cache::{PlanCache, DEFAULT_PLAN_CACHE_TTL};
pub use plans::{Plan, PlanCatalog};

// Store
pub use memory::InMemorySubscriptionStore;
pub use postgres::{PgSubscriptionStore, DEFAULT_STATEMENT_TIMEOUT};
pub use store::{Subscription, SubscriptionDetails, SubscriptionStatus, SubscriptionStore};

// Lifecycle
pub use ledger::BalanceReceipt;
pub use lifecycle::{Caller, CallerIdentity, SubscriptionLifecycle};

// Provisioning
pub use provisioner::{BucketProvisioner, HttpBucketProvisioner, ProvisionError, ProvisionerConfig};

// Invariants
pub use invariants::{
    InvariantCheckSummary, InvariantChecker, InvariantViolation, ViolationSeverity,
};
