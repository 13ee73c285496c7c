//! Shared plumbing for the subscription service crates.
//!
//! Holds the database pool setup, the embedded schema migrations and the
//! identifier aliases used across the workspace.

pub mod db;
pub mod types;

pub use db::{create_migration_pool, create_pool, run_migrations, DbError, PoolSettings};
pub use types::{PlanId, SubscriptionId, UserId};
