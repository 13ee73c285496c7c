// Test code patterns:
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Subscription Service API Library
//!
//! HTTP surface over the subscription lifecycle: bearer-token identity,
//! request routing and the JSON error mapping.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;

pub use config::{Config, ConfigError};
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
