//! Application state

use std::sync::Arc;

use subsvc_subscriptions::SubscriptionLifecycle;

use crate::auth::{AuthState, JwtManager};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub lifecycle: Arc<SubscriptionLifecycle>,
    pub jwt_manager: JwtManager,
}

impl AppState {
    pub fn new(lifecycle: SubscriptionLifecycle, jwt_secret: &str) -> Self {
        Self {
            lifecycle: Arc::new(lifecycle),
            jwt_manager: JwtManager::new(jwt_secret),
        }
    }

    /// Get auth state for middleware
    pub fn auth_state(&self) -> AuthState {
        AuthState {
            jwt_manager: self.jwt_manager.clone(),
        }
    }
}
