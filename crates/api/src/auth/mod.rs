//! Authentication module

pub mod jwt;
pub mod middleware;
#[cfg(test)]
mod middleware_tests;

pub use jwt::{Claims, JwtManager};
pub use middleware::{require_auth, AuthError, AuthState, AuthUser};
