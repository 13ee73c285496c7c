//! Unit tests for authentication middleware
//!
//! Tests cover:
//! - Valid bearer tokens reaching the handler with the caller attached
//! - Missing, malformed, expired and foreign tokens rejected with 401

#[cfg(test)]
mod tests {
    use super::super::jwt::JwtManager;
    use super::super::middleware::*;
    use axum::{
        body::Body,
        extract::Extension,
        http::{header::AUTHORIZATION, Request, StatusCode},
        middleware,
        routing::get,
        Router,
    };
    use subsvc_subscriptions::CallerIdentity;
    use time::Duration;
    use tower::ServiceExt;

    const SECRET: &str = "test-jwt-secret-key-for-testing-only";

    fn app() -> Router {
        let auth_state = AuthState {
            jwt_manager: JwtManager::new(SECRET),
        };

        Router::new()
            .route(
                "/whoami",
                get(|Extension(user): Extension<AuthUser>| async move {
                    format!(
                        "{}|{}",
                        user.user_id,
                        user.authorization().unwrap_or_default()
                    )
                }),
            )
            .layer(middleware::from_fn_with_state(auth_state, require_auth))
    }

    async fn call(authorization: Option<String>) -> (StatusCode, String) {
        let mut builder = Request::builder().uri("/whoami");
        if let Some(value) = authorization {
            builder = builder.header(AUTHORIZATION, value);
        }
        let response = app()
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_valid_token_attaches_user() {
        let token = JwtManager::new(SECRET)
            .issue_token(42, Duration::hours(1))
            .unwrap();
        let header = format!("Bearer {token}");

        let (status, body) = call(Some(header.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, format!("42|{header}"));
    }

    #[tokio::test]
    async fn test_missing_header_is_unauthorized() {
        let (status, body) = call(None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body.contains("Authentication required"));
    }

    #[tokio::test]
    async fn test_non_bearer_scheme_is_unauthorized() {
        let (status, body) = call(Some("Basic dXNlcjpwYXNz".to_string())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body.contains("Invalid authentication format"));
    }

    #[tokio::test]
    async fn test_garbage_token_is_unauthorized() {
        let (status, _) = call(Some("Bearer not-a-jwt".to_string())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_expired_token_is_unauthorized() {
        let token = JwtManager::new(SECRET)
            .issue_token(42, Duration::hours(-3))
            .unwrap();
        let (status, _) = call(Some(format!("Bearer {token}"))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_token_signed_with_other_secret_is_unauthorized() {
        let token = JwtManager::new("someone-else")
            .issue_token(42, Duration::hours(1))
            .unwrap();
        let (status, _) = call(Some(format!("Bearer {token}"))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_non_positive_user_id_is_unauthorized() {
        let token = JwtManager::new(SECRET)
            .issue_token(0, Duration::hours(1))
            .unwrap();
        let (status, _) = call(Some(format!("Bearer {token}"))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
