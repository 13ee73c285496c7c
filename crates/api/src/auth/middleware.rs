//! Authentication middleware for Axum

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use subsvc_shared::UserId;
use subsvc_subscriptions::CallerIdentity;

use super::jwt::JwtManager;

/// Authenticated caller extracted from the bearer token
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: UserId,
    /// The raw `Authorization` header, forwarded to the bucket service
    pub authorization: String,
}

impl CallerIdentity for AuthUser {
    fn user_id(&self) -> Option<UserId> {
        Some(self.user_id)
    }

    fn authorization(&self) -> Option<&str> {
        Some(&self.authorization)
    }
}

/// State needed for authentication
#[derive(Clone)]
pub struct AuthState {
    pub jwt_manager: JwtManager,
}

fn extract_bearer_token(request: &Request) -> Option<(&str, &str)> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())?;
    header.strip_prefix("Bearer ").map(|token| (header, token))
}

/// Middleware that requires authentication
pub async fn require_auth(
    State(auth_state): State<AuthState>,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();

    let auth_result = match extract_bearer_token(&request) {
        Some((header, token)) => authenticate_jwt(&auth_state, header, token),
        None if request.headers().contains_key(AUTHORIZATION) => {
            Err(AuthError::InvalidAuthFormat)
        }
        None => Err(AuthError::MissingAuth),
    };

    match auth_result {
        Ok(auth_user) => {
            tracing::debug!(path = %path, user_id = auth_user.user_id, "require_auth: authentication successful");
            request.extensions_mut().insert(auth_user);
            next.run(request).await
        }
        Err(err) => {
            tracing::warn!(path = %path, error = ?err, "require_auth: authentication failed");
            err.into_response()
        }
    }
}

fn authenticate_jwt(
    auth_state: &AuthState,
    header: &str,
    token: &str,
) -> Result<AuthUser, AuthError> {
    let claims = auth_state
        .jwt_manager
        .validate_token(token)
        .map_err(|e| {
            tracing::debug!(error = %e, "authenticate_jwt: token rejected");
            AuthError::InvalidToken
        })?;

    if claims.user_id <= 0 {
        return Err(AuthError::InvalidToken);
    }

    Ok(AuthUser {
        user_id: claims.user_id,
        authorization: header.to_string(),
    })
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Missing authentication")]
    MissingAuth,
    #[error("Invalid authentication format")]
    InvalidAuthFormat,
    #[error("Invalid or expired token")]
    InvalidToken,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let message = match self {
            AuthError::MissingAuth => "Authentication required",
            AuthError::InvalidAuthFormat => "Invalid authentication format",
            AuthError::InvalidToken => "Invalid or expired token",
        };
        let status = StatusCode::UNAUTHORIZED;

        let body = Json(json!({
            "error": message,
            "status": "INVALID_USER",
            "code": status.as_u16()
        }));

        (status, body).into_response()
    }
}
