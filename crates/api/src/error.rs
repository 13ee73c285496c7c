//! API error type and its HTTP mapping

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use subsvc_subscriptions::{Status, SubscriptionError};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Subscription(#[from] SubscriptionError),
    #[error("Malformed request body: {0}")]
    BadRequest(String),
    #[error("Unauthorized")]
    Unauthorized,
}

pub type ApiResult<T> = Result<T, ApiError>;

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

/// HTTP status for a lifecycle outcome
pub fn http_status(status: Status) -> StatusCode {
    match status {
        Status::Ok | Status::Subscribed => StatusCode::OK,
        Status::InvalidUser | Status::InvalidPlan | Status::InvalidArgument => {
            StatusCode::BAD_REQUEST
        }
        Status::NotSubscribed => StatusCode::NOT_FOUND,
        Status::AlreadySubscribed | Status::InsufficientBalance => StatusCode::CONFLICT,
        Status::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // Optional extra body field carrying structured detail
        let (code, status, message, extra): (_, _, String, Option<(&str, Value)>) = match self {
            ApiError::Subscription(SubscriptionError::Validation(fields)) => (
                StatusCode::BAD_REQUEST,
                Status::InvalidArgument,
                "Invalid request".to_string(),
                Some(("fields", json!(fields))),
            ),
            ApiError::Subscription(SubscriptionError::Internal(detail)) => {
                tracing::error!(detail = %detail, "Request failed with internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Status::InternalError,
                    "Internal server error".to_string(),
                    None,
                )
            }
            ApiError::Subscription(SubscriptionError::InsufficientBalance { remaining }) => (
                StatusCode::CONFLICT,
                Status::InsufficientBalance,
                SubscriptionError::InsufficientBalance { remaining }.to_string(),
                Some(("remaining", json!(remaining))),
            ),
            ApiError::Subscription(err) => {
                let status = err.status();
                (http_status(status), status, err.to_string(), None)
            }
            ApiError::BadRequest(detail) => (
                StatusCode::BAD_REQUEST,
                Status::InvalidArgument,
                detail,
                None,
            ),
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                Status::InvalidUser,
                "Authentication required".to_string(),
                None,
            ),
        };

        let mut body = json!({
            "error": message,
            "status": status,
            "code": code.as_u16(),
        });
        if let Some((key, value)) = extra {
            body[key] = value;
        }

        (code, Json(body)).into_response()
    }
}
