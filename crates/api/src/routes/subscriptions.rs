//! Subscription and balance routes
//!
//! Thin adapters over [`SubscriptionLifecycle`]: each handler passes the
//! authenticated caller through and maps the outcome onto JSON.
//!
//! [`SubscriptionLifecycle`]: subsvc_subscriptions::SubscriptionLifecycle

use axum::{
    extract::{rejection::JsonRejection, Extension, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use subsvc_shared::{PlanId, SubscriptionId, UserId};
use subsvc_subscriptions::{Plan, Status};
use time::OffsetDateTime;

use crate::{
    auth::AuthUser,
    error::{ApiError, ApiResult},
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct SubscribeRequest {
    pub plan_id: PlanId,
}

#[derive(Debug, Serialize)]
pub struct SubscribeResponse {
    pub subscription_id: SubscriptionId,
    pub status: Status,
}

#[derive(Debug, Deserialize)]
pub struct ChangePlanRequest {
    pub new_plan_id: PlanId,
}

#[derive(Debug, Deserialize)]
pub struct BalanceRequest {
    pub amount: i64,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: Status,
}

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub status: Status,
    pub message: String,
    pub remaining: i64,
}

#[derive(Debug, Serialize)]
pub struct SubscriptionDetailsResponse {
    pub user_id: UserId,
    pub plan_id: PlanId,
    pub plan_name: String,
    pub remaining_limit: i64,
    #[serde(with = "time::serde::rfc3339::option")]
    pub expires_at: Option<OffsetDateTime>,
}

#[derive(Debug, Serialize)]
pub struct PlansResponse {
    pub plans: Vec<Plan>,
}

pub async fn subscribe(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    payload: Result<Json<SubscribeRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<SubscribeResponse>)> {
    let Json(req) = payload?;
    let subscription = state.lifecycle.subscribe(&auth_user, req.plan_id).await?;

    Ok((
        StatusCode::CREATED,
        Json(SubscribeResponse {
            subscription_id: subscription.id,
            status: Status::Subscribed,
        }),
    ))
}

pub async fn change_plan(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    payload: Result<Json<ChangePlanRequest>, JsonRejection>,
) -> ApiResult<Json<StatusResponse>> {
    let Json(req) = payload?;
    state
        .lifecycle
        .change_subs_plan(&auth_user, req.new_plan_id)
        .await?;

    Ok(Json(StatusResponse { status: Status::Ok }))
}

pub async fn unsubscribe(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> ApiResult<Json<StatusResponse>> {
    state.lifecycle.unsubscribe(&auth_user).await?;
    Ok(Json(StatusResponse { status: Status::Ok }))
}

pub async fn check_status(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> ApiResult<Json<StatusResponse>> {
    let status = if state
        .lifecycle
        .check_subscription(&auth_user)
        .await?
        .is_subscribed()
    {
        Status::Subscribed
    } else {
        Status::NotSubscribed
    };

    Ok(Json(StatusResponse { status }))
}

pub async fn get_details(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> ApiResult<Json<SubscriptionDetailsResponse>> {
    let details = state.lifecycle.get_sub_details(&auth_user).await?;

    Ok(Json(SubscriptionDetailsResponse {
        user_id: auth_user.user_id,
        plan_id: details.plan_id,
        plan_name: details.plan_name,
        remaining_limit: details.remaining_limit,
        expires_at: details.expires_at,
    }))
}

pub async fn extract_from_balance(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    payload: Result<Json<BalanceRequest>, JsonRejection>,
) -> ApiResult<Json<BalanceResponse>> {
    let Json(req) = payload?;
    let receipt = state
        .lifecycle
        .extract_from_balance(&auth_user, req.amount)
        .await?;

    Ok(Json(BalanceResponse {
        status: Status::Ok,
        message: receipt.message,
        remaining: receipt.remaining,
    }))
}

pub async fn add_to_balance(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    payload: Result<Json<BalanceRequest>, JsonRejection>,
) -> ApiResult<Json<BalanceResponse>> {
    let Json(req) = payload?;
    let receipt = state
        .lifecycle
        .add_to_balance(&auth_user, req.amount)
        .await?;

    Ok(Json(BalanceResponse {
        status: Status::Ok,
        message: receipt.message,
        remaining: receipt.remaining,
    }))
}

pub async fn list_plans(State(state): State<AppState>) -> ApiResult<Json<PlansResponse>> {
    let plans = state.lifecycle.list_plans().await?;
    Ok(Json(PlansResponse {
        plans: plans.as_ref().clone(),
    }))
}
