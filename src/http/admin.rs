//! Superuser surface: admin login, per-user listings, and daily transfer
//! analytics. Read-only except for token issuance.

use super::handlers::{
    CardDto, CardListResponse, LoginRequest, LoginResponse, TransferDto, TransferListResponse,
    UserDto,
};
use super::{ApiError, AppState};
use crate::auth::Role;
use crate::storage::{DailyTransferStats, TransferAnalytics};
use axum::extract::{Query, State};
use axum::Json;
use chrono::{NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Admin logins are allow-listed in configuration and do not append login
/// events; console sessions are not behavioral signal.
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    if request.id.is_empty() {
        return Err(ApiError::bad_request("missing id"));
    }
    if !state.superusers.contains(&request.id) {
        return Err(ApiError::unauthorized("not a superuser"));
    }
    info!(user_id = %request.id, "superuser login");
    let token = state.tokens.issue(&request.id, Role::Superuser, "", "");
    Ok(Json(LoginResponse { token }))
}

#[derive(Debug, Serialize)]
pub struct UserListResponse {
    pub users: Vec<UserDto>,
}

pub async fn list_users(
    State(state): State<AppState>,
) -> Result<Json<UserListResponse>, ApiError> {
    let users = state.store.list_users()?;
    Ok(Json(UserListResponse {
        users: users.iter().map(UserDto::from).collect(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
}

pub async fn cards_by_user(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Result<Json<CardListResponse>, ApiError> {
    let user_id = require_user_id(query)?;
    let cards = state.store.cards_for_user(&user_id)?;
    Ok(Json(CardListResponse {
        cards: cards.iter().map(CardDto::from).collect(),
    }))
}

pub async fn transfers_by_user(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Result<Json<TransferListResponse>, ApiError> {
    let user_id = require_user_id(query)?;
    let transfers = state.store.transfers_for_user(&user_id)?;
    Ok(Json(TransferListResponse {
        transfers: transfers.iter().map(TransferDto::from).collect(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct AnalyticsQuery {
    pub start: Option<String>,
    pub end: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TransferAnalyticsResponse {
    pub total_transfers: i64,
    pub blocked_transfers: i64,
    pub daily_stats: Vec<DailyTransferStats>,
}

/// Daily blocked/total counts. `start` and `end` are inclusive `YYYY-MM-DD`
/// dates; unparsable values are ignored, as in a permissive dashboard query.
pub async fn transfer_analytics(
    State(state): State<AppState>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Json<TransferAnalyticsResponse>, ApiError> {
    let start = query.start.as_deref().and_then(day_start);
    let end = query
        .end
        .as_deref()
        .and_then(day_start)
        .map(|t| t + chrono::Duration::days(1));
    let TransferAnalytics {
        total_transfers,
        blocked_transfers,
        daily,
    } = state.store.transfer_analytics(start, end)?;
    Ok(Json(TransferAnalyticsResponse {
        total_transfers,
        blocked_transfers,
        daily_stats: daily,
    }))
}

fn require_user_id(query: UserQuery) -> Result<String, ApiError> {
    query
        .user_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::bad_request("missing user id"))
}

fn day_start(raw: &str) -> Option<chrono::DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()?;
    Utc.from_local_datetime(&date.and_hms_opt(0, 0, 0)?).single()
}
