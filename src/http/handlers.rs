//! Customer-facing handlers and their response projections.

use super::{ApiError, AppState};
use crate::auth::{Principal, Role};
use crate::models::{Card, LoginEvent, Transfer, User};
use crate::pipeline::TransferRequest;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::{Extension, Json};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub id: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct UserDto {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub status: String,
}

impl From<&User> for UserDto {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            status: user.status.as_str().to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CardDto {
    pub id: String,
    pub user_id: String,
    pub number: String,
    pub balance: f64,
    pub status: String,
}

impl From<&Card> for CardDto {
    fn from(card: &Card) -> Self {
        Self {
            id: card.id.to_string(),
            user_id: card.user_id.clone(),
            number: card.number.clone(),
            balance: card.balance,
            status: card.status.as_str().to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CardListResponse {
    pub cards: Vec<CardDto>,
}

#[derive(Debug, Serialize)]
pub struct CardLookupResponse {
    pub id: String,
    pub number: String,
    pub user_id: String,
}

#[derive(Debug, Serialize)]
pub struct TransferDto {
    pub id: String,
    pub from_user_id: String,
    pub from_card_id: String,
    pub to_card_id: String,
    pub amount: f64,
    pub when: String,
    pub fraud_score: f64,
    pub is_blocked: bool,
}

impl From<&Transfer> for TransferDto {
    fn from(transfer: &Transfer) -> Self {
        Self {
            id: transfer.id.to_string(),
            from_user_id: transfer.from_user_id.clone(),
            from_card_id: transfer.from_card_id.to_string(),
            to_card_id: transfer.to_card_id.to_string(),
            amount: transfer.amount,
            when: transfer.when.to_rfc3339_opts(SecondsFormat::Secs, true),
            fraud_score: transfer.fraud_score,
            is_blocked: transfer.is_blocked,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TransferListResponse {
    pub transfers: Vec<TransferDto>,
}

/// Authenticate a known user and append a login event carrying the device
/// fingerprint headers; the event feeds future feature windows.
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    if request.id.is_empty() {
        return Err(ApiError::bad_request("missing id"));
    }
    let user = state
        .store
        .user_by_id(&request.id)?
        .ok_or_else(|| ApiError::not_found("user not found"))?;

    let phone_model = header_value(&headers, "x-phone-model");
    let os = header_value(&headers, "x-os");
    state.store.append_login_event(&LoginEvent {
        id: Uuid::new_v4(),
        user_id: user.id.clone(),
        when: Utc::now(),
        phone_model: phone_model.clone(),
        os: os.clone(),
    })?;
    info!(user_id = %user.id, "login recorded");

    let token = state
        .tokens
        .issue(&user.id, Role::Customer, &phone_model, &os);
    Ok(Json(LoginResponse { token }))
}

pub async fn me(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<UserDto>, ApiError> {
    let user = state
        .store
        .user_by_id(&principal.user_id)?
        .ok_or_else(|| ApiError::not_found("user not found"))?;
    Ok(Json(UserDto::from(&user)))
}

pub async fn list_cards(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<CardListResponse>, ApiError> {
    let cards = state.store.cards_for_user(&principal.user_id)?;
    Ok(Json(CardListResponse {
        cards: cards.iter().map(CardDto::from).collect(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct CardLookupQuery {
    pub n: Option<String>,
}

pub async fn card_lookup(
    State(state): State<AppState>,
    Query(query): Query<CardLookupQuery>,
) -> Result<Json<CardLookupResponse>, ApiError> {
    let number = query
        .n
        .filter(|n| !n.is_empty())
        .ok_or_else(|| ApiError::bad_request("missing card number"))?;
    let card = state
        .store
        .card_by_number(&number)?
        .ok_or_else(|| ApiError::not_found("card not found"))?;
    Ok(Json(CardLookupResponse {
        id: card.id.to_string(),
        number: card.number,
        user_id: card.user_id,
    }))
}

pub async fn do_transfer(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(request): Json<TransferRequest>,
) -> Result<Json<TransferDto>, ApiError> {
    let transfer = state.authorizer.authorize(&principal, &request).await?;
    Ok(Json(TransferDto::from(&transfer)))
}

pub async fn list_transfers(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<TransferListResponse>, ApiError> {
    let transfers = state.store.transfers_for_user(&principal.user_id)?;
    Ok(Json(TransferListResponse {
        transfers: transfers.iter().map(TransferDto::from).collect(),
    }))
}

fn header_value(headers: &HeaderMap, name: &str) -> String {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string()
}
