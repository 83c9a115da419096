//! Domain records persisted by the store. Login events and transfers are
//! append-only; a transfer is never updated after the pipeline writes it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    Active,
    Blocked,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Active => "active",
            UserStatus::Blocked => "blocked",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(UserStatus::Active),
            "blocked" => Some(UserStatus::Blocked),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub status: UserStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardStatus {
    Active,
    Blocked,
}

impl CardStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CardStatus::Active => "active",
            CardStatus::Blocked => "blocked",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(CardStatus::Active),
            "blocked" => Some(CardStatus::Blocked),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Card {
    pub id: Uuid,
    pub user_id: String,
    pub number: String,
    pub balance: f64,
    pub status: CardStatus,
}

/// One authenticated login, with the device fingerprint reported by the
/// client. The behavioral feature windows are computed over these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginEvent {
    pub id: Uuid,
    pub user_id: String,
    pub when: DateTime<Utc>,
    pub phone_model: String,
    pub os: String,
}

/// Outcome of one authorization pipeline run. `is_blocked` records the
/// classifier verdict; it does not suppress persistence, and no balance is
/// moved either way.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transfer {
    pub id: Uuid,
    pub from_user_id: String,
    pub from_card_id: Uuid,
    pub to_card_id: Uuid,
    pub amount: f64,
    pub when: DateTime<Utc>,
    pub fraud_score: f64,
    pub is_blocked: bool,
}
