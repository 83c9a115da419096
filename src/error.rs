//! Error taxonomy. Every failure is terminal for the request that hit it;
//! nothing here is retried.

use thiserror::Error;

/// Read/write failure against the SQLite store.
#[derive(Debug, Error)]
#[error("database error: {0}")]
pub struct StoreError(#[from] rusqlite::Error);

/// Outbound classifier call failure: transport (including timeout),
/// non-2xx status, or an undecodable response body.
#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("classifier request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("classifier returned status {0}")]
    Status(reqwest::StatusCode),
}

/// Token verification / authorization failure.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing credentials")]
    MissingCredentials,
    #[error("invalid token")]
    InvalidToken,
    #[error("token expired")]
    Expired,
    #[error("superuser access required")]
    Forbidden,
}

/// Terminal failure of one transfer authorization run, named after the state
/// transition that failed.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid transfer request: {0}")]
    Validation(String),
    #[error("failed to read login history: {0}")]
    History(#[source] StoreError),
    #[error("risk scoring failed: {0}")]
    Classifier(#[from] ClassifierError),
    #[error("failed to persist transfer: {0}")]
    Persistence(#[source] StoreError),
}
