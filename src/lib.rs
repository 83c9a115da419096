//! Antifraud demo banking backend.
//!
//! Modular structure:
//! - [`features`] — Statistical behavioral feature extraction from login history
//! - [`classifier`] — Remote fraud-risk classifier client
//! - [`pipeline`] — Transfer authorization pipeline
//! - [`auth`] — Token issuance/verification and typed principals
//! - [`storage`] — SQLite-backed event and transfer stores
//! - [`http`] — REST surface
//! - [`logging`] — Structured JSON logging

pub mod auth;
pub mod classifier;
pub mod config;
pub mod error;
pub mod features;
pub mod http;
pub mod logging;
pub mod models;
pub mod pipeline;
pub mod storage;

pub use auth::{Principal, Role, TokenSigner};
pub use classifier::{ClassifierClient, Verdict};
pub use config::AppConfig;
pub use error::{AuthError, ClassifierError, PipelineError, StoreError};
pub use features::FeatureVector;
pub use http::{build_router, AppState};
pub use logging::StructuredLogger;
pub use models::{Card, LoginEvent, Transfer, User};
pub use pipeline::{TransferAuthorizer, TransferRequest};
pub use storage::Store;
