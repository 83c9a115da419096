//! REST surface: route table, request authentication, role guard, and the
//! JSON error envelope. All dependencies live in [`AppState`], constructed
//! once at startup; there are no process-wide singletons.

mod admin;
mod handlers;

use crate::auth::{Principal, TokenSigner};
use crate::error::{AuthError, PipelineError, StoreError};
use crate::pipeline::TransferAuthorizer;
use crate::storage::Store;
use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use std::sync::Arc;
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub authorizer: Arc<TransferAuthorizer>,
    pub tokens: Arc<TokenSigner>,
    /// User ids accepted by the admin login surface.
    pub superusers: Arc<Vec<String>>,
}

pub fn build_router(state: AppState) -> Router {
    let authenticated = Router::new()
        .route("/users/me", get(handlers::me))
        .route("/cards", get(handlers::list_cards))
        .route("/cards/lookup", get(handlers::card_lookup))
        .route("/transfer", post(handlers::do_transfer))
        .route("/transfers", get(handlers::list_transfers))
        .layer(middleware::from_fn_with_state(state.clone(), authenticate));

    let admin_routes = Router::new()
        .route("/admin/users", get(admin::list_users))
        .route("/admin/users/cards", get(admin::cards_by_user))
        .route("/admin/users/transfers", get(admin::transfers_by_user))
        .route("/admin/analytics/transfers", get(admin::transfer_analytics))
        .layer(middleware::from_fn(require_superuser))
        .layer(middleware::from_fn_with_state(state.clone(), authenticate));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/login", post(handlers::login))
        .route("/admin/login", post(admin::login))
        .merge(authenticated)
        .merge(admin_routes)
        .layer(cors)
        .with_state(state)
}

/// Resolve the caller once; downstream handlers read the typed [`Principal`]
/// from request extensions.
async fn authenticate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or(AuthError::MissingCredentials)?;
    let claims = state.tokens.verify(token)?;
    request.extensions_mut().insert(Principal::from_claims(claims));
    Ok(next.run(request).await)
}

async fn require_superuser(request: Request, next: Next) -> Result<Response, ApiError> {
    let authorized = request
        .extensions()
        .get::<Principal>()
        .map(Principal::is_superuser)
        .unwrap_or(false);
    if !authorized {
        return Err(AuthError::Forbidden.into());
    }
    Ok(next.run(request).await)
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{message}")]
    Http { status: StatusCode, message: String },
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self::Http {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn unauthorized(message: impl Into<String>) -> Self {
        Self::Http {
            status: StatusCode::UNAUTHORIZED,
            message: message.into(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self::Http {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Http { status, .. } => *status,
            ApiError::Auth(AuthError::Forbidden) => StatusCode::FORBIDDEN,
            ApiError::Auth(_) => StatusCode::UNAUTHORIZED,
            ApiError::Pipeline(PipelineError::Validation(_)) => StatusCode::BAD_REQUEST,
            // History, classifier, and persistence failures are all
            // server-side; the request fails without a decision.
            ApiError::Pipeline(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let message = self.to_string();
        if status.is_server_error() {
            tracing::error!(%status, error = %message, "request failed");
        }
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
