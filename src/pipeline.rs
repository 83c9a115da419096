//! Transfer authorization pipeline. One strictly sequential pass per request:
//! validate → read history → compute features → score → persist → respond.
//! Every stage failure is terminal for the request; nothing is retried and no
//! compensating write exists. There is no transaction spanning the history
//! read, the remote score, and the record write.

use crate::auth::Principal;
use crate::classifier::ClassifierClient;
use crate::error::PipelineError;
use crate::features;
use crate::models::Transfer;
use crate::storage::Store;
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize)]
pub struct TransferRequest {
    pub from_card_id: String,
    pub to_card_id: String,
    pub amount: f64,
}

pub struct TransferAuthorizer {
    store: Arc<Store>,
    classifier: Arc<ClassifierClient>,
}

impl TransferAuthorizer {
    pub fn new(store: Arc<Store>, classifier: Arc<ClassifierClient>) -> Self {
        Self { store, classifier }
    }

    /// Run the pipeline for one request under an already-resolved principal.
    /// The returned record is persisted whether or not the classifier blocked
    /// it; a blocked transfer is recorded, not suppressed.
    pub async fn authorize(
        &self,
        principal: &Principal,
        request: &TransferRequest,
    ) -> Result<Transfer, PipelineError> {
        // Card identifiers must parse before any I/O happens.
        let from_card_id = Uuid::parse_str(&request.from_card_id)
            .map_err(|_| PipelineError::Validation("invalid from_card_id".to_string()))?;
        let to_card_id = Uuid::parse_str(&request.to_card_id)
            .map_err(|_| PipelineError::Validation("invalid to_card_id".to_string()))?;

        let history = self
            .store
            .login_events_for_user(&principal.user_id)
            .map_err(PipelineError::History)?;
        debug!(
            user_id = %principal.user_id,
            events = history.len(),
            "login history retrieved"
        );

        // A single instant anchors the feature windows and becomes the
        // record timestamp; the clock is never sampled twice.
        let now = Utc::now();
        let vector = features::compute(&principal.user_id, &history, now);

        let verdict = self.classifier.score(&vector).await?;

        let transfer = Transfer {
            id: Uuid::new_v4(),
            from_user_id: principal.user_id.clone(),
            from_card_id,
            to_card_id,
            amount: request.amount,
            when: now,
            fraud_score: verdict.fraud_probability,
            is_blocked: verdict.block_transaction,
        };
        self.store
            .append_transfer(&transfer)
            .map_err(PipelineError::Persistence)?;

        info!(
            transfer_id = %transfer.id,
            user_id = %transfer.from_user_id,
            fraud_score = transfer.fraud_score,
            is_blocked = transfer.is_blocked,
            "transfer decision recorded"
        );
        Ok(transfer)
    }
}
