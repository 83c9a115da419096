//! Risk classifier client: posts a feature vector to the scoring service and
//! returns its verdict. Fail-stop: no retry, no fallback score. A transfer
//! whose scoring fails never reaches a decision.

use crate::config::ClassifierConfig;
use crate::error::ClassifierError;
use crate::features::FeatureVector;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Scoring service response.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub fraud_probability: f64,
    pub block_transaction: bool,
}

pub struct ClassifierClient {
    http: reqwest::Client,
    predict_url: String,
}

impl ClassifierClient {
    /// Build the shared outbound client with the configured bounded timeout.
    pub fn new(config: &ClassifierConfig) -> Result<Self, ClassifierError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            predict_url: format!("{}/predict", config.base_url.trim_end_matches('/')),
        })
    }

    /// One outbound call; transport failure, non-2xx status, or an
    /// undecodable body all surface as [`ClassifierError`].
    pub async fn score(&self, features: &FeatureVector) -> Result<Verdict, ClassifierError> {
        let response = self.http.post(&self.predict_url).json(features).send().await?;
        if !response.status().is_success() {
            return Err(ClassifierError::Status(response.status()));
        }
        let verdict: Verdict = response.json().await?;
        debug!(
            subject = %features.cst_dim_id,
            fraud_probability = verdict.fraud_probability,
            block = verdict.block_transaction,
            "classifier verdict"
        );
        Ok(verdict)
    }
}
