//! Statistical behavioral feature extraction from login history.

mod extract;

pub use extract::compute;

use serde::{Deserialize, Serialize};

/// Trailing window lengths anchored at the reference instant, both bounds
/// inclusive.
pub const SHORT_WINDOW_DAYS: i64 = 7;
pub const LONG_WINDOW_DAYS: i64 = 30;

/// Smoothing factor for the exponentially weighted mean of login gaps.
pub const EWMA_ALPHA: f64 = 0.3;

/// Fixed-shape behavioral summary of one user's login history, anchored at a
/// single reference instant. Field names are the classifier wire contract.
///
/// Numeric fields are exactly zero whenever there is not enough history to
/// derive them. The guards short-circuit the division instead of computing a
/// NaN/infinity and masking it; the classifier distinguishes zero from NaN
/// encodings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub cst_dim_id: String,
    pub monthly_os_changes: i64,
    pub monthly_phone_model_changes: i64,
    pub last_phone_model_categorical: String,
    pub last_os_categorical: String,
    pub logins_last_7_days: i64,
    pub logins_last_30_days: i64,
    pub login_frequency_7d: f64,
    pub login_frequency_30d: f64,
    pub freq_change_7d_vs_mean: f64,
    pub logins_7d_over_30d_ratio: f64,
    pub avg_login_interval_30d: f64,
    pub std_login_interval_30d: f64,
    pub var_login_interval_30d: f64,
    pub ewm_login_interval_7d: f64,
    pub burstiness_login_interval: f64,
    pub fano_factor_login_interval: f64,
    pub zscore_avg_login_interval_7d: f64,
}

impl FeatureVector {
    /// Empty vector carrying only the subject identity, all numerics zero.
    pub fn for_subject(subject_id: &str) -> Self {
        Self {
            cst_dim_id: subject_id.to_string(),
            ..Self::default()
        }
    }
}
