//! Windowed login statistics: counts, frequencies, inter-login gap moments,
//! EWMA, burstiness, Fano factor, z-score.

use super::{FeatureVector, EWMA_ALPHA, LONG_WINDOW_DAYS, SHORT_WINDOW_DAYS};
use crate::models::LoginEvent;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;

/// Derive the feature vector for `subject_id` from its login history,
/// anchored at `reference`. Pure and deterministic: no I/O, no clock reads;
/// identical inputs produce bit-identical output.
///
/// An event qualifies for a window iff `reference - window <= when <= reference`,
/// both bounds inclusive.
pub fn compute(
    subject_id: &str,
    history: &[LoginEvent],
    reference: DateTime<Utc>,
) -> FeatureVector {
    let mut vector = FeatureVector::for_subject(subject_id);

    let mut prior: Vec<&LoginEvent> = history.iter().filter(|e| e.when <= reference).collect();
    if prior.is_empty() {
        return vector;
    }
    prior.sort_by_key(|e| e.when);

    let last = prior[prior.len() - 1];
    vector.last_phone_model_categorical = last.phone_model.clone();
    vector.last_os_categorical = last.os.clone();

    let short_cutoff = reference - Duration::days(SHORT_WINDOW_DAYS);
    let long_cutoff = reference - Duration::days(LONG_WINDOW_DAYS);

    let mut count_short: i64 = 0;
    let mut count_long: i64 = 0;
    let mut phone_models: HashSet<&str> = HashSet::new();
    let mut os_names: HashSet<&str> = HashSet::new();
    // Ascending, since `prior` is sorted.
    let mut times_long: Vec<DateTime<Utc>> = Vec::new();

    for event in &prior {
        if event.when >= long_cutoff {
            count_long += 1;
            phone_models.insert(event.phone_model.as_str());
            os_names.insert(event.os.as_str());
            times_long.push(event.when);
        }
        if event.when >= short_cutoff {
            count_short += 1;
        }
    }

    // "Monthly changes" is the count of distinct values seen in the long
    // window, not the count of events.
    vector.monthly_phone_model_changes = phone_models.len() as i64;
    vector.monthly_os_changes = os_names.len() as i64;
    vector.logins_last_7_days = count_short;
    vector.logins_last_30_days = count_long;

    if count_short > 0 {
        vector.login_frequency_7d = count_short as f64 / SHORT_WINDOW_DAYS as f64;
    }
    if count_long > 0 {
        vector.login_frequency_30d = count_long as f64 / LONG_WINDOW_DAYS as f64;
    }
    if vector.login_frequency_30d != 0.0 {
        vector.freq_change_7d_vs_mean = (vector.login_frequency_7d - vector.login_frequency_30d)
            / vector.login_frequency_30d;
    }
    if count_long != 0 {
        vector.logins_7d_over_30d_ratio = count_short as f64 / count_long as f64;
    }

    // Interval statistics need at least one gap in the long window.
    if times_long.len() < 2 {
        return vector;
    }

    let gaps: Vec<f64> = times_long
        .windows(2)
        .map(|pair| gap_seconds(pair[0], pair[1]))
        .collect();
    let mean = gaps.iter().sum::<f64>() / gaps.len() as f64;
    let variance = gaps.iter().map(|g| (g - mean) * (g - mean)).sum::<f64>() / gaps.len() as f64;
    let std = variance.sqrt();
    vector.avg_login_interval_30d = mean;
    vector.std_login_interval_30d = std;
    vector.var_login_interval_30d = variance;

    // A gap qualifies for the EWMA by its later endpoint falling in the short
    // window; the earlier endpoint may be older. Seeded with the first
    // qualifying gap.
    let mut ewma = 0.0;
    let mut seeded = false;
    for i in 1..times_long.len() {
        if times_long[i] >= short_cutoff {
            let gap = gap_seconds(times_long[i - 1], times_long[i]);
            ewma = if seeded {
                EWMA_ALPHA * gap + (1.0 - EWMA_ALPHA) * ewma
            } else {
                gap
            };
            seeded = true;
        }
    }
    if seeded {
        vector.ewm_login_interval_7d = ewma;
    }

    if mean + std != 0.0 {
        vector.burstiness_login_interval = (std - mean) / (std + mean);
    }
    if mean != 0.0 {
        vector.fano_factor_login_interval = variance / mean;
    }

    let times_short: Vec<DateTime<Utc>> = times_long
        .iter()
        .copied()
        .filter(|t| *t >= short_cutoff)
        .collect();
    if times_short.len() >= 2 {
        let short_gaps: Vec<f64> = times_short
            .windows(2)
            .map(|pair| gap_seconds(pair[0], pair[1]))
            .collect();
        let short_mean = short_gaps.iter().sum::<f64>() / short_gaps.len() as f64;
        if std != 0.0 {
            vector.zscore_avg_login_interval_7d = (short_mean - mean) / std;
        }
    }

    vector
}

fn gap_seconds(earlier: DateTime<Utc>, later: DateTime<Utc>) -> f64 {
    let delta = later - earlier;
    match delta.num_microseconds() {
        Some(us) => us as f64 / 1e6,
        None => delta.num_seconds() as f64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use uuid::Uuid;

    fn event(user: &str, when: DateTime<Utc>, phone: &str, os: &str) -> LoginEvent {
        LoginEvent {
            id: Uuid::new_v4(),
            user_id: user.to_string(),
            when,
            phone_model: phone.to_string(),
            os: os.to_string(),
        }
    }

    fn reference() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
    }

    fn assert_interval_fields_zero(v: &FeatureVector) {
        assert_eq!(v.avg_login_interval_30d, 0.0);
        assert_eq!(v.std_login_interval_30d, 0.0);
        assert_eq!(v.var_login_interval_30d, 0.0);
        assert_eq!(v.ewm_login_interval_7d, 0.0);
        assert_eq!(v.burstiness_login_interval, 0.0);
        assert_eq!(v.fano_factor_login_interval, 0.0);
        assert_eq!(v.zscore_avg_login_interval_7d, 0.0);
    }

    #[test]
    fn empty_history_yields_subject_only() {
        let v = compute("u1", &[], reference());
        assert_eq!(v, FeatureVector::for_subject("u1"));
    }

    #[test]
    fn single_event_has_zero_interval_stats() {
        let r = reference();
        let history = vec![event("u1", r - Duration::days(1), "pixel-8", "android")];
        let v = compute("u1", &history, r);
        assert_eq!(v.logins_last_7_days, 1);
        assert_eq!(v.logins_last_30_days, 1);
        assert_eq!(v.last_phone_model_categorical, "pixel-8");
        assert_eq!(v.last_os_categorical, "android");
        assert_interval_fields_zero(&v);
    }

    #[test]
    fn events_after_reference_are_ignored() {
        let r = reference();
        let history = vec![
            event("u1", r + Duration::seconds(1), "future", "future"),
            event("u1", r - Duration::days(2), "pixel-8", "android"),
        ];
        let v = compute("u1", &history, r);
        assert_eq!(v.logins_last_30_days, 1);
        assert_eq!(v.last_phone_model_categorical, "pixel-8");
    }

    #[test]
    fn window_bounds_are_inclusive() {
        let r = reference();
        let at_short_edge = vec![event("u1", r - Duration::days(7), "a", "x")];
        let v = compute("u1", &at_short_edge, r);
        assert_eq!(v.logins_last_7_days, 1);

        let at_long_edge = vec![event("u1", r - Duration::days(30), "a", "x")];
        let v = compute("u1", &at_long_edge, r);
        assert_eq!(v.logins_last_30_days, 1);

        let past_long_edge = vec![event(
            "u1",
            r - Duration::days(30) - Duration::nanoseconds(1),
            "a",
            "x",
        )];
        let v = compute("u1", &past_long_edge, r);
        assert_eq!(v.logins_last_30_days, 0);
        // Still the most recent event at or before the reference.
        assert_eq!(v.last_phone_model_categorical, "a");
    }

    #[test]
    fn two_even_logins_scenario() {
        let r = reference();
        let history = vec![
            event("u1", r - Duration::days(1), "pixel-8", "android"),
            event("u1", r - Duration::days(3), "pixel-8", "android"),
        ];
        let v = compute("u1", &history, r);

        assert_eq!(v.logins_last_7_days, 2);
        assert_eq!(v.logins_last_30_days, 2);
        assert_eq!(v.login_frequency_7d, 2.0 / 7.0);
        assert_eq!(v.login_frequency_30d, 2.0 / 30.0);
        assert_eq!(v.monthly_phone_model_changes, 1);
        assert_eq!(v.monthly_os_changes, 1);

        // One gap of exactly two days.
        assert_eq!(v.avg_login_interval_30d, 172_800.0);
        assert_eq!(v.var_login_interval_30d, 0.0);
        assert_eq!(v.std_login_interval_30d, 0.0);
        // std = 0, mean > 0: (0 - mean) / (0 + mean) = -1.
        assert_eq!(v.burstiness_login_interval, -1.0);
        assert_eq!(v.fano_factor_login_interval, 0.0);
        // Both endpoints inside the short window, so the EWMA is the seed gap.
        assert_eq!(v.ewm_login_interval_7d, 172_800.0);
        // std = 0 guard.
        assert_eq!(v.zscore_avg_login_interval_7d, 0.0);
    }

    #[test]
    fn distinct_devices_counted_in_long_window() {
        let r = reference();
        let history = vec![
            event("u1", r - Duration::days(2), "pixel-8", "android"),
            event("u1", r - Duration::days(10), "iphone-15", "ios"),
            event("u1", r - Duration::days(20), "pixel-8", "android"),
            // Outside the long window, must not contribute a distinct value.
            event("u1", r - Duration::days(40), "nokia-3310", "symbian"),
        ];
        let v = compute("u1", &history, r);
        assert_eq!(v.monthly_phone_model_changes, 2);
        assert_eq!(v.monthly_os_changes, 2);
        assert_eq!(v.logins_last_30_days, 3);
        assert_eq!(v.logins_last_7_days, 1);
        assert_eq!(v.logins_7d_over_30d_ratio, 1.0 / 3.0);
    }

    #[test]
    fn frequency_change_against_long_mean() {
        let r = reference();
        let history = vec![
            event("u1", r - Duration::days(1), "a", "x"),
            event("u1", r - Duration::days(2), "a", "x"),
            event("u1", r - Duration::days(20), "a", "x"),
        ];
        let v = compute("u1", &history, r);
        let freq7 = 2.0 / 7.0;
        let freq30 = 3.0 / 30.0;
        assert_eq!(v.freq_change_7d_vs_mean, (freq7 - freq30) / freq30);
    }

    #[test]
    fn ewma_seeds_then_smooths() {
        let r = reference();
        // Gaps between consecutive logins: 2d (outside short window by later
        // endpoint at -8d), 4d (later endpoint -4d, qualifies), 3d (later
        // endpoint -1d, qualifies).
        let history = vec![
            event("u1", r - Duration::days(10), "a", "x"),
            event("u1", r - Duration::days(8), "a", "x"),
            event("u1", r - Duration::days(4), "a", "x"),
            event("u1", r - Duration::days(1), "a", "x"),
        ];
        let v = compute("u1", &history, r);
        let day = 86_400.0;
        let seed = 4.0 * day;
        let expected = EWMA_ALPHA * (3.0 * day) + (1.0 - EWMA_ALPHA) * seed;
        assert_eq!(v.ewm_login_interval_7d, expected);
    }

    #[test]
    fn ewma_zero_when_no_gap_ends_in_short_window() {
        let r = reference();
        let history = vec![
            event("u1", r - Duration::days(20), "a", "x"),
            event("u1", r - Duration::days(15), "a", "x"),
            event("u1", r - Duration::days(10), "a", "x"),
        ];
        let v = compute("u1", &history, r);
        assert_eq!(v.ewm_login_interval_7d, 0.0);
        assert!(v.avg_login_interval_30d > 0.0);
    }

    #[test]
    fn zscore_uses_short_window_mean() {
        let r = reference();
        // Long-window gaps: 8d, 8d, 3d, 2d. Short-window points at -6d, -3d,
        // -1d give gaps of 3d and 2d.
        let history = vec![
            event("u1", r - Duration::days(1), "a", "x"),
            event("u1", r - Duration::days(3), "a", "x"),
            event("u1", r - Duration::days(6), "a", "x"),
            event("u1", r - Duration::days(14), "a", "x"),
            event("u1", r - Duration::days(22), "a", "x"),
        ];
        let v = compute("u1", &history, r);
        let day = 86_400.0;
        let gaps = [8.0 * day, 8.0 * day, 3.0 * day, 2.0 * day];
        let mean = gaps.iter().sum::<f64>() / gaps.len() as f64;
        let variance = gaps.iter().map(|g| (g - mean) * (g - mean)).sum::<f64>() / gaps.len() as f64;
        let std = variance.sqrt();
        let short_mean = (3.0 * day + 2.0 * day) / 2.0;
        assert!((v.zscore_avg_login_interval_7d - (short_mean - mean) / std).abs() < 1e-12);
    }

    #[test]
    fn derived_ratios_always_finite() {
        let r = reference();
        // Simultaneous logins force zero gaps: mean = std = variance = 0.
        let history = vec![
            event("u1", r - Duration::days(1), "a", "x"),
            event("u1", r - Duration::days(1), "a", "x"),
            event("u1", r - Duration::days(1), "b", "y"),
        ];
        let v = compute("u1", &history, r);
        assert_eq!(v.avg_login_interval_30d, 0.0);
        assert_eq!(v.burstiness_login_interval, 0.0);
        assert_eq!(v.fano_factor_login_interval, 0.0);
        assert_eq!(v.zscore_avg_login_interval_7d, 0.0);
        for value in [
            v.login_frequency_7d,
            v.login_frequency_30d,
            v.freq_change_7d_vs_mean,
            v.logins_7d_over_30d_ratio,
            v.avg_login_interval_30d,
            v.std_login_interval_30d,
            v.var_login_interval_30d,
            v.ewm_login_interval_7d,
            v.burstiness_login_interval,
            v.fano_factor_login_interval,
            v.zscore_avg_login_interval_7d,
        ] {
            assert!(value.is_finite());
        }
    }

    #[test]
    fn unsorted_input_is_handled() {
        let r = reference();
        let history = vec![
            event("u1", r - Duration::days(3), "old", "x"),
            event("u1", r - Duration::days(1), "new", "x"),
            event("u1", r - Duration::days(2), "mid", "x"),
        ];
        let v = compute("u1", &history, r);
        assert_eq!(v.last_phone_model_categorical, "new");
        assert_eq!(v.avg_login_interval_30d, 86_400.0);
    }

    #[test]
    fn identical_inputs_produce_identical_output() {
        let r = reference();
        let history = vec![
            event("u1", r - Duration::days(1), "a", "x"),
            event("u1", r - Duration::days(4), "b", "y"),
            event("u1", r - Duration::days(12), "a", "x"),
        ];
        let first = compute("u1", &history, r);
        let second = compute("u1", &history, r);
        assert_eq!(first, second);
    }
}
