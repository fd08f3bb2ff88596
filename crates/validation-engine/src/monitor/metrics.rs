//! Rolling metrics over persisted outcomes

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::contracts::{RuleFailureCount, ValidationMetricsSnapshot, ValidationOutcome};

/// Aggregate `outcomes` into a snapshot for `[window_start, window_end)`.
///
/// `top_failing_rules` is ordered by failure count descending, then by rule
/// name, and capped at `top_n`.
pub fn compute_metrics(
    outcomes: &[ValidationOutcome],
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    top_n: usize,
) -> ValidationMetricsSnapshot {
    if outcomes.is_empty() {
        return ValidationMetricsSnapshot::empty(window_start, window_end);
    }

    let total = outcomes.len();
    let successful = outcomes.iter().filter(|o| o.is_valid).count();
    let failed = total - successful;
    let total_duration: u64 = outcomes.iter().map(|o| o.duration_ms).sum();

    let mut failures: HashMap<&str, usize> = HashMap::new();
    for rule in outcomes.iter().flat_map(|o| o.failed_rules.iter()) {
        *failures.entry(rule.as_str()).or_default() += 1;
    }
    let mut top_failing_rules: Vec<RuleFailureCount> = failures
        .into_iter()
        .map(|(rule_name, failure_count)| RuleFailureCount {
            rule_name: rule_name.to_string(),
            failure_count,
        })
        .collect();
    top_failing_rules.sort_by(|a, b| {
        b.failure_count
            .cmp(&a.failure_count)
            .then_with(|| a.rule_name.cmp(&b.rule_name))
    });
    top_failing_rules.truncate(top_n);

    ValidationMetricsSnapshot {
        window_start,
        window_end,
        total,
        successful,
        failed,
        error_rate: failed as f64 / total as f64,
        data_quality_score: successful as f64 / total as f64 * 100.0,
        average_response_time_ms: total_duration as f64 / total as f64,
        top_failing_rules,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::ValidationIssue;

    fn outcome(valid: bool, failed_rules: &[&str], duration_ms: u64) -> ValidationOutcome {
        let mut outcome = ValidationOutcome::new("contact", None);
        if !valid {
            outcome.errors.push(ValidationIssue::new("email", "required", "missing"));
        }
        outcome.failed_rules = failed_rules.iter().map(|s| s.to_string()).collect();
        outcome.duration_ms = duration_ms;
        outcome.refresh();
        outcome
    }

    #[test]
    fn test_empty_window() {
        let now = Utc::now();
        let snapshot = compute_metrics(&[], now - chrono::Duration::hours(24), now, 10);
        assert_eq!(snapshot.total, 0);
        assert_eq!(snapshot.error_rate, 0.0);
        assert_eq!(snapshot.data_quality_score, 100.0);
    }

    #[test]
    fn test_rates_and_top_rules() {
        let now = Utc::now();
        let outcomes = vec![
            outcome(true, &[], 10),
            outcome(false, &["email", "name"], 20),
            outcome(false, &["email"], 30),
            outcome(true, &[], 40),
        ];
        let snapshot = compute_metrics(&outcomes, now, now, 1);

        assert_eq!(snapshot.total, 4);
        assert_eq!(snapshot.failed, 2);
        assert!((snapshot.error_rate - 0.5).abs() < f64::EPSILON);
        assert!((snapshot.data_quality_score - 50.0).abs() < f64::EPSILON);
        assert!((snapshot.average_response_time_ms - 25.0).abs() < f64::EPSILON);
        assert_eq!(
            snapshot.top_failing_rules,
            vec![RuleFailureCount {
                rule_name: "email".to_string(),
                failure_count: 2
            }]
        );
    }
}
