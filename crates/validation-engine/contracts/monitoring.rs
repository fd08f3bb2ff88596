//! Monitoring contracts: rolling metrics, alerts and periodic reports

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Rolling metrics computed from persisted outcomes over a trailing window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationMetricsSnapshot {
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    /// `failed / total`, 0.0 when the window is empty
    pub error_rate: f64,
    /// `successful / total * 100`, 100.0 when the window is empty
    pub data_quality_score: f64,
    /// Mean `duration_ms` of the outcomes in the window
    pub average_response_time_ms: f64,
    pub top_failing_rules: Vec<RuleFailureCount>,
}

impl ValidationMetricsSnapshot {
    /// Metrics for a window with no outcomes
    pub fn empty(window_start: DateTime<Utc>, window_end: DateTime<Utc>) -> Self {
        Self {
            window_start,
            window_end,
            total: 0,
            successful: 0,
            failed: 0,
            error_rate: 0.0,
            data_quality_score: 100.0,
            average_response_time_ms: 0.0,
            top_failing_rules: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleFailureCount {
    pub rule_name: String,
    pub failure_count: usize,
}

/// Metric an alert was raised for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    ErrorRate,
    Performance,
    DataQuality,
}

impl AlertType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::ErrorRate => "error_rate",
            AlertType::Performance => "performance",
            AlertType::DataQuality => "data_quality",
        }
    }
}

impl fmt::Display for AlertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl AlertSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertSeverity::Low => "low",
            AlertSeverity::Medium => "medium",
            AlertSeverity::High => "high",
            AlertSeverity::Critical => "critical",
        }
    }
}

impl fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A threshold violation observed on an alert tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationAlert {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub message: String,
    pub threshold: f64,
    pub actual_value: f64,
    pub timestamp: DateTime<Utc>,
    pub acknowledged: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acknowledged_at: Option<DateTime<Utc>>,
}

impl ValidationAlert {
    pub fn new(
        alert_type: AlertType,
        severity: AlertSeverity,
        message: impl Into<String>,
        threshold: f64,
        actual_value: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            alert_type,
            severity,
            message: message.into(),
            threshold,
            actual_value,
            timestamp,
            acknowledged: false,
            acknowledged_at: None,
        }
    }
}

/// Per-entity-type totals within a report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityTypeSummary {
    pub entity_type: String,
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    /// Percentage of successful outcomes, 0.0 when there are none
    pub success_rate: f64,
}

/// Summary of one calendar day (UTC)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyReport {
    pub date: NaiveDate,
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub success_rate: f64,
    pub by_entity_type: Vec<EntityTypeSummary>,
    pub generated_at: DateTime<Utc>,
}

/// One day of a weekly trend series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyTrendPoint {
    pub date: NaiveDate,
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub success_rate: f64,
}

/// Seven consecutive days ending on `end_date` (inclusive)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyReport {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub success_rate: f64,
    pub daily: Vec<DailyTrendPoint>,
    pub generated_at: DateTime<Utc>,
}

/// Percentage of `part` in `total`, 0.0 for an empty total
pub fn percentage(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alert_serializes_type_field() {
        let alert = ValidationAlert::new(
            AlertType::ErrorRate,
            AlertSeverity::High,
            "Error rate 15.0% exceeds 10.0%",
            0.10,
            0.15,
            Utc::now(),
        );
        let json = serde_json::to_value(&alert).unwrap();
        assert_eq!(json["type"], "error_rate");
        assert_eq!(json["severity"], "high");
        assert_eq!(json["acknowledged"], false);
    }

    #[test]
    fn test_severity_ordering() {
        assert!(AlertSeverity::Low < AlertSeverity::Medium);
        assert!(AlertSeverity::High < AlertSeverity::Critical);
    }

    #[test]
    fn test_percentage() {
        assert_eq!(percentage(0, 0), 0.0);
        assert_eq!(percentage(3, 4), 75.0);
    }
}
