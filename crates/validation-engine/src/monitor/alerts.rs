//! Threshold alerts
//!
//! Every alert tick raises one new alert per violated threshold. Duplicates
//! across ticks are expected; consumers acknowledge what they have seen.
//! Acknowledged alerts older than the retention window are pruned,
//! unacknowledged alerts are kept regardless of age.

use chrono::{DateTime, Duration, Utc};
use std::sync::RwLock;
use uuid::Uuid;

use crate::config::AlertThresholds;
use crate::contracts::{AlertSeverity, AlertType, ValidationAlert, ValidationMetricsSnapshot};
use crate::error::{EngineError, Result};

/// Alerts for every threshold `snapshot` violates
pub fn check_thresholds(
    thresholds: &AlertThresholds,
    snapshot: &ValidationMetricsSnapshot,
    now: DateTime<Utc>,
) -> Vec<ValidationAlert> {
    let mut alerts = Vec::new();

    if snapshot.error_rate > thresholds.error_rate {
        let severity = if snapshot.error_rate > thresholds.critical_error_rate {
            AlertSeverity::Critical
        } else {
            AlertSeverity::High
        };
        alerts.push(ValidationAlert::new(
            AlertType::ErrorRate,
            severity,
            format!(
                "Error rate {:.1}% exceeds threshold {:.1}%",
                snapshot.error_rate * 100.0,
                thresholds.error_rate * 100.0
            ),
            thresholds.error_rate,
            snapshot.error_rate,
            now,
        ));
    }

    if snapshot.data_quality_score < thresholds.data_quality {
        let severity = if snapshot.data_quality_score < thresholds.critical_data_quality {
            AlertSeverity::Critical
        } else {
            AlertSeverity::Medium
        };
        alerts.push(ValidationAlert::new(
            AlertType::DataQuality,
            severity,
            format!(
                "Data quality score {:.1} is below threshold {:.1}",
                snapshot.data_quality_score, thresholds.data_quality
            ),
            thresholds.data_quality,
            snapshot.data_quality_score,
            now,
        ));
    }

    if snapshot.average_response_time_ms > thresholds.performance_ms {
        let severity = if snapshot.average_response_time_ms > thresholds.performance_ms * 2.0 {
            AlertSeverity::High
        } else {
            AlertSeverity::Medium
        };
        alerts.push(ValidationAlert::new(
            AlertType::Performance,
            severity,
            format!(
                "Average response time {:.0}ms exceeds threshold {:.0}ms",
                snapshot.average_response_time_ms, thresholds.performance_ms
            ),
            thresholds.performance_ms,
            snapshot.average_response_time_ms,
            now,
        ));
    }

    alerts
}

/// Owns the alert list
pub struct AlertManager {
    alerts: RwLock<Vec<ValidationAlert>>,
    thresholds: AlertThresholds,
    retention: Duration,
}

fn lock_error<E: std::fmt::Display>(e: E) -> EngineError {
    EngineError::Internal(format!("Failed to acquire alert lock: {}", e))
}

impl AlertManager {
    pub fn new(thresholds: AlertThresholds, retention: Duration) -> Self {
        Self {
            alerts: RwLock::new(Vec::new()),
            thresholds,
            retention,
        }
    }

    pub fn thresholds(&self) -> &AlertThresholds {
        &self.thresholds
    }

    /// Raise alerts for `snapshot` and store them; returns the new alerts
    pub fn evaluate(&self, snapshot: &ValidationMetricsSnapshot, now: DateTime<Utc>) -> Result<Vec<ValidationAlert>> {
        let raised = check_thresholds(&self.thresholds, snapshot, now);
        if !raised.is_empty() {
            self.alerts.write().map_err(lock_error)?.extend(raised.iter().cloned());
        }
        Ok(raised)
    }

    /// Mark an alert acknowledged. Acknowledging twice is a no-op.
    pub fn acknowledge(&self, id: Uuid, now: DateTime<Utc>) -> Result<ValidationAlert> {
        let mut alerts = self.alerts.write().map_err(lock_error)?;
        let alert = alerts
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| EngineError::not_found(format!("alert {}", id)))?;
        if !alert.acknowledged {
            alert.acknowledged = true;
            alert.acknowledged_at = Some(now);
            tracing::info!(alert_id = %id, alert_type = %alert.alert_type, "Alert acknowledged");
        }
        Ok(alert.clone())
    }

    /// Drop acknowledged alerts older than the retention window
    pub fn prune(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut alerts = self.alerts.write().map_err(lock_error)?;
        let before = alerts.len();
        let retention = self.retention;
        alerts.retain(|a| !(a.acknowledged && now - a.timestamp > retention));
        Ok(before - alerts.len())
    }

    /// Unacknowledged alerts, oldest first
    pub fn active_alerts(&self) -> Result<Vec<ValidationAlert>> {
        Ok(self
            .alerts
            .read()
            .map_err(lock_error)?
            .iter()
            .filter(|a| !a.acknowledged)
            .cloned()
            .collect())
    }

    pub fn all_alerts(&self) -> Result<Vec<ValidationAlert>> {
        Ok(self.alerts.read().map_err(lock_error)?.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn snapshot(error_rate: f64, quality: f64, avg_ms: f64) -> ValidationMetricsSnapshot {
        let now = Utc::now();
        let mut snapshot = ValidationMetricsSnapshot::empty(now, now);
        snapshot.total = 100;
        snapshot.error_rate = error_rate;
        snapshot.data_quality_score = quality;
        snapshot.average_response_time_ms = avg_ms;
        snapshot
    }

    fn manager() -> AlertManager {
        AlertManager::new(AlertThresholds::default(), Duration::days(7))
    }

    #[test]
    fn test_healthy_metrics_raise_nothing() {
        let alerts = check_thresholds(&AlertThresholds::default(), &snapshot(0.05, 95.0, 120.0), Utc::now());
        assert!(alerts.is_empty());
    }

    #[test]
    fn test_error_rate_escalates() {
        let thresholds = AlertThresholds::default();
        let high = check_thresholds(&thresholds, &snapshot(0.15, 85.0, 0.0), Utc::now());
        assert_eq!(high.len(), 1);
        assert_eq!(high[0].alert_type, AlertType::ErrorRate);
        assert_eq!(high[0].severity, AlertSeverity::High);

        let critical = check_thresholds(&thresholds, &snapshot(0.30, 70.0, 0.0), Utc::now());
        let error_rate = critical.iter().find(|a| a.alert_type == AlertType::ErrorRate).unwrap();
        assert_eq!(error_rate.severity, AlertSeverity::Critical);
        let quality = critical.iter().find(|a| a.alert_type == AlertType::DataQuality).unwrap();
        assert_eq!(quality.severity, AlertSeverity::Medium);
    }

    #[test]
    fn test_performance_severity() {
        let thresholds = AlertThresholds::default();
        let medium = check_thresholds(&thresholds, &snapshot(0.0, 100.0, 6000.0), Utc::now());
        assert_eq!(medium[0].severity, AlertSeverity::Medium);
        let high = check_thresholds(&thresholds, &snapshot(0.0, 100.0, 12000.0), Utc::now());
        assert_eq!(high[0].severity, AlertSeverity::High);
    }

    #[test]
    fn test_duplicates_across_ticks() {
        let manager = manager();
        let now = Utc::now();
        manager.evaluate(&snapshot(0.15, 85.0, 0.0), now).unwrap();
        manager.evaluate(&snapshot(0.15, 85.0, 0.0), now).unwrap();
        assert_eq!(manager.active_alerts().unwrap().len(), 2);
    }

    #[test]
    fn test_acknowledge_is_idempotent() {
        let manager = manager();
        let now = Utc::now();
        let alert = manager.evaluate(&snapshot(0.15, 85.0, 0.0), now).unwrap().remove(0);

        let first = manager.acknowledge(alert.id, now).unwrap();
        let second = manager.acknowledge(alert.id, now + Duration::hours(1)).unwrap();
        assert!(second.acknowledged);
        assert_eq!(first.acknowledged_at, second.acknowledged_at);
        assert!(manager.active_alerts().unwrap().is_empty());

        assert!(matches!(
            manager.acknowledge(Uuid::new_v4(), now),
            Err(EngineError::NotFound(_))
        ));
    }

    #[test]
    fn test_prune_keeps_unacknowledged() {
        let manager = manager();
        let start = Utc::now();
        let acked = manager.evaluate(&snapshot(0.15, 85.0, 0.0), start).unwrap().remove(0);
        manager.evaluate(&snapshot(0.15, 85.0, 0.0), start).unwrap();
        manager.acknowledge(acked.id, start).unwrap();

        assert_eq!(manager.prune(start + Duration::days(6)).unwrap(), 0);
        assert_eq!(manager.prune(start + Duration::days(8)).unwrap(), 1);

        let remaining = manager.all_alerts().unwrap();
        assert_eq!(remaining.len(), 1);
        assert!(!remaining[0].acknowledged);
    }

    proptest! {
        #[test]
        fn prop_critical_error_rate_always_critical(rate in 0.2501f64..1.0) {
            let alerts = check_thresholds(&AlertThresholds::default(), &snapshot(rate, 100.0 - rate * 100.0, 0.0), Utc::now());
            let alert = alerts.iter().find(|a| a.alert_type == AlertType::ErrorRate).unwrap();
            prop_assert_eq!(alert.severity, AlertSeverity::Critical);
        }
    }
}
