//! Prometheus metrics for the validation engine
//!
//! - `validations_total` (counter) - completed validations by mode, entity type and result
//! - `validation_duration_seconds` (histogram) - per-call latency by mode
//! - `cache_lookups_total` (counter) - sync cache hits and misses
//! - `rule_faults_total` (counter) - rule evaluations that faulted, by code
//! - `persistence_failures_total` (counter) - async outcomes that failed to persist
//! - `alerts_raised_total` (counter) - alerts by type and severity
//! - `error_rate`, `data_quality_score`, `average_response_time_ms`,
//!   `active_alerts` (gauges) - last monitor snapshot

use prometheus::{Counter, CounterVec, Gauge, HistogramOpts, HistogramVec, Opts, Registry};
use std::sync::Arc;

use crate::contracts::{AlertSeverity, AlertType, ValidationMetricsSnapshot};
use crate::error::Result;

const NAMESPACE: &str = "entity_validation";

/// Validation mode label
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Sync,
    Async,
    Bulk,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Sync => "sync",
            Mode::Async => "async",
            Mode::Bulk => "bulk",
        }
    }
}

/// Engine metrics
pub struct EngineMetrics {
    validations_total: CounterVec,
    duration_seconds: HistogramVec,
    cache_lookups_total: CounterVec,
    rule_faults_total: CounterVec,
    persistence_failures_total: Counter,
    alerts_raised_total: CounterVec,
    error_rate: Gauge,
    data_quality_score: Gauge,
    average_response_time_ms: Gauge,
    active_alerts: Gauge,
}

impl EngineMetrics {
    /// Create and register with the provided registry
    pub fn new(registry: &Registry) -> Result<Self> {
        let validations_total = CounterVec::new(
            Opts::new("validations_total", "Completed entity validations").namespace(NAMESPACE),
            &["mode", "entity_type", "result"],
        )?;

        let duration_seconds = HistogramVec::new(
            HistogramOpts::new("validation_duration_seconds", "Validation call duration in seconds")
                .namespace(NAMESPACE)
                .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
            &["mode"],
        )?;

        let cache_lookups_total = CounterVec::new(
            Opts::new("cache_lookups_total", "Result cache lookups by result").namespace(NAMESPACE),
            &["result"],
        )?;

        let rule_faults_total = CounterVec::new(
            Opts::new("rule_faults_total", "Rule evaluations that faulted").namespace(NAMESPACE),
            &["code"],
        )?;

        let persistence_failures_total = Counter::with_opts(
            Opts::new("persistence_failures_total", "Async outcomes that failed to persist")
                .namespace(NAMESPACE),
        )?;

        let alerts_raised_total = CounterVec::new(
            Opts::new("alerts_raised_total", "Alerts raised by the monitor").namespace(NAMESPACE),
            &["type", "severity"],
        )?;

        let error_rate = Gauge::with_opts(
            Opts::new("error_rate", "Failed share of outcomes in the current window").namespace(NAMESPACE),
        )?;
        let data_quality_score = Gauge::with_opts(
            Opts::new("data_quality_score", "Successful share of outcomes in the current window (0-100)")
                .namespace(NAMESPACE),
        )?;
        let average_response_time_ms = Gauge::with_opts(
            Opts::new("average_response_time_ms", "Mean validation duration in the current window")
                .namespace(NAMESPACE),
        )?;
        let active_alerts = Gauge::with_opts(
            Opts::new("active_alerts", "Unacknowledged alerts").namespace(NAMESPACE),
        )?;

        registry.register(Box::new(validations_total.clone()))?;
        registry.register(Box::new(duration_seconds.clone()))?;
        registry.register(Box::new(cache_lookups_total.clone()))?;
        registry.register(Box::new(rule_faults_total.clone()))?;
        registry.register(Box::new(persistence_failures_total.clone()))?;
        registry.register(Box::new(alerts_raised_total.clone()))?;
        registry.register(Box::new(error_rate.clone()))?;
        registry.register(Box::new(data_quality_score.clone()))?;
        registry.register(Box::new(average_response_time_ms.clone()))?;
        registry.register(Box::new(active_alerts.clone()))?;

        Ok(Self {
            validations_total,
            duration_seconds,
            cache_lookups_total,
            rule_faults_total,
            persistence_failures_total,
            alerts_raised_total,
            error_rate,
            data_quality_score,
            average_response_time_ms,
            active_alerts,
        })
    }

    pub fn record_validation(&self, mode: Mode, entity_type: &str, valid: bool, duration_secs: f64) {
        let result = if valid { "valid" } else { "invalid" };
        self.validations_total
            .with_label_values(&[mode.as_str(), entity_type, result])
            .inc();
        self.duration_seconds
            .with_label_values(&[mode.as_str()])
            .observe(duration_secs);
    }

    pub fn record_cache_lookup(&self, hit: bool) {
        let result = if hit { "hit" } else { "miss" };
        self.cache_lookups_total.with_label_values(&[result]).inc();
    }

    pub fn record_rule_fault(&self, code: &str) {
        self.rule_faults_total.with_label_values(&[code]).inc();
    }

    pub fn record_persistence_failure(&self) {
        self.persistence_failures_total.inc();
    }

    pub fn record_alert(&self, alert_type: AlertType, severity: AlertSeverity) {
        self.alerts_raised_total
            .with_label_values(&[alert_type.as_str(), severity.as_str()])
            .inc();
    }

    /// Mirror the latest monitor snapshot into gauges
    pub fn set_snapshot(&self, snapshot: &ValidationMetricsSnapshot) {
        self.error_rate.set(snapshot.error_rate);
        self.data_quality_score.set(snapshot.data_quality_score);
        self.average_response_time_ms.set(snapshot.average_response_time_ms);
    }

    pub fn set_active_alerts(&self, count: usize) {
        self.active_alerts.set(count as f64);
    }

    pub fn persistence_failures(&self) -> f64 {
        self.persistence_failures_total.get()
    }

    pub fn cache_lookups(&self, hit: bool) -> f64 {
        let result = if hit { "hit" } else { "miss" };
        self.cache_lookups_total.with_label_values(&[result]).get()
    }
}

/// Owns the Prometheus registry and the engine metrics
pub struct MetricsRegistry {
    registry: Arc<Registry>,
    engine: Arc<EngineMetrics>,
}

impl MetricsRegistry {
    pub fn new() -> Result<Self> {
        Self::with_registry(Arc::new(Registry::new()))
    }

    /// Register into an existing Prometheus registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let engine = Arc::new(EngineMetrics::new(&registry)?);
        Ok(Self { registry, engine })
    }

    pub fn registry(&self) -> Arc<Registry> {
        Arc::clone(&self.registry)
    }

    pub fn engine(&self) -> Arc<EngineMetrics> {
        Arc::clone(&self.engine)
    }

    /// Encode metrics in the text exposition format
    pub fn encode_text(&self) -> Result<String> {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| crate::error::EngineError::Internal(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_validation() {
        let registry = MetricsRegistry::new().unwrap();
        let metrics = registry.engine();

        metrics.record_validation(Mode::Sync, "contact", true, 0.002);
        metrics.record_validation(Mode::Bulk, "workflow", false, 0.010);

        let text = registry.encode_text().unwrap();
        assert!(text.contains("entity_validation_validations_total"));
        assert!(text.contains("mode=\"bulk\""));
        assert!(text.contains("entity_validation_validation_duration_seconds"));
    }

    #[test]
    fn test_counters_and_gauges() {
        let registry = MetricsRegistry::new().unwrap();
        let metrics = registry.engine();

        metrics.record_cache_lookup(true);
        metrics.record_cache_lookup(false);
        metrics.record_cache_lookup(false);
        metrics.record_persistence_failure();
        metrics.record_rule_fault("RULE_EXECUTION_ERROR");
        metrics.record_alert(AlertType::ErrorRate, AlertSeverity::Critical);
        metrics.set_active_alerts(3);

        assert_eq!(metrics.cache_lookups(true), 1.0);
        assert_eq!(metrics.cache_lookups(false), 2.0);
        assert_eq!(metrics.persistence_failures(), 1.0);

        let text = registry.encode_text().unwrap();
        assert!(text.contains("entity_validation_active_alerts 3"));
        assert!(text.contains("severity=\"critical\""));
    }

    #[test]
    fn test_double_registration_fails() {
        let registry = Arc::new(Registry::new());
        assert!(MetricsRegistry::with_registry(Arc::clone(&registry)).is_ok());
        assert!(MetricsRegistry::with_registry(registry).is_err());
    }
}
