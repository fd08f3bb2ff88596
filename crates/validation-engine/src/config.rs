//! Engine configuration
//!
//! Every setting has a default. Settings can be overridden from environment
//! variables (`VALIDATION_*`) or loaded from a TOML or YAML file.

use chrono::{NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{EngineError, Result};

/// Top-level engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub cache: CacheConfig,
    pub executor: ExecutorConfig,
    pub monitor: MonitorConfig,
    pub events: EventsConfig,
    pub store: StoreConfig,
}

/// Result cache settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: 300,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// Rule executor settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Timeout applied to every record-store read
    pub query_timeout_ms: u64,
    /// Default hop limit for hierarchy traversals
    pub max_hierarchy_depth: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            query_timeout_ms: 5000,
            max_hierarchy_depth: 10,
        }
    }
}

impl ExecutorConfig {
    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }
}

/// Alert thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertThresholds {
    /// Fraction of failed outcomes above which an alert is raised
    pub error_rate: f64,
    /// Data quality score (0-100) below which an alert is raised
    pub data_quality: f64,
    /// Mean response time in milliseconds above which an alert is raised
    pub performance_ms: f64,
    /// Error rate above which the alert is critical
    pub critical_error_rate: f64,
    /// Data quality score below which the alert is critical
    pub critical_data_quality: f64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            error_rate: 0.10,
            data_quality: 80.0,
            performance_ms: 5000.0,
            critical_error_rate: 0.25,
            critical_data_quality: 60.0,
        }
    }
}

/// Monitor schedule and aggregation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub metrics_interval_secs: u64,
    pub alert_interval_secs: u64,
    /// Trailing window for rolling metrics
    pub window_hours: i64,
    /// Cap on `top_failing_rules`
    pub top_failing_rules: usize,
    /// Acknowledged alerts older than this are pruned
    pub alert_retention_days: i64,
    pub thresholds: AlertThresholds,
    /// Wall-clock time (UTC, `HH:MM`) of the daily report
    pub daily_report_time: String,
    /// Weekday of the weekly report (`mon`, `tuesday`, ...)
    pub weekly_report_day: String,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            metrics_interval_secs: 60,
            alert_interval_secs: 300,
            window_hours: 24,
            top_failing_rules: 10,
            alert_retention_days: 7,
            thresholds: AlertThresholds::default(),
            daily_report_time: "09:00".to_string(),
            weekly_report_day: "mon".to_string(),
        }
    }
}

impl MonitorConfig {
    pub fn metrics_interval(&self) -> Duration {
        Duration::from_secs(self.metrics_interval_secs)
    }

    pub fn alert_interval(&self) -> Duration {
        Duration::from_secs(self.alert_interval_secs)
    }

    pub fn window(&self) -> chrono::Duration {
        chrono::Duration::hours(self.window_hours)
    }

    pub fn alert_retention(&self) -> chrono::Duration {
        chrono::Duration::days(self.alert_retention_days)
    }

    pub fn report_time(&self) -> Result<NaiveTime> {
        NaiveTime::parse_from_str(&self.daily_report_time, "%H:%M").map_err(|e| {
            EngineError::config(format!(
                "Invalid daily_report_time '{}': {}",
                self.daily_report_time, e
            ))
        })
    }

    pub fn report_weekday(&self) -> Result<Weekday> {
        Weekday::from_str(&self.weekly_report_day).map_err(|_| {
            EngineError::config(format!(
                "Invalid weekly_report_day '{}'",
                self.weekly_report_day
            ))
        })
    }
}

/// Event bus settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    pub capacity: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self { capacity: 1024 }
    }
}

/// Results service settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Base URL of the results service; in-memory storage when unset
    pub results_url: Option<String>,
    pub timeout_ms: u64,
    pub max_retries: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            results_url: None,
            timeout_ms: 5000,
            max_retries: 3,
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl EngineConfig {
    /// Create a new config builder
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::new()
    }

    /// Create config from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let monitor = defaults.monitor;
        let thresholds = monitor.thresholds;

        Self {
            cache: CacheConfig {
                enabled: env_or("VALIDATION_CACHE_ENABLED", defaults.cache.enabled),
                ttl_secs: env_or("VALIDATION_CACHE_TTL_SECS", defaults.cache.ttl_secs),
            },
            executor: ExecutorConfig {
                query_timeout_ms: env_or(
                    "VALIDATION_QUERY_TIMEOUT_MS",
                    defaults.executor.query_timeout_ms,
                ),
                max_hierarchy_depth: env_or(
                    "VALIDATION_MAX_HIERARCHY_DEPTH",
                    defaults.executor.max_hierarchy_depth,
                ),
            },
            monitor: MonitorConfig {
                metrics_interval_secs: env_or(
                    "VALIDATION_METRICS_INTERVAL_SECS",
                    monitor.metrics_interval_secs,
                ),
                alert_interval_secs: env_or(
                    "VALIDATION_ALERT_INTERVAL_SECS",
                    monitor.alert_interval_secs,
                ),
                window_hours: env_or("VALIDATION_WINDOW_HOURS", monitor.window_hours),
                top_failing_rules: env_or(
                    "VALIDATION_TOP_FAILING_RULES",
                    monitor.top_failing_rules,
                ),
                alert_retention_days: env_or(
                    "VALIDATION_ALERT_RETENTION_DAYS",
                    monitor.alert_retention_days,
                ),
                thresholds: AlertThresholds {
                    error_rate: env_or("VALIDATION_ERROR_RATE_THRESHOLD", thresholds.error_rate),
                    data_quality: env_or(
                        "VALIDATION_DATA_QUALITY_THRESHOLD",
                        thresholds.data_quality,
                    ),
                    performance_ms: env_or(
                        "VALIDATION_PERFORMANCE_THRESHOLD_MS",
                        thresholds.performance_ms,
                    ),
                    critical_error_rate: env_or(
                        "VALIDATION_CRITICAL_ERROR_RATE",
                        thresholds.critical_error_rate,
                    ),
                    critical_data_quality: env_or(
                        "VALIDATION_CRITICAL_DATA_QUALITY",
                        thresholds.critical_data_quality,
                    ),
                },
                daily_report_time: env_or("VALIDATION_DAILY_REPORT_TIME", monitor.daily_report_time),
                weekly_report_day: env_or("VALIDATION_WEEKLY_REPORT_DAY", monitor.weekly_report_day),
            },
            events: EventsConfig {
                capacity: env_or("VALIDATION_EVENT_CAPACITY", defaults.events.capacity),
            },
            store: StoreConfig {
                results_url: std::env::var("VALIDATION_RESULTS_URL").ok(),
                timeout_ms: env_or("VALIDATION_STORE_TIMEOUT_MS", defaults.store.timeout_ms),
                max_retries: env_or("VALIDATION_STORE_MAX_RETRIES", defaults.store.max_retries),
            },
        }
    }

    /// Load config from a TOML or YAML file (chosen by extension)
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;

        let config: Self = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => toml::from_str(&content)?,
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content)?,
            Some("json") => serde_json::from_str(&content)?,
            other => {
                return Err(EngineError::config(format!(
                    "Unsupported config file extension: {:?}",
                    other
                )))
            }
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.monitor.metrics_interval_secs == 0 || self.monitor.alert_interval_secs == 0 {
            return Err(EngineError::config("Monitor intervals must be greater than zero"));
        }
        if self.monitor.window_hours <= 0 {
            return Err(EngineError::config("window_hours must be positive"));
        }
        if self.executor.max_hierarchy_depth == 0 {
            return Err(EngineError::config("max_hierarchy_depth must be positive"));
        }
        if self.events.capacity == 0 {
            return Err(EngineError::config("Event capacity must be positive"));
        }

        let t = &self.monitor.thresholds;
        if !(0.0..=1.0).contains(&t.error_rate) || !(0.0..=1.0).contains(&t.critical_error_rate) {
            return Err(EngineError::config("Error rate thresholds must be within 0.0..=1.0"));
        }
        if !(0.0..=100.0).contains(&t.data_quality)
            || !(0.0..=100.0).contains(&t.critical_data_quality)
        {
            return Err(EngineError::config(
                "Data quality thresholds must be within 0.0..=100.0",
            ));
        }
        if t.performance_ms <= 0.0 {
            return Err(EngineError::config("performance_ms must be positive"));
        }

        self.monitor.report_time()?;
        self.monitor.report_weekday()?;
        Ok(())
    }
}

/// Builder for EngineConfig
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
        }
    }

    pub fn cache_ttl_secs(mut self, ttl_secs: u64) -> Self {
        self.config.cache.ttl_secs = ttl_secs;
        self
    }

    pub fn cache_enabled(mut self, enabled: bool) -> Self {
        self.config.cache.enabled = enabled;
        self
    }

    pub fn query_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.config.executor.query_timeout_ms = timeout_ms;
        self
    }

    pub fn max_hierarchy_depth(mut self, depth: usize) -> Self {
        self.config.executor.max_hierarchy_depth = depth;
        self
    }

    pub fn monitor_intervals(mut self, metrics_secs: u64, alert_secs: u64) -> Self {
        self.config.monitor.metrics_interval_secs = metrics_secs;
        self.config.monitor.alert_interval_secs = alert_secs;
        self
    }

    pub fn thresholds(mut self, thresholds: AlertThresholds) -> Self {
        self.config.monitor.thresholds = thresholds;
        self
    }

    pub fn results_url(mut self, url: impl Into<String>) -> Self {
        self.config.store.results_url = Some(url.into());
        self
    }

    pub fn build(self) -> EngineConfig {
        self.config
    }
}

impl Default for EngineConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert!(config.cache.enabled);
        assert_eq!(config.cache.ttl_secs, 300);
        assert_eq!(config.executor.max_hierarchy_depth, 10);
        assert_eq!(config.monitor.metrics_interval_secs, 60);
        assert_eq!(config.monitor.alert_interval_secs, 300);
        assert_eq!(config.monitor.window_hours, 24);
        assert_eq!(config.monitor.top_failing_rules, 10);
        assert_eq!(config.monitor.alert_retention_days, 7);
        assert_eq!(config.monitor.thresholds.error_rate, 0.10);
        assert_eq!(config.monitor.thresholds.data_quality, 80.0);
        assert_eq!(config.monitor.thresholds.performance_ms, 5000.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = EngineConfig::builder()
            .cache_ttl_secs(10)
            .cache_enabled(false)
            .query_timeout_ms(250)
            .max_hierarchy_depth(4)
            .monitor_intervals(5, 15)
            .results_url("http://results:8080")
            .build();

        assert_eq!(config.cache.ttl_secs, 10);
        assert!(!config.cache.enabled);
        assert_eq!(config.executor.query_timeout_ms, 250);
        assert_eq!(config.executor.max_hierarchy_depth, 4);
        assert_eq!(config.monitor.metrics_interval_secs, 5);
        assert_eq!(config.monitor.alert_interval_secs, 15);
        assert_eq!(config.store.results_url.as_deref(), Some("http://results:8080"));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = EngineConfig::default();
        config.monitor.metrics_interval_secs = 0;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.monitor.thresholds.error_rate = 1.5;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.monitor.daily_report_time = "25:99".to_string();
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.monitor.weekly_report_day = "someday".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_toml_file_with_partial_settings() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[cache]\nttl_secs = 60\n\n[monitor.thresholds]\nerror_rate = 0.2\n"
        )
        .unwrap();

        let config = EngineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.cache.ttl_secs, 60);
        assert!(config.cache.enabled);
        assert_eq!(config.monitor.thresholds.error_rate, 0.2);
        assert_eq!(config.monitor.thresholds.data_quality, 80.0);
    }

    #[test]
    fn test_from_yaml_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "monitor:\n  weekly_report_day: friday\n  window_hours: 12\n").unwrap();

        let config = EngineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.monitor.window_hours, 12);
        assert_eq!(config.monitor.report_weekday().unwrap(), Weekday::Fri);
    }

    #[test]
    fn test_unsupported_extension() {
        let file = tempfile::Builder::new().suffix(".ini").tempfile().unwrap();
        assert!(EngineConfig::from_file(file.path()).is_err());
    }
}
