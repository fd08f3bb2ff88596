//! Validation monitor
//!
//! Reads persisted outcomes on independent schedules:
//! - metrics tick: rolling snapshot over the trailing window
//! - alert tick: threshold evaluation and alert pruning
//! - daily / weekly report ticks at a fixed wall-clock time
//!
//! Each tick runs as its own task so a slow report never delays metrics.
//! Tick failures are logged and the schedule continues.

pub mod alerts;
pub mod metrics;
pub mod reports;

use chrono::{DateTime, Datelike, Duration as ChronoDuration, NaiveDate, NaiveTime, Utc, Weekday};
use std::future::Future;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};
use crate::config::MonitorConfig;
use crate::contracts::{DailyReport, ValidationAlert, ValidationMetricsSnapshot, WeeklyReport};
use crate::error::{EngineError, Result};
use crate::events::{EventBus, MonitorEvent};
use crate::store::OutcomeStore;
use crate::telemetry::EngineMetrics;

pub use alerts::{check_thresholds, AlertManager};
pub use metrics::compute_metrics;

struct MonitorState {
    outcomes: Arc<dyn OutcomeStore>,
    alerts: AlertManager,
    config: MonitorConfig,
    clock: Arc<dyn Clock>,
    events: Arc<EventBus<MonitorEvent>>,
    metrics: Option<Arc<EngineMetrics>>,
    latest: RwLock<Option<ValidationMetricsSnapshot>>,
}

impl MonitorState {
    async fn snapshot(&self) -> Result<ValidationMetricsSnapshot> {
        let end = self.clock.now();
        let start = end - self.config.window();
        let outcomes = self.outcomes.outcomes_between(start, end).await?;
        let snapshot = compute_metrics(&outcomes, start, end, self.config.top_failing_rules);

        if let Ok(mut latest) = self.latest.write() {
            *latest = Some(snapshot.clone());
        }
        if let Some(metrics) = &self.metrics {
            metrics.set_snapshot(&snapshot);
        }
        Ok(snapshot)
    }

    async fn metrics_tick(&self) -> Result<ValidationMetricsSnapshot> {
        let snapshot = self.snapshot().await?;
        tracing::debug!(
            total = snapshot.total,
            error_rate = snapshot.error_rate,
            data_quality = snapshot.data_quality_score,
            "Metrics tick complete"
        );
        self.events.publish(MonitorEvent::Metrics {
            snapshot: snapshot.clone(),
        });
        Ok(snapshot)
    }

    async fn alert_tick(&self) -> Result<Vec<ValidationAlert>> {
        let snapshot = self.snapshot().await?;
        let now = self.clock.now();
        let raised = self.alerts.evaluate(&snapshot, now)?;

        for alert in &raised {
            tracing::warn!(
                alert_id = %alert.id,
                alert_type = %alert.alert_type,
                severity = %alert.severity,
                threshold = alert.threshold,
                actual = alert.actual_value,
                "{}",
                alert.message
            );
            if let Some(metrics) = &self.metrics {
                metrics.record_alert(alert.alert_type, alert.severity);
            }
            self.events.publish(MonitorEvent::Alert { alert: alert.clone() });
        }

        let pruned = self.alerts.prune(now)?;
        if pruned > 0 {
            tracing::info!(pruned, "Pruned acknowledged alerts");
        }
        if let Some(metrics) = &self.metrics {
            metrics.set_active_alerts(self.alerts.active_alerts()?.len());
        }
        Ok(raised)
    }

    async fn daily_report(&self, date: NaiveDate) -> Result<DailyReport> {
        let (start, end) = reports::day_bounds(date);
        let outcomes = self.outcomes.outcomes_between(start, end).await?;
        Ok(reports::daily_report(&outcomes, date, self.clock.now()))
    }

    async fn weekly_report(&self, end_date: NaiveDate) -> Result<WeeklyReport> {
        let (start, _) = reports::day_bounds(end_date - ChronoDuration::days(6));
        let (_, end) = reports::day_bounds(end_date);
        let outcomes = self.outcomes.outcomes_between(start, end).await?;
        Ok(reports::weekly_report(&outcomes, end_date, self.clock.now()))
    }
}

/// Next time after `now` that falls on `at` (UTC)
pub fn next_daily_run(now: DateTime<Utc>, at: NaiveTime) -> DateTime<Utc> {
    let candidate = now.date_naive().and_time(at).and_utc();
    if candidate > now {
        candidate
    } else {
        candidate + ChronoDuration::days(1)
    }
}

/// Next time after `now` that falls on `weekday` at `at` (UTC)
pub fn next_weekly_run(now: DateTime<Utc>, weekday: Weekday, at: NaiveTime) -> DateTime<Utc> {
    let mut candidate = next_daily_run(now, at);
    while candidate.weekday() != weekday {
        candidate += ChronoDuration::days(1);
    }
    candidate
}

/// Scheduled monitor over persisted outcomes
pub struct ValidationMonitor {
    state: Arc<MonitorState>,
    running: Mutex<Option<CancellationToken>>,
}

/// Builder for [`ValidationMonitor`]
pub struct MonitorBuilder {
    outcomes: Arc<dyn OutcomeStore>,
    config: MonitorConfig,
    clock: Arc<dyn Clock>,
    events: Option<Arc<EventBus<MonitorEvent>>>,
    metrics: Option<Arc<EngineMetrics>>,
}

impl MonitorBuilder {
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn events(mut self, events: Arc<EventBus<MonitorEvent>>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn metrics(mut self, metrics: Arc<EngineMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn build(self) -> ValidationMonitor {
        let alerts = AlertManager::new(self.config.thresholds.clone(), self.config.alert_retention());
        ValidationMonitor {
            state: Arc::new(MonitorState {
                outcomes: self.outcomes,
                alerts,
                config: self.config,
                clock: self.clock,
                events: self.events.unwrap_or_default(),
                metrics: self.metrics,
                latest: RwLock::new(None),
            }),
            running: Mutex::new(None),
        }
    }
}

impl ValidationMonitor {
    pub fn builder(outcomes: Arc<dyn OutcomeStore>, config: MonitorConfig) -> MonitorBuilder {
        MonitorBuilder {
            outcomes,
            config,
            clock: Arc::new(SystemClock),
            events: None,
            metrics: None,
        }
    }

    /// Monitor on the system clock with a private event bus
    pub fn new(outcomes: Arc<dyn OutcomeStore>, config: MonitorConfig) -> Self {
        Self::builder(outcomes, config).build()
    }

    pub fn events(&self) -> &Arc<EventBus<MonitorEvent>> {
        &self.state.events
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.state.config
    }

    /// Recompute the rolling snapshot and publish it
    pub async fn run_metrics_tick(&self) -> Result<ValidationMetricsSnapshot> {
        self.state.metrics_tick().await
    }

    /// Evaluate thresholds, publish new alerts and prune old ones
    pub async fn run_alert_tick(&self) -> Result<Vec<ValidationAlert>> {
        self.state.alert_tick().await
    }

    pub async fn daily_report(&self, date: NaiveDate) -> Result<DailyReport> {
        self.state.daily_report(date).await
    }

    /// Seven days ending on `end_date` inclusive
    pub async fn weekly_report(&self, end_date: NaiveDate) -> Result<WeeklyReport> {
        self.state.weekly_report(end_date).await
    }

    /// Snapshot from the most recent tick, if any
    pub fn latest_metrics(&self) -> Option<ValidationMetricsSnapshot> {
        self.state.latest.read().ok().and_then(|latest| latest.clone())
    }

    pub fn acknowledge_alert(&self, id: Uuid) -> Result<ValidationAlert> {
        let alert = self.state.alerts.acknowledge(id, self.state.clock.now())?;
        if let Some(metrics) = &self.state.metrics {
            metrics.set_active_alerts(self.state.alerts.active_alerts()?.len());
        }
        Ok(alert)
    }

    pub fn active_alerts(&self) -> Result<Vec<ValidationAlert>> {
        self.state.alerts.active_alerts()
    }

    pub fn all_alerts(&self) -> Result<Vec<ValidationAlert>> {
        self.state.alerts.all_alerts()
    }

    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .map(|guard| guard.is_some())
            .unwrap_or_else(|poisoned| poisoned.into_inner().is_some())
    }

    /// Schedule all ticks. Calling `start` on a running monitor is a no-op.
    pub fn start(&self) -> Result<()> {
        let mut running = self.running.lock().unwrap_or_else(|p| p.into_inner());
        if running.is_some() {
            tracing::warn!("Validation monitor already running");
            return Ok(());
        }

        let config = &self.state.config;
        if config.metrics_interval_secs == 0 || config.alert_interval_secs == 0 {
            return Err(EngineError::config("Monitor intervals must be greater than zero"));
        }
        let report_time = config.report_time()?;
        let report_day = config.report_weekday()?;

        let cancel = CancellationToken::new();

        spawn_interval(
            "metrics",
            config.metrics_interval(),
            cancel.clone(),
            Arc::clone(&self.state),
            |state| async move { state.metrics_tick().await.map(|_| ()) },
        );
        spawn_interval(
            "alerts",
            config.alert_interval(),
            cancel.clone(),
            Arc::clone(&self.state),
            |state| async move { state.alert_tick().await.map(|_| ()) },
        );
        spawn_wall_clock(
            "daily_report",
            cancel.clone(),
            Arc::clone(&self.state),
            move |now| next_daily_run(now, report_time),
            |state, fired| async move {
                let report = state.daily_report(fired.date_naive() - ChronoDuration::days(1)).await?;
                tracing::info!(
                    date = %report.date,
                    total = report.total,
                    success_rate = report.success_rate,
                    "Daily validation report"
                );
                state.events.publish(MonitorEvent::DailyReport { report });
                Ok(())
            },
        );
        spawn_wall_clock(
            "weekly_report",
            cancel.clone(),
            Arc::clone(&self.state),
            move |now| next_weekly_run(now, report_day, report_time),
            |state, fired| async move {
                let report = state.weekly_report(fired.date_naive() - ChronoDuration::days(1)).await?;
                tracing::info!(
                    start = %report.start_date,
                    end = %report.end_date,
                    total = report.total,
                    success_rate = report.success_rate,
                    "Weekly validation report"
                );
                state.events.publish(MonitorEvent::WeeklyReport { report });
                Ok(())
            },
        );

        *running = Some(cancel);
        tracing::info!(
            metrics_interval_secs = config.metrics_interval_secs,
            alert_interval_secs = config.alert_interval_secs,
            daily_report_time = %report_time,
            weekly_report_day = %report_day,
            "Validation monitor started"
        );
        Ok(())
    }

    /// Cancel all scheduled ticks. Stopping a stopped monitor is a no-op.
    pub fn stop(&self) {
        let mut running = self.running.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(cancel) = running.take() {
            cancel.cancel();
            tracing::info!("Validation monitor stopped");
        }
    }
}

impl Drop for ValidationMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

fn spawn_interval<F, Fut>(
    name: &'static str,
    period: Duration,
    cancel: CancellationToken,
    state: Arc<MonitorState>,
    tick: F,
) where
    F: Fn(Arc<MonitorState>) -> Fut + Send + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!(task = name, "Monitor task stopping");
                    break;
                }
                _ = interval.tick() => {
                    if let Err(e) = tick(Arc::clone(&state)).await {
                        tracing::error!(task = name, error = %e, "Monitor tick failed");
                    }
                }
            }
        }
    });
}

fn spawn_wall_clock<N, F, Fut>(
    name: &'static str,
    cancel: CancellationToken,
    state: Arc<MonitorState>,
    next_run: N,
    tick: F,
) where
    N: Fn(DateTime<Utc>) -> DateTime<Utc> + Send + 'static,
    F: Fn(Arc<MonitorState>, DateTime<Utc>) -> Fut + Send + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    tokio::spawn(async move {
        loop {
            let now = state.clock.now();
            let fire_at = next_run(now);
            let wait = (fire_at - now).to_std().unwrap_or(Duration::ZERO);
            tracing::debug!(task = name, fire_at = %fire_at, "Monitor report scheduled");

            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!(task = name, "Monitor task stopping");
                    break;
                }
                _ = tokio::time::sleep(wait) => {
                    if let Err(e) = tick(Arc::clone(&state), fire_at).await {
                        tracing::error!(task = name, error = %e, "Monitor tick failed");
                    }
                }
            }
        }
    });
}
