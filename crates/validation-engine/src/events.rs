//! Lifecycle events
//!
//! The orchestrator publishes one [`ValidationEvent`] per completed call and
//! the monitor publishes [`MonitorEvent`]s for every metrics snapshot, alert
//! and report. Both travel over an [`EventBus`], a thin wrapper around a
//! `tokio::sync::broadcast` channel. Publishing never blocks; with no
//! subscribers the event is dropped.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::contracts::{
    BulkValidation, DailyReport, ValidationAlert, ValidationMetricsSnapshot, ValidationOutcome,
    WeeklyReport,
};

/// Default buffer capacity for the broadcast channel
pub const DEFAULT_CAPACITY: usize = 1024;

/// Emitted by the orchestrator when a validation call completes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ValidationEvent {
    SyncCompleted { outcome: ValidationOutcome, cached: bool },
    AsyncCompleted { outcome: ValidationOutcome },
    BulkCompleted { validation: BulkValidation },
}

impl ValidationEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ValidationEvent::SyncCompleted { .. } => "validation.sync_completed",
            ValidationEvent::AsyncCompleted { .. } => "validation.async_completed",
            ValidationEvent::BulkCompleted { .. } => "validation.bulk_completed",
        }
    }
}

/// Emitted by the monitor on each tick
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MonitorEvent {
    Metrics { snapshot: ValidationMetricsSnapshot },
    Alert { alert: ValidationAlert },
    DailyReport { report: DailyReport },
    WeeklyReport { report: WeeklyReport },
}

/// In-process fan-out bus.
///
/// When the buffer is full the oldest unconsumed messages are dropped and
/// slow receivers observe `RecvError::Lagged`.
pub struct EventBus<T: Clone> {
    sender: broadcast::Sender<T>,
    capacity: usize,
}

impl<T: Clone> EventBus<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, _) = broadcast::channel(capacity);
        Self { sender, capacity }
    }

    /// Publish to all current subscribers
    pub fn publish(&self, event: T) {
        // SendError only means there are zero receivers
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<T> {
        self.sender.subscribe()
    }

    /// Messages retained for a slow subscriber before it lags
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl<T: Clone> Default for EventBus<T> {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
