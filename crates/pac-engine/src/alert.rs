//! Alert Dispatcher
//!
//! Fire-and-forget notification contract for security-relevant events,
//! notified on break-glass activation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Alert severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertSeverity {
    /// Informational
    Info,
    /// Needs attention
    Warning,
    /// Security-relevant, page the on-call
    High,
    /// Active incident
    Critical,
}

/// A dispatched alert
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    /// Severity level
    pub severity: AlertSeverity,
    /// Short summary line
    pub title: String,
    /// Full message body
    pub message: String,
    /// Actor that triggered the alert
    pub actor: String,
    /// When the alert was raised
    pub raised_at: DateTime<Utc>,
}

/// Notification collaborator contract
///
/// Delivery mechanics (email, Slack, PagerDuty, ...) live behind this trait
/// and are out of scope for the engine.
#[async_trait]
pub trait AlertDispatcher: Send + Sync {
    /// Deliver one alert; failures are the dispatcher's problem
    async fn notify(&self, alert: Alert);
}

/// Dispatcher that emits alerts to the tracing log
pub struct LogAlertDispatcher;

#[async_trait]
impl AlertDispatcher for LogAlertDispatcher {
    async fn notify(&self, alert: Alert) {
        tracing::warn!(
            severity = ?alert.severity,
            actor = %alert.actor,
            title = %alert.title,
            "security alert dispatched"
        );
    }
}

/// Dispatcher that records alerts for assertions
pub struct RecordingAlertDispatcher {
    alerts: Mutex<Vec<Alert>>,
}

impl RecordingAlertDispatcher {
    /// Empty recorder
    pub fn new() -> Self {
        Self {
            alerts: Mutex::new(Vec::new()),
        }
    }

    /// All alerts delivered so far
    pub fn delivered(&self) -> Vec<Alert> {
        self.alerts.lock().clone()
    }
}

impl Default for RecordingAlertDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AlertDispatcher for RecordingAlertDispatcher {
    async fn notify(&self, alert: Alert) {
        self.alerts.lock().push(alert);
    }
}
