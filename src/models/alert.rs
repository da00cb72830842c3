use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::{AlertSeverity, Stage};

pub const DEFAULT_CRITICAL_THRESHOLD: f64 = 70.0;
pub const DEFAULT_WARNING_THRESHOLD: f64 = 85.0;
pub const DEFAULT_INTERVAL_HOURS: u32 = 24;

/// Alert thresholds and recipients. `area = None` is the global row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    pub area: Option<String>,
    pub critical_threshold: f64,
    pub warning_threshold: f64,
    pub extra_emails: Vec<String>,
    pub notify_supervisors: bool,
    pub interval_hours: u32,
    pub active: bool,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            area: None,
            critical_threshold: DEFAULT_CRITICAL_THRESHOLD,
            warning_threshold: DEFAULT_WARNING_THRESHOLD,
            extra_emails: Vec::new(),
            notify_supervisors: true,
            interval_hours: DEFAULT_INTERVAL_HOURS,
            active: true,
            updated_at: None,
        }
    }
}

/// A dispatched alert, as recorded in `alert_log`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertLogEntry {
    pub id: i64,
    pub area: String,
    pub stage: Stage,
    pub compliance: f64,
    pub severity: AlertSeverity,
    pub recipients: Vec<String>,
    pub dispatched_at: DateTime<Utc>,
}
