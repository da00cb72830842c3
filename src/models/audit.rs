use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::AuditStatus;

/// Security and access event for the audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub username: Option<String>,
    pub source: String,
    pub detail: Option<String>,
    pub status: AuditStatus,
}
