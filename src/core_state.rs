//! Process-wide service state.
//!
//! `CoreState` is built once by the binary and shared through `Arc` by the
//! HTTP layer and the scheduler thread. It holds only configuration and
//! long-lived clients; every caller opens its own database connection.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};

use crate::config::{ConfigError, Settings};
use crate::db::{self, DatabaseError};
use crate::export::{ExportError, TtsClient};
use crate::models::{AuditEvent, AuditStatus};
use crate::notify::{HttpNotifier, Notifier, NotifyError};

/// Maximum audit buffer size before flush.
const AUDIT_BUFFER_CAPACITY: usize = 100;

/// Audit rows older than this are pruned on flush.
pub const AUDIT_RETENTION_DAYS: i64 = 90;

pub struct CoreState {
    settings: Settings,
    db_path: PathBuf,
    notifier: Arc<dyn Notifier>,
    /// `None` when no TTS API key is configured.
    tts: Option<TtsClient>,
    audit: AuditLogger,
}

impl CoreState {
    /// Build the state from resolved settings, constructing the HTTP
    /// delivery clients. Must run outside the async runtime.
    pub fn from_settings(settings: Settings) -> Result<Self, CoreError> {
        let db_path = settings.database_path()?;
        let n = &settings.notifications;
        let notifier = HttpNotifier::new(
            n.push_gateway_url.clone(),
            n.mail_relay_url.clone(),
            &n.sender,
            n.timeout_secs,
        )?;
        let tts = match &settings.voice.api_key {
            Some(key) if !key.trim().is_empty() => Some(TtsClient::new(
                &settings.voice.url,
                &settings.voice.voice_id,
                Some(key.clone()),
                settings.voice.timeout_secs,
            )?),
            _ => None,
        };
        Ok(Self::new(settings, db_path, Arc::new(notifier), tts))
    }

    pub fn new(
        settings: Settings,
        db_path: PathBuf,
        notifier: Arc<dyn Notifier>,
        tts: Option<TtsClient>,
    ) -> Self {
        Self {
            settings,
            db_path,
            notifier,
            tts,
            audit: AuditLogger::new(),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Open a fresh connection; dropped by the caller when done.
    pub fn open_db(&self) -> Result<rusqlite::Connection, CoreError> {
        db::open_database(&self.db_path).map_err(CoreError::Database)
    }

    pub fn notifier(&self) -> Arc<dyn Notifier> {
        Arc::clone(&self.notifier)
    }

    pub fn tts(&self) -> Option<&TtsClient> {
        self.tts.as_ref()
    }

    /// Record an audit event. Auto-flushes to DB when the buffer is full.
    pub fn log_event(
        &self,
        event_type: &str,
        username: Option<&str>,
        source: &str,
        detail: Option<String>,
        status: AuditStatus,
    ) {
        let event = AuditEvent {
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            username: username.map(String::from),
            source: source.to_string(),
            detail,
            status,
        };
        if self.audit.log(event) {
            if let Err(e) = self.flush_audit(&Utc::now()) {
                tracing::warn!("Auto-flush audit failed: {e}");
            }
        }
    }

    /// Buffered, not yet flushed, audit events.
    pub fn audit_entries(&self) -> Vec<AuditEvent> {
        self.audit.entries()
    }

    /// Flush the audit buffer and prune rows past retention.
    pub fn flush_audit(&self, now: &DateTime<Utc>) -> Result<usize, CoreError> {
        let conn = self.open_db()?;
        let flushed = self.audit.flush_to_db(&conn)?;
        let cutoff = *now - Duration::days(AUDIT_RETENTION_DAYS);
        if let Err(e) = db::repository::prune_audit_log(&conn, &cutoff) {
            tracing::warn!("Failed to prune audit log: {e}");
        }
        Ok(flushed)
    }
}

/// Errors from CoreState operations.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
    #[error("Notifier setup failed: {0}")]
    Notify(#[from] NotifyError),
    #[error("TTS setup failed: {0}")]
    Export(#[from] ExportError),
}

// ═══════════════════════════════════════════════════════════
// Audit logger
// ═══════════════════════════════════════════════════════════

/// In-memory audit buffer. Events are flushed to SQLite when the buffer
/// reaches capacity, on each scheduler pass, and on shutdown.
pub struct AuditLogger {
    buffer: Mutex<Vec<AuditEvent>>,
}

impl AuditLogger {
    pub fn new() -> Self {
        Self {
            buffer: Mutex::new(Vec::with_capacity(AUDIT_BUFFER_CAPACITY)),
        }
    }

    /// Buffer an event. Returns `true` once the flush threshold is reached.
    pub fn log(&self, event: AuditEvent) -> bool {
        if let Ok(mut buf) = self.buffer.lock() {
            buf.push(event);
            buf.len() >= AUDIT_BUFFER_CAPACITY
        } else {
            false
        }
    }

    pub fn entries(&self) -> Vec<AuditEvent> {
        self.buffer
            .lock()
            .map(|buf| buf.clone())
            .unwrap_or_default()
    }

    pub fn drain(&self) -> Vec<AuditEvent> {
        self.buffer
            .lock()
            .map(|mut buf| buf.drain(..).collect())
            .unwrap_or_default()
    }

    pub fn flush_to_db(&self, conn: &rusqlite::Connection) -> Result<usize, CoreError> {
        let events = self.drain();
        if events.is_empty() {
            return Ok(0);
        }
        db::repository::insert_audit_events(conn, &events)?;
        tracing::debug!(count = events.len(), "Flushed audit events to database");
        Ok(events.len())
    }
}

impl Default for AuditLogger {
    fn default() -> Self {
        Self::new()
    }
}


// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::testing::test_state;
    use super::*;
    use crate::db::repository::recent_audit_events;

    fn event(n: usize) -> AuditEvent {
        AuditEvent {
            timestamp: Utc::now(),
            event_type: "login_failed".into(),
            username: Some(format!("user{n}")),
            source: "127.0.0.1".into(),
            detail: None,
            status: AuditStatus::Failure,
        }
    }

    #[test]
    fn audit_logger_signals_flush_at_capacity() {
        let logger = AuditLogger::new();
        for i in 0..AUDIT_BUFFER_CAPACITY - 1 {
            assert!(!logger.log(event(i)));
        }
        assert!(logger.log(event(AUDIT_BUFFER_CAPACITY)));
        assert_eq!(logger.drain().len(), AUDIT_BUFFER_CAPACITY);
        assert!(logger.entries().is_empty());
    }

    #[test]
    fn open_db_creates_database_file() {
        let dir = tempfile::tempdir().unwrap();
        let (state, _) = test_state(dir.path());
        assert!(!state.db_path().exists());
        state.open_db().unwrap();
        assert!(state.db_path().exists());
    }

    #[test]
    fn flush_persists_buffered_events() {
        let dir = tempfile::tempdir().unwrap();
        let (state, _) = test_state(dir.path());
        state.log_event("login_failed", Some("ana"), "10.0.0.1", None, AuditStatus::Failure);
        state.log_event("logout", Some("bea"), "10.0.0.2", None, AuditStatus::Success);
        assert_eq!(state.audit_entries().len(), 2);

        assert_eq!(state.flush_audit(&Utc::now()).unwrap(), 2);
        assert!(state.audit_entries().is_empty());
        assert_eq!(state.flush_audit(&Utc::now()).unwrap(), 0);

        let conn = state.open_db().unwrap();
        let stored = recent_audit_events(&conn, Some("login_failed"), 10).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].username.as_deref(), Some("ana"));
    }

    #[test]
    fn flush_prunes_events_past_retention() {
        let dir = tempfile::tempdir().unwrap();
        let (state, _) = test_state(dir.path());
        let mut old = event(1);
        old.timestamp = Utc::now() - Duration::days(AUDIT_RETENTION_DAYS + 1);
        state.audit.log(old);
        state.audit.log(event(2));

        state.flush_audit(&Utc::now()).unwrap();
        let conn = state.open_db().unwrap();
        assert_eq!(recent_audit_events(&conn, None, 10).unwrap().len(), 1);
    }

    #[test]
    fn tts_disabled_without_key() {
        let dir = tempfile::tempdir().unwrap();
        let (state, _) = test_state(dir.path());
        assert!(state.tts().is_none());
    }
}
