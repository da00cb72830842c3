use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use super::{format_timestamp, parse_timestamp};
use crate::db::DatabaseError;
use crate::models::{AuditEvent, AuditStatus};

/// Insert a batch of audit events.
pub fn insert_audit_events(conn: &Connection, events: &[AuditEvent]) -> Result<(), DatabaseError> {
    let mut stmt = conn.prepare(
        "INSERT INTO audit_log (timestamp, event_type, username, source, detail, status)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )?;
    for event in events {
        stmt.execute(params![
            format_timestamp(&event.timestamp),
            event.event_type,
            event.username,
            event.source,
            event.detail,
            event.status.as_str(),
        ])?;
    }
    Ok(())
}

/// Prune audit entries older than `before`.
pub fn prune_audit_log(conn: &Connection, before: &DateTime<Utc>) -> Result<usize, DatabaseError> {
    let deleted = conn.execute(
        "DELETE FROM audit_log WHERE timestamp < ?1",
        params![format_timestamp(before)],
    )?;
    Ok(deleted)
}

/// Most recent audit events, optionally for one event type.
pub fn recent_audit_events(
    conn: &Connection,
    event_type: Option<&str>,
    limit: u32,
) -> Result<Vec<AuditEvent>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT timestamp, event_type, username, source, detail, status FROM audit_log
         WHERE ?1 IS NULL OR event_type = ?1
         ORDER BY timestamp DESC, id DESC LIMIT ?2",
    )?;
    let rows = stmt
        .query_map(params![event_type, limit], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, String>(5)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(timestamp, event_type, username, source, detail, status)| {
            Ok(AuditEvent {
                timestamp: parse_timestamp("timestamp", &timestamp)?,
                event_type,
                username,
                source,
                detail,
                status: AuditStatus::from_str(&status)?,
            })
        })
        .collect()
}
