use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::{format_timestamp, parse_optional_timestamp, parse_timestamp};
use crate::db::DatabaseError;
use crate::models::*;

/// Configuration for an area, falling back to the global row and then to
/// compiled defaults.
pub fn get_alert_config(
    conn: &Connection,
    area: Option<&str>,
) -> Result<AlertConfig, DatabaseError> {
    if let Some(area) = area {
        if let Some(config) = load_config_row(conn, Some(area))? {
            return Ok(config);
        }
    }
    Ok(load_config_row(conn, None)?.unwrap_or_default())
}

fn load_config_row(
    conn: &Connection,
    area: Option<&str>,
) -> Result<Option<AlertConfig>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT area, critical_threshold, warning_threshold, extra_emails,
                    notify_supervisors, interval_hours, active, updated_at
             FROM alert_configs WHERE area IS ?1",
            params![area],
            |row| {
                Ok((
                    row.get::<_, Option<String>>(0)?,
                    row.get::<_, f64>(1)?,
                    row.get::<_, f64>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, bool>(4)?,
                    row.get::<_, u32>(5)?,
                    row.get::<_, bool>(6)?,
                    row.get::<_, Option<String>>(7)?,
                ))
            },
        )
        .optional()?;

    let Some((area, critical, warning, emails, notify, interval, active, updated_at)) = row else {
        return Ok(None);
    };
    Ok(Some(AlertConfig {
        area,
        critical_threshold: critical,
        warning_threshold: warning,
        extra_emails: serde_json::from_str(&emails).unwrap_or_default(),
        notify_supervisors: notify,
        interval_hours: interval,
        active,
        updated_at: parse_optional_timestamp("updated_at", updated_at)?,
    }))
}

/// Insert or replace the configuration row for `config.area`.
pub fn save_alert_config(
    conn: &Connection,
    config: &AlertConfig,
    now: &DateTime<Utc>,
) -> Result<(), DatabaseError> {
    let emails = serde_json::to_string(&config.extra_emails).unwrap_or_else(|_| "[]".to_string());
    let updated = conn.execute(
        "UPDATE alert_configs SET critical_threshold = ?2, warning_threshold = ?3,
            extra_emails = ?4, notify_supervisors = ?5, interval_hours = ?6, active = ?7,
            updated_at = ?8
         WHERE area IS ?1",
        params![
            config.area,
            config.critical_threshold,
            config.warning_threshold,
            emails,
            config.notify_supervisors,
            config.interval_hours,
            config.active,
            format_timestamp(now),
        ],
    )?;
    if updated == 0 {
        conn.execute(
            "INSERT INTO alert_configs (area, critical_threshold, warning_threshold,
                extra_emails, notify_supervisors, interval_hours, active, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                config.area,
                config.critical_threshold,
                config.warning_threshold,
                emails,
                config.notify_supervisors,
                config.interval_hours,
                config.active,
                format_timestamp(now),
            ],
        )?;
    }
    Ok(())
}

pub fn insert_alert_log(
    conn: &Connection,
    area: &str,
    stage: Stage,
    compliance: f64,
    severity: AlertSeverity,
    recipients: &[String],
    dispatched_at: &DateTime<Utc>,
) -> Result<i64, DatabaseError> {
    let recipients_json = serde_json::to_string(recipients).unwrap_or_else(|_| "[]".to_string());
    conn.execute(
        "INSERT INTO alert_log (area, stage, compliance, severity, recipients, dispatched_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            area,
            stage.as_str(),
            compliance,
            severity.as_str(),
            recipients_json,
            format_timestamp(dispatched_at)
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Most recent dispatch time for an (area, stage) pair.
pub fn last_alert_dispatch(
    conn: &Connection,
    area: &str,
    stage: Stage,
) -> Result<Option<DateTime<Utc>>, DatabaseError> {
    let last: Option<String> = conn.query_row(
        "SELECT MAX(dispatched_at) FROM alert_log WHERE area = ?1 AND stage = ?2",
        params![area, stage.as_str()],
        |row| row.get(0),
    )?;
    parse_optional_timestamp("dispatched_at", last)
}

pub fn recent_alert_log(conn: &Connection, limit: u32) -> Result<Vec<AlertLogEntry>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, area, stage, compliance, severity, recipients, dispatched_at
         FROM alert_log ORDER BY dispatched_at DESC, id DESC LIMIT ?1",
    )?;
    let rows = stmt.query_map(params![limit], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, f64>(3)?,
            row.get::<_, String>(4)?,
            row.get::<_, String>(5)?,
            row.get::<_, String>(6)?,
        ))
    })?;

    let mut entries = Vec::new();
    for row in rows {
        let (id, area, stage, compliance, severity, recipients, dispatched_at) = row?;
        entries.push(AlertLogEntry {
            id,
            area,
            stage: Stage::from_str(&stage)?,
            compliance,
            severity: AlertSeverity::from_str(&severity)?,
            recipients: serde_json::from_str(&recipients).unwrap_or_default(),
            dispatched_at: parse_timestamp("dispatched_at", &dispatched_at)?,
        });
    }
    Ok(entries)
}
