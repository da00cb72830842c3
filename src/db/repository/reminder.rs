use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};

use super::{format_timestamp, parse_optional_timestamp, parse_timestamp};
use crate::db::DatabaseError;
use crate::models::Reminder;

const REMINDER_COLUMNS: &str =
    "id, user_id, title, body, scheduled_at, sent_at, active, created_at";

pub fn insert_reminder(
    conn: &Connection,
    user_id: i64,
    title: &str,
    body: Option<&str>,
    scheduled_at: &DateTime<Utc>,
    created_at: &DateTime<Utc>,
) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO reminders (user_id, title, body, scheduled_at, active, created_at)
         VALUES (?1, ?2, ?3, ?4, 1, ?5)",
        params![
            user_id,
            title,
            body,
            format_timestamp(scheduled_at),
            format_timestamp(created_at)
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Active reminders for a user scheduled at or after `now`, soonest first.
pub fn upcoming_reminders(
    conn: &Connection,
    user_id: i64,
    now: &DateTime<Utc>,
    limit: u32,
) -> Result<Vec<Reminder>, DatabaseError> {
    let sql = format!(
        "SELECT {REMINDER_COLUMNS} FROM reminders
         WHERE user_id = ?1 AND active = 1 AND sent_at IS NULL AND scheduled_at >= ?2
         ORDER BY scheduled_at ASC, id ASC LIMIT ?3"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![user_id, format_timestamp(now), limit], reminder_row)?;
    rows.map(|r| r?.into_reminder()).collect()
}

/// Active, unsent reminders whose time has come.
pub fn due_reminders(
    conn: &Connection,
    now: &DateTime<Utc>,
) -> Result<Vec<Reminder>, DatabaseError> {
    let sql = format!(
        "SELECT {REMINDER_COLUMNS} FROM reminders
         WHERE active = 1 AND sent_at IS NULL AND scheduled_at <= ?1
         ORDER BY scheduled_at ASC, id ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![format_timestamp(now)], reminder_row)?;
    rows.map(|r| r?.into_reminder()).collect()
}

/// Mark delivered: sent and no longer active.
pub fn mark_reminder_sent(
    conn: &Connection,
    id: i64,
    sent_at: &DateTime<Utc>,
) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE reminders SET sent_at = ?2, active = 0 WHERE id = ?1",
        params![id, format_timestamp(sent_at)],
    )?;
    Ok(())
}

pub fn deactivate_reminder(conn: &Connection, id: i64) -> Result<(), DatabaseError> {
    conn.execute("UPDATE reminders SET active = 0 WHERE id = ?1", params![id])?;
    Ok(())
}

struct ReminderRow {
    id: i64,
    user_id: i64,
    title: String,
    body: Option<String>,
    scheduled_at: String,
    sent_at: Option<String>,
    active: bool,
    created_at: String,
}

fn reminder_row(row: &Row<'_>) -> rusqlite::Result<ReminderRow> {
    Ok(ReminderRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        body: row.get(3)?,
        scheduled_at: row.get(4)?,
        sent_at: row.get(5)?,
        active: row.get(6)?,
        created_at: row.get(7)?,
    })
}

impl ReminderRow {
    fn into_reminder(self) -> Result<Reminder, DatabaseError> {
        Ok(Reminder {
            id: self.id,
            user_id: self.user_id,
            title: self.title,
            body: self.body,
            scheduled_at: parse_timestamp("scheduled_at", &self.scheduled_at)?,
            sent_at: parse_optional_timestamp("sent_at", self.sent_at)?,
            active: self.active,
            created_at: parse_timestamp("created_at", &self.created_at)?,
        })
    }
}
