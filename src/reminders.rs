//! Per-user reminders delivered to registered push subscriptions.

use chrono::{DateTime, Duration, SubsecRound, Utc};
use rusqlite::Connection;
use thiserror::Error;

use crate::db::repository::*;
use crate::db::DatabaseError;
use crate::models::Reminder;
use crate::notify::{Notifier, PushMessage};

pub const MAX_LEAD_MINUTES: i64 = 7 * 24 * 60;
pub const MAX_UPCOMING: u32 = 50;
pub const DEFAULT_TITLE: &str = "MedCheck reminder";
pub const DEFAULT_BODY: &str = "You have a pending reminder";
const REMINDER_URL: &str = "/reports/dashboard";

#[derive(Error, Debug)]
pub enum ReminderError {
    #[error("Invalid reminder: {0}")]
    Validation(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Schedule a reminder `minutes` from `now` (0..=10080).
pub fn schedule_in_minutes(
    conn: &Connection,
    user_id: i64,
    title: Option<&str>,
    body: Option<&str>,
    minutes: i64,
    now: &DateTime<Utc>,
) -> Result<Reminder, ReminderError> {
    if !(0..=MAX_LEAD_MINUTES).contains(&minutes) {
        return Err(ReminderError::Validation(format!(
            "minutes must be between 0 and {MAX_LEAD_MINUTES}"
        )));
    }
    let title = title
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(DEFAULT_TITLE);
    let body = body.map(str::trim).filter(|b| !b.is_empty());

    let scheduled_at = (*now + Duration::minutes(minutes)).trunc_subsecs(0);
    let id = insert_reminder(conn, user_id, title, body, &scheduled_at, now)?;
    tracing::debug!(reminder_id = id, user_id, %scheduled_at, "Reminder scheduled");

    Ok(Reminder {
        id,
        user_id,
        title: title.to_string(),
        body: body.map(String::from),
        scheduled_at,
        sent_at: None,
        active: true,
        created_at: *now,
    })
}

/// Up to 50 active reminders due at or after `now`, soonest first.
pub fn list_upcoming(
    conn: &Connection,
    user_id: i64,
    now: &DateTime<Utc>,
) -> Result<Vec<Reminder>, DatabaseError> {
    upcoming_reminders(conn, user_id, now, MAX_UPCOMING)
}

/// Push every due reminder to its owner's subscriptions.
///
/// A reminder whose owner has no subscription is deactivated without
/// delivery. A reminder counts as delivered when at least one push was
/// accepted; either way it is marked sent so it is never retried.
pub fn process_due(
    conn: &Connection,
    notifier: &dyn Notifier,
    now: &DateTime<Utc>,
) -> Result<usize, DatabaseError> {
    let due = due_reminders(conn, now)?;
    let mut delivered = 0;

    for reminder in due {
        let subscriptions = subscriptions_for_user(conn, reminder.user_id)?;
        if subscriptions.is_empty() {
            deactivate_reminder(conn, reminder.id)?;
            tracing::debug!(
                reminder_id = reminder.id,
                user_id = reminder.user_id,
                "No push subscription, reminder deactivated"
            );
            continue;
        }

        let message = PushMessage {
            title: reminder.title.clone(),
            body: reminder.body.clone().unwrap_or_else(|| DEFAULT_BODY.to_string()),
            url: Some(REMINDER_URL.to_string()),
        };

        let mut accepted = 0;
        for sub in &subscriptions {
            match notifier.send_push(sub, &message) {
                Ok(()) => accepted += 1,
                Err(e) => tracing::warn!(
                    reminder_id = reminder.id,
                    subscription_id = sub.id,
                    error = %e,
                    "Push delivery failed"
                ),
            }
        }

        mark_reminder_sent(conn, reminder.id, now)?;
        if accepted > 0 {
            delivered += 1;
        }
    }

    if delivered > 0 {
        tracing::info!(delivered, "Due reminders delivered");
    }
    Ok(delivered)
}
