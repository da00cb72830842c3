//! Checklist submission: expands a nested form into one stored row per
//! checked item and writes the whole form atomically.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::db::repository::{insert_entries, recent_entries};
use crate::db::DatabaseError;
use crate::models::*;

pub const MAX_RECENT_ENTRIES: u32 = 500;

#[derive(Error, Debug)]
pub enum SubmissionError {
    #[error("Invalid checklist: {0}")]
    Validation(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Outcome of a stored submission.
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionReceipt {
    pub submission_id: Uuid,
    pub recorded_at: DateTime<Utc>,
    pub rows_written: usize,
    pub compliant_rows: usize,
}

/// Expand a form into rows without touching storage.
///
/// Every row shares one timestamp, one submitter and one submission id.
/// Administration rows carry the ten-corrects flags; other stages store
/// them as false.
pub fn expand_form(
    form: &ChecklistForm,
    submitted_by: &str,
    recorded_at: DateTime<Utc>,
    submission_id: Uuid,
) -> Result<Vec<NewChecklistEntry>, SubmissionError> {
    let area = form.area.trim();
    if area.is_empty() {
        return Err(SubmissionError::Validation("area is required".into()));
    }
    let shift = Shift::parse_lenient(&form.shift)
        .map_err(|_| SubmissionError::Validation(format!("unknown shift '{}'", form.shift)))?;

    let remarks = form
        .remarks
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(String::from);

    let mut entries = Vec::new();
    for (stage_key, items) in &form.items {
        let stage = Stage::parse_lenient(stage_key)
            .map_err(|_| SubmissionError::Validation(format!("unknown stage '{stage_key}'")))?;

        let flags = if stage == Stage::Administration {
            form.ten_corrects
                .unwrap_or_else(|| TenCorrects::from_items(items))
        } else {
            TenCorrects::default()
        };

        for (item, checked) in items {
            entries.push(NewChecklistEntry {
                submission_id,
                recorded_at,
                area: area.to_string(),
                shift,
                stage,
                item: item.clone(),
                compliant: *checked,
                remarks: remarks.clone(),
                submitted_by: submitted_by.to_string(),
                metadata: form.metadata.clone(),
                ten_corrects: flags,
            });
        }
    }

    if entries.is_empty() {
        return Err(SubmissionError::Validation("checklist has no items".into()));
    }
    Ok(entries)
}

/// Validate, expand and store a form in one transaction.
pub fn submit_checklist(
    conn: &mut Connection,
    form: &ChecklistForm,
    submitted_by: &str,
    now: DateTime<Utc>,
) -> Result<SubmissionReceipt, SubmissionError> {
    let submission_id = Uuid::new_v4();
    let entries = expand_form(form, submitted_by, now, submission_id)?;
    insert_entries(conn, &entries)?;

    let compliant_rows = entries.iter().filter(|e| e.compliant).count();
    tracing::info!(
        %submission_id,
        area = %form.area,
        submitted_by,
        rows = entries.len(),
        compliant_rows,
        "Checklist submitted"
    );

    Ok(SubmissionReceipt {
        submission_id,
        recorded_at: now,
        rows_written: entries.len(),
        compliant_rows,
    })
}

/// Latest stored entries, newest first. `limit` is clamped to 1..=500.
pub fn list_recent(conn: &Connection, limit: u32) -> Result<Vec<ChecklistEntry>, DatabaseError> {
    recent_entries(conn, limit.clamp(1, MAX_RECENT_ENTRIES))
}
