use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};
use uuid::Uuid;

use super::{format_timestamp, parse_timestamp};
use crate::db::DatabaseError;
use crate::models::*;

const ENTRY_COLUMNS: &str = "id, submission_id, recorded_at, area, shift, stage, item, compliant,
     remarks, submitted_by, metadata, correct_patient, correct_medication, correct_dose,
     correct_route, correct_time, expiration_verified, patient_education,
     correct_documentation, allergies_verified, personal_accountability";

/// Write all rows of one submission in a single transaction.
/// Either every row becomes visible or none does.
pub fn insert_entries(
    conn: &mut Connection,
    entries: &[NewChecklistEntry],
) -> Result<Vec<i64>, DatabaseError> {
    let tx = conn.transaction()?;
    let mut ids = Vec::with_capacity(entries.len());
    {
        let mut stmt = tx.prepare(
            "INSERT INTO checklist_entries
             (submission_id, recorded_at, area, shift, stage, item, compliant, remarks,
              submitted_by, metadata, correct_patient, correct_medication, correct_dose,
              correct_route, correct_time, expiration_verified, patient_education,
              correct_documentation, allergies_verified, personal_accountability)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                     ?17, ?18, ?19, ?20)",
        )?;
        for entry in entries {
            let metadata = entry
                .metadata
                .as_ref()
                .map(|m| serde_json::to_string(m).unwrap_or_else(|_| "null".to_string()));
            let flags = &entry.ten_corrects;
            stmt.execute(params![
                entry.submission_id.to_string(),
                format_timestamp(&entry.recorded_at),
                entry.area,
                entry.shift.as_str(),
                entry.stage.as_str(),
                entry.item,
                entry.compliant as i32,
                entry.remarks,
                entry.submitted_by,
                metadata,
                flags.correct_patient as i32,
                flags.correct_medication as i32,
                flags.correct_dose as i32,
                flags.correct_route as i32,
                flags.correct_time as i32,
                flags.expiration_verified as i32,
                flags.patient_education as i32,
                flags.correct_documentation as i32,
                flags.allergies_verified as i32,
                flags.personal_accountability as i32,
            ])?;
            ids.push(tx.last_insert_rowid());
        }
    }
    tx.commit()?;
    Ok(ids)
}

/// Most recent entries, newest first.
pub fn recent_entries(conn: &Connection, limit: u32) -> Result<Vec<ChecklistEntry>, DatabaseError> {
    let sql = format!(
        "SELECT {ENTRY_COLUMNS} FROM checklist_entries
         ORDER BY recorded_at DESC, id DESC LIMIT ?1"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![limit], entry_row)?;
    rows.map(|r| r?.into_entry()).collect()
}

/// Entries matching a filter, oldest first.
pub fn list_entries(
    conn: &Connection,
    filter: &EntryFilter,
) -> Result<Vec<ChecklistEntry>, DatabaseError> {
    let (where_sql, values) = filter_clause(filter);
    let sql = format!(
        "SELECT {ENTRY_COLUMNS} FROM checklist_entries WHERE {where_sql}
         ORDER BY recorded_at ASC, id ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(values), entry_row)?;
    rows.map(|r| r?.into_entry()).collect()
}

pub fn entries_for_submission(
    conn: &Connection,
    submission_id: &Uuid,
) -> Result<Vec<ChecklistEntry>, DatabaseError> {
    let sql = format!(
        "SELECT {ENTRY_COLUMNS} FROM checklist_entries WHERE submission_id = ?1 ORDER BY id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![submission_id.to_string()], entry_row)?;
    rows.map(|r| r?.into_entry()).collect()
}

/// Compact projection of an entry used by the grouping utilities.
#[derive(Debug, Clone)]
pub struct EntryFact {
    pub recorded_at: DateTime<Utc>,
    pub area: String,
    pub shift: Shift,
    pub stage: Stage,
    pub item: String,
    pub compliant: bool,
    pub submitted_by: String,
}

pub fn fetch_entry_facts(
    conn: &Connection,
    filter: &EntryFilter,
) -> Result<Vec<EntryFact>, DatabaseError> {
    let (where_sql, values) = filter_clause(filter);
    let sql = format!(
        "SELECT recorded_at, area, shift, stage, item, compliant, submitted_by
         FROM checklist_entries WHERE {where_sql}"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(values), |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, String>(4)?,
            row.get::<_, bool>(5)?,
            row.get::<_, String>(6)?,
        ))
    })?;

    let mut facts = Vec::new();
    for row in rows {
        let (recorded_at, area, shift, stage, item, compliant, submitted_by) = row?;
        facts.push(EntryFact {
            recorded_at: parse_timestamp("recorded_at", &recorded_at)?,
            area,
            shift: Shift::from_str(&shift)?,
            stage: Stage::from_str(&stage)?,
            item,
            compliant,
            submitted_by,
        });
    }
    Ok(facts)
}

/// Aggregate counts over administration-stage rows in `[from, to)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdministrationCounts {
    pub total: u32,
    pub all_correct: u32,
    pub any_incorrect: u32,
    /// True counts per field, in `CorrectField::ALL` order.
    pub per_field: [u32; 10],
}

impl AdministrationCounts {
    pub fn field_count(&self, field: CorrectField) -> u32 {
        CorrectField::ALL
            .iter()
            .position(|f| *f == field)
            .map(|i| self.per_field[i])
            .unwrap_or(0)
    }
}

pub fn administration_counts(
    conn: &Connection,
    from: &DateTime<Utc>,
    to: &DateTime<Utc>,
) -> Result<AdministrationCounts, DatabaseError> {
    let columns: Vec<&str> = CorrectField::ALL.iter().map(|f| f.column()).collect();
    let all_true = columns
        .iter()
        .map(|c| format!("{c} = 1"))
        .collect::<Vec<_>>()
        .join(" AND ");
    let any_false = columns
        .iter()
        .map(|c| format!("{c} = 0"))
        .collect::<Vec<_>>()
        .join(" OR ");
    let per_field = columns
        .iter()
        .map(|c| format!("COALESCE(SUM({c}), 0)"))
        .collect::<Vec<_>>()
        .join(", ");

    let sql = format!(
        "SELECT COUNT(*),
                COALESCE(SUM(CASE WHEN {all_true} THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN {any_false} THEN 1 ELSE 0 END), 0),
                {per_field}
         FROM checklist_entries
         WHERE stage = 'administration' AND recorded_at >= ?1 AND recorded_at < ?2"
    );

    let counts = conn.query_row(
        &sql,
        params![format_timestamp(from), format_timestamp(to)],
        |row| {
            let mut per_field = [0u32; 10];
            for (i, slot) in per_field.iter_mut().enumerate() {
                *slot = row.get::<_, u32>(3 + i)?;
            }
            Ok(AdministrationCounts {
                total: row.get(0)?,
                all_correct: row.get(1)?,
                any_incorrect: row.get(2)?,
                per_field,
            })
        },
    )?;
    Ok(counts)
}

fn filter_clause(filter: &EntryFilter) -> (String, Vec<Value>) {
    let mut clauses = Vec::new();
    let mut values = Vec::new();
    if let Some(area) = &filter.area {
        values.push(Value::Text(area.clone()));
        clauses.push(format!("area = ?{}", values.len()));
    }
    if let Some(from) = &filter.from {
        values.push(Value::Text(format_timestamp(from)));
        clauses.push(format!("recorded_at >= ?{}", values.len()));
    }
    if let Some(to) = &filter.to {
        values.push(Value::Text(format_timestamp(to)));
        clauses.push(format!("recorded_at < ?{}", values.len()));
    }
    let where_sql = if clauses.is_empty() {
        "1=1".to_string()
    } else {
        clauses.join(" AND ")
    };
    (where_sql, values)
}

struct EntryRow {
    id: i64,
    submission_id: String,
    recorded_at: String,
    area: String,
    shift: String,
    stage: String,
    item: String,
    compliant: bool,
    remarks: Option<String>,
    submitted_by: String,
    metadata: Option<String>,
    flags: [bool; 10],
}

fn entry_row(row: &Row<'_>) -> rusqlite::Result<EntryRow> {
    let mut flags = [false; 10];
    for (i, slot) in flags.iter_mut().enumerate() {
        *slot = row.get::<_, bool>(11 + i)?;
    }
    Ok(EntryRow {
        id: row.get(0)?,
        submission_id: row.get(1)?,
        recorded_at: row.get(2)?,
        area: row.get(3)?,
        shift: row.get(4)?,
        stage: row.get(5)?,
        item: row.get(6)?,
        compliant: row.get(7)?,
        remarks: row.get(8)?,
        submitted_by: row.get(9)?,
        metadata: row.get(10)?,
        flags,
    })
}

impl EntryRow {
    fn into_entry(self) -> Result<ChecklistEntry, DatabaseError> {
        let mut ten_corrects = TenCorrects::default();
        for (field, value) in CorrectField::ALL.iter().zip(self.flags) {
            ten_corrects.set(*field, value);
        }
        Ok(ChecklistEntry {
            id: self.id,
            submission_id: Uuid::parse_str(&self.submission_id)
                .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
            recorded_at: parse_timestamp("recorded_at", &self.recorded_at)?,
            area: self.area,
            shift: Shift::from_str(&self.shift)?,
            stage: Stage::from_str(&self.stage)?,
            item: self.item,
            compliant: self.compliant,
            remarks: self.remarks,
            submitted_by: self.submitted_by,
            metadata: self.metadata.and_then(|m| serde_json::from_str(&m).ok()),
            ten_corrects,
        })
    }
}
