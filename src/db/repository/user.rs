use std::str::FromStr;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{format_timestamp, parse_timestamp};
use crate::db::DatabaseError;
use crate::models::*;

const USER_COLUMNS: &str =
    "id, username, email, full_name, area, role, password_hash, is_active, created_at";

pub fn insert_user(conn: &Connection, user: &NewUser) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO users (username, email, full_name, area, role, password_hash, is_active, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7)",
        params![
            user.username,
            user.email,
            user.full_name,
            user.area,
            user.role.as_str(),
            user.password_hash,
            format_timestamp(&Utc::now()),
        ],
    )
    .map_err(|e| match e {
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            DatabaseError::ConstraintViolation(format!(
                "user '{}' or email '{}' already exists",
                user.username, user.email
            ))
        }
        other => DatabaseError::Sqlite(other),
    })?;
    Ok(conn.last_insert_rowid())
}

pub fn find_user_by_username(
    conn: &Connection,
    username: &str,
) -> Result<Option<User>, DatabaseError> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1");
    let row = conn
        .query_row(&sql, params![username], user_row)
        .optional()?;
    row.map(UserRow::into_user).transpose()
}

pub fn get_user(conn: &Connection, id: i64) -> Result<User, DatabaseError> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1");
    let row = conn.query_row(&sql, params![id], user_row).optional()?;
    match row {
        Some(row) => row.into_user(),
        None => Err(DatabaseError::NotFound {
            entity_type: "User".into(),
            id: id.to_string(),
        }),
    }
}

pub fn count_admins(conn: &Connection) -> Result<u32, DatabaseError> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM users WHERE role = 'admin' AND is_active = 1",
        [],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Emails of active supervisors responsible for an area.
pub fn supervisor_emails(conn: &Connection, area: &str) -> Result<Vec<String>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT email FROM users
         WHERE role = 'supervisor' AND is_active = 1 AND area = ?1
         ORDER BY email",
    )?;
    let rows = stmt
        .query_map(params![area], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

struct UserRow {
    id: i64,
    username: String,
    email: String,
    full_name: Option<String>,
    area: Option<String>,
    role: String,
    password_hash: String,
    is_active: bool,
    created_at: String,
}

fn user_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        full_name: row.get(3)?,
        area: row.get(4)?,
        role: row.get(5)?,
        password_hash: row.get(6)?,
        is_active: row.get(7)?,
        created_at: row.get(8)?,
    })
}

impl UserRow {
    fn into_user(self) -> Result<User, DatabaseError> {
        Ok(User {
            id: self.id,
            username: self.username,
            email: self.email,
            full_name: self.full_name,
            area: self.area,
            role: Role::from_str(&self.role)?,
            password_hash: self.password_hash,
            is_active: self.is_active,
            created_at: parse_timestamp("created_at", &self.created_at)?,
        })
    }
}

#[cfg(test)]
pub(crate) fn test_user(username: &str, role: Role, area: Option<&str>) -> NewUser {
    NewUser {
        username: username.into(),
        email: format!("{username}@hospital.test"),
        full_name: None,
        area: area.map(String::from),
        role,
        password_hash: "00:00".into(),
    }
}
