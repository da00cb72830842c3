use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::format_timestamp;
use crate::db::DatabaseError;

/// Persist a session keyed by the SHA-256 hash of its bearer token.
pub fn insert_session(
    conn: &Connection,
    token_hash: &str,
    user_id: i64,
    created_at: &DateTime<Utc>,
    expires_at: &DateTime<Utc>,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO sessions (token_hash, user_id, created_at, expires_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            token_hash,
            user_id,
            format_timestamp(created_at),
            format_timestamp(expires_at)
        ],
    )?;
    Ok(())
}

/// User id owning an unexpired session, if any.
pub fn find_session_user(
    conn: &Connection,
    token_hash: &str,
    now: &DateTime<Utc>,
) -> Result<Option<i64>, DatabaseError> {
    let user_id = conn
        .query_row(
            "SELECT s.user_id FROM sessions s
             JOIN users u ON u.id = s.user_id
             WHERE s.token_hash = ?1 AND s.expires_at > ?2 AND u.is_active = 1",
            params![token_hash, format_timestamp(now)],
            |row| row.get(0),
        )
        .optional()?;
    Ok(user_id)
}

pub fn delete_session(conn: &Connection, token_hash: &str) -> Result<bool, DatabaseError> {
    let deleted = conn.execute(
        "DELETE FROM sessions WHERE token_hash = ?1",
        params![token_hash],
    )?;
    Ok(deleted > 0)
}

pub fn prune_expired_sessions(
    conn: &Connection,
    now: &DateTime<Utc>,
) -> Result<usize, DatabaseError> {
    let deleted = conn.execute(
        "DELETE FROM sessions WHERE expires_at <= ?1",
        params![format_timestamp(now)],
    )?;
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::user::{insert_user, test_user};
    use crate::db::sqlite::open_memory_database;
    use crate::models::Role;
    use chrono::Duration;

    #[test]
    fn valid_session_resolves_user() {
        let conn = open_memory_database().unwrap();
        let uid = insert_user(&conn, &test_user("ana", Role::Nurse, None)).unwrap();
        let now = Utc::now();
        insert_session(&conn, "abc", uid, &now, &(now + Duration::hours(1))).unwrap();

        assert_eq!(find_session_user(&conn, "abc", &now).unwrap(), Some(uid));
        assert_eq!(find_session_user(&conn, "other", &now).unwrap(), None);
    }

    #[test]
    fn expired_session_is_ignored_and_pruned() {
        let conn = open_memory_database().unwrap();
        let uid = insert_user(&conn, &test_user("ana", Role::Nurse, None)).unwrap();
        let now = Utc::now();
        insert_session(&conn, "old", uid, &(now - Duration::hours(2)), &(now - Duration::hours(1)))
            .unwrap();

        assert_eq!(find_session_user(&conn, "old", &now).unwrap(), None);
        assert_eq!(prune_expired_sessions(&conn, &now).unwrap(), 1);
    }

    #[test]
    fn delete_session_logs_out() {
        let conn = open_memory_database().unwrap();
        let uid = insert_user(&conn, &test_user("ana", Role::Nurse, None)).unwrap();
        let now = Utc::now();
        insert_session(&conn, "tok", uid, &now, &(now + Duration::hours(1))).unwrap();

        assert!(delete_session(&conn, "tok").unwrap());
        assert!(!delete_session(&conn, "tok").unwrap());
        assert_eq!(find_session_user(&conn, "tok", &now).unwrap(), None);
    }
}
