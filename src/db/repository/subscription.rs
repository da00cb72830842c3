use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use super::{format_timestamp, parse_timestamp};
use crate::db::DatabaseError;
use crate::models::PushSubscription;

/// Register a push endpoint for a user. An endpoint already known is
/// re-assigned with fresh keys.
pub fn upsert_subscription(
    conn: &Connection,
    user_id: i64,
    endpoint: &str,
    p256dh: &str,
    auth: &str,
    now: &DateTime<Utc>,
) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO push_subscriptions (user_id, endpoint, p256dh, auth, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(endpoint) DO UPDATE SET
            user_id = excluded.user_id,
            p256dh = excluded.p256dh,
            auth = excluded.auth",
        params![user_id, endpoint, p256dh, auth, format_timestamp(now)],
    )?;
    let id = conn.query_row(
        "SELECT id FROM push_subscriptions WHERE endpoint = ?1",
        params![endpoint],
        |row| row.get(0),
    )?;
    Ok(id)
}

pub fn subscriptions_for_user(
    conn: &Connection,
    user_id: i64,
) -> Result<Vec<PushSubscription>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, endpoint, p256dh, auth, created_at
         FROM push_subscriptions WHERE user_id = ?1 ORDER BY id",
    )?;
    let rows = stmt.query_map(params![user_id], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, i64>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, String>(4)?,
            row.get::<_, String>(5)?,
        ))
    })?;

    let mut subs = Vec::new();
    for row in rows {
        let (id, user_id, endpoint, p256dh, auth, created_at) = row?;
        subs.push(PushSubscription {
            id,
            user_id,
            endpoint,
            p256dh,
            auth,
            created_at: parse_timestamp("created_at", &created_at)?,
        });
    }
    Ok(subs)
}

pub fn delete_subscription(conn: &Connection, endpoint: &str) -> Result<bool, DatabaseError> {
    let deleted = conn.execute(
        "DELETE FROM push_subscriptions WHERE endpoint = ?1",
        params![endpoint],
    )?;
    Ok(deleted > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::user::{insert_user, test_user};
    use crate::db::sqlite::open_memory_database;
    use crate::models::Role;

    #[test]
    fn upsert_by_endpoint_keeps_one_row() {
        let conn = open_memory_database().unwrap();
        let ana = insert_user(&conn, &test_user("ana", Role::Nurse, None)).unwrap();
        let bea = insert_user(&conn, &test_user("bea", Role::Nurse, None)).unwrap();
        let now = Utc::now();

        let first = upsert_subscription(&conn, ana, "https://push/1", "k1", "a1", &now).unwrap();
        let second = upsert_subscription(&conn, bea, "https://push/1", "k2", "a2", &now).unwrap();
        assert_eq!(first, second);

        assert!(subscriptions_for_user(&conn, ana).unwrap().is_empty());
        let subs = subscriptions_for_user(&conn, bea).unwrap();
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].p256dh, "k2");
    }

    #[test]
    fn delete_removes_endpoint() {
        let conn = open_memory_database().unwrap();
        let ana = insert_user(&conn, &test_user("ana", Role::Nurse, None)).unwrap();
        upsert_subscription(&conn, ana, "https://push/1", "k", "a", &Utc::now()).unwrap();
        assert!(delete_subscription(&conn, "https://push/1").unwrap());
        assert!(subscriptions_for_user(&conn, ana).unwrap().is_empty());
    }
}
