//! Authentication: password hashing, bearer-token sessions, role checks.
//!
//! Bearer tokens are opaque random strings handed to the client once at
//! login. Only their SHA-256 is stored; a leaked `sessions` table does not
//! grant access.

mod password;
mod token;

pub use password::*;
pub use token::*;

use chrono::{DateTime, Duration, Utc};
use rusqlite::Connection;
use serde::Serialize;
use thiserror::Error;

use crate::db::repository::*;
use crate::db::DatabaseError;
use crate::models::{NewUser, Role, User};

pub const DEFAULT_SESSION_TTL_MINUTES: i64 = 480;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Account is disabled")]
    Inactive,

    #[error("Session missing or expired")]
    InvalidSession,

    #[error("Role '{role}' may not {action}")]
    Forbidden { role: Role, action: &'static str },

    #[error("Invalid account data: {0}")]
    Validation(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// The authenticated caller, injected into request extensions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Principal {
    pub user_id: i64,
    pub username: String,
    pub role: Role,
    pub area: Option<String>,
}

impl Principal {
    pub fn from_user(user: &User) -> Self {
        Self {
            user_id: user.id,
            username: user.username.clone(),
            role: user.role,
            area: user.area.clone(),
        }
    }

    pub fn can_view_reports(&self) -> bool {
        matches!(self.role, Role::Admin | Role::Supervisor)
    }

    /// Dashboards, indicators and exports: supervisors and admins.
    pub fn require_reporting(&self) -> Result<(), AuthError> {
        if self.can_view_reports() {
            Ok(())
        } else {
            Err(AuthError::Forbidden {
                role: self.role,
                action: "view reports",
            })
        }
    }

    pub fn require_admin(&self) -> Result<(), AuthError> {
        if self.role == Role::Admin {
            Ok(())
        } else {
            Err(AuthError::Forbidden {
                role: self.role,
                action: "administer alerts",
            })
        }
    }
}

/// Token returned once at login, with the account it belongs to.
#[derive(Debug, Clone)]
pub struct LoginSession {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: User,
}

/// Verify credentials and open a session lasting `ttl_minutes`.
///
/// Unknown users and wrong passwords produce the same error.
pub fn login(
    conn: &Connection,
    username: &str,
    password: &str,
    iterations: u32,
    ttl_minutes: i64,
    now: &DateTime<Utc>,
) -> Result<LoginSession, AuthError> {
    let Some(user) = find_user_by_username(conn, username.trim())? else {
        verify_password(password, DUMMY_HASH, iterations);
        return Err(AuthError::InvalidCredentials);
    };
    if !verify_password(password, &user.password_hash, iterations) {
        return Err(AuthError::InvalidCredentials);
    }
    if !user.is_active {
        return Err(AuthError::Inactive);
    }

    let token = generate_token();
    let expires_at = *now + Duration::minutes(ttl_minutes);
    insert_session(conn, &hash_token(&token), user.id, now, &expires_at)?;
    tracing::info!(user_id = user.id, username = %user.username, "Session opened");

    Ok(LoginSession {
        token,
        expires_at,
        user,
    })
}

/// Resolve a bearer token into the caller it belongs to.
pub fn authenticate(
    conn: &Connection,
    token: &str,
    now: &DateTime<Utc>,
) -> Result<Principal, AuthError> {
    let user_id =
        find_session_user(conn, &hash_token(token), now)?.ok_or(AuthError::InvalidSession)?;
    let user = get_user(conn, user_id)?;
    if !user.is_active {
        return Err(AuthError::InvalidSession);
    }
    Ok(Principal::from_user(&user))
}

/// Close a session. Returns false when the token was unknown.
pub fn logout(conn: &Connection, token: &str) -> Result<bool, AuthError> {
    Ok(delete_session(conn, &hash_token(token))?)
}

/// Account to create at startup when no admin exists yet.
#[derive(Debug, Clone)]
pub struct BootstrapAdmin {
    pub username: String,
    pub email: String,
    pub password: String,
}

pub fn create_user(
    conn: &Connection,
    username: &str,
    email: &str,
    password: &str,
    role: Role,
    area: Option<&str>,
    iterations: u32,
) -> Result<i64, AuthError> {
    let username = username.trim();
    if username.is_empty() {
        return Err(AuthError::Validation("username is required".into()));
    }
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::Validation(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    let user = NewUser {
        username: username.to_string(),
        email: email.trim().to_string(),
        full_name: None,
        area: area.map(String::from),
        role,
        password_hash: hash_password(password, iterations),
    };
    Ok(insert_user(conn, &user)?)
}

/// Create the configured admin when the database has none.
/// Returns whether an account was created.
pub fn ensure_bootstrap_admin(
    conn: &Connection,
    admin: &BootstrapAdmin,
    iterations: u32,
) -> Result<bool, AuthError> {
    if count_admins(conn)? > 0 {
        return Ok(false);
    }
    let id = create_user(
        conn,
        &admin.username,
        &admin.email,
        &admin.password,
        Role::Admin,
        None,
        iterations,
    )?;
    tracing::info!(user_id = id, username = %admin.username, "Bootstrap admin created");
    Ok(true)
}

// ═══════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;
    use chrono::TimeZone;

    const FAST: u32 = 1_000;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 2, 8, 0, 0).unwrap()
    }

    fn seeded() -> Connection {
        let conn = open_memory_database().unwrap();
        create_user(&conn, "ana", "ana@hospital.test", "s3cret-pass", Role::Nurse, Some("UCI"), FAST)
            .unwrap();
        conn
    }

    #[test]
    fn test_login_then_authenticate() {
        let conn = seeded();
        let session = login(&conn, "ana", "s3cret-pass", FAST, 60, &now()).unwrap();
        assert_eq!(session.expires_at, now() + Duration::minutes(60));

        let principal = authenticate(&conn, &session.token, &now()).unwrap();
        assert_eq!(principal.username, "ana");
        assert_eq!(principal.role, Role::Nurse);
        assert_eq!(principal.area.as_deref(), Some("UCI"));
    }

    #[test]
    fn test_wrong_password_and_unknown_user_look_alike() {
        let conn = seeded();
        let wrong = login(&conn, "ana", "nope-nope", FAST, 60, &now()).unwrap_err();
        let unknown = login(&conn, "zoe", "s3cret-pass", FAST, 60, &now()).unwrap_err();
        assert!(matches!(wrong, AuthError::InvalidCredentials));
        assert!(matches!(unknown, AuthError::InvalidCredentials));
    }

    #[test]
    fn test_session_expires() {
        let conn = seeded();
        let session = login(&conn, "ana", "s3cret-pass", FAST, 30, &now()).unwrap();
        let later = now() + Duration::minutes(30);
        assert!(matches!(
            authenticate(&conn, &session.token, &later),
            Err(AuthError::InvalidSession)
        ));
    }

    #[test]
    fn test_logout_invalidates_token() {
        let conn = seeded();
        let session = login(&conn, "ana", "s3cret-pass", FAST, 60, &now()).unwrap();
        assert!(logout(&conn, &session.token).unwrap());
        assert!(!logout(&conn, &session.token).unwrap());
        assert!(authenticate(&conn, &session.token, &now()).is_err());
    }

    #[test]
    fn test_stored_token_is_hashed() {
        let conn = seeded();
        let session = login(&conn, "ana", "s3cret-pass", FAST, 60, &now()).unwrap();
        let stored: String = conn
            .query_row("SELECT token_hash FROM sessions", [], |row| row.get(0))
            .unwrap();
        assert_ne!(stored, session.token);
        assert_eq!(stored, hash_token(&session.token));
    }

    #[test]
    fn test_role_checks() {
        let mut p = Principal {
            user_id: 1,
            username: "ana".into(),
            role: Role::Nurse,
            area: None,
        };
        assert!(p.require_reporting().is_err());
        assert!(p.require_admin().is_err());

        p.role = Role::Supervisor;
        assert!(p.require_reporting().is_ok());
        assert!(p.require_admin().is_err());

        p.role = Role::Admin;
        assert!(p.require_reporting().is_ok());
        assert!(p.require_admin().is_ok());
    }

    #[test]
    fn test_short_password_rejected() {
        let conn = open_memory_database().unwrap();
        let err = create_user(&conn, "bo", "bo@h.test", "short", Role::Nurse, None, FAST);
        assert!(matches!(err, Err(AuthError::Validation(_))));
    }

    #[test]
    fn test_bootstrap_admin_only_once() {
        let conn = open_memory_database().unwrap();
        let admin = BootstrapAdmin {
            username: "admin".into(),
            email: "admin@hospital.test".into(),
            password: "change-me-now".into(),
        };
        assert!(ensure_bootstrap_admin(&conn, &admin, FAST).unwrap());
        assert!(!ensure_bootstrap_admin(&conn, &admin, FAST).unwrap());
        assert_eq!(count_admins(&conn).unwrap(), 1);

        let session = login(&conn, "admin", "change-me-now", FAST, 60, &now()).unwrap();
        assert_eq!(session.user.role, Role::Admin);
    }
}
