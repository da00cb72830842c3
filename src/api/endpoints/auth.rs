//! Session endpoints: login, logout, current user.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::types::{bearer_token, ApiContext, ClientSource};
use crate::auth::{self, AuthError, Principal};
use crate::core_state::CoreError;
use crate::db::repository::get_user;
use crate::models::{AuditStatus, Role, User};

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct UserView {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub full_name: Option<String>,
    pub role: Role,
    pub area: Option<String>,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            full_name: user.full_name.clone(),
            role: user.role,
            area: user.area.clone(),
        }
    }
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: UserView,
}

/// `POST /api/auth/login`: exchange credentials for a bearer token.
///
/// Password hashing runs on the blocking pool. Failures are audited.
pub async fn login(
    State(ctx): State<ApiContext>,
    Extension(ClientSource(source)): Extension<ClientSource>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    if body.username.trim().is_empty() || body.password.is_empty() {
        return Err(ApiError::BadRequest("username and password are required".into()));
    }
    let username = body.username.trim().to_string();

    let core = ctx.core.clone();
    let attempt = {
        let username = username.clone();
        tokio::task::spawn_blocking(move || {
            let conn = core.open_db()?;
            let auth_settings = &core.settings().auth;
            Ok::<_, CoreError>(auth::login(
                &conn,
                &username,
                &body.password,
                auth_settings.pbkdf2_iterations,
                auth_settings.session_ttl_minutes,
                &Utc::now(),
            ))
        })
        .await??
    };

    match attempt {
        Ok(session) => {
            ctx.core
                .log_event("login", Some(&username), &source, None, AuditStatus::Success);
            Ok(Json(LoginResponse {
                token: session.token,
                expires_at: session.expires_at,
                user: UserView::from(&session.user),
            }))
        }
        Err(AuthError::Database(e)) => Err(e.into()),
        Err(reason) => {
            tracing::warn!(username = %username, source = %source, "Login failed");
            ctx.core.log_event(
                "login_failed",
                Some(&username),
                &source,
                Some(reason.to_string()),
                AuditStatus::Failure,
            );
            Err(ApiError::InvalidCredentials)
        }
    }
}

/// `POST /api/auth/logout`: close the caller's session.
pub async fn logout(
    State(ctx): State<ApiContext>,
    Extension(principal): Extension<Principal>,
    Extension(ClientSource(source)): Extension<ClientSource>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let token = bearer_token(&headers).ok_or(ApiError::Unauthorized)?;
    let conn = ctx.core.open_db()?;
    auth::logout(&conn, token)?;
    ctx.core.log_event(
        "logout",
        Some(&principal.username),
        &source,
        None,
        AuditStatus::Success,
    );
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/auth/me`: the authenticated account.
pub async fn me(
    State(ctx): State<ApiContext>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<UserView>, ApiError> {
    let conn = ctx.core.open_db()?;
    let user = get_user(&conn, principal.user_id)?;
    Ok(Json(UserView::from(&user)))
}
