//! Personal reminders.

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::auth::Principal;
use crate::models::Reminder;
use crate::reminders;

#[derive(Serialize)]
pub struct RemindersResponse {
    pub reminders: Vec<Reminder>,
}

/// `GET /api/reminders`: the caller's upcoming reminders.
pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<RemindersResponse>, ApiError> {
    let conn = ctx.core.open_db()?;
    let reminders = reminders::list_upcoming(&conn, principal.user_id, &Utc::now())?;
    Ok(Json(RemindersResponse { reminders }))
}

#[derive(Deserialize)]
pub struct QuickReminderRequest {
    pub minutes: i64,
    pub title: Option<String>,
    pub body: Option<String>,
}

/// `POST /api/reminders/quick`: remind me in N minutes.
pub async fn quick(
    State(ctx): State<ApiContext>,
    Extension(principal): Extension<Principal>,
    Json(req): Json<QuickReminderRequest>,
) -> Result<(StatusCode, Json<Reminder>), ApiError> {
    let conn = ctx.core.open_db()?;
    let reminder = reminders::schedule_in_minutes(
        &conn,
        principal.user_id,
        req.title.as_deref(),
        req.body.as_deref(),
        req.minutes,
        &Utc::now(),
    )?;
    Ok((StatusCode::CREATED, Json(reminder)))
}

#[derive(Serialize)]
pub struct SendNowResponse {
    pub delivered: usize,
}

/// `POST /api/reminders/send-now`: deliver everything due without
/// waiting for the scheduler.
pub async fn send_now(
    State(ctx): State<ApiContext>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<SendNowResponse>, ApiError> {
    let core = ctx.core.clone();
    let delivered = tokio::task::spawn_blocking(move || {
        let conn = core.open_db()?;
        let notifier = core.notifier();
        Ok::<_, ApiError>(reminders::process_due(&conn, notifier.as_ref(), &Utc::now())?)
    })
    .await??;
    tracing::info!(username = %principal.username, delivered, "Manual reminder run");
    Ok(Json(SendNowResponse { delivered }))
}
