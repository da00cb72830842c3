//! Checklist submission and history.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::auth::Principal;
use crate::checklist::{self, SubmissionReceipt};
use crate::models::{ChecklistEntry, ChecklistForm};

const DEFAULT_RECENT_LIMIT: u32 = 50;

/// `POST /api/checklist`: store one form as one row per item.
pub async fn submit(
    State(ctx): State<ApiContext>,
    Extension(principal): Extension<Principal>,
    Json(form): Json<ChecklistForm>,
) -> Result<(StatusCode, Json<SubmissionReceipt>), ApiError> {
    let mut conn = ctx.core.open_db()?;
    let receipt = checklist::submit_checklist(&mut conn, &form, &principal.username, Utc::now())?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

#[derive(Deserialize)]
pub struct RecentQuery {
    pub limit: Option<u32>,
}

#[derive(Serialize)]
pub struct RecentResponse {
    pub entries: Vec<ChecklistEntry>,
}

/// `GET /api/checklist/recent?limit=`: newest entries first.
pub async fn recent(
    State(ctx): State<ApiContext>,
    Query(query): Query<RecentQuery>,
) -> Result<Json<RecentResponse>, ApiError> {
    let conn = ctx.core.open_db()?;
    let entries = checklist::list_recent(&conn, query.limit.unwrap_or(DEFAULT_RECENT_LIMIT))?;
    Ok(Json(RecentResponse { entries }))
}
