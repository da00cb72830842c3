//! Critical-compliance alerts and alert configuration.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::alerts::{self, CriticalAlert};
use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::auth::Principal;
use crate::db::repository::get_alert_config;
use crate::models::AlertConfig;
use crate::reporting::scoped_area;

#[derive(Deserialize)]
pub struct AreaQuery {
    pub area: Option<String>,
}

#[derive(Serialize)]
pub struct CriticalResponse {
    pub area: Option<String>,
    pub alerts: Vec<CriticalAlert>,
}

/// `GET /api/alerts/critical`: last-24h alerts; nurses see their own area.
pub async fn critical(
    State(ctx): State<ApiContext>,
    Extension(principal): Extension<Principal>,
    Query(query): Query<AreaQuery>,
) -> Result<Json<CriticalResponse>, ApiError> {
    let area = scoped_area(principal.role, principal.area.as_deref(), query.area);
    let conn = ctx.core.open_db()?;
    let alerts = alerts::critical_alerts(&conn, area.clone(), &Utc::now())?;
    Ok(Json(CriticalResponse { area, alerts }))
}

/// `GET /api/alerts/config?area=` (admin)
pub async fn get_config(
    State(ctx): State<ApiContext>,
    Extension(principal): Extension<Principal>,
    Query(query): Query<AreaQuery>,
) -> Result<Json<AlertConfig>, ApiError> {
    principal.require_admin()?;
    let conn = ctx.core.open_db()?;
    let area = query.area.filter(|a| !a.trim().is_empty());
    Ok(Json(get_alert_config(&conn, area.as_deref())?))
}

/// `PUT /api/alerts/config` (admin)
pub async fn put_config(
    State(ctx): State<ApiContext>,
    Extension(principal): Extension<Principal>,
    Json(config): Json<AlertConfig>,
) -> Result<Json<AlertConfig>, ApiError> {
    principal.require_admin()?;
    let conn = ctx.core.open_db()?;
    let saved = alerts::save_config(&conn, &config, &Utc::now())?;
    Ok(Json(saved))
}

#[derive(Deserialize)]
pub struct TestAlertRequest {
    pub email: String,
}

/// `POST /api/alerts/test` (admin): send a test mail.
pub async fn test(
    State(ctx): State<ApiContext>,
    Extension(principal): Extension<Principal>,
    Json(body): Json<TestAlertRequest>,
) -> Result<StatusCode, ApiError> {
    principal.require_admin()?;
    let notifier = ctx.core.notifier();
    tokio::task::spawn_blocking(move || alerts::send_test_alert(notifier.as_ref(), &body.email))
        .await??;
    Ok(StatusCode::ACCEPTED)
}
