//! Compliance indicator endpoints (supervisors and admins).

use axum::extract::{Query, State};
use axum::{Extension, Json};
use chrono::Utc;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, DaysQuery, WeeksQuery};
use crate::auth::Principal;
use crate::indicators::{self, FieldCompliance, IndicatorResult, IndicatorSummary, WeeklyTrend};

/// `GET /api/indicators/clmc?days=`
pub async fn clmc(
    State(ctx): State<ApiContext>,
    Extension(principal): Extension<Principal>,
    Query(query): Query<DaysQuery>,
) -> Result<Json<IndicatorResult>, ApiError> {
    principal.require_reporting()?;
    let days = query.resolve()?;
    let conn = ctx.core.open_db()?;
    Ok(Json(indicators::compute_clmc(&conn, days, &Utc::now())?))
}

/// `GET /api/indicators/teaem?days=`
pub async fn teaem(
    State(ctx): State<ApiContext>,
    Extension(principal): Extension<Principal>,
    Query(query): Query<DaysQuery>,
) -> Result<Json<IndicatorResult>, ApiError> {
    principal.require_reporting()?;
    let days = query.resolve()?;
    let conn = ctx.core.open_db()?;
    Ok(Json(indicators::compute_teaem(&conn, days, &Utc::now())?))
}

/// `GET /api/indicators/per-field?days=`
pub async fn per_field(
    State(ctx): State<ApiContext>,
    Extension(principal): Extension<Principal>,
    Query(query): Query<DaysQuery>,
) -> Result<Json<Vec<FieldCompliance>>, ApiError> {
    principal.require_reporting()?;
    let days = query.resolve()?;
    let conn = ctx.core.open_db()?;
    Ok(Json(indicators::per_field_breakdown(&conn, days, &Utc::now())?))
}

/// `GET /api/indicators/trend?weeks=`
pub async fn trend(
    State(ctx): State<ApiContext>,
    Extension(principal): Extension<Principal>,
    Query(query): Query<WeeksQuery>,
) -> Result<Json<WeeklyTrend>, ApiError> {
    principal.require_reporting()?;
    let weeks = query.resolve()?;
    let conn = ctx.core.open_db()?;
    Ok(Json(indicators::weekly_trend(&conn, weeks, &Utc::now())?))
}

/// `GET /api/indicators/summary?days=`
pub async fn summary(
    State(ctx): State<ApiContext>,
    Extension(principal): Extension<Principal>,
    Query(query): Query<DaysQuery>,
) -> Result<Json<IndicatorSummary>, ApiError> {
    principal.require_reporting()?;
    let days = query.resolve()?;
    let conn = ctx.core.open_db()?;
    Ok(Json(indicators::indicator_summary(&conn, days, &Utc::now())?))
}
