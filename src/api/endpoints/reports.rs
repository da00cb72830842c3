//! Compliance reports and exports (supervisors and admins).
//!
//! Every report accepts `?period=7d|30d|90d` (default 7d) and `?area=`.
//! Supervisors without an explicit area see their own.

use axum::extract::{Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::auth::Principal;
use crate::db::repository::list_entries;
use crate::export::{self, Recommendation};
use crate::indicators::indicator_summary;
use crate::models::EntryFilter;
use crate::reporting::{
    self, scoped_area, Anomaly, ComplianceGroup, ComplianceSummary, ItemKey, Period, ShiftAreaKey,
    CRITICAL_ITEM_THRESHOLD,
};

#[derive(Debug, Default, Deserialize)]
pub struct ReportQuery {
    pub period: Option<String>,
    pub area: Option<String>,
    pub threshold: Option<f64>,
    #[serde(default)]
    pub voice: bool,
}

/// Resolved scope of one report request.
struct ReportScope {
    period: Period,
    area: Option<String>,
    filter: EntryFilter,
    now: DateTime<Utc>,
}

impl ReportScope {
    fn label(&self) -> String {
        let area = self.area.as_deref().unwrap_or("all areas");
        format!("last {} days, {area}", self.period.days())
    }

    fn file_stem(&self) -> String {
        let period = match self.period {
            Period::Last7Days => "7d",
            Period::Last30Days => "30d",
            Period::Last90Days => "90d",
        };
        format!("medcheck_{period}_{}", self.now.format("%Y%m%d"))
    }
}

fn resolve_scope(principal: &Principal, query: &ReportQuery) -> Result<ReportScope, ApiError> {
    principal.require_reporting()?;
    let period = match query.period.as_deref() {
        None => Period::default(),
        Some(raw) => Period::parse(raw).ok_or_else(|| {
            ApiError::BadRequest(format!("period must be one of 7d, 30d, 90d, got '{raw}'"))
        })?,
    };
    let area = scoped_area(principal.role, principal.area.as_deref(), query.area.clone());
    let now = Utc::now();
    let filter = period.filter(&now, area.clone());
    Ok(ReportScope {
        period,
        area,
        filter,
        now,
    })
}

#[derive(Serialize)]
pub struct SummaryResponse {
    pub period: Period,
    pub area: Option<String>,
    pub has_data: bool,
    #[serde(flatten)]
    pub summary: ComplianceSummary,
}

/// `GET /api/reports/summary`
pub async fn summary(
    State(ctx): State<ApiContext>,
    Extension(principal): Extension<Principal>,
    Query(query): Query<ReportQuery>,
) -> Result<Json<SummaryResponse>, ApiError> {
    let scope = resolve_scope(&principal, &query)?;
    let conn = ctx.core.open_db()?;
    let summary = reporting::compliance_summary(&conn, &scope.filter)?;
    Ok(Json(SummaryResponse {
        period: scope.period,
        area: scope.area,
        has_data: summary.has_data(),
        summary,
    }))
}

/// `GET /api/reports/critical-items?threshold=`
pub async fn critical_items(
    State(ctx): State<ApiContext>,
    Extension(principal): Extension<Principal>,
    Query(query): Query<ReportQuery>,
) -> Result<Json<Vec<ComplianceGroup<ItemKey>>>, ApiError> {
    let scope = resolve_scope(&principal, &query)?;
    let threshold = query.threshold.unwrap_or(CRITICAL_ITEM_THRESHOLD);
    if !(0.0..=100.0).contains(&threshold) {
        return Err(ApiError::BadRequest("threshold must be between 0 and 100".into()));
    }
    let conn = ctx.core.open_db()?;
    Ok(Json(reporting::critical_items(&conn, &scope.filter, threshold)?))
}

/// `GET /api/reports/shifts`
pub async fn shifts(
    State(ctx): State<ApiContext>,
    Extension(principal): Extension<Principal>,
    Query(query): Query<ReportQuery>,
) -> Result<Json<Vec<ComplianceGroup<ShiftAreaKey>>>, ApiError> {
    let scope = resolve_scope(&principal, &query)?;
    let conn = ctx.core.open_db()?;
    Ok(Json(reporting::shift_comparison(&conn, &scope.filter)?))
}

/// `GET /api/reports/anomalies`: always compares the last 7 days
/// against the last 30, whatever the period.
pub async fn anomalies(
    State(ctx): State<ApiContext>,
    Extension(principal): Extension<Principal>,
    Query(query): Query<ReportQuery>,
) -> Result<Json<Vec<Anomaly>>, ApiError> {
    let scope = resolve_scope(&principal, &query)?;
    let conn = ctx.core.open_db()?;
    Ok(Json(reporting::anomalies(&conn, scope.area, &scope.now)?))
}

/// `GET /api/reports/export/csv`
pub async fn export_csv(
    State(ctx): State<ApiContext>,
    Extension(principal): Extension<Principal>,
    Query(query): Query<ReportQuery>,
) -> Result<Response, ApiError> {
    let scope = resolve_scope(&principal, &query)?;
    let conn = ctx.core.open_db()?;
    let entries = list_entries(&conn, &scope.filter)?;
    let csv = export::entries_to_csv(&entries);
    tracing::info!(rows = entries.len(), username = %principal.username, "CSV export");

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}.csv\"", scope.file_stem()),
            ),
        ],
        csv,
    )
        .into_response())
}

/// `GET /api/reports/export/pdf`
pub async fn export_pdf(
    State(ctx): State<ApiContext>,
    Extension(principal): Extension<Principal>,
    Query(query): Query<ReportQuery>,
) -> Result<Response, ApiError> {
    let scope = resolve_scope(&principal, &query)?;
    let (summary, indicators) = {
        let conn = ctx.core.open_db()?;
        let days = scope.period.days() as u32;
        (
            reporting::compliance_summary(&conn, &scope.filter)?,
            indicator_summary(&conn, days, &scope.now)?,
        )
    };

    let label = scope.label();
    let pdf = tokio::task::spawn_blocking(move || {
        export::compliance_report_pdf("MedCheck compliance report", &label, &summary, &indicators)
    })
    .await??;

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}.pdf\"", scope.file_stem()),
            ),
        ],
        pdf,
    )
        .into_response())
}

#[derive(Serialize)]
pub struct NarrationResponse {
    pub text: String,
    pub recommendations: Vec<Recommendation>,
    /// Base64 MPEG audio, present only when `?voice=true` and TTS is configured.
    pub audio_base64: Option<String>,
}

/// `GET /api/reports/narration?voice=`
pub async fn narration(
    State(ctx): State<ApiContext>,
    Extension(principal): Extension<Principal>,
    Query(query): Query<ReportQuery>,
) -> Result<Json<NarrationResponse>, ApiError> {
    let scope = resolve_scope(&principal, &query)?;
    let summary = {
        let conn = ctx.core.open_db()?;
        reporting::compliance_summary(&conn, &scope.filter)?
    };
    let text = export::narrate_summary(&summary);
    let recommendations = export::recommendations(&summary);

    let audio_base64 = if query.voice && ctx.core.tts().is_some() {
        let core = ctx.core.clone();
        let spoken = text.clone();
        let audio = tokio::task::spawn_blocking(move || match core.tts() {
            Some(tts) => tts.synthesize(&spoken),
            None => Ok(None),
        })
        .await??;
        audio.map(|bytes| base64::engine::general_purpose::STANDARD.encode(bytes))
    } else {
        None
    };

    Ok(Json(NarrationResponse {
        text,
        recommendations,
        audio_base64,
    }))
}
