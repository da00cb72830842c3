//! Push subscription management.

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::auth::Principal;
use crate::db::repository::{subscriptions_for_user, upsert_subscription};
use crate::notify::{endpoint_tail, PushMessage};

#[derive(Deserialize)]
pub struct SubscriptionKeys {
    pub p256dh: String,
    pub auth: String,
}

/// Browser `PushSubscription.toJSON()` shape.
#[derive(Deserialize)]
pub struct SubscribeRequest {
    pub endpoint: String,
    pub keys: SubscriptionKeys,
}

#[derive(Serialize)]
pub struct SubscribeResponse {
    pub id: i64,
}

/// `POST /api/notifications/subscribe`: register or refresh an endpoint.
pub async fn subscribe(
    State(ctx): State<ApiContext>,
    Extension(principal): Extension<Principal>,
    Json(req): Json<SubscribeRequest>,
) -> Result<(StatusCode, Json<SubscribeResponse>), ApiError> {
    let endpoint = req.endpoint.trim();
    if !endpoint.starts_with("https://") {
        return Err(ApiError::BadRequest("endpoint must be an https URL".into()));
    }
    if req.keys.p256dh.trim().is_empty() || req.keys.auth.trim().is_empty() {
        return Err(ApiError::BadRequest("subscription keys are required".into()));
    }
    let conn = ctx.core.open_db()?;
    let id = upsert_subscription(
        &conn,
        principal.user_id,
        endpoint,
        req.keys.p256dh.trim(),
        req.keys.auth.trim(),
        &Utc::now(),
    )?;
    tracing::info!(user_id = principal.user_id, endpoint = %endpoint_tail(endpoint), "Push subscription registered");
    Ok((StatusCode::CREATED, Json(SubscribeResponse { id })))
}

#[derive(Serialize)]
pub struct SubscriptionView {
    pub id: i64,
    pub endpoint: String,
    pub created_at: DateTime<Utc>,
}

/// `GET /api/notifications/subscriptions`: endpoints shown by tail only.
pub async fn subscriptions(
    State(ctx): State<ApiContext>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<Vec<SubscriptionView>>, ApiError> {
    let conn = ctx.core.open_db()?;
    let subs = subscriptions_for_user(&conn, principal.user_id)?
        .into_iter()
        .map(|s| SubscriptionView {
            id: s.id,
            endpoint: endpoint_tail(&s.endpoint),
            created_at: s.created_at,
        })
        .collect();
    Ok(Json(subs))
}

#[derive(Serialize)]
pub struct TestPushResponse {
    pub sent: usize,
    pub failed: usize,
}

/// `POST /api/notifications/test`: push a test message to every
/// subscription of the caller.
pub async fn test(
    State(ctx): State<ApiContext>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<TestPushResponse>, ApiError> {
    let subs = {
        let conn = ctx.core.open_db()?;
        subscriptions_for_user(&conn, principal.user_id)?
    };
    if subs.is_empty() {
        return Err(ApiError::NotFound("no push subscription registered".into()));
    }

    let notifier = ctx.core.notifier();
    let message = PushMessage {
        title: "MedCheck".into(),
        body: "Test notification".into(),
        url: None,
    };
    let (sent, failed) = tokio::task::spawn_blocking(move || {
        let mut sent = 0;
        let mut failed = 0;
        for sub in &subs {
            match notifier.send_push(sub, &message) {
                Ok(()) => sent += 1,
                Err(e) => {
                    tracing::warn!(subscription_id = sub.id, error = %e, "Test push failed");
                    failed += 1;
                }
            }
        }
        (sent, failed)
    })
    .await?;

    Ok(Json(TestPushResponse { sent, failed }))
}
