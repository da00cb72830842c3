//! Audit logging middleware.
//!
//! Records every authenticated API request with username, method, path
//! and response status. Runs innermost (after auth has injected `Principal`).

use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;

use crate::api::types::{ApiContext, ClientSource, UNKNOWN_SOURCE};
use crate::auth::Principal;
use crate::models::AuditStatus;

pub async fn log_access(req: Request<axum::body::Body>, next: Next) -> Response {
    let method = req.method().to_string();
    let path = req.uri().path().to_string();
    let source = req
        .extensions()
        .get::<ClientSource>()
        .map(|s| s.0.clone())
        .unwrap_or_else(|| UNKNOWN_SOURCE.to_string());

    let ctx = req.extensions().get::<ApiContext>().cloned();
    let username = req
        .extensions()
        .get::<Principal>()
        .map(|p| p.username.clone());

    let response = next.run(req).await;

    if let Some(ctx) = ctx {
        let status = response.status();
        let audit_status = if status.is_server_error() {
            AuditStatus::Failure
        } else if status.is_client_error() {
            AuditStatus::Warning
        } else {
            AuditStatus::Success
        };
        ctx.core.log_event(
            "api_access",
            username.as_deref(),
            &source,
            Some(format!("{method} {path} status:{}", status.as_u16())),
            audit_status,
        );
    }

    response
}
