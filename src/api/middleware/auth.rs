//! Bearer token authentication middleware.
//!
//! Extracts `Authorization: Bearer <token>`, resolves the session and
//! injects the caller's `Principal` into request extensions for
//! downstream handlers.

use axum::http::{HeaderValue, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use chrono::Utc;

use crate::api::error::ApiError;
use crate::api::types::{bearer_token, ApiContext};
use crate::auth;

/// Require a valid, unexpired session token.
///
/// Accesses `ApiContext` from request extensions (injected by Extension layer).
/// On success: injects `Principal` and adds `Cache-Control: no-store`.
pub async fn require_auth(req: Request<axum::body::Body>, next: Next) -> Response {
    match require_auth_inner(req, next).await {
        Ok(resp) => resp,
        Err(err) => err.into_response(),
    }
}

async fn require_auth_inner(
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let ctx: ApiContext = req
        .extensions()
        .get::<ApiContext>()
        .cloned()
        .ok_or(ApiError::Internal("missing API context".into()))?;

    let token = bearer_token(req.headers())
        .ok_or(ApiError::Unauthorized)?
        .to_string();

    // Connection dropped here, before any .await
    let principal = {
        let conn = ctx.core.open_db()?;
        auth::authenticate(&conn, &token, &Utc::now())?
    };

    req.extensions_mut().insert(principal);

    let mut response = next.run(req).await;
    response
        .headers_mut()
        .insert("Cache-Control", HeaderValue::from_static("no-store"));
    Ok(response)
}
