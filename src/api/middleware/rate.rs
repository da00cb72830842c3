//! Per-caller rate limiting middleware.
//!
//! Applies the sliding-window limits held in `ApiContext`, keyed by
//! bearer token prefix, or by client address for anonymous calls. The
//! resolved `ClientSource` is stored in request extensions.

use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::api::error::ApiError;
use crate::api::types::{bearer_token, client_source, ApiContext, ClientSource};

/// Extract a rate-limit key from the request.
fn rate_key(req: &Request<axum::body::Body>, source: &ClientSource) -> String {
    match bearer_token(req.headers()) {
        Some(token) => {
            let prefix: String = token.chars().take(16).collect();
            format!("token:{prefix}")
        }
        None => format!("anon:{}", source.0),
    }
}

/// Returns 429 with `Retry-After` once a key exceeds its window.
/// Accesses `ApiContext` from request extensions.
pub async fn limit(req: Request<axum::body::Body>, next: Next) -> Response {
    match limit_inner(req, next).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

async fn limit_inner(
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let ctx: ApiContext = req
        .extensions()
        .get::<ApiContext>()
        .cloned()
        .ok_or(ApiError::Internal("missing API context".into()))?;

    let source = client_source(&req, ctx.trust_forwarded_for);
    let key = rate_key(&req, &source);
    req.extensions_mut().insert(source);

    // MutexGuard is !Send: must drop before .await via block scope
    {
        let mut limiter = ctx
            .rate_limiter
            .lock()
            .map_err(|_| ApiError::Internal("rate limiter lock".into()))?;

        limiter.check(&key).map_err(|retry_after| {
            tracing::warn!(key = %key, retry_after, "Rate limit exceeded");
            ApiError::RateLimited { retry_after }
        })?;
    }

    Ok(next.run(req).await)
}
