//! API router.
//!
//! Returns a composable `Router` that `server::serve` mounts on a TCP
//! listener. Routes are nested under `/api/`.
//!
//! Middleware stack (outermost → innermost):
//! 1. Rate limiter → 2. Auth validator → 3. Audit logger

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::api::endpoints;
use crate::api::middleware;
use crate::api::types::ApiContext;
use crate::core_state::CoreState;

/// Build the API router.
///
/// Middleware uses `Extension<ApiContext>` (injected as the outermost layer).
/// Endpoint handlers use `State<ApiContext>` (provided via `with_state`).
pub fn api_router(core: Arc<CoreState>) -> Router {
    build_router(ApiContext::new(core))
}

fn build_router(ctx: ApiContext) -> Router {
    // Layers are applied from bottom (innermost) to top (outermost):
    //   Extension → Rate limit → Auth → Audit → Handler
    //
    // NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7).
    let protected = Router::new()
        .route("/auth/logout", post(endpoints::auth::logout))
        .route("/auth/me", get(endpoints::auth::me))
        .route("/checklist", post(endpoints::checklist::submit))
        .route("/checklist/recent", get(endpoints::checklist::recent))
        .route("/indicators/clmc", get(endpoints::indicators::clmc))
        .route("/indicators/teaem", get(endpoints::indicators::teaem))
        .route("/indicators/per-field", get(endpoints::indicators::per_field))
        .route("/indicators/trend", get(endpoints::indicators::trend))
        .route("/indicators/summary", get(endpoints::indicators::summary))
        .route("/reports/summary", get(endpoints::reports::summary))
        .route(
            "/reports/critical-items",
            get(endpoints::reports::critical_items),
        )
        .route("/reports/shifts", get(endpoints::reports::shifts))
        .route("/reports/anomalies", get(endpoints::reports::anomalies))
        .route("/reports/export/csv", get(endpoints::reports::export_csv))
        .route("/reports/export/pdf", get(endpoints::reports::export_pdf))
        .route("/reports/narration", get(endpoints::reports::narration))
        .route("/alerts/critical", get(endpoints::alerts::critical))
        .route(
            "/alerts/config",
            get(endpoints::alerts::get_config).put(endpoints::alerts::put_config),
        )
        .route("/alerts/test", post(endpoints::alerts::test))
        .route("/reminders", get(endpoints::reminders::list))
        .route("/reminders/quick", post(endpoints::reminders::quick))
        .route("/reminders/send-now", post(endpoints::reminders::send_now))
        .route(
            "/notifications/subscribe",
            post(endpoints::notifications::subscribe),
        )
        .route(
            "/notifications/subscriptions",
            get(endpoints::notifications::subscriptions),
        )
        .route("/notifications/test", post(endpoints::notifications::test))
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::audit::log_access))
        .layer(axum::middleware::from_fn(middleware::auth::require_auth))
        .layer(axum::middleware::from_fn(middleware::rate::limit))
        // Extension must be outermost so middleware can extract ApiContext
        .layer(axum::Extension(ctx.clone()));

    // Unprotected routes (rate-limited only, no auth required)
    let unprotected = Router::new()
        .route("/health", get(endpoints::health::check))
        .route("/auth/login", post(endpoints::auth::login))
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::rate::limit))
        .layer(axum::Extension(ctx));

    Router::new()
        .nest("/api", protected)
        .nest("/api", unprotected)
        .layer(TraceLayer::new_for_http())
}
