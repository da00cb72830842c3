//! HTTP server lifecycle: bind, mount `api_router()`, run until the
//! shutdown future resolves.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{header, Method};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

use crate::api::router::api_router;
use crate::core_state::CoreState;

/// Bind `addr` and serve the API until `shutdown` completes.
pub async fn serve<F>(core: Arc<CoreState>, addr: SocketAddr, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(addr).await?;
    serve_on(listener, core, shutdown).await
}

/// Serve on an already-bound listener. Split out so tests can bind an
/// ephemeral port first.
pub async fn serve_on<F>(
    listener: TcpListener,
    core: Arc<CoreState>,
    shutdown: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);
    let app = api_router(core).layer(cors);

    tracing::info!(%addr, "API server started");

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(async move {
            shutdown.await;
            tracing::info!("API server received shutdown signal");
        })
        .await?;

    tracing::info!("API server stopped");
    Ok(())
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_state::testing::test_state;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn serves_health_and_stops_on_signal() {
        let dir = tempfile::tempdir().unwrap();
        let (core, _notifier) = test_state(dir.path());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let (tx, rx) = oneshot::channel::<()>();
        let core_ref = core.clone();
        let server = tokio::spawn(serve_on(listener, core, async move {
            let _ = rx.await;
        }));

        let url = format!("http://127.0.0.1:{port}/api/health");
        let resp = reqwest::get(&url).await.unwrap();
        assert!(resp.status().is_success());

        let url = format!("http://127.0.0.1:{port}/api/auth/me");
        let resp = reqwest::get(&url).await.unwrap();
        assert_eq!(resp.status().as_u16(), 401);

        let url = format!("http://127.0.0.1:{port}/api/auth/login");
        let resp = reqwest::Client::new()
            .post(&url)
            .header("X-Forwarded-For", "203.0.113.7")
            .json(&serde_json::json!({"username": "nobody", "password": "wrong-password"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 401);
        drop(resp);

        tx.send(()).unwrap();
        server.await.unwrap().unwrap();

        // Audited under the peer address, not the client-supplied header.
        let events = core_ref.audit_entries();
        let failed = events
            .iter()
            .find(|e| e.event_type == "login_failed")
            .unwrap();
        assert_eq!(failed.source, "127.0.0.1");
    }
}
