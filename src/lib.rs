pub mod alerts;
pub mod api;
pub mod auth;
pub mod checklist;
pub mod config;
pub mod core_state;
pub mod db;
pub mod export;
pub mod indicators;
pub mod models;
pub mod notify;
pub mod reminders;
pub mod reporting;
pub mod scheduler;

use std::net::SocketAddr;
use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use crate::auth::{AuthError, BootstrapAdmin};
use crate::config::{ConfigError, Settings};
use crate::core_state::{CoreError, CoreState};

#[derive(Error, Debug)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error("Bootstrap admin: {0}")]
    Auth(#[from] AuthError),
    #[error("Invalid bind address '{0}'")]
    Bind(String),
    #[error("Server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Process entry point: load settings, start the scheduler and serve
/// the API until Ctrl-C.
///
/// Blocking HTTP clients are created and dropped outside the tokio
/// runtime, so `CoreState` is built here and the last `Arc` is released
/// after the runtime has shut down.
pub fn run() -> Result<(), StartupError> {
    let settings = Settings::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&settings.logging.filter)),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let addr: SocketAddr = settings
        .server
        .bind
        .parse()
        .map_err(|_| StartupError::Bind(settings.server.bind.clone()))?;

    let core = Arc::new(CoreState::from_settings(settings)?);
    tracing::info!(db = %core.db_path().display(), "Database ready");

    if let Some(admin) = &core.settings().auth.bootstrap_admin {
        let conn = core.open_db()?;
        let created = auth::ensure_bootstrap_admin(
            &conn,
            &BootstrapAdmin::from(admin),
            core.settings().auth.pbkdf2_iterations,
        )?;
        if created {
            tracing::info!(username = %admin.username, "Bootstrap admin created");
        }
    }

    let scheduler = if core.settings().scheduler.enabled {
        Some(scheduler::start_scheduler(core.clone()))
    } else {
        tracing::info!("Scheduler disabled");
        None
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let served = runtime.block_on(api::serve(core.clone(), addr, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Cannot listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    }));
    drop(runtime);

    if let Some(handle) = scheduler {
        handle.shutdown();
        drop(handle);
    }

    match core.flush_audit(&Utc::now()) {
        Ok(n) if n > 0 => tracing::info!(flushed = n, "Audit buffer flushed on shutdown"),
        Ok(_) => {}
        Err(e) => tracing::warn!("Audit flush on shutdown failed: {e}"),
    }

    served?;
    tracing::info!("{} stopped", config::APP_NAME);
    Ok(())
}
