//! Background job loop: due reminders and alert dispatch.
//!
//! Spawns a thread that wakes every `scheduler.interval_secs`. Each pass
//! opens its own connection, delivers due reminders, dispatches critical
//! alerts, prunes expired sessions and flushes the audit buffer. A failing
//! step is logged and the loop carries on.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::alerts::{process_alerts, AlertRun};
use crate::core_state::{CoreError, CoreState};
use crate::db::repository::prune_expired_sessions;
use crate::reminders::process_due;

/// Sleep granularity for shutdown responsiveness.
const SLEEP_GRANULARITY_SECS: u64 = 1;

/// Handle for the scheduler thread.
///
/// Supports graceful shutdown via `shutdown()` or automatic cleanup on `Drop`.
pub struct SchedulerHandle {
    shutdown: Arc<AtomicBool>,
    handle: Option<std::thread::JoinHandle<()>>,
}

impl SchedulerHandle {
    /// Request shutdown. A pass already running completes first.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        self.shutdown();
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
    }
}

/// Outcome of one scheduler pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    pub reminders_delivered: usize,
    pub alerts: AlertRun,
    pub sessions_pruned: usize,
}

pub fn start_scheduler(state: Arc<CoreState>) -> SchedulerHandle {
    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = shutdown.clone();
    let interval = state.settings().scheduler.interval_secs.max(1);

    let handle = std::thread::spawn(move || {
        tracing::info!("Scheduler started (every {interval}s)");
        scheduler_loop(&state, &flag, interval);
    });

    SchedulerHandle {
        shutdown,
        handle: Some(handle),
    }
}

fn scheduler_loop(state: &CoreState, shutdown: &AtomicBool, interval_secs: u64) {
    while !shutdown.load(Ordering::Relaxed) {
        for _ in 0..(interval_secs / SLEEP_GRANULARITY_SECS).max(1) {
            if shutdown.load(Ordering::Relaxed) {
                tracing::info!("Scheduler shutting down");
                return;
            }
            std::thread::sleep(Duration::from_secs(SLEEP_GRANULARITY_SECS));
        }

        if shutdown.load(Ordering::Relaxed) {
            break;
        }

        match run_pass(state, &Utc::now()) {
            Ok(report) => tracing::debug!(?report, "Scheduler pass finished"),
            Err(e) => tracing::error!(error = %e, "Scheduler pass failed"),
        }
    }
    tracing::info!("Scheduler shutting down");
}

/// One pass of every periodic job. Only failing to open the database
/// aborts the pass; individual job errors are logged.
pub fn run_pass(state: &CoreState, now: &DateTime<Utc>) -> Result<PassReport, CoreError> {
    let conn = state.open_db()?;
    let notifier = state.notifier();
    let mut report = PassReport::default();

    match process_due(&conn, notifier.as_ref(), now) {
        Ok(n) => report.reminders_delivered = n,
        Err(e) => tracing::error!(error = %e, "Reminder processing failed"),
    }
    match process_alerts(&conn, notifier.as_ref(), now) {
        Ok(run) => report.alerts = run,
        Err(e) => tracing::error!(error = %e, "Alert processing failed"),
    }
    match prune_expired_sessions(&conn, now) {
        Ok(n) => report.sessions_pruned = n,
        Err(e) => tracing::warn!(error = %e, "Session pruning failed"),
    }
    if let Err(e) = state.flush_audit(now) {
        tracing::warn!(error = %e, "Audit flush failed");
    }

    Ok(report)
}
