//! Critical-compliance alerts per (area, stage) over the last 24 hours,
//! persisted alert configuration and the periodic dispatch job.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Duration, Utc};
use rusqlite::Connection;
use serde::Serialize;
use thiserror::Error;

use crate::db::repository::*;
use crate::db::DatabaseError;
use crate::indicators::percentage;
use crate::models::*;
use crate::notify::{is_plausible_email, MailMessage, Notifier, NotifyError};

pub const LOOKBACK_HOURS: i64 = 24;
pub const CRITICAL_SEVERITY_FLOOR: f64 = 50.0;
pub const MAX_INTERVAL_HOURS: u32 = 72;

#[derive(Error, Debug)]
pub enum AlertError {
    #[error("Invalid alert configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Notify(#[from] NotifyError),
}

/// An (area, stage) pair below its critical threshold.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CriticalAlert {
    pub area: String,
    pub stage: Stage,
    pub total: u32,
    pub compliant: u32,
    pub compliance: f64,
    pub threshold: f64,
    pub severity: AlertSeverity,
    pub last_review: DateTime<Utc>,
}

pub fn severity_for(compliance: f64) -> AlertSeverity {
    if compliance < CRITICAL_SEVERITY_FLOOR {
        AlertSeverity::Critical
    } else {
        AlertSeverity::High
    }
}

/// Groups from the last 24 hours below the configured critical threshold,
/// worst first.
pub fn critical_alerts(
    conn: &Connection,
    area: Option<String>,
    now: &DateTime<Utc>,
) -> Result<Vec<CriticalAlert>, DatabaseError> {
    let filter = EntryFilter::between(
        *now - Duration::hours(LOOKBACK_HOURS),
        *now + Duration::seconds(1),
    )
    .in_area(area);
    let facts = fetch_entry_facts(conn, &filter)?;

    let mut groups: BTreeMap<(String, Stage), (u32, u32, DateTime<Utc>)> = BTreeMap::new();
    for fact in &facts {
        let slot = groups
            .entry((fact.area.clone(), fact.stage))
            .or_insert((0, 0, fact.recorded_at));
        slot.0 += 1;
        if fact.compliant {
            slot.1 += 1;
        }
        if fact.recorded_at > slot.2 {
            slot.2 = fact.recorded_at;
        }
    }

    let mut thresholds: HashMap<String, f64> = HashMap::new();
    let mut alerts = Vec::new();
    for ((area, stage), (total, compliant, last_review)) in groups {
        let threshold = match thresholds.get(&area) {
            Some(t) => *t,
            None => {
                let t = get_alert_config(conn, Some(&area))?.critical_threshold;
                thresholds.insert(area.clone(), t);
                t
            }
        };
        let compliance = percentage(compliant, total);
        if compliance < threshold {
            alerts.push(CriticalAlert {
                area,
                stage,
                total,
                compliant,
                compliance,
                threshold,
                severity: severity_for(compliance),
                last_review,
            });
        }
    }

    alerts.sort_by(|a, b| a.compliance.total_cmp(&b.compliance));
    Ok(alerts)
}

pub fn validate_config(config: &AlertConfig) -> Result<(), AlertError> {
    let in_range = |v: f64| (0.0..=100.0).contains(&v);
    if !in_range(config.critical_threshold) || !in_range(config.warning_threshold) {
        return Err(AlertError::InvalidConfig(
            "thresholds must be between 0 and 100".into(),
        ));
    }
    if config.critical_threshold > config.warning_threshold {
        return Err(AlertError::InvalidConfig(
            "critical threshold cannot exceed warning threshold".into(),
        ));
    }
    if !(1..=MAX_INTERVAL_HOURS).contains(&config.interval_hours) {
        return Err(AlertError::InvalidConfig(format!(
            "interval must be between 1 and {MAX_INTERVAL_HOURS} hours"
        )));
    }
    if let Some(bad) = config.extra_emails.iter().find(|e| !is_plausible_email(e)) {
        return Err(AlertError::InvalidConfig(format!("invalid e-mail '{bad}'")));
    }
    Ok(())
}

/// Validate and persist a configuration, returning the stored row.
pub fn save_config(
    conn: &Connection,
    config: &AlertConfig,
    now: &DateTime<Utc>,
) -> Result<AlertConfig, AlertError> {
    let mut config = config.clone();
    config.area = config.area.filter(|a| !a.trim().is_empty());
    validate_config(&config)?;
    save_alert_config(conn, &config, now)?;
    tracing::info!(area = ?config.area, critical = config.critical_threshold, "Alert configuration saved");
    Ok(get_alert_config(conn, config.area.as_deref())?)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AlertRun {
    pub detected: usize,
    pub dispatched: usize,
    pub suppressed: usize,
    pub failed: usize,
}

/// Mail every fresh critical alert to the area's supervisors and the
/// configured extra recipients, then record it in the alert log.
///
/// An alert already dispatched within the configured interval is
/// suppressed, as is any alert whose configuration is inactive.
pub fn process_alerts(
    conn: &Connection,
    notifier: &dyn Notifier,
    now: &DateTime<Utc>,
) -> Result<AlertRun, DatabaseError> {
    let alerts = critical_alerts(conn, None, now)?;
    let mut run = AlertRun {
        detected: alerts.len(),
        ..AlertRun::default()
    };

    for alert in alerts {
        let config = get_alert_config(conn, Some(&alert.area))?;
        if !config.active {
            run.suppressed += 1;
            continue;
        }
        if let Some(last) = last_alert_dispatch(conn, &alert.area, alert.stage)? {
            if *now - last < Duration::hours(i64::from(config.interval_hours)) {
                run.suppressed += 1;
                continue;
            }
        }

        let recipients = recipients_for(conn, &config, &alert.area)?;
        if recipients.is_empty() {
            tracing::warn!(area = %alert.area, stage = %alert.stage, "Critical alert has no recipients");
            run.suppressed += 1;
            continue;
        }

        let message = alert_message(&alert, recipients.clone());
        match notifier.send_mail(&message) {
            Ok(()) => {
                insert_alert_log(
                    conn,
                    &alert.area,
                    alert.stage,
                    alert.compliance,
                    alert.severity,
                    &recipients,
                    now,
                )?;
                run.dispatched += 1;
            }
            Err(e) => {
                tracing::error!(area = %alert.area, stage = %alert.stage, error = %e, "Alert dispatch failed");
                run.failed += 1;
            }
        }
    }

    if run.detected > 0 {
        tracing::info!(
            detected = run.detected,
            dispatched = run.dispatched,
            suppressed = run.suppressed,
            failed = run.failed,
            "Alert run finished"
        );
    }
    Ok(run)
}

fn recipients_for(
    conn: &Connection,
    config: &AlertConfig,
    area: &str,
) -> Result<Vec<String>, DatabaseError> {
    let mut recipients = if config.notify_supervisors {
        supervisor_emails(conn, area)?
    } else {
        Vec::new()
    };
    for email in &config.extra_emails {
        if !recipients.contains(email) {
            recipients.push(email.clone());
        }
    }
    Ok(recipients)
}

fn alert_message(alert: &CriticalAlert, to: Vec<String>) -> MailMessage {
    MailMessage {
        to,
        subject: format!(
            "[MedCheck] {} compliance alert: {} / {}",
            alert.severity, alert.area, alert.stage
        ),
        text: format!(
            "Compliance for the {} stage in {} is {}% over the last {} hours \
             ({} of {} checks), below the {}% threshold.\nLast review: {}.",
            alert.stage,
            alert.area,
            alert.compliance,
            LOOKBACK_HOURS,
            alert.compliant,
            alert.total,
            alert.threshold,
            alert.last_review.format("%Y-%m-%d %H:%M UTC"),
        ),
    }
}

/// Send a test message so an administrator can check mail delivery.
pub fn send_test_alert(notifier: &dyn Notifier, to: &str) -> Result<(), AlertError> {
    if !is_plausible_email(to) {
        return Err(AlertError::InvalidConfig(format!("invalid e-mail '{to}'")));
    }
    notifier.send_mail(&MailMessage {
        to: vec![to.trim().to_string()],
        subject: "[MedCheck] Test alert".into(),
        text: "This is a test of the MedCheck alert system.".into(),
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;
    use crate::notify::testing::RecordingNotifier;
    use chrono::TimeZone;
    use uuid::Uuid;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 8, 12, 22, 0, 0).unwrap()
    }

    fn seed(conn: &mut Connection, area: &str, stage: Stage, compliant: u32, total: u32, age: Duration) {
        let entries: Vec<_> = (0..total)
            .map(|i| NewChecklistEntry {
                submission_id: Uuid::new_v4(),
                recorded_at: now() - age - Duration::minutes(i64::from(i)),
                area: area.into(),
                shift: Shift::Night,
                stage,
                item: format!("item{i}"),
                compliant: i < compliant,
                remarks: None,
                submitted_by: "nurse1".into(),
                metadata: None,
                ten_corrects: TenCorrects::default(),
            })
            .collect();
        insert_entries(conn, &entries).unwrap();
    }

    #[test]
    fn test_critical_alerts_threshold_and_severity() {
        let mut conn = open_memory_database().unwrap();
        seed(&mut conn, "ICU", Stage::Preparation, 4, 10, Duration::hours(1)); // 40%
        seed(&mut conn, "ICU", Stage::Registration, 6, 10, Duration::hours(2)); // 60%
        seed(&mut conn, "ER", Stage::Preparation, 9, 10, Duration::hours(1)); // 90%
        seed(&mut conn, "ER", Stage::Registration, 0, 10, Duration::hours(30)); // too old

        let alerts = critical_alerts(&conn, None, &now()).unwrap();
        assert_eq!(alerts.len(), 2);
        assert_eq!(alerts[0].stage, Stage::Preparation);
        assert_eq!(alerts[0].severity, AlertSeverity::Critical);
        assert_eq!(alerts[1].severity, AlertSeverity::High);
        assert_eq!(alerts[0].last_review, now() - Duration::hours(1));

        let er = critical_alerts(&conn, Some("ER".into()), &now()).unwrap();
        assert!(er.is_empty());
    }

    #[test]
    fn test_area_threshold_override() {
        let mut conn = open_memory_database().unwrap();
        seed(&mut conn, "ER", Stage::Preparation, 8, 10, Duration::hours(1)); // 80%
        assert!(critical_alerts(&conn, None, &now()).unwrap().is_empty());

        let strict = AlertConfig {
            area: Some("ER".into()),
            critical_threshold: 85.0,
            warning_threshold: 95.0,
            ..AlertConfig::default()
        };
        save_config(&conn, &strict, &now()).unwrap();
        let alerts = critical_alerts(&conn, None, &now()).unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].threshold, 85.0);
    }

    #[test]
    fn test_config_validation() {
        let ok = AlertConfig::default();
        assert!(validate_config(&ok).is_ok());

        let inverted = AlertConfig {
            critical_threshold: 90.0,
            warning_threshold: 80.0,
            ..AlertConfig::default()
        };
        assert!(validate_config(&inverted).is_err());

        let out_of_range = AlertConfig {
            warning_threshold: 120.0,
            ..AlertConfig::default()
        };
        assert!(validate_config(&out_of_range).is_err());

        let bad_interval = AlertConfig {
            interval_hours: 0,
            ..AlertConfig::default()
        };
        assert!(validate_config(&bad_interval).is_err());

        let bad_email = AlertConfig {
            extra_emails: vec!["nobody".into()],
            ..AlertConfig::default()
        };
        assert!(validate_config(&bad_email).is_err());
    }

    #[test]
    fn test_process_alerts_dispatches_once_per_interval() {
        let mut conn = open_memory_database().unwrap();
        insert_user(&conn, &test_user("sup", Role::Supervisor, Some("ICU"))).unwrap();
        seed(&mut conn, "ICU", Stage::Preparation, 2, 10, Duration::hours(1));
        let config = AlertConfig {
            extra_emails: vec!["pharmacy@hospital.test".into()],
            ..AlertConfig::default()
        };
        save_config(&conn, &config, &now()).unwrap();

        let notifier = RecordingNotifier::default();
        let run = process_alerts(&conn, &notifier, &now()).unwrap();
        assert_eq!(run.detected, 1);
        assert_eq!(run.dispatched, 1);

        {
            let mails = notifier.mails.lock().unwrap();
            assert_eq!(
                mails[0].to,
                vec!["sup@hospital.test".to_string(), "pharmacy@hospital.test".to_string()]
            );
            assert!(mails[0].subject.contains("critical"));
        }
        assert_eq!(recent_alert_log(&conn, 10).unwrap().len(), 1);

        let again = process_alerts(&conn, &notifier, &(now() + Duration::hours(1))).unwrap();
        assert_eq!(again.dispatched, 0);
        assert_eq!(again.suppressed, 1);
    }

    #[test]
    fn test_inactive_config_suppresses() {
        let mut conn = open_memory_database().unwrap();
        insert_user(&conn, &test_user("sup", Role::Supervisor, Some("ICU"))).unwrap();
        seed(&mut conn, "ICU", Stage::Preparation, 0, 5, Duration::hours(1));
        let off = AlertConfig {
            active: false,
            ..AlertConfig::default()
        };
        save_config(&conn, &off, &now()).unwrap();

        let notifier = RecordingNotifier::default();
        let run = process_alerts(&conn, &notifier, &now()).unwrap();
        assert_eq!(run.suppressed, 1);
        assert!(notifier.mails.lock().unwrap().is_empty());
    }

    #[test]
    fn test_send_test_alert() {
        let notifier = RecordingNotifier::default();
        assert!(send_test_alert(&notifier, "not-mail").is_err());
        send_test_alert(&notifier, "admin@hospital.test").unwrap();
        assert_eq!(notifier.mails.lock().unwrap().len(), 1);
    }
}
