//! Compliance reporting over stored checklist entries: summaries grouped
//! by area, stage and day, critical items, shift comparison and anomaly
//! detection. Every aggregate is built by the one `group_by` utility.

mod grouping;
mod summary;

pub use grouping::*;
pub use summary::*;

// ── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;
    use crate::db::repository::insert_entries;
    use crate::models::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use rusqlite::Connection;
    use uuid::Uuid;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, 15, 20, 0, 0).unwrap()
    }

    struct Row<'a> {
        area: &'a str,
        shift: Shift,
        stage: Stage,
        item: &'a str,
        compliant: bool,
        user: &'a str,
        age: Duration,
    }

    fn row<'a>(area: &'a str, stage: Stage, item: &'a str, compliant: bool, age: Duration) -> Row<'a> {
        Row {
            area,
            shift: Shift::Morning,
            stage,
            item,
            compliant,
            user: "nurse1",
            age,
        }
    }

    fn seed(conn: &mut Connection, rows: &[Row<'_>]) {
        let entries: Vec<_> = rows
            .iter()
            .map(|r| NewChecklistEntry {
                submission_id: Uuid::new_v4(),
                recorded_at: now() - r.age,
                area: r.area.into(),
                shift: r.shift,
                stage: r.stage,
                item: r.item.into(),
                compliant: r.compliant,
                remarks: None,
                submitted_by: r.user.into(),
                metadata: None,
                ten_corrects: TenCorrects::default(),
            })
            .collect();
        insert_entries(conn, &entries).unwrap();
    }

    fn hours(h: i64) -> Duration {
        Duration::hours(h)
    }

    // ── Summary ────────────────────────────────────────────────────────

    #[test]
    fn test_summary_totals_and_groups() {
        let mut conn = open_memory_database().unwrap();
        let mut second_user = row("ER", Stage::Registration, "signed", false, Duration::days(1));
        second_user.user = "nurse2";
        seed(
            &mut conn,
            &[
                row("ICU", Stage::Preparation, "labelled", true, hours(1)),
                row("ICU", Stage::Preparation, "labelled", false, hours(2)),
                row("ICU", Stage::Administration, "witnessed", true, hours(3)),
                second_user,
            ],
        );

        let summary = compliance_summary(&conn, &Period::Last7Days.filter(&now(), None)).unwrap();
        assert_eq!(summary.total_records, 4);
        assert_eq!(summary.compliant_records, 2);
        assert_eq!(summary.percentage, 50.0);
        assert_eq!(summary.distinct_areas, 2);
        assert_eq!(summary.distinct_stages, 3);
        assert_eq!(summary.distinct_users, 2);

        assert_eq!(summary.by_area[0].key, "ER");
        assert_eq!(summary.by_area[1].key, "ICU");
        assert_eq!(summary.by_area[1].percentage, 66.67);

        assert_eq!(summary.by_stage[0].key, Stage::Preparation);
        assert_eq!(summary.by_stage[0].non_compliant(), 1);

        assert_eq!(summary.by_day.len(), 2);
        assert!(summary.by_day[0].key > summary.by_day[1].key, "newest day first");
    }

    #[test]
    fn test_summary_respects_area_and_period() {
        let mut conn = open_memory_database().unwrap();
        seed(
            &mut conn,
            &[
                row("ICU", Stage::Preparation, "labelled", true, hours(1)),
                row("ER", Stage::Preparation, "labelled", true, hours(1)),
                row("ICU", Stage::Preparation, "labelled", false, Duration::days(20)),
            ],
        );

        let week = compliance_summary(&conn, &Period::Last7Days.filter(&now(), Some("ICU".into())))
            .unwrap();
        assert_eq!(week.total_records, 1);

        let month = compliance_summary(&conn, &Period::Last30Days.filter(&now(), Some("ICU".into())))
            .unwrap();
        assert_eq!(month.total_records, 2);
    }

    #[test]
    fn test_empty_summary() {
        let conn = open_memory_database().unwrap();
        let summary = compliance_summary(&conn, &EntryFilter::default()).unwrap();
        assert!(!summary.has_data());
        assert_eq!(summary.percentage, 0.0);
        assert!(summary.by_area.is_empty());
    }

    // ── Critical items ─────────────────────────────────────────────────

    #[test]
    fn test_critical_items_need_five_records_and_sort_worst_first() {
        let mut conn = open_memory_database().unwrap();
        let mut rows = Vec::new();
        // 5 records, 40%
        for i in 0..5 {
            rows.push(row("ICU", Stage::Preparation, "labelled", i < 2, hours(i + 1)));
        }
        // 6 records, 50%
        for i in 0..6 {
            rows.push(row("ICU", Stage::Registration, "signed", i < 3, hours(i + 1)));
        }
        // 4 records, 0%: too few
        for i in 0..4 {
            rows.push(row("ER", Stage::Transcription, "legible", false, hours(i + 1)));
        }
        // 5 records, 100%
        for i in 0..5 {
            rows.push(row("ER", Stage::Prescription, "dated", true, hours(i + 1)));
        }
        seed(&mut conn, &rows);

        let critical = critical_items(&conn, &EntryFilter::default(), CRITICAL_ITEM_THRESHOLD).unwrap();
        assert_eq!(critical.len(), 2);
        assert_eq!(critical[0].key.item, "labelled");
        assert_eq!(critical[0].percentage, 40.0);
        assert_eq!(critical[1].key.item, "signed");
    }

    // ── Shifts ─────────────────────────────────────────────────────────

    #[test]
    fn test_shift_comparison_orders_by_area_then_shift() {
        let mut conn = open_memory_database().unwrap();
        let mut night = row("ICU", Stage::Preparation, "labelled", false, hours(1));
        night.shift = Shift::Night;
        let mut er_night = row("ER", Stage::Preparation, "labelled", true, hours(1));
        er_night.shift = Shift::Night;
        seed(
            &mut conn,
            &[
                night,
                row("ICU", Stage::Preparation, "labelled", true, hours(2)),
                er_night,
            ],
        );

        let shifts = shift_comparison(&conn, &EntryFilter::default()).unwrap();
        let keys: Vec<_> = shifts.iter().map(|g| (g.key.area.as_str(), g.key.shift)).collect();
        assert_eq!(
            keys,
            vec![("ER", Shift::Night), ("ICU", Shift::Morning), ("ICU", Shift::Night)]
        );
        assert_eq!(shifts[2].percentage, 0.0);
    }

    // ── Anomalies ──────────────────────────────────────────────────────

    #[test]
    fn test_anomaly_when_week_drops_below_baseline() {
        let mut conn = open_memory_database().unwrap();
        let mut rows = Vec::new();
        // Baseline: 20 compliant preparation rows two weeks ago
        for i in 0..20 {
            rows.push(row("ICU", Stage::Preparation, "labelled", true, Duration::days(14) + hours(i)));
        }
        // This week: registration collapses to 25%
        for i in 0..4 {
            rows.push(row("ICU", Stage::Registration, "signed", i == 0, hours(i + 1)));
        }
        // This week: preparation stays perfect
        rows.push(row("ICU", Stage::Preparation, "labelled", true, hours(1)));
        seed(&mut conn, &rows);

        let found = anomalies(&conn, None, &now()).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].stage, Stage::Registration);
        assert_eq!(found[0].recent_percentage, 25.0);
        assert!(found[0].baseline_percentage > 80.0);
        assert!(found[0].gap > 0.0);
    }

    #[test]
    fn test_no_anomaly_on_stable_compliance() {
        let mut conn = open_memory_database().unwrap();
        let rows: Vec<_> = (0..10)
            .map(|i| row("ER", Stage::Preparation, "labelled", i % 2 == 0, Duration::days(i)))
            .collect();
        seed(&mut conn, &rows);
        assert!(anomalies(&conn, Some("ER".into()), &now()).unwrap().is_empty());
    }

    // ── Scoping / periods ──────────────────────────────────────────────

    #[test]
    fn test_scoped_area_by_role() {
        assert_eq!(scoped_area(Role::Admin, Some("ICU"), None), None);
        assert_eq!(scoped_area(Role::Admin, None, Some("ER".into())), Some("ER".into()));
        assert_eq!(scoped_area(Role::Supervisor, Some("ICU"), None), Some("ICU".into()));
        assert_eq!(
            scoped_area(Role::Supervisor, Some("ICU"), Some("ER".into())),
            Some("ER".into())
        );
        assert_eq!(scoped_area(Role::Nurse, Some("ICU"), Some("ER".into())), Some("ICU".into()));
    }

    #[test]
    fn test_period_parsing() {
        assert_eq!(Period::parse("30d"), Some(Period::Last30Days));
        assert_eq!(Period::parse("1y"), None);
        assert_eq!(Period::default(), Period::Last7Days);
        assert_eq!(Period::Last90Days.days(), 90);
    }
}
