use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use super::grouping::*;
use crate::db::repository::fetch_entry_facts;
use crate::db::DatabaseError;
use crate::indicators::{percentage, round2};
use crate::models::*;

pub const CRITICAL_ITEM_THRESHOLD: f64 = 80.0;
pub const CRITICAL_ITEM_MIN_RECORDS: u32 = 5;
pub const MAX_CRITICAL_ITEMS: usize = 10;
pub const ANOMALY_RATIO: f64 = 0.8;
pub const MAX_ANOMALIES: usize = 10;
pub const SUMMARY_DAYS: usize = 30;

/// Reporting period shorthand.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Period {
    #[default]
    #[serde(rename = "7d")]
    Last7Days,
    #[serde(rename = "30d")]
    Last30Days,
    #[serde(rename = "90d")]
    Last90Days,
}

impl Period {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "7d" => Some(Self::Last7Days),
            "30d" => Some(Self::Last30Days),
            "90d" => Some(Self::Last90Days),
            _ => None,
        }
    }

    pub fn days(&self) -> i64 {
        match self {
            Self::Last7Days => 7,
            Self::Last30Days => 30,
            Self::Last90Days => 90,
        }
    }

    /// Filter covering the period up to and including `now`.
    pub fn filter(&self, now: &DateTime<Utc>, area: Option<String>) -> EntryFilter {
        EntryFilter::between(
            *now - Duration::days(self.days()),
            *now + Duration::seconds(1),
        )
        .in_area(area)
    }
}

/// Area a caller may report on. Admins see what they ask for; supervisors
/// default to their own area; everyone else is pinned to theirs.
pub fn scoped_area(role: Role, own_area: Option<&str>, requested: Option<String>) -> Option<String> {
    let requested = requested.filter(|a| !a.trim().is_empty());
    match role {
        Role::Admin => requested,
        Role::Supervisor => requested.or_else(|| own_area.map(String::from)),
        Role::Nurse => own_area.map(String::from),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceSummary {
    pub total_records: u32,
    pub compliant_records: u32,
    pub percentage: f64,
    pub distinct_areas: u32,
    pub distinct_stages: u32,
    pub distinct_users: u32,
    pub by_area: Vec<ComplianceGroup<String>>,
    pub by_stage: Vec<ComplianceGroup<Stage>>,
    /// Newest day first, at most 30 days.
    pub by_day: Vec<ComplianceGroup<NaiveDate>>,
}

impl ComplianceSummary {
    pub fn has_data(&self) -> bool {
        self.total_records > 0
    }
}

pub fn compliance_summary(
    conn: &Connection,
    filter: &EntryFilter,
) -> Result<ComplianceSummary, DatabaseError> {
    let facts = fetch_entry_facts(conn, filter)?;

    let total = facts.len() as u32;
    let compliant = facts.iter().filter(|f| f.compliant).count() as u32;
    let areas: BTreeSet<&str> = facts.iter().map(|f| f.area.as_str()).collect();
    let stages: BTreeSet<Stage> = facts.iter().map(|f| f.stage).collect();
    let users: BTreeSet<&str> = facts.iter().map(|f| f.submitted_by.as_str()).collect();

    let mut by_day = group_by(&facts, |f| f.recorded_at.date_naive());
    by_day.reverse();
    by_day.truncate(SUMMARY_DAYS);

    Ok(ComplianceSummary {
        total_records: total,
        compliant_records: compliant,
        percentage: percentage(compliant, total),
        distinct_areas: areas.len() as u32,
        distinct_stages: stages.len() as u32,
        distinct_users: users.len() as u32,
        by_area: group_by(&facts, |f| f.area.clone()),
        by_stage: group_by(&facts, |f| f.stage),
        by_day,
    })
}

/// Items below `threshold` with enough records to matter, worst first.
pub fn critical_items(
    conn: &Connection,
    filter: &EntryFilter,
    threshold: f64,
) -> Result<Vec<ComplianceGroup<ItemKey>>, DatabaseError> {
    let facts = fetch_entry_facts(conn, filter)?;
    let mut items: Vec<_> = group_by(&facts, |f| ItemKey {
        area: f.area.clone(),
        stage: f.stage,
        item: f.item.clone(),
    })
    .into_iter()
    .filter(|g| g.total >= CRITICAL_ITEM_MIN_RECORDS && g.percentage < threshold)
    .collect();

    items.sort_by(|a, b| {
        a.percentage
            .total_cmp(&b.percentage)
            .then_with(|| b.total.cmp(&a.total))
    });
    items.truncate(MAX_CRITICAL_ITEMS);
    Ok(items)
}

/// Compliance by shift within each area.
pub fn shift_comparison(
    conn: &Connection,
    filter: &EntryFilter,
) -> Result<Vec<ComplianceGroup<ShiftAreaKey>>, DatabaseError> {
    let facts = fetch_entry_facts(conn, filter)?;
    Ok(group_by(&facts, |f| ShiftAreaKey {
        area: f.area.clone(),
        shift: f.shift,
    }))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    pub area: String,
    pub stage: Stage,
    pub recent_percentage: f64,
    pub recent_records: u32,
    pub baseline_percentage: f64,
    pub gap: f64,
}

/// (area, stage) pairs whose last-7-day compliance fell below 80 % of
/// the area's 30-day average. Largest gap first.
pub fn anomalies(
    conn: &Connection,
    area: Option<String>,
    now: &DateTime<Utc>,
) -> Result<Vec<Anomaly>, DatabaseError> {
    let baseline_facts = fetch_entry_facts(conn, &Period::Last30Days.filter(now, area.clone()))?;
    let recent_facts = fetch_entry_facts(conn, &Period::Last7Days.filter(now, area))?;

    let baselines: HashMap<String, f64> = group_by(&baseline_facts, |f| f.area.clone())
        .into_iter()
        .map(|g| (g.key, g.percentage))
        .collect();

    let mut found: Vec<Anomaly> = group_by(&recent_facts, |f| AreaStageKey {
        area: f.area.clone(),
        stage: f.stage,
    })
    .into_iter()
    .filter_map(|g| {
        let baseline = *baselines.get(&g.key.area)?;
        if g.percentage < baseline * ANOMALY_RATIO {
            Some(Anomaly {
                gap: round2(baseline - g.percentage),
                area: g.key.area,
                stage: g.key.stage,
                recent_percentage: g.percentage,
                recent_records: g.total,
                baseline_percentage: baseline,
            })
        } else {
            None
        }
    })
    .collect();

    found.sort_by(|a, b| b.gap.total_cmp(&a.gap));
    found.truncate(MAX_ANOMALIES);
    Ok(found)
}
