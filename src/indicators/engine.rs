use chrono::{DateTime, Duration, Utc};
use rusqlite::Connection;

use super::types::*;
use crate::db::repository::{administration_counts, AdministrationCounts};
use crate::db::DatabaseError;
use crate::models::CorrectField;

/// Exclusive upper bound shared by every indicator window: one second
/// past `now` at storage precision, so an entry stamped at `now` counts.
fn window_end(now: &DateTime<Utc>) -> DateTime<Utc> {
    *now + Duration::seconds(1)
}

/// Trailing window `[end - days, end)` with `end = window_end(now)`.
pub fn trailing_window(now: &DateTime<Utc>, days: u32) -> (DateTime<Utc>, DateTime<Utc>) {
    let end = window_end(now);
    (end - Duration::days(i64::from(days)), end)
}

pub fn compute_clmc(
    conn: &Connection,
    window_days: u32,
    now: &DateTime<Utc>,
) -> Result<IndicatorResult, DatabaseError> {
    let (from, to) = trailing_window(now, window_days);
    let counts = administration_counts(conn, &from, &to)?;
    Ok(clmc_from_counts(&counts, window_days))
}

pub fn compute_teaem(
    conn: &Connection,
    window_days: u32,
    now: &DateTime<Utc>,
) -> Result<IndicatorResult, DatabaseError> {
    let (from, to) = trailing_window(now, window_days);
    let counts = administration_counts(conn, &from, &to)?;
    Ok(teaem_from_counts(&counts, window_days))
}

pub fn per_field_breakdown(
    conn: &Connection,
    window_days: u32,
    now: &DateTime<Utc>,
) -> Result<Vec<FieldCompliance>, DatabaseError> {
    let (from, to) = trailing_window(now, window_days);
    let counts = administration_counts(conn, &from, &to)?;
    Ok(fields_from_counts(&counts))
}

/// CLMC and TEAEM per 7-day bucket, oldest bucket first.
pub fn weekly_trend(
    conn: &Connection,
    num_weeks: u32,
    now: &DateTime<Utc>,
) -> Result<WeeklyTrend, DatabaseError> {
    let mut trend = WeeklyTrend {
        week_labels: Vec::with_capacity(num_weeks as usize),
        clmc_series: Vec::with_capacity(num_weeks as usize),
        teaem_series: Vec::with_capacity(num_weeks as usize),
    };

    for (label, start, end) in week_buckets(now, num_weeks) {
        let counts = administration_counts(conn, &start, &end)?;
        trend.week_labels.push(label);
        trend.clmc_series.push(percentage(counts.all_correct, counts.total));
        trend.teaem_series.push(percentage(counts.any_incorrect, counts.total));
    }
    Ok(trend)
}

/// Bucket `i` covers `[end - 7i days, end - 7(i-1) days)`, for
/// `i = num_weeks..=1`, with the same `end` as `trailing_window`. The
/// most recent bucket is exactly the 7-day trailing window.
pub fn week_buckets(
    now: &DateTime<Utc>,
    num_weeks: u32,
) -> Vec<(String, DateTime<Utc>, DateTime<Utc>)> {
    let end = window_end(now);
    (1..=num_weeks)
        .rev()
        .map(|i| {
            let i = i64::from(i);
            (
                format!("week -{i}"),
                end - Duration::days(7 * i),
                end - Duration::days(7 * (i - 1)),
            )
        })
        .collect()
}

pub fn indicator_summary(
    conn: &Connection,
    window_days: u32,
    now: &DateTime<Utc>,
) -> Result<IndicatorSummary, DatabaseError> {
    let (from, to) = trailing_window(now, window_days);
    let counts = administration_counts(conn, &from, &to)?;
    let trend = weekly_trend(conn, DEFAULT_TREND_WEEKS, now)?;

    tracing::debug!(
        window_days,
        total = counts.total,
        all_correct = counts.all_correct,
        "Computed indicator summary"
    );

    Ok(IndicatorSummary {
        clmc: clmc_from_counts(&counts, window_days),
        teaem: teaem_from_counts(&counts, window_days),
        per_field: fields_from_counts(&counts),
        trend,
    })
}

fn clmc_from_counts(counts: &AdministrationCounts, window_days: u32) -> IndicatorResult {
    let value = percentage(counts.all_correct, counts.total);
    let band = ThresholdBand::for_clmc(value);
    IndicatorResult {
        indicator: IndicatorKind::Clmc,
        value,
        numerator: counts.all_correct,
        denominator: counts.total,
        threshold_band: band,
        band_label: band.label().to_string(),
        colour: band.colour().to_string(),
        target: CLMC_TARGET,
        window_days,
        has_data: counts.total > 0,
    }
}

fn teaem_from_counts(counts: &AdministrationCounts, window_days: u32) -> IndicatorResult {
    let value = percentage(counts.any_incorrect, counts.total);
    let band = ThresholdBand::for_teaem(value);
    IndicatorResult {
        indicator: IndicatorKind::Teaem,
        value,
        numerator: counts.any_incorrect,
        denominator: counts.total,
        threshold_band: band,
        band_label: band.label().to_string(),
        colour: band.colour().to_string(),
        target: TEAEM_TARGET,
        window_days,
        has_data: counts.total > 0,
    }
}

fn fields_from_counts(counts: &AdministrationCounts) -> Vec<FieldCompliance> {
    CorrectField::ALL
        .iter()
        .zip(counts.per_field)
        .map(|(field, true_count)| FieldCompliance {
            field: *field,
            field_name: field.column().to_string(),
            label: field.label().to_string(),
            true_count,
            total: counts.total,
            percentage: percentage(true_count, counts.total),
        })
        .collect()
}
