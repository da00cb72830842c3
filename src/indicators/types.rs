use serde::{Deserialize, Serialize};

use crate::models::CorrectField;

pub const CLMC_TARGET: f64 = 90.0;
pub const CLMC_ALERT_FLOOR: f64 = 80.0;
pub const TEAEM_TARGET: f64 = 2.0;
pub const TEAEM_ACCEPTABLE_CEILING: f64 = 5.0;

pub const DEFAULT_WINDOW_DAYS: u32 = 30;
pub const DEFAULT_TREND_WEEKS: u32 = 4;
pub const MAX_WINDOW_DAYS: u32 = 3650;
pub const MAX_TREND_WEEKS: u32 = 52;

/// Interpretation band of an indicator value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdBand {
    Optimal,
    AlertZone,
    OutOfControl,
    Excellence,
    AcceptableWithMonitoring,
    Unacceptable,
}

impl ThresholdBand {
    pub fn for_clmc(value: f64) -> Self {
        if value >= CLMC_TARGET {
            Self::Optimal
        } else if value >= CLMC_ALERT_FLOOR {
            Self::AlertZone
        } else {
            Self::OutOfControl
        }
    }

    pub fn for_teaem(value: f64) -> Self {
        if value <= TEAEM_TARGET {
            Self::Excellence
        } else if value <= TEAEM_ACCEPTABLE_CEILING {
            Self::AcceptableWithMonitoring
        } else {
            Self::Unacceptable
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Optimal => "optimal",
            Self::AlertZone => "alert zone",
            Self::OutOfControl => "out of control",
            Self::Excellence => "excellence",
            Self::AcceptableWithMonitoring => "acceptable with monitoring",
            Self::Unacceptable => "unacceptable",
        }
    }

    /// Dashboard colour hint.
    pub fn colour(&self) -> &'static str {
        match self {
            Self::Optimal | Self::Excellence => "green",
            Self::AlertZone | Self::AcceptableWithMonitoring => "amber",
            Self::OutOfControl | Self::Unacceptable => "red",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IndicatorKind {
    Clmc,
    Teaem,
}

impl std::fmt::Display for IndicatorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Clmc => write!(f, "CLMC"),
            Self::Teaem => write!(f, "TEAEM"),
        }
    }
}

/// A ratio indicator over a trailing window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorResult {
    pub indicator: IndicatorKind,
    pub value: f64,
    pub numerator: u32,
    pub denominator: u32,
    pub threshold_band: ThresholdBand,
    pub band_label: String,
    pub colour: String,
    pub target: f64,
    pub window_days: u32,
    pub has_data: bool,
}

/// True-ratio of one correct-field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldCompliance {
    pub field: CorrectField,
    pub field_name: String,
    pub label: String,
    pub true_count: u32,
    pub total: u32,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyTrend {
    pub week_labels: Vec<String>,
    pub clmc_series: Vec<f64>,
    pub teaem_series: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSummary {
    pub clmc: IndicatorResult,
    pub teaem: IndicatorResult,
    pub per_field: Vec<FieldCompliance>,
    pub trend: WeeklyTrend,
}

/// Percentage rounded to two decimals; zero when `denominator` is zero.
pub fn percentage(numerator: u32, denominator: u32) -> f64 {
    if denominator == 0 {
        return 0.0;
    }
    round2(numerator as f64 / denominator as f64 * 100.0)
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
