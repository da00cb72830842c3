use serde::Serialize;

use crate::models::Stage;
use crate::reporting::ComplianceSummary;

const EXCELLENT_FLOOR: f64 = 90.0;
const IMPROVE_FLOOR: f64 = 70.0;
const STAGE_GOOD_FLOOR: f64 = 85.0;
const STAGE_FOCUS_FLOOR: f64 = 80.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    Critical,
    Warning,
    Success,
    Info,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub kind: RecommendationKind,
    pub title: String,
    pub description: String,
}

/// Spoken summary of a compliance report.
pub fn narrate_summary(summary: &ComplianceSummary) -> String {
    if !summary.has_data() {
        return "There are no checklist records for this period.".to_string();
    }

    let tone = if summary.percentage >= EXCELLENT_FLOOR {
        "Excellent work."
    } else if summary.percentage >= IMPROVE_FLOOR {
        "Good performance, but there is room to improve."
    } else {
        "Attention: immediate action is required."
    };

    let mut text = format!(
        "{tone} Overall compliance is {}%. {} of {} checks were completed.",
        summary.percentage, summary.compliant_records, summary.total_records
    );

    if !summary.by_stage.is_empty() {
        text.push_str(" Now by stage.");
        for group in &summary.by_stage {
            let stage = group.key.as_str();
            let p = group.percentage;
            let sentence = if p < IMPROVE_FLOOR {
                format!(" In {stage}, compliance is critical at {p}%.")
            } else if p < STAGE_GOOD_FLOOR {
                format!(" In {stage}, compliance is {p}%, we can do better.")
            } else {
                format!(" In {stage}, we are doing well at {p}%.")
            };
            text.push_str(&sentence);
        }
    }
    text
}

/// Actionable recommendations derived from a summary.
pub fn recommendations(summary: &ComplianceSummary) -> Vec<Recommendation> {
    let mut recs = Vec::new();
    if !summary.has_data() {
        return recs;
    }

    recs.push(if summary.percentage < IMPROVE_FLOOR {
        Recommendation {
            kind: RecommendationKind::Critical,
            title: "Immediate action required".into(),
            description: "Compliance is below 70%. Hold an urgent team meeting to identify \
                          barriers and agree an action plan."
                .into(),
        }
    } else if summary.percentage < STAGE_GOOD_FLOOR {
        Recommendation {
            kind: RecommendationKind::Warning,
            title: "Continuous improvement needed".into(),
            description: "Compliance can improve. Consider refresher sessions and more \
                          frequent monitoring."
                .into(),
        }
    } else {
        Recommendation {
            kind: RecommendationKind::Success,
            title: "Excellent performance".into(),
            description: "The team keeps high standards. Keep the good practices and share \
                          them with other units."
                .into(),
        }
    });

    for group in &summary.by_stage {
        let stage = group.key.as_str();
        let p = group.percentage;
        if p < IMPROVE_FLOOR {
            recs.push(Recommendation {
                kind: RecommendationKind::Critical,
                title: format!("Reinforce {stage}"),
                description: format!(
                    "The {stage} stage is at {p}%. Review the protocol, train staff and \
                     increase supervision."
                ),
            });
        } else if p < STAGE_GOOD_FLOOR {
            recs.push(Recommendation {
                kind: RecommendationKind::Warning,
                title: format!("Optimise {stage}"),
                description: format!(
                    "{stage} has room to improve ({p}%). Consider visual reminders or a \
                     digital checklist."
                ),
            });
        }
    }

    if stage_below(summary, Stage::Prescription, STAGE_FOCUS_FLOOR) {
        recs.push(Recommendation {
            kind: RecommendationKind::Info,
            title: "Prescription double check".into(),
            description: "Introduce a second verification of prescriptions and review the \
                          legibility of medical orders."
                .into(),
        });
    }
    if stage_below(summary, Stage::Administration, STAGE_FOCUS_FLOOR) {
        recs.push(Recommendation {
            kind: RecommendationKind::Info,
            title: "Administration protocol".into(),
            description: "Reinforce the ten corrects at the bedside: patient, medication, \
                          dose, route and time first."
                .into(),
        });
    }
    recs
}

fn stage_below(summary: &ComplianceSummary, stage: Stage, floor: f64) -> bool {
    summary
        .by_stage
        .iter()
        .any(|g| g.key == stage && g.percentage < floor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporting::ComplianceGroup;

    fn summary(percentage: f64, stages: &[(Stage, f64)]) -> ComplianceSummary {
        ComplianceSummary {
            total_records: 100,
            compliant_records: percentage as u32,
            percentage,
            distinct_areas: 1,
            distinct_stages: stages.len() as u32,
            distinct_users: 1,
            by_area: Vec::new(),
            by_stage: stages
                .iter()
                .map(|(stage, p)| ComplianceGroup {
                    key: *stage,
                    total: 20,
                    compliant: 0,
                    percentage: *p,
                })
                .collect(),
            by_day: Vec::new(),
        }
    }

    #[test]
    fn test_tone_follows_overall_compliance() {
        assert!(narrate_summary(&summary(95.0, &[])).starts_with("Excellent work."));
        assert!(narrate_summary(&summary(75.0, &[])).starts_with("Good performance"));
        assert!(narrate_summary(&summary(40.0, &[])).starts_with("Attention"));
    }

    #[test]
    fn test_stage_sentences() {
        let text = narrate_summary(&summary(
            80.0,
            &[(Stage::Preparation, 60.0), (Stage::Registration, 95.0)],
        ));
        assert!(text.contains("In preparation, compliance is critical at 60%."));
        assert!(text.contains("In registration, we are doing well at 95%."));
    }

    #[test]
    fn test_empty_summary_narration() {
        let mut s = summary(0.0, &[]);
        s.total_records = 0;
        assert!(narrate_summary(&s).contains("no checklist records"));
        assert!(recommendations(&s).is_empty());
    }

    #[test]
    fn test_recommendations_flag_weak_stages() {
        let recs = recommendations(&summary(
            65.0,
            &[(Stage::Administration, 50.0), (Stage::Transcription, 82.0)],
        ));
        assert_eq!(recs[0].kind, RecommendationKind::Critical);
        assert!(recs.iter().any(|r| r.title == "Reinforce administration"));
        assert!(recs.iter().any(|r| r.title == "Optimise transcription"));
        assert!(recs.iter().any(|r| r.title == "Administration protocol"));
        assert!(!recs.iter().any(|r| r.title == "Prescription double check"));
    }
}
