use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{Shift, Stage};

/// One of the ten safety checks verified during medication administration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrectField {
    CorrectPatient,
    CorrectMedication,
    CorrectDose,
    CorrectRoute,
    CorrectTime,
    ExpirationVerified,
    PatientEducation,
    CorrectDocumentation,
    AllergiesVerified,
    PersonalAccountability,
}

impl CorrectField {
    pub const ALL: [CorrectField; 10] = [
        CorrectField::CorrectPatient,
        CorrectField::CorrectMedication,
        CorrectField::CorrectDose,
        CorrectField::CorrectRoute,
        CorrectField::CorrectTime,
        CorrectField::ExpirationVerified,
        CorrectField::PatientEducation,
        CorrectField::CorrectDocumentation,
        CorrectField::AllergiesVerified,
        CorrectField::PersonalAccountability,
    ];

    /// Column name in `checklist_entries`; also the form key.
    pub fn column(&self) -> &'static str {
        match self {
            Self::CorrectPatient => "correct_patient",
            Self::CorrectMedication => "correct_medication",
            Self::CorrectDose => "correct_dose",
            Self::CorrectRoute => "correct_route",
            Self::CorrectTime => "correct_time",
            Self::ExpirationVerified => "expiration_verified",
            Self::PatientEducation => "patient_education",
            Self::CorrectDocumentation => "correct_documentation",
            Self::AllergiesVerified => "allergies_verified",
            Self::PersonalAccountability => "personal_accountability",
        }
    }

    /// Key used by forms recorded before the vocabulary was normalized.
    pub fn legacy_key(&self) -> &'static str {
        match self {
            Self::CorrectPatient => "paciente_correcto",
            Self::CorrectMedication => "medicamento_correcto",
            Self::CorrectDose => "dosis_correcta",
            Self::CorrectRoute => "via_correcta",
            Self::CorrectTime => "hora_correcta",
            Self::ExpirationVerified => "fecha_vencimiento_verificada",
            Self::PatientEducation => "educacion_paciente",
            Self::CorrectDocumentation => "registro_correcto",
            Self::AllergiesVerified => "alergias_verificadas",
            Self::PersonalAccountability => "responsabilidad_personal",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::CorrectPatient => "Correct patient",
            Self::CorrectMedication => "Correct medication",
            Self::CorrectDose => "Correct dose",
            Self::CorrectRoute => "Correct route",
            Self::CorrectTime => "Correct time",
            Self::ExpirationVerified => "Expiration date verified",
            Self::PatientEducation => "Patient education",
            Self::CorrectDocumentation => "Correct documentation",
            Self::AllergiesVerified => "Allergies verified",
            Self::PersonalAccountability => "Personal accountability",
        }
    }

    /// Resolve a form item key (current or legacy) to a field.
    pub fn from_key(key: &str) -> Option<Self> {
        let key = key.trim();
        Self::ALL
            .into_iter()
            .find(|f| f.column() == key || f.legacy_key() == key)
    }
}

/// The ten-corrects flags of one administration entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TenCorrects {
    #[serde(alias = "paciente_correcto")]
    pub correct_patient: bool,
    #[serde(alias = "medicamento_correcto")]
    pub correct_medication: bool,
    #[serde(alias = "dosis_correcta")]
    pub correct_dose: bool,
    #[serde(alias = "via_correcta")]
    pub correct_route: bool,
    #[serde(alias = "hora_correcta")]
    pub correct_time: bool,
    #[serde(alias = "fecha_vencimiento_verificada")]
    pub expiration_verified: bool,
    #[serde(alias = "educacion_paciente")]
    pub patient_education: bool,
    #[serde(alias = "registro_correcto")]
    pub correct_documentation: bool,
    #[serde(alias = "alergias_verificadas")]
    pub allergies_verified: bool,
    #[serde(alias = "responsabilidad_personal")]
    pub personal_accountability: bool,
}

impl TenCorrects {
    pub fn all_correct() -> Self {
        let mut flags = Self::default();
        for field in CorrectField::ALL {
            flags.set(field, true);
        }
        flags
    }

    pub fn get(&self, field: CorrectField) -> bool {
        match field {
            CorrectField::CorrectPatient => self.correct_patient,
            CorrectField::CorrectMedication => self.correct_medication,
            CorrectField::CorrectDose => self.correct_dose,
            CorrectField::CorrectRoute => self.correct_route,
            CorrectField::CorrectTime => self.correct_time,
            CorrectField::ExpirationVerified => self.expiration_verified,
            CorrectField::PatientEducation => self.patient_education,
            CorrectField::CorrectDocumentation => self.correct_documentation,
            CorrectField::AllergiesVerified => self.allergies_verified,
            CorrectField::PersonalAccountability => self.personal_accountability,
        }
    }

    pub fn set(&mut self, field: CorrectField, value: bool) {
        let slot = match field {
            CorrectField::CorrectPatient => &mut self.correct_patient,
            CorrectField::CorrectMedication => &mut self.correct_medication,
            CorrectField::CorrectDose => &mut self.correct_dose,
            CorrectField::CorrectRoute => &mut self.correct_route,
            CorrectField::CorrectTime => &mut self.correct_time,
            CorrectField::ExpirationVerified => &mut self.expiration_verified,
            CorrectField::PatientEducation => &mut self.patient_education,
            CorrectField::CorrectDocumentation => &mut self.correct_documentation,
            CorrectField::AllergiesVerified => &mut self.allergies_verified,
            CorrectField::PersonalAccountability => &mut self.personal_accountability,
        };
        *slot = value;
    }

    pub fn with(mut self, field: CorrectField, value: bool) -> Self {
        self.set(field, value);
        self
    }

    pub fn all_true(&self) -> bool {
        CorrectField::ALL.into_iter().all(|f| self.get(f))
    }

    pub fn any_false(&self) -> bool {
        !self.all_true()
    }

    /// Derive flags from an administration item map. Missing keys are false.
    pub fn from_items(items: &BTreeMap<String, bool>) -> Self {
        let mut flags = Self::default();
        for (key, value) in items {
            if let Some(field) = CorrectField::from_key(key) {
                flags.set(field, *value);
            }
        }
        flags
    }
}

/// A stored checklist row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChecklistEntry {
    pub id: i64,
    pub submission_id: Uuid,
    pub recorded_at: DateTime<Utc>,
    pub area: String,
    pub shift: Shift,
    pub stage: Stage,
    pub item: String,
    pub compliant: bool,
    pub remarks: Option<String>,
    pub submitted_by: String,
    pub metadata: Option<serde_json::Value>,
    pub ten_corrects: TenCorrects,
}

/// A checklist row about to be written.
#[derive(Debug, Clone)]
pub struct NewChecklistEntry {
    pub submission_id: Uuid,
    pub recorded_at: DateTime<Utc>,
    pub area: String,
    pub shift: Shift,
    pub stage: Stage,
    pub item: String,
    pub compliant: bool,
    pub remarks: Option<String>,
    pub submitted_by: String,
    pub metadata: Option<serde_json::Value>,
    pub ten_corrects: TenCorrects,
}

/// Nested checklist form as posted by the nurse UI.
///
/// Stage and shift stay strings here so that unknown values are
/// reported as validation errors instead of body rejections.
#[derive(Debug, Clone, Deserialize)]
pub struct ChecklistForm {
    pub area: String,
    #[serde(alias = "turno")]
    pub shift: String,
    pub items: BTreeMap<String, BTreeMap<String, bool>>,
    #[serde(default, alias = "observaciones")]
    pub remarks: Option<String>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
    #[serde(default)]
    pub ten_corrects: Option<TenCorrects>,
}
