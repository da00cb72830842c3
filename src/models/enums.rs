use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $s)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$(Self::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

// Variant order is workflow order; grouping output sorts by it.
str_enum!(Stage {
    Prescription => "prescription",
    Transcription => "transcription",
    Preparation => "preparation",
    Administration => "administration",
    Registration => "registration",
});

str_enum!(Shift {
    Morning => "morning",
    Afternoon => "afternoon",
    Night => "night",
});

str_enum!(Role {
    Nurse => "nurse",
    Supervisor => "supervisor",
    Admin => "admin",
});

str_enum!(AlertSeverity {
    High => "high",
    Critical => "critical",
});

str_enum!(AuditStatus {
    Success => "success",
    Failure => "failure",
    Warning => "warning",
});

impl Stage {
    /// Accepts the vocabulary used by legacy form payloads as well.
    pub fn parse_lenient(s: &str) -> Result<Self, DatabaseError> {
        let normalized = s.trim().to_lowercase();
        let canonical = match normalized.as_str() {
            "prescripcion" | "prescripción" => "prescription",
            "transcripcion" | "transcripción" => "transcription",
            "preparacion" | "preparación" => "preparation",
            "administracion" | "administración" => "administration",
            "registro" => "registration",
            other => other,
        };
        canonical.parse()
    }
}

impl Shift {
    /// Accepts the vocabulary used by legacy form payloads as well.
    pub fn parse_lenient(s: &str) -> Result<Self, DatabaseError> {
        let normalized = s.trim().to_lowercase();
        let canonical = match normalized.as_str() {
            "manana" | "mañana" => "morning",
            "tarde" => "afternoon",
            "noche" => "night",
            other => other,
        };
        canonical.parse()
    }
}

impl Role {
    /// Supervisors and admins may read indicators and reports.
    pub fn can_view_reports(&self) -> bool {
        matches!(self, Role::Supervisor | Role::Admin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn stage_round_trip() {
        for (variant, s) in [
            (Stage::Prescription, "prescription"),
            (Stage::Transcription, "transcription"),
            (Stage::Preparation, "preparation"),
            (Stage::Administration, "administration"),
            (Stage::Registration, "registration"),
        ] {
            assert_eq!(variant.as_str(), s);
            assert_eq!(Stage::from_str(s).unwrap(), variant);
        }
    }

    #[test]
    fn legacy_vocabulary_is_accepted() {
        assert_eq!(Stage::parse_lenient("administracion").unwrap(), Stage::Administration);
        assert_eq!(Stage::parse_lenient(" Registro ").unwrap(), Stage::Registration);
        assert_eq!(Shift::parse_lenient("mañana").unwrap(), Shift::Morning);
        assert_eq!(Shift::parse_lenient("noche").unwrap(), Shift::Night);
    }

    #[test]
    fn serde_uses_wire_names() {
        let json = serde_json::to_string(&Shift::Afternoon).unwrap();
        assert_eq!(json, "\"afternoon\"");
        let stage: Stage = serde_json::from_str("\"administration\"").unwrap();
        assert_eq!(stage, Stage::Administration);
    }

    #[test]
    fn only_supervisors_and_admins_view_reports() {
        assert!(!Role::Nurse.can_view_reports());
        assert!(Role::Supervisor.can_view_reports());
        assert!(Role::Admin.can_view_reports());
    }

    #[test]
    fn invalid_enum_returns_error() {
        assert!(Stage::from_str("dispensing").is_err());
        assert!(Shift::parse_lenient("evening").is_err());
        assert!(Role::from_str("").is_err());
    }
}
