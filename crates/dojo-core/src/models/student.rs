use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::store::{Entity, EntityKind};

/// Calendar year -> accumulated points. Keys travel as strings in JSON.
pub type PointsByYear = BTreeMap<i32, u32>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "lowercase")]
pub enum ProfileType {
    #[default]
    Student,
    Admin,
}

impl fmt::Display for ProfileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProfileType::Student => write!(f, "student"),
            ProfileType::Admin => write!(f, "admin"),
        }
    }
}

/// A member of the collective (the store's `User` entity).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Student {
    pub id: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub profile_type: ProfileType,
    /// Free-text location label; sessions join on it by name.
    #[serde(default)]
    pub training_location: Option<String>,
    #[serde(default)]
    pub current_grade_id: Option<String>,
    #[serde(default)]
    pub points_by_year: PointsByYear,
    /// Opaque revision token. The hosted store uses its last-modified
    /// timestamp, hence the wire name.
    #[serde(rename = "updated_date", default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
}

impl Entity for Student {
    const KIND: EntityKind = EntityKind::User;
}

impl Student {
    pub fn new(id: impl Into<String>, full_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            full_name: full_name.into(),
            nickname: None,
            email: None,
            profile_type: ProfileType::Student,
            training_location: None,
            current_grade_id: None,
            points_by_year: PointsByYear::new(),
            revision: None,
        }
    }

    /// Points for a calendar year, 0 when the year was never credited.
    pub fn points_for(&self, year: i32) -> u32 {
        self.points_by_year.get(&year).copied().unwrap_or(0)
    }

    pub fn is_admin(&self) -> bool {
        self.profile_type == ProfileType::Admin
    }

    /// Nickname if set, otherwise the full name
    pub fn display_name(&self) -> &str {
        self.nickname
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(&self.full_name)
    }

    pub fn trains_at(&self, location_name: &str) -> bool {
        self.training_location.as_deref() == Some(location_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_points_by_year_parses_string_keys() {
        let json = r#"{
            "id": "u1",
            "full_name": "Ana Souza",
            "profile_type": "student",
            "points_by_year": {"2024": 31, "2025": 7},
            "updated_date": "2025-03-01T10:00:00Z"
        }"#;
        let student: Student = serde_json::from_str(json).expect("valid student json");
        assert_eq!(student.points_for(2024), 31);
        assert_eq!(student.points_for(2025), 7);
        assert_eq!(student.points_for(2026), 0);
        assert_eq!(student.revision.as_deref(), Some("2025-03-01T10:00:00Z"));
    }

    #[test]
    fn test_missing_fields_default() {
        let student: Student = serde_json::from_str(r#"{"id": "u2"}"#).expect("minimal json");
        assert_eq!(student.profile_type, ProfileType::Student);
        assert!(student.points_by_year.is_empty());
        assert!(student.current_grade_id.is_none());
    }

    #[test]
    fn test_display_name_prefers_nickname() {
        let mut student = Student::new("u3", "Carlos Lima");
        assert_eq!(student.display_name(), "Carlos Lima");
        student.nickname = Some("Pezinho".to_string());
        assert_eq!(student.display_name(), "Pezinho");
        student.nickname = Some("  ".to_string());
        assert_eq!(student.display_name(), "Carlos Lima");
    }
}
