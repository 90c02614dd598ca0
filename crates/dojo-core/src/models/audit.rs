use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::{Entity, EntityKind};

/// Value written for a field that had (or now has) no value.
pub const NO_VALUE: &str = "none";

/// Student fields an administrator may override.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditField {
    Points { year: i32 },
    Grade,
    TrainingLocation,
    ProfileType,
}

impl AuditField {
    pub fn field_name(&self) -> String {
        match self {
            AuditField::Points { year } => format!("points_by_year.{}", year),
            AuditField::Grade => "current_grade_id".to_string(),
            AuditField::TrainingLocation => "training_location".to_string(),
            AuditField::ProfileType => "profile_type".to_string(),
        }
    }
}

/// Immutable record of an admin-initiated change (the store's `AuditLog`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct AuditEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub target_user_id: String,
    pub field: String,
    pub old_value: String,
    pub new_value: String,
    pub reason: String,
    pub actor: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_date: Option<DateTime<Utc>>,
}

impl Entity for AuditEntry {
    const KIND: EntityKind = EntityKind::AuditLog;
}

impl AuditEntry {
    pub fn new(
        target_user_id: &str,
        field: AuditField,
        old_value: impl Into<String>,
        new_value: impl Into<String>,
        actor: &str,
        reason: &str,
    ) -> Self {
        Self {
            id: None,
            target_user_id: target_user_id.to_string(),
            field: field.field_name(),
            old_value: old_value.into(),
            new_value: new_value.into(),
            reason: reason.to_string(),
            actor: actor.to_string(),
            created_date: Some(Utc::now()),
        }
    }
}
