use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::{Entity, EntityKind};

/// Points a newly created attendance record is worth.
pub const DEFAULT_POINTS_EARNED: u32 = 1;

fn default_points_earned() -> u32 {
    DEFAULT_POINTS_EARNED
}

/// Status stored on an attendance record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Absent,
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttendanceStatus::Present => write!(f, "present"),
            AttendanceStatus::Absent => write!(f, "absent"),
        }
    }
}

/// What the attendance sheet asks for. A student missing from the sheet
/// is `Unset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "lowercase")]
pub enum Mark {
    Present,
    Absent,
    #[default]
    Unset,
}

impl Mark {
    pub fn status(self) -> Option<AttendanceStatus> {
        match self {
            Mark::Present => Some(AttendanceStatus::Present),
            Mark::Absent => Some(AttendanceStatus::Absent),
            Mark::Unset => None,
        }
    }
}

impl From<Option<AttendanceStatus>> for Mark {
    fn from(status: Option<AttendanceStatus>) -> Self {
        match status {
            Some(AttendanceStatus::Present) => Mark::Present,
            Some(AttendanceStatus::Absent) => Mark::Absent,
            None => Mark::Unset,
        }
    }
}

/// Ties one student to one session. At most one per (student, session).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct AttendanceRecord {
    pub id: String,
    pub session_id: String,
    pub student_id: String,
    pub status: AttendanceStatus,
    /// Fixed when the record is created; edits never change it.
    #[serde(default = "default_points_earned")]
    pub points_earned: u32,
    #[serde(default)]
    pub created_date: Option<DateTime<Utc>>,
}

impl Entity for AttendanceRecord {
    const KIND: EntityKind = EntityKind::Attendance;
}

impl AttendanceRecord {
    pub fn is_present(&self) -> bool {
        self.status == AttendanceStatus::Present
    }
}

/// Fields of an attendance record that does not exist yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAttendance {
    pub session_id: String,
    pub student_id: String,
    pub status: AttendanceStatus,
    pub points_earned: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_points_earned_defaults_to_one() {
        let json = r#"{"id": "a1", "session_id": "s1", "student_id": "u1", "status": "present"}"#;
        let record: AttendanceRecord = serde_json::from_str(json).expect("valid record");
        assert_eq!(record.points_earned, 1);
        assert!(record.is_present());
        assert!(record.created_date.is_none());
    }

    #[test]
    fn test_mark_status_conversion() {
        assert_eq!(Mark::Present.status(), Some(AttendanceStatus::Present));
        assert_eq!(Mark::Absent.status(), Some(AttendanceStatus::Absent));
        assert_eq!(Mark::Unset.status(), None);
        assert_eq!(Mark::from(None), Mark::Unset);
        assert_eq!(Mark::from(Some(AttendanceStatus::Absent)), Mark::Absent);
    }
}
