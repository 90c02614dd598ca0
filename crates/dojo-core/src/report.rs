//! Attendance report over a date range, joined to names and titles.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{AttendanceRecord, AttendanceStatus, Session, Student};

/// One line of the report. Names fall back to the raw id when the student
/// or session no longer exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct AttendanceReportRow {
    pub date: DateTime<Utc>,
    pub student_id: String,
    pub student_name: String,
    pub session_id: String,
    pub session_title: String,
    pub status: AttendanceStatus,
}

/// Records created within `from..=to`, oldest first. Records without a
/// creation date are left out.
pub fn attendance_report(
    records: &[AttendanceRecord],
    students: &[Student],
    sessions: &[Session],
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Vec<AttendanceReportRow> {
    let names: HashMap<&str, &str> = students
        .iter()
        .map(|s| (s.id.as_str(), s.display_name()))
        .collect();
    let titles: HashMap<&str, &str> = sessions
        .iter()
        .map(|s| (s.id.as_str(), s.title.as_str()))
        .collect();

    let mut rows: Vec<AttendanceReportRow> = records
        .iter()
        .filter_map(|record| {
            let date = record.created_date.filter(|d| *d >= from && *d <= to)?;
            Some(AttendanceReportRow {
                date,
                student_id: record.student_id.clone(),
                student_name: names
                    .get(record.student_id.as_str())
                    .unwrap_or(&record.student_id.as_str())
                    .to_string(),
                session_id: record.session_id.clone(),
                session_title: titles
                    .get(record.session_id.as_str())
                    .unwrap_or(&record.session_id.as_str())
                    .to_string(),
                status: record.status,
            })
        })
        .collect();

    rows.sort_by(|a, b| {
        a.date
            .cmp(&b.date)
            .then_with(|| a.student_name.cmp(&b.student_name))
    });
    rows
}
