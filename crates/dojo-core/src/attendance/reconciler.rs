use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CoreError, Result};
use crate::models::{
    AttendanceRecord, AttendanceStatus, Mark, NewAttendance, Session, Student,
    DEFAULT_POINTS_EARNED,
};

/// Desired sheet state: student id -> mark. Missing ids are `Unset`.
pub type DesiredMarks = HashMap<String, Mark>;

/// How edits to an existing record affect points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointPolicy {
    /// Points settle when a record is created; status edits and deletions
    /// never move them.
    #[default]
    OneShot,
    /// Edits follow the record: present -> absent and deleting a present
    /// record take `points_earned` back, absent -> present gives it again.
    ClawbackOnEdit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub record_id: String,
    pub student_id: String,
    pub from: AttendanceStatus,
    pub to: AttendanceStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordDeletion {
    pub record_id: String,
    pub student_id: String,
    /// Set when the record is an extra copy for a student that already has
    /// a canonical record in this session.
    pub duplicate: bool,
}

/// Operations needed to bring one session's stored attendance in line with
/// the sheet, plus the point changes they imply. Nothing here has been
/// written yet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcilePlan {
    pub session_id: String,
    pub to_create: Vec<NewAttendance>,
    pub to_update: Vec<StatusUpdate>,
    pub to_delete: Vec<RecordDeletion>,
    /// Student id -> net point change. Zero entries are omitted.
    pub point_deltas: BTreeMap<String, i64>,
}

impl ReconcilePlan {
    pub fn is_empty(&self) -> bool {
        self.to_create.is_empty()
            && self.to_update.is_empty()
            && self.to_delete.is_empty()
            && self.point_deltas.is_empty()
    }

    pub fn operation_count(&self) -> usize {
        self.to_create.len() + self.to_update.len() + self.to_delete.len()
    }

    pub fn delta_for(&self, student_id: &str) -> i64 {
        self.point_deltas.get(student_id).copied().unwrap_or(0)
    }

    fn add_delta(&mut self, student_id: &str, delta: i64) {
        if delta == 0 {
            return;
        }
        let entry = self.point_deltas.entry(student_id.to_string()).or_insert(0);
        *entry += delta;
        if *entry == 0 {
            self.point_deltas.remove(student_id);
        }
    }
}

/// Diff the sheet against the records stored for `session`.
///
/// Only roster students are touched. For each of them:
///
/// | stored      | sheet          | plan                          |
/// |-------------|----------------|-------------------------------|
/// | none        | present        | create, +1 point              |
/// | none        | absent         | create                        |
/// | none        | unset          | nothing                       |
/// | status `s`  | `s`            | nothing                       |
/// | status `s`  | other status   | update (points per `policy`)  |
/// | any         | unset          | delete (points per `policy`)  |
///
/// Applying the plan and reconciling the same sheet again gives an empty
/// plan.
pub fn reconcile(
    session: &Session,
    existing: &[AttendanceRecord],
    roster: &[&Student],
    desired: &DesiredMarks,
    policy: PointPolicy,
) -> Result<ReconcilePlan> {
    if session.id.trim().is_empty() {
        return Err(CoreError::validation("session has no id"));
    }
    if let Some(stray) = existing.iter().find(|r| r.session_id != session.id) {
        return Err(CoreError::validation(format!(
            "attendance record {} belongs to session {}, not {}",
            stray.id, stray.session_id, session.id
        )));
    }

    // First record per student is canonical; later ones are duplicates.
    let mut by_student: HashMap<&str, Vec<&AttendanceRecord>> = HashMap::new();
    for record in existing {
        by_student.entry(record.student_id.as_str()).or_default().push(record);
    }

    let mut plan = ReconcilePlan {
        session_id: session.id.clone(),
        ..ReconcilePlan::default()
    };
    let mut seen: HashSet<&str> = HashSet::new();

    for student in roster {
        let student_id = student.id.as_str();
        if !seen.insert(student_id) {
            continue;
        }

        let records = by_student.get(student_id).map(Vec::as_slice).unwrap_or(&[]);
        let (current, duplicates) = match records.split_first() {
            Some((first, rest)) => (Some(*first), rest),
            None => (None, &[][..]),
        };

        for dup in duplicates {
            debug!(student_id, record_id = %dup.id, "Dropping duplicate attendance record");
            plan.to_delete.push(RecordDeletion {
                record_id: dup.id.clone(),
                student_id: student_id.to_string(),
                duplicate: true,
            });
        }

        let wanted = desired.get(student_id).copied().unwrap_or_default();
        match (current, wanted.status()) {
            (None, None) => {}
            (None, Some(status)) => {
                plan.to_create.push(NewAttendance {
                    session_id: session.id.clone(),
                    student_id: student_id.to_string(),
                    status,
                    points_earned: DEFAULT_POINTS_EARNED,
                });
                if status == AttendanceStatus::Present {
                    plan.add_delta(student_id, i64::from(DEFAULT_POINTS_EARNED));
                }
            }
            (Some(record), None) => {
                plan.to_delete.push(RecordDeletion {
                    record_id: record.id.clone(),
                    student_id: student_id.to_string(),
                    duplicate: false,
                });
                if policy == PointPolicy::ClawbackOnEdit && record.is_present() {
                    plan.add_delta(student_id, -i64::from(record.points_earned));
                }
            }
            (Some(record), Some(status)) if record.status == status => {}
            (Some(record), Some(status)) => {
                plan.to_update.push(StatusUpdate {
                    record_id: record.id.clone(),
                    student_id: student_id.to_string(),
                    from: record.status,
                    to: status,
                });
                if policy == PointPolicy::ClawbackOnEdit {
                    let earned = i64::from(record.points_earned);
                    let delta = match status {
                        AttendanceStatus::Present => earned,
                        AttendanceStatus::Absent => -earned,
                    };
                    plan.add_delta(student_id, delta);
                }
            }
        }
    }

    let ignored = desired.keys().filter(|id| !seen.contains(id.as_str())).count();
    if ignored > 0 {
        debug!(session_id = %session.id, ignored, "Ignoring marks for students outside the roster");
    }

    debug!(
        session_id = %session.id,
        create = plan.to_create.len(),
        update = plan.to_update.len(),
        delete = plan.to_delete.len(),
        students_with_points = plan.point_deltas.len(),
        "Reconciled attendance"
    );

    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn session() -> Session {
        Session {
            id: "s1".to_string(),
            title: "Treino".to_string(),
            date_time: Utc.with_ymd_and_hms(2025, 5, 10, 9, 0, 0).unwrap(),
            location_id: "l1".to_string(),
            level: Some("iniciante".to_string()),
        }
    }

    fn students(ids: &[&str]) -> Vec<Student> {
        ids.iter().map(|id| Student::new(*id, *id)).collect()
    }

    fn record(id: &str, student_id: &str, status: AttendanceStatus) -> AttendanceRecord {
        AttendanceRecord {
            id: id.to_string(),
            session_id: "s1".to_string(),
            student_id: student_id.to_string(),
            status,
            points_earned: 1,
            created_date: None,
        }
    }

    fn marks(entries: &[(&str, Mark)]) -> DesiredMarks {
        entries.iter().map(|(id, m)| (id.to_string(), *m)).collect()
    }

    /// Apply a plan to an in-memory record list, the way a store would.
    fn apply(records: &mut Vec<AttendanceRecord>, plan: &ReconcilePlan, next_id: &mut u32) {
        for del in &plan.to_delete {
            records.retain(|r| r.id != del.record_id);
        }
        for upd in &plan.to_update {
            if let Some(r) = records.iter_mut().find(|r| r.id == upd.record_id) {
                r.status = upd.to;
            }
        }
        for new in &plan.to_create {
            *next_id += 1;
            records.push(AttendanceRecord {
                id: format!("a{}", next_id),
                session_id: new.session_id.clone(),
                student_id: new.student_id.clone(),
                status: new.status,
                points_earned: new.points_earned,
                created_date: None,
            });
        }
    }

    #[test]
    fn test_transition_table() {
        let people = students(&["new_p", "new_a", "new_u", "same", "flip", "clear"]);
        let roster: Vec<&Student> = people.iter().collect();
        let existing = vec![
            record("r-same", "same", AttendanceStatus::Present),
            record("r-flip", "flip", AttendanceStatus::Absent),
            record("r-clear", "clear", AttendanceStatus::Present),
        ];
        let desired = marks(&[
            ("new_p", Mark::Present),
            ("new_a", Mark::Absent),
            ("same", Mark::Present),
            ("flip", Mark::Present),
            ("clear", Mark::Unset),
        ]);

        let plan = reconcile(&session(), &existing, &roster, &desired, PointPolicy::OneShot)
            .expect("valid input");

        let created: Vec<_> = plan
            .to_create
            .iter()
            .map(|c| (c.student_id.as_str(), c.status, c.points_earned))
            .collect();
        assert_eq!(
            created,
            vec![
                ("new_p", AttendanceStatus::Present, 1),
                ("new_a", AttendanceStatus::Absent, 1),
            ]
        );
        assert_eq!(
            plan.to_update,
            vec![StatusUpdate {
                record_id: "r-flip".to_string(),
                student_id: "flip".to_string(),
                from: AttendanceStatus::Absent,
                to: AttendanceStatus::Present,
            }]
        );
        assert_eq!(plan.to_delete.len(), 1);
        assert_eq!(plan.to_delete[0].record_id, "r-clear");
        assert!(!plan.to_delete[0].duplicate);

        // Only the newly present student earns, absent never does.
        assert_eq!(plan.point_deltas.len(), 1);
        assert_eq!(plan.delta_for("new_p"), 1);
        assert_eq!(plan.delta_for("flip"), 0);
        assert_eq!(plan.delta_for("clear"), 0);
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let people = students(&["a", "b", "c", "d"]);
        let roster: Vec<&Student> = people.iter().collect();
        let mut records = vec![
            record("r1", "b", AttendanceStatus::Present),
            record("r2", "c", AttendanceStatus::Present),
        ];
        let desired = marks(&[("a", Mark::Present), ("b", Mark::Absent), ("d", Mark::Absent)]);
        let mut next_id = 10;

        let first = reconcile(&session(), &records, &roster, &desired, PointPolicy::OneShot)
            .expect("first pass");
        assert!(!first.is_empty());
        apply(&mut records, &first, &mut next_id);

        let second = reconcile(&session(), &records, &roster, &desired, PointPolicy::OneShot)
            .expect("second pass");
        assert!(second.is_empty(), "second pass should be a no-op: {:?}", second);
    }

    #[test]
    fn test_points_awarded_once_across_status_edits() {
        let people = students(&["a"]);
        let roster: Vec<&Student> = people.iter().collect();
        let mut records = Vec::new();
        let mut next_id = 0;
        let mut total = 0;

        for mark in [Mark::Present, Mark::Absent, Mark::Present, Mark::Present] {
            let plan = reconcile(
                &session(),
                &records,
                &roster,
                &marks(&[("a", mark)]),
                PointPolicy::OneShot,
            )
            .expect("valid");
            total += plan.delta_for("a");
            apply(&mut records, &plan, &mut next_id);
        }

        assert_eq!(total, 1);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, AttendanceStatus::Present);
    }

    #[test]
    fn test_absent_from_sheet_means_unset() {
        let people = students(&["a", "b"]);
        let roster: Vec<&Student> = people.iter().collect();
        let existing = vec![record("r1", "a", AttendanceStatus::Absent)];

        let plan = reconcile(&session(), &existing, &roster, &DesiredMarks::new(), PointPolicy::OneShot)
            .expect("valid");
        assert!(plan.to_create.is_empty());
        assert_eq!(plan.to_delete.len(), 1);
        assert_eq!(plan.to_delete[0].student_id, "a");
    }

    #[test]
    fn test_clawback_policy_moves_points_with_edits() {
        let people = students(&["flip_out", "flip_in", "cleared", "cleared_absent"]);
        let roster: Vec<&Student> = people.iter().collect();
        let existing = vec![
            record("r1", "flip_out", AttendanceStatus::Present),
            record("r2", "flip_in", AttendanceStatus::Absent),
            record("r3", "cleared", AttendanceStatus::Present),
            record("r4", "cleared_absent", AttendanceStatus::Absent),
        ];
        let desired = marks(&[("flip_out", Mark::Absent), ("flip_in", Mark::Present)]);

        let plan = reconcile(&session(), &existing, &roster, &desired, PointPolicy::ClawbackOnEdit)
            .expect("valid");
        assert_eq!(plan.delta_for("flip_out"), -1);
        assert_eq!(plan.delta_for("flip_in"), 1);
        assert_eq!(plan.delta_for("cleared"), -1);
        assert_eq!(plan.delta_for("cleared_absent"), 0);

        let one_shot = reconcile(&session(), &existing, &roster, &desired, PointPolicy::OneShot)
            .expect("valid");
        assert!(one_shot.point_deltas.is_empty());
        assert_eq!(one_shot.operation_count(), plan.operation_count());
    }

    #[test]
    fn test_duplicate_records_are_collapsed() {
        let people = students(&["a"]);
        let roster: Vec<&Student> = people.iter().collect();
        let mut records = vec![
            record("r1", "a", AttendanceStatus::Present),
            record("r2", "a", AttendanceStatus::Present),
            record("r3", "a", AttendanceStatus::Absent),
        ];
        let desired = marks(&[("a", Mark::Present)]);

        let plan = reconcile(&session(), &records, &roster, &desired, PointPolicy::ClawbackOnEdit)
            .expect("valid");
        let deleted: Vec<_> = plan.to_delete.iter().map(|d| d.record_id.as_str()).collect();
        assert_eq!(deleted, vec!["r2", "r3"]);
        assert!(plan.to_delete.iter().all(|d| d.duplicate));
        assert!(plan.point_deltas.is_empty());

        let mut next_id = 0;
        apply(&mut records, &plan, &mut next_id);
        let again = reconcile(&session(), &records, &roster, &desired, PointPolicy::ClawbackOnEdit)
            .expect("valid");
        assert!(again.is_empty());
    }

    #[test]
    fn test_students_outside_roster_are_untouched() {
        let people = students(&["a"]);
        let roster: Vec<&Student> = people.iter().collect();
        // "moved" changed location; their record stays as it is.
        let existing = vec![record("r1", "moved", AttendanceStatus::Present)];
        let desired = marks(&[("a", Mark::Present), ("stranger", Mark::Present)]);

        let plan = reconcile(&session(), &existing, &roster, &desired, PointPolicy::OneShot)
            .expect("valid");
        assert_eq!(plan.to_create.len(), 1);
        assert_eq!(plan.to_create[0].student_id, "a");
        assert!(plan.to_delete.is_empty());
        assert_eq!(plan.delta_for("stranger"), 0);
    }

    #[test]
    fn test_duplicate_roster_entries_count_once() {
        let people = students(&["a"]);
        let roster: Vec<&Student> = vec![&people[0], &people[0]];
        let plan = reconcile(
            &session(),
            &[],
            &roster,
            &marks(&[("a", Mark::Present)]),
            PointPolicy::OneShot,
        )
        .expect("valid");
        assert_eq!(plan.to_create.len(), 1);
        assert_eq!(plan.delta_for("a"), 1);
    }

    #[test]
    fn test_records_from_other_sessions_are_rejected() {
        let people = students(&["a"]);
        let roster: Vec<&Student> = people.iter().collect();
        let mut stray = record("r1", "a", AttendanceStatus::Present);
        stray.session_id = "other".to_string();

        let err = reconcile(&session(), &[stray], &roster, &DesiredMarks::new(), PointPolicy::OneShot)
            .expect_err("stray record");
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn test_session_without_id_is_rejected() {
        let mut s = session();
        s.id = String::new();
        let err = reconcile(&s, &[], &[], &DesiredMarks::new(), PointPolicy::OneShot)
            .expect_err("missing session id");
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn test_empty_roster_gives_empty_plan() {
        let plan = reconcile(
            &session(),
            &[],
            &[],
            &marks(&[("a", Mark::Present)]),
            PointPolicy::OneShot,
        )
        .expect("valid");
        assert!(plan.is_empty());
        assert_eq!(plan.session_id, "s1");
    }
}
