use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use futures::future::join_all;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::CoreError;
use crate::ledger::PointLedger;
use crate::models::{AttendanceRecord, NewAttendance};
use crate::store::{into_fields, Entity, Fields, Store};

use super::reconciler::{RecordDeletion, ReconcilePlan, StatusUpdate};

/// Where a student's writes stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchStage {
    Create,
    Update,
    Delete,
    Points,
}

impl fmt::Display for DispatchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchStage::Create => write!(f, "create"),
            DispatchStage::Update => write!(f, "update"),
            DispatchStage::Delete => write!(f, "delete"),
            DispatchStage::Points => write!(f, "points"),
        }
    }
}

#[derive(Debug)]
pub struct DispatchFailure {
    pub student_id: String,
    pub stage: DispatchStage,
    pub error: CoreError,
}

/// What actually landed. A student with a failure had nothing after the
/// failing step attempted, so the plan can be recomputed and re-sent.
#[derive(Debug, Default)]
pub struct DispatchReport {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    /// Student id -> new yearly total, for every delta applied.
    pub points_applied: BTreeMap<String, u32>,
    pub failures: Vec<DispatchFailure>,
}

impl DispatchReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Default)]
struct StudentWork<'a> {
    creates: Vec<&'a NewAttendance>,
    updates: Vec<&'a StatusUpdate>,
    deletes: Vec<&'a RecordDeletion>,
    delta: i64,
}

#[derive(Default)]
struct StudentOutcome {
    created: usize,
    updated: usize,
    deleted: usize,
    points: Option<u32>,
    failure: Option<DispatchFailure>,
}

fn group_by_student(plan: &ReconcilePlan) -> BTreeMap<&str, StudentWork<'_>> {
    let mut work: BTreeMap<&str, StudentWork<'_>> = BTreeMap::new();
    for create in &plan.to_create {
        work.entry(create.student_id.as_str()).or_default().creates.push(create);
    }
    for update in &plan.to_update {
        work.entry(update.student_id.as_str()).or_default().updates.push(update);
    }
    for delete in &plan.to_delete {
        work.entry(delete.student_id.as_str()).or_default().deletes.push(delete);
    }
    for (student_id, delta) in &plan.point_deltas {
        work.entry(student_id.as_str()).or_default().delta = *delta;
    }
    work
}

/// Send a reconciliation plan to the store, crediting deltas to `year`.
///
/// Students are independent and run concurrently. For one student the
/// record writes go first and the point delta is applied only once they
/// all succeeded, so re-running after a partial failure never pays twice.
/// Failures are collected in the report rather than aborting the others.
pub async fn dispatch<S: Store>(
    ledger: &PointLedger<S>,
    plan: &ReconcilePlan,
    year: i32,
) -> DispatchReport {
    let work = group_by_student(plan);
    let students: BTreeSet<&str> = work.keys().copied().collect();
    debug!(
        session_id = %plan.session_id,
        students = students.len(),
        operations = plan.operation_count(),
        "Dispatching attendance plan"
    );

    let outcomes = join_all(
        work.into_iter()
            .map(|(student_id, work)| dispatch_student(ledger, student_id, work, year)),
    )
    .await;

    let mut report = DispatchReport::default();
    for (student_id, outcome) in students.into_iter().zip(outcomes) {
        report.created += outcome.created;
        report.updated += outcome.updated;
        report.deleted += outcome.deleted;
        if let Some(total) = outcome.points {
            report.points_applied.insert(student_id.to_string(), total);
        }
        if let Some(failure) = outcome.failure {
            warn!(
                student_id = %failure.student_id,
                stage = %failure.stage,
                error = %failure.error,
                "Attendance write failed"
            );
            report.failures.push(failure);
        }
    }

    info!(
        session_id = %plan.session_id,
        created = report.created,
        updated = report.updated,
        deleted = report.deleted,
        points = report.points_applied.len(),
        failures = report.failures.len(),
        "Attendance plan dispatched"
    );
    report
}

async fn dispatch_student<S: Store>(
    ledger: &PointLedger<S>,
    student_id: &str,
    work: StudentWork<'_>,
    year: i32,
) -> StudentOutcome {
    let store = ledger.store();
    let mut outcome = StudentOutcome::default();
    let fail = |stage, error: CoreError| DispatchFailure {
        student_id: student_id.to_string(),
        stage,
        error,
    };

    for create in work.creates {
        let result = match into_fields(create, AttendanceRecord::KIND) {
            Ok(fields) => store.create::<AttendanceRecord>(fields).await.map(|_| ()),
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            outcome.failure = Some(fail(DispatchStage::Create, e.into()));
            return outcome;
        }
        outcome.created += 1;
    }

    for update in work.updates {
        let mut fields = Fields::new();
        fields.insert("status".to_string(), Value::String(update.to.to_string()));
        if let Err(e) = store
            .update::<AttendanceRecord>(&update.record_id, fields, None)
            .await
        {
            outcome.failure = Some(fail(DispatchStage::Update, e.into()));
            return outcome;
        }
        outcome.updated += 1;
    }

    for delete in work.deletes {
        match store.delete::<AttendanceRecord>(&delete.record_id).await {
            Ok(()) => outcome.deleted += 1,
            // Already gone is what we wanted.
            Err(e) if e.is_not_found() => {
                debug!(student_id, record_id = %delete.record_id, "Attendance record already deleted");
            }
            Err(e) => {
                outcome.failure = Some(fail(DispatchStage::Delete, e.into()));
                return outcome;
            }
        }
    }

    if work.delta != 0 {
        match ledger.apply_delta(student_id, year, work.delta).await {
            Ok(total) => outcome.points = Some(total),
            Err(e) => outcome.failure = Some(fail(DispatchStage::Points, e)),
        }
    }

    outcome
}
