//! Per-student, per-year point totals.
//!
//! Totals live on the student record in the store. Every write here is a
//! read-modify-write of the whole `points_by_year` map, so writes are
//! serialized per student inside the process, whatever the year, and guarded
//! by the store's revision check across processes. A revision conflict is
//! retried once with a fresh read.

pub mod locks;

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::audit::AuditRecorder;
use crate::error::{CoreError, Result};
use crate::models::{AuditEntry, AuditField, PointsByYear, Student};
use crate::store::{Fields, Store};

pub use locks::KeyedLocks;

/// Fresh-read retries after a revision conflict before giving up.
const MAX_CONFLICT_RETRIES: u32 = 1;

/// Outcome of one read-modify-write of a yearly total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PointWrite {
    old: u32,
    new: u32,
    written: bool,
}

pub struct PointLedger<S> {
    store: Arc<S>,
    audit: AuditRecorder<S>,
    locks: KeyedLocks<String>,
}

fn points_fields(points: &PointsByYear) -> Fields {
    let mut fields = Fields::new();
    let map: serde_json::Map<String, Value> = points
        .iter()
        .map(|(year, total)| (year.to_string(), Value::from(*total)))
        .collect();
    fields.insert("points_by_year".to_string(), Value::Object(map));
    fields
}

impl<S: Store> PointLedger<S> {
    pub fn new(store: Arc<S>) -> Self {
        let audit = AuditRecorder::new(Arc::clone(&store));
        Self {
            store,
            audit,
            locks: KeyedLocks::new(),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn audit(&self) -> &AuditRecorder<S> {
        &self.audit
    }

    /// Current total for a student and year.
    pub async fn points(&self, student_id: &str, year: i32) -> Result<u32> {
        let student: Student = self.store.get(student_id).await?;
        Ok(student.points_for(year))
    }

    /// Add `delta` to a yearly total (a missing year counts as 0) and return
    /// the new total. Not audited. A total that would drop below zero is
    /// rejected without writing.
    pub async fn apply_delta(&self, student_id: &str, year: i32, delta: i64) -> Result<u32> {
        let _guard = self.locks.lock(student_id.to_string()).await;

        let write = self
            .write_points(student_id, year, |current| {
                if delta == 0 {
                    return Ok(None);
                }
                let next = i64::from(current) + delta;
                u32::try_from(next).map(Some).map_err(|_| {
                    CoreError::validation(format!(
                        "delta {} would take {} points of student {} in {} out of range",
                        delta, current, student_id, year
                    ))
                })
            })
            .await?;

        debug!(student_id, year, delta, old = write.old, new = write.new, "Applied point delta");
        Ok(write.new)
    }

    /// Admin override: set a yearly total outright.
    ///
    /// Writes and records exactly one audit entry when the value changes;
    /// returns `None` without writing anything when it already matches.
    pub async fn set_absolute(
        &self,
        student_id: &str,
        year: i32,
        new_value: u32,
        actor: &str,
        reason: &str,
    ) -> Result<Option<AuditEntry>> {
        if actor.trim().is_empty() {
            return Err(CoreError::validation("override needs an actor"));
        }

        let _guard = self.locks.lock(student_id.to_string()).await;

        let write = self
            .write_points(student_id, year, |current| {
                Ok((current != new_value).then_some(new_value))
            })
            .await?;

        if !write.written {
            debug!(student_id, year, value = new_value, "Points already at requested value");
            return Ok(None);
        }

        let entry = AuditEntry::new(
            student_id,
            AuditField::Points { year },
            write.old.to_string(),
            write.new.to_string(),
            actor,
            reason,
        );
        match self.audit.record(entry).await {
            Ok(stored) => {
                info!(student_id, year, old = write.old, new = write.new, actor, "Points overridden");
                Ok(Some(stored))
            }
            Err(e) => {
                error!(student_id, year, error = %e, "Points overridden but audit entry failed");
                Err(e)
            }
        }
    }

    /// Read the student, let `compute` decide the new total (`None` = leave
    /// it), and write it back conditionally on the revision read.
    async fn write_points<F>(&self, student_id: &str, year: i32, compute: F) -> Result<PointWrite>
    where
        F: Fn(u32) -> Result<Option<u32>> + Send,
    {
        let mut attempt = 0;
        loop {
            let student: Student = self.store.get(student_id).await?;
            let current = student.points_for(year);

            let Some(next) = compute(current)? else {
                return Ok(PointWrite {
                    old: current,
                    new: current,
                    written: false,
                });
            };

            let mut points = student.points_by_year.clone();
            points.insert(year, next);

            match self
                .store
                .update::<Student>(student_id, points_fields(&points), student.revision.as_deref())
                .await
            {
                Ok(_) => {
                    return Ok(PointWrite {
                        old: current,
                        new: next,
                        written: true,
                    })
                }
                Err(e) if e.is_conflict() && attempt < MAX_CONFLICT_RETRIES => {
                    attempt += 1;
                    warn!(student_id, year, attempt, "Points changed underneath us, re-reading");
                }
                Err(e) if e.is_conflict() => {
                    return Err(CoreError::Conflict {
                        student_id: student_id.to_string(),
                        year,
                    })
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}
