//! Audited admin edits of a student's profile.
//!
//! Points overrides live on [`crate::ledger::PointLedger::set_absolute`];
//! the other overridable fields are handled here. Each edit is a no-op when
//! the value is unchanged, otherwise one conditional update plus one audit
//! entry.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info};

use crate::audit::AuditRecorder;
use crate::error::{CoreError, Result};
use crate::models::{AuditEntry, AuditField, Grade, ProfileType, Student, NO_VALUE};
use crate::store::{Fields, Store};

pub struct StudentOverrides<S> {
    store: Arc<S>,
    audit: AuditRecorder<S>,
}

impl<S: Store> StudentOverrides<S> {
    pub fn new(store: Arc<S>) -> Self {
        let audit = AuditRecorder::new(Arc::clone(&store));
        Self { store, audit }
    }

    /// Assign (or clear) a student's grade. The grade must exist.
    pub async fn assign_grade(
        &self,
        student_id: &str,
        grade_id: Option<&str>,
        actor: &str,
        reason: &str,
    ) -> Result<Option<AuditEntry>> {
        if let Some(id) = grade_id {
            match self.store.get::<Grade>(id).await {
                Ok(_) => {}
                Err(e) if e.is_not_found() => {
                    return Err(CoreError::validation(format!("unknown grade {}", id)));
                }
                Err(e) => return Err(e.into()),
            }
        }

        self.apply(
            student_id,
            AuditField::Grade,
            grade_id.map(str::to_string),
            |s| s.current_grade_id.clone(),
            actor,
            reason,
        )
        .await
    }

    /// Move a student to another training location label. This also moves
    /// them between session rosters.
    pub async fn set_training_location(
        &self,
        student_id: &str,
        location: Option<&str>,
        actor: &str,
        reason: &str,
    ) -> Result<Option<AuditEntry>> {
        let location = location.map(str::trim).filter(|l| !l.is_empty());
        self.apply(
            student_id,
            AuditField::TrainingLocation,
            location.map(str::to_string),
            |s| s.training_location.clone(),
            actor,
            reason,
        )
        .await
    }

    pub async fn set_profile_type(
        &self,
        student_id: &str,
        profile_type: ProfileType,
        actor: &str,
        reason: &str,
    ) -> Result<Option<AuditEntry>> {
        self.apply(
            student_id,
            AuditField::ProfileType,
            Some(profile_type.to_string()),
            |s| Some(s.profile_type.to_string()),
            actor,
            reason,
        )
        .await
    }

    /// Write `new` into `field` unless `current` already returns it. `None`
    /// clears the field; the audit log shows it as `NO_VALUE`.
    async fn apply<F>(
        &self,
        student_id: &str,
        field: AuditField,
        new: Option<String>,
        current: F,
        actor: &str,
        reason: &str,
    ) -> Result<Option<AuditEntry>>
    where
        F: Fn(&Student) -> Option<String> + Send,
    {
        if actor.trim().is_empty() {
            return Err(CoreError::validation("override needs an actor"));
        }

        let student: Student = self.store.get(student_id).await?;
        let old = current(&student);
        if old == new {
            debug!(student_id, field = %field.field_name(), "Override matches current value");
            return Ok(None);
        }

        let mut fields = Fields::new();
        fields.insert(
            field.field_name(),
            new.as_deref().map_or(Value::Null, Value::from),
        );
        self.store
            .update::<Student>(student_id, fields, student.revision.as_deref())
            .await?;

        let entry = AuditEntry::new(
            student_id,
            field,
            old.as_deref().unwrap_or(NO_VALUE),
            new.as_deref().unwrap_or(NO_VALUE),
            actor,
            reason,
        );
        let stored = self.audit.record(entry).await?;
        info!(student_id, field = %stored.field, actor, "Profile overridden");
        Ok(Some(stored))
    }
}
