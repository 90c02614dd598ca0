//! Append-only log of admin overrides.

use std::sync::Arc;

use tracing::info;

use crate::error::Result;
use crate::models::AuditEntry;
use crate::store::{into_fields, Entity, Query, Store};

pub struct AuditRecorder<S> {
    store: Arc<S>,
}

impl<S> Clone for AuditRecorder<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: Store> AuditRecorder<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Append an entry. Prior entries are never touched.
    pub async fn record(&self, entry: AuditEntry) -> Result<AuditEntry> {
        let fields = into_fields(&entry, AuditEntry::KIND)?;
        let stored: AuditEntry = self.store.create(fields).await?;
        info!(
            target_user_id = %stored.target_user_id,
            field = %stored.field,
            old_value = %stored.old_value,
            new_value = %stored.new_value,
            actor = %stored.actor,
            "Recorded admin override"
        );
        Ok(stored)
    }

    /// Entries about one student, oldest first.
    pub async fn history(&self, student_id: &str) -> Result<Vec<AuditEntry>> {
        let query = Query::new().eq("target_user_id", student_id);
        let mut entries: Vec<AuditEntry> = self.store.filter(&query).await?;
        entries.sort_by(|a, b| a.created_date.cmp(&b.created_date));
        Ok(entries)
    }
}
