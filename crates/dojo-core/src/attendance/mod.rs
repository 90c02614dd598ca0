//! Attendance sheet reconciliation.
//!
//! The sheet an instructor edits is a desired state: one `Mark` per student
//! on the session's roster. Saving it means diffing that state against the
//! stored records (`reconciler`) and sending the resulting plan to the store
//! and the point ledger (`dispatch`).

pub mod dispatch;
pub mod reconciler;
pub mod roster;

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Result;
use crate::ledger::PointLedger;
use crate::models::{AttendanceRecord, Location, Session, Student};
use crate::store::{Query, Store};

pub use dispatch::{dispatch, DispatchFailure, DispatchReport, DispatchStage};
pub use reconciler::{
    reconcile, DesiredMarks, PointPolicy, ReconcilePlan, RecordDeletion, StatusUpdate,
};
pub use roster::roster_for_session;

/// Which year's total a saved sheet credits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreditYear {
    /// The calendar year at the moment the sheet is saved.
    #[default]
    SaveDate,
    /// The calendar year the session took place in.
    SessionDate,
}

impl CreditYear {
    pub fn resolve(self, session: &Session, now: DateTime<Utc>) -> i32 {
        match self {
            CreditYear::SaveDate => now.year(),
            CreditYear::SessionDate => session.year(),
        }
    }
}

/// Load everything a session's sheet depends on, reconcile `desired`
/// against it and dispatch the plan. Points go to the year `credit_year`
/// picks.
pub async fn save_sheet<S: Store>(
    ledger: &PointLedger<S>,
    session_id: &str,
    desired: &DesiredMarks,
    policy: PointPolicy,
    credit_year: CreditYear,
) -> Result<DispatchReport> {
    let store = ledger.store();

    let session: Session = store.get(session_id).await?;
    let locations: Vec<Location> = store.list().await?;
    let students: Vec<Student> = store.list().await?;
    let existing: Vec<AttendanceRecord> = store
        .filter(&Query::new().eq("session_id", session_id))
        .await?;

    let roster = roster_for_session(&students, &session, &locations);
    let plan = reconcile(&session, &existing, &roster, desired, policy)?;
    if plan.is_empty() {
        info!(session_id, "Attendance sheet already up to date");
        return Ok(DispatchReport::default());
    }

    let year = credit_year.resolve(&session, Utc::now());
    info!(session_id, year, "Saving attendance sheet");
    Ok(dispatch(ledger, &plan, year).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;

    use chrono::TimeZone;

    use crate::models::Mark;
    use crate::store::MemoryStore;

    fn seeded() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store
            .insert(&Location {
                id: "l1".to_string(),
                name: "Centro".to_string(),
                address: None,
            })
            .expect("seed");
        store
            .insert(&Session {
                id: "s1".to_string(),
                title: "Roda".to_string(),
                date_time: Utc.with_ymd_and_hms(2024, 12, 30, 19, 0, 0).unwrap(),
                location_id: "l1".to_string(),
                level: None,
            })
            .expect("seed");
        for (id, location) in [("a", "Centro"), ("b", "Centro"), ("c", "Praia")] {
            let mut student = Student::new(id, id);
            student.training_location = Some(location.to_string());
            store.insert(&student).expect("seed");
        }
        store
    }

    #[tokio::test]
    async fn test_save_sheet_credits_session_year() {
        let store = seeded();
        let ledger = PointLedger::new(Arc::clone(&store));
        let desired: DesiredMarks = HashMap::from([
            ("a".to_string(), Mark::Present),
            ("b".to_string(), Mark::Absent),
            // Not on the Centro roster.
            ("c".to_string(), Mark::Present),
        ]);

        let report = save_sheet(&ledger, "s1", &desired, PointPolicy::OneShot, CreditYear::SessionDate)
            .await
            .expect("save");
        assert!(report.is_complete());
        assert_eq!(report.created, 2);
        assert_eq!(ledger.points("a", 2024).await.expect("read"), 1);
        assert_eq!(ledger.points("c", 2024).await.expect("read"), 0);

        let again = save_sheet(&ledger, "s1", &desired, PointPolicy::OneShot, CreditYear::SessionDate)
            .await
            .expect("save");
        assert_eq!(again.created + again.updated + again.deleted, 0);
        assert_eq!(ledger.points("a", 2024).await.expect("read"), 1);
    }

    #[tokio::test]
    async fn test_save_sheet_credits_save_year_by_default() {
        let store = seeded();
        let ledger = PointLedger::new(Arc::clone(&store));
        let desired: DesiredMarks = HashMap::from([("a".to_string(), Mark::Present)]);

        let report = save_sheet(&ledger, "s1", &desired, PointPolicy::OneShot, CreditYear::default())
            .await
            .expect("save");
        assert!(report.is_complete());

        // The session is in December 2024; the point lands in this year.
        let this_year = Utc::now().year();
        assert_eq!(ledger.points("a", this_year).await.expect("read"), 1);
        if this_year != 2024 {
            assert_eq!(ledger.points("a", 2024).await.expect("read"), 0);
        }
    }

    #[test]
    fn test_credit_year_resolve() {
        let session = Session {
            id: "s1".to_string(),
            title: "Roda".to_string(),
            date_time: Utc.with_ymd_and_hms(2024, 12, 30, 19, 0, 0).unwrap(),
            location_id: "l1".to_string(),
            level: None,
        };
        let saved = Utc.with_ymd_and_hms(2025, 1, 2, 9, 0, 0).unwrap();
        assert_eq!(CreditYear::SaveDate.resolve(&session, saved), 2025);
        assert_eq!(CreditYear::SessionDate.resolve(&session, saved), 2024);
        assert_eq!(CreditYear::default(), CreditYear::SaveDate);
    }

    #[tokio::test]
    async fn test_save_sheet_unknown_session() {
        let ledger = PointLedger::new(seeded());
        let err = save_sheet(&ledger, "nope", &DesiredMarks::new(), PointPolicy::OneShot, CreditYear::default())
            .await
            .expect_err("missing session");
        assert!(matches!(err, crate::error::CoreError::Store(ref e) if e.is_not_found()));
    }
}
