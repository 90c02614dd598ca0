//! Dojo core: attendance reconciliation and the progression ledger for a
//! martial-arts collective.
//!
//! - `attendance`: diff an edited attendance sheet against stored records
//!   and send the resulting plan to the store
//! - `ledger`: per-student, per-year point totals with serialized writes
//! - `ladder` and `progression`: grade ladder and where a student stands
//! - `leaderboard`: tie-inclusive featured students and dashboard stats
//! - `report`: attendance over a date range with names and titles
//! - `audit` and `admin`: append-only log of admin overrides
//! - `store`: the remote entity store interface and its adapters
//! - `cache` and `config`: local snapshots and settings for frontends

pub mod admin;
pub mod attendance;
pub mod audit;
pub mod cache;
pub mod config;
pub mod error;
pub mod ladder;
pub mod leaderboard;
pub mod ledger;
pub mod models;
pub mod progression;
pub mod report;
pub mod store;

pub use admin::StudentOverrides;
pub use attendance::{save_sheet, CreditYear, DesiredMarks, DispatchReport, PointPolicy, ReconcilePlan};
pub use audit::AuditRecorder;
pub use error::{CoreError, Result};
pub use ladder::{resolve_grade, GradeLadder, GradeResolution};
pub use leaderboard::{featured, DashboardStats, FeaturedStudent, PopulationStats};
pub use ledger::PointLedger;
pub use progression::Progression;
pub use report::{attendance_report, AttendanceReportRow};
pub use store::{MemoryStore, RestStore, Store, StoreError};
