//! Data models for the collective's entities.
//!
//! - `Student`: member with per-year points and an optional assigned grade
//! - `Session`, `Location`: scheduled trainings and where they happen
//! - `AttendanceRecord`, `Mark`: stored attendance and desired sheet state
//! - `Grade`: one rung of the belt ladder
//! - `AuditEntry`: admin override log

pub mod attendance;
pub mod audit;
pub mod grade;
pub mod session;
pub mod student;

pub use attendance::{AttendanceRecord, AttendanceStatus, Mark, NewAttendance, DEFAULT_POINTS_EARNED};
pub use audit::{AuditEntry, AuditField, NO_VALUE};
pub use grade::Grade;
pub use session::{Location, Session};
pub use student::{PointsByYear, ProfileType, Student};
