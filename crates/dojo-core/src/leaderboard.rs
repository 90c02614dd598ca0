//! Featured students: a tie-inclusive top three.
//!
//! The featured set is everyone scoring at least the third-highest score
//! among students with points, so ties at the cut-off are never split
//! arbitrarily. Fewer than three scorers means fewer featured students;
//! nobody with zero points is ever featured.
//!
//! The admin dashboard figures live here too.

use std::collections::BTreeMap;

use chrono::Datelike;
use serde::Serialize;

use crate::models::{AttendanceRecord, Session, Student};

/// Size of the podium before ties are added.
pub const FEATURED_SLOTS: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeaturedStudent<'a> {
    pub student: &'a Student,
    pub points: u32,
}

/// Featured students for `year`, restricted to those `eligible` accepts
/// (e.g. excluding admins). Ordered by points descending, then id.
pub fn featured<'a, F>(students: &'a [Student], year: i32, eligible: F) -> Vec<FeaturedStudent<'a>>
where
    F: Fn(&Student) -> bool,
{
    let scored: Vec<(&'a Student, u32)> = students
        .iter()
        .filter(|s| eligible(*s))
        .map(|s| (s, s.points_for(year)))
        .collect();

    podium(scored, |s| s.id.as_str())
        .into_iter()
        .map(|(student, points)| FeaturedStudent { student, points })
        .collect()
}

/// Same rule over precomputed totals (student id -> points), e.g. the
/// output of [`monthly_points`]. Ordered by points descending, then id.
pub fn featured_from_totals(totals: &BTreeMap<String, u32>) -> Vec<(String, u32)> {
    let scored: Vec<(&String, u32)> = totals.iter().map(|(id, p)| (id, *p)).collect();
    podium(scored, |id| id.as_str())
        .into_iter()
        .map(|(id, points)| (id.clone(), points))
        .collect()
}

fn podium<T, K>(mut scored: Vec<(T, u32)>, id: K) -> Vec<(T, u32)>
where
    K: Fn(&T) -> &str,
{
    scored.retain(|(_, points)| *points > 0);
    let k = scored.len().min(FEATURED_SLOTS);
    if k == 0 {
        return Vec::new();
    }

    scored.sort_by(|(a, pa), (b, pb)| pb.cmp(pa).then_with(|| id(a).cmp(id(b))));
    let threshold = scored[k - 1].1;
    scored.retain(|(_, points)| *points >= threshold);
    scored
}

/// Points earned per student from present records created in the given
/// month. A record stored with no points still counts for one.
pub fn monthly_points(records: &[AttendanceRecord], year: i32, month: u32) -> BTreeMap<String, u32> {
    let mut totals = BTreeMap::new();
    for record in records.iter().filter(|r| r.is_present() && in_month(r, year, month)) {
        *totals.entry(record.student_id.clone()).or_insert(0) += record.points_earned.max(1);
    }
    totals
}

fn in_month(record: &AttendanceRecord, year: i32, month: u32) -> bool {
    record
        .created_date
        .is_some_and(|created| created.year() == year && created.month() == month)
}

/// Present records created in the given month, across all students.
pub fn monthly_attendance(records: &[AttendanceRecord], year: i32, month: u32) -> usize {
    records
        .iter()
        .filter(|r| r.is_present() && in_month(r, year, month))
        .count()
}

/// Headline figures for the admin dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct PopulationStats {
    pub students: usize,
    /// Mean of the year's points, rounded to the nearest integer.
    pub average_points: u32,
}

impl PopulationStats {
    pub fn compute<F>(students: &[Student], year: i32, eligible: F) -> Self
    where
        F: Fn(&Student) -> bool,
    {
        let (count, total) = students
            .iter()
            .filter(|s| eligible(*s))
            .fold((0usize, 0u64), |(n, sum), s| (n + 1, sum + u64::from(s.points_for(year))));

        let average_points = if count == 0 {
            0
        } else {
            let count = count as u64;
            // Round half up.
            u32::try_from((total * 2 + count) / (count * 2)).unwrap_or(u32::MAX)
        };

        Self {
            students: count,
            average_points,
        }
    }
}

/// Everything the dashboard shows for one year and month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct DashboardStats {
    #[serde(flatten)]
    pub population: PopulationStats,
    pub total_sessions: usize,
    /// Present records created in the month.
    pub monthly_attendance: usize,
}

impl DashboardStats {
    pub fn compute<F>(
        students: &[Student],
        sessions: &[Session],
        records: &[AttendanceRecord],
        year: i32,
        month: u32,
        eligible: F,
    ) -> Self
    where
        F: Fn(&Student) -> bool,
    {
        Self {
            population: PopulationStats::compute(students, year, eligible),
            total_sessions: sessions.len(),
            monthly_attendance: monthly_attendance(records, year, month),
        }
    }
}
