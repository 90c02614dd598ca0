//! Where a student stands on the grade ladder for a given year.

use serde::Serialize;

use crate::ladder::GradeLadder;
use crate::models::{Grade, Student};

/// A student's grade position. Pure read model; nothing here is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Progression {
    pub student_id: String,
    pub year: i32,
    pub points: u32,
    pub current: Option<Grade>,
    pub next: Option<Grade>,
    /// Points still missing for `next`, 0 once its threshold is met.
    pub points_to_go: Option<u32>,
    /// 0..=100 towards `next`; `None` at the top of the ladder.
    pub progress_percent: Option<u8>,
    /// Highest rung the year's points alone would reach.
    pub highest_earned: Option<Grade>,
}

impl Progression {
    /// Current and next grade follow the assigned grade, not points: promotion
    /// is an admin decision. Points only feed the progress figures.
    pub fn resolve(student: &Student, ladder: &GradeLadder, year: i32) -> Self {
        let points = student.points_for(year);
        let resolution = ladder.resolve(student.current_grade_id.as_deref());

        let points_to_go = resolution
            .next
            .map(|next| next.points_required.saturating_sub(points));
        let progress_percent = resolution.next.map(|next| {
            let required = u64::from(next.points_required.max(1));
            let pct = (u64::from(points) * 100 / required).min(100);
            // Bounded by the min above.
            pct as u8
        });

        Self {
            student_id: student.id.clone(),
            year,
            points,
            current: resolution.current.cloned(),
            next: resolution.next.cloned(),
            points_to_go,
            progress_percent,
            highest_earned: ladder.highest_earned(points).cloned(),
        }
    }

    pub fn is_max_grade(&self) -> bool {
        self.current.is_some() && self.next.is_none()
    }

    /// Enough points for the next rung, waiting on promotion.
    pub fn is_ready_for_next(&self) -> bool {
        self.points_to_go == Some(0)
    }
}
