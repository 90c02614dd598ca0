//! The belt/grade ladder.
//!
//! A snapshot of grade definitions ordered by their `order` field. The
//! ladder sorts its input itself (stably, so grades sharing an `order` keep
//! the order they arrived in); callers may pass grades in any order.

use crate::models::Grade;

/// Current and next grade for one student. Either may be absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GradeResolution<'a> {
    pub current: Option<&'a Grade>,
    pub next: Option<&'a Grade>,
}

impl GradeResolution<'_> {
    /// True when a current grade exists and nothing follows it.
    pub fn is_max_grade(&self) -> bool {
        self.current.is_some() && self.next.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GradeLadder {
    grades: Vec<Grade>,
}

impl GradeLadder {
    pub fn new(mut grades: Vec<Grade>) -> Self {
        grades.sort_by_key(|g| g.order);
        Self { grades }
    }

    pub fn grades(&self) -> &[Grade] {
        &self.grades
    }

    pub fn is_empty(&self) -> bool {
        self.grades.is_empty()
    }

    pub fn len(&self) -> usize {
        self.grades.len()
    }

    pub fn get(&self, grade_id: &str) -> Option<&Grade> {
        self.grades.iter().find(|g| g.id == grade_id)
    }

    fn position(&self, grade_id: &str) -> Option<usize> {
        self.grades.iter().position(|g| g.id == grade_id)
    }

    fn with_order(&self, order: i32) -> Option<&Grade> {
        self.grades.iter().find(|g| g.order == order)
    }

    /// Resolve current/next grade from an assigned grade id.
    ///
    /// An assigned grade wins; `next` is the rung right after it. With no
    /// assignment the student sits on the `order == 0` rung, heading for
    /// `order == 1`. An assignment that no longer exists in the ladder
    /// leaves `current` empty and points `next` at the lowest rung.
    pub fn resolve(&self, assigned_grade_id: Option<&str>) -> GradeResolution<'_> {
        match assigned_grade_id {
            Some(id) => match self.position(id) {
                Some(idx) => GradeResolution {
                    current: self.grades.get(idx),
                    next: self.grades.get(idx + 1),
                },
                None => GradeResolution {
                    current: None,
                    next: self.grades.first(),
                },
            },
            None => GradeResolution {
                current: self.with_order(0),
                next: self.with_order(1),
            },
        }
    }

    /// Highest rung whose threshold `points` meets. Among rungs with equal
    /// thresholds the later one in ladder order wins.
    pub fn highest_earned(&self, points: u32) -> Option<&Grade> {
        self.grades
            .iter()
            .rev()
            .find(|g| g.points_required <= points)
    }
}

/// Free-function form of [`GradeLadder::resolve`] over an unsorted slice.
pub fn resolve_grade(assigned_grade_id: Option<&str>, grades: &[Grade]) -> (Option<Grade>, Option<Grade>) {
    let ladder = GradeLadder::new(grades.to_vec());
    let resolution = ladder.resolve(assigned_grade_id);
    (resolution.current.cloned(), resolution.next.cloned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grade(id: &str, order: i32, points_required: u32) -> Grade {
        Grade {
            id: id.to_string(),
            order,
            name: id.to_string(),
            colors: vec!["#FFFFFF".to_string()],
            points_required,
        }
    }

    fn ladder() -> GradeLadder {
        // Deliberately unsorted.
        GradeLadder::new(vec![
            grade("yellow", 2, 40),
            grade("white", 0, 0),
            grade("black", 3, 120),
            grade("raw", 1, 10),
        ])
    }

    #[test]
    fn test_ladder_sorts_by_order() {
        let names: Vec<_> = ladder().grades().iter().map(|g| g.id.clone()).collect();
        assert_eq!(names, vec!["white", "raw", "yellow", "black"]);
    }

    #[test]
    fn test_assigned_grade_takes_precedence() {
        let ladder = ladder();
        let res = ladder.resolve(Some("raw"));
        assert_eq!(res.current.map(|g| g.id.as_str()), Some("raw"));
        assert_eq!(res.next.map(|g| g.id.as_str()), Some("yellow"));
        assert!(!res.is_max_grade());
    }

    #[test]
    fn test_highest_assigned_grade_has_no_next() {
        let ladder = ladder();
        let res = ladder.resolve(Some("black"));
        assert_eq!(res.current.map(|g| g.id.as_str()), Some("black"));
        assert!(res.next.is_none());
        assert!(res.is_max_grade());
    }

    #[test]
    fn test_unassigned_defaults_to_order_zero() {
        let ladder = ladder();
        let res = ladder.resolve(None);
        assert_eq!(res.current.map(|g| g.id.as_str()), Some("white"));
        assert_eq!(res.next.map(|g| g.id.as_str()), Some("raw"));
    }

    #[test]
    fn test_unassigned_without_order_zero() {
        let ladder = GradeLadder::new(vec![grade("a", 1, 0), grade("b", 2, 5)]);
        let res = ladder.resolve(None);
        assert!(res.current.is_none());
        assert_eq!(res.next.map(|g| g.id.as_str()), Some("a"));
    }

    #[test]
    fn test_empty_ladder_resolves_to_nothing() {
        let ladder = GradeLadder::default();
        assert_eq!(ladder.resolve(None), GradeResolution::default());
        assert_eq!(ladder.resolve(Some("anything")), GradeResolution::default());
        assert!(ladder.highest_earned(1000).is_none());
    }

    #[test]
    fn test_unknown_assigned_grade_points_at_lowest_rung() {
        let ladder = ladder();
        let res = ladder.resolve(Some("deleted-grade"));
        assert!(res.current.is_none());
        assert_eq!(res.next.map(|g| g.id.as_str()), Some("white"));
    }

    #[test]
    fn test_tied_orders_do_not_panic_and_stay_stable() {
        let ladder = GradeLadder::new(vec![
            grade("first", 1, 10),
            grade("zero", 0, 0),
            grade("second", 1, 10),
        ]);
        let ids: Vec<_> = ladder.grades().iter().map(|g| g.id.as_str()).collect();
        assert_eq!(ids, vec!["zero", "first", "second"]);

        let res = ladder.resolve(Some("first"));
        assert_eq!(res.next.map(|g| g.id.as_str()), Some("second"));

        // `next` for unassigned is the first rung with order 1.
        let res = ladder.resolve(None);
        assert_eq!(res.next.map(|g| g.id.as_str()), Some("first"));
    }

    #[test]
    fn test_highest_earned() {
        let ladder = ladder();
        assert_eq!(ladder.highest_earned(0).map(|g| g.id.as_str()), Some("white"));
        assert_eq!(ladder.highest_earned(39).map(|g| g.id.as_str()), Some("raw"));
        assert_eq!(ladder.highest_earned(40).map(|g| g.id.as_str()), Some("yellow"));
        assert_eq!(ladder.highest_earned(500).map(|g| g.id.as_str()), Some("black"));
    }

    #[test]
    fn test_resolve_grade_free_function() {
        let grades = vec![grade("b", 1, 10), grade("a", 0, 0)];
        let (current, next) = resolve_grade(None, &grades);
        assert_eq!(current.map(|g| g.id), Some("a".to_string()));
        assert_eq!(next.map(|g| g.id), Some("b".to_string()));

        let (current, next) = resolve_grade(None, &[]);
        assert!(current.is_none() && next.is_none());
    }
}
