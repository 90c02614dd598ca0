use crate::models::{Location, Session, Student};

/// Students expected at `session`.
///
/// The roster is a late-binding join: students whose `training_location`
/// label equals the name of the session's location *right now*. Moving a
/// student to another location moves them between past and future rosters
/// alike. A session whose location is unknown has an empty roster.
pub fn roster_for_session<'a>(
    students: &'a [Student],
    session: &Session,
    locations: &[Location],
) -> Vec<&'a Student> {
    let Some(location) = locations.iter().find(|l| l.id == session.location_id) else {
        return Vec::new();
    };

    students
        .iter()
        .filter(|s| !s.is_admin() && s.trains_at(&location.name))
        .collect()
}
