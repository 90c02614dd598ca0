//! Subcommand implementations. Each reads through the store (or a fresh
//! snapshot) and prints a plain-text report to stdout.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use tracing::{debug, info};

use dojo_core::attendance::{save_sheet, DesiredMarks};
use dojo_core::cache::CacheManager;
use dojo_core::config::Config;
use dojo_core::leaderboard::{featured, featured_from_totals, monthly_points, DashboardStats};
use dojo_core::models::{AttendanceRecord, Grade, Mark, Session, Student};
use dojo_core::report::attendance_report;
use dojo_core::{GradeLadder, PointLedger, Progression, Store, StudentOverrides};

pub struct App<S> {
    pub store: Arc<S>,
    pub cache: CacheManager,
    pub config: Config,
    pub refresh: bool,
    pub actor: Option<String>,
}

pub fn current_year() -> i32 {
    Utc::now().year()
}

pub fn current_month() -> u32 {
    Utc::now().month()
}

/// Whole-day UTC bounds for an inclusive date range.
fn day_bounds(from: NaiveDate, to: NaiveDate) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let start = from.and_hms_opt(0, 0, 0).context("Invalid start date")?.and_utc();
    let end = to.and_hms_opt(23, 59, 59).context("Invalid end date")?.and_utc();
    Ok((start, end))
}

impl<S: Store> App<S> {
    fn eligible(&self) -> impl Fn(&Student) -> bool {
        let exclude_admins = self.config.exclude_admins;
        move |s: &Student| !(exclude_admins && s.is_admin())
    }

    fn actor(&self) -> Result<&str> {
        self.actor
            .as_deref()
            .or(self.config.actor.as_deref())
            .filter(|a| !a.trim().is_empty())
            .context("No actor given (use --actor, DOJO_ACTOR or the actor config field)")
    }

    async fn students(&self) -> Result<Vec<Student>> {
        if !self.refresh {
            if let Some(students) = self.cache.fresh_students() {
                debug!(count = students.len(), "Using cached students");
                return Ok(students);
            }
        }
        let students: Vec<Student> = self.store.list().await.context("Failed to fetch students")?;
        self.cache.save_students(&students)?;
        Ok(students)
    }

    async fn ladder(&self) -> Result<GradeLadder> {
        if !self.refresh {
            if let Some(grades) = self.cache.fresh_grades() {
                return Ok(GradeLadder::new(grades));
            }
        }
        let grades: Vec<Grade> = self
            .store
            .list_sorted("order")
            .await
            .context("Failed to fetch grades")?;
        self.cache.save_grades(&grades)?;
        Ok(GradeLadder::new(grades))
    }

    pub async fn featured(&self, year: i32) -> Result<()> {
        let students = self.students().await?;
        let result = featured(&students, year, self.eligible());
        if result.is_empty() {
            println!("No points recorded for {}", year);
            return Ok(());
        }
        println!("Featured students {}", year);
        for (rank, entry) in result.iter().enumerate() {
            println!(
                "{:>2}. {:<30} {:>5}",
                rank + 1,
                entry.student.display_name(),
                entry.points
            );
        }
        Ok(())
    }

    pub async fn monthly(&self, year: i32, month: u32) -> Result<()> {
        let students = self.students().await?;
        let eligible = self.eligible();
        let names: HashMap<&str, &Student> = students
            .iter()
            .filter(|s| eligible(*s))
            .map(|s| (s.id.as_str(), s))
            .collect();

        let records = self.attendance().await?;
        let mut totals = monthly_points(&records, year, month);
        totals.retain(|id, _| names.contains_key(id.as_str()));

        let top = featured_from_totals(&totals);
        if top.is_empty() {
            println!("No attendance points for {}-{:02}", year, month);
            return Ok(());
        }
        println!("Featured students {}-{:02}", year, month);
        for (rank, (id, points)) in top.iter().enumerate() {
            let name = names.get(id.as_str()).map_or(id.as_str(), |s| s.display_name());
            println!("{:>2}. {:<30} {:>5}", rank + 1, name, points);
        }
        Ok(())
    }

    pub async fn progress(&self, student_id: &str, year: i32) -> Result<()> {
        let student: Student = self
            .store
            .get(student_id)
            .await
            .with_context(|| format!("Failed to fetch student {}", student_id))?;
        let ladder = self.ladder().await?;
        let p = Progression::resolve(&student, &ladder, year);

        let name = |g: &Option<Grade>| g.as_ref().map_or("-".to_string(), |g| g.name.clone());
        println!("{} ({})", student.display_name(), student.id);
        println!("  points {}:  {}", year, p.points);
        println!("  current:      {}", name(&p.current));
        println!("  next:         {}", name(&p.next));
        match (p.points_to_go, p.progress_percent) {
            (Some(to_go), Some(pct)) => println!("  progress:     {}% ({} to go)", pct, to_go),
            _ if p.is_max_grade() => println!("  progress:     top of the ladder"),
            _ => {}
        }
        if p.is_ready_for_next() {
            println!("  ready for promotion");
        }
        Ok(())
    }

    pub async fn ladder_report(&self) -> Result<()> {
        let ladder = self.ladder().await?;
        if ladder.is_empty() {
            println!("No grades defined");
            return Ok(());
        }
        for grade in ladder.grades() {
            println!(
                "{:>3}  {:<24} {:>6} pts  {}",
                grade.order,
                grade.name,
                grade.points_required,
                grade.primary_color().unwrap_or("-")
            );
        }
        Ok(())
    }

    async fn attendance(&self) -> Result<Vec<AttendanceRecord>> {
        self.store.list().await.context("Failed to fetch attendance")
    }

    async fn sessions(&self) -> Result<Vec<Session>> {
        self.store.list().await.context("Failed to fetch sessions")
    }

    pub async fn stats(&self, year: i32, month: u32) -> Result<()> {
        let students = self.students().await?;
        let sessions = self.sessions().await?;
        let records = self.attendance().await?;
        let stats = DashboardStats::compute(&students, &sessions, &records, year, month, self.eligible());
        println!("Students:            {}", stats.population.students);
        println!("Average points:      {} ({})", stats.population.average_points, year);
        println!("Sessions:            {}", stats.total_sessions);
        println!("Attendance {}-{:02}:  {}", year, month, stats.monthly_attendance);
        Ok(())
    }

    pub async fn report(&self, from: NaiveDate, to: NaiveDate) -> Result<()> {
        let (start, end) = day_bounds(from, to)?;
        let students = self.students().await?;
        let sessions = self.sessions().await?;
        let records = self.attendance().await?;
        let rows = attendance_report(&records, &students, &sessions, start, end);
        debug!(rows = rows.len(), %from, %to, "Built attendance report");

        if rows.is_empty() {
            println!("No attendance between {} and {}", from, to);
            return Ok(());
        }
        for row in &rows {
            println!(
                "{}  {:<28} {:<24} {}",
                row.date.format("%d/%m/%Y %H:%M"),
                row.student_name,
                row.session_title,
                row.status
            );
        }
        Ok(())
    }

    pub async fn mark(&self, session_id: &str, marks: Vec<(String, Mark)>) -> Result<()> {
        let desired: DesiredMarks = marks.into_iter().collect();
        let ledger = PointLedger::new(Arc::clone(&self.store));
        let report = save_sheet(
            &ledger,
            session_id,
            &desired,
            self.config.point_policy,
            self.config.credit_year,
        )
        .await
            .with_context(|| format!("Failed to save attendance for session {}", session_id))?;
        self.cache.invalidate_students()?;

        println!(
            "created {}, updated {}, deleted {}",
            report.created, report.updated, report.deleted
        );
        for (student_id, total) in &report.points_applied {
            println!("  {} now has {} points", student_id, total);
        }
        for failure in &report.failures {
            println!("  FAILED {} ({}): {}", failure.student_id, failure.stage, failure.error);
        }
        if !report.is_complete() {
            anyhow::bail!("{} student(s) not fully saved; run again to retry", report.failures.len());
        }
        Ok(())
    }

    pub async fn set_points(&self, student_id: &str, year: i32, value: u32, reason: &str) -> Result<()> {
        let actor = self.actor()?;
        let ledger = PointLedger::new(Arc::clone(&self.store));
        let entry = ledger
            .set_absolute(student_id, year, value, actor, reason)
            .await
            .with_context(|| format!("Failed to set points of {}", student_id))?;
        self.cache.invalidate_students()?;

        match entry {
            Some(entry) => {
                info!(student_id, year, value, "Points overridden");
                println!("{}: {} -> {}", entry.field, entry.old_value, entry.new_value);
            }
            None => println!("{} already has {} points for {}", student_id, value, year),
        }
        Ok(())
    }

    /// Assign `grade_id`, or clear the grade when it is `None`.
    pub async fn assign_grade(&self, student_id: &str, grade_id: Option<&str>, reason: &str) -> Result<()> {
        let actor = self.actor()?;
        let overrides = StudentOverrides::new(Arc::clone(&self.store));
        let entry = overrides
            .assign_grade(student_id, grade_id, actor, reason)
            .await
            .with_context(|| format!("Failed to assign grade to {}", student_id))?;
        self.cache.invalidate_students()?;

        match entry {
            Some(entry) => println!("{}: {} -> {}", entry.field, entry.old_value, entry.new_value),
            None => println!("{} already has that grade", student_id),
        }
        Ok(())
    }

    pub async fn history(&self, student_id: &str) -> Result<()> {
        let ledger = PointLedger::new(Arc::clone(&self.store));
        let entries = ledger
            .audit()
            .history(student_id)
            .await
            .with_context(|| format!("Failed to fetch audit history of {}", student_id))?;
        if entries.is_empty() {
            println!("No overrides recorded for {}", student_id);
        }
        for entry in entries {
            let when = entry
                .created_date
                .map_or("-".to_string(), |d| d.format("%Y-%m-%d %H:%M").to_string());
            println!(
                "{}  {:<22} {} -> {}  by {}: {}",
                when, entry.field, entry.old_value, entry.new_value, entry.actor, entry.reason
            );
        }
        Ok(())
    }
}

pub fn cache_age(cache: &CacheManager) {
    let ages = cache.get_cache_ages();
    println!("students:  {}", ages.students_age());
    println!("grades:    {}", ages.grades_age());
    println!("ttl:       {}m", cache.ttl_minutes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use dojo_core::models::Location;
    use dojo_core::{CreditYear, MemoryStore};

    fn app(name: &str, actor: Option<&str>) -> App<MemoryStore> {
        let store = MemoryStore::new();
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
                date_time: Utc.with_ymd_and_hms(2025, 5, 2, 19, 0, 0).unwrap(),
                location_id: "l1".to_string(),
                level: None,
            })
            .expect("seed");
        let mut ana = Student::new("u1", "Ana");
        ana.training_location = Some("Centro".to_string());
        store.insert(&ana).expect("seed");

        let dir = std::env::temp_dir().join(format!("dojo-cli-{}-{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        App {
            store: Arc::new(store),
            cache: CacheManager::new(dir).expect("cache"),
            config: Config::default(),
            refresh: false,
            actor: actor.map(str::to_string),
        }
    }

    async fn points(app: &App<MemoryStore>, year: i32) -> u32 {
        let student: Student = app.store.get("u1").await.expect("get");
        student.points_for(year)
    }

    #[tokio::test]
    async fn test_mark_then_set_points() {
        let app = app("mark", Some("sensei@aya"));
        let year = current_year();
        app.mark("s1", vec![("u1".to_string(), Mark::Present)])
            .await
            .expect("mark");
        assert_eq!(points(&app, year).await, 1);

        app.set_points("u1", year, 10, "seminar").await.expect("override");
        assert_eq!(points(&app, year).await, 10);
    }

    #[tokio::test]
    async fn test_mark_honors_session_year_setting() {
        let mut app = app("session-year", None);
        app.config = Config {
            credit_year: CreditYear::SessionDate,
            ..Config::default()
        };
        app.mark("s1", vec![("u1".to_string(), Mark::Present)])
            .await
            .expect("mark");
        assert_eq!(points(&app, 2025).await, 1);
    }

    #[tokio::test]
    async fn test_set_points_needs_actor() {
        let app = app("actor", None);
        assert!(app.set_points("u1", 2025, 10, "seminar").await.is_err());
        assert_eq!(points(&app, 2025).await, 0);
    }

    #[tokio::test]
    async fn test_report_and_stats_read_the_store() {
        let app = app("report", None);
        app.mark("s1", vec![("u1".to_string(), Mark::Present)])
            .await
            .expect("mark");

        let today = Utc::now().date_naive();
        app.report(today, today).await.expect("report");
        app.stats(current_year(), current_month()).await.expect("stats");
    }

    #[test]
    fn test_day_bounds_cover_whole_days() {
        let day = NaiveDate::from_ymd_opt(2025, 3, 7).unwrap();
        let (start, end) = day_bounds(day, day).expect("bounds");
        assert_eq!(start, Utc.with_ymd_and_hms(2025, 3, 7, 0, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2025, 3, 7, 23, 59, 59).unwrap());
    }
}
