//! Command line definition for the `dojo` operator tool.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use dojo_core::models::Mark;

#[derive(Parser, Debug)]
#[command(name = "dojo")]
#[command(about = "Attendance and progression ledger for the collective")]
#[command(version)]
pub struct Cli {
    /// Ignore cached snapshots and fetch from the store.
    #[arg(long, global = true)]
    pub refresh: bool,

    /// Who is making changes; recorded in the audit log.
    #[arg(long, global = true, env = "DOJO_ACTOR")]
    pub actor: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Featured students for a year (defaults to the current year).
    Featured { year: Option<i32> },

    /// Featured students by points earned in one month.
    Monthly {
        year: i32,
        #[arg(value_parser = clap::value_parser!(u32).range(1..=12))]
        month: u32,
    },

    /// Current grade, next grade and progress of one student.
    Progress { student_id: String, year: Option<i32> },

    /// The grade ladder, lowest first.
    Ladder,

    /// Dashboard figures: students, average points, sessions and the
    /// month's attendance (defaults to the current year and month).
    Stats {
        year: Option<i32>,
        #[arg(value_parser = clap::value_parser!(u32).range(1..=12))]
        month: Option<u32>,
    },

    /// Attendance between two dates (inclusive, YYYY-MM-DD).
    Report { from: NaiveDate, to: NaiveDate },

    /// Save a session's attendance sheet, e.g. `mark s1 u1=present u2=absent`.
    Mark {
        session_id: String,
        #[arg(value_parser = parse_mark, required = true)]
        marks: Vec<(String, Mark)>,
    },

    /// Override a student's points for a year.
    SetPoints {
        student_id: String,
        year: i32,
        value: u32,
        reason: String,
    },

    /// Assign a grade to a student.
    AssignGrade {
        student_id: String,
        grade_id: String,
        reason: String,
    },

    /// Remove a student's assigned grade.
    ClearGrade { student_id: String, reason: String },

    /// Audit history of one student.
    History { student_id: String },

    /// Age of the local snapshots.
    CacheAge,
}

/// Parse `student=present|absent|unset`.
pub fn parse_mark(arg: &str) -> Result<(String, Mark), String> {
    let (student, mark) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected student=mark, got '{}'", arg))?;
    let student = student.trim();
    if student.is_empty() {
        return Err(format!("missing student id in '{}'", arg));
    }
    let mark = match mark.trim().to_ascii_lowercase().as_str() {
        "present" | "p" => Mark::Present,
        "absent" | "a" => Mark::Absent,
        "unset" | "" => Mark::Unset,
        other => return Err(format!("unknown mark '{}'", other)),
    };
    Ok((student.to_string(), mark))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mark() {
        assert_eq!(parse_mark("u1=present"), Ok(("u1".to_string(), Mark::Present)));
        assert_eq!(parse_mark("u2=A"), Ok(("u2".to_string(), Mark::Absent)));
        assert_eq!(parse_mark("u3="), Ok(("u3".to_string(), Mark::Unset)));
        assert!(parse_mark("u4").is_err());
        assert!(parse_mark("=present").is_err());
        assert!(parse_mark("u5=late").is_err());
    }

    #[test]
    fn test_cli_parses_subcommands() {
        let cli = Cli::try_parse_from(["dojo", "set-points", "u1", "2025", "30", "seminar"])
            .expect("valid args");
        match cli.command {
            Command::SetPoints { student_id, year, value, reason } => {
                assert_eq!(student_id, "u1");
                assert_eq!(year, 2025);
                assert_eq!(value, 30);
                assert_eq!(reason, "seminar");
            }
            other => panic!("unexpected command: {other:?}"),
        }

        let cli = Cli::try_parse_from(["dojo", "--refresh", "mark", "s1", "u1=p", "u2=a"])
            .expect("valid args");
        assert!(cli.refresh);
        assert!(matches!(cli.command, Command::Mark { ref marks, .. } if marks.len() == 2));

        let cli = Cli::try_parse_from(["dojo", "report", "2025-03-01", "2025-03-31"]).expect("valid args");
        match cli.command {
            Command::Report { from, to } => {
                assert_eq!(from, NaiveDate::from_ymd_opt(2025, 3, 1).unwrap());
                assert_eq!(to, NaiveDate::from_ymd_opt(2025, 3, 31).unwrap());
            }
            other => panic!("unexpected command: {other:?}"),
        }

        let cli = Cli::try_parse_from(["dojo", "assign-grade", "u1", "none", "exam"]).expect("valid args");
        assert!(matches!(cli.command, Command::AssignGrade { ref grade_id, .. } if grade_id == "none"));
        let cli = Cli::try_parse_from(["dojo", "clear-grade", "u1", "revoked"]).expect("valid args");
        assert!(matches!(cli.command, Command::ClearGrade { .. }));

        assert!(Cli::try_parse_from(["dojo", "report", "2025-03-01", "yesterday"]).is_err());
        assert!(Cli::try_parse_from(["dojo", "stats", "2025", "0"]).is_err());
        assert!(Cli::try_parse_from(["dojo", "monthly", "2025", "13"]).is_err());
        assert!(Cli::try_parse_from(["dojo", "mark", "s1"]).is_err());
    }
}
