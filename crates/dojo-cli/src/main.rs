//! `dojo` - operator command line for the attendance and progression
//! ledger.
//!
//! Connection settings come from `~/.config/dojo/config.json`, overridable
//! through `DOJO_STORE_URL` / `DOJO_APP_ID` (a `.env` file is honored). The
//! API token is read from `DOJO_API_TOKEN`.

mod cli;
mod commands;

use std::io;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use dojo_core::cache::CacheManager;
use dojo_core::config::Config;
use dojo_core::RestStore;

use cli::{Cli, Command};
use commands::{current_month, current_year, App};

/// Initialize the tracing subscriber. Logs go to stderr through a
/// background writer; keep the guard alive until exit so it flushes.
fn init_tracing() -> WorkerGuard {
    // RUST_LOG controls the level (e.g. RUST_LOG=dojo_core=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let (writer, guard) = tracing_appender::non_blocking(io::stderr());

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(writer))
        .with(filter)
        .init();
    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let _guard = init_tracing();
    let cli = Cli::parse();

    let config = Config::load().context("Failed to load config")?;
    let cache = CacheManager::new(config.cache_dir()?)?.with_ttl(config.cache_ttl_minutes);
    if let Command::CacheAge = cli.command {
        commands::cache_age(&cache);
        return Ok(());
    }

    let (url, app_id) = config.connection()?;
    let mut store = RestStore::new(url, app_id)?;
    if let Some(token) = Config::api_token() {
        store = store.with_token(token);
    }
    info!(store_url = url, app_id, "Connected to store");

    let app = App {
        store: Arc::new(store),
        cache,
        config,
        refresh: cli.refresh,
        actor: cli.actor,
    };

    match cli.command {
        Command::Featured { year } => app.featured(year.unwrap_or_else(current_year)).await,
        Command::Monthly { year, month } => app.monthly(year, month).await,
        Command::Progress { student_id, year } => {
            app.progress(&student_id, year.unwrap_or_else(current_year)).await
        }
        Command::Ladder => app.ladder_report().await,
        Command::Stats { year, month } => {
            app.stats(year.unwrap_or_else(current_year), month.unwrap_or_else(current_month))
                .await
        }
        Command::Report { from, to } => app.report(from, to).await,
        Command::Mark { session_id, marks } => app.mark(&session_id, marks).await,
        Command::SetPoints {
            student_id,
            year,
            value,
            reason,
        } => app.set_points(&student_id, year, value, &reason).await,
        Command::AssignGrade {
            student_id,
            grade_id,
            reason,
        } => app.assign_grade(&student_id, Some(&grade_id), &reason).await,
        Command::ClearGrade { student_id, reason } => app.assign_grade(&student_id, None, &reason).await,
        Command::History { student_id } => app.history(&student_id).await,
        Command::CacheAge => Ok(()),
    }
}
