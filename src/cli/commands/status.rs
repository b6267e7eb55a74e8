use colored::Colorize;

use crate::cli::commands::source_helpers::ProjectSource;
use crate::cli::output;
use crate::config::app_config::{AppConfig, SourceKind};
use crate::core::errors::Result;
use crate::core::services::audit_service::{EngineSettings, describe_fetch_error};
use crate::core::traits::audit_source::AuditSource;

/// Execute the `rosterlog status` command.
///
/// Prints the configuration and checks that the audit source answers.
/// An unreachable source is reported, not returned as an error.
pub fn execute(source: Option<SourceKind>) -> Result<()> {
    let dir = crate::cli::context::rosterlog_dir();
    let config = AppConfig::load(dir)?;
    let settings = EngineSettings::from_config(config.engine.as_ref());
    let kind = source.unwrap_or(config.source.kind);

    output::header(&format!("rosterlog v{}", env!("CARGO_PKG_VERSION")));
    println!("  Config: {}", dir.join("config.toml").display());
    println!("  Source: {}", kind.to_string().cyan());
    match kind {
        SourceKind::File => {
            println!("  Audit file: {}", config.source.audit_file);
            println!("  Members file: {}", config.source.members_file);
        }
        SourceKind::Postgres => {
            println!("  Database URL from: ${}", config.source.database_url_env);
        }
    }

    println!("\n{}", "  Engine".bold());
    println!("  Fetch limit: {}", settings.fetch_limit);
    println!("  Lookup chunk size: {}", settings.lookup_chunk_size);
    println!("  Sync window: {}s", settings.sync_window.num_seconds());

    println!("\n{}", "  Source health".bold());
    let opened = match ProjectSource::open(dir, &config, Some(kind)) {
        Ok(s) => s,
        Err(e) => {
            output::warning(&e.to_string());
            return Ok(());
        }
    };

    if let ProjectSource::Postgres(pg) = &opened {
        match pg.ping() {
            Ok(()) => output::success("Database reachable"),
            Err(e) => {
                output::warning(&e.to_string());
                return Ok(());
            }
        }
    }

    match opened.fetch_raw_rows(settings.fetch_limit) {
        Ok(rows) if rows.is_empty() => output::warning("Audit log is empty"),
        Ok(rows) => output::success(&format!(
            "{} audit rows readable (newest {})",
            rows.len(),
            rows[0].created_at.format("%Y-%m-%d %H:%M")
        )),
        Err(e) => output::warning(&describe_fetch_error(&e)),
    }

    Ok(())
}
