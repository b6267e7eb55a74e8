use colored::Colorize;

use crate::cli::output;
use crate::config::app_config::{CURRENT_FORMAT_VERSION, SourceKind};
use crate::core::errors::{Result, RosterError};

/// Execute the `rosterlog init` command.
///
/// Creates the project directory with a default `config.toml`. For the
/// file source it also creates empty JSONL exports to drop rows into.
pub fn execute(source: Option<SourceKind>) -> Result<()> {
    let dir = crate::cli::context::rosterlog_dir();

    if dir.exists() {
        return Err(RosterError::InvalidConfig {
            detail: format!(
                "rosterlog is already initialized here ({} exists)",
                dir.display()
            ),
        });
    }

    let kind = source.unwrap_or(SourceKind::File);

    output::header("rosterlog: initializing project");

    std::fs::create_dir_all(dir)?;
    output::success(&format!("Created {}/", dir.display()));

    std::fs::write(dir.join("config.toml"), default_config(kind))?;
    output::success("Generated config.toml with defaults");

    match kind {
        SourceKind::File => {
            std::fs::write(dir.join("audit_log.jsonl"), "")?;
            std::fs::write(dir.join("members.jsonl"), "")?;
            output::success("Created audit_log.jsonl and members.jsonl");
            println!(
                "\n  Export rows into {} (one JSON object per line), then run {}.",
                dir.join("audit_log.jsonl").display(),
                "rosterlog log".cyan()
            );
        }
        SourceKind::Postgres => {
            println!(
                "\n  Set {} to your connection URL, then run {}.",
                "DATABASE_URL".cyan(),
                "rosterlog status".cyan()
            );
        }
    }

    Ok(())
}

fn default_config(kind: SourceKind) -> String {
    format!(
        r#"[rosterlog]
version = "{version}"
format_version = {CURRENT_FORMAT_VERSION}

[source]
kind = "{kind}"
database_url_env = "DATABASE_URL"
audit_file = "audit_log.jsonl"
members_file = "members.jsonl"

# [engine]
# fetch_limit = 1000
# lookup_chunk_size = 100
# sync_window_secs = 5
"#,
        version = env!("CARGO_PKG_VERSION"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::app_config::AppConfig;

    #[test]
    fn default_config_parses_for_both_kinds() {
        let file = AppConfig::parse(&default_config(SourceKind::File)).unwrap();
        assert_eq!(file.source.kind, SourceKind::File);
        assert!(file.engine.is_none());

        let pg = AppConfig::parse(&default_config(SourceKind::Postgres)).unwrap();
        assert_eq!(pg.source.kind, SourceKind::Postgres);
        assert_eq!(pg.source.database_url_env, "DATABASE_URL");
    }
}
