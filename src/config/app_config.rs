use serde::Deserialize;
use std::path::Path;

use crate::core::errors::{Result, RosterError};
use crate::core::services::audit_service::{DEFAULT_FETCH_LIMIT, DEFAULT_LOOKUP_CHUNK_SIZE};
use crate::core::services::sync_filter::DEFAULT_SYNC_WINDOW_SECS;

/// Top-level rosterlog configuration read from `.rosterlog/config.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub rosterlog: RosterlogSection,
    pub source: SourceSection,
    pub engine: Option<EngineSection>,
}

impl AppConfig {
    /// Load the configuration from `{dir}/config.toml`.
    ///
    /// After parsing, validates the source file names to prevent path
    /// traversal from a tampered config file, and rejects engine limits
    /// that would make a read meaningless.
    pub fn load(dir: &Path) -> Result<Self> {
        let config_path = dir.join("config.toml");
        if !config_path.exists() {
            return Err(RosterError::NotInitialized);
        }
        let content = std::fs::read_to_string(&config_path)?;
        Self::parse(&content)
    }

    /// Parse and validate configuration text.
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| RosterError::InvalidConfig {
            detail: format!("Failed to parse config.toml: {e}"),
        })?;

        if config.rosterlog.format_version > CURRENT_FORMAT_VERSION {
            return Err(RosterError::FormatVersionTooNew {
                project_version: config.rosterlog.format_version,
                supported_version: CURRENT_FORMAT_VERSION,
            });
        }

        crate::cli::context::validate_simple_filename(&config.source.audit_file, "audit file")?;
        crate::cli::context::validate_simple_filename(
            &config.source.members_file,
            "members file",
        )?;

        if let Some(engine) = &config.engine {
            if engine.fetch_limit == 0 {
                return Err(RosterError::InvalidConfig {
                    detail: "engine.fetch_limit must be at least 1".into(),
                });
            }
            if engine.lookup_chunk_size == 0 {
                return Err(RosterError::InvalidConfig {
                    detail: "engine.lookup_chunk_size must be at least 1".into(),
                });
            }
            if !(0..=MAX_SYNC_WINDOW_SECS).contains(&engine.sync_window_secs) {
                return Err(RosterError::InvalidConfig {
                    detail: format!(
                        "engine.sync_window_secs must be between 0 and {MAX_SYNC_WINDOW_SECS}"
                    ),
                });
            }
        }

        Ok(config)
    }
}

/// Current format version supported by this build of rosterlog.
pub const CURRENT_FORMAT_VERSION: u32 = 1;

/// Largest accepted sync window: one day.
pub const MAX_SYNC_WINDOW_SECS: i64 = 86_400;

/// The `[rosterlog]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct RosterlogSection {
    pub version: String,
    /// Format version for backward compatibility. Defaults to 1 if missing.
    #[serde(default = "default_format_version")]
    pub format_version: u32,
}

fn default_format_version() -> u32 {
    1
}

/// Where the audit log is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// JSON Lines export inside the project directory.
    File,
    /// Live PostgreSQL database.
    Postgres,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File => f.write_str("file"),
            Self::Postgres => f.write_str("postgres"),
        }
    }
}

/// The `[source]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceSection {
    pub kind: SourceKind,
    /// Environment variable holding the PostgreSQL connection URL.
    #[serde(default = "default_database_url_env")]
    pub database_url_env: String,
    #[serde(default = "default_audit_file")]
    pub audit_file: String,
    #[serde(default = "default_members_file")]
    pub members_file: String,
}

fn default_database_url_env() -> String {
    "DATABASE_URL".to_string()
}

fn default_audit_file() -> String {
    "audit_log.jsonl".to_string()
}

fn default_members_file() -> String {
    "members.jsonl".to_string()
}

/// The `[engine]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineSection {
    #[serde(default = "default_fetch_limit")]
    pub fetch_limit: usize,
    #[serde(default = "default_lookup_chunk_size")]
    pub lookup_chunk_size: usize,
    #[serde(default = "default_sync_window_secs")]
    pub sync_window_secs: i64,
}

fn default_fetch_limit() -> usize {
    DEFAULT_FETCH_LIMIT
}

fn default_lookup_chunk_size() -> usize {
    DEFAULT_LOOKUP_CHUNK_SIZE
}

fn default_sync_window_secs() -> i64 {
    DEFAULT_SYNC_WINDOW_SECS
}
