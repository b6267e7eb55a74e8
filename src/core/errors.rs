use std::path::PathBuf;

/// All domain errors for rosterlog.
///
/// Each variant provides enough context to diagnose the issue
/// without needing a debugger.
#[derive(Debug, thiserror::Error)]
pub enum RosterError {
    #[error(
        "rosterlog is not initialized in this directory\n\n  \
         Run 'rosterlog init' first, or point to an existing project with --config <dir>."
    )]
    NotInitialized,

    #[error("Invalid configuration: {detail}")]
    InvalidConfig { detail: String },

    #[error(
        "This project uses format version {project_version}, but your rosterlog \
         only supports up to version {supported_version}.\n\n  \
         Solutions:\n    \
         → Install a newer rosterlog build\n    \
         → Or lower format_version in .rosterlog/config.toml"
    )]
    FormatVersionTooNew {
        project_version: u32,
        supported_version: u32,
    },

    #[error(
        "Audit source unavailable: {reason}\n\n  \
         Solutions:\n    \
         → Check that the database URL environment variable is set\n    \
         → Or switch to the file source: rosterlog log --source file"
    )]
    SourceUnavailable { reason: String },

    #[error("Audit table '{table}' does not exist in the audit source")]
    AuditTableMissing { table: String },

    #[error("Audit query failed: {reason}")]
    AuditQueryFailed { reason: String },

    /// The audit log could not be read; `message` is already user-facing.
    #[error("{message}")]
    AuditLogUnreadable { message: String },

    #[error("Member lookup failed: {reason}")]
    MemberLookupFailed { reason: String },

    #[error(
        "Malformed line {line} in {}: {detail}\n\n  \
         Expected format: one JSON object per line.",
        .file.display()
    )]
    MalformedSourceLine {
        file: PathBuf,
        line: usize,
        detail: String,
    },

    #[error(
        "Audit entry '{id}' not found\n\n  \
         Run 'rosterlog log' to list the ids of recent entries."
    )]
    EntryNotFound { id: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, RosterError>;
