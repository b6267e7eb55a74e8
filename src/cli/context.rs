use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::core::errors::{Result, RosterError};

static ROSTERLOG_DIR: OnceLock<PathBuf> = OnceLock::new();

/// Initialize the global project directory path.
/// If `custom` is provided, uses that path; otherwise defaults to `.rosterlog`.
pub fn init(custom: Option<&str>) {
    let dir = custom
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(".rosterlog"));
    let _ = ROSTERLOG_DIR.set(dir);
}

/// Get the current project directory path.
pub fn rosterlog_dir() -> &'static Path {
    ROSTERLOG_DIR
        .get()
        .map(|p| p.as_path())
        .unwrap_or(Path::new(".rosterlog"))
}

/// Reject file names that could escape the project directory.
pub fn validate_simple_filename(name: &str, what: &str) -> Result<()> {
    let bad = name.trim().is_empty()
        || name.contains('/')
        || name.contains('\\')
        || name == "."
        || name.contains("..");
    if bad {
        return Err(RosterError::InvalidConfig {
            detail: format!("Invalid {what} name '{name}': must be a plain file name"),
        });
    }
    Ok(())
}
