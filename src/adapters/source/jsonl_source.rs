use std::collections::HashSet;
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;

use crate::config::app_config::SourceSection;
use crate::core::errors::{Result, RosterError};
use crate::core::models::member::Member;
use crate::core::models::raw_audit_row::RawAuditRow;
use crate::core::services::audit_service::AUDIT_TABLE;
use crate::core::services::tokens::{normalize_email, normalize_id, uuid_of};
use crate::core::traits::audit_source::AuditSource;

/// Audit source backed by JSON Lines exports of `admin_audit_log` and
/// `members`.
///
/// Each line in either file is a self-contained JSON object. A missing
/// audit file plays the role of a missing table; a missing members file is
/// an empty member table.
pub struct JsonlAuditSource {
    audit_path: PathBuf,
    members_path: PathBuf,
}

impl JsonlAuditSource {
    pub fn new(audit_path: PathBuf, members_path: PathBuf) -> Self {
        Self {
            audit_path,
            members_path,
        }
    }

    /// Create a source for the files named in `[source]`, relative to the
    /// project directory.
    pub fn from_config(dir: &Path, section: &SourceSection) -> Self {
        Self::new(dir.join(&section.audit_file), dir.join(&section.members_file))
    }

    fn read_lines<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
        let file = fs::File::open(path).map_err(|e| RosterError::AuditQueryFailed {
            reason: format!("Cannot read {}: {e}", path.display()),
        })?;

        let reader = BufReader::new(file);
        let mut items = Vec::new();

        for (line_num, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| RosterError::AuditQueryFailed {
                reason: format!("Error reading {} line {}: {e}", path.display(), line_num + 1),
            })?;

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let item: T =
                serde_json::from_str(trimmed).map_err(|e| RosterError::MalformedSourceLine {
                    file: path.to_path_buf(),
                    line: line_num + 1,
                    detail: e.to_string(),
                })?;
            items.push(item);
        }

        Ok(items)
    }

    fn members(&self) -> Result<Vec<Member>> {
        if !self.members_path.exists() {
            return Ok(Vec::new());
        }
        Self::read_lines(&self.members_path).map_err(|e| RosterError::MemberLookupFailed {
            reason: e.to_string(),
        })
    }
}

impl AuditSource for JsonlAuditSource {
    fn fetch_raw_rows(&self, limit: usize) -> Result<Vec<RawAuditRow>> {
        if !self.audit_path.exists() {
            return Err(RosterError::AuditTableMissing {
                table: AUDIT_TABLE.to_string(),
            });
        }

        let mut rows: Vec<RawAuditRow> = Self::read_lines(&self.audit_path)?;
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        rows.truncate(limit);
        Ok(rows)
    }

    fn members_by_ids(&self, ids: &[String]) -> Result<Vec<Member>> {
        let wanted: HashSet<&str> = ids.iter().map(String::as_str).collect();
        Ok(self
            .members()?
            .into_iter()
            .filter(|m| {
                uuid_of(&m.id)
                    .or_else(|| normalize_id(&m.id))
                    .is_some_and(|id| wanted.contains(id.as_str()))
            })
            .collect())
    }

    fn members_by_emails(&self, emails: &[String]) -> Result<Vec<Member>> {
        let wanted: HashSet<&str> = emails.iter().map(String::as_str).collect();
        Ok(self
            .members()?
            .into_iter()
            .filter(|m| {
                m.email
                    .as_deref()
                    .and_then(normalize_email)
                    .is_some_and(|e| wanted.contains(e.as_str()))
            })
            .collect())
    }
}
