use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

/// Overall outcome of an audited action, as shown to the reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditStatus {
    Ok,
    /// A bulk action that updated some members and skipped others.
    Partial,
    Error,
}

impl AuditStatus {
    /// Parse the `--status` filter value.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "ok" => Some(Self::Ok),
            "partial" => Some(Self::Partial),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

impl fmt::Display for AuditStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Ok => "ok",
            Self::Partial => "partial",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

/// Outcome for a single member inside a bulk action.
///
/// Variant order is the display order: errors first, then skips.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetItemStatus {
    Error,
    Skipped,
    Ok,
}

impl fmt::Display for TargetItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Error => "error",
            Self::Skipped => "skipped",
            Self::Ok => "ok",
        };
        f.write_str(s)
    }
}

/// One affected member of a bulk action.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditTargetItem {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub status: TargetItemStatus,
    pub reason: Option<String>,
    pub change: Option<String>,
}

/// Display-ready audit entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditLogRow {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub action: String,
    pub event: String,
    pub actor_id: Option<String>,
    pub actor_label: String,
    pub actor_email: Option<String>,
    pub target_table: Option<String>,
    pub target_id: Option<String>,
    pub target_uuid: Option<String>,
    pub target_email: Option<String>,
    pub target_name: Option<String>,
    pub change: Option<String>,
    pub change_items: Vec<String>,
    pub target_items: Vec<AuditTargetItem>,
    pub status: AuditStatus,
    pub error_message: Option<String>,
    pub details: Option<Value>,
}

/// Result of one read of the audit log.
///
/// `error_message` is set when the top-level query failed; `rows` is then
/// empty. Callers render it as a page-level message rather than failing.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AuditFetch {
    pub rows: Vec<AuditLogRow>,
    pub error_message: Option<String>,
}
