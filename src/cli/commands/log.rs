use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use colored::Colorize;

use crate::cli::commands::source_helpers;
use crate::cli::output;
use crate::config::app_config::SourceKind;
use crate::core::errors::{Result, RosterError};
use crate::core::models::audit_log_row::{AuditFetch, AuditLogRow, AuditStatus};

/// Filters accepted by `rosterlog log`.
#[derive(Debug, Default)]
pub struct LogFilter {
    pub action: Option<String>,
    pub actor: Option<String>,
    pub target: Option<String>,
    pub status: Option<AuditStatus>,
    pub since: Option<DateTime<Utc>>,
}

impl LogFilter {
    /// Build the filter from command-line values, parsing `--since`.
    pub fn from_args(
        action: Option<String>,
        actor: Option<String>,
        target: Option<String>,
        status: Option<&str>,
        since: Option<&str>,
    ) -> Result<Self> {
        Ok(Self {
            action,
            actor,
            target,
            status: status.and_then(AuditStatus::parse),
            since: since.map(parse_since).transpose()?,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.action.is_none()
            && self.actor.is_none()
            && self.target.is_none()
            && self.status.is_none()
            && self.since.is_none()
    }

    pub fn matches(&self, row: &AuditLogRow) -> bool {
        if let Some(action) = &self.action
            && !row.action.eq_ignore_ascii_case(action.trim())
        {
            return false;
        }
        if let Some(status) = self.status
            && row.status != status
        {
            return false;
        }
        if let Some(since) = self.since
            && row.created_at < since
        {
            return false;
        }
        if let Some(actor) = &self.actor
            && !contains_any(actor, [Some(&row.actor_label), row.actor_email.as_ref()])
        {
            return false;
        }
        if let Some(target) = &self.target {
            let direct =
                contains_any(target, [row.target_name.as_ref(), row.target_email.as_ref()]);
            let in_items = row
                .target_items
                .iter()
                .any(|item| contains_any(target, [Some(&item.name), item.email.as_ref()]));
            if !direct && !in_items {
                return false;
            }
        }
        true
    }
}

fn contains_any<'a>(needle: &str, haystacks: impl IntoIterator<Item = Option<&'a String>>) -> bool {
    let needle = needle.trim().to_lowercase();
    haystacks
        .into_iter()
        .flatten()
        .any(|h| h.to_lowercase().contains(&needle))
}

/// Execute the `rosterlog log` command.
///
/// Reconstructs the audit history, applies filters, and prints the newest
/// entries first. A failed top-level query is shown as a warning.
pub fn execute(
    source: Option<SourceKind>,
    filter: LogFilter,
    last: Option<usize>,
    json: bool,
) -> Result<()> {
    let service = source_helpers::open_service(source)?;
    let fetch = source_helpers::fetch_with_spinner(&service)?;

    let display: Vec<AuditLogRow> = fetch
        .rows
        .into_iter()
        .filter(|row| filter.matches(row))
        .take(last.unwrap_or(usize::MAX))
        .collect();

    if json {
        let out = AuditFetch {
            rows: display,
            error_message: fetch.error_message,
        };
        let text = serde_json::to_string_pretty(&out).map_err(|e| RosterError::InvalidConfig {
            detail: format!("Failed to serialize audit rows: {e}"),
        })?;
        println!("{text}");
        return Ok(());
    }

    if let Some(message) = &fetch.error_message {
        output::header("rosterlog log");
        output::warning(message);
        return Ok(());
    }

    if display.is_empty() {
        output::header("rosterlog log");
        output::warning("No audit entries found");
        if !filter.is_empty() {
            println!("  Try removing filters to see all entries.");
        }
        return Ok(());
    }

    output::header(&format!("rosterlog log ({} entries)", display.len()));
    println!();

    for row in &display {
        print_entry(row);
    }

    Ok(())
}

/// Parse a date string (ISO 8601: `YYYY-MM-DD`) into a UTC DateTime.
fn parse_since(s: &str) -> Result<DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|_| {
        RosterError::InvalidConfig {
            detail: format!(
                "Invalid date format: '{s}'. Expected ISO 8601 (YYYY-MM-DD), e.g. 2026-01-15"
            ),
        }
    })?;
    Ok(Utc.from_utc_datetime(&date.and_time(chrono::NaiveTime::MIN)))
}

/// Print a single entry: header line, then one indented line per change.
fn print_entry(row: &AuditLogRow) {
    let date = row.created_at.format("%Y-%m-%d %H:%M:%S");
    let target = row.target_name.as_deref().unwrap_or("—");

    println!(
        "  {} {} {:<6} {} {} {} {} {}",
        date.to_string().dimmed(),
        "│".dimmed(),
        format!("#{}", row.id).dimmed(),
        format_event(row),
        "·".dimmed(),
        row.actor_label,
        "→".dimmed(),
        target,
    );

    for line in &row.change_items {
        println!("  {:>21} {}", "", line.dimmed());
    }
    if let Some(err) = &row.error_message {
        println!("  {:>21} {}", "", err.red());
    }
}

/// Color the event label by status.
fn format_event(row: &AuditLogRow) -> String {
    match row.status {
        AuditStatus::Ok => row.event.green().to_string(),
        AuditStatus::Partial => format!("{} (delvis)", row.event).yellow().to_string(),
        AuditStatus::Error => format!("{} (feilet)", row.event).red().to_string(),
    }
}
