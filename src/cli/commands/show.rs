use colored::Colorize;

use crate::cli::commands::source_helpers;
use crate::cli::output;
use crate::config::app_config::SourceKind;
use crate::core::errors::{Result, RosterError};
use crate::core::models::audit_log_row::{AuditLogRow, AuditStatus, TargetItemStatus};

/// Execute the `rosterlog show <id>` command.
///
/// Only rows that survive sync-row filtering inside the fetch window can be
/// shown.
pub fn execute(source: Option<SourceKind>, id: &str) -> Result<()> {
    let service = source_helpers::open_service(source)?;
    let fetch = source_helpers::fetch_with_spinner(&service)?;

    if let Some(message) = fetch.error_message {
        return Err(RosterError::AuditLogUnreadable { message });
    }

    let wanted = id.trim().trim_start_matches('#');
    let row = fetch
        .rows
        .iter()
        .find(|r| r.id == wanted)
        .ok_or_else(|| RosterError::EntryNotFound {
            id: wanted.to_string(),
        })?;

    print_detail(row);
    Ok(())
}

fn print_detail(row: &AuditLogRow) {
    output::header(&format!("{} (#{})", row.event, row.id));

    field("Tidspunkt", &row.created_at.format("%Y-%m-%d %H:%M:%S UTC").to_string());
    field("Handling", &row.action);
    field("Utført av", &with_email(&row.actor_label, row.actor_email.as_deref()));
    if let Some(name) = &row.target_name {
        field("Gjelder", &with_email(name, row.target_email.as_deref()));
    }
    field("Status", &format_status(row.status));
    if let Some(err) = &row.error_message {
        field("Feilmelding", &err.red().to_string());
    }

    if !row.change_items.is_empty() {
        println!("\n{}", "  Endringer".bold());
        for line in &row.change_items {
            println!("  {} {line}", "•".dimmed());
        }
    }

    if !row.target_items.is_empty() {
        println!(
            "\n{}",
            format!("  Medlemmer ({})", row.target_items.len()).bold()
        );
        for item in &row.target_items {
            let marker = match item.status {
                TargetItemStatus::Ok => "✓".green(),
                TargetItemStatus::Skipped => "—".yellow(),
                TargetItemStatus::Error => "✗".red(),
            };
            let note = item
                .reason
                .as_deref()
                .or(item.change.as_deref())
                .unwrap_or("");
            println!(
                "  {marker} {} {}",
                with_email(&item.name, item.email.as_deref()),
                note.dimmed()
            );
        }
    }

    if let Some(details) = &row.details
        && let Ok(pretty) = serde_json::to_string_pretty(details)
    {
        println!("\n{}", "  Detaljer".bold());
        for line in pretty.lines() {
            println!("  {}", line.dimmed());
        }
    }
}

fn field(label: &str, value: &str) {
    println!("  {:<12} {value}", format!("{label}:").dimmed());
}

fn with_email(name: &str, email: Option<&str>) -> String {
    match email {
        Some(e) if !e.eq_ignore_ascii_case(name) => format!("{name} <{e}>"),
        _ => name.to_string(),
    }
}

fn format_status(status: AuditStatus) -> String {
    match status {
        AuditStatus::Ok => "ok".green().to_string(),
        AuditStatus::Partial => "partial".yellow().to_string(),
        AuditStatus::Error => "error".red().to_string(),
    }
}
