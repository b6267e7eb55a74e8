use std::collections::HashSet;

use chrono::Duration;
use tracing::debug;

use crate::core::models::raw_audit_row::RawAuditRow;
use crate::core::services::target_resolver::{target_lookup_emails, target_lookup_ids};
use crate::core::services::tokens::normalize_id;

/// Default distance, in seconds, between an application row and the
/// trigger row it caused.
pub const DEFAULT_SYNC_WINDOW_SECS: i64 = 5;

fn has_actor(row: &RawAuditRow) -> bool {
    row.actor_id.as_deref().and_then(normalize_id).is_some()
}

/// A row written by a database trigger mirroring some application change.
pub fn is_sync_row(row: &RawAuditRow) -> bool {
    matches!(row.action.as_str(), "member.update" | "member.delete") && !has_actor(row)
}

/// Application actions whose side effects show up as the given sync action.
fn explains(app_action: &str, sync_action: &str) -> bool {
    match sync_action {
        "member.update" => matches!(app_action, "member.ban" | "member.unban"),
        "member.delete" => app_action == "member.delete",
        _ => false,
    }
}

/// `id:<uuid>` and `email:<addr>` tokens for every identity a row mentions.
pub fn identity_tokens(row: &RawAuditRow) -> HashSet<String> {
    target_lookup_ids(row)
        .into_iter()
        .map(|id| format!("id:{id}"))
        .chain(
            target_lookup_emails(row)
                .into_iter()
                .map(|email| format!("email:{email}")),
        )
        .collect()
}

/// Drop sync rows already explained by an application row.
///
/// A sync row goes when some row with a real actor, a related action, a
/// timestamp within `window`, and at least one shared identity token
/// exists. Everything else is kept in its original order.
pub fn filter_redundant_sync_rows(rows: Vec<RawAuditRow>, window: Duration) -> Vec<RawAuditRow> {
    let tokens: Vec<HashSet<String>> = rows.iter().map(identity_tokens).collect();

    let redundant: HashSet<usize> = rows
        .iter()
        .enumerate()
        .filter(|(_, row)| is_sync_row(row))
        .filter(|(i, sync)| {
            rows.iter().enumerate().any(|(j, app)| {
                j != *i
                    && has_actor(app)
                    && explains(&app.action, &sync.action)
                    && (app.created_at - sync.created_at).abs() <= window
                    && !tokens[*i].is_disjoint(&tokens[j])
            })
        })
        .map(|(i, _)| i)
        .collect();

    if !redundant.is_empty() {
        debug!(dropped = redundant.len(), "dropped redundant sync rows");
    }

    rows.into_iter()
        .enumerate()
        .filter(|(i, _)| !redundant.contains(i))
        .map(|(_, row)| row)
        .collect()
}
