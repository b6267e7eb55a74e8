use serde_json::Value;

use crate::core::models::raw_audit_row::RawAuditRow;
use crate::core::services::bulk_targets::BulkCounts;
use crate::core::services::labels::{
    IGNORED_FIELDS, MEMBER_FIELDS, active_label, field_label, member_count, privilege_label,
    yes_no,
};
use crate::core::services::tokens::{
    as_bool, as_count, as_id_list, as_number, as_object, as_string, dedup_preserving_order,
    full_name,
};

/// Human-readable "what changed" lines for one raw row.
///
/// Each action family reads its own keys out of `details`; anything missing
/// or mistyped simply produces fewer lines.
pub fn change_lines(row: &RawAuditRow) -> Vec<String> {
    match row.action.as_str() {
        "member.membership_status.update" => membership_lines(row),
        "member.rename" => rename_lines(row),
        "member.privilege.update" => privilege_lines(row),
        "member.ban" => ban_lines(row, true),
        "member.unban" => ban_lines(row, false),
        "member.create" | "member.activate" => create_lines(row),
        "member.delete" => delete_lines(row),
        "member.update" => update_lines(row),
        _ => as_string(row.detail("change"))
            .or_else(|| as_string(row.detail("summary")))
            .into_iter()
            .collect(),
    }
}

/// First value present under any of `keys`, looking in `details` then in
/// the nested `object` (e.g. `old` / `new`) under `field`.
fn pick<'a>(row: &'a RawAuditRow, keys: &[&str], object: &str, field: &str) -> Option<&'a Value> {
    keys.iter()
        .find_map(|k| row.detail(k).filter(|v| !v.is_null()))
        .or_else(|| as_object(row.detail(object)).and_then(|o| o.get(field)))
        .filter(|v| !v.is_null())
}

fn active_flags(row: &RawAuditRow) -> (Option<bool>, Option<bool>) {
    let before = as_bool(pick(
        row,
        &["previous_is_active", "previous_active"],
        "old",
        "is_active",
    ));
    let after = as_bool(pick(row, &["is_active", "active"], "new", "is_active"));
    (before, after)
}

fn transition(label: &str, before: Option<String>, after: Option<String>) -> Option<String> {
    match (before, after) {
        (Some(b), Some(a)) if b != a => Some(format!("{label}: {b} -> {a}")),
        (_, Some(a)) => Some(format!("{label}: {a}")),
        (Some(b), None) => Some(format!("{label}: {b}")),
        (None, None) => None,
    }
}

fn count_lines(counts: &BulkCounts) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(n) = counts.updated {
        lines.push(format!("Oppdatert: {}", member_count(n)));
    }
    if let Some(n) = counts.skipped {
        lines.push(format!("Uendret: {}", member_count(n)));
    }
    if let Some(n) = counts.failed.filter(|n| *n > 0) {
        lines.push(format!("Feilet: {}", member_count(n)));
    }
    lines
}

fn membership_lines(row: &RawAuditRow) -> Vec<String> {
    let (before, after) = active_flags(row);
    let mut lines: Vec<String> = transition(
        "Medlemskap",
        before.map(|b| active_label(b).to_string()),
        after.map(|a| active_label(a).to_string()),
    )
    .into_iter()
    .collect();
    lines.extend(count_lines(&BulkCounts::from_row(row)));
    lines
}

fn rename_lines(row: &RawAuditRow) -> Vec<String> {
    let name_from = |first: &[&str], last: &[&str], object: &str, plain: &[&str]| {
        let first = as_string(pick(row, first, object, "firstname"));
        let last = as_string(pick(row, last, object, "lastname"));
        full_name(first.as_deref(), last.as_deref())
            .or_else(|| as_string(pick(row, plain, object, "name")))
    };

    let before = name_from(
        &["previous_firstname"],
        &["previous_lastname"],
        "old",
        &["previous_name"],
    );
    let after = name_from(&["firstname"], &["lastname"], "new", &["name"]);

    match (before, after) {
        (Some(b), Some(a)) if b != a => vec![format!("Navn: {b} -> {a}")],
        (_, Some(a)) => vec![format!("Navn: {a}")],
        _ => Vec::new(),
    }
}

fn privilege_lines(row: &RawAuditRow) -> Vec<String> {
    let before = as_number(pick(
        row,
        &["previous_privilege_type"],
        "old",
        "privilege_type",
    ));
    let after = as_number(pick(
        row,
        &["privilege_type", "next_privilege_type"],
        "new",
        "privilege_type",
    ));

    match transition(
        "Tilgang",
        before.map(privilege_label),
        after.map(privilege_label),
    ) {
        Some(line) => vec![line],
        None => count_lines(&BulkCounts::from_row(row)),
    }
}

fn ban_lines(row: &RawAuditRow, banned: bool) -> Vec<String> {
    let mut lines = vec![format!(
        "Utestengt: {} -> {}",
        yes_no(!banned),
        yes_no(banned)
    )];
    let (before, after) = active_flags(row);
    lines.extend(transition(
        "Medlemskap",
        before.map(|b| active_label(b).to_string()),
        after.map(|a| active_label(a).to_string()),
    ));
    if let Some(reason) = as_string(row.detail("reason")) {
        lines.push(format!("Begrunnelse: {reason}"));
    }
    lines
}

fn create_lines(row: &RawAuditRow) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(level) = as_number(pick(row, &["privilege_type"], "new", "privilege_type")) {
        lines.push(format!("Tilgang: {}", privilege_label(level)));
    }
    let active = as_bool(pick(row, &["is_active"], "new", "is_active"))
        .or((row.action == "member.activate").then_some(true));
    if let Some(active) = active {
        lines.push(format!("Medlemskap aktivt: {}", yes_no(active)));
    }
    lines
}

fn delete_lines(row: &RawAuditRow) -> Vec<String> {
    let count = as_count(row.detail("deleted_count"))
        .or_else(|| non_empty_len(as_id_list(row.detail("deleted_member_ids"))))
        .or_else(|| non_empty_len(as_id_list(row.detail("member_ids"))))
        .unwrap_or(1);

    if count > 1 {
        vec![format!("Slettet {}", member_count(count))]
    } else {
        vec!["Medlem slettet".to_string()]
    }
}

fn non_empty_len(ids: Vec<String>) -> Option<usize> {
    (!ids.is_empty()).then_some(ids.len())
}

/// Fields a generic `member.update` row talks about: an explicit list, the
/// keys of the `old`/`new` objects, or the known member fields that appear
/// in any key variant.
fn inferred_fields(row: &RawAuditRow) -> Vec<String> {
    let explicit = as_id_list(row.detail("changed_fields"));
    if !explicit.is_empty() {
        return explicit;
    }

    let old = as_object(row.detail("old"));
    let new = as_object(row.detail("new"));
    if old.is_some() || new.is_some() {
        let keys = old
            .into_iter()
            .chain(new)
            .flat_map(|o| o.keys().cloned())
            .filter(|k| !IGNORED_FIELDS.contains(&k.as_str()));
        return dedup_preserving_order(keys);
    }

    MEMBER_FIELDS
        .iter()
        .filter(|f| {
            [format!("previous_{f}"), format!("next_{f}"), (*f).to_string()]
                .iter()
                .any(|k| row.detail(k).is_some())
        })
        .map(|f| (*f).to_string())
        .collect()
}

fn update_lines(row: &RawAuditRow) -> Vec<String> {
    let fields = inferred_fields(row);
    if fields.is_empty() {
        let fallback = if row.actor_id.as_deref().is_some_and(|a| !a.trim().is_empty()) {
            "Medlem oppdatert"
        } else {
            "Synkronisert fra databasen"
        };
        return vec![fallback.to_string()];
    }

    fields
        .iter()
        .filter_map(|field| {
            let previous_key = format!("previous_{field}");
            let next_key = format!("next_{field}");
            let before = pick(row, &[], "old", field).or_else(|| row.detail(&previous_key));
            let after = pick(row, &[], "new", field)
                .or_else(|| row.detail(&next_key))
                .or_else(|| row.detail(field));

            if before.is_none() && after.is_none() {
                return None;
            }
            if values_equal(before, after) {
                return None;
            }
            Some(format!(
                "{}: {} -> {}",
                field_label(field),
                format_value(field, before),
                format_value(field, after)
            ))
        })
        .collect()
}

/// Structural equality where absent equals null and numbers compare by value.
pub fn values_equal(a: Option<&Value>, b: Option<&Value>) -> bool {
    let a = a.unwrap_or(&Value::Null);
    let b = b.unwrap_or(&Value::Null);
    if a == b {
        return true;
    }
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => serde_json::to_string(a).ok() == serde_json::to_string(b).ok(),
    }
}

/// Render a detail value for a diff line.
pub fn format_value(field: &str, value: Option<&Value>) -> String {
    let Some(value) = value else {
        return "-".to_string();
    };
    if field == "privilege_type"
        && let Some(level) = as_number(Some(value))
    {
        return privilege_label(level);
    }
    match value {
        Value::Null => "-".to_string(),
        Value::Bool(b) => yes_no(*b).to_string(),
        Value::String(s) if s.trim().is_empty() => "-".to_string(),
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}
