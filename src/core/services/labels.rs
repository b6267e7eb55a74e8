use std::collections::HashMap;
use std::sync::LazyLock;

/// Privilege level → label. Levels 1 through 5, lowest first.
static PRIVILEGE_LABELS: LazyLock<HashMap<i64, &'static str>> = LazyLock::new(|| {
    HashMap::from([
        (1, "Medlem"),
        (2, "Frivillig"),
        (3, "Styremedlem"),
        (4, "Leder"),
        (5, "Administrator"),
    ])
});

static ACTION_LABELS: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(|| {
    HashMap::from([
        ("member.create", "Medlem opprettet"),
        ("member.activate", "Medlem aktivert"),
        ("member.rename", "Navn endret"),
        ("member.membership_status.update", "Medlemskap oppdatert"),
        ("member.privilege.update", "Tilgang endret"),
        ("member.ban", "Medlem utestengt"),
        ("member.unban", "Utestengelse opphevet"),
        ("member.delete", "Medlem slettet"),
        ("member.update", "Medlem oppdatert"),
    ])
});

static FIELD_LABELS: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(|| {
    HashMap::from([
        ("firstname", "Fornavn"),
        ("lastname", "Etternavn"),
        ("email", "E-post"),
        ("privilege_type", "Tilgang"),
        ("is_active", "Medlemskap aktivt"),
        ("is_banned", "Utestengt"),
        ("phone", "Telefon"),
        ("student_number", "Studentnummer"),
    ])
});

/// Member fields diffed by generic sync rows when nothing better is known.
pub const MEMBER_FIELDS: &[&str] = &[
    "firstname",
    "lastname",
    "email",
    "privilege_type",
    "is_active",
    "is_banned",
];

/// Row bookkeeping columns that never make a meaningful diff line.
pub const IGNORED_FIELDS: &[&str] = &["id", "created_at", "updated_at", "auth_user_id"];

pub fn privilege_label(level: i64) -> String {
    PRIVILEGE_LABELS
        .get(&level)
        .map(|l| (*l).to_string())
        .unwrap_or_else(|| format!("Nivå {level}"))
}

/// Event label for an action key; unknown actions show the raw key.
pub fn action_label(action: &str) -> String {
    ACTION_LABELS
        .get(action)
        .map(|l| (*l).to_string())
        .unwrap_or_else(|| action.to_string())
}

/// Field label; unknown fields show the raw column name.
pub fn field_label(field: &str) -> String {
    FIELD_LABELS
        .get(field)
        .map(|l| (*l).to_string())
        .unwrap_or_else(|| field.to_string())
}

pub fn yes_no(value: bool) -> &'static str {
    if value { "Ja" } else { "Nei" }
}

pub fn active_label(active: bool) -> &'static str {
    if active { "Aktiv" } else { "Inaktiv" }
}

/// `"1 medlem"` / `"3 medlemmer"`.
pub fn member_count(n: usize) -> String {
    if n == 1 {
        "1 medlem".to_string()
    } else {
        format!("{n} medlemmer")
    }
}
