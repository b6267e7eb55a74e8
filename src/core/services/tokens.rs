//! Safe accessors for the schema-free `details` payload.
//!
//! Every function here returns `None` (or an empty list) instead of failing
//! when a value is missing, has the wrong type, or is blank.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

static UUID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$")
        .expect("uuid pattern is valid")
});

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid"));

/// Non-blank string content, trimmed.
pub fn as_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        _ => None,
    }
}

/// Integral number from either a JSON number or a numeric string.
pub fn as_number(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(integral)),
        Value::String(s) => {
            let trimmed = s.trim();
            trimmed
                .parse::<i64>()
                .ok()
                .or_else(|| trimmed.parse::<f64>().ok().and_then(integral))
        }
        _ => None,
    }
}

fn integral(f: f64) -> Option<i64> {
    (f.is_finite() && f.fract() == 0.0).then_some(f as i64)
}

/// Non-negative count.
pub fn as_count(value: Option<&Value>) -> Option<usize> {
    as_number(value).and_then(|n| usize::try_from(n).ok())
}

/// Boolean from a JSON bool or the strings `"true"` / `"false"`.
pub fn as_bool(value: Option<&Value>) -> Option<bool> {
    match value? {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

pub fn as_object(value: Option<&Value>) -> Option<&Map<String, Value>> {
    value?.as_object()
}

pub fn normalize_id(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

pub fn normalize_email(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_lowercase())
}

pub fn is_uuid(s: &str) -> bool {
    UUID_RE.is_match(s)
}

pub fn is_email(s: &str) -> bool {
    EMAIL_RE.is_match(s)
}

/// A UUID-valid id, lowercased so ids from different writers compare equal.
pub fn uuid_of(raw: &str) -> Option<String> {
    normalize_id(raw)
        .filter(|id| is_uuid(id))
        .map(|id| id.to_lowercase())
}

/// A syntactically valid, normalized email.
pub fn email_of(raw: &str) -> Option<String> {
    normalize_email(raw).filter(|e| is_email(e))
}

pub fn uuid_value(value: Option<&Value>) -> Option<String> {
    as_string(value).and_then(|s| uuid_of(&s))
}

pub fn email_value(value: Option<&Value>) -> Option<String> {
    as_string(value).and_then(|s| email_of(&s))
}

/// Ids from a JSON array. Strings are trimmed, UUIDs lowercased, numbers
/// stringified, and everything else skipped.
pub fn as_id_list(value: Option<&Value>) -> Vec<String> {
    let Some(Value::Array(items)) = value else {
        return Vec::new();
    };
    let ids = items.iter().filter_map(|item| match item {
        Value::String(s) => uuid_of(s).or_else(|| normalize_id(s)),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    });
    dedup_preserving_order(ids)
}

/// `"First Last"` from whichever parts are present.
pub fn full_name(first: Option<&str>, last: Option<&str>) -> Option<String> {
    let parts: Vec<&str> = [first, last]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    (!parts.is_empty()).then(|| parts.join(" "))
}

/// Drop repeats, keeping the first occurrence of each item.
pub fn dedup_preserving_order<I>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}
