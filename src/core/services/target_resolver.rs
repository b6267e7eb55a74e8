use std::collections::HashMap;

use crate::core::models::member::{Member, MemberSnapshot};
use crate::core::models::raw_audit_row::RawAuditRow;
use crate::core::services::snapshot_index::{SnapshotIndex, row_snapshots};
use crate::core::services::tokens::{
    as_id_list, as_string, dedup_preserving_order, email_of, email_value, normalize_email,
    normalize_id, uuid_of, uuid_value,
};

/// Live members fetched for the current read, keyed by id and by email.
#[derive(Debug, Clone, Default)]
pub struct MemberDirectory {
    by_id: HashMap<String, Member>,
    by_email: HashMap<String, Member>,
}

impl MemberDirectory {
    pub fn new(members: impl IntoIterator<Item = Member>) -> Self {
        let mut directory = Self::default();
        for member in members {
            directory.insert(member);
        }
        directory
    }

    pub fn insert(&mut self, member: Member) {
        if let Some(email) = member.email.as_deref().and_then(normalize_email) {
            self.by_email.insert(email, member.clone());
        }
        if let Some(id) = uuid_of(&member.id).or_else(|| normalize_id(&member.id)) {
            self.by_id.insert(id, member);
        }
    }

    pub fn get_by_id(&self, id: &str) -> Option<&Member> {
        self.by_id.get(id)
    }

    pub fn get_by_email(&self, email: &str) -> Option<&Member> {
        self.by_email.get(email)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

/// Best-known identity of the member a row is about.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedTarget {
    pub uuid: Option<String>,
    pub email: Option<String>,
    pub name: Option<String>,
}

impl ResolvedTarget {
    fn from_member(member: &Member) -> Self {
        Self {
            uuid: Some(uuid_of(&member.id).unwrap_or_else(|| member.id.clone())),
            email: member.email.as_deref().and_then(normalize_email),
            name: Some(member.display_name()),
        }
    }

    fn from_snapshot(snapshot: &MemberSnapshot) -> Self {
        Self {
            uuid: Some(snapshot.id.clone()),
            email: snapshot.email.clone(),
            name: Some(snapshot.display_name()),
        }
    }
}

/// Who performed an action, as shown in the log.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedActor {
    pub label: String,
    pub email: Option<String>,
}

/// Candidate member UUIDs a row may concern, in priority order.
pub fn target_lookup_ids(row: &RawAuditRow) -> Vec<String> {
    let mut ids = Vec::new();

    ids.extend(row.target_id.as_deref().and_then(uuid_of));
    for key in ["member_id", "auth_user_id", "target_member_id"] {
        ids.extend(uuid_value(row.detail(key)));
    }
    for key in ["member_ids", "deleted_member_ids"] {
        ids.extend(
            as_id_list(row.detail(key))
                .into_iter()
                .filter_map(|id| uuid_of(&id)),
        );
    }
    ids.extend(row_snapshots(row).into_iter().map(|s| s.id));

    dedup_preserving_order(ids)
}

/// Candidate member emails a row may concern, in priority order.
pub fn target_lookup_emails(row: &RawAuditRow) -> Vec<String> {
    let mut emails = Vec::new();

    emails.extend(row.target_id.as_deref().and_then(email_of));
    for key in ["email", "member_email", "target_member_email"] {
        emails.extend(email_value(row.detail(key)));
    }
    emails.extend(row_snapshots(row).into_iter().filter_map(|s| s.email));

    dedup_preserving_order(emails)
}

/// Resolve the target of `row`.
///
/// Sources are tried strictly in order of trust: live members by id, live
/// members by email, the snapshot index by id then email, the flat
/// `target_member_*` fields, fragments inline in this row, and finally the
/// raw `target_id`.
pub fn resolve_target(
    row: &RawAuditRow,
    directory: &MemberDirectory,
    snapshots: &SnapshotIndex,
) -> ResolvedTarget {
    let ids = target_lookup_ids(row);
    let emails = target_lookup_emails(row);

    if let Some(member) = ids.iter().find_map(|id| directory.get_by_id(id)) {
        return ResolvedTarget::from_member(member);
    }
    if let Some(member) = emails.iter().find_map(|e| directory.get_by_email(e)) {
        return ResolvedTarget::from_member(member);
    }
    if let Some(snapshot) = ids.iter().find_map(|id| snapshots.get_by_id(id)) {
        return ResolvedTarget::from_snapshot(snapshot);
    }
    if let Some(snapshot) = emails.iter().find_map(|e| snapshots.get_by_email(e)) {
        return ResolvedTarget::from_snapshot(snapshot);
    }

    let flat_id = uuid_value(row.detail("target_member_id"));
    let flat_email = email_value(row.detail("target_member_email"));
    let flat_name = as_string(row.detail("target_member_name"));
    if flat_id.is_some() || flat_email.is_some() || flat_name.is_some() {
        let name = flat_name
            .or_else(|| flat_email.clone())
            .or_else(|| flat_id.clone());
        return ResolvedTarget {
            uuid: flat_id,
            email: flat_email,
            name,
        };
    }

    let inline = row_snapshots(row);
    let target_uuid = row.target_id.as_deref().and_then(uuid_of);
    let preferred = inline
        .iter()
        .find(|s| Some(&s.id) == target_uuid.as_ref())
        .or_else(|| inline.first());
    if let Some(snapshot) = preferred {
        return ResolvedTarget::from_snapshot(snapshot);
    }

    match row.target_id.as_deref().and_then(normalize_id) {
        Some(raw) => ResolvedTarget {
            uuid: uuid_of(&raw),
            email: email_of(&raw),
            name: Some(raw),
        },
        None => ResolvedTarget::default(),
    }
}

/// Display name and email for one member id, for bulk breakdowns.
pub fn resolve_member(
    id: &str,
    directory: &MemberDirectory,
    snapshots: &SnapshotIndex,
) -> (String, Option<String>) {
    if let Some(member) = directory.get_by_id(id) {
        return (
            member.display_name(),
            member.email.as_deref().and_then(normalize_email),
        );
    }
    if let Some(snapshot) = snapshots.get_by_id(id) {
        return (snapshot.display_name(), snapshot.email.clone());
    }
    (id.to_string(), None)
}

/// Resolve the actor label. Rows without an actor were written by the
/// database itself and are labeled "System".
pub fn resolve_actor(row: &RawAuditRow, directory: &MemberDirectory) -> ResolvedActor {
    let Some(actor_id) = row.actor_id.as_deref().and_then(normalize_id) else {
        return ResolvedActor {
            label: "System".to_string(),
            email: None,
        };
    };

    let key = uuid_of(&actor_id).unwrap_or_else(|| actor_id.clone());
    if let Some(member) = directory.get_by_id(&key) {
        return ResolvedActor {
            label: member.display_name(),
            email: member.email.as_deref().and_then(normalize_email),
        };
    }

    let email = email_value(row.detail("actor_email"));
    let label = as_string(row.detail("actor_name"))
        .or_else(|| email.clone())
        .unwrap_or(actor_id);
    ResolvedActor { label, email }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::{Value, json};

    const ID_A: &str = "6f1c2a3b-1d2e-4f50-8a9b-0c1d2e3f4a5b";
    const ID_B: &str = "11111111-2222-4333-8444-555555555555";

    fn row(target_id: Option<&str>, details: Value) -> RawAuditRow {
        RawAuditRow {
            id: "r1".into(),
            created_at: Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap(),
            actor_id: None,
            action: "member.update".into(),
            target_table: Some("members".into()),
            target_id: target_id.map(String::from),
            status: Some("ok".into()),
            error_message: None,
            details: Some(details),
        }
    }

    fn member(id: &str, first: &str, last: &str, email: &str) -> Member {
        Member {
            id: id.into(),
            firstname: Some(first.into()),
            lastname: Some(last.into()),
            email: Some(email.into()),
        }
    }

    #[test]
    fn lookup_ids_collects_and_dedups() {
        let r = row(
            Some(ID_A),
            json!({
                "member_id": ID_A,
                "member_ids": [ID_B, "not-a-uuid"],
                "deleted_members": [{"id": ID_B}]
            }),
        );

        assert_eq!(target_lookup_ids(&r), vec![ID_A.to_string(), ID_B.to_string()]);
    }

    #[test]
    fn lookup_emails_from_target_and_details() {
        let r = row(
            Some("Kari@Example.org"),
            json!({"member_email": "per@example.org", "email": "broken"}),
        );

        assert_eq!(
            target_lookup_emails(&r),
            vec!["kari@example.org".to_string(), "per@example.org".to_string()]
        );
    }

    #[test]
    fn live_member_beats_snapshot() {
        let r = row(Some(ID_A), json!({}));
        let other = row(
            None,
            json!({"deleted_members": [{"id": ID_A, "name": "B"}]}),
        );
        let snapshots = SnapshotIndex::build(&[other]);
        let directory = MemberDirectory::new([Member {
            id: ID_A.into(),
            firstname: Some("A".into()),
            lastname: None,
            email: None,
        }]);

        let resolved = resolve_target(&r, &directory, &snapshots);
        assert_eq!(resolved.name.as_deref(), Some("A"));
        assert_eq!(resolved.uuid.as_deref(), Some(ID_A));
    }

    #[test]
    fn live_email_match_is_second() {
        let r = row(Some("kari@example.org"), json!({}));
        let directory =
            MemberDirectory::new([member(ID_B, "Kari", "Nordmann", "KARI@example.org")]);

        let resolved = resolve_target(&r, &directory, &SnapshotIndex::default());
        assert_eq!(resolved.name.as_deref(), Some("Kari Nordmann"));
        assert_eq!(resolved.uuid.as_deref(), Some(ID_B));
        assert_eq!(resolved.email.as_deref(), Some("kari@example.org"));
    }

    #[test]
    fn snapshot_used_when_member_is_gone() {
        let r = row(Some(ID_A), json!({}));
        let deletion = row(
            None,
            json!({"deleted_members": [{
                "id": ID_A,
                "firstname": "Ola",
                "lastname": "Hansen",
                "email": "ola@example.org"
            }]}),
        );
        let snapshots = SnapshotIndex::build(&[deletion]);

        let resolved = resolve_target(&r, &MemberDirectory::default(), &snapshots);
        assert_eq!(resolved.name.as_deref(), Some("Ola Hansen"));
        assert_eq!(resolved.email.as_deref(), Some("ola@example.org"));
    }

    #[test]
    fn snapshot_found_by_email_when_row_has_no_id() {
        let r = row(Some("Per@Example.org"), json!({}));
        let deletion = row(
            None,
            json!({"deleted_members": [{
                "id": ID_B,
                "firstname": "Per",
                "lastname": "Olsen",
                "email": "per@example.org"
            }]}),
        );
        let snapshots = SnapshotIndex::build(&[deletion]);

        assert!(target_lookup_ids(&r).is_empty());
        let resolved = resolve_target(&r, &MemberDirectory::default(), &snapshots);
        assert_eq!(resolved.name.as_deref(), Some("Per Olsen"));
        assert_eq!(resolved.uuid.as_deref(), Some(ID_B));
        assert_eq!(resolved.email.as_deref(), Some("per@example.org"));
    }

    #[test]
    fn inline_fragment_matching_target_id_is_preferred() {
        let r = row(
            Some(ID_B),
            json!({"deleted_members": [
                {"id": ID_A, "firstname": "Kari", "lastname": "Berg"},
                {"id": ID_B, "firstname": "Per", "lastname": "Olsen"}
            ]}),
        );

        let resolved = resolve_target(&r, &MemberDirectory::default(), &SnapshotIndex::default());
        assert_eq!(resolved.name.as_deref(), Some("Per Olsen"));
        assert_eq!(resolved.uuid.as_deref(), Some(ID_B));

        let unmatched = row(
            Some("legacy-9"),
            json!({"deleted_members": [
                {"id": ID_A, "firstname": "Kari", "lastname": "Berg"},
                {"id": ID_B, "firstname": "Per", "lastname": "Olsen"}
            ]}),
        );
        let resolved =
            resolve_target(&unmatched, &MemberDirectory::default(), &SnapshotIndex::default());
        assert_eq!(resolved.name.as_deref(), Some("Kari Berg"));
    }

    #[test]
    fn flat_fields_used_without_valid_id() {
        let r = row(
            None,
            json!({"target_member_id": "legacy-7", "target_member_email": "per@example.org"}),
        );

        let resolved = resolve_target(&r, &MemberDirectory::default(), &SnapshotIndex::default());
        assert_eq!(resolved.uuid, None);
        assert_eq!(resolved.email.as_deref(), Some("per@example.org"));
        assert_eq!(resolved.name.as_deref(), Some("per@example.org"));
    }

    #[test]
    fn invalid_target_id_falls_back_to_raw_string() {
        let r = row(Some("legacy#42"), json!({}));

        let resolved = resolve_target(&r, &MemberDirectory::default(), &SnapshotIndex::default());
        assert_eq!(resolved.uuid, None);
        assert_eq!(resolved.email, None);
        assert_eq!(resolved.name.as_deref(), Some("legacy#42"));
    }

    #[test]
    fn missing_target_resolves_to_nothing() {
        let r = row(None, json!(null));

        assert_eq!(
            resolve_target(&r, &MemberDirectory::default(), &SnapshotIndex::default()),
            ResolvedTarget::default()
        );
    }

    #[test]
    fn resolve_member_falls_back_to_id() {
        let directory =
            MemberDirectory::new([member(ID_A, "Kari", "Nordmann", "kari@example.org")]);

        assert_eq!(
            resolve_member(ID_A, &directory, &SnapshotIndex::default()),
            ("Kari Nordmann".to_string(), Some("kari@example.org".to_string()))
        );
        assert_eq!(
            resolve_member(ID_B, &directory, &SnapshotIndex::default()),
            (ID_B.to_string(), None)
        );
    }

    #[test]
    fn actor_labels() {
        let directory =
            MemberDirectory::new([member(ID_A, "Kari", "Nordmann", "kari@example.org")]);

        let system = row(None, json!({}));
        assert_eq!(resolve_actor(&system, &directory).label, "System");

        let mut known = row(None, json!({}));
        known.actor_id = Some(ID_A.to_uppercase());
        let actor = resolve_actor(&known, &directory);
        assert_eq!(actor.label, "Kari Nordmann");
        assert_eq!(actor.email.as_deref(), Some("kari@example.org"));

        let mut gone = row(None, json!({"actor_email": "old@example.org"}));
        gone.actor_id = Some(ID_B.into());
        let actor = resolve_actor(&gone, &directory);
        assert_eq!(actor.label, "old@example.org");
    }
}
