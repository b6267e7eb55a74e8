use std::collections::BTreeMap;

use serde_json::{Map, Value};
use tracing::debug;

use crate::core::models::member::MemberSnapshot;
use crate::core::models::raw_audit_row::RawAuditRow;
use crate::core::services::tokens::{as_object, as_string, email_value, full_name, uuid_value};

/// Cross-row index of member identity fragments.
///
/// Lets deleted or renamed members still be labeled in historical rows.
/// Both maps are ordered so that building the index is deterministic.
#[derive(Debug, Clone, Default)]
pub struct SnapshotIndex {
    pub by_id: BTreeMap<String, MemberSnapshot>,
    pub by_email: BTreeMap<String, MemberSnapshot>,
}

impl SnapshotIndex {
    /// Collect and merge every fragment found in `rows`.
    pub fn build(rows: &[RawAuditRow]) -> Self {
        let mut by_id: BTreeMap<String, MemberSnapshot> = BTreeMap::new();

        for row in rows {
            for fragment in row_snapshots(row) {
                insert_merged(&mut by_id, fragment.id.clone(), fragment);
            }
        }

        let mut by_email: BTreeMap<String, MemberSnapshot> = BTreeMap::new();
        for snapshot in by_id.values() {
            if let Some(email) = &snapshot.email {
                insert_merged(&mut by_email, email.clone(), snapshot.clone());
            }
        }

        debug!(
            ids = by_id.len(),
            emails = by_email.len(),
            "built member snapshot index"
        );

        Self { by_id, by_email }
    }

    pub fn get_by_id(&self, id: &str) -> Option<&MemberSnapshot> {
        self.by_id.get(id)
    }

    pub fn get_by_email(&self, email: &str) -> Option<&MemberSnapshot> {
        self.by_email.get(email)
    }
}

fn insert_merged(
    map: &mut BTreeMap<String, MemberSnapshot>,
    key: String,
    incoming: MemberSnapshot,
) {
    match map.remove(&key) {
        Some(existing) => {
            map.insert(key, merge(existing, incoming));
        }
        None => {
            map.insert(key, incoming);
        }
    }
}

/// Every identity fragment carried by one row's `details`.
///
/// Sources, in order: the `deleted_members` / `target_members` arrays, the
/// legacy trigger objects `old` / `new` / `member`, and the flat
/// `target_member_*` fields. Fragments without a valid UUID are dropped.
pub fn row_snapshots(row: &RawAuditRow) -> Vec<MemberSnapshot> {
    let mut fragments = Vec::new();

    for key in ["deleted_members", "target_members"] {
        if let Some(Value::Array(items)) = row.detail(key) {
            fragments.extend(
                items
                    .iter()
                    .filter_map(Value::as_object)
                    .filter_map(snapshot_from_object),
            );
        }
    }

    for key in ["old", "new", "member"] {
        if let Some(obj) = as_object(row.detail(key)) {
            fragments.extend(snapshot_from_object(obj));
        }
    }

    fragments.extend(flat_snapshot(row));
    fragments
}

/// Read a snapshot out of a member-shaped JSON object.
pub fn snapshot_from_object(obj: &Map<String, Value>) -> Option<MemberSnapshot> {
    let id = uuid_value(obj.get("id")).or_else(|| uuid_value(obj.get("member_id")))?;
    let firstname = as_string(obj.get("firstname"));
    let lastname = as_string(obj.get("lastname"));
    let name = as_string(obj.get("name"))
        .or_else(|| as_string(obj.get("full_name")))
        .or_else(|| full_name(firstname.as_deref(), lastname.as_deref()));

    Some(MemberSnapshot {
        id,
        firstname,
        lastname,
        email: email_value(obj.get("email")),
        name,
    })
}

fn flat_snapshot(row: &RawAuditRow) -> Option<MemberSnapshot> {
    let id = uuid_value(row.detail("target_member_id"))?;
    Some(MemberSnapshot {
        id,
        firstname: None,
        lastname: None,
        email: email_value(row.detail("target_member_email")),
        name: as_string(row.detail("target_member_name")),
    })
}

/// Weighted count of populated fields: name 4, email 3, firstname 2, lastname 1.
pub fn score(snapshot: &MemberSnapshot) -> u8 {
    4 * u8::from(snapshot.name.is_some())
        + 3 * u8::from(snapshot.email.is_some())
        + 2 * u8::from(snapshot.firstname.is_some())
        + u8::from(snapshot.lastname.is_some())
}

/// Merge two fragments. The higher-scoring one wins field by field; the
/// other fills its gaps. On a tie `existing` wins.
pub fn merge(existing: MemberSnapshot, incoming: MemberSnapshot) -> MemberSnapshot {
    let (winner, other) = if score(&incoming) > score(&existing) {
        (incoming, existing)
    } else {
        (existing, incoming)
    };

    MemberSnapshot {
        id: winner.id,
        firstname: winner.firstname.or(other.firstname),
        lastname: winner.lastname.or(other.lastname),
        email: winner.email.or(other.email),
        name: winner.name.or(other.name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    const ID: &str = "6f1c2a3b-1d2e-4f50-8a9b-0c1d2e3f4a5b";

    fn row_with(details: Value) -> RawAuditRow {
        RawAuditRow {
            id: "r1".into(),
            created_at: Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap(),
            actor_id: None,
            action: "member.delete".into(),
            target_table: Some("members".into()),
            target_id: None,
            status: Some("ok".into()),
            error_message: None,
            details: Some(details),
        }
    }

    #[test]
    fn fragments_from_all_three_sources() {
        let row = row_with(json!({
            "deleted_members": [{"id": ID, "email": "ola@example.org"}],
            "old": {"id": "11111111-2222-4333-8444-555555555555", "firstname": "Kari"},
            "target_member_id": "aaaaaaaa-bbbb-4ccc-8ddd-eeeeeeeeeeee",
            "target_member_name": "Per Olsen"
        }));

        let fragments = row_snapshots(&row);
        assert_eq!(fragments.len(), 3);
        assert_eq!(fragments[0].email.as_deref(), Some("ola@example.org"));
        assert_eq!(fragments[1].name.as_deref(), Some("Kari"));
        assert_eq!(fragments[2].name.as_deref(), Some("Per Olsen"));
    }

    #[test]
    fn fragments_without_valid_uuid_are_discarded() {
        let row = row_with(json!({
            "deleted_members": [
                {"id": "42", "email": "x@example.org"},
                "junk",
                {"email": "y@example.org"}
            ],
            "member": {"id": null},
            "target_member_id": "not-a-uuid"
        }));

        assert!(row_snapshots(&row).is_empty());
    }

    #[test]
    fn invalid_email_is_dropped_from_fragment() {
        let row = row_with(json!({"member": {"id": ID, "email": "nope", "lastname": "Hansen"}}));

        let fragments = row_snapshots(&row);
        assert_eq!(fragments.len(), 1);
        assert!(fragments[0].email.is_none());
        assert_eq!(fragments[0].name.as_deref(), Some("Hansen"));
    }

    #[test]
    fn merge_combines_email_and_name_fragments() {
        let rows = vec![
            row_with(json!({"deleted_members": [{"id": ID, "email": "Ola@Example.org"}]})),
            row_with(json!({
                "target_members": [{"id": ID, "firstname": "Ola", "lastname": "Hansen"}]
            })),
        ];

        let index = SnapshotIndex::build(&rows);
        let merged = index.get_by_id(ID).unwrap();

        assert_eq!(merged.email.as_deref(), Some("ola@example.org"));
        assert_eq!(merged.firstname.as_deref(), Some("Ola"));
        assert_eq!(merged.lastname.as_deref(), Some("Hansen"));
        assert_eq!(merged.name.as_deref(), Some("Ola Hansen"));
        assert_eq!(index.get_by_email("ola@example.org").unwrap().id, ID);
    }

    #[test]
    fn higher_score_wins_conflicting_fields() {
        let weak = MemberSnapshot {
            id: ID.into(),
            lastname: Some("Old".into()),
            ..Default::default()
        };
        let strong = MemberSnapshot {
            id: ID.into(),
            name: Some("Ny Navn".into()),
            lastname: Some("New".into()),
            ..Default::default()
        };

        let merged = merge(weak, strong);
        assert_eq!(merged.lastname.as_deref(), Some("New"));
        assert_eq!(merged.name.as_deref(), Some("Ny Navn"));
    }

    #[test]
    fn tie_keeps_existing_fields() {
        let first = MemberSnapshot {
            id: ID.into(),
            email: Some("first@example.org".into()),
            ..Default::default()
        };
        let second = MemberSnapshot {
            id: ID.into(),
            email: Some("second@example.org".into()),
            ..Default::default()
        };

        assert_eq!(
            merge(first, second).email.as_deref(),
            Some("first@example.org")
        );
    }

    #[test]
    fn score_weights() {
        let s = MemberSnapshot {
            id: ID.into(),
            name: Some("n".into()),
            email: Some("e@x.no".into()),
            firstname: Some("f".into()),
            lastname: Some("l".into()),
        };
        assert_eq!(score(&s), 10);
        assert_eq!(score(&MemberSnapshot::default()), 0);
    }
}
