use chrono::Duration;
use tracing::{debug, warn};

use crate::config::app_config::EngineSection;
use crate::core::errors::{Result, RosterError};
use crate::core::models::audit_log_row::{AuditFetch, AuditLogRow, AuditStatus};
use crate::core::models::raw_audit_row::RawAuditRow;
use crate::core::services::bulk_targets::{BulkCounts, target_item_ids, target_items};
use crate::core::services::change_lines::change_lines;
use crate::core::services::labels::{action_label, member_count};
use crate::core::services::snapshot_index::SnapshotIndex;
use crate::core::services::sync_filter::{DEFAULT_SYNC_WINDOW_SECS, filter_redundant_sync_rows};
use crate::core::services::target_resolver::{
    MemberDirectory, resolve_actor, resolve_target, target_lookup_emails, target_lookup_ids,
};
use crate::core::services::tokens::{dedup_preserving_order, uuid_of};
use crate::core::traits::audit_source::AuditSource;

/// Name of the audit table in the collaborator store.
pub const AUDIT_TABLE: &str = "admin_audit_log";

pub const DEFAULT_FETCH_LIMIT: usize = 1000;
pub const DEFAULT_LOOKUP_CHUNK_SIZE: usize = 100;

/// Tunables for one read of the audit log.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineSettings {
    pub fetch_limit: usize,
    pub lookup_chunk_size: usize,
    pub sync_window: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            fetch_limit: DEFAULT_FETCH_LIMIT,
            lookup_chunk_size: DEFAULT_LOOKUP_CHUNK_SIZE,
            sync_window: Duration::seconds(DEFAULT_SYNC_WINDOW_SECS),
        }
    }
}

impl EngineSettings {
    /// Build settings from the `[engine]` section, falling back to defaults
    /// when it is missing.
    pub fn from_config(section: Option<&EngineSection>) -> Self {
        match section {
            Some(engine) => Self {
                fetch_limit: engine.fetch_limit,
                lookup_chunk_size: engine.lookup_chunk_size,
                sync_window: Duration::try_seconds(engine.sync_window_secs)
                    .unwrap_or_else(|| Duration::seconds(DEFAULT_SYNC_WINDOW_SECS)),
            },
            None => Self::default(),
        }
    }
}

/// Reconstructs display-ready audit rows from an `AuditSource`.
pub struct AuditService<S: AuditSource> {
    pub source: S,
    pub settings: EngineSettings,
}

impl<S: AuditSource> AuditService<S> {
    /// Fetch, deduplicate, resolve, and explain the newest audit rows.
    ///
    /// A failing top-level query is reported through
    /// `AuditFetch::error_message`. A failing member lookup is returned as
    /// an error, since half-resolved identities would mislabel rows.
    pub fn fetch_audit_rows(&self) -> Result<AuditFetch> {
        let mut raw = match self.source.fetch_raw_rows(self.settings.fetch_limit) {
            Ok(rows) => rows,
            Err(e) => {
                warn!(error = %e, "audit log query failed");
                return Ok(AuditFetch {
                    rows: Vec::new(),
                    error_message: Some(describe_fetch_error(&e)),
                });
            }
        };

        raw.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        raw.truncate(self.settings.fetch_limit);
        let fetched = raw.len();

        let rows = filter_redundant_sync_rows(raw, self.settings.sync_window);
        let snapshots = SnapshotIndex::build(&rows);
        let directory = self.load_members(&rows)?;

        debug!(
            fetched,
            kept = rows.len(),
            members = directory.len(),
            "reconstructed audit rows"
        );

        Ok(AuditFetch {
            rows: rows
                .iter()
                .map(|row| enrich_row(row, &directory, &snapshots))
                .collect(),
            error_message: None,
        })
    }

    /// Batch-load every live member the rows mention, one chunk at a time.
    fn load_members(&self, rows: &[RawAuditRow]) -> Result<MemberDirectory> {
        let chunk_size = self.settings.lookup_chunk_size.max(1);

        let ids = dedup_preserving_order(rows.iter().flat_map(|row| {
            row.actor_id
                .as_deref()
                .and_then(uuid_of)
                .into_iter()
                .chain(target_lookup_ids(row))
                .chain(target_item_ids(row).into_iter().filter_map(|id| uuid_of(&id)))
        }));
        let emails = dedup_preserving_order(rows.iter().flat_map(target_lookup_emails));

        let mut members = Vec::new();
        for chunk in ids.chunks(chunk_size) {
            debug!(size = chunk.len(), "looking up members by id");
            members.extend(self.source.members_by_ids(chunk)?);
        }
        for chunk in emails.chunks(chunk_size) {
            debug!(size = chunk.len(), "looking up members by email");
            members.extend(self.source.members_by_emails(chunk)?);
        }
        let directory = MemberDirectory::new(members);

        if directory.is_empty() && !ids.is_empty() {
            debug!("no live member matched any referenced id");
        }

        Ok(directory)
    }
}

/// Page-level message for a failed top-level query.
pub fn describe_fetch_error(error: &RosterError) -> String {
    match error {
        RosterError::AuditTableMissing { table } => format!(
            "The audit table '{table}' does not exist. \
             Apply the audit log migration, then try again."
        ),
        other => format!("Could not load the audit log: {other}"),
    }
}

/// Final status: raw errors stay errors; a bulk action that both updated
/// and skipped members is partial.
pub fn compute_status(row: &RawAuditRow, counts: &BulkCounts) -> AuditStatus {
    let raw_error = row
        .status
        .as_deref()
        .is_some_and(|s| s.trim().eq_ignore_ascii_case("error"));

    if raw_error {
        AuditStatus::Error
    } else if counts.is_partial() {
        AuditStatus::Partial
    } else {
        AuditStatus::Ok
    }
}

/// Turn one raw row into its display form.
pub fn enrich_row(
    row: &RawAuditRow,
    directory: &MemberDirectory,
    snapshots: &SnapshotIndex,
) -> AuditLogRow {
    let target = resolve_target(row, directory, snapshots);
    let actor = resolve_actor(row, directory);
    let change_items = change_lines(row);
    let counts = BulkCounts::from_row(row);
    let items = target_items(
        row,
        change_items.first().map(String::as_str),
        directory,
        snapshots,
    );

    let target_name = if items.len() > 1 {
        Some(member_count(items.len()))
    } else {
        target.name
    };

    AuditLogRow {
        id: row.id.clone(),
        created_at: row.created_at,
        action: row.action.clone(),
        event: action_label(&row.action),
        actor_id: row.actor_id.clone(),
        actor_label: actor.label,
        actor_email: actor.email,
        target_table: row.target_table.clone(),
        target_id: row.target_id.clone(),
        target_uuid: target.uuid,
        target_email: target.email,
        target_name,
        change: (!change_items.is_empty()).then(|| change_items.join("; ")),
        change_items,
        target_items: items,
        status: compute_status(row, &counts),
        error_message: row.error_message.clone(),
        details: row.details.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use chrono::{TimeZone, Utc};
    use serde_json::{Value, json};

    use crate::core::models::member::Member;

    const ID_A: &str = "6f1c2a3b-1d2e-4f50-8a9b-0c1d2e3f4a5b";
    const ID_B: &str = "11111111-2222-4333-8444-555555555555";
    const ADMIN: &str = "aaaaaaaa-bbbb-4ccc-8ddd-eeeeeeeeeeee";

    #[derive(Default)]
    struct MemorySource {
        rows: Vec<RawAuditRow>,
        members: Vec<Member>,
        table_missing: bool,
        lookups_fail: bool,
        id_chunks: Mutex<Vec<usize>>,
    }

    impl AuditSource for MemorySource {
        fn fetch_raw_rows(&self, limit: usize) -> Result<Vec<RawAuditRow>> {
            if self.table_missing {
                return Err(RosterError::AuditTableMissing {
                    table: AUDIT_TABLE.into(),
                });
            }
            Ok(self.rows.iter().take(limit).cloned().collect())
        }

        fn members_by_ids(&self, ids: &[String]) -> Result<Vec<Member>> {
            if self.lookups_fail {
                return Err(RosterError::MemberLookupFailed {
                    reason: "connection reset".into(),
                });
            }
            self.id_chunks.lock().unwrap().push(ids.len());
            Ok(self
                .members
                .iter()
                .filter(|m| ids.contains(&m.id))
                .cloned()
                .collect())
        }

        fn members_by_emails(&self, emails: &[String]) -> Result<Vec<Member>> {
            Ok(self
                .members
                .iter()
                .filter(|m| m.email.as_ref().is_some_and(|e| emails.contains(&e.to_lowercase())))
                .cloned()
                .collect())
        }
    }

    fn raw(
        id: &str,
        action: &str,
        actor: Option<&str>,
        target: Option<&str>,
        secs: u32,
        details: Value,
    ) -> RawAuditRow {
        RawAuditRow {
            id: id.into(),
            created_at: Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, secs).unwrap(),
            actor_id: actor.map(String::from),
            action: action.into(),
            target_table: Some("members".into()),
            target_id: target.map(String::from),
            status: Some("ok".into()),
            error_message: None,
            details: Some(details),
        }
    }

    fn service(source: MemorySource) -> AuditService<MemorySource> {
        AuditService {
            source,
            settings: EngineSettings::default(),
        }
    }

    fn admin() -> Member {
        Member {
            id: ADMIN.into(),
            firstname: Some("Siri".into()),
            lastname: Some("Admin".into()),
            email: Some("siri@example.org".into()),
        }
    }

    #[test]
    fn end_to_end_ban_with_sync_duplicate() {
        let svc = service(MemorySource {
            rows: vec![
                raw("sync", "member.update", None, Some(ID_A), 1, json!({})),
                raw("ban", "member.ban", Some(ADMIN), Some(ID_A), 2, json!({})),
            ],
            members: vec![
                admin(),
                Member {
                    id: ID_A.into(),
                    firstname: Some("Ola".into()),
                    lastname: Some("Hansen".into()),
                    email: Some("ola@example.org".into()),
                },
            ],
            ..Default::default()
        });

        let fetch = svc.fetch_audit_rows().unwrap();
        assert!(fetch.error_message.is_none());
        assert_eq!(fetch.rows.len(), 1);

        let row = &fetch.rows[0];
        assert_eq!(row.id, "ban");
        assert_eq!(row.event, "Medlem utestengt");
        assert_eq!(row.actor_label, "Siri Admin");
        assert_eq!(row.actor_email.as_deref(), Some("siri@example.org"));
        assert_eq!(row.target_name.as_deref(), Some("Ola Hansen"));
        assert_eq!(row.target_uuid.as_deref(), Some(ID_A));
        assert_eq!(row.change.as_deref(), Some("Utestengt: Nei -> Ja"));
        assert_eq!(row.status, AuditStatus::Ok);
    }

    #[test]
    fn rows_are_newest_first_and_capped() {
        let mut svc = service(MemorySource {
            rows: vec![
                raw("old", "member.rename", Some(ADMIN), None, 1, json!({})),
                raw("new", "member.rename", Some(ADMIN), None, 9, json!({})),
                raw("mid", "member.rename", Some(ADMIN), None, 5, json!({})),
            ],
            ..Default::default()
        });

        let ids: Vec<String> = svc
            .fetch_audit_rows()
            .unwrap()
            .rows
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["new", "mid", "old"]);

        svc.settings.fetch_limit = 2;
        assert_eq!(svc.fetch_audit_rows().unwrap().rows.len(), 2);
    }

    #[test]
    fn deleted_member_labeled_from_snapshot() {
        let svc = service(MemorySource {
            rows: vec![
                raw(
                    "rename",
                    "member.rename",
                    Some(ADMIN),
                    Some(ID_B),
                    1,
                    json!({"firstname": "Per"}),
                ),
                raw(
                    "delete",
                    "member.delete",
                    Some(ADMIN),
                    Some(ID_B),
                    60,
                    json!({
                        "deleted_members": [{"id": ID_B, "firstname": "Per", "lastname": "Olsen"}]
                    }),
                ),
            ],
            members: vec![admin()],
            ..Default::default()
        });

        let fetch = svc.fetch_audit_rows().unwrap();
        assert_eq!(fetch.rows.len(), 2);
        assert!(fetch.rows.iter().all(|r| r.target_name.as_deref() == Some("Per Olsen")));
    }

    #[test]
    fn updated_and_unchanged_make_partial() {
        let svc = service(MemorySource {
            rows: vec![raw(
                "bulk",
                "member.membership_status.update",
                Some(ADMIN),
                None,
                0,
                json!({
                    "is_active": true,
                    "updated_member_ids": ["u1", "u2", "u3"],
                    "unchanged_member_ids": ["s1", "s2"]
                }),
            )],
            ..Default::default()
        });

        let row = &svc.fetch_audit_rows().unwrap().rows[0];
        assert_eq!(row.status, AuditStatus::Partial);
        assert_eq!(row.target_items.len(), 5);
        assert_eq!(row.target_name.as_deref(), Some("5 medlemmer"));
        assert_eq!(row.target_items[0].id, "s1");
        assert_eq!(
            row.change_items,
            vec![
                "Medlemskap: Aktiv",
                "Oppdatert: 3 medlemmer",
                "Uendret: 2 medlemmer"
            ]
        );
    }

    #[test]
    fn members_left_out_of_updated_set_make_partial() {
        let row = raw(
            "bulk",
            "member.privilege.update",
            Some(ADMIN),
            None,
            0,
            json!({
                "privilege_type": 2,
                "member_ids": ["a", "b", "c"],
                "updated_member_ids": ["a"]
            }),
        );

        let enriched = enrich_row(&row, &MemberDirectory::default(), &SnapshotIndex::default());
        assert_eq!(enriched.status, AuditStatus::Partial);
        assert_eq!(enriched.target_items.len(), 3);
        assert_eq!(enriched.target_items[0].reason.as_deref(), Some("Ikke oppdatert"));
    }

    #[test]
    fn raw_error_status_is_kept() {
        let mut row = raw("e", "member.ban", Some(ADMIN), Some(ID_A), 0, json!({}));
        row.status = Some("ERROR".into());
        row.error_message = Some("permission denied".into());

        assert_eq!(compute_status(&row, &BulkCounts::default()), AuditStatus::Error);
    }

    #[test]
    fn invalid_target_falls_back_to_raw_id() {
        let svc = service(MemorySource {
            rows: vec![raw("x", "member.update", Some(ADMIN), Some("ikke-en-id"), 0, json!(null))],
            ..Default::default()
        });

        let row = &svc.fetch_audit_rows().unwrap().rows[0];
        assert_eq!(row.target_uuid, None);
        assert_eq!(row.target_email, None);
        assert_eq!(row.target_name.as_deref(), Some("ikke-en-id"));
    }

    #[test]
    fn missing_table_is_reported_not_raised() {
        let svc = service(MemorySource {
            table_missing: true,
            ..Default::default()
        });

        let fetch = svc.fetch_audit_rows().unwrap();
        assert!(fetch.rows.is_empty());
        let message = fetch.error_message.unwrap();
        assert!(message.contains("does not exist"));
        assert!(message.contains(AUDIT_TABLE));
    }

    #[test]
    fn other_query_failures_are_generic() {
        let message = describe_fetch_error(&RosterError::AuditQueryFailed {
            reason: "timeout".into(),
        });
        assert!(message.starts_with("Could not load the audit log"));
        assert!(message.contains("timeout"));
    }

    #[test]
    fn member_lookup_failure_propagates() {
        let svc = service(MemorySource {
            rows: vec![raw("r", "member.ban", Some(ADMIN), Some(ID_A), 0, json!({}))],
            lookups_fail: true,
            ..Default::default()
        });

        assert!(matches!(
            svc.fetch_audit_rows(),
            Err(RosterError::MemberLookupFailed { .. })
        ));
    }

    #[test]
    fn lookups_are_chunked() {
        let ids: Vec<String> = (0..250)
            .map(|i| format!("00000000-0000-4000-8000-{i:012}"))
            .collect();
        let svc = service(MemorySource {
            rows: vec![raw(
                "bulk",
                "member.privilege.update",
                Some(ADMIN),
                None,
                0,
                json!({"member_ids": ids}),
            )],
            ..Default::default()
        });

        svc.fetch_audit_rows().unwrap();
        // 250 members plus the actor.
        assert_eq!(*svc.source.id_chunks.lock().unwrap(), vec![100, 100, 51]);
    }

    #[test]
    fn fetching_twice_is_identical() {
        let svc = service(MemorySource {
            rows: vec![
                raw(
                    "a",
                    "member.ban",
                    Some(ADMIN),
                    Some(ID_A),
                    0,
                    json!({"deleted_members": [{"id": ID_A, "email": "ola@example.org"}]}),
                ),
                raw(
                    "b",
                    "member.update",
                    None,
                    Some(ID_A),
                    2,
                    json!({"old": {"is_banned": false}, "new": {"is_banned": true}}),
                ),
                raw(
                    "c",
                    "member.privilege.update",
                    Some(ADMIN),
                    None,
                    30,
                    json!({"member_ids": [ID_A, ID_B], "privilege_type": 3}),
                ),
            ],
            members: vec![admin()],
            ..Default::default()
        });

        assert_eq!(svc.fetch_audit_rows().unwrap(), svc.fetch_audit_rows().unwrap());
    }

    #[test]
    fn settings_from_config_section() {
        let section = EngineSection {
            fetch_limit: 50,
            lookup_chunk_size: 10,
            sync_window_secs: 8,
        };
        let settings = EngineSettings::from_config(Some(&section));
        assert_eq!(settings.fetch_limit, 50);
        assert_eq!(settings.sync_window, Duration::seconds(8));
        assert_eq!(EngineSettings::from_config(None), EngineSettings::default());
    }

    #[test]
    fn unrepresentable_sync_window_uses_default() {
        let section = EngineSection {
            fetch_limit: 50,
            lookup_chunk_size: 10,
            sync_window_secs: i64::MAX,
        };
        let settings = EngineSettings::from_config(Some(&section));
        assert_eq!(settings.sync_window, Duration::seconds(DEFAULT_SYNC_WINDOW_SECS));
    }
}
