use std::collections::{HashMap, HashSet};

use serde_json::Value;

use crate::core::models::audit_log_row::{AuditTargetItem, TargetItemStatus};
use crate::core::models::raw_audit_row::RawAuditRow;
use crate::core::services::snapshot_index::SnapshotIndex;
use crate::core::services::target_resolver::{MemberDirectory, resolve_member};
use crate::core::services::tokens::{
    as_count, as_id_list, as_object, as_string, dedup_preserving_order, normalize_id, uuid_of,
};

/// Id-set keys that mark a member as failed, with the reason shown for each.
/// `failed_member_ids` is handled separately since it carries per-member reasons.
const ERROR_SETS: &[(&str, &str)] = &[
    ("blocked_member_ids", "Blokkert av tilgangsregler"),
    ("banned_member_ids", "Medlemmet er utestengt"),
    ("invalid_member_ids", "Ugyldig medlem"),
];

const FAILED_KEY: &str = "failed_member_ids";
const FAILED_REASON: &str = "Oppdatering feilet";
const UNCHANGED_KEY: &str = "unchanged_member_ids";
const UPDATED_KEY: &str = "updated_member_ids";

/// How many members a bulk action updated, skipped, and failed on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BulkCounts {
    pub updated: Option<usize>,
    pub skipped: Option<usize>,
    pub failed: Option<usize>,
}

impl BulkCounts {
    /// Estimate counts from explicit `*_count` fields, falling back to the
    /// length of the matching id lists.
    pub fn from_row(row: &RawAuditRow) -> Self {
        let len_of = |key: &str| {
            let ids = as_id_list(row.detail(key));
            (!ids.is_empty()).then_some(ids.len())
        };

        let failed_ids = dedup_preserving_order(
            ERROR_SETS
                .iter()
                .map(|(key, _)| *key)
                .chain([FAILED_KEY])
                .flat_map(|key| as_id_list(row.detail(key))),
        );

        // With an explicit updated set, mentioned ids outside every set were skipped.
        let not_updated = if matches!(row.detail(UPDATED_KEY), Some(Value::Array(_))) {
            let updated = id_set(row, UPDATED_KEY);
            let unchanged = id_set(row, UNCHANGED_KEY);
            target_item_ids(row)
                .into_iter()
                .filter(|id| {
                    !updated.contains(id) && !unchanged.contains(id) && !failed_ids.contains(id)
                })
                .count()
        } else {
            0
        };
        let skipped_ids = len_of(UNCHANGED_KEY).unwrap_or(0) + not_updated;

        Self {
            updated: as_count(row.detail("updated_count")).or_else(|| len_of(UPDATED_KEY)),
            skipped: as_count(row.detail("skipped_count"))
                .or((skipped_ids > 0).then_some(skipped_ids)),
            failed: as_count(row.detail("failed_count"))
                .or((!failed_ids.is_empty()).then_some(failed_ids.len())),
        }
    }

    /// Both some members updated and some skipped.
    pub fn is_partial(&self) -> bool {
        self.updated.is_some_and(|n| n > 0) && self.skipped.is_some_and(|n| n > 0)
    }
}

/// Every member id a bulk row mentions, in first-seen order.
pub fn target_item_ids(row: &RawAuditRow) -> Vec<String> {
    let keys = ["member_ids", "deleted_member_ids", UPDATED_KEY, UNCHANGED_KEY]
        .into_iter()
        .chain(ERROR_SETS.iter().map(|(key, _)| *key))
        .chain([FAILED_KEY]);
    dedup_preserving_order(keys.flat_map(|key| as_id_list(row.detail(key))))
}

fn id_set(row: &RawAuditRow, key: &str) -> HashSet<String> {
    as_id_list(row.detail(key)).into_iter().collect()
}

/// Per-member outcome of a bulk action.
///
/// Returns nothing unless the row names at least two members. Items are
/// ordered errors first, then skipped, then ok, keeping input order within
/// each group.
pub fn target_items(
    row: &RawAuditRow,
    first_change: Option<&str>,
    directory: &MemberDirectory,
    snapshots: &SnapshotIndex,
) -> Vec<AuditTargetItem> {
    let ids = target_item_ids(row);
    if ids.len() < 2 {
        return Vec::new();
    }

    let error_sets: Vec<(HashSet<String>, &str)> = ERROR_SETS
        .iter()
        .map(|(key, reason)| (id_set(row, key), *reason))
        .collect();
    let failed = id_set(row, FAILED_KEY);
    let unchanged = id_set(row, UNCHANGED_KEY);
    let updated = matches!(row.detail(UPDATED_KEY), Some(Value::Array(_)))
        .then(|| id_set(row, UPDATED_KEY));
    let failure_reasons: HashMap<String, String> = as_object(row.detail("failure_reasons"))
        .into_iter()
        .flatten()
        .filter_map(|(key, reason)| {
            let id = uuid_of(key).or_else(|| normalize_id(key))?;
            Some((id, as_string(Some(reason))?))
        })
        .collect();

    let mut items: Vec<AuditTargetItem> = ids
        .into_iter()
        .map(|id| {
            let (status, reason) = if let Some((_, reason)) =
                error_sets.iter().find(|(set, _)| set.contains(&id))
            {
                (TargetItemStatus::Error, Some((*reason).to_string()))
            } else if failed.contains(&id) {
                let reason = failure_reasons
                    .get(&id)
                    .cloned()
                    .unwrap_or_else(|| FAILED_REASON.to_string());
                (TargetItemStatus::Error, Some(reason))
            } else if unchanged.contains(&id) {
                (TargetItemStatus::Skipped, Some("Ingen endring".to_string()))
            } else if updated.as_ref().is_some_and(|set| !set.contains(&id)) {
                (TargetItemStatus::Skipped, Some("Ikke oppdatert".to_string()))
            } else {
                (TargetItemStatus::Ok, None)
            };

            let change = (status == TargetItemStatus::Ok)
                .then(|| first_change.map(String::from))
                .flatten();
            let (name, email) = resolve_member(&id, directory, snapshots);

            AuditTargetItem {
                id,
                name,
                email,
                status,
                reason,
                change,
            }
        })
        .collect();

    items.sort_by_key(|item| item.status);
    items
}
