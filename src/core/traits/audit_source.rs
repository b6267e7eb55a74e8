use crate::core::errors::Result;
use crate::core::models::member::Member;
use crate::core::models::raw_audit_row::RawAuditRow;

/// Port for reading the audit log and the live member table.
///
/// Implementations are read-only. Lookup methods receive at most one chunk
/// of keys per call; chunking is the caller's job.
pub trait AuditSource: Send + Sync {
    /// Fetch up to `limit` raw audit rows, newest first.
    ///
    /// Must return `AuditTableMissing` when the audit table itself does not
    /// exist, so callers can tell a schema problem from a query failure.
    fn fetch_raw_rows(&self, limit: usize) -> Result<Vec<RawAuditRow>>;

    /// Fetch live members whose id is in `ids`.
    fn members_by_ids(&self, ids: &[String]) -> Result<Vec<Member>>;

    /// Fetch live members whose (lowercased) email is in `emails`.
    fn members_by_emails(&self, emails: &[String]) -> Result<Vec<Member>>;
}
