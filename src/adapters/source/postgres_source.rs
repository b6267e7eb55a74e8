//! Live PostgreSQL audit source.
//!
//! The engine is synchronous, so every query runs on a private
//! current-thread tokio runtime owned by the source.

use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tokio::runtime::Runtime;
use tracing::instrument;

use crate::core::errors::{Result, RosterError};
use crate::core::models::member::Member;
use crate::core::models::raw_audit_row::RawAuditRow;
use crate::core::services::audit_service::AUDIT_TABLE;
use crate::core::traits::audit_source::AuditSource;

/// PostgreSQL error code for `undefined_table`.
const UNDEFINED_TABLE: &str = "42P01";

/// Connection settings for the read-only pool.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl DatabaseConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 2,
            acquire_timeout: Duration::from_secs(10),
        }
    }

    /// Read the connection URL from the environment variable `var`.
    pub fn from_env(var: &str) -> Result<Self> {
        let url = std::env::var(var).map_err(|_| RosterError::SourceUnavailable {
            reason: format!("Environment variable {var} is not set"),
        })?;
        if url.trim().is_empty() {
            return Err(RosterError::SourceUnavailable {
                reason: format!("Environment variable {var} is empty"),
            });
        }
        Ok(Self::new(url))
    }
}

#[derive(Debug, FromRow)]
struct AuditLogRecord {
    id: String,
    created_at: DateTime<Utc>,
    actor_id: Option<String>,
    action: String,
    target_table: Option<String>,
    target_id: Option<String>,
    status: Option<String>,
    error_message: Option<String>,
    details: Option<serde_json::Value>,
}

impl From<AuditLogRecord> for RawAuditRow {
    fn from(r: AuditLogRecord) -> Self {
        Self {
            id: r.id,
            created_at: r.created_at,
            actor_id: r.actor_id,
            action: r.action,
            target_table: r.target_table,
            target_id: r.target_id,
            status: r.status,
            error_message: r.error_message,
            details: r.details,
        }
    }
}

#[derive(Debug, FromRow)]
struct MemberRecord {
    id: String,
    firstname: Option<String>,
    lastname: Option<String>,
    email: Option<String>,
}

impl From<MemberRecord> for Member {
    fn from(r: MemberRecord) -> Self {
        Self {
            id: r.id,
            firstname: r.firstname,
            lastname: r.lastname,
            email: r.email,
        }
    }
}

/// Reads `admin_audit_log` and `members` through a small connection pool.
pub struct PostgresAuditSource {
    runtime: Runtime,
    pool: PgPool,
}

impl PostgresAuditSource {
    /// Build the runtime and open the pool. Fails with `SourceUnavailable`
    /// if the database cannot be reached.
    pub fn connect(config: &DatabaseConfig) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| RosterError::SourceUnavailable {
                reason: format!("Failed to create async runtime: {e}"),
            })?;

        let pool = runtime
            .block_on(
                PgPoolOptions::new()
                    .max_connections(config.max_connections)
                    .acquire_timeout(config.acquire_timeout)
                    .connect(&config.url),
            )
            .map_err(|e| RosterError::SourceUnavailable {
                reason: format!("Cannot connect to PostgreSQL: {e}"),
            })?;

        Ok(Self { runtime, pool })
    }

    /// Reachability check used by `rosterlog status`.
    pub fn ping(&self) -> Result<()> {
        self.runtime
            .block_on(sqlx::query("SELECT 1").execute(&self.pool))
            .map(|_| ())
            .map_err(|e| RosterError::SourceUnavailable {
                reason: e.to_string(),
            })
    }

    fn lookup(&self, sql: &str, keys: &[String]) -> Result<Vec<Member>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let records = self
            .runtime
            .block_on(
                sqlx::query_as::<_, MemberRecord>(sql)
                    .bind(keys)
                    .fetch_all(&self.pool),
            )
            .map_err(|e| RosterError::MemberLookupFailed {
                reason: e.to_string(),
            })?;
        Ok(records.into_iter().map(Member::from).collect())
    }
}

impl AuditSource for PostgresAuditSource {
    #[instrument(skip(self))]
    fn fetch_raw_rows(&self, limit: usize) -> Result<Vec<RawAuditRow>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let records = self
            .runtime
            .block_on(
                sqlx::query_as::<_, AuditLogRecord>(
                    r#"
                    SELECT id::text AS id, created_at, actor_id::text AS actor_id, action,
                           target_table, target_id::text AS target_id, status,
                           error_message, details
                    FROM admin_audit_log
                    ORDER BY created_at DESC
                    LIMIT $1
                    "#,
                )
                .bind(limit)
                .fetch_all(&self.pool),
            )
            .map_err(map_audit_error)?;

        Ok(records.into_iter().map(RawAuditRow::from).collect())
    }

    #[instrument(skip(self, ids), fields(count = ids.len()))]
    fn members_by_ids(&self, ids: &[String]) -> Result<Vec<Member>> {
        self.lookup(
            r#"
            SELECT id::text AS id, firstname, lastname, email
            FROM members
            WHERE id::text = ANY($1)
            "#,
            ids,
        )
    }

    #[instrument(skip(self, emails), fields(count = emails.len()))]
    fn members_by_emails(&self, emails: &[String]) -> Result<Vec<Member>> {
        self.lookup(
            r#"
            SELECT id::text AS id, firstname, lastname, email
            FROM members
            WHERE lower(email) = ANY($1)
            "#,
            emails,
        )
    }
}

fn map_audit_error(e: sqlx::Error) -> RosterError {
    if let Some(db_err) = e.as_database_error()
        && db_err.code().as_deref() == Some(UNDEFINED_TABLE)
    {
        return RosterError::AuditTableMissing {
            table: AUDIT_TABLE.to_string(),
        };
    }
    RosterError::AuditQueryFailed {
        reason: e.to_string(),
    }
}
