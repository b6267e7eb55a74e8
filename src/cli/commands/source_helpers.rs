use std::path::Path;

use crate::adapters::source::jsonl_source::JsonlAuditSource;
use crate::adapters::source::postgres_source::{DatabaseConfig, PostgresAuditSource};
use crate::config::app_config::{AppConfig, SourceKind};
use crate::core::errors::Result;
use crate::core::models::audit_log_row::AuditFetch;
use crate::core::models::member::Member;
use crate::core::models::raw_audit_row::RawAuditRow;
use crate::core::services::audit_service::{AuditService, EngineSettings};
use crate::core::traits::audit_source::AuditSource;

/// The source selected for this run.
pub enum ProjectSource {
    File(JsonlAuditSource),
    Postgres(PostgresAuditSource),
}

impl ProjectSource {
    /// Open the configured source, honoring a `--source` override.
    pub fn open(dir: &Path, config: &AppConfig, kind_override: Option<SourceKind>) -> Result<Self> {
        match kind_override.unwrap_or(config.source.kind) {
            SourceKind::File => Ok(Self::File(JsonlAuditSource::from_config(
                dir,
                &config.source,
            ))),
            SourceKind::Postgres => {
                let db = DatabaseConfig::from_env(&config.source.database_url_env)?;
                Ok(Self::Postgres(PostgresAuditSource::connect(&db)?))
            }
        }
    }
}

impl AuditSource for ProjectSource {
    fn fetch_raw_rows(&self, limit: usize) -> Result<Vec<RawAuditRow>> {
        match self {
            Self::File(s) => s.fetch_raw_rows(limit),
            Self::Postgres(s) => s.fetch_raw_rows(limit),
        }
    }

    fn members_by_ids(&self, ids: &[String]) -> Result<Vec<Member>> {
        match self {
            Self::File(s) => s.members_by_ids(ids),
            Self::Postgres(s) => s.members_by_ids(ids),
        }
    }

    fn members_by_emails(&self, emails: &[String]) -> Result<Vec<Member>> {
        match self {
            Self::File(s) => s.members_by_emails(emails),
            Self::Postgres(s) => s.members_by_emails(emails),
        }
    }
}

/// Load the project config and build an audit service over its source.
pub fn open_service(kind_override: Option<SourceKind>) -> Result<AuditService<ProjectSource>> {
    let dir = crate::cli::context::rosterlog_dir();
    let config = AppConfig::load(dir)?;
    let source = ProjectSource::open(dir, &config, kind_override)?;

    Ok(AuditService {
        source,
        settings: EngineSettings::from_config(config.engine.as_ref()),
    })
}

/// Run a full fetch behind a spinner.
pub fn fetch_with_spinner(service: &AuditService<ProjectSource>) -> Result<AuditFetch> {
    let sp = crate::cli::output::spinner("Reading audit log...");
    let result = service.fetch_audit_rows();
    crate::cli::output::clear_spinner(sp);
    result
}
