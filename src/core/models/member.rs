use serde::{Deserialize, Serialize};

use crate::core::services::tokens::full_name;

/// A row of the live `members` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub id: String,
    #[serde(default)]
    pub firstname: Option<String>,
    #[serde(default)]
    pub lastname: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl Member {
    /// Best display label: full name, then email, then id.
    pub fn display_name(&self) -> String {
        full_name(self.firstname.as_deref(), self.lastname.as_deref())
            .or_else(|| self.email.clone())
            .unwrap_or_else(|| self.id.clone())
    }
}

/// Best-effort identity of a member as it looked when an audit row was written.
///
/// Fragments for the same id are merged across rows, so any field may be
/// missing even after the merge.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MemberSnapshot {
    pub id: String,
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub email: Option<String>,
    pub name: Option<String>,
}

impl MemberSnapshot {
    /// Best display label: explicit name, then email, then id.
    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .or_else(|| self.email.clone())
            .unwrap_or_else(|| self.id.clone())
    }
}
