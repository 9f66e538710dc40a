//! Column name mapping for the session record table.
//!
//! Deployments that reuse an existing sessions table override individual
//! names; everything else keeps the defaults below. The display name, user
//! agent and client address columns are optional: an empty name means the
//! table has no such column and those values read back as empty strings.

use crate::error::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashSet;

/// Table and column names used by the record store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldMap {
    pub table: String,
    pub identifier: String,
    pub payload_key: String,
    pub user_id: String,
    #[serde(serialize_with = "serialize_optional", deserialize_with = "deserialize_optional")]
    pub display_name: Option<String>,
    #[serde(serialize_with = "serialize_optional", deserialize_with = "deserialize_optional")]
    pub user_agent: Option<String>,
    #[serde(serialize_with = "serialize_optional", deserialize_with = "deserialize_optional")]
    pub client_address: Option<String>,
    pub created_at: String,
    pub modified_at: String,
    pub accessed_at: String,
    pub expires_at: String,
}

impl Default for FieldMap {
    fn default() -> Self {
        Self {
            table: "user_sessions".into(),
            identifier: "id".into(),
            payload_key: "session_id".into(),
            user_id: "user_id".into(),
            display_name: Some("name".into()),
            user_agent: Some("useragent".into()),
            client_address: Some("ip".into()),
            created_at: "created".into(),
            modified_at: "modified".into(),
            accessed_at: "accessed".into(),
            expires_at: "expires".into(),
        }
    }
}

impl FieldMap {
    /// Mapped columns in the order the store selects them. Unmapped
    /// optional columns are left out.
    pub(crate) fn columns(&self) -> Vec<&str> {
        self.slots().into_iter().flatten().collect()
    }

    /// Comma separated select list. Unmapped optional columns select NULL
    /// so row positions stay fixed.
    pub(crate) fn select_list(&self) -> String {
        self.slots()
            .into_iter()
            .map(|slot| slot.unwrap_or("NULL"))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Column list and matching VALUES list for an insert.
    ///
    /// Placeholders are ?1 identifier, ?2 payload key, ?3 user, ?4 display
    /// name, ?5 user agent, ?6 client address, ?7 now (created and
    /// modified), ?8 accessed, ?9 expires.
    pub(crate) fn insert_lists(&self) -> (String, String) {
        const PLACEHOLDERS: [&str; 10] = ["?1", "?2", "?3", "?4", "?5", "?6", "?7", "?7", "?8", "?9"];

        let (columns, values): (Vec<_>, Vec<_>) = self
            .slots()
            .into_iter()
            .zip(PLACEHOLDERS)
            .filter_map(|(slot, placeholder)| slot.map(|column| (column, placeholder)))
            .unzip();
        (columns.join(", "), values.join(", "))
    }

    /// Reject names that cannot be spliced into SQL or that collide.
    ///
    /// Names end up inside statements verbatim, so only plain identifiers
    /// are accepted.
    pub fn validate(&self) -> Result<()> {
        check_identifier("table", &self.table)?;

        let mut seen = HashSet::new();
        for column in self.columns() {
            check_identifier("column", column)?;
            if !seen.insert(column.to_ascii_lowercase()) {
                return Err(Error::config(format!("column name used twice: {}", column)));
            }
        }
        Ok(())
    }

    fn slots(&self) -> [Option<&str>; 10] {
        [
            Some(self.identifier.as_str()),
            Some(self.payload_key.as_str()),
            Some(self.user_id.as_str()),
            self.display_name.as_deref(),
            self.user_agent.as_deref(),
            self.client_address.as_deref(),
            Some(self.created_at.as_str()),
            Some(self.modified_at.as_str()),
            Some(self.accessed_at.as_str()),
            Some(self.expires_at.as_str()),
        ]
    }
}

fn serialize_optional<S>(column: &Option<String>, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(column.as_deref().unwrap_or_default())
}

fn deserialize_optional<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let column = String::deserialize(deserializer)?;
    Ok(Some(column).filter(|c| !c.is_empty()))
}

pub(crate) fn check_identifier(kind: &str, name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };

    if valid {
        Ok(())
    } else {
        Err(Error::config(format!("invalid {} name: {:?}", kind, name)))
    }
}
