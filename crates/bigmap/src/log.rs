//! Mutation-log entries as found in an operation result's `big_map_diff`.

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::warn;
use tzindex_micheline::Micheline;

use crate::error::ResolveError;

/// One big-map action. Pointers at or below `-1` are temporary.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum LogEntry {
    Alloc {
        #[serde(deserialize_with = "pointer")]
        big_map: i64,
        key_type: Micheline,
        value_type: Micheline,
    },
    Update {
        #[serde(deserialize_with = "pointer")]
        big_map: i64,
        key: Micheline,
        key_hash: String,
        /// Absent for deletions.
        #[serde(default)]
        value: Option<Micheline>,
    },
    Copy {
        #[serde(deserialize_with = "pointer")]
        source_big_map: i64,
        #[serde(deserialize_with = "pointer")]
        destination_big_map: i64,
    },
    Remove {
        #[serde(deserialize_with = "pointer")]
        big_map: i64,
    },
}

const KNOWN_ACTIONS: &[&str] = &["alloc", "update", "copy", "remove"];

impl LogEntry {
    pub fn kind(&self) -> &'static str {
        match self {
            LogEntry::Alloc { .. } => "alloc",
            LogEntry::Update { .. } => "update",
            LogEntry::Copy { .. } => "copy",
            LogEntry::Remove { .. } => "remove",
        }
    }

    /// Parse a raw `big_map_diff` array.
    ///
    /// Entries with an unrecognised `action` are skipped with a warning, or
    /// rejected when `strict` is set.
    pub fn parse_all(raw: &[Value], strict: bool) -> Result<Vec<LogEntry>, ResolveError> {
        let mut entries = Vec::with_capacity(raw.len());
        for (index, item) in raw.iter().enumerate() {
            let action = item.get("action").and_then(Value::as_str).unwrap_or("");
            if !KNOWN_ACTIONS.contains(&action) {
                if strict {
                    return Err(ResolveError::invalid(format!(
                        "unknown big map action '{}' at index {}",
                        action, index
                    )));
                }
                warn!(index, action, "skipping unknown big map action");
                continue;
            }
            let entry = serde_json::from_value(item.clone()).map_err(|e| {
                ResolveError::invalid(format!("big map action {}: {}", index, e))
            })?;
            entries.push(entry);
        }
        Ok(entries)
    }
}

/// Node RPC encodes pointers as decimal strings; simulations use numbers.
fn pointer<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(i64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s.parse().map_err(serde::de::Error::custom),
    }
}
