use serde::{Deserialize, Serialize};
use tzindex_micheline::Micheline;

/// Where and when a record was produced.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Provenance {
    pub operation_id: String,
    pub level: i64,
    /// ISO 8601 / RFC 3339 timestamp string.
    pub timestamp: String,
    pub network: String,
    pub protocol: String,
}

/// One big-map mutation.
///
/// `value == None` marks a deletion. A later removal of the whole big map
/// re-emits each live key as a new record with `value == None`; history is
/// never edited in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BigMapDiff {
    pub id: String,
    /// Final on-chain pointer. Temporary (negative) pointers are never persisted.
    pub ptr: i64,
    pub key: Micheline,
    pub key_hash: String,
    #[serde(default)]
    pub key_strings: Vec<String>,
    pub value: Option<Micheline>,
    #[serde(default)]
    pub value_strings: Vec<String>,
    /// Structural path of the big map inside the contract storage type, e.g. `0/1/0`.
    pub bin_path: String,
    /// Contract owning the big map.
    pub address: String,
    #[serde(flatten)]
    pub provenance: Provenance,
}

impl BigMapDiff {
    /// True when this record marks the key as deleted.
    pub fn is_removed(&self) -> bool {
        self.value.is_none()
    }
}

/// Kind of a structural big-map event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BigMapActionKind {
    Alloc,
    Copy,
    Remove,
}

impl BigMapActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BigMapActionKind::Alloc => "alloc",
            BigMapActionKind::Copy => "copy",
            BigMapActionKind::Remove => "remove",
        }
    }
}

/// Audit record of an alloc, copy or remove.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BigMapAction {
    pub id: String,
    pub action: BigMapActionKind,
    pub source_ptr: Option<i64>,
    pub destination_ptr: Option<i64>,
    pub address: String,
    #[serde(flatten)]
    pub provenance: Provenance,
}

impl BigMapAction {
    /// True when the action references `ptr` on either side.
    pub fn touches(&self, ptr: i64) -> bool {
        self.source_ptr == Some(ptr) || self.destination_ptr == Some(ptr)
    }
}

/// Raw parameter and storage type expressions of a contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptRecord {
    pub address: String,
    pub parameter: Micheline,
    pub storage: Micheline,
}
