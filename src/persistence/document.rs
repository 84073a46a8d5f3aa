//! # Save Documents
//!
//! The on-disk shape of a save slot: a metadata header plus a map of opaque
//! per-component payloads keyed by save id.
//!
//! ```json
//! {
//!   "Metadata": {
//!     "SlotNumber": 1,
//!     "Description": "Before harvest",
//!     "SaveTime": "2026-03-01T12:00:00Z",
//!     "Version": "0.1.0",
//!     "PlayTimeSeconds": 1840.5,
//!     "IsAutoSave": false
//!   },
//!   "ComponentData": {
//!     "plantData": { "SchemaVersion": 1, "Data": { "count": 5 } }
//!   }
//! }
//! ```
//!
//! Unknown fields and unknown component ids are ignored when reading so that
//! documents written by newer builds still load.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Read;

/// Header written at the top of every save document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SaveMetadata {
    pub slot_number: u32,
    #[serde(default)]
    pub description: String,
    pub save_time: DateTime<Utc>,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub play_time_seconds: f64,
    #[serde(default)]
    pub is_auto_save: bool,
}

fn default_schema_version() -> u32 {
    1
}

/// Opaque state contributed by one saveable component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ComponentPayload {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl ComponentPayload {
    pub fn new(schema_version: u32, data: serde_json::Value) -> Self {
        Self {
            schema_version,
            data,
        }
    }

    /// Capture serializable component state
    pub fn from_state<S: Serialize>(schema_version: u32, state: &S) -> serde_json::Result<Self> {
        Ok(Self::new(schema_version, serde_json::to_value(state)?))
    }

    /// Restore component state from the payload
    pub fn to_state<S: DeserializeOwned>(&self) -> serde_json::Result<S> {
        S::deserialize(&self.data)
    }
}

/// Complete save document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SaveDocument {
    pub metadata: SaveMetadata,
    #[serde(default)]
    pub component_data: BTreeMap<String, ComponentPayload>,
}

impl SaveDocument {
    pub fn new(metadata: SaveMetadata) -> Self {
        Self {
            metadata,
            component_data: BTreeMap::new(),
        }
    }

    /// Add a component contribution. Save ids are unique within a document:
    /// a second contribution under an existing id is refused.
    pub fn insert(&mut self, save_id: impl Into<String>, payload: ComponentPayload) -> bool {
        match self.component_data.entry(save_id.into()) {
            std::collections::btree_map::Entry::Occupied(_) => false,
            std::collections::btree_map::Entry::Vacant(slot) => {
                slot.insert(payload);
                true
            }
        }
    }

    pub fn payload(&self, save_id: &str) -> Option<&ComponentPayload> {
        self.component_data.get(save_id)
    }

    pub fn to_bytes(&self, pretty: bool) -> serde_json::Result<Vec<u8>> {
        if pretty {
            serde_json::to_vec_pretty(self)
        } else {
            serde_json::to_vec(self)
        }
    }

    pub fn from_slice(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}

#[derive(Deserialize)]
struct MetadataOnly {
    #[serde(rename = "Metadata")]
    metadata: SaveMetadata,
}

/// Read only the metadata header. Payloads are skipped as they stream past,
/// but the document must still be complete to parse.
pub fn peek_metadata<R: Read>(reader: R) -> serde_json::Result<SaveMetadata> {
    serde_json::from_reader::<_, MetadataOnly>(reader).map(|doc| doc.metadata)
}
