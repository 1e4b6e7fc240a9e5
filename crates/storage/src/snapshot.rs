use std::collections::BTreeMap;

use snafu::ResultExt;

use super::LocalStateStore;
use super::error::{EncodeSnapshotSnafu, StorageResult};

pub const SNAPSHOT_FILE_NAME: &str = "chatoor-snapshot.json";
pub const SNAPSHOT_CONTENT_TYPE: &str = "application/json";

/// Point-in-time copy of every persisted key/value pair.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateSnapshot {
    entries: BTreeMap<String, String>,
}

impl StateSnapshot {
    pub fn capture(store: &dyn LocalStateStore) -> StorageResult<Self> {
        Ok(Self {
            entries: store.entries()?,
        })
    }

    pub fn entries(&self) -> &BTreeMap<String, String> {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Encodes the snapshot as a flat JSON object of string values.
    pub fn to_json(&self) -> StorageResult<String> {
        serde_json::to_string(&self.entries).context(EncodeSnapshotSnafu {
            stage: "snapshot-encode-json",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryLocalState;

    #[test]
    fn snapshot_mirrors_store_as_flat_json_object() {
        let store = MemoryLocalState::with_entries([
            ("app-config", r#"{"tight_border":true}"#),
            ("channel/general", "{}"),
        ]);

        let snapshot = StateSnapshot::capture(&store).unwrap();
        let decoded: serde_json::Value = serde_json::from_str(&snapshot.to_json().unwrap()).unwrap();

        assert_eq!(
            decoded,
            serde_json::json!({
                "app-config": "{\"tight_border\":true}",
                "channel/general": "{}",
            })
        );
    }

    #[test]
    fn empty_store_exports_empty_object() {
        let snapshot = StateSnapshot::capture(&MemoryLocalState::new()).unwrap();
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.to_json().unwrap(), "{}");
    }
}
