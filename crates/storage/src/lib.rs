use std::collections::BTreeMap;

pub mod error;
pub mod memory;
pub mod snapshot;
pub mod sqlite;

pub use error::{StorageError, StorageResult};
pub use memory::MemoryLocalState;
pub use snapshot::{SNAPSHOT_CONTENT_TYPE, SNAPSHOT_FILE_NAME, StateSnapshot};
pub use sqlite::SqliteLocalState;

/// Flat key/value state persisted on this machine.
///
/// Every value is an opaque string; callers own their encoding. The whole map
/// is what a reset snapshot exports and what `clear` wipes.
pub trait LocalStateStore: Send + Sync {
    fn get(&self, key: &str) -> StorageResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;
    fn remove(&self, key: &str) -> StorageResult<()>;
    fn entries(&self) -> StorageResult<BTreeMap<String, String>>;
    fn clear(&self) -> StorageResult<()>;

    /// Returns entries whose key starts with `prefix`, ordered by key.
    fn entries_with_prefix(&self, prefix: &str) -> StorageResult<BTreeMap<String, String>> {
        let mut entries = self.entries()?;
        entries.retain(|key, _| key.starts_with(prefix));
        Ok(entries)
    }
}
