use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use super::LocalStateStore;
use super::error::{InvariantViolationSnafu, StorageResult};

/// Process-local state used when no database is available, and by tests.
#[derive(Debug, Default)]
pub struct MemoryLocalState {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryLocalState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: Mutex::new(
                entries
                    .into_iter()
                    .map(|(key, value)| (key.into(), value.into()))
                    .collect(),
            ),
        }
    }

    fn lock(&self, stage: &'static str) -> StorageResult<MutexGuard<'_, BTreeMap<String, String>>> {
        match self.entries.lock() {
            Ok(guard) => Ok(guard),
            Err(_) => InvariantViolationSnafu {
                stage,
                details: "memory state lock poisoned".to_string(),
            }
            .fail(),
        }
    }
}

impl LocalStateStore for MemoryLocalState {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.lock("memory-get")?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.lock("memory-set")?
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        self.lock("memory-remove")?.remove(key);
        Ok(())
    }

    fn entries(&self) -> StorageResult<BTreeMap<String, String>> {
        Ok(self.lock("memory-entries")?.clone())
    }

    fn clear(&self) -> StorageResult<()> {
        self.lock("memory-clear")?.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_listing_only_returns_matching_keys() {
        let state = MemoryLocalState::with_entries([
            ("channel/general", "{}"),
            ("channel/random", "{}"),
            ("app-config", "{}"),
        ]);

        let channels = state.entries_with_prefix("channel/").unwrap();
        assert_eq!(
            channels.keys().collect::<Vec<_>>(),
            vec!["channel/general", "channel/random"]
        );
    }

    #[test]
    fn clear_drops_every_entry() {
        let state = MemoryLocalState::new();
        state.set("a", "1").unwrap();
        state.set("b", "2").unwrap();

        state.clear().unwrap();

        assert!(state.entries().unwrap().is_empty());
        assert_eq!(state.get("a").unwrap(), None);
    }
}
