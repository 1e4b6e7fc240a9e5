use std::path::PathBuf;

use chatoor_storage::{
    LocalStateStore, SNAPSHOT_CONTENT_TYPE, SNAPSHOT_FILE_NAME, StateSnapshot, StorageError,
};
use snafu::{ResultExt, Snafu};

pub const RESET_CONFIRM_MESSAGE: &str = "Confirm to reset all settings to default?";

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ResetError {
    #[snafu(display("failed to read local state on `{stage}`: {source}"))]
    CaptureSnapshot {
        stage: &'static str,
        source: StorageError,
    },
    #[snafu(display("failed to create snapshot directory at {path:?} on `{stage}`: {source}"))]
    CreateSnapshotDir {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("failed to write snapshot file at {path:?} on `{stage}`: {source}"))]
    WriteSnapshot {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display(
        "failed to replace snapshot file from {from:?} to {to:?} on `{stage}`: {source}"
    ))]
    RenameSnapshot {
        stage: &'static str,
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("failed to clear local state on `{stage}`: {source}"))]
    ClearState {
        stage: &'static str,
        source: StorageError,
    },
}

/// Destination for the exported state snapshot.
pub trait SnapshotSink {
    fn deliver(&self, file_name: &str, contents: &str) -> Result<PathBuf, ResetError>;
}

/// Writes snapshots into the user's download directory.
#[derive(Debug, Clone)]
pub struct DownloadsDirSink {
    dir: PathBuf,
}

impl DownloadsDirSink {
    pub fn new() -> Self {
        let dir = dirs::download_dir()
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."));
        Self { dir }
    }

    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl Default for DownloadsDirSink {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotSink for DownloadsDirSink {
    fn deliver(&self, file_name: &str, contents: &str) -> Result<PathBuf, ResetError> {
        std::fs::create_dir_all(&self.dir).context(CreateSnapshotDirSnafu {
            stage: "create-snapshot-directory",
            path: self.dir.clone(),
        })?;

        let path = self.dir.join(file_name);
        let temp_path = path.with_extension("json.tmp");
        std::fs::write(&temp_path, contents).context(WriteSnapshotSnafu {
            stage: "write-temporary-snapshot-file",
            path: temp_path.clone(),
        })?;

        std::fs::rename(&temp_path, &path).context(RenameSnapshotSnafu {
            stage: "rename-temporary-snapshot-file",
            from: temp_path,
            to: path.clone(),
        })?;

        Ok(path)
    }
}

/// Result of a destructive reset. Clearing and reloading happen regardless of `snapshot`.
#[derive(Debug)]
pub struct ResetOutcome {
    pub snapshot: Result<PathBuf, ResetError>,
    pub cleared: Result<(), ResetError>,
}

pub fn save_snapshot(
    store: &dyn LocalStateStore,
    sink: &dyn SnapshotSink,
) -> Result<PathBuf, ResetError> {
    let snapshot = StateSnapshot::capture(store).context(CaptureSnapshotSnafu {
        stage: "capture-local-state",
    })?;
    let contents = snapshot.to_json().context(CaptureSnapshotSnafu {
        stage: "encode-local-state",
    })?;

    sink.deliver(SNAPSHOT_FILE_NAME, &contents)
}

/// Exports local state, then clears it and calls `reload`.
pub fn clear_and_save(
    store: &dyn LocalStateStore,
    sink: &dyn SnapshotSink,
    reload: impl FnOnce(),
) -> ResetOutcome {
    let snapshot = save_snapshot(store, sink);
    match &snapshot {
        Ok(path) => tracing::info!(
            content_type = SNAPSHOT_CONTENT_TYPE,
            "saved local state snapshot to {path:?}"
        ),
        Err(error) => tracing::warn!("failed to save local state snapshot: {error}"),
    }

    let cleared = store.clear().context(ClearStateSnafu {
        stage: "clear-local-state",
    });
    if let Err(error) = &cleared {
        tracing::error!("failed to clear local state: {error}");
    }

    reload();
    ResetOutcome { snapshot, cleared }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::collections::BTreeMap;

    use chatoor_storage::{MemoryLocalState, StorageResult};
    use tempfile::TempDir;

    use super::*;

    struct UnwritableSink;

    impl SnapshotSink for UnwritableSink {
        fn deliver(&self, _file_name: &str, _contents: &str) -> Result<PathBuf, ResetError> {
            Err(std::io::Error::other("disk full")).context(WriteSnapshotSnafu {
                stage: "test-sink",
                path: PathBuf::from("nowhere"),
            })
        }
    }

    struct BrokenState;

    impl LocalStateStore for BrokenState {
        fn get(&self, _key: &str) -> StorageResult<Option<String>> {
            Ok(None)
        }

        fn set(&self, _key: &str, _value: &str) -> StorageResult<()> {
            Ok(())
        }

        fn remove(&self, _key: &str) -> StorageResult<()> {
            Ok(())
        }

        fn entries(&self) -> StorageResult<BTreeMap<String, String>> {
            Err(StorageError::InvariantViolation {
                stage: "test-entries",
                details: "unreadable".to_string(),
            })
        }

        fn clear(&self) -> StorageResult<()> {
            Ok(())
        }
    }

    #[test]
    fn snapshot_lands_in_sink_directory_before_clearing() {
        let dir = TempDir::new().unwrap();
        let store = MemoryLocalState::with_entries([("app-config", "{}")]);
        let sink = DownloadsDirSink::with_dir(dir.path());
        let reloaded = Cell::new(false);

        let outcome = clear_and_save(&store, &sink, || reloaded.set(true));

        let path = outcome.snapshot.unwrap();
        assert_eq!(path, dir.path().join(SNAPSHOT_FILE_NAME));
        assert_eq!(
            std::fs::read_to_string(path).unwrap(),
            r#"{"app-config":"{}"}"#
        );
        assert!(outcome.cleared.is_ok());
        assert!(store.entries().unwrap().is_empty());
        assert!(reloaded.get());
    }

    #[test]
    fn failed_snapshot_still_clears_and_reloads() {
        let store = MemoryLocalState::with_entries([("channel/general", "{}")]);
        let reloaded = Cell::new(0);

        let outcome = clear_and_save(&store, &UnwritableSink, || {
            reloaded.set(reloaded.get() + 1)
        });

        assert!(outcome.snapshot.is_err());
        assert!(store.entries().unwrap().is_empty());
        assert_eq!(reloaded.get(), 1);
    }

    #[test]
    fn unreadable_state_still_reloads() {
        let dir = TempDir::new().unwrap();
        let reloaded = Cell::new(false);

        let outcome = clear_and_save(
            &BrokenState,
            &DownloadsDirSink::with_dir(dir.path()),
            || reloaded.set(true),
        );

        assert!(matches!(
            outcome.snapshot,
            Err(ResetError::CaptureSnapshot { .. })
        ));
        assert!(!dir.path().join(SNAPSHOT_FILE_NAME).exists());
        assert!(reloaded.get());
    }
}
