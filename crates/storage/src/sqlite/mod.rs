use std::collections::BTreeMap;
use std::future::Future;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use std::time::{SystemTime, UNIX_EPOCH};

use snafu::ResultExt;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Connection, SqliteConnection};

use super::LocalStateStore;
use super::error::{
    CreateSqliteDirectorySnafu, InvariantViolationSnafu, SqliteConnectOptionsSnafu,
    SqliteConnectSnafu, SqliteMigrateSnafu, SqlitePragmaSnafu, SqliteQuerySnafu,
    SqliteRuntimeInitSnafu, SqliteThreadSpawnSnafu, StorageResult,
};

pub const DEFAULT_STATE_DB_RELATIVE_PATH: &str = ".chatoor/state.db";

/// SQLite-backed local state.
///
/// Each call opens its own connection, so the database must live on disk;
/// `sqlite::memory:` would give every call a fresh empty database.
#[derive(Debug, Clone)]
pub struct SqliteLocalState {
    database_url: String,
}

impl SqliteLocalState {
    pub async fn open(database_location: &str) -> StorageResult<Self> {
        ensure_database_directory(database_location)?;

        let database_url = normalize_database_url(database_location);
        let connect_options = SqliteConnectOptions::from_str(&database_url)
            .context(SqliteConnectOptionsSnafu {
                stage: "sqlite-open-parse-url",
                database_url: database_url.clone(),
            })?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_millis(5_000));

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(connect_options)
            .await
            .context(SqliteConnectSnafu {
                stage: "sqlite-open-connect",
                database_url: database_url.clone(),
            })?;

        let _: String = sqlx::query_scalar("PRAGMA journal_mode = WAL;")
            .fetch_one(&pool)
            .await
            .context(SqlitePragmaSnafu {
                stage: "sqlite-open-pragma-journal-mode",
                pragma: "journal_mode",
            })?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context(SqliteMigrateSnafu {
                stage: "sqlite-open-migrate",
            })?;

        // The pool is bound to the caller's runtime; store calls reconnect per worker.
        pool.close().await;

        tracing::info!("opened local state database at {database_url}");
        Ok(Self { database_url })
    }

    fn run_db_call<T, F>(&self, stage: &'static str, op: F) -> StorageResult<T>
    where
        T: Send + 'static,
        F: Future<Output = StorageResult<T>> + Send + 'static,
    {
        // Store traits are sync, so each call executes on a dedicated worker thread
        // with its own current-thread runtime to avoid nested-runtime blocking panics.
        let worker = std::thread::Builder::new()
            .name(format!("sqlite-state-{stage}"))
            .spawn(move || {
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .context(SqliteRuntimeInitSnafu {
                        stage: "sqlite-state-runtime-build",
                    })?;
                runtime.block_on(op)
            })
            .context(SqliteThreadSpawnSnafu {
                stage: "sqlite-state-spawn-worker",
            })?;

        match worker.join() {
            Ok(result) => result,
            Err(_) => InvariantViolationSnafu {
                stage,
                details: "sqlite state worker thread panicked".to_string(),
            }
            .fail(),
        }
    }
}

impl LocalStateStore for SqliteLocalState {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let database_url = self.database_url.clone();
        let key = key.to_string();
        self.run_db_call("state-get", async move {
            let mut connection = connect_state_connection(&database_url, "state-get-connect").await?;
            sqlx::query_scalar::<_, String>("SELECT value FROM local_state WHERE key = ?")
                .bind(key)
                .fetch_optional(&mut connection)
                .await
                .context(SqliteQuerySnafu {
                    stage: "state-get-select",
                })
        })
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let database_url = self.database_url.clone();
        let key = key.to_string();
        let value = value.to_string();
        self.run_db_call("state-set", async move {
            let mut connection = connect_state_connection(&database_url, "state-set-connect").await?;
            sqlx::query(
                "INSERT INTO local_state (key, value, updated_at) VALUES (?, ?, ?) \
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            )
            .bind(key)
            .bind(value)
            .bind(unix_timestamp_seconds())
            .execute(&mut connection)
            .await
            .context(SqliteQuerySnafu {
                stage: "state-set-upsert",
            })?;
            Ok(())
        })
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        let database_url = self.database_url.clone();
        let key = key.to_string();
        self.run_db_call("state-remove", async move {
            let mut connection =
                connect_state_connection(&database_url, "state-remove-connect").await?;
            sqlx::query("DELETE FROM local_state WHERE key = ?")
                .bind(key)
                .execute(&mut connection)
                .await
                .context(SqliteQuerySnafu {
                    stage: "state-remove-delete",
                })?;
            Ok(())
        })
    }

    fn entries(&self) -> StorageResult<BTreeMap<String, String>> {
        let database_url = self.database_url.clone();
        self.run_db_call("state-entries", async move {
            let mut connection =
                connect_state_connection(&database_url, "state-entries-connect").await?;
            let rows: Vec<(String, String)> =
                sqlx::query_as("SELECT key, value FROM local_state ORDER BY key")
                    .fetch_all(&mut connection)
                    .await
                    .context(SqliteQuerySnafu {
                        stage: "state-entries-select",
                    })?;
            Ok(rows.into_iter().collect())
        })
    }

    fn clear(&self) -> StorageResult<()> {
        let database_url = self.database_url.clone();
        self.run_db_call("state-clear", async move {
            let mut connection =
                connect_state_connection(&database_url, "state-clear-connect").await?;
            let result = sqlx::query("DELETE FROM local_state")
                .execute(&mut connection)
                .await
                .context(SqliteQuerySnafu {
                    stage: "state-clear-delete",
                })?;
            tracing::info!("cleared {} local state entries", result.rows_affected());
            Ok(())
        })
    }
}

async fn connect_state_connection(
    database_url: &str,
    stage: &'static str,
) -> StorageResult<SqliteConnection> {
    let mut connection =
        SqliteConnection::connect(database_url)
            .await
            .context(SqliteConnectSnafu {
                stage,
                database_url: database_url.to_string(),
            })?;

    sqlx::query("PRAGMA busy_timeout = 5000;")
        .execute(&mut connection)
        .await
        .context(SqlitePragmaSnafu {
            stage: "sqlite-state-pragma-busy-timeout",
            pragma: "busy_timeout",
        })?;

    Ok(connection)
}

fn unix_timestamp_seconds() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0_i64, |duration| duration.as_secs() as i64)
}

fn ensure_database_directory(database_location: &str) -> StorageResult<()> {
    if database_location.starts_with("sqlite:") {
        return Ok(());
    }

    let path = Path::new(database_location);
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).context(CreateSqliteDirectorySnafu {
            stage: "sqlite-open-create-directory",
            path: parent.display().to_string(),
        })?;
    }

    Ok(())
}

fn normalize_database_url(database_location: &str) -> String {
    if database_location.starts_with("sqlite:") {
        return database_location.to_string();
    }

    format!("sqlite://{database_location}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_in(dir: &tempfile::TempDir) -> SqliteLocalState {
        let path = dir.path().join("nested").join("state.db");
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime
            .block_on(SqliteLocalState::open(path.to_str().unwrap()))
            .unwrap()
    }

    #[test]
    fn set_overwrites_and_get_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let state = open_in(&dir);

        state.set("app-config", "{}").unwrap();
        state.set("app-config", r#"{"tight_border":true}"#).unwrap();

        assert_eq!(
            state.get("app-config").unwrap().as_deref(),
            Some(r#"{"tight_border":true}"#)
        );
        assert_eq!(state.get("missing").unwrap(), None);
    }

    #[test]
    fn entries_survive_reopen_and_clear_empties_table() {
        let dir = tempfile::tempdir().unwrap();
        let state = open_in(&dir);
        state.set("channel/b", "2").unwrap();
        state.set("channel/a", "1").unwrap();

        let reopened = open_in(&dir);
        let entries = reopened.entries().unwrap();
        assert_eq!(entries.keys().collect::<Vec<_>>(), vec!["channel/a", "channel/b"]);

        reopened.remove("channel/a").unwrap();
        assert_eq!(reopened.entries().unwrap().len(), 1);

        reopened.clear().unwrap();
        assert!(reopened.entries().unwrap().is_empty());
    }

    #[test]
    fn database_url_is_normalized_for_plain_paths() {
        assert_eq!(normalize_database_url("a/b.db"), "sqlite://a/b.db");
        assert_eq!(normalize_database_url("sqlite://x.db"), "sqlite://x.db");
    }
}
