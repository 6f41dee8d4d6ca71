use super::{QueueStore, StoreFuture, StoreLimits};
use crate::command::types::payload_size;
use crate::command::{Command, CommandId, NewCommand};
use crate::error::StoreError;
use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow,
    SqliteSynchronous,
};
use std::path::Path;

const QUEUE_SCHEMA_META_TABLE: &str = "
CREATE TABLE IF NOT EXISTS queue_schema_meta (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
)";
const QUEUE_SCHEMA_VERSION_KEY: &str = "queue_schema_version";
const QUEUE_SCHEMA_VERSION: u32 = 1;

/// SQLite-backed queue using an sqlx pool.
///
/// `seq` is the authoritative FIFO order. The payload is stored as JSON text
/// next to its byte size so the capacity check never has to decode rows.
pub struct SqliteQueueStore {
    pool: SqlitePool,
    principal: String,
    limits: StoreLimits,
}

async fn ensure_queue_schema_version(pool: &SqlitePool) -> Result<(), StoreError> {
    sqlx::query(QUEUE_SCHEMA_META_TABLE).execute(pool).await?;

    let stored_version: Option<(String,)> =
        sqlx::query_as("SELECT value FROM queue_schema_meta WHERE key = $1")
            .bind(QUEUE_SCHEMA_VERSION_KEY)
            .fetch_optional(pool)
            .await?;

    if let Some((value,)) = stored_version {
        let parsed = value.parse::<u32>().map_err(|_| {
            StoreError::Schema(format!("invalid queue schema version value: {value}"))
        })?;
        // Older layouts stay readable; a newer one means a downgrade.
        if parsed > QUEUE_SCHEMA_VERSION {
            return Err(StoreError::Schema(format!(
                "queue database was written by a newer version: stored={parsed}, supported={QUEUE_SCHEMA_VERSION}"
            )));
        }
        if parsed < QUEUE_SCHEMA_VERSION {
            sqlx::query("UPDATE queue_schema_meta SET value = $1 WHERE key = $2")
                .bind(QUEUE_SCHEMA_VERSION.to_string())
                .bind(QUEUE_SCHEMA_VERSION_KEY)
                .execute(pool)
                .await?;
        }
        return Ok(());
    }

    let legacy_table_count: (i64,) = sqlx::query_as(
        "SELECT COUNT(*)
         FROM sqlite_master
         WHERE type = 'table'
           AND name = 'queued_commands'",
    )
    .fetch_one(pool)
    .await?;

    if legacy_table_count.0 > 0 {
        return Err(StoreError::Schema(
            "queue table found without schema version metadata; refusing to guess its layout"
                .into(),
        ));
    }

    sqlx::query("INSERT INTO queue_schema_meta (key, value) VALUES ($1, $2)")
        .bind(QUEUE_SCHEMA_VERSION_KEY)
        .bind(QUEUE_SCHEMA_VERSION.to_string())
        .execute(pool)
        .await?;

    Ok(())
}

impl SqliteQueueStore {
    /// Create a store over an existing pool and run migrations.
    pub async fn new(
        pool: SqlitePool,
        principal: impl Into<String>,
        limits: StoreLimits,
    ) -> Result<Self, StoreError> {
        ensure_queue_schema_version(&pool).await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS queued_commands (
                 seq INTEGER PRIMARY KEY AUTOINCREMENT,
                 id TEXT NOT NULL UNIQUE,
                 principal TEXT NOT NULL,
                 name TEXT NOT NULL,
                 payload TEXT NOT NULL,
                 payload_bytes INTEGER NOT NULL,
                 enqueued_at TEXT NOT NULL,
                 attempts INTEGER NOT NULL DEFAULT 0,
                 last_error TEXT
             )",
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_queued_commands_principal
                 ON queued_commands(principal, seq)",
        )
        .execute(&pool)
        .await?;

        Ok(Self {
            pool,
            principal: principal.into(),
            limits,
        })
    }

    /// Open (creating if needed) a queue database file.
    pub async fn open(
        path: &Path,
        principal: impl Into<String>,
        limits: StoreLimits,
    ) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|error| {
                StoreError::Schema(format!(
                    "cannot create queue directory {}: {error}",
                    parent.display()
                ))
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Full);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        Self::new(pool, principal, limits).await
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn stored_bytes(&self) -> Result<usize, StoreError> {
        let (total,): (i64,) = sqlx::query_as(
            "SELECT COALESCE(SUM(payload_bytes), 0) FROM queued_commands WHERE principal = $1",
        )
        .bind(&self.principal)
        .fetch_one(&self.pool)
        .await?;
        usize::try_from(total).map_err(|error| StoreError::Codec(error.to_string()))
    }
}

fn map_command_row(row: &SqliteRow) -> Result<Command, StoreError> {
    let payload_raw: String = row.try_get("payload")?;
    let enqueued_raw: String = row.try_get("enqueued_at")?;
    let attempts_raw: i64 = row.try_get("attempts")?;

    let enqueued_at = DateTime::parse_from_rfc3339(&enqueued_raw)
        .map_err(|error| StoreError::Codec(format!("invalid enqueued_at {enqueued_raw}: {error}")))?
        .with_timezone(&Utc);

    Ok(Command {
        id: CommandId::from(row.try_get::<String, _>("id")?),
        name: row.try_get("name")?,
        payload: serde_json::from_str(&payload_raw)?,
        enqueued_at,
        attempts: u32::try_from(attempts_raw)
            .map_err(|error| StoreError::Codec(format!("invalid attempts count: {error}")))?,
        last_error: row.try_get("last_error")?,
    })
}

fn to_i64(value: usize) -> Result<i64, StoreError> {
    i64::try_from(value).map_err(|error| StoreError::Codec(error.to_string()))
}

impl QueueStore for SqliteQueueStore {
    fn principal(&self) -> &str {
        &self.principal
    }

    fn is_durable(&self) -> bool {
        true
    }

    fn append(&self, command: NewCommand) -> StoreFuture<'_, Command> {
        Box::pin(async move {
            let payload = serde_json::to_string(&command.payload)?;
            let incoming = payload_size(&command.payload)?;
            self.limits.check(incoming, 0)?;

            // Capacity check and insert in one statement so a concurrent
            // append cannot slip in between them.
            let inserted = sqlx::query(
                "INSERT INTO queued_commands
                     (id, principal, name, payload, payload_bytes, enqueued_at, attempts, last_error)
                 SELECT $1, $2, $3, $4, $5, $6, 0, NULL
                 WHERE (SELECT COALESCE(SUM(payload_bytes), 0)
                        FROM queued_commands
                        WHERE principal = $2) + $5 <= $7",
            )
            .bind(command.id.as_str())
            .bind(&self.principal)
            .bind(&command.name)
            .bind(&payload)
            .bind(to_i64(incoming)?)
            .bind(command.enqueued_at.to_rfc3339())
            .bind(to_i64(self.limits.max_total_bytes)?)
            .execute(&self.pool)
            .await?
            .rows_affected();

            if inserted == 0 {
                let stored = self.stored_bytes().await?;
                self.limits.check(incoming, stored)?;
                return Err(StoreError::QueueFull {
                    stored,
                    incoming,
                    limit: self.limits.max_total_bytes,
                });
            }

            Ok(Command::from_new(command))
        })
    }

    fn list_all(&self) -> StoreFuture<'_, Vec<Command>> {
        Box::pin(async move {
            let rows = sqlx::query(
                "SELECT id, name, payload, enqueued_at, attempts, last_error
                 FROM queued_commands
                 WHERE principal = $1
                 ORDER BY seq ASC",
            )
            .bind(&self.principal)
            .fetch_all(&self.pool)
            .await?;

            rows.iter().map(map_command_row).collect()
        })
    }

    fn get<'a>(&'a self, id: &'a CommandId) -> StoreFuture<'a, Option<Command>> {
        Box::pin(async move {
            let row = sqlx::query(
                "SELECT id, name, payload, enqueued_at, attempts, last_error
                 FROM queued_commands
                 WHERE principal = $1 AND id = $2",
            )
            .bind(&self.principal)
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;

            row.as_ref().map(map_command_row).transpose()
        })
    }

    fn remove<'a>(&'a self, id: &'a CommandId) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            let deleted = sqlx::query("DELETE FROM queued_commands WHERE principal = $1 AND id = $2")
                .bind(&self.principal)
                .bind(id.as_str())
                .execute(&self.pool)
                .await?
                .rows_affected();
            Ok(deleted > 0)
        })
    }

    fn update_attempt<'a>(
        &'a self,
        id: &'a CommandId,
        attempts: u32,
        last_error: Option<&'a str>,
    ) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let updated = sqlx::query(
                "UPDATE queued_commands
                 SET attempts = $1, last_error = $2
                 WHERE principal = $3 AND id = $4",
            )
            .bind(i64::from(attempts))
            .bind(last_error)
            .bind(&self.principal)
            .bind(id.as_str())
            .execute(&self.pool)
            .await?
            .rows_affected();

            if updated == 0 {
                return Err(StoreError::NotFound(id.to_string()));
            }
            Ok(())
        })
    }

    fn len(&self) -> StoreFuture<'_, usize> {
        Box::pin(async move {
            let (count,): (i64,) =
                sqlx::query_as("SELECT COUNT(*) FROM queued_commands WHERE principal = $1")
                    .bind(&self.principal)
                    .fetch_one(&self.pool)
                    .await?;
            usize::try_from(count).map_err(|error| StoreError::Codec(error.to_string()))
        })
    }
}
