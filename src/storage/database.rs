//! SQLite-backed session store using rusqlite.

use super::schema::{CURRENT_VERSION, SCHEMA, SCHEMA_VERSION_TABLE};
use super::store::{
    BlockCompletion, IntervalCompletion, PersistedBlockRecord, PersistedIntervalRecord,
    PersistedSession, SessionHeader, SessionStatus, SessionStore, SessionSummary, StoreError,
};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Session store persisted in SQLite.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a database at the given path.
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| DatabaseError::IoError(e.to_string()))?;
        }

        let conn =
            Connection::open(path).map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))?;
        initialize(&conn)?;

        tracing::info!(path = %path.display(), "Session database opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))?;
        initialize(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Current schema version.
    pub async fn schema_version(&self) -> Result<i32, DatabaseError> {
        get_schema_version(&*self.conn.lock().await)
    }
}

/// Create the version table and bring the schema up to date.
fn initialize(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")
        .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;

    conn.execute_batch(SCHEMA_VERSION_TABLE)
        .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;

    let current_version = get_schema_version(conn)?;
    if current_version < CURRENT_VERSION {
        migrate(conn, current_version)?;
    }

    Ok(())
}

fn get_schema_version(conn: &Connection) -> Result<i32, DatabaseError> {
    let result: SqliteResult<i32> = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    );

    match result {
        Ok(version) => Ok(version),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(0),
        Err(e) => Err(DatabaseError::QueryFailed(e.to_string())),
    }
}

fn migrate(conn: &Connection, from_version: i32) -> Result<(), DatabaseError> {
    if from_version < 1 {
        conn.execute_batch(SCHEMA)
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;

        conn.execute(
            "INSERT INTO schema_version (version, applied_at) VALUES (?, datetime('now'))",
            [CURRENT_VERSION],
        )
        .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;

        tracing::info!("Database migrated to version {}", CURRENT_VERSION);
    }

    Ok(())
}

/// Serialize a unit enum to its serde name.
fn to_sql_text<T: Serialize>(value: &T) -> Result<String, DatabaseError> {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::String(s)) => Ok(s),
        Ok(other) => Ok(other.to_string()),
        Err(e) => Err(DatabaseError::SerializationError(e.to_string())),
    }
}

/// Parse a unit enum from its serde name.
fn from_sql_text<T: DeserializeOwned>(text: &str) -> Result<T, DatabaseError> {
    serde_json::from_value(serde_json::Value::String(text.to_string()))
        .map_err(|e| DatabaseError::DeserializationError(format!("{}: {}", text, e)))
}

fn parse_uuid(text: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(text).map_err(|e| DatabaseError::DeserializationError(e.to_string()))
}

fn parse_time(text: &str) -> Result<DateTime<Utc>, DatabaseError> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DatabaseError::DeserializationError(e.to_string()))
}

fn parse_optional_time(text: Option<String>) -> Result<Option<DateTime<Utc>>, DatabaseError> {
    text.as_deref().map(parse_time).transpose()
}

fn insert_session(
    conn: &mut Connection,
    header: &SessionHeader,
    blocks: &[PersistedBlockRecord],
) -> Result<(), DatabaseError> {
    let prescription_json = serde_json::to_string(&header.prescription)
        .map_err(|e| DatabaseError::SerializationError(e.to_string()))?;

    let tx = conn
        .transaction()
        .map_err(|e| DatabaseError::TransactionFailed(e.to_string()))?;

    tx.execute(
        "INSERT INTO endurance_sessions (id, owner_id, discipline, session_name,
         planned_duration_seconds, prescription_json, status, started_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            header.id.to_string(),
            header.owner_id.to_string(),
            to_sql_text(&header.discipline)?,
            header.session_name,
            header.planned_duration_seconds,
            prescription_json,
            SessionStatus::InProgress.as_str(),
            header.started_at.to_rfc3339(),
        ],
    )
    .map_err(map_write_error)?;

    {
        let mut stmt = tx
            .prepare(
                "INSERT INTO endurance_blocks (id, session_id, block_index, block_type, name,
                 target_zone, duration_target_seconds, completed)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0)",
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        for block in blocks {
            stmt.execute(params![
                block.id.to_string(),
                block.session_id.to_string(),
                block.block_index as i64,
                to_sql_text(&block.block_type)?,
                block.name,
                block.target_zone,
                block.duration_target_seconds,
            ])
            .map_err(map_write_error)?;
        }
    }

    tx.commit()
        .map_err(|e| DatabaseError::TransactionFailed(e.to_string()))?;

    Ok(())
}

fn map_write_error(e: rusqlite::Error) -> DatabaseError {
    match e {
        rusqlite::Error::SqliteFailure(err, msg)
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            DatabaseError::ConstraintViolation(msg.unwrap_or_else(|| err.to_string()))
        }
        other => DatabaseError::QueryFailed(other.to_string()),
    }
}

/// Raw row from endurance_blocks.
struct BlockRow {
    id: String,
    session_id: String,
    block_index: i64,
    block_type: String,
    name: String,
    target_zone: String,
    duration_target_seconds: u32,
    duration_actual_seconds: Option<u32>,
    avg_heart_rate: Option<u16>,
    effort: Option<u8>,
    notes: Option<String>,
    started_at: Option<String>,
    completed_at: Option<String>,
    completed: bool,
}

const BLOCK_COLUMNS: &str = "id, session_id, block_index, block_type, name, target_zone,
     duration_target_seconds, duration_actual_seconds, avg_heart_rate, effort, notes,
     started_at, completed_at, completed";

fn read_block_row(row: &rusqlite::Row<'_>) -> SqliteResult<BlockRow> {
    Ok(BlockRow {
        id: row.get(0)?,
        session_id: row.get(1)?,
        block_index: row.get(2)?,
        block_type: row.get(3)?,
        name: row.get(4)?,
        target_zone: row.get(5)?,
        duration_target_seconds: row.get(6)?,
        duration_actual_seconds: row.get(7)?,
        avg_heart_rate: row.get(8)?,
        effort: row.get(9)?,
        notes: row.get(10)?,
        started_at: row.get(11)?,
        completed_at: row.get(12)?,
        completed: row.get(13)?,
    })
}

impl BlockRow {
    fn into_record(self) -> Result<PersistedBlockRecord, DatabaseError> {
        Ok(PersistedBlockRecord {
            id: parse_uuid(&self.id)?,
            session_id: parse_uuid(&self.session_id)?,
            block_index: self.block_index as usize,
            block_type: from_sql_text(&self.block_type)?,
            name: self.name,
            target_zone: self.target_zone,
            duration_target_seconds: self.duration_target_seconds,
            duration_actual_seconds: self.duration_actual_seconds,
            avg_heart_rate: self.avg_heart_rate,
            effort: self.effort,
            notes: self.notes,
            started_at: parse_optional_time(self.started_at)?,
            completed_at: parse_optional_time(self.completed_at)?,
            completed: self.completed,
        })
    }
}

/// Raw row from endurance_intervals.
struct IntervalRow {
    id: String,
    session_id: String,
    block_id: String,
    interval_index: i64,
    repeat: u32,
    kind: String,
    zone: String,
    duration_target_seconds: u32,
    duration_actual_seconds: Option<u32>,
    avg_heart_rate: Option<u16>,
    started_at: Option<String>,
    completed_at: Option<String>,
    completed: bool,
}

const INTERVAL_COLUMNS: &str = "id, session_id, block_id, interval_index, repeat, kind, zone,
     duration_target_seconds, duration_actual_seconds, avg_heart_rate, started_at,
     completed_at, completed";

fn read_interval_row(row: &rusqlite::Row<'_>) -> SqliteResult<IntervalRow> {
    Ok(IntervalRow {
        id: row.get(0)?,
        session_id: row.get(1)?,
        block_id: row.get(2)?,
        interval_index: row.get(3)?,
        repeat: row.get(4)?,
        kind: row.get(5)?,
        zone: row.get(6)?,
        duration_target_seconds: row.get(7)?,
        duration_actual_seconds: row.get(8)?,
        avg_heart_rate: row.get(9)?,
        started_at: row.get(10)?,
        completed_at: row.get(11)?,
        completed: row.get(12)?,
    })
}

impl IntervalRow {
    fn into_record(self) -> Result<PersistedIntervalRecord, DatabaseError> {
        Ok(PersistedIntervalRecord {
            id: parse_uuid(&self.id)?,
            session_id: parse_uuid(&self.session_id)?,
            block_id: parse_uuid(&self.block_id)?,
            interval_index: self.interval_index as usize,
            repeat: self.repeat,
            kind: from_sql_text(&self.kind)?,
            zone: from_sql_text(&self.zone)?,
            duration_target_seconds: self.duration_target_seconds,
            duration_actual_seconds: self.duration_actual_seconds,
            avg_heart_rate: self.avg_heart_rate,
            started_at: parse_optional_time(self.started_at)?,
            completed_at: parse_optional_time(self.completed_at)?,
            completed: self.completed,
        })
    }
}

/// Run an UPDATE that must touch exactly one row.
fn update_one(
    conn: &Connection,
    sql: &str,
    params: &[&dyn rusqlite::ToSql],
    what: &str,
) -> Result<(), DatabaseError> {
    let updated = conn.execute(sql, params).map_err(map_write_error)?;
    if updated == 0 {
        return Err(DatabaseError::NotFound(what.to_string()));
    }
    Ok(())
}

fn query_blocks(conn: &Connection, session_id: Uuid) -> Result<Vec<PersistedBlockRecord>, DatabaseError> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {} FROM endurance_blocks WHERE session_id = ?1 ORDER BY block_index",
            BLOCK_COLUMNS
        ))
        .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

    let rows = stmt
        .query_map(params![session_id.to_string()], read_block_row)
        .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

    let mut blocks = Vec::new();
    for row in rows {
        let row = row.map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
        blocks.push(row.into_record()?);
    }
    Ok(blocks)
}

fn query_intervals(
    conn: &Connection,
    block_id: Uuid,
) -> Result<Vec<PersistedIntervalRecord>, DatabaseError> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {} FROM endurance_intervals WHERE block_id = ?1 ORDER BY interval_index",
            INTERVAL_COLUMNS
        ))
        .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

    let rows = stmt
        .query_map(params![block_id.to_string()], read_interval_row)
        .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

    let mut intervals = Vec::new();
    for row in rows {
        let row = row.map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
        intervals.push(row.into_record()?);
    }
    Ok(intervals)
}

fn query_session(conn: &Connection, session_id: Uuid) -> Result<Option<PersistedSession>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT id, owner_id, discipline, session_name, planned_duration_seconds,
             prescription_json, status, started_at, summary_json
             FROM endurance_sessions WHERE id = ?1",
            params![session_id.to_string()],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, u32>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, String>(6)?,
                    row.get::<_, String>(7)?,
                    row.get::<_, Option<String>>(8)?,
                ))
            },
        )
        .optional()
        .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

    let Some((id, owner_id, discipline, name, planned, prescription, status, started_at, summary)) =
        row
    else {
        return Ok(None);
    };

    let header = SessionHeader {
        id: parse_uuid(&id)?,
        owner_id: parse_uuid(&owner_id)?,
        discipline: from_sql_text(&discipline)?,
        session_name: name,
        planned_duration_seconds: planned,
        prescription: serde_json::from_str(&prescription)
            .map_err(|e| DatabaseError::DeserializationError(e.to_string()))?,
        started_at: parse_time(&started_at)?,
    };

    let status = SessionStatus::parse(&status)
        .ok_or_else(|| DatabaseError::DeserializationError(format!("status {}", status)))?;

    let summary = summary
        .map(|json| serde_json::from_str::<SessionSummary>(&json))
        .transpose()
        .map_err(|e| DatabaseError::DeserializationError(e.to_string()))?;

    Ok(Some(PersistedSession {
        header,
        status,
        summary,
    }))
}

impl SessionStore for SqliteStore {
    async fn session_exists(&self, session_id: Uuid) -> Result<bool, StoreError> {
        let conn = self.conn.lock().await;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM endurance_sessions WHERE id = ?1",
                params![session_id.to_string()],
                |row| row.get(0),
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
        Ok(count > 0)
    }

    async fn insert_session(
        &self,
        header: SessionHeader,
        blocks: Vec<PersistedBlockRecord>,
    ) -> Result<(), StoreError> {
        let mut conn = self.conn.lock().await;
        insert_session(&mut conn, &header, &blocks)?;
        tracing::debug!(session_id = %header.id, blocks = blocks.len(), "Inserted session");
        Ok(())
    }

    async fn find_block(
        &self,
        session_id: Uuid,
        block_index: usize,
    ) -> Result<Option<PersistedBlockRecord>, StoreError> {
        let conn = self.conn.lock().await;
        let row = conn
            .query_row(
                &format!(
                    "SELECT {} FROM endurance_blocks WHERE session_id = ?1 AND block_index = ?2",
                    BLOCK_COLUMNS
                ),
                params![session_id.to_string(), block_index as i64],
                read_block_row,
            )
            .optional()
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        Ok(row.map(BlockRow::into_record).transpose()?)
    }

    async fn list_blocks(&self, session_id: Uuid) -> Result<Vec<PersistedBlockRecord>, StoreError> {
        let conn = self.conn.lock().await;
        Ok(query_blocks(&conn, session_id)?)
    }

    async fn mark_block_started(&self, block_id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError> {
        let conn = self.conn.lock().await;
        update_one(
            &conn,
            "UPDATE endurance_blocks SET started_at = ?1 WHERE id = ?2",
            params![at.to_rfc3339(), block_id.to_string()],
            &format!("block {}", block_id),
        )?;
        Ok(())
    }

    async fn mark_block_completed(
        &self,
        block_id: Uuid,
        completion: BlockCompletion,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let conn = self.conn.lock().await;
        update_one(
            &conn,
            "UPDATE endurance_blocks SET duration_actual_seconds = ?1, avg_heart_rate = ?2,
             effort = ?3, notes = ?4, completed_at = ?5, completed = 1 WHERE id = ?6",
            params![
                completion.duration_actual_seconds,
                completion.avg_heart_rate,
                completion.effort,
                completion.notes,
                at.to_rfc3339(),
                block_id.to_string(),
            ],
            &format!("block {}", block_id),
        )?;
        Ok(())
    }

    async fn reopen_block(
        &self,
        block_id: Uuid,
        at: DateTime<Utc>,
        clear_completion: bool,
    ) -> Result<(), StoreError> {
        let conn = self.conn.lock().await;
        let sql = if clear_completion {
            "UPDATE endurance_blocks SET started_at = ?1, completed = 0, completed_at = NULL,
             duration_actual_seconds = NULL WHERE id = ?2"
        } else {
            "UPDATE endurance_blocks SET started_at = ?1 WHERE id = ?2"
        };
        update_one(
            &conn,
            sql,
            params![at.to_rfc3339(), block_id.to_string()],
            &format!("block {}", block_id),
        )?;
        Ok(())
    }

    async fn insert_intervals(
        &self,
        intervals: Vec<PersistedIntervalRecord>,
    ) -> Result<(), StoreError> {
        let mut conn = self.conn.lock().await;
        let tx = conn
            .transaction()
            .map_err(|e| DatabaseError::TransactionFailed(e.to_string()))?;

        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO endurance_intervals (id, session_id, block_id, interval_index,
                     repeat, kind, zone, duration_target_seconds, completed)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0)",
                )
                .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

            for interval in &intervals {
                stmt.execute(params![
                    interval.id.to_string(),
                    interval.session_id.to_string(),
                    interval.block_id.to_string(),
                    interval.interval_index as i64,
                    interval.repeat,
                    to_sql_text(&interval.kind)?,
                    to_sql_text(&interval.zone)?,
                    interval.duration_target_seconds,
                ])
                .map_err(map_write_error)?;
            }
        }

        tx.commit()
            .map_err(|e| DatabaseError::TransactionFailed(e.to_string()))?;
        Ok(())
    }

    async fn find_interval(
        &self,
        block_id: Uuid,
        interval_index: usize,
    ) -> Result<Option<PersistedIntervalRecord>, StoreError> {
        let conn = self.conn.lock().await;
        let row = conn
            .query_row(
                &format!(
                    "SELECT {} FROM endurance_intervals WHERE block_id = ?1 AND interval_index = ?2",
                    INTERVAL_COLUMNS
                ),
                params![block_id.to_string(), interval_index as i64],
                read_interval_row,
            )
            .optional()
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        Ok(row.map(IntervalRow::into_record).transpose()?)
    }

    async fn list_intervals(
        &self,
        block_id: Uuid,
    ) -> Result<Vec<PersistedIntervalRecord>, StoreError> {
        let conn = self.conn.lock().await;
        Ok(query_intervals(&conn, block_id)?)
    }

    async fn mark_interval_started(
        &self,
        interval_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let conn = self.conn.lock().await;
        update_one(
            &conn,
            "UPDATE endurance_intervals SET started_at = ?1 WHERE id = ?2",
            params![at.to_rfc3339(), interval_id.to_string()],
            &format!("interval {}", interval_id),
        )?;
        Ok(())
    }

    async fn mark_interval_completed(
        &self,
        interval_id: Uuid,
        completion: IntervalCompletion,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let conn = self.conn.lock().await;
        update_one(
            &conn,
            "UPDATE endurance_intervals SET duration_actual_seconds = ?1, avg_heart_rate = ?2,
             completed_at = ?3, completed = 1 WHERE id = ?4",
            params![
                completion.duration_actual_seconds,
                completion.avg_heart_rate,
                at.to_rfc3339(),
                interval_id.to_string(),
            ],
            &format!("interval {}", interval_id),
        )?;
        Ok(())
    }

    async fn finalize_session(
        &self,
        session_id: Uuid,
        summary: SessionSummary,
    ) -> Result<(), StoreError> {
        let summary_json = serde_json::to_string(&summary)
            .map_err(|e| DatabaseError::SerializationError(e.to_string()))?;

        let conn = self.conn.lock().await;
        update_one(
            &conn,
            "UPDATE endurance_sessions SET status = ?1, summary_json = ?2, completed_at = ?3
             WHERE id = ?4",
            params![
                summary.status.as_str(),
                summary_json,
                summary.completed_at.to_rfc3339(),
                session_id.to_string(),
            ],
            &format!("session {}", session_id),
        )?;
        Ok(())
    }

    async fn get_session(&self, session_id: Uuid) -> Result<Option<PersistedSession>, StoreError> {
        let conn = self.conn.lock().await;
        Ok(query_session(&conn, session_id)?)
    }
}

/// Database errors.
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Failed to connect to database: {0}")]
    ConnectionFailed(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Deserialization error: {0}")]
    DeserializationError(String),
}

impl From<DatabaseError> for StoreError {
    fn from(e: DatabaseError) -> Self {
        match e {
            DatabaseError::ConnectionFailed(msg) | DatabaseError::IoError(msg) => {
                StoreError::Unavailable(msg)
            }
            DatabaseError::NotFound(msg) => StoreError::NotFound(msg),
            DatabaseError::SerializationError(msg) | DatabaseError::DeserializationError(msg) => {
                StoreError::Serialization(msg)
            }
            DatabaseError::ConstraintViolation(msg)
            | DatabaseError::QueryFailed(msg)
            | DatabaseError::TransactionFailed(msg)
            | DatabaseError::MigrationFailed(msg) => StoreError::Rejected(msg),
        }
    }
}
