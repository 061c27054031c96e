//! Database schema definitions.

/// SQL schema for creating all session tables.
pub const SCHEMA: &str = r#"
-- Session headers and final aggregates
CREATE TABLE IF NOT EXISTS endurance_sessions (
    id TEXT PRIMARY KEY,
    owner_id TEXT NOT NULL,
    discipline TEXT NOT NULL,
    session_name TEXT NOT NULL,
    planned_duration_seconds INTEGER NOT NULL,
    prescription_json TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'in_progress',
    started_at TEXT NOT NULL,
    summary_json TEXT,
    completed_at TEXT
);

-- One row per block, created as a shell when the session starts
CREATE TABLE IF NOT EXISTS endurance_blocks (
    id TEXT PRIMARY KEY,
    session_id TEXT NOT NULL REFERENCES endurance_sessions(id) ON DELETE CASCADE,
    block_index INTEGER NOT NULL,
    block_type TEXT NOT NULL,
    name TEXT NOT NULL,
    target_zone TEXT NOT NULL,
    duration_target_seconds INTEGER NOT NULL,
    duration_actual_seconds INTEGER,
    avg_heart_rate INTEGER,
    effort INTEGER,
    notes TEXT,
    started_at TEXT,
    completed_at TEXT,
    completed INTEGER NOT NULL DEFAULT 0,
    UNIQUE (session_id, block_index)
);

CREATE INDEX IF NOT EXISTS idx_endurance_blocks_session ON endurance_blocks(session_id);

-- Work/rest slots of interval blocks
CREATE TABLE IF NOT EXISTS endurance_intervals (
    id TEXT PRIMARY KEY,
    session_id TEXT NOT NULL REFERENCES endurance_sessions(id) ON DELETE CASCADE,
    block_id TEXT NOT NULL REFERENCES endurance_blocks(id) ON DELETE CASCADE,
    interval_index INTEGER NOT NULL,
    repeat INTEGER NOT NULL,
    kind TEXT NOT NULL,
    zone TEXT NOT NULL,
    duration_target_seconds INTEGER NOT NULL,
    duration_actual_seconds INTEGER,
    avg_heart_rate INTEGER,
    started_at TEXT,
    completed_at TEXT,
    completed INTEGER NOT NULL DEFAULT 0,
    UNIQUE (block_id, interval_index)
);

CREATE INDEX IF NOT EXISTS idx_endurance_intervals_block ON endurance_intervals(block_id);
"#;

/// Schema version tracking table.
pub const SCHEMA_VERSION_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL
);
"#;

/// Current schema version.
pub const CURRENT_VERSION: i32 = 1;
