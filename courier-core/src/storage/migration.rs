// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Database Schema Migrations
//!
//! Versioned schema steps applied in one exclusive transaction. Applied
//! versions are tracked in `schema_version`.

use rusqlite::Connection;

use super::{unix_now, StorageError};

/// A single schema migration step.
pub struct Migration {
    /// Monotonically increasing version number (starting at 1).
    pub version: u32,
    /// Human-readable name for this migration.
    pub name: &'static str,
    /// SQL executed for this step.
    pub sql: &'static str,
}

/// Runs schema migrations against a database connection.
pub struct MigrationRunner;

impl MigrationRunner {
    /// Applies every migration newer than the current schema version.
    ///
    /// Either all pending migrations commit or none do.
    pub fn run(conn: &Connection, migrations: &[Migration]) -> Result<(), StorageError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY,
                applied_at INTEGER NOT NULL
            );",
        )?;

        let current_version = Self::current_version(conn)?;
        let pending: Vec<&Migration> = migrations
            .iter()
            .filter(|m| m.version > current_version)
            .collect();

        if pending.is_empty() {
            return Ok(());
        }

        for window in pending.windows(2) {
            if window[0].version >= window[1].version {
                return Err(StorageError::Migration(format!(
                    "Migrations are not in order: v{} before v{}",
                    window[0].version, window[1].version
                )));
            }
        }

        conn.execute_batch("BEGIN EXCLUSIVE TRANSACTION;")?;

        for migration in &pending {
            if let Err(e) = conn.execute_batch(migration.sql) {
                conn.execute_batch("ROLLBACK;")?;
                return Err(StorageError::Migration(format!(
                    "Migration v{} '{}' failed: {}",
                    migration.version, migration.name, e
                )));
            }

            if let Err(e) = conn.execute(
                "INSERT INTO schema_version (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![migration.version, unix_now() as i64],
            ) {
                conn.execute_batch("ROLLBACK;")?;
                return Err(StorageError::Migration(format!(
                    "Failed to record migration v{}: {}",
                    migration.version, e
                )));
            }
        }

        conn.execute_batch("COMMIT;")?;
        Ok(())
    }

    /// Returns the current schema version, or 0 if nothing was applied.
    pub fn current_version(conn: &Connection) -> Result<u32, StorageError> {
        let table_exists: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='schema_version'",
            [],
            |row| row.get(0),
        )?;

        if !table_exists {
            return Ok(0);
        }

        let version: Option<u32> =
            conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| {
                row.get(0)
            })?;

        Ok(version.unwrap_or(0))
    }
}

/// All migrations in version order. New steps are appended.
pub fn all_migrations() -> Vec<Migration> {
    vec![
        Migration {
            version: 1,
            name: "baseline_schema",
            sql: MIGRATION_V1_BASELINE,
        },
        Migration {
            version: 2,
            name: "restore_checkpoint",
            sql: MIGRATION_V2_RESTORE_CHECKPOINT,
        },
    ]
}

const MIGRATION_V1_BASELINE: &str = "
    -- Sealed owner secrets (authorization token, router key)
    CREATE TABLE IF NOT EXISTS owner_secrets (
        name TEXT PRIMARY KEY,
        value_sealed BLOB NOT NULL,
        updated_at INTEGER NOT NULL
    );

    -- Owner resume cursor
    CREATE TABLE IF NOT EXISTS owner_state (
        id INTEGER PRIMARY KEY CHECK (id = 1),
        message_last_index INTEGER,
        updated_at INTEGER NOT NULL
    );

    -- Contacts restored from the node
    CREATE TABLE IF NOT EXISTS restored_contacts (
        public_key TEXT PRIMARY KEY,
        alias TEXT,
        route_hint TEXT,
        restored_at INTEGER NOT NULL
    );

    -- Messages restored from the node
    CREATE TABLE IF NOT EXISTS restored_messages (
        id INTEGER PRIMARY KEY,
        sender TEXT NOT NULL,
        content TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        restored_at INTEGER NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_restored_messages_sender
        ON restored_messages(sender);
";

const MIGRATION_V2_RESTORE_CHECKPOINT: &str = "
    -- Last committed restore position
    CREATE TABLE IF NOT EXISTS restore_checkpoint (
        id INTEGER PRIMARY KEY CHECK (id = 1),
        checkpoint_json TEXT NOT NULL,
        updated_at INTEGER NOT NULL
    );
";
