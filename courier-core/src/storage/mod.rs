// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Persistent Storage Module
//!
//! Local storage for owner secrets, the restore cursor, restored history and
//! restore checkpoints. SQLite with application-level sealing of secrets.

#[cfg(feature = "testing")]
pub mod error;
#[cfg(not(feature = "testing"))]
mod error;

#[cfg(feature = "testing")]
pub mod memory;
#[cfg(not(feature = "testing"))]
mod memory;

#[cfg(feature = "testing")]
pub mod restore;
#[cfg(not(feature = "testing"))]
mod restore;

pub mod migration;
pub mod secure;

pub use error::StorageError;
pub use memory::MemoryStorage;
pub use restore::RestoreStore;
pub use secure::SecureStorage;

use std::path::Path;

use parking_lot::Mutex;
use rusqlite::Connection;

use crate::crypto::SealingKey;

/// SQLite-based storage implementation.
///
/// Implements both [`SecureStorage`] and [`RestoreStore`]. Secrets are
/// sealed with `sealing_key` before they are written.
pub struct Storage {
    conn: Mutex<Connection>,
    sealing_key: SealingKey,
}

impl Storage {
    /// Opens or creates a storage database at the given path.
    pub fn open<P: AsRef<Path>>(path: P, sealing_key: SealingKey) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn, sealing_key)
    }

    /// Creates an in-memory storage (for testing).
    pub fn in_memory(sealing_key: SealingKey) -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn, sealing_key)
    }

    fn from_connection(conn: Connection, sealing_key: SealingKey) -> Result<Self, StorageError> {
        migration::MigrationRunner::run(&conn, &migration::all_migrations())?;
        Ok(Storage {
            conn: Mutex::new(conn),
            sealing_key,
        })
    }

    /// Returns the current schema version.
    pub fn schema_version(&self) -> Result<u32, StorageError> {
        migration::MigrationRunner::current_version(&self.conn.lock())
    }
}

/// Seconds since the Unix epoch; 0 if the clock is before it.
pub(crate) fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
