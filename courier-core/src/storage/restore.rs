// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Restored history and restore checkpoints.

use rusqlite::{params, OptionalExtension};

use super::{unix_now, Storage, StorageError};
use crate::network::{ContactRecord, MessageRecord};
use crate::restore::RestoreCheckpoint;

/// Local database used by a restore.
///
/// Writes are idempotent per identity key: storing a page twice leaves the
/// same rows as storing it once.
pub trait RestoreStore: Send + Sync {
    /// Upserts contacts keyed by public key. Returns the number written.
    fn store_contacts(&self, contacts: &[ContactRecord]) -> Result<usize, StorageError>;

    /// Upserts messages keyed by index. Returns the number written.
    fn store_messages(&self, messages: &[MessageRecord]) -> Result<usize, StorageError>;

    /// Records the last committed restore position.
    fn save_checkpoint(&self, checkpoint: &RestoreCheckpoint) -> Result<(), StorageError>;

    /// Loads the last committed restore position.
    fn load_checkpoint(&self) -> Result<Option<RestoreCheckpoint>, StorageError>;

    /// Drops the checkpoint once a restore has finished.
    fn clear_checkpoint(&self) -> Result<(), StorageError>;

    /// Number of distinct contacts stored.
    fn contact_count(&self) -> Result<u64, StorageError>;

    /// Number of distinct messages stored.
    fn message_count(&self) -> Result<u64, StorageError>;
}

impl RestoreStore for Storage {
    fn store_contacts(&self, contacts: &[ContactRecord]) -> Result<usize, StorageError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let now = unix_now() as i64;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO restored_contacts (public_key, alias, route_hint, restored_at)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for contact in contacts {
                stmt.execute(params![
                    contact.public_key,
                    contact.alias,
                    contact.route_hint,
                    now
                ])?;
            }
        }
        tx.commit()?;
        Ok(contacts.len())
    }

    fn store_messages(&self, messages: &[MessageRecord]) -> Result<usize, StorageError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let now = unix_now() as i64;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO restored_messages (id, sender, content, created_at, restored_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for message in messages {
                stmt.execute(params![
                    message.id,
                    message.sender,
                    message.content,
                    message.created_at as i64,
                    now
                ])?;
            }
        }
        tx.commit()?;
        Ok(messages.len())
    }

    fn save_checkpoint(&self, checkpoint: &RestoreCheckpoint) -> Result<(), StorageError> {
        let json = serde_json::to_string(checkpoint)?;
        self.conn.lock().execute(
            "INSERT OR REPLACE INTO restore_checkpoint (id, checkpoint_json, updated_at) VALUES (1, ?1, ?2)",
            params![json, unix_now() as i64],
        )?;
        Ok(())
    }

    fn load_checkpoint(&self) -> Result<Option<RestoreCheckpoint>, StorageError> {
        let json: Option<String> = self
            .conn
            .lock()
            .query_row(
                "SELECT checkpoint_json FROM restore_checkpoint WHERE id = 1",
                [],
                |row| row.get(0),
            )
            .optional()?;

        json.map(|json| serde_json::from_str(&json).map_err(StorageError::from))
            .transpose()
    }

    fn clear_checkpoint(&self) -> Result<(), StorageError> {
        self.conn
            .lock()
            .execute("DELETE FROM restore_checkpoint WHERE id = 1", [])?;
        Ok(())
    }

    fn contact_count(&self) -> Result<u64, StorageError> {
        let count: i64 =
            self.conn
                .lock()
                .query_row("SELECT COUNT(*) FROM restored_contacts", [], |row| {
                    row.get(0)
                })?;
        Ok(count as u64)
    }

    fn message_count(&self) -> Result<u64, StorageError> {
        let count: i64 =
            self.conn
                .lock()
                .query_row("SELECT COUNT(*) FROM restored_messages", [], |row| {
                    row.get(0)
                })?;
        Ok(count as u64)
    }
}
